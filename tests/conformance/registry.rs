use super::common::{json, xml};
use citrus_validation::validator::MessageValidator;
use citrus_validation::{
    ErrorKind, HeaderValidationContext, Message, MessageValidatorRegistry, TestContext,
    ValidationContext, ValidationError, ValidationSettings,
};
use std::sync::{Arc, Mutex};

#[test]
fn json_message_end_to_end() {
    let received = json(r#"{"user":{"name":"Penny","id":4711}}"#).with_header("operation", "getUser");
    let control = Message::new(r#"{"user":{"name":"Penny","id":"@variable('userId')@"}}"#)
        .with_header("operation", "getUser");
    let mut context = TestContext::new();
    citrus_validation::validate_message(
        &received,
        Some(&control),
        "- json_path: {expressions: {$.user.name: Penny}}",
        &mut context,
    )
    .unwrap();
    assert_eq!(context.get_variable("userId"), Some("4711"));
}

#[test]
fn xml_message_end_to_end() {
    let received = xml("<greeting><text>Hello</text><lang>en</lang></greeting>");
    let control = Message::new("<greeting><text>Hello</text><lang>@ignore@</lang></greeting>");
    let definitions = r#"
- xpath:
    expressions: {/greeting/text: Hello}
    extract: {/greeting/lang: lang}
"#;
    let mut context = TestContext::new();
    citrus_validation::validate_message(&received, Some(&control), definitions, &mut context)
        .unwrap();
    assert_eq!(context.get_variable("lang"), Some("en"));

    let control = Message::new("<greeting><text>Bye</text><lang>en</lang></greeting>");
    let err = citrus_validation::validate_message(&received, Some(&control), "", &mut context)
        .unwrap_err();
    assert!(err.is_mismatch());
}

#[test]
fn header_validator_always_runs() {
    let registry = MessageValidatorRegistry::default_registry(&ValidationSettings::default());
    let contexts = [ValidationContext::Header(
        HeaderValidationContext::new().header("operation", "sayHello"),
    )];
    let err = registry
        .validate(
            &Message::new("Hello").with_type("PLAINTEXT"),
            None,
            &mut TestContext::new(),
            &contexts,
        )
        .unwrap_err();
    assert_eq!(err.to_string(), "Validation failed: Header element 'operation' is missing");
}

#[test]
fn unsupported_type_fails_with_configuration_error() {
    let registry = MessageValidatorRegistry::default();
    let err = registry
        .validate(&Message::new("a;b").with_type("CSV"), None, &mut TestContext::new(), &[])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(err.to_string().starts_with("Failed to find proper message validator"));
}

#[test]
fn json_declared_xml_payload_is_sniffed() {
    let registry = MessageValidatorRegistry::default();
    let found = registry
        .find_message_validators("JSON", &Message::new("<root/>"))
        .unwrap();
    assert_eq!(found[0].name(), "defaultXmlMessageValidator");
}

#[test]
fn default_message_type_comes_from_settings() {
    let settings = ValidationSettings {
        default_message_type: citrus_validation::MessageType::Plaintext,
        ..ValidationSettings::default()
    };
    let registry = MessageValidatorRegistry::default_registry(&settings);
    registry
        .validate(
            &Message::new("Hello"),
            Some(&Message::new("Hello")),
            &mut TestContext::new(),
            &[],
        )
        .unwrap();
}

/// Records every call; supports PLAINTEXT only.
#[derive(Default)]
struct Recording {
    calls: Arc<Mutex<Vec<String>>>,
}

impl MessageValidator for Recording {
    fn name(&self) -> &str {
        "recordingValidator"
    }

    fn supports_message_type(&self, message_type: &str, _message: &Message) -> bool {
        message_type.eq_ignore_ascii_case("plaintext")
    }

    fn validate_message(
        &self,
        received: &Message,
        _control: Option<&Message>,
        _context: &mut TestContext,
        _validation_contexts: &[ValidationContext],
    ) -> Result<(), ValidationError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(received.payload_text().into_owned());
        }
        Ok(())
    }
}

#[test]
fn custom_validators_run_after_builtins() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let mut registry = MessageValidatorRegistry::default();
    registry.register(Recording {
        calls: Arc::clone(&calls),
    });
    assert!(registry.get("recordingValidator").is_some());

    registry
        .validate(
            &Message::new("ping").with_type("plaintext"),
            Some(&Message::new("ping")),
            &mut TestContext::new(),
            &[],
        )
        .unwrap();
    assert_eq!(*calls.lock().unwrap(), vec!["ping".to_string()]);

    let err = registry
        .validate(
            &Message::new("ping").with_type("plaintext"),
            Some(&Message::new("pong")),
            &mut TestContext::new(),
            &[],
        )
        .unwrap_err();
    assert!(err.is_mismatch());
    assert_eq!(calls.lock().unwrap().len(), 1);
}
