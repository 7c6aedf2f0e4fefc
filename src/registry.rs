//! Validator registry and per-message dispatch.

use crate::config::ValidationSettings;
use crate::context::TestContext;
use crate::enums::MessageType;
use crate::error::ValidationError;
use crate::message::Message;
use crate::validation_context::ValidationContext;
use crate::validator::MessageValidator;
use crate::validator::binary::{BinaryBase64MessageValidator, GzipBase64MessageValidator};
use crate::validator::header::HeaderValidator;
use crate::validator::json::JsonTextMessageValidator;
use crate::validator::json_path::JsonPathMessageValidator;
use crate::validator::plaintext::PlainTextMessageValidator;
use crate::validator::script::ScriptValidator;
use crate::validator::xml::DomXmlMessageValidator;
use crate::validator::xpath::XpathMessageValidator;
use std::sync::Arc;
use tracing::{debug, warn};

/// Ordered payload validators plus the header validator that always runs.
#[derive(Clone)]
pub struct MessageValidatorRegistry {
    validators: Vec<Arc<dyn MessageValidator>>,
    header_validator: Arc<dyn MessageValidator>,
    default_message_type: MessageType,
}

impl std::fmt::Debug for MessageValidatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageValidatorRegistry")
            .field(
                "validators",
                &self.validators.iter().map(|v| v.name()).collect::<Vec<_>>(),
            )
            .field("header_validator", &self.header_validator.name())
            .field("default_message_type", &self.default_message_type)
            .finish()
    }
}

impl Default for MessageValidatorRegistry {
    fn default() -> Self {
        Self::default_registry(&ValidationSettings::default())
    }
}

impl MessageValidatorRegistry {
    /// An empty registry; only headers are validated until validators are added.
    pub fn new(settings: &ValidationSettings) -> Self {
        Self {
            validators: Vec::new(),
            header_validator: Arc::new(HeaderValidator),
            default_message_type: settings.default_message_type,
        }
    }

    /// All built-in validators in dispatch order.
    pub fn default_registry(settings: &ValidationSettings) -> Self {
        let mut registry = Self::new(settings);
        registry
            .register(DomXmlMessageValidator)
            .register(XpathMessageValidator)
            .register(JsonTextMessageValidator::new(settings))
            .register(JsonPathMessageValidator)
            .register(PlainTextMessageValidator::new(settings))
            .register(BinaryBase64MessageValidator::new(settings))
            .register(GzipBase64MessageValidator::new(settings))
            .register(ScriptValidator::new());
        registry
    }

    /// Appends a payload validator; later registrations run later.
    pub fn register(&mut self, validator: impl MessageValidator + 'static) -> &mut Self {
        self.validators.push(Arc::new(validator));
        self
    }

    /// Replaces the header validator.
    pub fn set_header_validator(&mut self, validator: impl MessageValidator + 'static) -> &mut Self {
        self.header_validator = Arc::new(validator);
        self
    }

    pub fn validators(&self) -> &[Arc<dyn MessageValidator>] {
        &self.validators
    }

    pub fn header_validator(&self) -> &dyn MessageValidator {
        self.header_validator.as_ref()
    }

    /// Looks up a validator by registry name, including the header validator.
    pub fn get(&self, name: &str) -> Option<&dyn MessageValidator> {
        self.validators
            .iter()
            .chain(std::iter::once(&self.header_validator))
            .find(|v| v.name() == name)
            .map(|v| v.as_ref())
    }

    /// Declared message type, or the configured default when undeclared.
    pub fn message_type<'m>(&self, message: &'m Message) -> &'m str {
        message
            .message_type
            .as_deref()
            .unwrap_or(self.default_message_type.as_str())
    }

    /// Payload validators accepting the type/message pair.
    ///
    /// An XML type with a JSON looking payload (or the reverse) is retried with
    /// the sniffed type.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Configuration`] when nothing matches.
    pub fn find_message_validators(
        &self,
        message_type: &str,
        message: &Message,
    ) -> Result<Vec<&dyn MessageValidator>, ValidationError> {
        let matching = self.supporting(message_type, message);
        if !matching.is_empty() {
            return Ok(matching);
        }

        let sniffed = if is_xml_type(message_type) && message.has_json_payload() {
            Some(MessageType::Json)
        } else if MessageType::Json.matches(message_type) && message.has_xml_payload() {
            Some(MessageType::Xml)
        } else {
            None
        };
        if let Some(sniffed) = sniffed {
            warn!(
                declared = message_type,
                sniffed = sniffed.as_str(),
                "payload does not match declared message type, retrying with sniffed type"
            );
            let matching = self.supporting(sniffed.as_str(), message);
            if !matching.is_empty() {
                return Ok(matching);
            }
        }

        Err(ValidationError::configuration(format!(
            "Failed to find proper message validator for message type '{}'",
            message_type
        )))
    }

    fn supporting(&self, message_type: &str, message: &Message) -> Vec<&dyn MessageValidator> {
        self.validators
            .iter()
            .filter(|v| v.supports_message_type(message_type, message))
            .map(|v| v.as_ref())
            .collect()
    }

    /// Runs every supporting validator whose contexts apply, then the header validator.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure.
    pub fn validate(
        &self,
        received: &Message,
        control: Option<&Message>,
        context: &mut TestContext,
        validation_contexts: &[ValidationContext],
    ) -> Result<(), ValidationError> {
        let message_type = self.message_type(received);
        let validators = self.find_message_validators(message_type, received)?;
        for validator in validators {
            if !validator.applies_to(validation_contexts) {
                continue;
            }
            debug!(validator = validator.name(), message_type, "running message validator");
            validator.validate_message(received, control, context, validation_contexts)?;
        }
        self.header_validator
            .validate_message(received, control, context, validation_contexts)
    }
}

fn is_xml_type(message_type: &str) -> bool {
    MessageType::Xml.matches(message_type) || MessageType::Xhtml.matches(message_type)
}
