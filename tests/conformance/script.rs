use super::common::{json, xml};
use citrus_validation::validator::MessageValidator;
use citrus_validation::validator::script::{ScriptEvaluator, ScriptValidator};
use citrus_validation::{
    ErrorKind, Message, ScriptValidationContext, TestContext, ValidationContext, ValidationError,
};
use serde_json::Value;
use std::sync::Arc;

fn run_script(
    validator: &ScriptValidator,
    received: &Message,
    script: ScriptValidationContext,
    context: &mut TestContext,
) -> Result<(), ValidationError> {
    validator.validate_message(received, None, context, &[ValidationContext::Script(script)])
}

/// Evaluates `<binding path> == '<literal>'` against the bindings without CEL.
struct PathEquals;

impl ScriptEvaluator for PathEquals {
    fn evaluate(&self, expression: &str, bindings: &Value) -> Result<Value, ValidationError> {
        let (path, literal) = expression
            .split_once("==")
            .ok_or_else(|| ValidationError::invalid_expression(expression, "expected '=='"))?;
        let pointer = format!("/{}", path.trim().replace('.', "/"));
        let actual = bindings.pointer(&pointer).cloned().unwrap_or(Value::Null);
        let literal = literal.trim().trim_matches('\'');
        Ok(Value::Bool(actual.as_str() == Some(literal)))
    }
}

#[test]
fn pluggable_evaluator_sees_bindings() {
    let validator = ScriptValidator::with_evaluator(Arc::new(PathEquals));
    let received = xml(r#"<order id="7"><customer>Anna</customer></order>"#)
        .with_header("operation", "order");
    let script = "// bindings\nroot.customer.text == 'Anna'\nassert root.attributes.id == '7'\nheaders.operation == 'order'";
    run_script(
        &validator,
        &received,
        ScriptValidationContext::inline(script),
        &mut TestContext::new(),
    )
    .unwrap();

    let err = run_script(
        &validator,
        &received,
        ScriptValidationContext::inline("root.customer.text == 'Bob'"),
        &mut TestContext::new(),
    )
    .unwrap_err();
    let ValidationError::ScriptAssertion { expression, snippet, .. } = &err else {
        panic!("expected script assertion, got {err:?}");
    };
    assert_eq!(expression, "root.customer.text == 'Bob'");
    assert!(snippet.starts_with("line 1:"), "{snippet}");
}

#[test]
fn script_resource_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("validate.cel");
    std::fs::write(&path, "payload == 'pong'\n").unwrap();
    let validator = ScriptValidator::with_evaluator(Arc::new(PathEquals));

    run_script(
        &validator,
        &Message::new("pong").with_type("PLAINTEXT"),
        ScriptValidationContext::resource(&path),
        &mut TestContext::new(),
    )
    .unwrap();

    let err = run_script(
        &validator,
        &Message::new("ping").with_type("PLAINTEXT"),
        ScriptValidationContext::resource(&path),
        &mut TestContext::new(),
    )
    .unwrap_err();
    assert!(err.to_string().contains(&path.display().to_string()), "{err}");

    let err = run_script(
        &validator,
        &Message::new("ping"),
        ScriptValidationContext::resource(dir.path().join("missing.cel")),
        &mut TestContext::new(),
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resource);
}

#[test]
fn blank_script_passes() {
    run_script(
        &ScriptValidator::new(),
        &json("{}"),
        ScriptValidationContext::inline("\n   \n"),
        &mut TestContext::new(),
    )
    .unwrap();
}

#[cfg(feature = "script-eval")]
mod cel {
    use super::*;

    const ORDER: &str = r#"{"order":{"id":4711,"items":[{"sku":"A1","qty":2},{"sku":"B2","qty":1}],"customer":{"name":"Anna","vip":true}}}"#;

    fn cel(received: &Message, script: &str) -> Result<TestContext, ValidationError> {
        let mut context = TestContext::new();
        run_script(
            &ScriptValidator::new(),
            received,
            ScriptValidationContext::inline(script),
            &mut context,
        )?;
        Ok(context)
    }

    #[test]
    fn json_payload_assertions() {
        let context = cel(
            &json(ORDER),
            r#"
// order checks
assert size(json.order.items) == 2
json.order.customer.vip
json.order.items.all(i, i.qty > 0)
json.order.items.exists(i, i.sku == 'B2')
set customer = json.order.customer.name
variables.customer == 'Anna'
"#,
        )
        .unwrap();
        assert_eq!(context.get_variable("customer"), Some("Anna"));
    }

    #[test]
    fn xml_payload_assertions() {
        cel(
            &xml(r#"<order id="7"><item sku="A1">Apple</item><item sku="B2">Banana</item></order>"#),
            "root.name == 'order'\nsize(root.children) == 2\nroot.item.attributes.sku == 'A1'\nroot.children[1].text == 'Banana'",
        )
        .unwrap();
    }

    #[test]
    fn failed_assertion_carries_both_sides() {
        let err = cel(&json(ORDER), "json.order.customer.name == 'Bob'").unwrap_err();
        assert!(err.is_mismatch());
        let message = err.to_string();
        assert!(message.contains("inline script"), "{message}");
        assert!(message.contains("json.order.customer.name == 'Bob'"), "{message}");
        assert!(message.contains("Anna"), "{message}");
        assert!(message.contains("Bob"), "{message}");
    }

    #[test]
    fn missing_field_fails_the_assertion() {
        let err = cel(&json(ORDER), "json.order.missing == 1").unwrap_err();
        assert!(matches!(err, ValidationError::ScriptAssertion { .. }));
    }

    #[test]
    fn non_boolean_and_syntax_errors_are_configuration_errors() {
        let err = cel(&json(ORDER), "json.order.id").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        let err = cel(&json(ORDER), "json.order.id ==").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidExpression { .. }));
    }
}
