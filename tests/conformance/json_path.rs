use super::common::{assert_mismatch, json, run};
use citrus_validation::validator::MessageValidator;
use citrus_validation::validator::json_path::JsonPathMessageValidator;
use citrus_validation::{
    JsonPathValidationContext, Message, TestContext, ValidationContext, ValidationError,
};

const PAYLOAD: &str = r#"{
  "user": "christoph",
  "age": 32,
  "address": {"city": "Munich", "zip-code": "80331"},
  "roles": ["admin", "tester"],
  "orders": [{"id": 1, "total": 9.5}, {"id": 2, "total": 20}]
}"#;

fn check(config: JsonPathValidationContext) -> Result<TestContext, ValidationError> {
    run(
        &JsonPathMessageValidator,
        &json(PAYLOAD),
        None,
        &[ValidationContext::JsonPath(config)],
    )
}

#[test]
fn extraction_without_assertion() {
    let context = check(JsonPathValidationContext::new().extract("$.user", "user")).unwrap();
    assert_eq!(context.get_variable("user"), Some("christoph"));
}

#[test]
fn assertions_use_the_shared_value_pipeline() {
    check(
        JsonPathValidationContext::new()
            .expression("$.user", "christoph")
            .expression("$.age", "@greaterThan(18)@")
            .expression("$.address.zip-code", "80331")
            .expression("$.address.city", "@ignore@")
            .expression("$.roles", "[admin, tester]")
            .expression("$.orders[1].total", "20")
            .expression("$.orders[*].id", "[1, 2]")
            .expression("$.roles.size()", "2")
            .expression("$.address.keySet()", "[city, zip-code]")
            .expression("$.missing.exists()", "false"),
    )
    .unwrap();
}

#[test]
fn mismatch_names_expression() {
    assert_mismatch(
        check(JsonPathValidationContext::new().expression("$.age", "33")),
        &["Values not equal for element '$.age'", "'33'", "'32'"],
    );
}

#[test]
fn missing_path_fails_with_expression() {
    let err = check(JsonPathValidationContext::new().expression("$.address.street", "x"))
        .unwrap_err();
    assert!(matches!(err, ValidationError::ExpressionNotFound { .. }));
    assert!(err.to_string().contains("$.address.street"));
}

#[test]
fn variables_in_expressions_and_values() {
    let mut context = TestContext::new();
    context.set_variable("field", "user").unwrap();
    context.set_variable("expected", "christoph").unwrap();
    JsonPathMessageValidator
        .validate_message(
            &json(PAYLOAD),
            None,
            &mut context,
            &[ValidationContext::JsonPath(
                JsonPathValidationContext::new()
                    .expression("$.${field}", "${expected}")
                    .extract("$.orders[0].id", "firstOrder"),
            )],
        )
        .unwrap();
    assert_eq!(context.get_variable("firstOrder"), Some("1"));
}

#[test]
fn empty_payload_is_a_mismatch() {
    assert_mismatch(
        run(
            &JsonPathMessageValidator,
            &Message::new("").with_type("JSON"),
            None,
            &[ValidationContext::JsonPath(
                JsonPathValidationContext::new().expression("$.a", "1"),
            )],
        ),
        &["payload was empty"],
    );
}

#[test]
fn without_context_nothing_is_checked() {
    run(&JsonPathMessageValidator, &json(PAYLOAD), None, &[]).unwrap();
}

#[test]
fn whole_value_tokens_resolve_like_plain_text() {
    assert_mismatch(
        check(JsonPathValidationContext::new().expression("$.user", "@ignore(5)@")),
        &["expected 'chris' but was 'christoph'"],
    );
    let context = check(JsonPathValidationContext::new().expression("$.address.zip-code", "@variable('zip')@"))
        .unwrap();
    assert_eq!(context.get_variable("zip"), Some("80331"));
}
