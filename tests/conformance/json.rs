use super::common::{assert_mismatch, json, run};
use citrus_validation::schema_repository::{JsonSchema, JsonSchemaRepository};
use citrus_validation::validator::MessageValidator;
use citrus_validation::validator::json::JsonTextMessageValidator;
use citrus_validation::{
    ErrorKind, JsonValidationContext, Message, ReferenceResolver, TestContext, ValidationContext,
    ValidationError,
};
use std::sync::Arc;

fn compare(received: &str, control: &str) -> Result<TestContext, ValidationError> {
    run(
        &JsonTextMessageValidator::default(),
        &json(received),
        Some(&json(control)),
        &[],
    )
}

fn compare_with(
    received: &str,
    control: &str,
    validation_context: JsonValidationContext,
) -> Result<TestContext, ValidationError> {
    run(
        &JsonTextMessageValidator::default(),
        &json(received),
        Some(&json(control)),
        &[ValidationContext::Json(validation_context)],
    )
}

#[test]
fn ignored_entry_with_equal_rest_passes() {
    compare(r#"{"a":"anything","b":2}"#, r#"{"a":"@ignore@","b":2}"#).unwrap();
}

#[test]
fn differing_value_names_path_and_values() {
    assert_mismatch(
        compare(r#"{"a":"anything","b":3}"#, r#"{"a":"@ignore@","b":2}"#),
        &["$.b", "'2'", "'3'"],
    );
}

#[test]
fn nested_paths_in_failures() {
    assert_mismatch(
        compare(
            r#"{"order":{"items":[{"id":1},{"id":2}]}}"#,
            r#"{"order":{"items":[{"id":1},{"id":5}]}}"#,
        ),
        &["$.order.items[1].id", "'5'", "'2'"],
    );
}

#[test]
fn strict_mode_counts_entries() {
    let received = r#"{"a":1,"b":2}"#;
    assert_mismatch(
        compare(received, r#"{"a":1}"#),
        &["Number of JSON entries not equal", "'1'", "'2'"],
    );
    compare_with(received, r#"{"a":1}"#, JsonValidationContext::new().strict(false)).unwrap();
}

#[test]
fn missing_entry_and_type_mismatch() {
    assert_mismatch(compare(r#"{"b":1}"#, r#"{"a":1}"#), &["Missing JSON entry: 'a'"]);
    assert_mismatch(
        compare(r#"{"a":[1]}"#, r#"{"a":{"x":1}}"#),
        &["Type mismatch for JSON entry '$.a'", "object", "array"],
    );
}

#[test]
fn ignore_expressions_skip_entries() {
    compare_with(
        r#"{"id":"0815","user":{"name":"Penny","created":"today"}}"#,
        r#"{"id":"4711","user":{"name":"Penny","created":"yesterday"}}"#,
        JsonValidationContext::new().ignore("$.id").ignore("$..created"),
    )
    .unwrap();
}

#[test]
fn matchers_and_variables_in_control_values() {
    let context = compare(
        r#"{"id":4711,"name":"Penny","tags":["a","b"]}"#,
        r#"{"id":"@greaterThan(100)@","name":"@variable('user')@","tags":["a","@ignore@"]}"#,
    )
    .unwrap();
    assert_eq!(context.get_variable("user"), Some("Penny"));
}

#[test]
fn null_handling() {
    compare(r#"{"a":null}"#, r#"{"a":null}"#).unwrap();
    compare(r#"{"a":null}"#, r#"{"a":""}"#).unwrap();
    assert_mismatch(compare(r#"{"a":"x"}"#, r#"{"a":null}"#), &["'null'", "'x'"]);
}

#[test]
fn malformed_received_payload() {
    let err = compare("{not json", r#"{"a":1}"#).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Payload);
}

fn references() -> Arc<ReferenceResolver> {
    let user = JsonSchema::parse(
        "user",
        r#"{"type":"object","required":["name","age"],"properties":{"name":{"type":"string"},"age":{"type":"integer"}}}"#,
    )
    .unwrap();
    let named = JsonSchema::parse("named", r#"{"type":"object","required":["name"]}"#).unwrap();
    Arc::new(
        ReferenceResolver::new().with_schema_repository(
            JsonSchemaRepository::new("users")
                .with_schema(user)
                .with_schema(named),
        ),
    )
}

fn schema_check(payload: &str, validation_context: JsonValidationContext) -> Result<(), ValidationError> {
    let mut context = TestContext::with_references(references());
    JsonTextMessageValidator::default().validate_message(
        &json(payload),
        None,
        &mut context,
        &[ValidationContext::Json(validation_context.schema_validation(true))],
    )
}

#[test]
fn schema_violations_are_aggregated_across_schemas() {
    let err = schema_check(r#"{"age":"old"}"#, JsonValidationContext::new()).unwrap_err();
    let ValidationError::SchemaViolations { violations } = &err else {
        panic!("expected schema violations, got {err:?}");
    };
    assert!(violations.len() >= 3, "{violations:?}");
    assert!(violations.iter().any(|v| v.starts_with("[user] ")));
    assert!(violations.iter().any(|v| v.starts_with("[named] ")));
    assert!(err.is_mismatch());
}

#[test]
fn schema_selection_by_name_and_repository() {
    schema_check(r#"{"name":"Penny"}"#, JsonValidationContext::new().schema("named")).unwrap();
    assert!(schema_check(r#"{"name":"Penny"}"#, JsonValidationContext::new().schema("user")).is_err());
    assert!(
        schema_check(
            r#"{"name":"Penny"}"#,
            JsonValidationContext::new().schema_repository("users")
        )
        .is_err()
    );
}

#[test]
fn empty_object_and_no_schemas_pass() {
    schema_check("{}", JsonValidationContext::new().schema("user")).unwrap();
    JsonTextMessageValidator::default()
        .validate_message(
            &json(r#"{"anything":true}"#),
            None,
            &mut TestContext::new(),
            &[ValidationContext::Json(JsonValidationContext::new().schema_validation(true))],
        )
        .unwrap();
}

#[test]
fn unknown_schema_names_are_configuration_errors() {
    let err = schema_check("{}", JsonValidationContext::new().schema("order")).unwrap_err();
    assert!(matches!(err, ValidationError::UnknownSchema { .. }));
    assert_eq!(err.kind(), ErrorKind::Configuration);
    let err = schema_check("{}", JsonValidationContext::new().schema_repository("orders")).unwrap_err();
    assert!(matches!(err, ValidationError::UnknownSchemaRepository { .. }));
}

#[test]
fn schema_directory_repository() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("product.json"),
        r#"{"type":"object","required":["sku"]}"#,
    )
    .unwrap();
    let repository = JsonSchemaRepository::new("catalog")
        .with_schema_dir(dir.path())
        .unwrap();
    assert_eq!(repository.schemas()[0].name(), "product");

    let mut context = TestContext::with_references(Arc::new(
        ReferenceResolver::new().with_schema_repository(repository),
    ));
    let err = JsonTextMessageValidator::default()
        .schema_validation(true)
        .validate_message(&Message::new(r#"{"name":"x"}"#).with_type("JSON"), None, &mut context, &[])
        .unwrap_err();
    assert!(err.to_string().contains("[product]"), "{err}");
}
