use citrus_validation::parse::parse_validations;
use citrus_validation::{ErrorKind, ScriptType, ValidationContext};

#[test]
fn receive_action_definitions() {
    let contexts = parse_validations(
        r#"
- xpath:
    namespaces:
      hello: http://citrusframework.org/schemas/samples/HelloService.xsd
    expressions:
      //hello:User: Christoph
      count(//hello:Item): 2
      boolean:/hello:HelloRequest: true
    extract:
      //hello:MessageId: messageId
- json_path:
    expressions:
      $.user.name: "@startsWith('Chr')@"
      $..orders.size(): 3
    extract:
      $.user.id: userId
- json:
    ignore: [$.timestamp, "$..created"]
    schema_repository: users
    strict: false
- script:
    type: cel
    script: |
      assert json.user.age > 18
      set name = json.user.name
- header:
    operation: sayHello
    citrus_http_method: POST
"#,
    )
    .unwrap();
    assert_eq!(contexts.len(), 5);

    let ValidationContext::Xpath(xpath) = &contexts[0] else {
        panic!("expected xpath, got {:?}", contexts[0]);
    };
    assert_eq!(
        xpath.expressions,
        vec![
            ("//hello:User".to_string(), "Christoph".to_string()),
            ("count(//hello:Item)".to_string(), "2".to_string()),
            ("boolean:/hello:HelloRequest".to_string(), "true".to_string()),
        ]
    );
    assert_eq!(
        xpath.namespaces.get("hello").map(String::as_str),
        Some("http://citrusframework.org/schemas/samples/HelloService.xsd")
    );
    assert_eq!(xpath.extract[0].1, "messageId");

    let ValidationContext::JsonPath(json_path) = &contexts[1] else {
        panic!("expected json_path");
    };
    assert_eq!(json_path.expressions[1], ("$..orders.size()".to_string(), "3".to_string()));

    let ValidationContext::Json(json) = &contexts[2] else {
        panic!("expected json");
    };
    assert_eq!(json.ignore_expressions.len(), 2);
    assert_eq!(json.schema_repository.as_deref(), Some("users"));
    assert_eq!(json.strict, Some(false));
    assert_eq!(json.schema_validation, None);

    let ValidationContext::Script(script) = &contexts[3] else {
        panic!("expected script");
    };
    assert_eq!(script.script_type, ScriptType::Cel);
    assert!(script.script.as_deref().unwrap_or_default().contains("set name"));

    let ValidationContext::Header(header) = &contexts[4] else {
        panic!("expected header");
    };
    assert_eq!(header.headers.get("operation").map(String::as_str), Some("sayHello"));
}

#[test]
fn malformed_documents_are_configuration_errors() {
    for input in [
        "- xpath: [unclosed",
        "just a string",
        "- xpath: {}\n  json: {}",
        "- xpath: {expressions: {a: 1}, unknown: true}",
        "- script: {type: groovy, script: x}",
        "- header: {operation: {nested: true}}",
    ] {
        let err = parse_validations(input).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration, "{input}: {err}");
    }
}
