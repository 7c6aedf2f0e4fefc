use super::common::{assert_mismatch, run, xml};
use citrus_validation::validator::MessageValidator;
use citrus_validation::validator::xpath::XpathMessageValidator;
use citrus_validation::{TestContext, ValidationContext, ValidationError, XpathValidationContext};

const ENVELOPE: &str = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Header/>
  <soap:Body>
    <HelloRequest xmlns="http://citrusframework.org/schemas/samples/HelloService.xsd">
      <MessageId>123456789</MessageId>
      <CorrelationId>CORR123456789</CorrelationId>
      <User>Christoph</User>
      <Text>Hello Citrus</Text>
      <Items count="2"><Item>a</Item><Item>b</Item></Items>
    </HelloRequest>
  </soap:Body>
</soap:Envelope>"#;

const HELLO_NS: &str = "http://citrusframework.org/schemas/samples/HelloService.xsd";

fn check(config: XpathValidationContext) -> Result<TestContext, ValidationError> {
    run(
        &XpathMessageValidator,
        &xml(ENVELOPE),
        None,
        &[ValidationContext::Xpath(config)],
    )
}

#[test]
fn namespaced_assertions() {
    check(
        XpathValidationContext::new()
            .namespace("hello", HELLO_NS)
            .expression("//hello:MessageId", "123456789")
            .expression("/soap:Envelope/soap:Body/hello:HelloRequest/hello:User", "Christoph")
            .expression("//hello:Text", "@contains('Citrus')@")
            .expression("//hello:Items/@count", "2")
            .expression("count(//hello:Item)", "2")
            .expression("node-set://hello:Item", "a,b")
            .expression("boolean:/soap:Envelope/soap:Header", "true"),
    )
    .unwrap();
}

#[test]
fn unprefixed_names_match_the_default_namespace() {
    check(XpathValidationContext::new().expression("//HelloRequest/User", "Christoph")).unwrap();
}

#[test]
fn extraction_without_assertion() {
    let context = check(
        XpathValidationContext::new()
            .namespace("hello", HELLO_NS)
            .extract("//hello:CorrelationId", "correlationId")
            .extract("node-set://hello:Item", "items"),
    )
    .unwrap();
    assert_eq!(context.get_variable("correlationId"), Some("CORR123456789"));
    assert_eq!(context.get_variable("items"), Some("a,b"));
}

#[test]
fn positional_tokens_inside_expected_values() {
    let context = check(
        XpathValidationContext::new()
            .expression("//HelloRequest/Text", "Hello @variable('framework')@")
            .expression("//HelloRequest/CorrelationId", "CORR@ignore@"),
    )
    .unwrap();
    assert_eq!(context.get_variable("framework"), Some("Citrus"));
}

#[test]
fn mismatch_embeds_expected_and_actual() {
    assert_mismatch(
        check(XpathValidationContext::new().expression("//HelloRequest/User", "Leonard")),
        &["//HelloRequest/User", "'Leonard'", "'Christoph'"],
    );
}

#[test]
fn unknown_matcher_is_a_configuration_error() {
    let err = check(XpathValidationContext::new().expression("//HelloRequest/User", "@isAwesome()@"))
        .unwrap_err();
    assert!(matches!(err, ValidationError::UnknownMatcher { .. }));
    assert!(!err.is_mismatch());
}

#[test]
fn missing_node_names_the_expression() {
    let err = check(XpathValidationContext::new().expression("//HelloRequest/Missing", "x"))
        .unwrap_err();
    assert_eq!(err.to_string(), "No result for expression: '//HelloRequest/Missing'");
}

#[test]
fn expressions_evaluate_in_order() {
    let mut context = TestContext::new();
    let err = XpathMessageValidator
        .validate_message(
            &xml(ENVELOPE),
            None,
            &mut context,
            &[ValidationContext::Xpath(
                XpathValidationContext::new()
                    .expression("//HelloRequest/User", "@variable('user')@")
                    .expression("//HelloRequest/Text", "wrong")
                    .expression("//HelloRequest/MessageId", "@variable('id')@"),
            )],
        )
        .unwrap_err();
    assert!(err.is_mismatch());
    assert_eq!(context.get_variable("user"), Some("Christoph"));
    assert_eq!(context.get_variable("id"), None);
}

#[test]
fn whole_value_tokens_resolve_like_plain_text() {
    assert_mismatch(
        check(XpathValidationContext::new().expression("//HelloRequest/MessageId", "@ignore(3)@")),
        &["expected '123' but was '123456789'"],
    );
    let context = check(
        XpathValidationContext::new().expression("//HelloRequest/Text", "@variable('greeting')@ Citrus"),
    )
    .unwrap();
    assert_eq!(context.get_variable("greeting"), Some("Hello"));
}
