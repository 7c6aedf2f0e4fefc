use super::common::{assert_mismatch, run, xml};
use citrus_validation::validator::xml::DomXmlMessageValidator;
use citrus_validation::{ErrorKind, Message, TestContext, ValidationContext, ValidationError, XmlValidationContext};

const RECEIVED: &str = r#"<ns0:order xmlns:ns0="urn:shop" id="4711" created="2024-01-01T10:00:00">
  <ns0:customer type="vip">Anna</ns0:customer>
  <ns0:items>
    <ns0:item sku="A1">Apple</ns0:item>
    <ns0:item sku="B2">Banana</ns0:item>
  </ns0:items>
  <ns0:timestamp>1700000000</ns0:timestamp>
</ns0:order>"#;

fn compare(control: &str, config: XmlValidationContext) -> Result<TestContext, ValidationError> {
    run(
        &DomXmlMessageValidator,
        &xml(RECEIVED),
        Some(&Message::new(control)),
        &[ValidationContext::Xml(config)],
    )
}

#[test]
fn equal_trees_with_different_prefixes() {
    compare(
        r#"<shop:order xmlns:shop="urn:shop" id="4711" created="2024-01-01T10:00:00">
             <shop:customer type="vip">Anna</shop:customer>
             <shop:items><shop:item sku="A1">Apple</shop:item><shop:item sku="B2">Banana</shop:item></shop:items>
             <shop:timestamp>1700000000</shop:timestamp>
           </shop:order>"#,
        XmlValidationContext::new(),
    )
    .unwrap();
}

#[test]
fn ignore_placeholders_variables_and_matchers() {
    let context = compare(
        r#"<ns0:order xmlns:ns0="urn:shop" id="@variable('orderId')@" created="@ignore@">
             <ns0:customer type="@matches('vip|regular')@">@startsWith('An')@</ns0:customer>
             <ns0:items>@ignore@</ns0:items>
             <ns0:timestamp>@isNumber()@</ns0:timestamp>
           </ns0:order>"#,
        XmlValidationContext::new(),
    )
    .unwrap();
    assert_eq!(context.get_variable("orderId"), Some("4711"));
}

#[test]
fn ignore_expressions_skip_elements_and_attributes() {
    compare(
        r#"<ns0:order xmlns:ns0="urn:shop" id="4711" created="yesterday">
             <ns0:customer type="vip">Anna</ns0:customer>
             <ns0:items><ns0:item sku="A1">Apple</ns0:item><ns0:item sku="B2">Banana</ns0:item></ns0:items>
             <ns0:timestamp>0</ns0:timestamp>
           </ns0:order>"#,
        XmlValidationContext::new()
            .namespace("s", "urn:shop")
            .ignore("/s:order/@created")
            .ignore("//s:timestamp"),
    )
    .unwrap();
}

#[test]
fn first_divergence_names_the_element_path() {
    assert_mismatch(
        compare(
            r#"<ns0:order xmlns:ns0="urn:shop" id="4711" created="@ignore@">
                 <ns0:customer type="vip">Anna</ns0:customer>
                 <ns0:items><ns0:item sku="A1">Apple</ns0:item><ns0:item sku="B2">Cherry</ns0:item></ns0:items>
                 <ns0:timestamp>@ignore@</ns0:timestamp>
               </ns0:order>"#,
            XmlValidationContext::new(),
        ),
        &["order.items.item", "'Cherry'", "'Banana'"],
    );
}

#[test]
fn attribute_value_mismatch() {
    assert_mismatch(
        compare(
            r#"<ns0:order xmlns:ns0="urn:shop" id="1" created="@ignore@">
                 <ns0:customer type="vip">Anna</ns0:customer>
                 <ns0:items>@ignore@</ns0:items>
                 <ns0:timestamp>@ignore@</ns0:timestamp>
               </ns0:order>"#,
            XmlValidationContext::new(),
        ),
        &["Values not equal for attribute 'order.id'", "'1'", "'4711'"],
    );
}

#[test]
fn namespace_declarations() {
    run(
        &DomXmlMessageValidator,
        &xml(RECEIVED),
        None,
        &[ValidationContext::Xml(
            XmlValidationContext::new().control_namespace("ns0", "urn:shop"),
        )],
    )
    .unwrap();

    assert_mismatch(
        run(
            &DomXmlMessageValidator,
            &xml(RECEIVED),
            None,
            &[ValidationContext::Xml(
                XmlValidationContext::new().control_namespace("ns0", "urn:other"),
            )],
        ),
        &["Namespace 'ns0' values not equal", "urn:shop", "urn:other"],
    );
}

#[test]
fn empty_received_payload_with_control() {
    assert_mismatch(
        run(
            &DomXmlMessageValidator,
            &Message::new("").with_type("XML"),
            Some(&Message::new("<a/>")),
            &[],
        ),
        &["received message payload was empty"],
    );
}

#[test]
fn malformed_control_is_a_payload_error() {
    let err = compare("<ns0:order", XmlValidationContext::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Payload);
}
