use super::common::{assert_mismatch, run};
use base64::{Engine, engine::general_purpose::STANDARD};
use citrus_validation::validator::binary::{BinaryBase64MessageValidator, GzipBase64MessageValidator};
use citrus_validation::validator::plaintext::PlainTextMessageValidator;
use citrus_validation::{ErrorKind, Message, TestContext, ValidationError, ValidationSettings};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;

fn plaintext(received: &str, control: &str) -> Result<TestContext, ValidationError> {
    run(
        &PlainTextMessageValidator::default(),
        &Message::new(received),
        Some(&Message::new(control)),
        &[],
    )
}

#[test]
fn missing_control_is_not_validated() {
    run(&PlainTextMessageValidator::default(), &Message::new("anything"), None, &[]).unwrap();
    plaintext("anything", "").unwrap();
}

#[test]
fn mismatch_embeds_both_payloads() {
    assert_mismatch(
        plaintext("Hello Citrus", "Hello World"),
        &["Text values not equal", "'Hello World'", "'Hello Citrus'"],
    );
}

#[test]
fn whitespace_only_difference_has_its_own_diagnostic() {
    let err = plaintext("Hello  World", "Hello World").unwrap_err();
    assert!(matches!(err, ValidationError::WhitespaceMismatch { .. }));
    assert!(err.to_string().contains("text differs in only whitespaces"));
    assert!(err.is_mismatch());
}

#[test]
fn whitespace_and_new_line_switches() {
    let settings = ValidationSettings {
        ignore_whitespace: true,
        ..ValidationSettings::default()
    };
    let validator = PlainTextMessageValidator::new(&settings);
    run(
        &validator,
        &Message::new("Hello \n\t World"),
        Some(&Message::new("Hello World")),
        &[],
    )
    .unwrap();

    let validator = PlainTextMessageValidator::default().ignore_new_line_type(true);
    run(
        &validator,
        &Message::new("line1\r\nline2"),
        Some(&Message::new("line1\nline2")),
        &[],
    )
    .unwrap();
}

#[test]
fn ignore_tokens_and_variables() {
    plaintext("Hello Citrus, time is 10:15", "Hello @ignore@, time is @ignore(5)@").unwrap();
    plaintext("ABxyCD", "AB@ignore(2)@CD").unwrap();
    let context = plaintext("id=42;", "id=@variable('orderId')@;").unwrap();
    assert_eq!(context.get_variable("orderId"), Some("42"));
}

#[test]
fn counted_ignore_is_clamped_before_the_literal_suffix() {
    plaintext("ABxCD", "AB@ignore(2)@CD").unwrap();
    assert_mismatch(plaintext("ABxZ", "AB@ignore(2)@CD"), &["expected 'ABCD' but was 'ABxZ'"]);
}

#[test]
fn positional_tokens_resolve_like_field_values() {
    use citrus_validation::validator::validate_value;

    let err = plaintext("abcd", "@ignore(2)@").unwrap_err();
    let field_err = validate_value("code", "abcd", "@ignore(2)@", &mut TestContext::new()).unwrap_err();
    assert!(err.to_string().contains("expected 'ab' but was 'abcd'"), "{err}");
    assert!(field_err.to_string().contains("expected 'ab' but was 'abcd'"), "{field_err}");
}

#[test]
fn only_ignore_control_passes_for_any_payload() {
    plaintext("whatever the system answers", "@ignore@").unwrap();
}

#[test]
fn dynamic_content_is_expanded_first() {
    let mut context = TestContext::new();
    context.set_variable("user", "Penny").unwrap();
    PlainTextMessageValidator::default()
        .validate_text("Hello Penny", "Hello ${user}", &mut context)
        .unwrap();

    let err = PlainTextMessageValidator::default()
        .validate_text("Hello Penny", "Hello ${unknown}", &mut TestContext::new())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn whole_payload_matcher() {
    plaintext("Hello World", "@startsWith('Hello')@").unwrap();
    assert_mismatch(plaintext("Bye World", "@startsWith('Hello')@"), &["Bye World"]);
}

#[test]
fn binary_payload_is_compared_as_base64() {
    let received = Message::new(b"Hello World".to_vec());
    let control = Message::new(STANDARD.encode("Hello World"));
    run(&BinaryBase64MessageValidator::default(), &received, Some(&control), &[]).unwrap();

    let control = Message::new(STANDARD.encode("Hello Citrus"));
    assert_mismatch(
        run(&BinaryBase64MessageValidator::default(), &received, Some(&control), &[]),
        &[&STANDARD.encode("Hello World")],
    );
}

#[test]
fn gzip_payload_is_unzipped_then_compared() {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(b"Hello World").unwrap();
    let received = Message::new(encoder.finish().unwrap());
    let control = Message::new(STANDARD.encode("Hello World"));
    run(&GzipBase64MessageValidator::default(), &received, Some(&control), &[]).unwrap();
}

#[test]
fn broken_gzip_is_a_resource_error() {
    let received = Message::new(b"not gzip".to_vec());
    let control = Message::new(STANDARD.encode("x"));
    let err = run(&GzipBase64MessageValidator::default(), &received, Some(&control), &[])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resource);
    assert!(std::error::Error::source(&err).is_some());
}
