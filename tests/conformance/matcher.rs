use citrus_validation::matcher::{MatcherLibrary, MatcherRegistry, ValidationMatcher, matcher_failure};
use citrus_validation::validator::validate_value;
use citrus_validation::{ErrorKind, ReferenceResolver, TestContext, ValidationError};
use std::sync::Arc;

fn check(actual: &str, expected: &str) -> Result<(), ValidationError> {
    validate_value("field", actual, expected, &mut TestContext::new())
}

#[test]
fn default_library_matchers() {
    check("Hello World", "@contains('lo Wo')@").unwrap();
    check("HELLO", "@equalsIgnoreCase('hello')@").unwrap();
    check("12", "@greaterThan(5)@").unwrap();
    check("3", "@lowerThan(5)@").unwrap();
    check("abc-123", "@matches('[a-z]+-\\d+')@").unwrap();
    check("2024-02-29", "@matchesDatePattern('yyyy-MM-dd')@").unwrap();
    check("four", "@stringLength(4)@").unwrap();
    check("", "@isEmpty()@").unwrap();
    check("x", "@notEmpty()@").unwrap();
    check("42.5", "@isNumber()@").unwrap();
    check(" padded ", "@trim('padded')@").unwrap();
    check("a b\tc", "@trimAllWhitespaces('abc')@").unwrap();
}

#[test]
fn chained_matchers_must_all_pass() {
    check("citrus", "@startsWith('cit')@ @endsWith('rus')@").unwrap();
    let err = check("citrus", "@startsWith('cit')@ @endsWith('xyz')@").unwrap_err();
    assert!(err.is_mismatch());
    assert!(err.to_string().contains("'citrus'"), "{err}");
}

#[test]
fn failing_matcher_names_field_and_values() {
    let err = check("3", "@greaterThan(5)@").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Mismatch);
    let message = err.to_string();
    assert!(message.contains("greaterThan"), "{message}");
    assert!(message.contains("'field'"), "{message}");
    assert!(message.contains("'3'"), "{message}");
}

#[test]
fn unknown_matcher_is_a_configuration_error() {
    let err = check("x", "@sparkles()@").unwrap_err();
    assert_eq!(err.to_string(), "Unknown validation matcher 'sparkles'");
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn matcher_arguments_expand_variables() {
    let mut context = TestContext::new();
    context.set_variable("prefix", "Hel").unwrap();
    validate_value("greeting", "Hello", "@startsWith('${prefix}')@", &mut context).unwrap();
}

struct Even;

impl ValidationMatcher for Even {
    fn validate(
        &self,
        field: &str,
        actual: &str,
        _args: &[String],
        _context: &mut TestContext,
    ) -> Result<(), ValidationError> {
        match actual.parse::<i64>() {
            Ok(n) if n % 2 == 0 => Ok(()),
            _ => Err(matcher_failure("even", field, actual, "an even number")),
        }
    }
}

#[test]
fn custom_library_under_prefix() {
    let registry = MatcherRegistry::default()
        .with_library(MatcherLibrary::new("numbers", "num").with_matcher("even", Even));
    let references = Arc::new(ReferenceResolver::new().with_matchers(registry));
    let mut context = TestContext::with_references(references);

    validate_value("count", "42", "@num:even()@", &mut context).unwrap();
    let err = validate_value("count", "41", "@num:even()@", &mut context).unwrap_err();
    assert!(err.is_mismatch());
    validate_value("count", "41", "@greaterThan(40)@", &mut context).unwrap();

    let err = validate_value("count", "41", "@other:even()@", &mut context).unwrap_err();
    assert_eq!(err.to_string(), "Unknown validation matcher 'other:even'");
}

#[test]
fn variable_matcher_binds_the_whole_value() {
    let mut context = TestContext::new();
    validate_value("id", "4711", "@variable('orderId')@", &mut context).unwrap();
    assert_eq!(context.get_variable("orderId"), Some("4711"));
}
