use citrus_validation::TestContext;
use citrus_validation::placeholder::resolve;
use citrus_validation::validator::validate_value;
use proptest::prelude::*;

proptest! {
    /// A control value of only `@ignore@` accepts anything.
    #[test]
    fn whole_ignore_accepts_any_value(actual in ".*") {
        let mut context = TestContext::new();
        prop_assert!(validate_value("field", &actual, "@ignore@", &mut context).is_ok());
        prop_assert!(validate_value("field", &actual, "  @ignore@ ", &mut context).is_ok());
    }

    /// `@ignore(N)@` consumes exactly N characters, clamped to the actual value.
    #[test]
    fn counted_ignore_consumes_n_chars(
        prefix in "[a-z]{0,8}",
        middle in "[A-Z0-9 ]{0,8}",
        n in 0usize..12,
    ) {
        let actual = format!("{}{}", prefix, middle);
        let control = format!("{}@ignore({})@", prefix, n);
        let resolved = resolve(&control, &actual, &mut TestContext::new()).unwrap();
        let taken: String = middle.chars().take(n).collect();
        prop_assert_eq!(resolved, format!("{}{}", prefix, taken));
    }

    /// Counted ignores in front of a suffix line the control up with the received value.
    #[test]
    fn counted_ignore_between_literals(
        head in "[a-z]{1,6}",
        hidden in "[0-9]{1,6}",
        tail in "[a-z]{1,6}",
    ) {
        let actual = format!("{}{}{}", head, hidden, tail);
        let control = format!("{}@ignore({})@{}", head, hidden.len(), tail);
        prop_assert!(validate_value("field", &actual, &control, &mut TestContext::new()).is_ok());
    }

    /// An oversized count stops where the literal suffix of the control begins.
    #[test]
    fn oversized_counted_ignore_keeps_the_suffix(
        head in "[a-z]{1,6}",
        hidden in "[0-9]{0,4}",
        tail in "[A-Z]{1,6}",
        extra in 1usize..6,
    ) {
        let actual = format!("{}{}{}", head, hidden, tail);
        let control = format!("{}@ignore({})@{}", head, hidden.len() + extra, tail);
        let resolved = resolve(&control, &actual, &mut TestContext::new()).unwrap();
        prop_assert_eq!(resolved, actual);
    }

    /// `@variable@` binds the token run at its offset.
    #[test]
    fn variable_binds_the_captured_run(
        head in "[a-z]{0,6}=",
        value in "[a-zA-Z0-9_.-]{1,12}",
    ) {
        let actual = format!("{};", head.clone() + &value);
        let control = format!("{}@variable('captured')@;", head);
        let mut context = TestContext::new();
        prop_assert!(validate_value("field", &actual, &control, &mut context).is_ok());
        prop_assert_eq!(context.get_variable("captured"), Some(value.as_str()));
    }

    /// Controls without tokens come back unchanged.
    #[test]
    fn token_free_control_is_unchanged(control in "[a-zA-Z0-9 ,.;:]{0,30}", actual in ".{0,30}") {
        let resolved = resolve(&control, &actual, &mut TestContext::new()).unwrap();
        prop_assert_eq!(resolved, control);
    }
}

#[test]
fn short_actual_is_clamped_to_the_substituted_run() {
    let mut context = TestContext::new();
    assert_eq!(resolve("AB@ignore(2)@CD", "ABxCD", &mut context).unwrap(), "ABxCD");
    assert!(validate_value("field", "ABxCD", "AB@ignore(2)@CD", &mut context).is_ok());
}
