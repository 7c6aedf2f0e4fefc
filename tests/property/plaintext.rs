use citrus_validation::validator::plaintext::PlainTextMessageValidator;
use citrus_validation::{TestContext, ValidationError};
use proptest::prelude::*;

fn words() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-zA-Z0-9]{1,8}", 2..6)
}

proptest! {
    /// Inner whitespace differences are reported as whitespace-only mismatches.
    #[test]
    fn whitespace_only_differences_are_flagged(
        words in words(),
        gaps in prop::collection::vec("[ \t\n]{2,4}", 5),
    ) {
        let control = words.join(" ");
        let mut received = words[0].clone();
        for (word, gap) in words.iter().skip(1).zip(gaps.iter().cycle()) {
            received.push_str(gap);
            received.push_str(word);
        }

        let err = PlainTextMessageValidator::default()
            .validate_text(&received, &control, &mut TestContext::new())
            .unwrap_err();
        let is_whitespace_mismatch = matches!(err, ValidationError::WhitespaceMismatch { .. });
        prop_assert!(is_whitespace_mismatch);
        prop_assert!(err.to_string().contains(&control));

        PlainTextMessageValidator::default()
            .ignore_whitespace(true)
            .validate_text(&received, &control, &mut TestContext::new())
            .unwrap();
    }

    /// Equal text always passes.
    #[test]
    fn equal_text_passes(text in "[a-zA-Z0-9 .,!?]{1,40}") {
        prop_assert!(
            PlainTextMessageValidator::default()
                .validate_text(&text, &text, &mut TestContext::new())
                .is_ok()
        );
    }
}
