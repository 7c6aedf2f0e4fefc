use base64::{Engine, engine::general_purpose::STANDARD};
use citrus_validation::validator::MessageValidator;
use citrus_validation::validator::binary::{BinaryBase64MessageValidator, GzipBase64MessageValidator};
use citrus_validation::{Message, TestContext};
use flate2::Compression;
use flate2::write::GzEncoder;
use proptest::prelude::*;
use std::io::Write;

fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

proptest! {
    /// gzip(X) received against base64(X) control passes for any UTF-8 text.
    #[test]
    fn gzip_round_trip(text in "\\PC{1,64}") {
        let received = Message::new(gzip(text.as_bytes()));
        let control = Message::new(STANDARD.encode(text.as_bytes()));
        prop_assert!(
            GzipBase64MessageValidator::default()
                .validate_message(&received, Some(&control), &mut TestContext::new(), &[])
                .is_ok()
        );
    }

    /// Raw bytes received against their base64 control pass.
    #[test]
    fn binary_round_trip(bytes in prop::collection::vec(any::<u8>(), 1..64)) {
        let received = Message::new(bytes.clone());
        let control = Message::new(STANDARD.encode(&bytes));
        prop_assert!(
            BinaryBase64MessageValidator::default()
                .validate_message(&received, Some(&control), &mut TestContext::new(), &[])
                .is_ok()
        );
    }
}
