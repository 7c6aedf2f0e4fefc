#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use std::collections::BTreeMap;

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    expression: &'a str,
    document: &'a str,
}

const FALLBACK: &str = r#"<root xmlns:a="urn:a" id="1"><a:child n="2">text</a:child><!-- c --><b/></root>"#;

fuzz_target!(|input: Input<'_>| {
    let text = if roxmltree::Document::parse(input.document).is_ok() {
        input.document
    } else {
        FALLBACK
    };
    if let Ok(document) = roxmltree::Document::parse(text) {
        let _ = citrus_validation::xpath::evaluate_typed(&document, input.expression, &BTreeMap::new());
    }
});
