#![no_main]

use arbitrary::Arbitrary;
use citrus_validation::TestContext;
use citrus_validation::validator::validate_value;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    control: &'a str,
    actual: &'a str,
}

fuzz_target!(|input: Input<'_>| {
    let mut context = TestContext::new();
    let _ = citrus_validation::placeholder::resolve(input.control, input.actual, &mut context);
    let _ = validate_value("fuzz", input.actual, input.control, &mut context);
});
