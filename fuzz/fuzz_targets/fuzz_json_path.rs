#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    // First byte picks the split point between expression and JSON document.
    let split = data[0] as usize % data.len();
    let (expression, json) = data[1..].split_at(split.min(data.len() - 1));

    let expression = String::from_utf8_lossy(expression);
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(json) {
        let _ = citrus_validation::json_path::evaluate_to_string(&value, &expression);
    }
});
