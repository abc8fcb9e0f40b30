//! Fuzzing target for the template sandbox
//!
//! Arbitrary template sources are compiled and rendered; the sandbox must
//! always answer with output or an error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use mapkit_core::template::TemplateSandbox;
use serde_json::json;

fuzz_target!(|data: &[u8]| {
    if let Ok(source) = std::str::from_utf8(data) {
        let context = json!({"a": "text", "n": 3, "items": [1, 2, 3], "nested": {"x": null}});
        let _ = TemplateSandbox::global().evaluate_str(source, &context);
    }
});
