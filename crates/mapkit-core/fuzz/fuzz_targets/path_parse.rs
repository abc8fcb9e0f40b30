//! Fuzzing target for path parsing and lookup
//!
//! Any input must either parse or return an error, and a parsed path must
//! look up against a fixed document without panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use mapkit_core::path::Path;
use serde_json::json;

fuzz_target!(|data: &[u8]| {
    let source = String::from_utf8_lossy(data);
    if let Ok(path) = Path::parse(&source) {
        let document = json!({"a": {"b": [1, {"c": null}]}, "0": "zero", "a b": true});
        let _ = path.lookup(&document);
    }
});
