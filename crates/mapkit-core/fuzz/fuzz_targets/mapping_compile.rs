//! Fuzzing target for mapping compilation and resolution
//!
//! Bytes that decode as JSON are compiled as a mapping and, when valid,
//! resolved against themselves.

#![no_main]

use libfuzzer_sys::fuzz_target;
use mapkit_core::Mapping;
use serde_json::Value;

fuzz_target!(|data: &[u8]| {
    if let Ok(value) = serde_json::from_slice::<Value>(data) {
        if let Ok(mapping) = Mapping::compile(&value) {
            let _ = mapping.resolve(&value);
        }
    }
});
