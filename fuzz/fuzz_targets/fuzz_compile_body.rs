//! Fuzz target: `/compile` payload validation.
//!
//! Any byte sequence that decodes as JSON must validate to either a request
//! with a non-empty source and a safe base name, or an error. Never a panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use texd_core::CompileRequest;

fuzz_target!(|data: &[u8]| {
    let Ok(payload) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };
    if let Ok(request) = CompileRequest::from_json(&payload) {
        assert!(!request.source.is_empty());
        assert!(!request.base_name.as_str().is_empty());
        assert!(request
            .base_name
            .as_str()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
    }
});
