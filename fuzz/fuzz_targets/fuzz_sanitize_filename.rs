//! Fuzz target: filename sanitisation.
//!
//! The output must be non-empty, bounded, idempotent, and contain only
//! `[A-Za-z0-9_-]`.

#![no_main]

use libfuzzer_sys::fuzz_target;
use texd_core::{BaseName, MAX_BASE_NAME_LEN};

fuzz_target!(|raw: &str| {
    let name = BaseName::sanitize(raw);
    let s = name.as_str();

    assert!(!s.is_empty());
    assert!(s.chars().count() <= MAX_BASE_NAME_LEN);
    assert!(s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
    assert_eq!(BaseName::sanitize(s), name, "sanitize must be idempotent");
});
