//! Fuzz target: `ContentHash` and `JobId` hex rendering.

#![no_main]

use libfuzzer_sys::fuzz_target;
use texd_core::{ContentHash, JobId, JOB_ID_BYTES};

fuzz_target!(|data: &[u8]| {
    if data.len() < 32 {
        return;
    }
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&data[..32]);
    let hex = ContentHash::new(digest).to_string();
    assert_eq!(hex.len(), 64);
    assert!(hex.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));

    let mut id = [0u8; JOB_ID_BYTES];
    id.copy_from_slice(&data[..JOB_ID_BYTES]);
    assert_eq!(JobId(id).to_string().len(), JOB_ID_BYTES * 2);
});
