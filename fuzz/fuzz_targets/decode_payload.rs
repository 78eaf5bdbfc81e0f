//! Fuzz harness for artifact payload decoding.
//!
//! Anything that decodes must re-encode to the same bytes.

#![no_main]

use libfuzzer_sys::fuzz_target;
use testlog_schema::result::ArtifactPayload;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    let payload = ArtifactPayload {
        name: "fuzz".to_string(),
        media_type: "text".to_string(),
        base64: input.to_string(),
    };
    if let Ok(bytes) = testlog_base64::decode_payload("fuzz", &payload) {
        let again = testlog_base64::decode(&testlog_base64::encode(&bytes));
        assert_eq!(again.ok(), Some(bytes));
    }
});
