//! Fuzz harness for JSONL result files.
//!
//! Target: `testlog_ingest_json::parse_results`

#![no_main]

use libfuzzer_sys::fuzz_target;
use testlog_ingest_json::parse_results;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(results) = parse_results(input) {
        assert!(results.len() <= input.lines().count());
    }
});
