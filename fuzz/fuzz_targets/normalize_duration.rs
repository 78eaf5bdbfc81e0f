//! Fuzz harness for duration normalization.

#![no_main]

use libfuzzer_sys::fuzz_target;
use testlog_duration::{DurationNormalizer, MAX_DURATION_MS};

fuzz_target!(|raw: i64| {
    let normalized = DurationNormalizer::default().normalize("fuzz", raw);
    assert!(normalized.value <= MAX_DURATION_MS);
    assert_eq!(normalized.diagnostic.is_some(), normalized.value == 0 && raw != 0);
});
