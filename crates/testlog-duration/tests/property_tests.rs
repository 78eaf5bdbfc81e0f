use proptest::prelude::*;
use testlog_duration::{DurationNormalizer, MAX_DURATION_MS};

proptest! {
    #[test]
    fn prop_result_always_in_range(raw in any::<i64>()) {
        let n = DurationNormalizer::default().normalize("t", raw);
        prop_assert!(n.value <= MAX_DURATION_MS);
    }

    #[test]
    fn prop_diagnostic_iff_clamped(raw in any::<i64>()) {
        let n = DurationNormalizer::default().normalize("t", raw);
        let in_range = (0..=i64::from(MAX_DURATION_MS)).contains(&raw);
        prop_assert_eq!(n.diagnostic.is_none(), in_range);
        if in_range {
            prop_assert_eq!(i64::from(n.value), raw);
        } else {
            prop_assert_eq!(n.value, 0);
        }
    }
}
