//! Duration normalization.
//!
//! Reporters occasionally emit garbage durations (negative values, overflowed
//! counters). Those are replaced with 0 and reported as a
//! [`Diagnostic::DurationOutOfRange`]; ingestion never fails because of them.

use testlog_schema::diagnostic::Diagnostic;

/// Largest storable duration in milliseconds: a signed 32-bit column.
pub const MAX_DURATION_MS: u32 = i32::MAX as u32;

/// Result of normalizing one raw duration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Normalized {
    pub value: u32,
    pub diagnostic: Option<Diagnostic>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DurationNormalizer {
    max: u32,
}

impl Default for DurationNormalizer {
    fn default() -> Self {
        Self {
            max: MAX_DURATION_MS,
        }
    }
}

impl DurationNormalizer {
    pub fn with_max(max: u32) -> Self {
        Self { max }
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    /// Map `raw` into `[0, max]`, substituting 0 for anything outside.
    pub fn normalize(&self, test: &str, raw: i64) -> Normalized {
        match u32::try_from(raw) {
            Ok(value) if value <= self.max => Normalized {
                value,
                diagnostic: None,
            },
            _ => {
                tracing::warn!(
                    test,
                    raw,
                    max = self.max,
                    "duration out of range, storing 0"
                );
                Normalized {
                    value: 0,
                    diagnostic: Some(Diagnostic::DurationOutOfRange {
                        test: test.to_string(),
                        raw,
                        max: self.max,
                    }),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_range_passes_through() {
        let n = DurationNormalizer::default().normalize("pkg.test_foo", 134);
        assert_eq!(n.value, 134);
        assert!(n.diagnostic.is_none());
    }

    #[test]
    fn bounds_are_inclusive() {
        let normalizer = DurationNormalizer::default();
        assert_eq!(normalizer.normalize("t", 0).value, 0);
        assert!(normalizer.normalize("t", 0).diagnostic.is_none());
        let top = normalizer.normalize("t", i64::from(MAX_DURATION_MS));
        assert_eq!(top.value, MAX_DURATION_MS);
        assert!(top.diagnostic.is_none());
    }

    #[test]
    fn overflowed_counter_becomes_zero() {
        let raw = 2_147_483_647_i64 * 2;
        let n = DurationNormalizer::default().normalize("pkg.test_bar", raw);
        assert_eq!(n.value, 0);
        assert_eq!(
            n.diagnostic,
            Some(Diagnostic::DurationOutOfRange {
                test: "pkg.test_bar".to_string(),
                raw,
                max: MAX_DURATION_MS,
            })
        );
    }

    #[test]
    fn negative_becomes_zero() {
        let n = DurationNormalizer::default().normalize("t", -5);
        assert_eq!(n.value, 0);
        assert!(n.diagnostic.is_some());
    }

    #[test]
    fn custom_bound() {
        let normalizer = DurationNormalizer::with_max(1_000);
        assert_eq!(normalizer.normalize("t", 1_000).value, 1_000);
        assert_eq!(normalizer.normalize("t", 1_001).value, 0);
    }
}
