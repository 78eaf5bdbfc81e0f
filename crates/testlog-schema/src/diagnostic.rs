use serde::{Deserialize, Serialize};
use std::fmt;
use testlog_ids::StepId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
}

/// Something ingestion noticed and handled without failing the batch.
///
/// Returned to callers alongside the commit so they can be asserted on;
/// the same events are also logged.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A duration outside `[0, max]` was replaced with 0.
    DurationOutOfRange { test: String, raw: i64, max: u32 },
    /// A test name was reported again within the same job.
    DuplicateTestName {
        test: String,
        owner_step: StepId,
        reported_by: StepId,
    },
}

impl Diagnostic {
    pub fn severity(&self) -> Severity {
        match self {
            Diagnostic::DurationOutOfRange { .. } => Severity::Warning,
            Diagnostic::DuplicateTestName { .. } => Severity::Info,
        }
    }

    pub fn test_name(&self) -> &str {
        match self {
            Diagnostic::DurationOutOfRange { test, .. } => test,
            Diagnostic::DuplicateTestName { test, .. } => test,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::DurationOutOfRange { test, raw, max } => {
                write!(f, "{test}: duration {raw} outside [0, {max}], stored as 0")
            }
            Diagnostic::DuplicateTestName {
                test,
                owner_step,
                reported_by,
            } => write!(
                f,
                "{test}: duplicate test name (owned by step {owner_step}, reported again by step {reported_by})"
            ),
        }
    }
}
