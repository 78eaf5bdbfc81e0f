use serde::{Deserialize, Serialize};
use std::fmt;
use testlog_ids::{JobId, StepId};

/// Ingestion-time anomaly codes. Distinct from a test's own outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReasonCode {
    DuplicateTestName,
}

impl FailureReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReasonCode::DuplicateTestName => "duplicate_test_name",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "duplicate_test_name" => Some(FailureReasonCode::DuplicateTestName),
            _ => None,
        }
    }
}

impl fmt::Display for FailureReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure reason recorded against the step whose batch *detected* the anomaly.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailureReason {
    pub step_id: StepId,
    pub job_id: JobId,
    pub reason: FailureReasonCode,
}

impl FailureReason {
    pub fn duplicate_test_name(step_id: StepId, job_id: JobId) -> Self {
        Self {
            step_id,
            job_id,
            reason: FailureReasonCode::DuplicateTestName,
        }
    }
}
