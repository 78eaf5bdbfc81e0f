use chrono::{DateTime, TimeZone, Utc};
use testlog_ids::{ArtifactId, JobId, ProjectId, StepId};
use testlog_schema::case::TestCase;
use testlog_schema::outcome::Outcome;
use testlog_schema::result::{ArtifactPayload, MessageOffset, ParsedTestResult};
use testlog_schema::step::{SourceArtifact, StepRef};

pub mod bdd;
pub mod memory;

pub use memory::{MemoryLedger, MemoryState};

/// Small helpers for building fixtures in tests.
///
/// Keeping these in a microcrate avoids copy-paste across dedupe/merge/engine tests.
pub fn step(job: &str, step: &str, label: &str) -> StepRef {
    StepRef {
        id: StepId::from(step),
        job_id: JobId::from(job),
        project_id: ProjectId::from("project"),
        label: label.to_string(),
    }
}

/// The source artifact a step's batch was parsed from.
pub fn source_artifact(step: &StepRef, name: &str) -> SourceArtifact {
    SourceArtifact {
        id: ArtifactId::new(format!("{}/{}", step.id, name)),
        step_id: step.id.clone(),
        name: name.to_string(),
        blob: None,
    }
}

pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

/// A freshly sighted test case owned by `step`.
pub fn test_case(step: &StepRef, fq_name: &str, outcome: Outcome) -> TestCase {
    TestCase::first_sighting(step, fq_name, outcome, None, 0, 0, fixed_time())
}

/// Builder for [`ParsedTestResult`] with the defaults a passing test would have.
#[derive(Clone, Debug)]
pub struct ResultBuilder {
    result: ParsedTestResult,
}

impl ResultBuilder {
    pub fn new(package: &str, name: &str) -> Self {
        Self {
            result: ParsedTestResult::new(package, name, Outcome::Passed),
        }
    }

    /// A result without a package (flat suites).
    pub fn bare(name: &str) -> Self {
        let mut result = ParsedTestResult::new("", name, Outcome::Passed);
        result.package = None;
        Self { result }
    }

    pub fn outcome(mut self, outcome: Outcome) -> Self {
        self.result.outcome = outcome;
        self
    }

    pub fn failed(self) -> Self {
        self.outcome(Outcome::Failed)
    }

    pub fn skipped(self) -> Self {
        self.outcome(Outcome::Skipped)
    }

    pub fn message(mut self, message: &str) -> Self {
        self.result.message = Some(message.to_string());
        self
    }

    pub fn duration(mut self, ms: i64) -> Self {
        self.result.duration_ms = ms;
        self
    }

    pub fn reruns(mut self, reruns: u32) -> Self {
        self.result.reruns = reruns;
        self
    }

    /// Attach `payload`, base64-encoded the way results files carry it.
    pub fn artifact(self, name: &str, media_type: &str, payload: &[u8]) -> Self {
        let encoded = testlog_base64::encode(payload);
        self.raw_artifact(name, media_type, &encoded)
    }

    /// Attach an already-encoded (possibly malformed) payload.
    pub fn raw_artifact(mut self, name: &str, media_type: &str, base64: &str) -> Self {
        self.result.artifacts.push(ArtifactPayload {
            name: name.to_string(),
            media_type: media_type.to_string(),
            base64: base64.to_string(),
        });
        self
    }

    pub fn message_offset(mut self, label: &str, start_offset: u64, length: u64) -> Self {
        self.result.message_offsets.push(MessageOffset {
            label: label.to_string(),
            start_offset,
            length,
        });
        self
    }

    pub fn build(self) -> ParsedTestResult {
        self.result
    }
}
