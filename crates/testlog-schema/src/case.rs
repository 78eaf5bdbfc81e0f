use crate::outcome::Outcome;
use crate::step::StepRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use testlog_ids::{ArtifactId, BlobRef, JobId, NameHash, ProjectId, StepId, TestCaseId};

/// The canonical record of one test within a job.
///
/// At most one exists per `(job_id, name)`. It is created by the first sighting of the
/// name anywhere in the job; the step of that sighting owns it. Later sightings only
/// mutate it through the merge path.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestCase {
    pub id: TestCaseId,
    pub job_id: JobId,
    /// Owning step: the step whose batch produced the first sighting.
    pub step_id: StepId,
    pub project_id: ProjectId,
    /// Fully-qualified name (`package.name`).
    pub name: String,
    pub name_hash: NameHash,
    pub outcome: Outcome,
    pub message: Option<String>,
    pub duration_ms: u32,
    pub reruns: u32,
    /// Step labels at which this name has been sighted, oldest first.
    /// Starts with the owning step's label.
    pub sightings: Vec<String>,
    /// Number of repeat sightings merged into this record.
    pub repeat_count: u32,
    pub created_at: DateTime<Utc>,
}

impl TestCase {
    /// Build the record a first sighting creates.
    #[allow(clippy::too_many_arguments)]
    pub fn first_sighting(
        step: &StepRef,
        fq_name: &str,
        outcome: Outcome,
        message: Option<String>,
        duration_ms: u32,
        reruns: u32,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TestCaseId::for_test(&step.job_id, fq_name),
            job_id: step.job_id.clone(),
            step_id: step.id.clone(),
            project_id: step.project_id.clone(),
            name: fq_name.to_string(),
            name_hash: NameHash::of(fq_name),
            outcome,
            message,
            duration_ms,
            reruns,
            sightings: vec![step.label.clone()],
            repeat_count: 0,
            created_at,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        self.repeat_count > 0
    }
}

/// A binary attachment of a test case. The payload lives in the content store.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestArtifact {
    pub name: String,
    pub media_type: String,
    pub blob: BlobRef,
}

/// A read window into a source artifact: `[start_offset, start_offset + length)`.
///
/// Long captured output (stdout/stderr) is never copied; it is materialized on demand.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestMessage {
    pub artifact_id: ArtifactId,
    pub label: String,
    pub start_offset: u64,
    pub length: u64,
}
