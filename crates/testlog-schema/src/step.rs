use serde::{Deserialize, Serialize};
use testlog_ids::{ArtifactId, BlobRef, JobId, ProjectId, StepId};

/// The build step a batch was produced by.
///
/// The job/project hierarchy itself is owned elsewhere; the ingestion engine only
/// needs these references plus a human label for collision diagnostics.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepRef {
    pub id: StepId,
    pub job_id: JobId,
    pub project_id: ProjectId,
    pub label: String,
}

/// The artifact a batch was parsed from (e.g. `junit.xml`).
///
/// Message windows point into its payload rather than copying text out of it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceArtifact {
    pub id: ArtifactId,
    pub step_id: StepId,
    pub name: String,
    /// Content store address of the raw file, when it was uploaded.
    pub blob: Option<BlobRef>,
}
