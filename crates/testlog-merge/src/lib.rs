//! Merge engine for repeat sightings.
//!
//! A test name reported twice within one job is an infrastructure problem,
//! not a flaky test. The canonical record is kept, forced to `failed`, and
//! its message is replaced by a list of every step that reported it.
//! Duration and reruns stay those of the first sighting.

use anyhow::Result;
use testlog_ids::StepId;
use testlog_ports::LedgerTx;
use testlog_schema::case::{TestArtifact, TestCase, TestMessage};
use testlog_schema::diagnostic::Diagnostic;
use testlog_schema::failure::FailureReason;
use testlog_schema::outcome::Outcome;
use testlog_schema::step::StepRef;

pub const DUPLICATE_HEADER: &str = "Error: Duplicate Test Name, reported at:\n";

/// The collision message: header, then one line per sighting label.
pub fn duplicate_message<S: AsRef<str>>(labels: &[S]) -> String {
    let mut message = String::from(DUPLICATE_HEADER);
    for label in labels {
        message.push_str(label.as_ref());
        message.push('\n');
    }
    message
}

/// A repeat sighting, with its artifacts already stored.
#[derive(Clone, Debug)]
pub struct Incoming<'a> {
    pub step: &'a StepRef,
    pub artifacts: Vec<TestArtifact>,
    pub messages: Vec<TestMessage>,
}

/// Everything a merge writes, computed up front.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergePlan {
    pub case: TestCase,
    pub artifacts: Vec<TestArtifact>,
    pub messages: Vec<TestMessage>,
    /// Attributed to the step that reported the repeat.
    pub failure_reason: FailureReason,
    /// Owning step whose failure counter must be corrected, if any.
    pub retroactive_failure: Option<StepId>,
    pub diagnostic: Diagnostic,
}

/// Fold `incoming` into `existing`.
///
/// The owning step is corrected only on the first repeat, and only if it
/// had counted the test as non-failed.
pub fn merge_repeat(existing: TestCase, incoming: Incoming<'_>) -> MergePlan {
    let mut case = existing;

    let retroactive_failure = (case.repeat_count == 0 && case.outcome != Outcome::Failed)
        .then(|| case.step_id.clone());

    if case.sightings.last() != Some(&incoming.step.label) {
        case.sightings.push(incoming.step.label.clone());
    }
    case.outcome = Outcome::Failed;
    case.repeat_count += 1;
    case.message = Some(duplicate_message(&case.sightings));

    tracing::info!(
        test = %case.name,
        owner = %case.step_id,
        reported_by = %incoming.step.id,
        repeats = case.repeat_count,
        "duplicate test name"
    );

    let diagnostic = Diagnostic::DuplicateTestName {
        test: case.name.clone(),
        owner_step: case.step_id.clone(),
        reported_by: incoming.step.id.clone(),
    };

    MergePlan {
        failure_reason: FailureReason::duplicate_test_name(
            incoming.step.id.clone(),
            incoming.step.job_id.clone(),
        ),
        retroactive_failure,
        diagnostic,
        artifacts: incoming.artifacts,
        messages: incoming.messages,
        case,
    }
}

impl MergePlan {
    pub fn apply<T: LedgerTx + ?Sized>(&self, tx: &mut T) -> Result<()> {
        tx.update_test_case(&self.case)?;
        if !self.artifacts.is_empty() {
            tx.append_artifacts(&self.case.id, &self.artifacts)?;
        }
        if !self.messages.is_empty() {
            tx.append_messages(&self.case.id, &self.messages)?;
        }
        tx.record_failure_reason(&self.failure_reason)?;
        if let Some(owner) = &self.retroactive_failure {
            testlog_stats::apply_retroactive_failure(tx, owner)?;
        }
        Ok(())
    }
}
