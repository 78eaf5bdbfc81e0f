use chrono::Utc;
use serde::{Deserialize, Serialize};
use testlog_dedupe::{Sighting, fully_qualified_name, lookup_or_reserve};
use testlog_duration::DurationNormalizer;
use testlog_error::{ErrorCategory, Result, ResultExt, validation_error};
use testlog_ports::{ContentStore, Ledger, LedgerTx};
use testlog_schema::case::{TestArtifact, TestCase, TestMessage};
use testlog_schema::diagnostic::Diagnostic;
use testlog_schema::result::ParsedTestResult;
use testlog_merge::{Incoming, merge_repeat};
use testlog_schema::step::{SourceArtifact, StepRef};
use testlog_stats::StepTally;

pub const DEFAULT_RESERVATION_ATTEMPTS: u32 = 3;

/// What one committed `save` did.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveReport {
    /// Results that created a test case.
    pub fresh: usize,
    /// Results merged into an existing test case of the job.
    pub repeats: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Ingests result batches of one step, parsed from one source artifact.
///
/// Every [`save`](Self::save) is one ledger transaction: on error nothing
/// from the batch is visible and the caller may retry it as a whole.
pub struct TestResultManager<'a, L: Ledger, C: ContentStore + ?Sized> {
    ledger: &'a mut L,
    content: &'a C,
    step: StepRef,
    source: SourceArtifact,
    normalizer: DurationNormalizer,
    reservation_attempts: u32,
}

impl<'a, L: Ledger, C: ContentStore + ?Sized> TestResultManager<'a, L, C> {
    pub fn new(ledger: &'a mut L, content: &'a C, step: StepRef, source: SourceArtifact) -> Self {
        Self {
            ledger,
            content,
            step,
            source,
            normalizer: DurationNormalizer::default(),
            reservation_attempts: DEFAULT_RESERVATION_ATTEMPTS,
        }
    }

    pub fn with_normalizer(mut self, normalizer: DurationNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_reservation_attempts(mut self, attempts: u32) -> Self {
        self.reservation_attempts = attempts.max(1);
        self
    }

    pub fn step(&self) -> &StepRef {
        &self.step
    }

    /// Ingest `batch` in order.
    ///
    /// Order decides which sighting of a name is the first one when the batch
    /// itself contains duplicates.
    pub fn save(&mut self, batch: &[ParsedTestResult]) -> Result<SaveReport> {
        let Self {
            ref mut ledger,
            content,
            ref step,
            ref source,
            ref normalizer,
            reservation_attempts,
        } = *self;

        let mut tx = ledger
            .begin()
            .categorize(ErrorCategory::Storage, "begin ingestion transaction")?;
        tx.register_source_artifact(source)
            .categorize(ErrorCategory::Storage, "register source artifact")?;

        let created_at = Utc::now();
        let mut tally = StepTally::new(step.id.clone());
        let mut report = SaveReport::default();

        for result in batch {
            let name = fully_qualified_name(result.package.as_deref(), &result.name);
            let duration = normalizer.normalize(&name, result.duration_ms);
            report.diagnostics.extend(duration.diagnostic);

            let artifacts = store_artifacts(content, &name, result)?;
            let messages = message_windows(source, &name, result)?;
            let candidate = TestCase::first_sighting(
                step,
                &name,
                result.outcome,
                result.message.clone(),
                duration.value,
                result.reruns,
                created_at,
            );

            let sighting = lookup_or_reserve(&mut tx, candidate, reservation_attempts)
                .categorize(ErrorCategory::Storage, "look up test case")
                .map_err(|e| e.with_context("test", name.clone()))?;

            match sighting {
                Sighting::Fresh(case) => {
                    persist_fresh(&mut tx, &case, &artifacts, &messages)
                        .categorize(ErrorCategory::Storage, "persist test case")
                        .map_err(|e| e.with_context("test", name.clone()))?;
                    tally.record_fresh(&case);
                    report.fresh += 1;
                }
                Sighting::Repeat(existing) => {
                    let plan = merge_repeat(
                        existing,
                        Incoming {
                            step,
                            artifacts,
                            messages,
                        },
                    );
                    plan.apply(&mut tx)
                        .categorize(ErrorCategory::Storage, "merge duplicate test")
                        .map_err(|e| e.with_context("test", name.clone()))?;
                    report.diagnostics.push(plan.diagnostic);
                    report.repeats += 1;
                }
            }
        }

        tally
            .apply(&mut tx)
            .categorize(ErrorCategory::Storage, "update step stats")?;
        tx.commit()
            .categorize(ErrorCategory::Storage, "commit ingestion transaction")
            .map_err(|e| e.with_context("step", step.id.to_string()))?;

        tracing::debug!(
            step = %step.id,
            job = %step.job_id,
            results = batch.len(),
            fresh = report.fresh,
            repeats = report.repeats,
            "saved batch"
        );
        Ok(report)
    }
}

/// Decode each attachment and write it to the content store.
fn store_artifacts<C: ContentStore + ?Sized>(
    content: &C,
    test: &str,
    result: &ParsedTestResult,
) -> Result<Vec<TestArtifact>> {
    result
        .artifacts
        .iter()
        .map(|payload| {
            let bytes = testlog_base64::decode_payload(test, payload)?;
            let blob = content
                .put(&bytes)
                .categorize(ErrorCategory::ContentStore, "store artifact payload")
                .map_err(|e| {
                    e.with_context("test", test)
                        .with_context("artifact", payload.name.clone())
                })?;
            Ok(TestArtifact {
                name: payload.name.clone(),
                media_type: payload.media_type.clone(),
                blob,
            })
        })
        .collect()
}

/// Attach each offset window to the batch's source artifact.
///
/// Windows must fit in a signed 64-bit range; anything past it cannot be a
/// real position in a stored artifact and is rejected before touching the ledger.
fn message_windows(
    source: &SourceArtifact,
    test: &str,
    result: &ParsedTestResult,
) -> Result<Vec<TestMessage>> {
    result
        .message_offsets
        .iter()
        .map(|offset| {
            let in_range = i64::try_from(offset.start_offset)
                .ok()
                .zip(i64::try_from(offset.length).ok())
                .and_then(|(start, length)| start.checked_add(length))
                .is_some();
            if !in_range {
                return Err(validation_error("message window out of range")
                    .with_context("test", test)
                    .with_context("label", offset.label.clone())
                    .with_context("start", offset.start_offset.to_string())
                    .with_context("length", offset.length.to_string()));
            }
            Ok(TestMessage {
                artifact_id: source.id.clone(),
                label: offset.label.clone(),
                start_offset: offset.start_offset,
                length: offset.length,
            })
        })
        .collect()
}

fn persist_fresh<T: LedgerTx + ?Sized>(
    tx: &mut T,
    case: &TestCase,
    artifacts: &[TestArtifact],
    messages: &[TestMessage],
) -> anyhow::Result<()> {
    if !artifacts.is_empty() {
        tx.append_artifacts(&case.id, artifacts)?;
    }
    if !messages.is_empty() {
        tx.append_messages(&case.id, messages)?;
    }
    Ok(())
}
