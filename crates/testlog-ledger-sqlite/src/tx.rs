use crate::rows::load_cases;
use anyhow::{Context, Result, bail};
use rusqlite::{Transaction, params};
use testlog_ids::{JobId, StepId, TestCaseId};
use testlog_ports::LedgerTx;
use testlog_schema::case::{TestArtifact, TestCase, TestMessage};
use testlog_schema::failure::FailureReason;
use testlog_schema::stat::StatName;
use testlog_schema::step::SourceArtifact;

/// One `BEGIN IMMEDIATE` transaction. Dropping it rolls back.
pub struct SqliteLedgerTx<'a> {
    pub(crate) tx: Transaction<'a>,
}

impl LedgerTx for SqliteLedgerTx<'_> {
    fn find_test_case(&mut self, job: &JobId, name: &str) -> Result<Option<TestCase>> {
        let mut cases = load_cases(
            &self.tx,
            "WHERE job_id = ?1 AND name = ?2",
            params![job.as_str(), name],
        )?;
        Ok(cases.pop())
    }

    fn insert_test_case(&mut self, case: &TestCase) -> Result<bool> {
        let sightings = serde_json::to_string(&case.sightings).context("encode sightings")?;
        // No conflict target: the id is derived from (job_id, name), so
        // either uniqueness constraint firing means the slot is taken.
        let inserted = self
            .tx
            .execute(
                "INSERT INTO test_cases (id, job_id, step_id, project_id, name, name_hash,
                     outcome, message, duration_ms, reruns, sightings, repeat_count, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT DO NOTHING",
                params![
                    case.id.as_str(),
                    case.job_id.as_str(),
                    case.step_id.as_str(),
                    case.project_id.as_str(),
                    case.name,
                    case.name_hash.as_str(),
                    case.outcome.as_str(),
                    case.message,
                    case.duration_ms,
                    case.reruns,
                    sightings,
                    case.repeat_count,
                    case.created_at,
                ],
            )
            .with_context(|| format!("insert test case {}", case.name))?;
        Ok(inserted == 1)
    }

    fn update_test_case(&mut self, case: &TestCase) -> Result<()> {
        let sightings = serde_json::to_string(&case.sightings).context("encode sightings")?;
        let updated = self
            .tx
            .execute(
                "UPDATE test_cases
                 SET outcome = ?1, message = ?2, sightings = ?3, repeat_count = ?4
                 WHERE id = ?5",
                params![
                    case.outcome.as_str(),
                    case.message,
                    sightings,
                    case.repeat_count,
                    case.id.as_str(),
                ],
            )
            .with_context(|| format!("update test case {}", case.name))?;
        if updated != 1 {
            bail!("test case {} ({}) does not exist", case.name, case.id);
        }
        Ok(())
    }

    fn append_artifacts(&mut self, case: &TestCaseId, artifacts: &[TestArtifact]) -> Result<()> {
        let mut stmt = self.tx.prepare_cached(
            "INSERT INTO test_artifacts (test_case_id, name, media_type, blob)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for artifact in artifacts {
            stmt.execute(params![
                case.as_str(),
                artifact.name,
                artifact.media_type,
                artifact.blob.as_str(),
            ])
            .with_context(|| format!("insert artifact {} of {case}", artifact.name))?;
        }
        Ok(())
    }

    fn append_messages(&mut self, case: &TestCaseId, messages: &[TestMessage]) -> Result<()> {
        let mut stmt = self.tx.prepare_cached(
            "INSERT INTO test_messages (test_case_id, artifact_id, label, start_offset, length)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        for message in messages {
            let start = i64::try_from(message.start_offset)
                .with_context(|| format!("message {} offset out of range", message.label))?;
            let length = i64::try_from(message.length)
                .with_context(|| format!("message {} length out of range", message.label))?;
            stmt.execute(params![
                case.as_str(),
                message.artifact_id.as_str(),
                message.label,
                start,
                length,
            ])
            .with_context(|| format!("insert message {} of {case}", message.label))?;
        }
        Ok(())
    }

    fn record_failure_reason(&mut self, reason: &FailureReason) -> Result<()> {
        self.tx
            .execute(
                "INSERT INTO failure_reasons (step_id, job_id, reason) VALUES (?1, ?2, ?3)
                 ON CONFLICT(step_id, reason) DO NOTHING",
                params![
                    reason.step_id.as_str(),
                    reason.job_id.as_str(),
                    reason.reason.as_str(),
                ],
            )
            .with_context(|| format!("record failure reason for step {}", reason.step_id))?;
        Ok(())
    }

    fn increment_stat(&mut self, step: &StepId, stat: StatName, by: i64) -> Result<()> {
        self.tx
            .execute(
                "INSERT INTO item_stats (item_id, name, value) VALUES (?1, ?2, ?3)
                 ON CONFLICT(item_id, name) DO UPDATE SET value = value + excluded.value",
                params![step.as_str(), stat.as_str(), by],
            )
            .with_context(|| format!("increment {stat} for step {step}"))?;
        Ok(())
    }

    fn register_source_artifact(&mut self, artifact: &SourceArtifact) -> Result<()> {
        self.tx
            .execute(
                "INSERT INTO source_artifacts (id, step_id, name, blob) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                     step_id = excluded.step_id,
                     name = excluded.name,
                     blob = COALESCE(excluded.blob, source_artifacts.blob)",
                params![
                    artifact.id.as_str(),
                    artifact.step_id.as_str(),
                    artifact.name,
                    artifact.blob.as_ref().map(|b| b.as_str()),
                ],
            )
            .with_context(|| format!("register source artifact {}", artifact.id))?;
        Ok(())
    }

    fn commit(self) -> Result<()> {
        self.tx.commit().context("commit ingestion transaction")
    }
}
