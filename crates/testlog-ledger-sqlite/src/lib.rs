//! SQLite-backed [`Ledger`].
//!
//! One connection per writer. Each ingestion batch runs in a `BEGIN IMMEDIATE`
//! transaction, so concurrent writers to the same database file serialize on
//! the write lock (bounded by the busy timeout) instead of failing on upgrade.

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use std::path::Path;
use std::time::Duration;
use testlog_ids::{ArtifactId, JobId, NameHash, ProjectId, StepId, TestCaseId};
use testlog_ports::Ledger;
use testlog_schema::case::{TestArtifact, TestCase, TestMessage};
use testlog_schema::failure::FailureReason;
use testlog_schema::stat::{ItemStat, StatName, StepStats};
use testlog_schema::step::SourceArtifact;

mod rows;
mod schema;
mod tx;

pub use tx::SqliteLedgerTx;

use rows::{
    artifact_from_row, failure_reason, item_stat, load_cases, message_from_row,
    source_artifact_from_row,
};

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5_000);

#[derive(Debug)]
pub struct SqliteLedger {
    conn: Connection,
}

impl SqliteLedger {
    /// Open or create a ledger database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .with_context(|| format!("open ledger database {}", path.display()))?;
        conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
        let mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .context("enable WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        let ledger = Self { conn };
        ledger.init()?;
        tracing::debug!(path = %path.display(), journal_mode = %mode, "opened ledger");
        Ok(ledger)
    }

    /// Create an in-memory ledger (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory ledger")?;
        let ledger = Self { conn };
        ledger.init()?;
        Ok(ledger)
    }

    pub fn with_busy_timeout(self, timeout: Duration) -> Result<Self> {
        self.conn.busy_timeout(timeout)?;
        Ok(self)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .pragma_update(None, "foreign_keys", true)
            .context("enable foreign keys")?;
        self.conn
            .execute_batch(schema::SCHEMA)
            .context("create ledger schema")?;
        Ok(())
    }

    /// All test cases of a job, in creation order.
    pub fn test_cases_for_job(&self, job: &JobId) -> Result<Vec<TestCase>> {
        load_cases(
            &self.conn,
            "WHERE job_id = ?1 ORDER BY rowid",
            params![job.as_str()],
        )
    }

    pub fn test_case(&self, job: &JobId, name: &str) -> Result<Option<TestCase>> {
        let mut cases = load_cases(
            &self.conn,
            "WHERE job_id = ?1 AND name = ?2",
            params![job.as_str(), name],
        )?;
        Ok(cases.pop())
    }

    /// Artifacts of a test case in arrival order.
    pub fn artifacts(&self, case: &TestCaseId) -> Result<Vec<TestArtifact>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT name, media_type, blob FROM test_artifacts
             WHERE test_case_id = ?1 ORDER BY seq",
        )?;
        let artifacts = stmt
            .query_map(params![case.as_str()], artifact_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(artifacts)
    }

    /// Message windows of a test case in arrival order.
    pub fn messages(&self, case: &TestCaseId) -> Result<Vec<TestMessage>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT artifact_id, label, start_offset, length FROM test_messages
             WHERE test_case_id = ?1 ORDER BY seq",
        )?;
        let messages = stmt
            .query_map(params![case.as_str()], message_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(messages)
    }

    /// A single counter, `None` if the row was never written.
    pub fn stat(&self, step: &StepId, name: StatName) -> Result<Option<i64>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM item_stats WHERE item_id = ?1 AND name = ?2",
                params![step.as_str(), name.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn item_stats(&self, step: &StepId) -> Result<Vec<ItemStat>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT item_id, name, value FROM item_stats WHERE item_id = ?1 ORDER BY name",
        )?;
        let rows = stmt
            .query_map(params![step.as_str()], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<rusqlite::Result<Vec<(String, String, i64)>>>()?;
        rows.into_iter()
            .map(|(item_id, name, value)| item_stat(item_id, name, value))
            .collect()
    }

    pub fn step_stats(&self, step: &StepId) -> Result<StepStats> {
        Ok(StepStats::from_rows(&self.item_stats(step)?))
    }

    pub fn failure_reasons(&self, step: &StepId) -> Result<Vec<FailureReason>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT step_id, job_id, reason FROM failure_reasons WHERE step_id = ?1 ORDER BY reason",
        )?;
        let rows = stmt
            .query_map(params![step.as_str()], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<rusqlite::Result<Vec<(String, String, String)>>>()?;
        rows.into_iter()
            .map(|(step_id, job_id, reason)| failure_reason(step_id, job_id, reason))
            .collect()
    }

    pub fn source_artifact(&self, id: &ArtifactId) -> Result<Option<SourceArtifact>> {
        let artifact = self
            .conn
            .query_row(
                "SELECT id, step_id, name, blob FROM source_artifacts WHERE id = ?1",
                params![id.as_str()],
                source_artifact_from_row,
            )
            .optional()?;
        Ok(artifact)
    }

    /// Past results of one test across the jobs of a project, newest first.
    pub fn test_history(
        &self,
        project: &ProjectId,
        name_hash: &NameHash,
        limit: usize,
    ) -> Result<Vec<TestCase>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        load_cases(
            &self.conn,
            "WHERE project_id = ?1 AND name_hash = ?2
             ORDER BY created_at DESC, rowid DESC LIMIT ?3",
            params![project.as_str(), name_hash.as_str(), limit],
        )
    }

    /// Tests that passed only after at least one rerun.
    pub fn flaky_tests(&self, project: &ProjectId) -> Result<Vec<TestCase>> {
        load_cases(
            &self.conn,
            "WHERE project_id = ?1 AND outcome = 'passed' AND reruns > 0
             ORDER BY created_at DESC, rowid DESC",
            params![project.as_str()],
        )
    }

    /// Remove a job's test cases with their artifacts and messages.
    ///
    /// Stats and failure reasons belong to steps and are kept.
    pub fn delete_job_test_cases(&mut self, job: &JobId) -> Result<usize> {
        let deleted = self
            .conn
            .execute(
                "DELETE FROM test_cases WHERE job_id = ?1",
                params![job.as_str()],
            )
            .with_context(|| format!("delete test cases of job {job}"))?;
        tracing::info!(job = %job, deleted, "deleted job test cases");
        Ok(deleted)
    }
}

impl Ledger for SqliteLedger {
    type Tx<'a> = SqliteLedgerTx<'a>;

    fn begin(&mut self) -> Result<SqliteLedgerTx<'_>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("begin immediate transaction")?;
        Ok(SqliteLedgerTx { tx })
    }
}
