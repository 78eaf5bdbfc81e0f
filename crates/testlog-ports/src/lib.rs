use anyhow::Result;
use testlog_ids::{BlobRef, JobId, StepId, TestCaseId};
use testlog_schema::case::{TestArtifact, TestCase, TestMessage};
use testlog_schema::failure::FailureReason;
use testlog_schema::result::ParsedTestResult;
use testlog_schema::stat::StatName;
use testlog_schema::step::SourceArtifact;

/// Content-addressable payload storage.
///
/// Payloads are written once and never mutated. Encoding (base64 etc.) is the
/// caller's problem; stores only see raw bytes.
pub trait ContentStore: Send + Sync {
    fn put(&self, payload: &[u8]) -> Result<BlobRef>;
    fn get(&self, blob: &BlobRef) -> Result<Vec<u8>>;
}

/// Durable storage for test cases, stats and failure reasons.
///
/// All writes happen through a [`LedgerTx`]; one `save` is one transaction.
pub trait Ledger {
    type Tx<'a>: LedgerTx
    where
        Self: 'a;

    /// Open a write transaction. Dropping it without [`LedgerTx::commit`] rolls back.
    fn begin(&mut self) -> Result<Self::Tx<'_>>;
}

/// Write operations available inside one ingestion transaction.
pub trait LedgerTx {
    fn find_test_case(&mut self, job: &JobId, name: &str) -> Result<Option<TestCase>>;

    /// Insert unless `(job_id, name)` is already taken.
    ///
    /// Returns `false` on a uniqueness conflict. Any other failure is an error.
    fn insert_test_case(&mut self, case: &TestCase) -> Result<bool>;

    /// Persist mutable fields of an existing record (outcome, message, sightings).
    fn update_test_case(&mut self, case: &TestCase) -> Result<()>;

    /// Append in order. Never deduplicates.
    fn append_artifacts(&mut self, case: &TestCaseId, artifacts: &[TestArtifact]) -> Result<()>;

    fn append_messages(&mut self, case: &TestCaseId, messages: &[TestMessage]) -> Result<()>;

    /// Idempotent per `(step, reason)`.
    fn record_failure_reason(&mut self, reason: &FailureReason) -> Result<()>;

    /// Atomic add; creates the row at `by` when absent.
    fn increment_stat(&mut self, step: &StepId, stat: StatName, by: i64) -> Result<()>;

    fn register_source_artifact(&mut self, artifact: &SourceArtifact) -> Result<()>;

    fn commit(self) -> Result<()>
    where
        Self: Sized;
}

/// Produces a batch of parsed results, typically from one results file.
///
/// Adapters live in `testlog-ingest-*` crates.
pub trait ResultReader {
    fn read(&self) -> Result<Vec<ParsedTestResult>>;
}
