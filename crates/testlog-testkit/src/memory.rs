//! In-memory [`Ledger`] for unit tests of the pipeline stages.
//!
//! A transaction works on a clone of the committed state and swaps it in on
//! commit, so dropping a transaction discards everything it wrote.

use anyhow::{Result, bail};
use std::collections::HashMap;
use testlog_ids::{JobId, StepId, TestCaseId};
use testlog_ports::{Ledger, LedgerTx};
use testlog_schema::case::{TestArtifact, TestCase, TestMessage};
use testlog_schema::failure::FailureReason;
use testlog_schema::stat::{StatName, StepStats};
use testlog_schema::step::SourceArtifact;

#[derive(Clone, Debug, Default)]
pub struct MemoryState {
    /// Insertion order is preserved.
    pub cases: Vec<TestCase>,
    pub artifacts: HashMap<TestCaseId, Vec<TestArtifact>>,
    pub messages: HashMap<TestCaseId, Vec<TestMessage>>,
    pub failure_reasons: Vec<FailureReason>,
    pub stats: HashMap<(StepId, StatName), i64>,
    pub source_artifacts: Vec<SourceArtifact>,
}

impl MemoryState {
    pub fn case(&self, job: &JobId, name: &str) -> Option<&TestCase> {
        self.cases
            .iter()
            .find(|case| &case.job_id == job && case.name == name)
    }

    pub fn artifacts(&self, case: &TestCaseId) -> &[TestArtifact] {
        self.artifacts.get(case).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn messages(&self, case: &TestCaseId) -> &[TestMessage] {
        self.messages.get(case).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn stat(&self, step: &StepId, name: StatName) -> Option<i64> {
        self.stats.get(&(step.clone(), name)).copied()
    }

    pub fn step_stats(&self, step: &StepId) -> StepStats {
        StepStats {
            test_count: self.stat(step, StatName::TestCount).unwrap_or(0),
            test_failures: self.stat(step, StatName::TestFailures).unwrap_or(0),
            test_duration: self.stat(step, StatName::TestDuration).unwrap_or(0),
            test_rerun_count: self.stat(step, StatName::TestRerunCount).unwrap_or(0),
        }
    }

    pub fn failure_reasons_for(&self, step: &StepId) -> Vec<&FailureReason> {
        self.failure_reasons
            .iter()
            .filter(|reason| &reason.step_id == step)
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct MemoryLedger {
    state: MemoryState,
    fail_stat_writes: bool,
    commits: usize,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `increment_stat` fail, to exercise rollback paths.
    pub fn failing_stat_writes(mut self) -> Self {
        self.fail_stat_writes = true;
        self
    }

    /// Committed state only.
    pub fn state(&self) -> &MemoryState {
        &self.state
    }

    pub fn commits(&self) -> usize {
        self.commits
    }
}

#[derive(Debug)]
pub struct MemoryTx<'a> {
    ledger: &'a mut MemoryLedger,
    work: MemoryState,
}

impl MemoryTx<'_> {
    /// Uncommitted state as seen from inside the transaction.
    pub fn pending(&self) -> &MemoryState {
        &self.work
    }
}

impl Ledger for MemoryLedger {
    type Tx<'a> = MemoryTx<'a>;

    fn begin(&mut self) -> Result<MemoryTx<'_>> {
        let work = self.state.clone();
        Ok(MemoryTx { ledger: self, work })
    }
}

impl LedgerTx for MemoryTx<'_> {
    fn find_test_case(&mut self, job: &JobId, name: &str) -> Result<Option<TestCase>> {
        Ok(self.work.case(job, name).cloned())
    }

    fn insert_test_case(&mut self, case: &TestCase) -> Result<bool> {
        if self.work.case(&case.job_id, &case.name).is_some() {
            return Ok(false);
        }
        self.work.cases.push(case.clone());
        Ok(true)
    }

    fn update_test_case(&mut self, case: &TestCase) -> Result<()> {
        match self.work.cases.iter_mut().find(|c| c.id == case.id) {
            Some(slot) => {
                *slot = case.clone();
                Ok(())
            }
            None => bail!("no test case {}", case.id),
        }
    }

    fn append_artifacts(&mut self, case: &TestCaseId, artifacts: &[TestArtifact]) -> Result<()> {
        self.work
            .artifacts
            .entry(case.clone())
            .or_default()
            .extend_from_slice(artifacts);
        Ok(())
    }

    fn append_messages(&mut self, case: &TestCaseId, messages: &[TestMessage]) -> Result<()> {
        self.work
            .messages
            .entry(case.clone())
            .or_default()
            .extend_from_slice(messages);
        Ok(())
    }

    fn record_failure_reason(&mut self, reason: &FailureReason) -> Result<()> {
        let exists = self
            .work
            .failure_reasons
            .iter()
            .any(|r| r.step_id == reason.step_id && r.reason == reason.reason);
        if !exists {
            self.work.failure_reasons.push(reason.clone());
        }
        Ok(())
    }

    fn increment_stat(&mut self, step: &StepId, stat: StatName, by: i64) -> Result<()> {
        if self.ledger.fail_stat_writes {
            bail!("stat write failed for {step}/{stat}");
        }
        *self.work.stats.entry((step.clone(), stat)).or_insert(0) += by;
        Ok(())
    }

    fn register_source_artifact(&mut self, artifact: &SourceArtifact) -> Result<()> {
        match self
            .work
            .source_artifacts
            .iter_mut()
            .find(|a| a.id == artifact.id)
        {
            Some(slot) => *slot = artifact.clone(),
            None => self.work.source_artifacts.push(artifact.clone()),
        }
        Ok(())
    }

    fn commit(self) -> Result<()> {
        self.ledger.state = self.work;
        self.ledger.commits += 1;
        Ok(())
    }
}
