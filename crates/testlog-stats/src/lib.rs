//! Per-step counters.
//!
//! Counters are only ever incremented. A step's tally covers the fresh
//! sightings of one batch; repeat sightings contribute nothing to it and
//! instead may correct the owning step through [`apply_retroactive_failure`].

use anyhow::Result;
use testlog_ids::StepId;
use testlog_ports::LedgerTx;
use testlog_schema::case::TestCase;
use testlog_schema::stat::StatName;

/// Accumulated increments for the processing step of one batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepTally {
    pub step: StepId,
    pub count: i64,
    pub failures: i64,
    pub duration: i64,
    /// Tests that needed at least one rerun, not the sum of reruns.
    pub reruns: i64,
}

impl StepTally {
    pub fn new(step: StepId) -> Self {
        Self {
            step,
            count: 0,
            failures: 0,
            duration: 0,
            reruns: 0,
        }
    }

    /// Count a test case created by this batch.
    pub fn record_fresh(&mut self, case: &TestCase) {
        self.count += 1;
        if case.outcome.is_failure() {
            self.failures += 1;
        }
        self.duration += i64::from(case.duration_ms);
        if case.reruns > 0 {
            self.reruns += 1;
        }
    }

    pub fn increments(&self) -> [(StatName, i64); 4] {
        [
            (StatName::TestCount, self.count),
            (StatName::TestFailures, self.failures),
            (StatName::TestDuration, self.duration),
            (StatName::TestRerunCount, self.reruns),
        ]
    }

    /// Write all four counters, including zero increments, so every step that
    /// saved a batch has a full set of rows.
    pub fn apply<T: LedgerTx + ?Sized>(&self, tx: &mut T) -> Result<()> {
        for (stat, by) in self.increments() {
            tx.increment_stat(&self.step, stat, by)?;
        }
        Ok(())
    }
}

/// Count a test as failed against the step that owns it.
///
/// Only the merge path calls this: the owner's tally saw the test as
/// non-failed, and the collision has since made it a failure. The owner's
/// count, duration and reruns stay as they were.
pub fn apply_retroactive_failure<T: LedgerTx + ?Sized>(tx: &mut T, owner: &StepId) -> Result<()> {
    tx.increment_stat(owner, StatName::TestFailures, 1)
}
