//! Dedup index: which test case, if any, a sighting belongs to.
//!
//! Identity is `(job, fully-qualified name)`. The step is not part of the key:
//! shards of one job report into the same namespace.

use anyhow::{Result, bail};
use testlog_ports::LedgerTx;
use testlog_schema::case::TestCase;

/// `package.name`, or just `name` when the package is absent or empty.
pub fn fully_qualified_name(package: Option<&str>, name: &str) -> String {
    match package {
        Some(package) if !package.is_empty() => format!("{package}.{name}"),
        _ => name.to_string(),
    }
}

/// Outcome of [`lookup_or_reserve`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sighting {
    /// The candidate was inserted; this caller owns the slot.
    Fresh(TestCase),
    /// The slot was already taken; carries the canonical record.
    Repeat(TestCase),
}

/// Resolve `candidate` against the job's existing test cases.
///
/// Either the existing record is returned, or `candidate` is inserted as the
/// first sighting. A uniqueness conflict on insert means another writer won
/// the slot between our read and our write, so the row is read again. Gives up
/// after `attempts` rounds; that only happens if the ledger reports a conflict
/// it then cannot show us.
pub fn lookup_or_reserve<T: LedgerTx + ?Sized>(
    tx: &mut T,
    candidate: TestCase,
    attempts: u32,
) -> Result<Sighting> {
    for attempt in 1..=attempts.max(1) {
        if let Some(existing) = tx.find_test_case(&candidate.job_id, &candidate.name)? {
            return Ok(Sighting::Repeat(existing));
        }
        if tx.insert_test_case(&candidate)? {
            return Ok(Sighting::Fresh(candidate));
        }
        tracing::debug!(
            job = %candidate.job_id,
            test = %candidate.name,
            attempt,
            "reservation conflict, re-reading"
        );
    }
    bail!(
        "could not reserve test case {}:{} after {} attempts",
        candidate.job_id,
        candidate.name,
        attempts.max(1)
    )
}
