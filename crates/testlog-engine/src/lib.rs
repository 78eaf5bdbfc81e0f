//! Ingestion coordinator.
//!
//! [`TestResultManager`] takes the parsed results of one step and writes them
//! through a [`testlog_ports::Ledger`] in a single transaction:
//! durations are normalized, attachments land in the content store, the first
//! sighting of a name in a job creates its test case and later sightings are
//! merged into it as duplicates. Step counters only ever count first sightings.

mod manager;
mod message;

pub use manager::{DEFAULT_RESERVATION_ATTEMPTS, SaveReport, TestResultManager};
pub use message::read_message;
