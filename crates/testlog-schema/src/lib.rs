//! Canonical data model for the testlog ingestion pipeline.
//!
//! Defines the parsed input records handed to the coordinator, the canonical
//! test case with its artifacts and message windows, failure reasons, step
//! counters, and the diagnostics reported back to callers.
//! All other crates depend on these types.

pub mod case;
pub mod diagnostic;
pub mod failure;
pub mod outcome;
pub mod result;
pub mod stat;
pub mod step;
