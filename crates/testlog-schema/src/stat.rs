use serde::{Deserialize, Serialize};
use std::fmt;
use testlog_ids::StepId;

/// The per-step counters maintained by ingestion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatName {
    TestCount,
    TestFailures,
    TestDuration,
    TestRerunCount,
}

impl StatName {
    pub const ALL: [StatName; 4] = [
        StatName::TestCount,
        StatName::TestFailures,
        StatName::TestDuration,
        StatName::TestRerunCount,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatName::TestCount => "test_count",
            StatName::TestFailures => "test_failures",
            StatName::TestDuration => "test_duration",
            StatName::TestRerunCount => "test_rerun_count",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|stat| stat.as_str() == s)
    }
}

impl fmt::Display for StatName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A generic counter row keyed by `(item, name)`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemStat {
    pub item_id: StepId,
    pub name: StatName,
    pub value: i64,
}

/// Read model over the four counters of one step. Absent rows read as zero.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepStats {
    pub test_count: i64,
    pub test_failures: i64,
    pub test_duration: i64,
    pub test_rerun_count: i64,
}

impl StepStats {
    pub fn from_rows(rows: &[ItemStat]) -> Self {
        let mut stats = StepStats::default();
        for row in rows {
            let slot = match row.name {
                StatName::TestCount => &mut stats.test_count,
                StatName::TestFailures => &mut stats.test_failures,
                StatName::TestDuration => &mut stats.test_duration,
                StatName::TestRerunCount => &mut stats.test_rerun_count,
            };
            *slot += row.value;
        }
        stats
    }

    pub fn get(&self, name: StatName) -> i64 {
        match name {
            StatName::TestCount => self.test_count,
            StatName::TestFailures => self.test_failures,
            StatName::TestDuration => self.test_duration,
            StatName::TestRerunCount => self.test_rerun_count,
        }
    }
}
