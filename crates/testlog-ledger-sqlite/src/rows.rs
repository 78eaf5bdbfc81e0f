use crate::schema::CASE_COLUMNS;
use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Params, Row};
use testlog_ids::{ArtifactId, BlobRef, JobId, NameHash, ProjectId, StepId, TestCaseId};
use testlog_schema::case::{TestArtifact, TestCase, TestMessage};
use testlog_schema::failure::{FailureReason, FailureReasonCode};
use testlog_schema::outcome::Outcome;
use testlog_schema::stat::{ItemStat, StatName};
use testlog_schema::step::SourceArtifact;

/// A `test_cases` row before its text columns are parsed.
struct CaseRow {
    id: String,
    job_id: String,
    step_id: String,
    project_id: String,
    name: String,
    name_hash: String,
    outcome: String,
    message: Option<String>,
    duration_ms: u32,
    reruns: u32,
    sightings: String,
    repeat_count: u32,
    created_at: DateTime<Utc>,
}

impl CaseRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            job_id: row.get(1)?,
            step_id: row.get(2)?,
            project_id: row.get(3)?,
            name: row.get(4)?,
            name_hash: row.get(5)?,
            outcome: row.get(6)?,
            message: row.get(7)?,
            duration_ms: row.get(8)?,
            reruns: row.get(9)?,
            sightings: row.get(10)?,
            repeat_count: row.get(11)?,
            created_at: row.get(12)?,
        })
    }

    fn into_case(self) -> Result<TestCase> {
        let outcome: Outcome = self
            .outcome
            .parse()
            .with_context(|| format!("test case {}", self.id))?;
        let sightings: Vec<String> = serde_json::from_str(&self.sightings)
            .with_context(|| format!("decode sightings of test case {}", self.id))?;
        Ok(TestCase {
            id: TestCaseId(self.id),
            job_id: JobId(self.job_id),
            step_id: StepId(self.step_id),
            project_id: ProjectId(self.project_id),
            name: self.name,
            name_hash: NameHash(self.name_hash),
            outcome,
            message: self.message,
            duration_ms: self.duration_ms,
            reruns: self.reruns,
            sightings,
            repeat_count: self.repeat_count,
            created_at: self.created_at,
        })
    }
}

/// Load test cases matching `filter` (a `WHERE ... ORDER BY ...` tail).
pub(crate) fn load_cases<P: Params>(
    conn: &Connection,
    filter: &str,
    params: P,
) -> Result<Vec<TestCase>> {
    let sql = format!("SELECT {CASE_COLUMNS} FROM test_cases {filter}");
    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt
        .query_map(params, CaseRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(CaseRow::into_case).collect()
}

pub(crate) fn artifact_from_row(row: &Row<'_>) -> rusqlite::Result<TestArtifact> {
    Ok(TestArtifact {
        name: row.get(0)?,
        media_type: row.get(1)?,
        blob: BlobRef(row.get(2)?),
    })
}

pub(crate) fn message_from_row(row: &Row<'_>) -> rusqlite::Result<TestMessage> {
    Ok(TestMessage {
        artifact_id: ArtifactId(row.get(0)?),
        label: row.get(1)?,
        start_offset: non_negative(row, 2)?,
        length: non_negative(row, 3)?,
    })
}

/// SQLite integers are signed; windows are stored within `0..=i64::MAX`.
fn non_negative(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let value: i64 = row.get(idx)?;
    u64::try_from(value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Integer, Box::new(e))
    })
}

pub(crate) fn source_artifact_from_row(row: &Row<'_>) -> rusqlite::Result<SourceArtifact> {
    Ok(SourceArtifact {
        id: ArtifactId(row.get(0)?),
        step_id: StepId(row.get(1)?),
        name: row.get(2)?,
        blob: row.get::<_, Option<String>>(3)?.map(BlobRef),
    })
}

pub(crate) fn failure_reason(step_id: String, job_id: String, reason: String) -> Result<FailureReason> {
    let reason = FailureReasonCode::parse(&reason)
        .ok_or_else(|| anyhow!("unknown failure reason code {reason:?}"))?;
    Ok(FailureReason {
        step_id: StepId(step_id),
        job_id: JobId(job_id),
        reason,
    })
}

pub(crate) fn item_stat(item_id: String, name: String, value: i64) -> Result<ItemStat> {
    let name = StatName::parse(&name).ok_or_else(|| anyhow!("unknown stat name {name:?}"))?;
    Ok(ItemStat {
        item_id: StepId(item_id),
        name,
        value,
    })
}
