/// Tables are created idempotently on open.
///
/// `test_cases (job_id, name)` is the dedup reservation key. Artifacts and
/// messages cascade with their test case; stats and failure reasons are
/// keyed by step and outlive it.
pub(crate) const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS source_artifacts (
    id TEXT PRIMARY KEY,
    step_id TEXT NOT NULL,
    name TEXT NOT NULL,
    blob TEXT
);

CREATE TABLE IF NOT EXISTS test_cases (
    id TEXT PRIMARY KEY,
    job_id TEXT NOT NULL,
    step_id TEXT NOT NULL,
    project_id TEXT NOT NULL,
    name TEXT NOT NULL,
    name_hash TEXT NOT NULL,
    outcome TEXT NOT NULL,
    message TEXT,
    duration_ms INTEGER NOT NULL CHECK (duration_ms >= 0),
    reruns INTEGER NOT NULL DEFAULT 0,
    sightings TEXT NOT NULL,
    repeat_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    UNIQUE (job_id, name)
);

CREATE INDEX IF NOT EXISTS idx_test_cases_project_name_hash
    ON test_cases(project_id, name_hash);

CREATE TABLE IF NOT EXISTS test_artifacts (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    test_case_id TEXT NOT NULL REFERENCES test_cases(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    media_type TEXT NOT NULL,
    blob TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_test_artifacts_case ON test_artifacts(test_case_id);

CREATE TABLE IF NOT EXISTS test_messages (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    test_case_id TEXT NOT NULL REFERENCES test_cases(id) ON DELETE CASCADE,
    artifact_id TEXT NOT NULL REFERENCES source_artifacts(id),
    label TEXT NOT NULL,
    start_offset INTEGER NOT NULL,
    length INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_test_messages_case ON test_messages(test_case_id);

CREATE TABLE IF NOT EXISTS failure_reasons (
    step_id TEXT NOT NULL,
    job_id TEXT NOT NULL,
    reason TEXT NOT NULL,
    PRIMARY KEY (step_id, reason)
);

CREATE TABLE IF NOT EXISTS item_stats (
    item_id TEXT NOT NULL,
    name TEXT NOT NULL,
    value INTEGER NOT NULL,
    PRIMARY KEY (item_id, name)
);
";

pub(crate) const CASE_COLUMNS: &str = "id, job_id, step_id, project_id, name, name_hash, outcome, \
     message, duration_ms, reruns, sightings, repeat_count, created_at";
