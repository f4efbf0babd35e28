use rusqlite::Connection;

use crate::error::StoreError;

/// Schema version this build writes. Stored in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 2;

const SCHEMA_V1: &str = "
CREATE TABLE IF NOT EXISTS projects (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    title       TEXT NOT NULL,
    description TEXT NOT NULL,
    owner_id    INTEGER NOT NULL,
    start_date  TEXT NOT NULL,
    end_date    TEXT NOT NULL,
    active      INTEGER NOT NULL DEFAULT 1
);
CREATE INDEX IF NOT EXISTS idx_projects_owner ON projects(owner_id);

CREATE TABLE IF NOT EXISTS project_members (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id INTEGER NOT NULL REFERENCES projects(id),
    email      TEXT NOT NULL,
    active     INTEGER NOT NULL DEFAULT 0,
    accepted   INTEGER NOT NULL DEFAULT 0,
    rejected   INTEGER NOT NULL DEFAULT 0,
    guest      INTEGER NOT NULL DEFAULT 0,
    creator    INTEGER NOT NULL DEFAULT 0,
    UNIQUE (project_id, email)
);

CREATE TABLE IF NOT EXISTS schedules (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id   INTEGER NOT NULL UNIQUE REFERENCES projects(id),
    local_days   TEXT NOT NULL,
    local_time   TEXT NOT NULL,
    offset_hours INTEGER NOT NULL,
    utc_days     TEXT NOT NULL,
    utc_time     TEXT NOT NULL,
    utc_hour     INTEGER NOT NULL,
    active       INTEGER NOT NULL DEFAULT 1,
    ended        INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_schedules_due ON schedules(utc_hour, active, ended);

CREATE TABLE IF NOT EXISTS trackers (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    schedule_id INTEGER NOT NULL REFERENCES schedules(id),
    local_date  TEXT NOT NULL,
    status      TEXT NOT NULL,
    expected    INTEGER NOT NULL CHECK (expected >= 0),
    received    INTEGER NOT NULL DEFAULT 0 CHECK (received <= expected),
    processed   INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL,
    origin_host TEXT NOT NULL,
    claimed_at  TEXT,
    UNIQUE (schedule_id, local_date)
);

CREATE TABLE IF NOT EXISTS responses (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id    INTEGER NOT NULL REFERENCES projects(id),
    member_id     INTEGER NOT NULL REFERENCES project_members(id),
    schedule_id   INTEGER NOT NULL REFERENCES schedules(id),
    local_date    TEXT NOT NULL,
    local_weekday TEXT NOT NULL,
    did_yesterday TEXT NOT NULL,
    doing_today   TEXT NOT NULL,
    blockers      TEXT NOT NULL,
    has_blocker   INTEGER NOT NULL,
    created_at    TEXT NOT NULL,
    UNIQUE (schedule_id, local_date, member_id)
);
CREATE INDEX IF NOT EXISTS idx_responses_project_date ON responses(project_id, local_date);

CREATE TABLE IF NOT EXISTS insights (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    tracker_id        INTEGER NOT NULL UNIQUE REFERENCES trackers(id),
    project_id        INTEGER NOT NULL REFERENCES projects(id),
    schedule_id       INTEGER NOT NULL REFERENCES schedules(id),
    local_date        TEXT NOT NULL,
    response_ids      TEXT NOT NULL,
    summary           TEXT NOT NULL,
    blockers          TEXT NOT NULL,
    diversion_range   TEXT NOT NULL,
    diversion_context TEXT NOT NULL,
    created_at        TEXT NOT NULL,
    UNIQUE (project_id, local_date)
);

CREATE TRIGGER IF NOT EXISTS responses_append_only
BEFORE UPDATE ON responses
BEGIN
    SELECT RAISE(ABORT, 'responses are append-only');
END;

CREATE TRIGGER IF NOT EXISTS insights_immutable
BEFORE UPDATE ON insights
BEGIN
    SELECT RAISE(ABORT, 'insights are immutable');
END;
";

const SCHEMA_V2: &str = "
CREATE TABLE IF NOT EXISTS generated_content (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id   INTEGER NOT NULL REFERENCES projects(id),
    owner_id     INTEGER NOT NULL,
    local_dates  TEXT NOT NULL,
    insight_ids  TEXT NOT NULL,
    content      TEXT NOT NULL,
    content_type TEXT NOT NULL,
    created_at   TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_generated_content_project ON generated_content(project_id);
";

/// Bring the database schema up to [`SCHEMA_VERSION`].
///
/// Each version step runs in its own transaction; a database written by a
/// newer build is refused instead of being downgraded.
pub fn migrate(conn: &mut Connection) -> Result<(), StoreError> {
    let current: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if current > SCHEMA_VERSION {
        return Err(StoreError::Unavailable(format!(
            "database schema v{current} is newer than supported v{SCHEMA_VERSION}"
        )));
    }
    if current < 1 {
        let tx = conn.transaction()?;
        tx.execute_batch(SCHEMA_V1)?;
        tx.pragma_update(None, "user_version", 1)?;
        tx.commit()?;
        tracing::debug!("applied schema v1");
    }
    if current < 2 {
        let tx = conn.transaction()?;
        tx.execute_batch(SCHEMA_V2)?;
        tx.pragma_update(None, "user_version", 2)?;
        tx.commit()?;
        tracing::debug!("applied schema v2");
    }
    Ok(())
}
