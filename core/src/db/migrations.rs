//! Schema versioning and migrations
//!
//! Forward-only. The applied version lives in `PRAGMA user_version`; every
//! statement is idempotent (`IF NOT EXISTS`) so a half-applied migration can
//! be re-run.
//!
//! V1 creates two groups of tables:
//! - tables owned by external collaborators that the engine only reads
//!   (work items, sprints, issue sync, integrations)
//! - the engine's own tables (`activity_events`, `sprint_snapshots`)

use rusqlite::{Connection, TransactionBehavior};

use super::transactions::execute_in_transaction;
use crate::errors::{CoreError, Result};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

const MIGRATION_V1: &str = r#"
CREATE TABLE IF NOT EXISTS work_items (
    id              TEXT PRIMARY KEY,
    workspace_id    TEXT NOT NULL,
    title           TEXT NOT NULL DEFAULT '',
    kanban_status   TEXT NOT NULL CHECK (kanban_status IN
                        ('BACKLOG', 'TODO', 'IN_PROGRESS', 'IN_REVIEW', 'DONE', 'CANCELLED')),
    effort_estimate REAL,
    due_date        TEXT,
    created_at      TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_work_items_workspace ON work_items(workspace_id);

CREATE TABLE IF NOT EXISTS work_item_status_changes (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    work_item_id    TEXT NOT NULL REFERENCES work_items(id) ON DELETE CASCADE,
    from_status     TEXT,
    to_status       TEXT NOT NULL,
    changed_at      TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_status_changes_item
    ON work_item_status_changes(work_item_id, changed_at);

CREATE TABLE IF NOT EXISTS work_item_dependencies (
    work_item_id    TEXT NOT NULL REFERENCES work_items(id) ON DELETE CASCADE,
    blocked_by_id   TEXT NOT NULL REFERENCES work_items(id) ON DELETE CASCADE,
    PRIMARY KEY (work_item_id, blocked_by_id)
);

CREATE TABLE IF NOT EXISTS sprints (
    id              TEXT PRIMARY KEY,
    workspace_id    TEXT NOT NULL,
    name            TEXT NOT NULL,
    start_date      TEXT,
    end_date        TEXT,
    status          TEXT NOT NULL DEFAULT 'PLANNED'
);

CREATE TABLE IF NOT EXISTS sprint_items (
    sprint_id       TEXT NOT NULL REFERENCES sprints(id) ON DELETE CASCADE,
    work_item_id    TEXT NOT NULL REFERENCES work_items(id) ON DELETE CASCADE,
    added_at        TEXT NOT NULL,
    PRIMARY KEY (sprint_id, work_item_id)
);

CREATE TABLE IF NOT EXISTS issue_sync_links (
    workspace_id    TEXT NOT NULL,
    issue_number    INTEGER NOT NULL,
    work_item_id    TEXT NOT NULL REFERENCES work_items(id) ON DELETE CASCADE,
    PRIMARY KEY (workspace_id, issue_number)
);

CREATE TABLE IF NOT EXISTS integrations (
    id              TEXT PRIMARY KEY,
    workspace_id    TEXT NOT NULL,
    provider        TEXT NOT NULL DEFAULT 'github',
    active          INTEGER NOT NULL DEFAULT 1,
    created_at      TEXT NOT NULL
);

-- One owner per normalized repository identity.
CREATE TABLE IF NOT EXISTS integration_repositories (
    repository_key       TEXT PRIMARY KEY,
    repository_full_name TEXT NOT NULL,
    integration_id       TEXT NOT NULL REFERENCES integrations(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS activity_events (
    id                  TEXT PRIMARY KEY,
    external_id         TEXT NOT NULL,
    event_type          TEXT NOT NULL CHECK (event_type IN
                            ('push_commit', 'pull_request_transition', 'pull_request_review')),
    event_timestamp     TEXT NOT NULL,
    branch_name         TEXT,
    text                TEXT NOT NULL,
    repository          TEXT NOT NULL,
    workspace_id        TEXT NOT NULL,
    integration_id      TEXT NOT NULL,
    author              TEXT,
    action              TEXT,
    pull_request_number INTEGER,
    merged_at           TEXT,
    work_item_id        TEXT,
    mapping_method      TEXT CHECK (mapping_method IN ('explicit', 'branch', 'semantic')),
    mapping_confidence  REAL CHECK (mapping_confidence BETWEEN 0.0 AND 1.0),
    delivery_id         TEXT,
    received_at         TEXT NOT NULL,
    UNIQUE (external_id, event_type)
);
CREATE INDEX IF NOT EXISTS idx_activity_events_timestamp ON activity_events(event_timestamp);
CREATE INDEX IF NOT EXISTS idx_activity_events_work_item ON activity_events(work_item_id);

CREATE TABLE IF NOT EXISTS sprint_snapshots (
    sprint_id           TEXT NOT NULL REFERENCES sprints(id) ON DELETE CASCADE,
    day                 TEXT NOT NULL,
    backlog_count       INTEGER NOT NULL DEFAULT 0,
    todo_count          INTEGER NOT NULL DEFAULT 0,
    in_progress_count   INTEGER NOT NULL DEFAULT 0,
    in_review_count     INTEGER NOT NULL DEFAULT 0,
    done_count          INTEGER NOT NULL DEFAULT 0,
    cancelled_count     INTEGER NOT NULL DEFAULT 0,
    total_effort        REAL NOT NULL DEFAULT 0,
    completed_effort    REAL NOT NULL DEFAULT 0,
    commits             INTEGER NOT NULL DEFAULT 0,
    prs_opened          INTEGER NOT NULL DEFAULT 0,
    prs_merged          INTEGER NOT NULL DEFAULT 0,
    reviews             INTEGER NOT NULL DEFAULT 0,
    captured_at         TEXT NOT NULL,
    PRIMARY KEY (sprint_id, day)
);
"#;

/// Apply all pending migrations.
pub fn migrate_to_latest(conn: &mut Connection) -> Result<()> {
    let current = get_schema_version(conn)?;

    if current > SCHEMA_VERSION {
        return Err(CoreError::Migration(format!(
            "database schema v{current} is newer than supported v{SCHEMA_VERSION}"
        )));
    }

    if current < 1 {
        execute_in_transaction(conn, TransactionBehavior::Immediate, |tx| {
            tx.execute_batch(MIGRATION_V1)?;
            tx.pragma_update(None, "user_version", 1)?;
            Ok(())
        })
        .map_err(|e| CoreError::Migration(format!("v1 failed: {e}")))?;
        tracing::info!(version = 1, "Applied schema migration");
    }

    Ok(())
}

fn get_schema_version(conn: &Connection) -> Result<i32> {
    Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
}
