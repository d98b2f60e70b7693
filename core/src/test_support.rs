//! Seeding helpers for unit tests.
//!
//! Writes directly to the collaborator-owned tables the engine reads.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};

use crate::db::codec::encode_ts;
use crate::model::KanbanStatus;

pub const WORKSPACE: &str = "ws-1";

pub fn ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .expect("test timestamp")
        .with_timezone(&Utc)
}

pub struct Fixture {
    pub conn: Connection,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            conn: crate::db::open_in_memory().expect("in-memory db"),
        }
    }

    pub fn sprint(
        &self,
        id: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> &Self {
        self.conn
            .execute(
                "INSERT INTO sprints (id, workspace_id, name, start_date, end_date, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'ACTIVE')",
                params![
                    id,
                    WORKSPACE,
                    format!("Sprint {id}"),
                    start.as_ref().map(encode_ts),
                    end.as_ref().map(encode_ts)
                ],
            )
            .expect("insert sprint");
        self
    }

    pub fn item(&self, id: &str, status: KanbanStatus, effort: Option<f64>) -> &Self {
        self.item_in(WORKSPACE, id, status, effort)
    }

    pub fn item_in(
        &self,
        workspace: &str,
        id: &str,
        status: KanbanStatus,
        effort: Option<f64>,
    ) -> &Self {
        self.conn
            .execute(
                "INSERT INTO work_items (id, workspace_id, title, kanban_status, effort_estimate, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, '2026-01-01T00:00:00.000Z')",
                params![id, workspace, format!("Item {id}"), status.as_str(), effort],
            )
            .expect("insert work item");
        self
    }

    pub fn due(&self, id: &str, due: DateTime<Utc>) -> &Self {
        self.conn
            .execute(
                "UPDATE work_items SET due_date = ?2 WHERE id = ?1",
                params![id, encode_ts(&due)],
            )
            .expect("set due date");
        self
    }

    pub fn link(&self, sprint_id: &str, item_id: &str, added_at: DateTime<Utc>) -> &Self {
        self.conn
            .execute(
                "INSERT INTO sprint_items (sprint_id, work_item_id, added_at) VALUES (?1, ?2, ?3)",
                params![sprint_id, item_id, encode_ts(&added_at)],
            )
            .expect("link item");
        self
    }

    pub fn block(&self, item_id: &str, blocked_by: &str) -> &Self {
        self.conn
            .execute(
                "INSERT INTO work_item_dependencies (work_item_id, blocked_by_id) VALUES (?1, ?2)",
                params![item_id, blocked_by],
            )
            .expect("insert dependency");
        self
    }

    pub fn status_change(&self, item_id: &str, at: DateTime<Utc>) -> &Self {
        self.conn
            .execute(
                "INSERT INTO work_item_status_changes (work_item_id, to_status, changed_at)
                 SELECT id, kanban_status, ?2 FROM work_items WHERE id = ?1",
                params![item_id, encode_ts(&at)],
            )
            .expect("insert status change");
        self
    }

    pub fn issue_link(&self, workspace: &str, issue_number: u64, item_id: &str) -> &Self {
        self.conn
            .execute(
                "INSERT INTO issue_sync_links (workspace_id, issue_number, work_item_id)
                 VALUES (?1, ?2, ?3)",
                params![workspace, issue_number, item_id],
            )
            .expect("insert issue link");
        self
    }

    pub fn integration(&self, integration_id: &str, workspace: &str, repository: &str) -> &Self {
        crate::integrations::register_repository(&self.conn, integration_id, workspace, repository)
            .expect("register repository");
        self
    }
}
