//! Shared fixtures for core integration tests.
//!
//! Seeds the collaborator-owned tables through raw SQL, the same way the
//! board service would populate them.

#![allow(dead_code)]

use rusqlite::{Connection, params};
use sprintlens_core::db::{DbPool, PooledConn, initialize_pool};
use tempfile::TempDir;

pub const WORKSPACE: &str = "ws-acme";

pub struct TestDb {
    // Held so the directory outlives the pool.
    _dir: TempDir,
    pub pool: DbPool,
}

impl TestDb {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let pool = initialize_pool(&dir.path().join("sprintlens.db"), 4).expect("pool");
        Self { _dir: dir, pool }
    }

    pub fn conn(&self) -> PooledConn {
        self.pool.get().expect("connection")
    }
}

pub fn seed_item(conn: &Connection, id: &str, status: &str, effort: Option<f64>) {
    conn.execute(
        "INSERT INTO work_items (id, workspace_id, title, kanban_status, effort_estimate, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, '2026-01-01T00:00:00.000Z')",
        params![id, WORKSPACE, format!("Item {id}"), status, effort],
    )
    .expect("insert work item");
}

pub fn seed_sprint(conn: &Connection, id: &str, start: Option<&str>, end: Option<&str>) {
    conn.execute(
        "INSERT INTO sprints (id, workspace_id, name, start_date, end_date, status)
         VALUES (?1, ?2, ?3, ?4, ?5, 'ACTIVE')",
        params![id, WORKSPACE, format!("Sprint {id}"), start, end],
    )
    .expect("insert sprint");
}

pub fn seed_membership(conn: &Connection, sprint_id: &str, item_id: &str, added_at: &str) {
    conn.execute(
        "INSERT INTO sprint_items (sprint_id, work_item_id, added_at) VALUES (?1, ?2, ?3)",
        params![sprint_id, item_id, added_at],
    )
    .expect("insert membership");
}

pub fn seed_issue_link(conn: &Connection, issue_number: u64, item_id: &str) {
    conn.execute(
        "INSERT INTO issue_sync_links (workspace_id, issue_number, work_item_id) VALUES (?1, ?2, ?3)",
        params![WORKSPACE, issue_number, item_id],
    )
    .expect("insert issue link");
}

pub fn item_status(conn: &Connection, id: &str) -> String {
    conn.query_row(
        "SELECT kanban_status FROM work_items WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )
    .expect("item status")
}

/// Every column of a `work_items` row, in table order.
pub type WorkItemRow = (
    String,
    String,
    String,
    String,
    Option<f64>,
    Option<String>,
    String,
);

pub fn work_item_row(conn: &Connection, id: &str) -> WorkItemRow {
    conn.query_row(
        "SELECT id, workspace_id, title, kanban_status, effort_estimate, due_date, created_at
         FROM work_items WHERE id = ?1",
        params![id],
        |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
            ))
        },
    )
    .expect("work item row")
}

pub fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })
    .expect("count")
}
