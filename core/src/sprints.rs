//! Read-only queries over the sprint and work item tables.
//!
//! These tables belong to the board/CRUD side of the product; nothing in this
//! crate writes to them.

use std::collections::HashMap;

use rusqlite::{Connection, OptionalExtension, params};

use crate::db::codec::{required_ts_column, ts_column};
use crate::errors::{CoreError, Result};
use crate::model::{KanbanStatus, Sprint, SprintWorkItem};

pub fn load_sprint(conn: &Connection, sprint_id: &str) -> Result<Sprint> {
    conn.query_row(
        "SELECT id, workspace_id, name, start_date, end_date, status
         FROM sprints WHERE id = ?1",
        params![sprint_id],
        |row| {
            Ok(Sprint {
                id: row.get(0)?,
                workspace_id: row.get(1)?,
                name: row.get(2)?,
                start_date: ts_column(row, 3)?,
                end_date: ts_column(row, 4)?,
                status: row.get(5)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| CoreError::sprint_not_found(sprint_id))
}

/// Every work item currently linked to the sprint, with its membership time,
/// latest status change and blockers.
pub fn load_sprint_items(conn: &Connection, sprint_id: &str) -> Result<Vec<SprintWorkItem>> {
    let mut blockers = load_blockers(conn, sprint_id)?;

    let mut stmt = conn.prepare(
        "SELECT w.id, w.title, w.kanban_status, w.effort_estimate, w.due_date, si.added_at,
                (SELECT MAX(c.changed_at) FROM work_item_status_changes c
                  WHERE c.work_item_id = w.id)
         FROM sprint_items si
         JOIN work_items w ON w.id = si.work_item_id
         WHERE si.sprint_id = ?1
         ORDER BY si.added_at, w.id",
    )?;

    let rows = stmt.query_map(params![sprint_id], |row| {
        let raw_status: String = row.get(2)?;
        let status = KanbanStatus::parse(&raw_status).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                format!("unknown kanban status: {raw_status}").into(),
            )
        })?;
        Ok(SprintWorkItem {
            id: row.get(0)?,
            title: row.get(1)?,
            status,
            effort_estimate: row.get(3)?,
            due_date: ts_column(row, 4)?,
            added_at: required_ts_column(row, 5)?,
            last_status_change_at: ts_column(row, 6)?,
            blocked_by: Vec::new(),
        })
    })?;

    let mut items = Vec::new();
    for row in rows {
        let mut item = row?;
        item.blocked_by = blockers.remove(&item.id).unwrap_or_default();
        items.push(item);
    }
    Ok(items)
}

fn load_blockers(conn: &Connection, sprint_id: &str) -> Result<HashMap<String, Vec<String>>> {
    let mut stmt = conn.prepare(
        "SELECT d.work_item_id, d.blocked_by_id
         FROM work_item_dependencies d
         JOIN sprint_items si ON si.work_item_id = d.work_item_id
         WHERE si.sprint_id = ?1
         ORDER BY d.work_item_id, d.blocked_by_id",
    )?;
    let rows = stmt.query_map(params![sprint_id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut blockers: HashMap<String, Vec<String>> = HashMap::new();
    for row in rows {
        let (item, blocker) = row?;
        blockers.entry(item).or_default().push(blocker);
    }
    Ok(blockers)
}

/// Ids of sprints whose owner marked them ACTIVE.
pub fn active_sprint_ids(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT id FROM sprints WHERE status = 'ACTIVE' ORDER BY id")?;
    let ids = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(ids)
}
