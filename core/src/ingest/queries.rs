//! Read side of the activity log.

use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::db::codec::{day_bounds, required_ts_column, ts_column};
use crate::errors::Result;
use crate::model::{ActivityCounts, ActivityEvent, ActivityEventType, MappingMethod};

const EVENT_COLUMNS: &str = "id, external_id, event_type, event_timestamp, branch_name, text,
    repository, workspace_id, integration_id, author, action, pull_request_number, merged_at,
    work_item_id, mapping_method, mapping_confidence, delivery_id, received_at";

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, message.into())
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<ActivityEvent> {
    let raw_type: String = row.get(2)?;
    let event_type = ActivityEventType::parse(&raw_type)
        .ok_or_else(|| conversion_error(2, format!("unknown event type: {raw_type}")))?;
    let mapping_method = match row.get::<_, Option<String>>(14)? {
        None => None,
        Some(raw) => Some(
            MappingMethod::parse(&raw)
                .ok_or_else(|| conversion_error(14, format!("unknown mapping method: {raw}")))?,
        ),
    };

    Ok(ActivityEvent {
        id: row.get(0)?,
        external_id: row.get(1)?,
        event_type,
        event_timestamp: required_ts_column(row, 3)?,
        branch_name: row.get(4)?,
        text: row.get(5)?,
        repository: row.get(6)?,
        workspace_id: row.get(7)?,
        integration_id: row.get(8)?,
        author: row.get(9)?,
        action: row.get(10)?,
        pull_request_number: row.get(11)?,
        merged_at: ts_column(row, 12)?,
        work_item_id: row.get(13)?,
        mapping_method,
        mapping_confidence: row.get(15)?,
        delivery_id: row.get(16)?,
        received_at: required_ts_column(row, 17)?,
    })
}

/// Look up one stored event by its natural key.
pub fn find_event(
    conn: &Connection,
    external_id: &str,
    event_type: ActivityEventType,
) -> Result<Option<ActivityEvent>> {
    let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM activity_events WHERE external_id = ?1 AND event_type = ?2"
    );
    let event = conn
        .query_row(&sql, params![external_id, event_type.as_str()], event_from_row)
        .optional()?;
    Ok(event)
}

pub(crate) fn event_exists(
    conn: &Connection,
    external_id: &str,
    event_type: ActivityEventType,
) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM activity_events WHERE external_id = ?1 AND event_type = ?2",
            params![external_id, event_type.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Events attributed to a work item, oldest first.
pub fn events_for_work_item(conn: &Connection, work_item_id: &str) -> Result<Vec<ActivityEvent>> {
    let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM activity_events
         WHERE work_item_id = ?1
         ORDER BY event_timestamp, external_id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let events = stmt
        .query_map(params![work_item_id], event_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(events)
}

/// Activity counts for one UTC calendar day across every workspace.
pub fn count_activity_on_day(conn: &Connection, day: NaiveDate) -> Result<ActivityCounts> {
    let (start, end) = day_bounds(day);
    let counts = conn.query_row(
        "SELECT
            COALESCE(SUM(event_type = 'push_commit'), 0),
            COALESCE(SUM(event_type = 'pull_request_transition' AND action = 'opened'), 0),
            COALESCE(SUM(event_type = 'pull_request_transition' AND action = 'closed'
                         AND merged_at IS NOT NULL), 0),
            COALESCE(SUM(event_type = 'pull_request_review'), 0)
         FROM activity_events
         WHERE event_timestamp >= ?1 AND event_timestamp < ?2",
        params![start, end],
        |row| {
            Ok(ActivityCounts {
                commits: row.get(0)?,
                prs_opened: row.get(1)?,
                prs_merged: row.get(2)?,
                reviews: row.get(3)?,
            })
        },
    )?;
    Ok(counts)
}
