//! Daily sprint snapshots and the ideal-vs-actual burndown series.
//!
//! Snapshots are keyed by `(sprint_id, day)`. Capturing twice on the same UTC
//! day overwrites the earlier row, so the stored value is always the last
//! capture of that day.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{Connection, params};
use serde::Serialize;

use crate::db::codec::{decode_day, encode_day, encode_ts, required_ts_column};
use crate::errors::Result;
use crate::ingest::count_activity_on_day;
use crate::metrics::compute_metrics;
use crate::model::{ActivityCounts, Sprint, SprintSnapshot, StatusCounts};
use crate::sprints::{active_sprint_ids, load_sprint};

const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BurndownPoint {
    pub date: NaiveDate,
    pub remaining_effort: f64,
    pub ideal_remaining: f64,
    pub completed_effort: f64,
}

/// Result of a scheduled capture over every active sprint.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CaptureSummary {
    pub captured: Vec<SprintSnapshot>,
    pub failed: Vec<CaptureFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaptureFailure {
    pub sprint_id: String,
    pub reason: String,
}

pub fn capture_daily_snapshot(conn: &Connection, sprint_id: &str) -> Result<SprintSnapshot> {
    capture_daily_snapshot_at(conn, sprint_id, Utc::now())
}

/// Capture (or replace) the snapshot for the UTC day containing `now`.
///
/// Activity counts cover every workspace, not just the sprint's.
pub fn capture_daily_snapshot_at(
    conn: &Connection,
    sprint_id: &str,
    now: DateTime<Utc>,
) -> Result<SprintSnapshot> {
    let metrics = compute_metrics(conn, sprint_id)?;
    let day = now.date_naive();
    let activity = count_activity_on_day(conn, day)?;

    let snapshot = SprintSnapshot {
        sprint_id: sprint_id.to_string(),
        day,
        status_counts: metrics.status_counts,
        total_effort: metrics.total_effort,
        completed_effort: metrics.completed_effort,
        activity,
        captured_at: now,
    };
    upsert_snapshot(conn, &snapshot)?;

    tracing::info!(
        sprint_id,
        day = %day,
        total_effort = snapshot.total_effort,
        completed_effort = snapshot.completed_effort,
        commits = activity.commits,
        "Captured sprint snapshot"
    );
    Ok(snapshot)
}

fn upsert_snapshot(conn: &Connection, s: &SprintSnapshot) -> Result<()> {
    let c = &s.status_counts;
    let a = &s.activity;
    conn.execute(
        "INSERT INTO sprint_snapshots (
            sprint_id, day, backlog_count, todo_count, in_progress_count, in_review_count,
            done_count, cancelled_count, total_effort, completed_effort,
            commits, prs_opened, prs_merged, reviews, captured_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
         ON CONFLICT (sprint_id, day) DO UPDATE SET
            backlog_count     = excluded.backlog_count,
            todo_count        = excluded.todo_count,
            in_progress_count = excluded.in_progress_count,
            in_review_count   = excluded.in_review_count,
            done_count        = excluded.done_count,
            cancelled_count   = excluded.cancelled_count,
            total_effort      = excluded.total_effort,
            completed_effort  = excluded.completed_effort,
            commits           = excluded.commits,
            prs_opened        = excluded.prs_opened,
            prs_merged        = excluded.prs_merged,
            reviews           = excluded.reviews,
            captured_at       = excluded.captured_at",
        params![
            s.sprint_id,
            encode_day(s.day),
            c.backlog,
            c.todo,
            c.in_progress,
            c.in_review,
            c.done,
            c.cancelled,
            s.total_effort,
            s.completed_effort,
            a.commits,
            a.prs_opened,
            a.prs_merged,
            a.reviews,
            encode_ts(&s.captured_at),
        ],
    )?;
    Ok(())
}

/// Stored snapshots for a sprint, oldest day first.
pub fn load_snapshots(conn: &Connection, sprint_id: &str) -> Result<Vec<SprintSnapshot>> {
    let mut stmt = conn.prepare(
        "SELECT sprint_id, day, backlog_count, todo_count, in_progress_count, in_review_count,
                done_count, cancelled_count, total_effort, completed_effort,
                commits, prs_opened, prs_merged, reviews, captured_at
         FROM sprint_snapshots
         WHERE sprint_id = ?1
         ORDER BY day",
    )?;
    let rows = stmt.query_map(params![sprint_id], |row| {
        let raw_day: String = row.get(1)?;
        let day = decode_day(&raw_day).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                1,
                rusqlite::types::Type::Text,
                format!("invalid snapshot day: {raw_day}").into(),
            )
        })?;
        Ok(SprintSnapshot {
            sprint_id: row.get(0)?,
            day,
            status_counts: StatusCounts {
                backlog: row.get(2)?,
                todo: row.get(3)?,
                in_progress: row.get(4)?,
                in_review: row.get(5)?,
                done: row.get(6)?,
                cancelled: row.get(7)?,
            },
            total_effort: row.get(8)?,
            completed_effort: row.get(9)?,
            activity: ActivityCounts {
                commits: row.get(10)?,
                prs_opened: row.get(11)?,
                prs_merged: row.get(12)?,
                reviews: row.get(13)?,
            },
            captured_at: required_ts_column(row, 14)?,
        })
    })?;
    let snapshots = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(snapshots)
}

/// Ideal-vs-actual series from stored snapshots.
///
/// Empty when the sprint lacks a start or end date or has no snapshots.
pub fn burndown_series(conn: &Connection, sprint_id: &str) -> Result<Vec<BurndownPoint>> {
    let sprint = load_sprint(conn, sprint_id)?;
    let snapshots = load_snapshots(conn, sprint_id)?;
    Ok(series_from_snapshots(&sprint, &snapshots))
}

fn whole_days_ceil(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    ((to - from).num_seconds() as f64 / SECONDS_PER_DAY).ceil()
}

/// Pure core of [`burndown_series`].
pub fn series_from_snapshots(sprint: &Sprint, snapshots: &[SprintSnapshot]) -> Vec<BurndownPoint> {
    let (Some(start), Some(end)) = (sprint.start_date, sprint.end_date) else {
        return Vec::new();
    };
    let Some(first) = snapshots.first() else {
        return Vec::new();
    };

    // A zero-length or inverted sprint burns down in a single day.
    let total_days = whole_days_ceil(start, end).max(1.0);
    let initial = first.total_effort;

    snapshots
        .iter()
        .map(|snap| {
            let day_start = snap
                .day
                .and_hms_opt(0, 0, 0)
                .map_or(start, |dt| dt.and_utc());
            let day_index = whole_days_ceil(start, day_start);
            let ideal_remaining = (initial * (1.0 - day_index / total_days)).max(0.0);
            BurndownPoint {
                date: snap.day,
                remaining_effort: snap.total_effort - snap.completed_effort,
                ideal_remaining,
                completed_effort: snap.completed_effort,
            }
        })
        .collect()
}

/// Capture today's snapshot for every ACTIVE sprint.
///
/// A failing sprint is recorded and skipped; only failing to list sprints
/// aborts the run.
pub fn capture_active_sprints(conn: &Connection, now: DateTime<Utc>) -> Result<CaptureSummary> {
    let mut summary = CaptureSummary::default();
    for sprint_id in active_sprint_ids(conn)? {
        match capture_daily_snapshot_at(conn, &sprint_id, now) {
            Ok(snapshot) => summary.captured.push(snapshot),
            Err(e) => {
                tracing::warn!(
                    sprint_id = %sprint_id,
                    error = %e,
                    category = e.category().as_str(),
                    "Snapshot capture failed"
                );
                summary.failed.push(CaptureFailure {
                    sprint_id,
                    reason: e.to_string(),
                });
            }
        }
    }
    Ok(summary)
}
