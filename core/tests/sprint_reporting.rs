#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Metrics, burndown and risk over one seeded sprint.

mod common;

use chrono::{DateTime, Utc};
use common::{TestDb, count, seed_item, seed_membership, seed_sprint};
use pretty_assertions::assert_eq;
use sprintlens_core::burndown::{capture_daily_snapshot_at, load_snapshots};
use sprintlens_core::config::RiskConfig;
use sprintlens_core::model::{RiskSignalType, Severity};
use sprintlens_core::risk::detect_at;
use sprintlens_core::{CoreError, burndown_series, compute_metrics};

fn at(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
}

/// Ten-day sprint: ten planned items of effort 10, five added on day two.
fn seed(db: &TestDb) {
    let conn = db.conn();
    seed_sprint(
        &conn,
        "sprint-1",
        Some("2026-03-01T00:00:00.000Z"),
        Some("2026-03-11T00:00:00.000Z"),
    );
    for i in 0..10 {
        let id = format!("planned-{i}");
        seed_item(&conn, &id, "TODO", Some(10.0));
        seed_membership(&conn, "sprint-1", &id, "2026-02-28T12:00:00.000Z");
    }
    for i in 0..5 {
        let id = format!("added-{i}");
        seed_item(&conn, &id, "BACKLOG", None);
        seed_membership(&conn, "sprint-1", &id, "2026-03-02T12:00:00.000Z");
    }
}

#[test]
fn metrics_split_planned_from_added() {
    let db = TestDb::new();
    seed(&db);
    let m = compute_metrics(&db.conn(), "sprint-1").unwrap();
    assert_eq!(m.total_actions, 15);
    assert_eq!(m.planned_actions, 10);
    assert_eq!(m.added_actions, 5);
    assert_eq!(m.total_effort, 100.0);
    assert_eq!(m.completion_rate, 0.0);
}

#[test]
fn burndown_tracks_progress_against_ideal() {
    let db = TestDb::new();
    seed(&db);
    let conn = db.conn();

    capture_daily_snapshot_at(&conn, "sprint-1", at("2026-03-01T23:00:00Z")).unwrap();
    conn.execute(
        "UPDATE work_items SET kanban_status = 'DONE' WHERE id IN ('planned-0', 'planned-1')",
        [],
    )
    .unwrap();
    capture_daily_snapshot_at(&conn, "sprint-1", at("2026-03-06T23:00:00Z")).unwrap();
    // Re-capture later the same day replaces the row.
    conn.execute(
        "UPDATE work_items SET kanban_status = 'DONE' WHERE id = 'planned-2'",
        [],
    )
    .unwrap();
    capture_daily_snapshot_at(&conn, "sprint-1", at("2026-03-06T23:30:00Z")).unwrap();

    assert_eq!(count(&conn, "sprint_snapshots"), 2);
    assert_eq!(load_snapshots(&conn, "sprint-1").unwrap()[1].status_counts.done, 3);

    let series = burndown_series(&conn, "sprint-1").unwrap();
    assert_eq!(series.len(), 2);
    assert_eq!(series[0].ideal_remaining, 100.0);
    assert_eq!(series[0].remaining_effort, 100.0);
    assert_eq!(series[1].ideal_remaining, 50.0);
    assert_eq!(series[1].remaining_effort, 70.0);
    assert_eq!(series[1].completed_effort, 30.0);
}

#[test]
fn risks_reflect_live_state() {
    let db = TestDb::new();
    seed(&db);
    let conn = db.conn();

    let signals = detect_at(&conn, "sprint-1", &RiskConfig::default(), at("2026-03-09T00:00:00Z"))
        .unwrap();
    let kinds: Vec<_> = signals.iter().map(|s| (s.signal_type, s.severity)).collect();
    assert_eq!(
        kinds,
        vec![
            (RiskSignalType::ScopeCreep, Severity::Medium),
            (RiskSignalType::VelocityDrop, Severity::Critical),
        ]
    );
}

#[test]
fn unknown_sprint_is_not_found() {
    let db = TestDb::new();
    let err = compute_metrics(&db.conn(), "missing").unwrap_err();
    assert!(matches!(err, CoreError::NotFound { entity: "sprint", .. }));
    assert!(burndown_series(&db.conn(), "missing").is_err());
}
