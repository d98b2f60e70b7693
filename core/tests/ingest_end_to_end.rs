#![allow(clippy::unwrap_used, clippy::expect_used)]
//! End-to-end ingestion against a file-backed pool.

mod common;

use std::sync::Arc;
use std::thread;

use common::{TestDb, WORKSPACE, count, item_status, seed_issue_link, seed_item, work_item_row};
use pretty_assertions::assert_eq;
use serde_json::json;
use sprintlens_core::config::AttributionConfig;
use sprintlens_core::ingest::events_for_work_item;
use sprintlens_core::model::MappingMethod;
use sprintlens_core::{AttributionResolver, IngestionStore, WebhookEvent, register_repository};

fn store() -> IngestionStore {
    IngestionStore::new(AttributionResolver::new(&AttributionConfig::default()).expect("resolver"))
}

fn three_commit_push() -> WebhookEvent {
    let body = json!({
        "ref": "refs/heads/main",
        "repository": { "full_name": "acme/web" },
        "commits": [
            { "id": "sha-1", "message": "Refactor header", "timestamp": "2026-03-02T09:00:00Z" },
            { "id": "sha-2", "message": "Add login form\n\ncloses #7", "timestamp": "2026-03-02T09:30:00Z" },
            { "id": "sha-3", "message": "Fix typo", "timestamp": "2026-03-02T10:00:00Z" }
        ]
    });
    WebhookEvent::from_github("push", &serde_json::to_vec(&body).unwrap())
        .unwrap()
        .expect("push is supported")
}

#[test]
fn push_of_three_commits_stores_three_rows_without_touching_work_items() {
    let db = TestDb::new();
    let conn = db.conn();
    seed_item(&conn, "item-a", "IN_PROGRESS", Some(3.0));
    seed_issue_link(&conn, 7, "item-a");
    conn.execute(
        "UPDATE work_items SET due_date = '2026-03-10T00:00:00.000Z' WHERE id = 'item-a'",
        [],
    )
    .unwrap();
    register_repository(&conn, "int-gh", WORKSPACE, "https://github.com/Acme/Web.git").unwrap();
    let item_before = work_item_row(&conn, "item-a");

    let report = store().ingest(&conn, &three_commit_push(), Some("delivery-1")).unwrap();
    assert_eq!(report.stored, 3);
    assert_eq!(report.attributed, 1);
    assert!(report.failed.is_empty());
    assert_eq!(count(&conn, "activity_events"), 3);

    let linked = events_for_work_item(&conn, "item-a").unwrap();
    assert_eq!(linked.len(), 1);
    assert_eq!(linked[0].external_id, "sha-2");
    assert_eq!(linked[0].mapping_method, Some(MappingMethod::Explicit));
    assert_eq!(linked[0].mapping_confidence, Some(1.0));
    assert_eq!(linked[0].text, "Add login form");
    assert_eq!(linked[0].workspace_id, WORKSPACE);

    // Attribution never touches the work item or its history.
    assert_eq!(item_status(&conn, "item-a"), "IN_PROGRESS");
    assert_eq!(work_item_row(&conn, "item-a"), item_before);
    assert_eq!(count(&conn, "work_item_status_changes"), 0);

    let replay = store().ingest(&conn, &three_commit_push(), Some("delivery-2")).unwrap();
    assert_eq!(replay.stored, 0);
    assert_eq!(replay.duplicates, 3);
    assert_eq!(count(&conn, "activity_events"), 3);
}

#[test]
fn concurrent_redeliveries_store_each_event_once() {
    let db = TestDb::new();
    {
        let conn = db.conn();
        register_repository(&conn, "int-gh", WORKSPACE, "acme/web").unwrap();
    }

    let pool = db.pool.clone();
    let store = Arc::new(store());
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let pool = pool.clone();
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let conn = pool.get().unwrap();
                store
                    .ingest(&conn, &three_commit_push(), Some(&format!("delivery-{i}")))
                    .unwrap()
            })
        })
        .collect();

    let reports: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let stored: usize = reports.iter().map(|r| r.stored).sum();
    let duplicates: usize = reports.iter().map(|r| r.duplicates).sum();
    assert_eq!(stored, 3);
    assert_eq!(duplicates, 9);
    assert_eq!(count(&db.conn(), "activity_events"), 3);
}
