#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Black-box tests for the `sprintlens` binary.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use pretty_assertions::assert_eq;
use rusqlite::{Connection, params};
use tempfile::TempDir;

struct Env {
    dir: TempDir,
}

impl Env {
    fn new() -> Self {
        let env = Self {
            dir: TempDir::new().unwrap(),
        };
        env.cmd().arg("migrate").assert().success();
        env
    }

    fn db(&self) -> PathBuf {
        self.dir.path().join("sl.db")
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("sprintlens").unwrap();
        cmd.env("SPRINTLENS_CONFIG", self.dir.path().join("missing.toml"))
            .env_remove("SPRINTLENS_WEBHOOK_SECRET")
            .env("RUST_LOG", "warn")
            .arg("--db")
            .arg(self.db());
        cmd
    }

    fn sql(&self) -> Connection {
        Connection::open(self.db()).unwrap()
    }

    fn write(&self, name: &str, body: &serde_json::Value) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, serde_json::to_vec(body).unwrap()).unwrap();
        path
    }
}

fn seed_sprint(conn: &Connection) {
    conn.execute_batch(
        "INSERT INTO sprints (id, workspace_id, name, start_date, end_date, status)
         VALUES ('s1', 'ws-1', 'Sprint 1', '2026-03-01T00:00:00.000Z', '2026-03-11T00:00:00.000Z', 'ACTIVE');
         INSERT INTO work_items (id, workspace_id, title, kanban_status, effort_estimate, created_at)
         VALUES ('item-a', 'ws-1', 'A', 'DONE', 3.0, '2026-02-01T00:00:00.000Z'),
                ('item-b', 'ws-1', 'B', 'TODO', 5.0, '2026-02-01T00:00:00.000Z');
         INSERT INTO sprint_items (sprint_id, work_item_id, added_at)
         VALUES ('s1', 'item-a', '2026-02-28T00:00:00.000Z'),
                ('s1', 'item-b', '2026-02-28T00:00:00.000Z');",
    )
    .unwrap();
}

fn json_stdout(cmd: &mut Command) -> serde_json::Value {
    let output = cmd.output().unwrap();
    assert!(output.status.success(), "command failed: {output:?}");
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn migrate_reports_schema_version() {
    let env = Env::new();
    env.cmd()
        .arg("migrate")
        .assert()
        .success()
        .stdout(predicate::str::contains("schema version 1"));
}

#[test]
fn metrics_json_for_seeded_sprint() {
    let env = Env::new();
    seed_sprint(&env.sql());

    let value = json_stdout(env.cmd().args(["metrics", "--sprint", "s1", "--json"]));
    assert_eq!(value["total_actions"], 2);
    assert_eq!(value["completed_effort"], 3.0);
    assert_eq!(value["completion_rate"], 50.0);
    assert_eq!(value["status_counts"]["todo"], 1);
}

#[test]
fn unknown_sprint_fails() {
    let env = Env::new();
    env.cmd()
        .args(["metrics", "--sprint", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("sprint not found: nope"));
}

#[test]
fn ingest_push_and_replay() {
    let env = Env::new();
    seed_sprint(&env.sql());
    env.sql()
        .execute(
            "INSERT INTO issue_sync_links (workspace_id, issue_number, work_item_id) VALUES (?1, ?2, ?3)",
            params!["ws-1", 7, "item-b"],
        )
        .unwrap();
    env.cmd()
        .args(["repo", "register", "-i", "int-1", "-w", "ws-1", "-r", "git@github.com:acme/web.git"])
        .assert()
        .success()
        .stdout(predicate::str::contains("acme/web -> integration int-1"));

    let payload = env.write(
        "push.json",
        &serde_json::json!({
            "ref": "refs/heads/main",
            "repository": { "full_name": "acme/web" },
            "commits": [
                { "id": "abc", "message": "closes #7", "timestamp": "2026-03-02T10:00:00Z" },
                { "id": "def", "message": "chore", "timestamp": "2026-03-02T11:00:00Z" }
            ]
        }),
    );

    let first = json_stdout(
        env.cmd()
            .args(["ingest", "--event", "push", "--delivery", "d-1", "--json", "--file"])
            .arg(&payload),
    );
    assert_eq!(first["stored"], 2);
    assert_eq!(first["attributed"], 1);

    let replay = json_stdout(
        env.cmd()
            .args(["ingest", "--event", "push", "--json", "--file"])
            .arg(&payload),
    );
    assert_eq!(replay["stored"], 0);
    assert_eq!(replay["duplicates"], 2);

    let rows: i64 = env
        .sql()
        .query_row("SELECT COUNT(*) FROM activity_events", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 2);
}

#[test]
fn unsupported_event_is_rejected() {
    let env = Env::new();
    let payload = env.write("ping.json", &serde_json::json!({ "zen": "hi" }));
    env.cmd()
        .args(["ingest", "--event", "ping", "--file"])
        .arg(&payload)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported event"));
}

#[test]
fn resolve_prefers_explicit_reference() {
    let env = Env::new();
    seed_sprint(&env.sql());
    env.sql()
        .execute(
            "INSERT INTO issue_sync_links (workspace_id, issue_number, work_item_id) VALUES ('ws-1', 42, 'item-a')",
            [],
        )
        .unwrap();

    env.cmd()
        .args(["resolve", "-w", "ws-1", "-m", "Fixes #42"])
        .assert()
        .success()
        .stdout(predicate::str::contains("item-a (explicit, confidence 1.00)"));

    env.cmd()
        .args(["resolve", "-w", "ws-1", "-b", "main", "-m", "tidy"])
        .assert()
        .success()
        .stdout(predicate::str::contains("unattributed"));
}

#[test]
fn snapshot_then_burndown() {
    let env = Env::new();
    seed_sprint(&env.sql());

    let captured = json_stdout(env.cmd().args(["snapshot", "--all-active", "--json"]));
    assert_eq!(captured["captured"].as_array().map(Vec::len), Some(1));

    let series = json_stdout(env.cmd().args(["burndown", "--sprint", "s1", "--json"]));
    let points = series.as_array().unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0]["remaining_effort"], 5.0);
}

#[test]
fn risks_json_lists_signals() {
    let env = Env::new();
    seed_sprint(&env.sql());
    env.sql()
        .execute(
            "INSERT INTO work_item_dependencies (work_item_id, blocked_by_id) VALUES ('item-b', 'item-a')",
            [],
        )
        .unwrap();

    let value = json_stdout(env.cmd().args(["risks", "--sprint", "s1", "--json"]));
    let kinds: Vec<_> = value
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["type"].as_str().unwrap().to_string())
        .collect();
    assert!(kinds.contains(&"blocked_items".to_string()), "{kinds:?}");
}

#[test]
fn repo_lookup_after_deactivate() {
    let env = Env::new();
    env.cmd()
        .args(["repo", "register", "-i", "int-1", "-w", "ws-1", "-r", "acme/web"])
        .assert()
        .success();
    env.cmd()
        .args(["repo", "deactivate", "-i", "int-1"])
        .assert()
        .success();
    env.cmd()
        .args(["repo", "lookup", "-r", "https://github.com/acme/web"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not claimed"));
    assert!(Path::new(&env.db()).exists());
}
