//! Reporting subcommands: metrics, burndown, risks and snapshots.

use chrono::Utc;
use clap::Parser;
use sprintlens_core::burndown::{capture_active_sprints, capture_daily_snapshot};
use sprintlens_core::db::SCHEMA_VERSION;
use sprintlens_core::{burndown_series, compute_metrics, risk};

use crate::context::{Context, print_json};

#[derive(Debug, Parser)]
pub struct SprintArgs {
    /// Sprint id.
    #[arg(long = "sprint", short = 's')]
    pub sprint: String,
}

#[derive(Debug, Parser)]
#[command(group = clap::ArgGroup::new("target").required(true).args(["sprint", "all_active"]))]
pub struct SnapshotArgs {
    /// Capture a single sprint.
    #[arg(long = "sprint", short = 's')]
    pub sprint: Option<String>,

    /// Capture every ACTIVE sprint.
    #[arg(long = "all-active")]
    pub all_active: bool,
}

pub fn cmd_migrate(ctx: &Context) -> anyhow::Result<()> {
    // Opening the pool already migrated.
    if ctx.json {
        return print_json(&serde_json::json!({ "schema_version": SCHEMA_VERSION }));
    }
    println!("Database is at schema version {SCHEMA_VERSION}");
    Ok(())
}

pub fn cmd_metrics(ctx: &Context, args: &SprintArgs) -> anyhow::Result<()> {
    let metrics = compute_metrics(&*ctx.conn()?, &args.sprint)?;
    if ctx.json {
        return print_json(&metrics);
    }

    let c = &metrics.status_counts;
    println!(
        "Sprint {}: {} items ({} planned, {} added)",
        metrics.sprint_id, metrics.total_actions, metrics.planned_actions, metrics.added_actions
    );
    println!(
        "  backlog {}  todo {}  in progress {}  in review {}  done {}  cancelled {}",
        c.backlog, c.todo, c.in_progress, c.in_review, c.done, c.cancelled
    );
    println!(
        "  effort {:.1} total, {:.1} completed ({:.1} planned, {:.1} added)",
        metrics.total_effort, metrics.completed_effort, metrics.planned_effort, metrics.added_effort
    );
    println!(
        "  completion {:.1}%  velocity {:.1}",
        metrics.completion_rate, metrics.velocity
    );
    Ok(())
}

pub fn cmd_burndown(ctx: &Context, args: &SprintArgs) -> anyhow::Result<()> {
    let series = burndown_series(&*ctx.conn()?, &args.sprint)?;
    if ctx.json {
        return print_json(&series);
    }
    if series.is_empty() {
        println!("No burndown for sprint {}: needs start/end dates and at least one snapshot", args.sprint);
        return Ok(());
    }
    println!("{:<12} {:>10} {:>10} {:>10}", "date", "remaining", "ideal", "completed");
    for point in &series {
        println!(
            "{:<12} {:>10.1} {:>10.1} {:>10.1}",
            point.date.to_string(),
            point.remaining_effort,
            point.ideal_remaining,
            point.completed_effort
        );
    }
    Ok(())
}

pub fn cmd_risks(ctx: &Context, args: &SprintArgs) -> anyhow::Result<()> {
    let signals = risk::detect(&*ctx.conn()?, &args.sprint, &ctx.config.risk)?;
    if ctx.json {
        return print_json(&signals);
    }
    if signals.is_empty() {
        println!("No risks detected for sprint {}", args.sprint);
        return Ok(());
    }
    for signal in &signals {
        println!(
            "[{}] {}: {}",
            signal.severity.as_str(),
            signal.signal_type.as_str(),
            signal.message
        );
        if !signal.affected_work_item_ids.is_empty() {
            println!("    items: {}", signal.affected_work_item_ids.join(", "));
        }
    }
    Ok(())
}

pub fn cmd_snapshot(ctx: &Context, args: &SnapshotArgs) -> anyhow::Result<()> {
    let conn = ctx.conn()?;
    if let Some(sprint_id) = &args.sprint {
        let snapshot = capture_daily_snapshot(&conn, sprint_id)?;
        if ctx.json {
            return print_json(&snapshot);
        }
        println!(
            "Captured {} for sprint {} ({:.1}/{:.1} effort done)",
            snapshot.day, snapshot.sprint_id, snapshot.completed_effort, snapshot.total_effort
        );
        return Ok(());
    }

    let summary = capture_active_sprints(&conn, Utc::now())?;
    if ctx.json {
        print_json(&summary)?;
    } else {
        println!(
            "Captured {} active sprint(s), {} failed",
            summary.captured.len(),
            summary.failed.len()
        );
        for failure in &summary.failed {
            println!("  {}: {}", failure.sprint_id, failure.reason);
        }
    }
    if !summary.failed.is_empty() {
        anyhow::bail!("{} sprint snapshot(s) failed", summary.failed.len());
    }
    Ok(())
}
