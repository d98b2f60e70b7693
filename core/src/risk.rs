//! Risk heuristics over live sprint state.
//!
//! Each heuristic is independent and all of them run on every call. Signals
//! are computed fresh from current membership and item state; stored
//! snapshots are never consulted.

use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;

use crate::config::RiskConfig;
use crate::errors::Result;
use crate::metrics::{SprintMetrics, metrics_from_items};
use crate::model::{KanbanStatus, RiskSignal, RiskSignalType, Severity, Sprint, SprintWorkItem};
use crate::sprints::{load_sprint, load_sprint_items};

pub fn detect(conn: &Connection, sprint_id: &str, cfg: &RiskConfig) -> Result<Vec<RiskSignal>> {
    detect_at(conn, sprint_id, cfg, Utc::now())
}

pub fn detect_at(
    conn: &Connection,
    sprint_id: &str,
    cfg: &RiskConfig,
    now: DateTime<Utc>,
) -> Result<Vec<RiskSignal>> {
    let sprint = load_sprint(conn, sprint_id)?;
    let items = load_sprint_items(conn, sprint_id)?;
    let signals = evaluate(&sprint, &items, cfg, now);
    tracing::debug!(sprint_id, signals = signals.len(), "Evaluated sprint risks");
    Ok(signals)
}

/// Run every heuristic against an already-loaded sprint.
pub fn evaluate(
    sprint: &Sprint,
    items: &[SprintWorkItem],
    cfg: &RiskConfig,
    now: DateTime<Utc>,
) -> Vec<RiskSignal> {
    let metrics = metrics_from_items(sprint, items);
    [
        scope_creep(sprint, items, &metrics, cfg),
        stale_items(items, cfg, now),
        overdue_items(items, cfg, now),
        blocked_items(items, cfg),
        velocity_drop(sprint, &metrics, cfg, now),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn count_severity(count: usize, high_above: usize) -> Severity {
    if count > high_above {
        Severity::High
    } else {
        Severity::Medium
    }
}

fn ids<'a>(items: impl Iterator<Item = &'a SprintWorkItem>) -> Vec<String> {
    items.map(|i| i.id.clone()).collect()
}

pub fn scope_creep(
    sprint: &Sprint,
    items: &[SprintWorkItem],
    metrics: &SprintMetrics,
    cfg: &RiskConfig,
) -> Option<RiskSignal> {
    let total = metrics.planned_actions + metrics.added_actions;
    if total == 0 || metrics.added_actions == 0 {
        return None;
    }
    let ratio = f64::from(metrics.added_actions) / f64::from(total);
    let severity = if ratio > cfg.scope_creep_high {
        Severity::High
    } else if ratio > cfg.scope_creep_medium {
        Severity::Medium
    } else {
        return None;
    };

    let start = sprint.start_date?;
    Some(RiskSignal {
        signal_type: RiskSignalType::ScopeCreep,
        severity,
        message: format!(
            "{} of {total} items were added after the sprint started ({:.0}% scope growth)",
            metrics.added_actions,
            ratio * 100.0
        ),
        affected_work_item_ids: ids(items.iter().filter(|i| i.added_at > start)),
    })
}

pub fn stale_items(
    items: &[SprintWorkItem],
    cfg: &RiskConfig,
    now: DateTime<Utc>,
) -> Option<RiskSignal> {
    let cutoff = now - Duration::days(cfg.stale_after_days);
    let stale = ids(items.iter().filter(|i| {
        i.status == KanbanStatus::InProgress
            && i.last_status_change_at.is_none_or(|changed| changed < cutoff)
    }));
    if stale.is_empty() {
        return None;
    }
    Some(RiskSignal {
        signal_type: RiskSignalType::StaleItems,
        severity: count_severity(stale.len(), cfg.stale_high_above),
        message: format!(
            "{} in-progress items have not changed status in over {} days",
            stale.len(),
            cfg.stale_after_days
        ),
        affected_work_item_ids: stale,
    })
}

pub fn overdue_items(
    items: &[SprintWorkItem],
    cfg: &RiskConfig,
    now: DateTime<Utc>,
) -> Option<RiskSignal> {
    let overdue = ids(items.iter().filter(|i| {
        !i.status.is_closed() && i.due_date.is_some_and(|due| due < now)
    }));
    if overdue.is_empty() {
        return None;
    }
    Some(RiskSignal {
        signal_type: RiskSignalType::OverdueItems,
        severity: count_severity(overdue.len(), cfg.overdue_high_above),
        message: format!("{} open items are past their due date", overdue.len()),
        affected_work_item_ids: overdue,
    })
}

pub fn blocked_items(items: &[SprintWorkItem], cfg: &RiskConfig) -> Option<RiskSignal> {
    let blocked = ids(
        items
            .iter()
            .filter(|i| !i.status.is_closed() && !i.blocked_by.is_empty()),
    );
    if blocked.is_empty() {
        return None;
    }
    Some(RiskSignal {
        signal_type: RiskSignalType::BlockedItems,
        severity: count_severity(blocked.len(), cfg.blocked_high_above),
        message: format!("{} open items are blocked by other work", blocked.len()),
        affected_work_item_ids: blocked,
    })
}

pub fn velocity_drop(
    sprint: &Sprint,
    metrics: &SprintMetrics,
    cfg: &RiskConfig,
    now: DateTime<Utc>,
) -> Option<RiskSignal> {
    let (start, end) = (sprint.start_date?, sprint.end_date?);
    let length = (end - start).num_seconds();
    if length <= 0 {
        return None;
    }
    let elapsed = (now - start).num_seconds() as f64 / length as f64;
    if elapsed <= cfg.velocity_elapsed || metrics.completion_rate >= cfg.velocity_completion_below
    {
        return None;
    }
    let severity = if elapsed > cfg.velocity_critical_elapsed {
        Severity::Critical
    } else {
        Severity::High
    };
    Some(RiskSignal {
        signal_type: RiskSignalType::VelocityDrop,
        severity,
        message: format!(
            "{:.0}% of the sprint has elapsed but only {:.0}% of planned items are done",
            (elapsed * 100.0).min(100.0),
            metrics.completion_rate
        ),
        affected_work_item_ids: Vec::new(),
    })
}
