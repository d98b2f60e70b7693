//! Live sprint metrics.
//!
//! Everything is derived from current sprint membership and item state.
//! Velocity is this sprint's completed effort; rolling velocity across
//! sprints is not computed here.

use rusqlite::Connection;
use serde::Serialize;

use crate::errors::Result;
use crate::model::{KanbanStatus, Sprint, SprintWorkItem, StatusCounts};
use crate::sprints::{load_sprint, load_sprint_items};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SprintMetrics {
    pub sprint_id: String,
    pub total_actions: u32,
    pub status_counts: StatusCounts,
    pub total_effort: f64,
    pub completed_effort: f64,
    /// Items present when the sprint started.
    pub planned_actions: u32,
    pub planned_effort: f64,
    /// Items that joined after the sprint started.
    pub added_actions: u32,
    pub added_effort: f64,
    pub completed_actions: u32,
    /// Percent of planned items completed, in `[0, 100]`.
    pub completion_rate: f64,
    pub velocity: f64,
}

impl SprintMetrics {
    pub fn remaining_effort(&self) -> f64 {
        self.total_effort - self.completed_effort
    }
}

pub fn compute_metrics(conn: &Connection, sprint_id: &str) -> Result<SprintMetrics> {
    let sprint = load_sprint(conn, sprint_id)?;
    let items = load_sprint_items(conn, sprint_id)?;
    let metrics = metrics_from_items(&sprint, &items);
    tracing::debug!(
        sprint_id,
        total_actions = metrics.total_actions,
        completed_actions = metrics.completed_actions,
        completion_rate = metrics.completion_rate,
        "Computed sprint metrics"
    );
    Ok(metrics)
}

/// Pure core of [`compute_metrics`].
pub fn metrics_from_items(sprint: &Sprint, items: &[SprintWorkItem]) -> SprintMetrics {
    let mut status_counts = StatusCounts::default();
    let mut total_effort = 0.0;
    let mut completed_effort = 0.0;
    let mut added_actions = 0u32;
    let mut added_effort = 0.0;

    for item in items {
        status_counts.increment(item.status);
        total_effort += item.effort();
        if item.status == KanbanStatus::Done {
            completed_effort += item.effort();
        }
        // Without a start date nothing counts as added.
        if let Some(start) = sprint.start_date
            && item.added_at > start
        {
            added_actions += 1;
            added_effort += item.effort();
        }
    }

    let total_actions = status_counts.total();
    let planned_actions = total_actions - added_actions;
    let completed_actions = status_counts.done;
    let completion_rate = if planned_actions == 0 {
        0.0
    } else {
        (f64::from(completed_actions) / f64::from(planned_actions) * 100.0).clamp(0.0, 100.0)
    };

    SprintMetrics {
        sprint_id: sprint.id.clone(),
        total_actions,
        status_counts,
        total_effort,
        completed_effort,
        planned_actions,
        planned_effort: total_effort - added_effort,
        added_actions,
        added_effort,
        completed_actions,
        completion_rate,
        velocity: completed_effort,
    }
}
