//! Domain types shared by the attribution, metrics, burndown and risk modules.
//!
//! Work items and sprints are owned by external collaborators; this crate
//! only ever reads them. Activity events and snapshots are the two record
//! kinds the engine writes itself.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Kanban workflow state of a work item, in board order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KanbanStatus {
    Backlog,
    Todo,
    InProgress,
    InReview,
    Done,
    Cancelled,
}

impl KanbanStatus {
    pub const ALL: [KanbanStatus; 6] = [
        KanbanStatus::Backlog,
        KanbanStatus::Todo,
        KanbanStatus::InProgress,
        KanbanStatus::InReview,
        KanbanStatus::Done,
        KanbanStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Backlog => "BACKLOG",
            Self::Todo => "TODO",
            Self::InProgress => "IN_PROGRESS",
            Self::InReview => "IN_REVIEW",
            Self::Done => "DONE",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "BACKLOG" => Some(Self::Backlog),
            "TODO" => Some(Self::Todo),
            "IN_PROGRESS" => Some(Self::InProgress),
            "IN_REVIEW" => Some(Self::InReview),
            "DONE" => Some(Self::Done),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// DONE and CANCELLED items no longer carry delivery risk.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }
}

/// A work item as seen through its sprint membership.
#[derive(Debug, Clone, PartialEq)]
pub struct SprintWorkItem {
    pub id: String,
    pub title: String,
    pub status: KanbanStatus,
    pub effort_estimate: Option<f64>,
    pub due_date: Option<DateTime<Utc>>,
    pub blocked_by: Vec<String>,
    pub last_status_change_at: Option<DateTime<Utc>>,
    /// When the item joined the sprint (not when the item was created).
    pub added_at: DateTime<Utc>,
}

impl SprintWorkItem {
    pub fn effort(&self) -> f64 {
        self.effort_estimate.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sprint {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// Lifecycle status as written by the sprint owner (ACTIVE, COMPLETED, ...).
    pub status: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Activity events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActivityEventType {
    PushCommit,
    PullRequestTransition,
    PullRequestReview,
}

impl ActivityEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PushCommit => "push_commit",
            Self::PullRequestTransition => "pull_request_transition",
            Self::PullRequestReview => "pull_request_review",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "push_commit" => Some(Self::PushCommit),
            "pull_request_transition" => Some(Self::PullRequestTransition),
            "pull_request_review" => Some(Self::PullRequestReview),
            _ => None,
        }
    }
}

/// How an activity event was linked to a work item.
///
/// `Semantic` is reserved in the stored vocabulary but never produced.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MappingMethod {
    Explicit,
    Branch,
    Semantic,
}

impl MappingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Explicit => "explicit",
            Self::Branch => "branch",
            Self::Semantic => "semantic",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "explicit" => Some(Self::Explicit),
            "branch" => Some(Self::Branch),
            "semantic" => Some(Self::Semantic),
            _ => None,
        }
    }
}

/// A persisted, immutable code-activity record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityEvent {
    pub id: String,
    pub external_id: String,
    pub event_type: ActivityEventType,
    pub event_timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_name: Option<String>,
    pub text: String,
    pub repository: String,
    pub workspace_id: String,
    pub integration_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// PR transition action (`opened`, `closed`, ...) or review state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_at: Option<DateTime<Utc>>,
    pub work_item_id: Option<String>,
    pub mapping_method: Option<MappingMethod>,
    pub mapping_confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_id: Option<String>,
    pub received_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Snapshots and report values
// ─────────────────────────────────────────────────────────────────────────────

/// Per-status item counts; every status is always present.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusCounts {
    pub backlog: u32,
    pub todo: u32,
    pub in_progress: u32,
    pub in_review: u32,
    pub done: u32,
    pub cancelled: u32,
}

impl StatusCounts {
    pub fn increment(&mut self, status: KanbanStatus) {
        *self.slot_mut(status) += 1;
    }

    pub fn get(&self, status: KanbanStatus) -> u32 {
        match status {
            KanbanStatus::Backlog => self.backlog,
            KanbanStatus::Todo => self.todo,
            KanbanStatus::InProgress => self.in_progress,
            KanbanStatus::InReview => self.in_review,
            KanbanStatus::Done => self.done,
            KanbanStatus::Cancelled => self.cancelled,
        }
    }

    pub fn total(&self) -> u32 {
        KanbanStatus::ALL.iter().map(|s| self.get(*s)).sum()
    }

    fn slot_mut(&mut self, status: KanbanStatus) -> &mut u32 {
        match status {
            KanbanStatus::Backlog => &mut self.backlog,
            KanbanStatus::Todo => &mut self.todo,
            KanbanStatus::InProgress => &mut self.in_progress,
            KanbanStatus::InReview => &mut self.in_review,
            KanbanStatus::Done => &mut self.done,
            KanbanStatus::Cancelled => &mut self.cancelled,
        }
    }
}

/// Same-day code activity counts recorded with each snapshot.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActivityCounts {
    pub commits: u32,
    pub prs_opened: u32,
    pub prs_merged: u32,
    pub reviews: u32,
}

/// One stored row per (sprint, calendar day).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SprintSnapshot {
    pub sprint_id: String,
    pub day: NaiveDate,
    pub status_counts: StatusCounts,
    pub total_effort: f64,
    pub completed_effort: f64,
    pub activity: ActivityCounts,
    pub captured_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RiskSignalType {
    ScopeCreep,
    StaleItems,
    OverdueItems,
    BlockedItems,
    VelocityDrop,
}

impl RiskSignalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ScopeCreep => "scope_creep",
            Self::StaleItems => "stale_items",
            Self::OverdueItems => "overdue_items",
            Self::BlockedItems => "blocked_items",
            Self::VelocityDrop => "velocity_drop",
        }
    }
}

/// An ephemeral warning computed from live sprint state. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskSignal {
    #[serde(rename = "type")]
    pub signal_type: RiskSignalType,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub affected_work_item_ids: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kanban_status_string_forms_agree() {
        for status in KanbanStatus::ALL {
            assert_eq!(KanbanStatus::parse(status.as_str()), Some(status));
            let json = serde_json::to_string(&status).unwrap_or_else(|e| panic!("serialize: {e}"));
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
        assert_eq!(KanbanStatus::parse("in_progress"), None);
    }

    #[test]
    fn status_counts_total_matches_increments() {
        let mut counts = StatusCounts::default();
        counts.increment(KanbanStatus::Done);
        counts.increment(KanbanStatus::Done);
        counts.increment(KanbanStatus::Backlog);
        assert_eq!(counts.done, 2);
        assert_eq!(counts.get(KanbanStatus::Backlog), 1);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn severity_orders_by_urgency() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn risk_signal_serializes_type_field() {
        let signal = RiskSignal {
            signal_type: RiskSignalType::ScopeCreep,
            severity: Severity::Medium,
            message: "scope grew".to_string(),
            affected_work_item_ids: Vec::new(),
        };
        let value = serde_json::to_value(&signal).unwrap_or_else(|e| panic!("serialize: {e}"));
        assert_eq!(value["type"], signal.signal_type.as_str());
        assert_eq!(value["severity"], signal.severity.as_str());
        assert!(value.get("affected_work_item_ids").is_none());
    }
}
