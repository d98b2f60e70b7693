//! Sprint analytics and git activity attribution.
//!
//! Attributes code-hosting events (commits, pull requests, reviews) to work
//! items and derives sprint metrics, daily burndown snapshots and risk
//! signals from shared SQLite storage.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod attribution;
pub mod burndown;
pub mod config;
pub mod db;
pub mod errors;
pub mod ingest;
pub mod integrations;
pub mod metrics;
pub mod model;
pub mod risk;
pub mod sprints;

#[cfg(test)]
mod test_support;

pub use attribution::{Attribution, AttributionResolver, WorkItemDirectory};
pub use burndown::{
    BurndownPoint, CaptureSummary, burndown_series, capture_active_sprints, capture_daily_snapshot,
};
pub use config::SprintLensConfig;
pub use errors::{CoreError, ErrorCategory, Result};
pub use ingest::{IngestReport, IngestionStore, WebhookEvent};
pub use integrations::{RepositoryOwner, find_owning_workspace, register_repository};
pub use metrics::{SprintMetrics, compute_metrics};
pub use risk::detect;

/// Crate version, reported by the binaries.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
