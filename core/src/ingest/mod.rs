//! Idempotent ingestion of code-hosting webhook deliveries.
//!
//! A delivery expands into candidate events. Each candidate is deduplicated on
//! `(external_id, event_type)`, attributed inside the owning workspace and
//! written as one immutable `activity_events` row. Candidates are isolated:
//! a failure is recorded in the [`IngestReport`] and the rest carry on.
//!
//! Concurrent or replayed deliveries are safe because the final arbiter is the
//! table's UNIQUE constraint, not the pre-insert existence check.

pub mod payload;
pub mod queries;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use serde::Serialize;

use crate::attribution::{Attribution, AttributionResolver};
use crate::db::codec::encode_ts;
use crate::db::is_unique_violation;
use crate::errors::Result;
use crate::integrations::{RepositoryOwner, find_owning_workspace, normalize_repository};

pub use payload::{ActivityDetail, CandidateEvent, WebhookEvent};
pub use queries::{count_activity_on_day, events_for_work_item, find_event};

/// A candidate that could not be stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    pub reason: String,
}

/// Outcome of one delivery.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_id: Option<String>,
    /// New rows written.
    pub stored: usize,
    /// Subset of `stored` linked to a work item.
    pub attributed: usize,
    /// Already present; skipped without touching the stored row.
    pub duplicates: usize,
    /// Dropped because no active integration owns the repository.
    pub unattributable: usize,
    pub failed: Vec<FailedEvent>,
}

impl IngestReport {
    pub fn total(&self) -> usize {
        self.stored + self.duplicates + self.unattributable + self.failed.len()
    }
}

enum Outcome {
    Stored { attributed: bool },
    Duplicate,
}

/// Writes activity events. Holds the compiled attribution patterns so a
/// long-running receiver builds them once.
#[derive(Debug, Clone)]
pub struct IngestionStore {
    resolver: AttributionResolver,
}

impl IngestionStore {
    pub fn new(resolver: AttributionResolver) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &AttributionResolver {
        &self.resolver
    }

    /// Ingest every candidate of `event`.
    ///
    /// Errors only when the owning repository cannot be looked up at all;
    /// per-candidate problems land in [`IngestReport::failed`].
    pub fn ingest(
        &self,
        conn: &Connection,
        event: &WebhookEvent,
        delivery_id: Option<&str>,
    ) -> Result<IngestReport> {
        self.ingest_at(conn, event, delivery_id, Utc::now())
    }

    pub fn ingest_at(
        &self,
        conn: &Connection,
        event: &WebhookEvent,
        delivery_id: Option<&str>,
        received_at: DateTime<Utc>,
    ) -> Result<IngestReport> {
        let mut report = IngestReport {
            delivery_id: delivery_id.map(str::to_string),
            ..IngestReport::default()
        };
        let repository = event.repository_full_name();

        // Dedup runs first, so a replay stays a duplicate even after the
        // owning integration has been deactivated.
        let mut pending = Vec::new();
        for candidate in event.candidates() {
            let candidate = match candidate {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(
                        delivery_id,
                        error = %e,
                        category = e.category().as_str(),
                        "Skipping malformed event"
                    );
                    report.failed.push(FailedEvent {
                        external_id: None,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            match queries::event_exists(conn, &candidate.external_id, candidate.event_type()) {
                Ok(true) => {
                    tracing::debug!(external_id = %candidate.external_id, "Duplicate event");
                    report.duplicates += 1;
                }
                Ok(false) => pending.push(candidate),
                Err(e) => report.failed.push(FailedEvent {
                    external_id: Some(candidate.external_id.clone()),
                    reason: e.to_string(),
                }),
            }
        }
        if pending.is_empty() {
            tracing::info!(
                delivery_id,
                kind = event.kind(),
                duplicates = report.duplicates,
                failed = report.failed.len(),
                "Nothing new in delivery"
            );
            return Ok(report);
        }

        let Some(owner) = find_owning_workspace(conn, repository)? else {
            tracing::warn!(
                repository,
                delivery_id,
                kind = event.kind(),
                dropped = pending.len(),
                "No active integration owns repository; dropping events"
            );
            report.unattributable = pending.len();
            return Ok(report);
        };

        for candidate in &pending {
            match self.store_candidate(conn, &owner, repository, candidate, delivery_id, received_at)
            {
                Ok(Outcome::Stored { attributed }) => {
                    report.stored += 1;
                    if attributed {
                        report.attributed += 1;
                    }
                }
                Ok(Outcome::Duplicate) => report.duplicates += 1,
                Err(e) => {
                    tracing::warn!(
                        delivery_id,
                        external_id = %candidate.external_id,
                        event_type = candidate.event_type().as_str(),
                        error = %e,
                        "Failed to store event"
                    );
                    report.failed.push(FailedEvent {
                        external_id: Some(candidate.external_id.clone()),
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            delivery_id,
            kind = event.kind(),
            workspace_id = %owner.workspace_id,
            stored = report.stored,
            attributed = report.attributed,
            duplicates = report.duplicates,
            failed = report.failed.len(),
            "Ingested delivery"
        );
        Ok(report)
    }

    fn store_candidate(
        &self,
        conn: &Connection,
        owner: &RepositoryOwner,
        repository: &str,
        candidate: &CandidateEvent,
        delivery_id: Option<&str>,
        received_at: DateTime<Utc>,
    ) -> Result<Outcome> {
        let event_type = candidate.event_type();
        let attribution = self.resolver.resolve(
            conn,
            candidate.branch_name.as_deref(),
            &candidate.message,
            &owner.workspace_id,
        )?;
        let (work_item_id, method, confidence) = match &attribution {
            Some(Attribution {
                work_item_id,
                method,
                confidence,
            }) => (Some(work_item_id.as_str()), Some(method.as_str()), Some(*confidence)),
            None => (None, None, None),
        };

        let inserted = conn.execute(
            "INSERT INTO activity_events (
                id, external_id, event_type, event_timestamp, branch_name, text,
                repository, workspace_id, integration_id, author, action,
                pull_request_number, merged_at, work_item_id, mapping_method,
                mapping_confidence, delivery_id, received_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                uuid::Uuid::new_v4().to_string(),
                candidate.external_id,
                event_type.as_str(),
                encode_ts(&candidate.event_timestamp),
                candidate.branch_name,
                candidate.summary(),
                normalize_repository(repository),
                owner.workspace_id,
                owner.integration_id,
                candidate.author,
                candidate.action(),
                candidate.pull_request_number(),
                candidate.merged_at().as_ref().map(encode_ts),
                work_item_id,
                method,
                confidence,
                delivery_id,
                encode_ts(&received_at),
            ],
        );

        match inserted {
            Ok(_) => {
                tracing::info!(
                    external_id = %candidate.external_id,
                    event_type = event_type.as_str(),
                    work_item_id,
                    mapping_method = method,
                    "Stored activity event"
                );
                Ok(Outcome::Stored {
                    attributed: attribution.is_some(),
                })
            }
            // Lost a race with a concurrent delivery of the same event.
            Err(e) if is_unique_violation(&e) => Ok(Outcome::Duplicate),
            Err(e) => Err(e.into()),
        }
    }
}
