//! Repository → workspace resolution.
//!
//! Each code-hosting integration claims one or more repositories. Claims are
//! keyed by a normalized repository identity with a UNIQUE constraint, so a
//! repository can never belong to two integrations and lookups never depend
//! on iteration order.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

use crate::db::codec::encode_ts;
use crate::db::is_unique_violation;
use crate::errors::{CoreError, Result};

/// The integration and workspace that own a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryOwner {
    pub integration_id: String,
    pub workspace_id: String,
}

/// Canonical form of a repository identity: `owner/name`, lowercased, with
/// any URL scheme, host, `.git` suffix and surrounding slashes removed.
pub fn normalize_repository(raw: &str) -> String {
    let mut s = raw.trim().to_ascii_lowercase();

    if let Some(rest) = s.strip_prefix("git@") {
        // git@github.com:owner/name.git
        s = rest.split_once(':').map_or(rest, |(_, path)| path).to_string();
    } else if let Some((_, rest)) = s.split_once("://") {
        // https://github.com/owner/name
        s = rest.split_once('/').map_or("", |(_, path)| path).to_string();
    }

    let trimmed = s.trim_matches('/');
    trimmed.strip_suffix(".git").unwrap_or(trimmed).to_string()
}

/// Find the active integration that claims `repository_full_name`.
pub fn find_owning_workspace(
    conn: &Connection,
    repository_full_name: &str,
) -> Result<Option<RepositoryOwner>> {
    let key = normalize_repository(repository_full_name);
    if key.is_empty() {
        return Ok(None);
    }

    let owner = conn
        .query_row(
            "SELECT i.id, i.workspace_id
             FROM integration_repositories r
             JOIN integrations i ON i.id = r.integration_id
             WHERE r.repository_key = ?1 AND i.active = 1",
            params![key],
            |row| {
                Ok(RepositoryOwner {
                    integration_id: row.get(0)?,
                    workspace_id: row.get(1)?,
                })
            },
        )
        .optional()?;
    Ok(owner)
}

/// Claim a repository for an integration, creating the integration record if
/// needed. Re-registering the same pair is a no-op; claiming a repository that
/// another integration already owns is a `Conflict`.
pub fn register_repository(
    conn: &Connection,
    integration_id: &str,
    workspace_id: &str,
    repository_full_name: &str,
) -> Result<RepositoryOwner> {
    let key = normalize_repository(repository_full_name);
    if key.is_empty() {
        return Err(CoreError::config(format!(
            "invalid repository name: {repository_full_name:?}"
        )));
    }

    let existing_workspace: Option<String> = conn
        .query_row(
            "SELECT workspace_id FROM integrations WHERE id = ?1",
            params![integration_id],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(ws) = &existing_workspace
        && ws != workspace_id
    {
        return Err(CoreError::Conflict(format!(
            "integration {integration_id} belongs to workspace {ws}"
        )));
    }

    // Both writes land together or not at all, so a refused claim never
    // leaves a half-registered integration behind.
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO integrations (id, workspace_id, active, created_at)
         VALUES (?1, ?2, 1, ?3)
         ON CONFLICT (id) DO NOTHING",
        params![integration_id, workspace_id, encode_ts(&Utc::now())],
    )?;
    let inserted = tx.execute(
        "INSERT INTO integration_repositories (repository_key, repository_full_name, integration_id)
         VALUES (?1, ?2, ?3)",
        params![key, repository_full_name.trim(), integration_id],
    );
    match inserted {
        Ok(_) => {
            tx.commit()?;
            tracing::info!(
                repository = %key,
                integration_id,
                workspace_id,
                "Registered repository"
            );
        }
        Err(e) if is_unique_violation(&e) => {
            tx.rollback()?;
            let owner: String = conn.query_row(
                "SELECT integration_id FROM integration_repositories WHERE repository_key = ?1",
                params![key],
                |row| row.get(0),
            )?;
            if owner != integration_id {
                return Err(CoreError::Conflict(format!(
                    "repository {key} is already registered to integration {owner}"
                )));
            }
        }
        Err(e) => return Err(e.into()),
    }

    Ok(RepositoryOwner {
        integration_id: integration_id.to_string(),
        workspace_id: workspace_id.to_string(),
    })
}

/// Mark an integration inactive; its repositories stop resolving.
pub fn deactivate_integration(conn: &Connection, integration_id: &str) -> Result<()> {
    let changed = conn.execute(
        "UPDATE integrations SET active = 0 WHERE id = ?1",
        params![integration_id],
    )?;
    if changed == 0 {
        return Err(CoreError::NotFound {
            entity: "integration",
            id: integration_id.to_string(),
        });
    }
    tracing::info!(integration_id, "Deactivated integration");
    Ok(())
}
