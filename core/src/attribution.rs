//! Activity attribution: link a code event to the work item it progresses.
//!
//! Tiers are tried in order and the first hit wins; results are never merged.
//!
//! 1. **Explicit**: closing keywords in the message (`fixes #42`) looked up
//!    in the issue-sync table. Confidence 1.0.
//! 2. **Branch**: a work item id embedded in the branch name
//!    (`feature/c0abc...-login-form`) that exists in the workspace. Confidence 0.9.
//! 3. **Semantic**: not implemented; the resolver gives up after tier 2.

use regex_lite::Regex;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

use crate::config::AttributionConfig;
use crate::errors::{CoreError, Result};
use crate::model::MappingMethod;

pub const EXPLICIT_CONFIDENCE: f64 = 1.0;

/// Fixed; there is no quality signal behind branch matches to derive it from.
pub const BRANCH_CONFIDENCE: f64 = 0.9;

const BRANCH_SEPARATORS: [char; 4] = ['/', '_', '.', '-'];

const ISSUE_REFERENCE_PATTERN: &str =
    r"(?i)\b(?:fix(?:es|ed)?|close[sd]?|resolve[sd]?|refs?)\b\s*:?\s*#(\d+)";

/// A resolved link from a code event to a work item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribution {
    pub work_item_id: String,
    pub method: MappingMethod,
    pub confidence: f64,
}

/// Read access the resolver needs from the work item store.
pub trait WorkItemDirectory {
    /// Work item synced to issue `issue_number` within `workspace_id`.
    fn work_item_for_issue(&self, workspace_id: &str, issue_number: u64)
    -> Result<Option<String>>;

    /// Whether `work_item_id` exists inside `workspace_id`.
    fn work_item_exists(&self, workspace_id: &str, work_item_id: &str) -> Result<bool>;
}

impl WorkItemDirectory for Connection {
    fn work_item_for_issue(
        &self,
        workspace_id: &str,
        issue_number: u64,
    ) -> Result<Option<String>> {
        let id = self
            .query_row(
                "SELECT work_item_id FROM issue_sync_links
                 WHERE workspace_id = ?1 AND issue_number = ?2",
                params![workspace_id, issue_number],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn work_item_exists(&self, workspace_id: &str, work_item_id: &str) -> Result<bool> {
        let found: Option<i64> = self
            .query_row(
                "SELECT 1 FROM work_items WHERE id = ?1 AND workspace_id = ?2",
                params![work_item_id, workspace_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

/// Tiered resolver with its patterns compiled once.
#[derive(Debug, Clone)]
pub struct AttributionResolver {
    issue_reference: Regex,
    branch_token: Regex,
}

impl AttributionResolver {
    pub fn new(cfg: &AttributionConfig) -> Result<Self> {
        let issue_reference = Regex::new(ISSUE_REFERENCE_PATTERN)
            .map_err(|e| CoreError::Internal(format!("issue reference pattern: {e}")))?;

        // Matched against whole separator-delimited segments, so the id
        // can neither run into further id characters nor swallow a neighbour.
        let prefix = regex_lite::escape(&cfg.work_item_id_prefix.to_ascii_lowercase().to_string());
        let tail = cfg.work_item_id_length.saturating_sub(1);
        let branch_pattern = format!(r"^{prefix}[a-z0-9]{{{tail}}}$");
        let branch_token = Regex::new(&branch_pattern).map_err(|e| {
            CoreError::config_with_source(format!("invalid branch pattern {branch_pattern}"), e)
        })?;

        Ok(Self {
            issue_reference,
            branch_token,
        })
    }

    /// Resolve `branch_name` / `message` to a work item in `workspace_id`.
    pub fn resolve(
        &self,
        directory: &dyn WorkItemDirectory,
        branch_name: Option<&str>,
        message: &str,
        workspace_id: &str,
    ) -> Result<Option<Attribution>> {
        if let Some(hit) = self.resolve_explicit(directory, message, workspace_id)? {
            return Ok(Some(hit));
        }
        if let Some(branch) = branch_name
            && let Some(hit) = self.resolve_branch(directory, branch, workspace_id)?
        {
            return Ok(Some(hit));
        }
        Ok(None)
    }

    /// Issue numbers referenced with a closing keyword, in order of appearance.
    pub fn issue_references(&self, message: &str) -> Vec<u64> {
        self.issue_reference
            .captures_iter(message)
            .filter_map(|caps| caps.get(1))
            .filter_map(|m| m.as_str().parse::<u64>().ok())
            .collect()
    }

    /// Candidate work item ids embedded in a branch name, left to right.
    pub fn branch_tokens<'b>(&self, branch_name: &'b str) -> Vec<&'b str> {
        branch_name
            .split(BRANCH_SEPARATORS)
            .filter(|segment| self.branch_token.is_match(segment))
            .collect()
    }

    fn resolve_explicit(
        &self,
        directory: &dyn WorkItemDirectory,
        message: &str,
        workspace_id: &str,
    ) -> Result<Option<Attribution>> {
        for issue_number in self.issue_references(message) {
            if let Some(work_item_id) = directory.work_item_for_issue(workspace_id, issue_number)?
            {
                tracing::debug!(issue_number, work_item_id = %work_item_id, "Explicit attribution");
                return Ok(Some(Attribution {
                    work_item_id,
                    method: MappingMethod::Explicit,
                    confidence: EXPLICIT_CONFIDENCE,
                }));
            }
        }
        Ok(None)
    }

    fn resolve_branch(
        &self,
        directory: &dyn WorkItemDirectory,
        branch_name: &str,
        workspace_id: &str,
    ) -> Result<Option<Attribution>> {
        for token in self.branch_tokens(branch_name) {
            if directory.work_item_exists(workspace_id, token)? {
                tracing::debug!(branch_name, work_item_id = token, "Branch attribution");
                return Ok(Some(Attribution {
                    work_item_id: token.to_string(),
                    method: MappingMethod::Branch,
                    confidence: BRANCH_CONFIDENCE,
                }));
            }
        }
        Ok(None)
    }
}
