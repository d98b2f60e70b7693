//! GitHub webhook payload shapes and their expansion into candidate events.
//!
//! Only the fields the engine reads are modelled; everything else in the
//! payload is ignored by serde.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::codec::decode_ts;
use crate::errors::{CoreError, Result};
use crate::model::ActivityEventType;

/// Stored event text is the first line of the source text, capped here.
pub const SUMMARY_MAX_CHARS: usize = 200;

// ─────────────────────────────────────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub full_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub login: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommitAuthor {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushCommit {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub author: Option<CommitAuthor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushPayload {
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub repository: Repository,
    /// Kept raw so one badly typed commit fails alone in
    /// [`WebhookEvent::candidates`] instead of rejecting the whole push.
    #[serde(default)]
    pub commits: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BranchRef {
    #[serde(rename = "ref")]
    pub git_ref: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    #[serde(default)]
    pub id: Option<u64>,
    pub number: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub head: Option<BranchRef>,
    #[serde(default)]
    pub user: Option<Account>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub closed_at: Option<String>,
    #[serde(default)]
    pub merged_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestPayload {
    pub action: String,
    pub pull_request: PullRequest,
    pub repository: Repository,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Review {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub submitted_at: Option<String>,
    #[serde(default)]
    pub user: Option<Account>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewPayload {
    pub action: String,
    pub review: Review,
    pub pull_request: PullRequest,
    pub repository: Repository,
}

/// A webhook delivery the engine knows how to ingest.
#[derive(Debug, Clone)]
pub enum WebhookEvent {
    Push(PushPayload),
    PullRequest(PullRequestPayload),
    PullRequestReview(ReviewPayload),
}

impl WebhookEvent {
    /// Parse a delivery by its `X-GitHub-Event` name.
    ///
    /// Returns `Ok(None)` for event kinds the engine does not track.
    pub fn from_github(event_name: &str, body: &[u8]) -> Result<Option<Self>> {
        let parsed = match event_name {
            "push" => serde_json::from_slice(body).map(Self::Push),
            "pull_request" => serde_json::from_slice(body).map(Self::PullRequest),
            "pull_request_review" => serde_json::from_slice(body).map(Self::PullRequestReview),
            _ => return Ok(None),
        };
        parsed
            .map(Some)
            .map_err(|e| CoreError::malformed(format!("{event_name} payload: {e}")))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Push(_) => "push",
            Self::PullRequest(_) => "pull_request",
            Self::PullRequestReview(_) => "pull_request_review",
        }
    }

    pub fn repository_full_name(&self) -> &str {
        match self {
            Self::Push(p) => &p.repository.full_name,
            Self::PullRequest(p) => &p.repository.full_name,
            Self::PullRequestReview(p) => &p.repository.full_name,
        }
    }

    /// Expand the delivery into per-event candidates.
    ///
    /// Each entry is independent: a malformed commit yields an `Err` entry
    /// without affecting the others.
    pub fn candidates(&self) -> Vec<Result<CandidateEvent>> {
        match self {
            Self::Push(p) => push_candidates(p),
            Self::PullRequest(p) => vec![pull_request_candidate(p)],
            Self::PullRequestReview(p) => {
                // Only submitted reviews count as activity.
                if p.action == "submitted" {
                    vec![review_candidate(p)]
                } else {
                    Vec::new()
                }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Candidates
// ─────────────────────────────────────────────────────────────────────────────

/// Per-kind details carried alongside the shared attribution inputs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActivityDetail {
    Commit {
        sha: String,
    },
    PullRequestTransition {
        number: u64,
        action: String,
        merged_at: Option<DateTime<Utc>>,
    },
    Review {
        review_id: u64,
        pull_request_number: u64,
        state: Option<String>,
    },
}

impl ActivityDetail {
    pub fn event_type(&self) -> ActivityEventType {
        match self {
            Self::Commit { .. } => ActivityEventType::PushCommit,
            Self::PullRequestTransition { .. } => ActivityEventType::PullRequestTransition,
            Self::Review { .. } => ActivityEventType::PullRequestReview,
        }
    }
}

/// One event extracted from a delivery, ready for dedup and attribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateEvent {
    /// Natural key together with the event type.
    pub external_id: String,
    pub event_timestamp: DateTime<Utc>,
    pub branch_name: Option<String>,
    /// Full text searched for issue references.
    pub message: String,
    pub author: Option<String>,
    pub detail: ActivityDetail,
}

impl CandidateEvent {
    pub fn event_type(&self) -> ActivityEventType {
        self.detail.event_type()
    }

    /// First non-empty line of the message, capped at [`SUMMARY_MAX_CHARS`].
    pub fn summary(&self) -> String {
        let line = self
            .message
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("");
        line.chars().take(SUMMARY_MAX_CHARS).collect()
    }

    pub fn action(&self) -> Option<&str> {
        match &self.detail {
            ActivityDetail::Commit { .. } => None,
            ActivityDetail::PullRequestTransition { action, .. } => Some(action),
            ActivityDetail::Review { state, .. } => state.as_deref(),
        }
    }

    pub fn pull_request_number(&self) -> Option<u64> {
        match &self.detail {
            ActivityDetail::Commit { .. } => None,
            ActivityDetail::PullRequestTransition { number, .. } => Some(*number),
            ActivityDetail::Review {
                pull_request_number,
                ..
            } => Some(*pull_request_number),
        }
    }

    pub fn merged_at(&self) -> Option<DateTime<Utc>> {
        match &self.detail {
            ActivityDetail::PullRequestTransition { merged_at, .. } => *merged_at,
            _ => None,
        }
    }
}

fn parse_required_ts(raw: Option<&str>, what: &str) -> Result<DateTime<Utc>> {
    let raw = raw.ok_or_else(|| CoreError::malformed(format!("{what} is missing")))?;
    decode_ts(raw).ok_or_else(|| CoreError::malformed(format!("{what} is not RFC 3339: {raw}")))
}

fn parse_optional_ts(raw: Option<&str>, what: &str) -> Result<Option<DateTime<Utc>>> {
    raw.map(|r| parse_required_ts(Some(r), what)).transpose()
}

fn push_candidates(payload: &PushPayload) -> Vec<Result<CandidateEvent>> {
    // Tag pushes carry no branch.
    let branch = payload
        .git_ref
        .strip_prefix("refs/heads/")
        .map(str::to_string);

    payload
        .commits
        .iter()
        .map(|raw| {
            let commit = PushCommit::deserialize(raw).map_err(|e| {
                let id = raw.get("id").and_then(serde_json::Value::as_str).unwrap_or("<no id>");
                CoreError::malformed(format!("commit {id}: {e}"))
            })?;
            let sha = commit
                .id
                .as_deref()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| CoreError::malformed("commit without id"))?;
            let event_timestamp =
                parse_required_ts(commit.timestamp.as_deref(), &format!("commit {sha} timestamp"))?;
            let author = commit
                .author
                .as_ref()
                .and_then(|a| a.username.clone().or_else(|| a.name.clone()));
            Ok(CandidateEvent {
                external_id: sha.to_string(),
                event_timestamp,
                branch_name: branch.clone(),
                message: commit.message,
                author,
                detail: ActivityDetail::Commit {
                    sha: sha.to_string(),
                },
            })
        })
        .collect()
}

fn pull_request_text(pr: &PullRequest) -> String {
    match pr.body.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
        Some(body) => format!("{}\n\n{body}", pr.title),
        None => pr.title.clone(),
    }
}

/// PR identity: the global id when present, else `owner/name#number`.
fn pull_request_identity(pr: &PullRequest, repository: &Repository) -> String {
    match pr.id {
        Some(id) => id.to_string(),
        None => format!("{}#{}", repository.full_name, pr.number),
    }
}

fn pull_request_candidate(payload: &PullRequestPayload) -> Result<CandidateEvent> {
    let pr = &payload.pull_request;
    let what = format!("pull request #{}", pr.number);
    let merged_at = parse_optional_ts(pr.merged_at.as_deref(), &format!("{what} merged_at"))?;

    // The moment the transition happened, as best the payload tells us.
    let moment = match payload.action.as_str() {
        "closed" => pr.merged_at.as_deref().or(pr.closed_at.as_deref()),
        "opened" | "reopened" => pr.created_at.as_deref().or(pr.updated_at.as_deref()),
        _ => pr.updated_at.as_deref(),
    }
    .or(pr.updated_at.as_deref())
    .or(pr.created_at.as_deref());
    let event_timestamp = parse_required_ts(moment, &format!("{what} timestamp"))?;

    Ok(CandidateEvent {
        external_id: format!(
            "{}:{}",
            pull_request_identity(pr, &payload.repository),
            payload.action
        ),
        event_timestamp,
        branch_name: pr.head.as_ref().map(|h| h.git_ref.clone()),
        message: pull_request_text(pr),
        author: pr.user.as_ref().map(|u| u.login.clone()),
        detail: ActivityDetail::PullRequestTransition {
            number: pr.number,
            action: payload.action.clone(),
            merged_at,
        },
    })
}

fn review_candidate(payload: &ReviewPayload) -> Result<CandidateEvent> {
    let review = &payload.review;
    let pr = &payload.pull_request;
    let review_id = review.id.ok_or_else(|| {
        CoreError::malformed(format!("review on pull request #{} without id", pr.number))
    })?;
    let event_timestamp = parse_required_ts(
        review.submitted_at.as_deref().or(pr.updated_at.as_deref()),
        &format!("review {review_id} submitted_at"),
    )?;

    // Reviews rarely reference issues themselves; the PR text carries them.
    let message = match review.body.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
        Some(body) => format!("{body}\n\n{}", pull_request_text(pr)),
        None => pull_request_text(pr),
    };

    Ok(CandidateEvent {
        external_id: review_id.to_string(),
        event_timestamp,
        branch_name: pr.head.as_ref().map(|h| h.git_ref.clone()),
        message,
        author: review.user.as_ref().map(|u| u.login.clone()),
        detail: ActivityDetail::Review {
            review_id,
            pull_request_number: pr.number,
            state: review.state.as_ref().map(|s| s.to_ascii_lowercase()),
        },
    })
}
