//! Request handling, independent of the HTTP server.

use serde_json::{Value, json};
use sprintlens_core::db::DbPool;
use sprintlens_core::{CoreError, IngestionStore, WebhookEvent};

use crate::signature;

pub const HEALTH_PATH: &str = "/healthz";

/// Everything the handler needs from an inbound request.
#[derive(Debug, Clone, Default)]
pub struct WebhookRequest {
    pub method: String,
    /// Path without query string.
    pub path: String,
    /// `X-GitHub-Event`
    pub event: Option<String>,
    /// `X-GitHub-Delivery`
    pub delivery: Option<String>,
    /// `X-Hub-Signature-256`
    pub signature: Option<String>,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WebhookResponse {
    pub status: u16,
    pub body: Value,
}

impl WebhookResponse {
    fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        Self::new(status, json!({ "error": message.into() }))
    }
}

pub struct AppState {
    pub pool: DbPool,
    pub store: IngestionStore,
    /// Shared secret; unsigned deliveries are accepted when unset.
    pub secret: Option<String>,
    pub webhook_path: String,
}

pub fn handle(state: &AppState, req: &WebhookRequest) -> WebhookResponse {
    if req.path == HEALTH_PATH {
        return match req.method.as_str() {
            "GET" | "HEAD" => WebhookResponse::new(
                200,
                json!({ "status": "ok", "version": sprintlens_core::VERSION }),
            ),
            _ => WebhookResponse::error(405, "method not allowed"),
        };
    }
    if req.path != state.webhook_path {
        return WebhookResponse::error(404, "not found");
    }
    if req.method != "POST" {
        return WebhookResponse::error(405, "method not allowed");
    }

    if let Some(secret) = &state.secret {
        let valid = req
            .signature
            .as_deref()
            .is_some_and(|sig| signature::verify(secret, &req.body, sig));
        if !valid {
            tracing::warn!(delivery = req.delivery.as_deref(), "Rejected delivery with bad signature");
            return WebhookResponse::error(401, "invalid or missing X-Hub-Signature-256");
        }
    }

    let Some(event_name) = req.event.as_deref() else {
        return WebhookResponse::error(400, "missing X-GitHub-Event header");
    };
    if event_name == "ping" {
        tracing::info!(delivery = req.delivery.as_deref(), "Webhook ping");
        return WebhookResponse::new(200, json!({ "status": "pong" }));
    }

    let event = match WebhookEvent::from_github(event_name, &req.body) {
        Ok(Some(event)) => event,
        Ok(None) => {
            tracing::debug!(event = event_name, "Ignoring untracked event kind");
            return WebhookResponse::new(202, json!({ "status": "ignored", "event": event_name }));
        }
        Err(e) => {
            tracing::warn!(event = event_name, error = %e, "Malformed webhook payload");
            return WebhookResponse::error(400, e.to_string());
        }
    };

    match ingest(state, &event, req.delivery.as_deref()) {
        Ok(report) => WebhookResponse::new(200, report),
        Err(e) => {
            tracing::error!(
                delivery = req.delivery.as_deref(),
                error = %e,
                category = e.category().as_str(),
                "Ingestion failed"
            );
            // GitHub can redeliver; dedup makes the retry safe.
            WebhookResponse::error(500, "ingestion failed")
        }
    }
}

fn ingest(
    state: &AppState,
    event: &WebhookEvent,
    delivery: Option<&str>,
) -> Result<Value, CoreError> {
    let conn = state.pool.get()?;
    let report = state.store.ingest(&conn, event, delivery)?;
    Ok(serde_json::to_value(report)?)
}
