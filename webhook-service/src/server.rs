//! Blocking HTTP front end on `tiny_http`.
//!
//! A fixed set of worker threads pull requests from one shared server.
//! Workers poll with a timeout so they notice the shutdown flag promptly.

use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tiny_http::{Header, Request, Response, Server, StatusCode};

use crate::handler::{AppState, WebhookRequest, WebhookResponse, handle};

/// GitHub caps payloads at 25 MB.
pub const MAX_BODY_BYTES: u64 = 25 * 1024 * 1024;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

fn header(req: &Request, name: &'static str) -> Option<String> {
    req.headers()
        .iter()
        .find(|h| h.field.equiv(name))
        .map(|h| h.value.as_str().to_string())
}

fn read_request(req: &mut Request) -> std::io::Result<WebhookRequest> {
    let path = req.url().split('?').next().unwrap_or_default().to_string();
    let mut body = Vec::new();
    req.as_reader()
        .take(MAX_BODY_BYTES + 1)
        .read_to_end(&mut body)?;
    Ok(WebhookRequest {
        method: req.method().to_string().to_ascii_uppercase(),
        path,
        event: header(req, "X-GitHub-Event"),
        delivery: header(req, "X-GitHub-Delivery"),
        signature: header(req, "X-Hub-Signature-256"),
        body,
    })
}

fn respond(req: Request, response: &WebhookResponse) {
    let body = serde_json::to_vec(&response.body).unwrap_or_default();
    let mut http = Response::from_data(body).with_status_code(StatusCode(response.status));
    if let Ok(content_type) = Header::from_bytes("Content-Type", "application/json") {
        http = http.with_header(content_type);
    }
    if let Err(e) = req.respond(http) {
        tracing::debug!(error = %e, "Client went away before the response was sent");
    }
}

fn process(state: &AppState, mut req: Request) {
    let response = match read_request(&mut req) {
        Ok(parsed) if parsed.body.len() as u64 > MAX_BODY_BYTES => {
            WebhookResponse {
                status: 413,
                body: serde_json::json!({ "error": "payload too large" }),
            }
        }
        Ok(parsed) => {
            let response = handle(state, &parsed);
            tracing::debug!(
                method = %parsed.method,
                path = %parsed.path,
                status = response.status,
                "Handled request"
            );
            response
        }
        Err(e) => WebhookResponse {
            status: 400,
            body: serde_json::json!({ "error": format!("failed to read body: {e}") }),
        },
    };
    respond(req, &response);
}

fn worker_loop(id: usize, state: &AppState, server: &Server, shutdown: &AtomicBool) {
    while !shutdown.load(Ordering::Relaxed) {
        match server.recv_timeout(POLL_INTERVAL) {
            Ok(Some(req)) => process(state, req),
            Ok(None) => {}
            Err(e) => {
                tracing::error!(worker = id, error = %e, "Accept failed; worker stopping");
                break;
            }
        }
    }
    tracing::debug!(worker = id, "Worker stopped");
}

/// Serve until `shutdown` is set. Blocks the calling thread.
pub fn serve(
    state: Arc<AppState>,
    server: Arc<Server>,
    workers: usize,
    shutdown: Arc<AtomicBool>,
) {
    let handles: Vec<_> = (0..workers.max(1))
        .map(|id| {
            let state = Arc::clone(&state);
            let server = Arc::clone(&server);
            let shutdown = Arc::clone(&shutdown);
            thread::spawn(move || worker_loop(id, &state, &server, &shutdown))
        })
        .collect();

    for handle in handles {
        if handle.join().is_err() {
            tracing::error!("Webhook worker panicked");
        }
    }
}

/// Raise `shutdown` once `signal` fires.
///
/// If the signal handler cannot be installed the flag is left alone and the
/// server keeps running.
pub async fn watch_shutdown<F>(signal: F, shutdown: Arc<AtomicBool>)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            tracing::info!("Signal received, shutting down");
            shutdown.store(true, Ordering::Relaxed);
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler; serving until killed");
        }
    }
}
