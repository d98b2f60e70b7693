//! Webhook receiver for code-hosting events.
//!
//! `POST <webhook.path>` ingests GitHub `push`, `pull_request` and
//! `pull_request_review` deliveries; `ping` is acknowledged and other event
//! kinds are ignored with 202. `GET /healthz` reports liveness.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod handler;
pub mod server;
pub mod signature;

pub use handler::{AppState, WebhookRequest, WebhookResponse, handle};
pub use server::{serve, watch_shutdown};
