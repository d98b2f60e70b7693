//! `sprintlens-webhook` entry point.
//!
//! Configuration comes from `sprintlens.toml` (see `SPRINTLENS_CONFIG`);
//! the signing secret may also be supplied via `SPRINTLENS_WEBHOOK_SECRET`.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::Context as _;
use sprintlens_core::db::initialize_pool;
use sprintlens_core::{AttributionResolver, IngestionStore, SprintLensConfig};
use sprintlens_webhook::{AppState, serve, watch_shutdown};

fn main() -> anyhow::Result<()> {
    run_service()
}

#[tokio::main]
async fn run_service() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("sprintlens-webhook v{} starting", sprintlens_core::VERSION);

    let config = SprintLensConfig::load()?;
    let db_path = config.resolved_db_path();
    let pool = initialize_pool(&db_path, config.pool_size)
        .with_context(|| format!("opening database at {}", db_path.display()))?;
    let store = IngestionStore::new(AttributionResolver::new(&config.attribution)?);

    if config.webhook.secret.is_none() {
        tracing::warn!("No webhook secret configured; accepting unsigned deliveries");
    }

    let state = Arc::new(AppState {
        pool,
        store,
        secret: config.webhook.secret.clone(),
        webhook_path: config.webhook.path.clone(),
    });

    let server = tiny_http::Server::http(&config.webhook.bind)
        .map_err(|e| anyhow::anyhow!("binding {}: {e}", config.webhook.bind))?;
    tracing::info!(
        bind = %config.webhook.bind,
        path = %config.webhook.path,
        workers = config.webhook.workers,
        db = %db_path.display(),
        "Webhook receiver listening"
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    tokio::spawn(watch_shutdown(tokio::signal::ctrl_c(), Arc::clone(&shutdown)));

    let workers = config.webhook.workers;
    let server = Arc::new(server);
    tokio::task::spawn_blocking(move || serve(state, server, workers, shutdown)).await?;

    tracing::info!("sprintlens-webhook exiting cleanly");
    Ok(())
}
