//! Shared command context: configuration, pool and output mode.

use std::path::PathBuf;

use anyhow::Context as _;
use serde::Serialize;
use sprintlens_core::SprintLensConfig;
use sprintlens_core::db::{DbPool, PooledConn, initialize_pool};

#[derive(Debug, clap::Args)]
pub struct GlobalArgs {
    /// Path to sprintlens.toml (defaults to $SPRINTLENS_CONFIG, then ~/.config/sprintlens).
    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Override the database path from the config.
    #[arg(long = "db", global = true)]
    pub db: Option<PathBuf>,

    /// Output as JSON.
    #[arg(long = "json", short = 'j', global = true)]
    pub json: bool,
}

pub struct Context {
    pub config: SprintLensConfig,
    pub pool: DbPool,
    pub json: bool,
}

impl Context {
    pub fn open(args: &GlobalArgs) -> anyhow::Result<Self> {
        let config = match &args.config {
            Some(path) => SprintLensConfig::load_from_path(path)?,
            None => SprintLensConfig::load()?,
        };
        let db_path = args
            .db
            .clone()
            .unwrap_or_else(|| config.resolved_db_path());
        let pool = initialize_pool(&db_path, config.pool_size)
            .with_context(|| format!("opening database at {}", db_path.display()))?;
        tracing::debug!(db = %db_path.display(), "Opened database");
        Ok(Self {
            config,
            pool,
            json: args.json,
        })
    }

    pub fn conn(&self) -> anyhow::Result<PooledConn> {
        Ok(self.pool.get()?)
    }
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
