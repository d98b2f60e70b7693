//! Configuration loading
//!
//! Loads configuration from `~/.config/sprintlens/sprintlens.toml` (or the
//! `SPRINTLENS_CONFIG` env var). Every field has a default, so a missing file
//! yields a usable configuration.

use crate::errors::{CoreError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SprintLensConfig {
    /// Path to the shared SQLite database
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Maximum pooled connections
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// Activity attribution settings
    #[serde(default)]
    pub attribution: AttributionConfig,

    /// Risk heuristic thresholds
    #[serde(default)]
    pub risk: RiskConfig,

    /// Webhook receiver settings
    #[serde(default)]
    pub webhook: WebhookConfig,
}

fn default_db_path() -> String {
    dirs::data_dir()
        .map(|d| {
            d.join("sprintlens")
                .join("sprintlens.db")
                .to_string_lossy()
                .into_owned()
        })
        .unwrap_or_else(|| "sprintlens.db".to_string())
}

fn default_pool_size() -> u32 {
    8
}

/// Shape of the work item ids embedded in branch names.
#[derive(Debug, Deserialize, Clone)]
pub struct AttributionConfig {
    /// Leading character of every work item id
    #[serde(default = "default_work_item_id_prefix")]
    pub work_item_id_prefix: char,

    /// Total id length, prefix included
    #[serde(default = "default_work_item_id_length")]
    pub work_item_id_length: usize,
}

fn default_work_item_id_prefix() -> char {
    'c'
}

fn default_work_item_id_length() -> usize {
    25
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            work_item_id_prefix: default_work_item_id_prefix(),
            work_item_id_length: default_work_item_id_length(),
        }
    }
}

/// Risk heuristic thresholds
#[derive(Debug, Deserialize, Clone)]
pub struct RiskConfig {
    /// Creep ratio above which scope creep fires at medium
    #[serde(default = "default_scope_creep_medium")]
    pub scope_creep_medium: f64,

    /// Creep ratio above which scope creep escalates to high
    #[serde(default = "default_scope_creep_high")]
    pub scope_creep_high: f64,

    /// In-progress items untouched for longer than this are stale
    #[serde(default = "default_stale_after_days")]
    pub stale_after_days: i64,

    /// Stale count above which severity is high
    #[serde(default = "default_stale_high_above")]
    pub stale_high_above: usize,

    /// Overdue count above which severity is high
    #[serde(default = "default_overdue_high_above")]
    pub overdue_high_above: usize,

    /// Blocked count above which severity is high
    #[serde(default = "default_blocked_high_above")]
    pub blocked_high_above: usize,

    /// Fraction of the sprint that must have elapsed before velocity is judged
    #[serde(default = "default_velocity_elapsed")]
    pub velocity_elapsed: f64,

    /// Completion rate (percent) under which velocity drop fires
    #[serde(default = "default_velocity_completion_below")]
    pub velocity_completion_below: f64,

    /// Elapsed fraction above which a velocity drop is critical
    #[serde(default = "default_velocity_critical_elapsed")]
    pub velocity_critical_elapsed: f64,
}

fn default_scope_creep_medium() -> f64 {
    0.2
}
fn default_scope_creep_high() -> f64 {
    0.4
}
fn default_stale_after_days() -> i64 {
    3
}
fn default_stale_high_above() -> usize {
    3
}
fn default_overdue_high_above() -> usize {
    5
}
fn default_blocked_high_above() -> usize {
    3
}
fn default_velocity_elapsed() -> f64 {
    0.5
}
fn default_velocity_completion_below() -> f64 {
    30.0
}
fn default_velocity_critical_elapsed() -> f64 {
    0.75
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            scope_creep_medium: default_scope_creep_medium(),
            scope_creep_high: default_scope_creep_high(),
            stale_after_days: default_stale_after_days(),
            stale_high_above: default_stale_high_above(),
            overdue_high_above: default_overdue_high_above(),
            blocked_high_above: default_blocked_high_above(),
            velocity_elapsed: default_velocity_elapsed(),
            velocity_completion_below: default_velocity_completion_below(),
            velocity_critical_elapsed: default_velocity_critical_elapsed(),
        }
    }
}

/// Webhook receiver settings
#[derive(Debug, Deserialize, Clone)]
pub struct WebhookConfig {
    /// Socket address to bind
    #[serde(default = "default_bind")]
    pub bind: String,

    /// URL path webhooks are posted to
    #[serde(default = "default_webhook_path")]
    pub path: String,

    /// Number of request worker threads
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Shared secret for `X-Hub-Signature-256`; unsigned deliveries are
    /// accepted when unset
    #[serde(default)]
    pub secret: Option<String>,
}

fn default_bind() -> String {
    "127.0.0.1:8787".to_string()
}

fn default_webhook_path() -> String {
    "/webhooks/github".to_string()
}

fn default_workers() -> usize {
    4
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            path: default_webhook_path(),
            workers: default_workers(),
            secret: None,
        }
    }
}

impl Default for SprintLensConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            pool_size: default_pool_size(),
            attribution: AttributionConfig::default(),
            risk: RiskConfig::default(),
            webhook: WebhookConfig::default(),
        }
    }
}

impl SprintLensConfig {
    /// Environment variable for config path override
    pub const ENV_CONFIG_PATH: &'static str = "SPRINTLENS_CONFIG";

    /// Environment variable for the webhook secret; wins over the file
    pub const ENV_WEBHOOK_SECRET: &'static str = "SPRINTLENS_WEBHOOK_SECRET";

    /// Default config filename
    pub const DEFAULT_CONFIG_FILENAME: &'static str = "sprintlens.toml";

    /// Load configuration from file
    ///
    /// Resolution order:
    /// 1. `SPRINTLENS_CONFIG` environment variable
    /// 2. `~/.config/sprintlens/sprintlens.toml`
    ///
    /// If the config file doesn't exist, returns default configuration.
    pub fn load() -> Result<Self> {
        let path = Self::resolve_config_path();

        let mut cfg = if path.exists() {
            Self::load_from_path(&path)?
        } else {
            tracing::info!(
                path = %path.display(),
                "SprintLens config not found, using defaults"
            );
            Self::default()
        };

        if let Ok(secret) = std::env::var(Self::ENV_WEBHOOK_SECRET)
            && !secret.is_empty()
        {
            cfg.webhook.secret = Some(secret);
        }

        Ok(cfg)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            CoreError::config_with_source(format!("failed to read config at {}", path.display()), e)
        })?;

        Self::parse(&contents)
    }

    /// Parse configuration from TOML string
    pub fn parse(contents: &str) -> Result<Self> {
        let cfg: SprintLensConfig = toml::from_str(contents)
            .map_err(|e| CoreError::config_with_source("failed to parse config", e))?;

        cfg.validate()?;
        Ok(cfg)
    }

    fn resolve_config_path() -> PathBuf {
        if let Ok(path) = std::env::var(Self::ENV_CONFIG_PATH) {
            return PathBuf::from(path);
        }

        dirs::home_dir()
            .map(|h| {
                h.join(".config")
                    .join("sprintlens")
                    .join(Self::DEFAULT_CONFIG_FILENAME)
            })
            .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_CONFIG_FILENAME))
    }

    fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(CoreError::config("pool_size must be at least 1"));
        }

        if !self.attribution.work_item_id_prefix.is_ascii_alphanumeric() {
            return Err(CoreError::config(
                "attribution.work_item_id_prefix must be an ASCII letter or digit",
            ));
        }
        if self.attribution.work_item_id_length < 2 {
            return Err(CoreError::config(
                "attribution.work_item_id_length must be at least 2",
            ));
        }

        if self.webhook.workers == 0 {
            return Err(CoreError::config("webhook.workers must be at least 1"));
        }

        if self.risk.scope_creep_high < self.risk.scope_creep_medium {
            tracing::warn!(
                medium = self.risk.scope_creep_medium,
                high = self.risk.scope_creep_high,
                "scope_creep_high is below scope_creep_medium; high will fire first"
            );
        }

        if self.risk.velocity_critical_elapsed < self.risk.velocity_elapsed {
            tracing::warn!(
                elapsed = self.risk.velocity_elapsed,
                critical = self.risk.velocity_critical_elapsed,
                "velocity_critical_elapsed is below velocity_elapsed; every velocity drop will be critical"
            );
        }

        Ok(())
    }

    /// Get the resolved database path (expanding ~ if needed)
    pub fn resolved_db_path(&self) -> PathBuf {
        let path = &self.db_path;
        if let Some(stripped) = path.strip_prefix("~/")
            && let Some(home) = dirs::home_dir()
        {
            return home.join(stripped);
        }
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = SprintLensConfig::default();
        assert_eq!(cfg.attribution.work_item_id_prefix, 'c');
        assert_eq!(cfg.attribution.work_item_id_length, 25);
        assert_eq!(cfg.risk.stale_after_days, 3);
        assert_eq!(cfg.risk.overdue_high_above, 5);
        assert_eq!(cfg.webhook.path, "/webhooks/github");
        assert!(cfg.webhook.secret.is_none());
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
            db_path = "/tmp/sprintlens-test.db"

            [risk]
            stale_after_days = 5

            [webhook]
            bind = "0.0.0.0:9000"
            secret = "s3cr3t"
        "#;

        let cfg = SprintLensConfig::parse(toml).unwrap_or_else(|e| panic!("parse: {e}"));
        assert_eq!(cfg.db_path, "/tmp/sprintlens-test.db");
        assert_eq!(cfg.risk.stale_after_days, 5);
        // Defaults still apply to untouched fields
        assert_eq!(cfg.risk.scope_creep_medium, 0.2);
        assert_eq!(cfg.webhook.bind, "0.0.0.0:9000");
        assert_eq!(cfg.webhook.secret.as_deref(), Some("s3cr3t"));
        assert_eq!(cfg.webhook.workers, 4);
    }

    #[test]
    fn test_rejects_zero_workers() {
        let toml = r#"
            [webhook]
            workers = 0
        "#;
        let err = SprintLensConfig::parse(toml).err();
        assert!(matches!(err, Some(CoreError::Config { .. })));
    }

    #[test]
    fn test_rejects_non_alphanumeric_prefix() {
        let toml = r#"
            [attribution]
            work_item_id_prefix = "-"
        "#;
        assert!(SprintLensConfig::parse(toml).is_err());
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = SprintLensConfig::parse("db_path = [").err();
        assert!(matches!(err, Some(CoreError::Config { .. })));
    }

    #[test]
    fn test_resolved_db_path_expands_home() {
        let cfg = SprintLensConfig {
            db_path: "~/data/sl.db".to_string(),
            ..SprintLensConfig::default()
        };
        if let Some(home) = dirs::home_dir() {
            assert_eq!(cfg.resolved_db_path(), home.join("data/sl.db"));
        }
    }
}
