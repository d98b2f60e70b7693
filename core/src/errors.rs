//! Error types for the sprint analytics core.
//!
//! Reporting calls abort on the first data-access failure. Ingestion isolates
//! failures per event, so `MalformedEvent` is normally caught by the batch
//! loop and recorded in the report instead of being returned.

use thiserror::Error;

/// Error category for structured logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// `sprintlens.toml` or env misconfigured
    ConfigError,
    /// SQLite or connection pool failures
    StorageError,
    /// Referenced sprint (or other entity) does not exist
    NotFound,
    /// A single webhook event could not be interpreted
    MalformedEvent,
    /// Uniqueness conflict in externally managed registries
    Conflict,
    /// Unexpected logic bugs
    InternalError,
}

impl ErrorCategory {
    /// Machine-readable code for logging
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigError => "CONFIG_ERROR",
            Self::StorageError => "STORAGE_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::MalformedEvent => "MALFORMED_EVENT",
            Self::Conflict => "CONFLICT",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("config error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("SQLite error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("malformed event: {0}")]
    MalformedEvent(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Config { .. } => ErrorCategory::ConfigError,
            Self::Storage(_) | Self::Pool(_) | Self::Migration(_) => ErrorCategory::StorageError,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::MalformedEvent(_) | Self::Serde(_) => ErrorCategory::MalformedEvent,
            Self::Conflict(_) => ErrorCategory::Conflict,
            Self::Internal(_) => ErrorCategory::InternalError,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn sprint_not_found(sprint_id: &str) -> Self {
        Self::NotFound {
            entity: "sprint",
            id: sprint_id.to_string(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedEvent(message.into())
    }
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
