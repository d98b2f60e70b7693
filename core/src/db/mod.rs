//! Database layer
//!
//! This module provides:
//! - Connection pooling (r2d2-sqlite) with WAL + performance pragmas
//! - Forward-only schema migrations tracked via `PRAGMA user_version`
//! - Transaction helpers
//! - Timestamp codecs shared by every table

pub mod codec;
pub mod connection;
pub mod migrations;
pub mod transactions;

pub use connection::{DbPool, PooledConn, initialize_pool, open_in_memory};
pub use migrations::{SCHEMA_VERSION, migrate_to_latest};
pub use transactions::execute_in_transaction;

/// True when `err` is SQLite refusing a row because of a UNIQUE/PK constraint.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
                && (e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
    )
}
