//! Connection pooling and pragma configuration

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

use super::migrations::migrate_to_latest;
use crate::errors::{CoreError, Result};

pub type DbPool = Pool<SqliteConnectionManager>;

/// A connection checked out of [`DbPool`].
pub type PooledConn = r2d2::PooledConnection<SqliteConnectionManager>;

/// How long a writer waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Initialize a connection pool and bring the schema up to date.
///
/// Every pooled connection gets:
/// - WAL journal (readers never block the single writer)
/// - `synchronous = NORMAL` (safe under WAL)
/// - foreign key enforcement
/// - a busy timeout so concurrent webhook writers queue instead of failing
pub fn initialize_pool(db_path: &Path, pool_size: u32) -> Result<DbPool> {
    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| {
            CoreError::config_with_source(
                format!("failed to create db directory: {}", parent.display()),
                e,
            )
        })?;
    }

    let manager = SqliteConnectionManager::file(db_path).with_init(apply_pragmas);
    let pool = Pool::builder().max_size(pool_size).build(manager)?;

    let mut conn = pool.get()?;
    migrate_to_latest(&mut conn)?;
    verify_pragmas(&conn)?;

    tracing::debug!(path = %db_path.display(), pool_size, "Database pool initialized");
    Ok(pool)
}

/// Open a private in-memory database with the full schema (tests, dry runs).
pub fn open_in_memory() -> Result<Connection> {
    let mut conn = Connection::open_in_memory()?;
    apply_pragmas(&mut conn)?;
    migrate_to_latest(&mut conn)?;
    Ok(conn)
}

fn apply_pragmas(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    // journal_mode answers with the mode actually applied ("memory" for
    // in-memory databases), so it has to be read back.
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", true)?;
    Ok(())
}

fn verify_pragmas(conn: &Connection) -> Result<()> {
    let foreign_keys: i64 = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?;
    if foreign_keys != 1 {
        return Err(CoreError::Migration(
            "foreign key enforcement is disabled".to_string(),
        ));
    }

    let journal_mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
    if !journal_mode.eq_ignore_ascii_case("wal") {
        tracing::warn!(journal_mode, "SQLite did not switch to WAL mode");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_creates_parent_dir_and_schema() {
        let dir = tempfile::tempdir().unwrap_or_else(|e| panic!("tempdir: {e}"));
        let path = dir.path().join("nested").join("sl.db");

        let pool = initialize_pool(&path, 2).unwrap_or_else(|e| panic!("pool: {e}"));
        assert!(path.exists());

        let conn = pool.get().unwrap_or_else(|e| panic!("checkout: {e}"));
        let version: i32 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap_or_else(|e| panic!("user_version: {e}"));
        assert_eq!(version, super::super::SCHEMA_VERSION);
    }

    #[test]
    fn in_memory_connection_enforces_foreign_keys() {
        let conn = open_in_memory().unwrap_or_else(|e| panic!("open: {e}"));
        let fk: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap_or_else(|e| panic!("pragma: {e}"));
        assert_eq!(fk, 1);
    }
}
