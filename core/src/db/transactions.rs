//! Transaction helpers

use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::errors::Result;

/// Execute `operation` inside a transaction.
///
/// Commits when the closure returns `Ok`; on `Err` the transaction is dropped,
/// which rolls it back.
///
/// # Example
/// ```rust,no_run
/// # use sprintlens_core::db::execute_in_transaction;
/// # use rusqlite::{Connection, TransactionBehavior};
/// # fn example(conn: &mut Connection) -> sprintlens_core::Result<()> {
/// execute_in_transaction(conn, TransactionBehavior::Immediate, |tx| {
///     tx.execute("DELETE FROM sprint_snapshots WHERE sprint_id = ?1", ["s1"])?;
///     Ok(())
/// })?;
/// # Ok(())
/// # }
/// ```
pub fn execute_in_transaction<F, T>(
    conn: &mut Connection,
    behavior: TransactionBehavior,
    operation: F,
) -> Result<T>
where
    F: FnOnce(&Transaction) -> Result<T>,
{
    let tx = conn.transaction_with_behavior(behavior)?;
    let result = operation(&tx)?;
    tx.commit()?;
    Ok(result)
}
