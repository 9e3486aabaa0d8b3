//! Schema bootstrap for the user store.
//!
//! # Invariants
//! - Bootstrap is idempotent and non-destructive: every statement uses
//!   `IF NOT EXISTS`, so existing tables and rows are left untouched.
//! - The applied step is mirrored to `PRAGMA user_version`.

use crate::db::{DbError, DbResult};
use rusqlite::{Connection, TransactionBehavior};

/// Table holding one row per user.
pub const USER_TABLE: &str = "user_account";
/// Table holding one row per email address, owned by a user.
pub const ADDRESS_TABLE: &str = "address";

/// Ordered DDL steps; index + 1 is the schema version each step produces.
const SCHEMA_STEPS: &[&str] = &[include_str!("sql/0001_users.sql")];

/// Returns the schema version this binary creates and understands.
pub fn latest_version() -> u32 {
    u32::try_from(SCHEMA_STEPS.len()).unwrap_or(u32::MAX)
}

/// Creates missing tables and records the schema version.
///
/// # Errors
/// - `DbError::UnsupportedSchemaVersion` when the file was written by a newer
///   binary.
/// - `DbError::Sqlite` when DDL fails; the bootstrap transaction is rolled back.
pub fn ensure_schema(conn: &mut Connection) -> DbResult<()> {
    let current = schema_version(conn)?;
    let latest = latest_version();

    if current > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current,
            latest_supported: latest,
        });
    }
    if current == latest {
        return Ok(());
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    for (version, sql) in (1..).zip(SCHEMA_STEPS).skip(current as usize) {
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", version)?;
    }
    tx.commit()?;

    Ok(())
}

/// Reads `PRAGMA user_version` from the connection.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.pragma_query_value(None, "user_version", |row| row.get::<_, u32>(0))?;
    Ok(version)
}
