//! SQLite storage bootstrap and schema entry points.
//!
//! # Responsibility
//! - Resolve connection strings into SQLite targets.
//! - Open and configure connections for the user store.
//! - Create the `user_account` and `address` tables when absent.
//!
//! # Invariants
//! - Schema version is tracked via `PRAGMA user_version`.
//! - Core code must not read/write user data before the schema exists.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod target;
pub mod schema;
mod open;

pub use open::{open_db, open_db_in_memory, open_url};
pub use target::DbTarget;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    InvalidConnectionString(String),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::InvalidConnectionString(message) => {
                write!(f, "invalid connection string: {message}")
            }
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::InvalidConnectionString(_) | Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
