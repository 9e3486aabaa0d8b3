//! Connection string parsing.
//!
//! Accepted forms:
//! - `sqlite://`, `sqlite:`, `sqlite::memory:`, `sqlite://:memory:`,
//!   `sqlite:///:memory:`, `:memory:` (in-memory)
//! - `sqlite:///abs/path.db` (absolute) and `sqlite://rel/path.db` (relative)
//! - `sqlite:path.db`
//! - a bare filesystem path
//!
//! The scheme may carry a driver suffix (`sqlite+pysqlite://...`).

use super::{DbError, DbResult};
use std::path::PathBuf;

const SQLITE_SCHEME: &str = "sqlite";
const MEMORY_TARGET: &str = ":memory:";

/// Storage target resolved from a connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbTarget {
    Memory,
    File(PathBuf),
}

impl DbTarget {
    /// Parses a connection string into a storage target.
    ///
    /// # Errors
    /// - Empty input.
    /// - A `scheme://` other than `sqlite` or `sqlite+<driver>`.
    pub fn parse(connection_string: &str) -> DbResult<Self> {
        let trimmed = connection_string.trim();
        if trimmed.is_empty() {
            return Err(DbError::InvalidConnectionString(
                "connection string cannot be empty".to_string(),
            ));
        }

        let Some(rest) = strip_sqlite_scheme(trimmed) else {
            if let Some((scheme, _)) = trimmed.split_once("://") {
                return Err(DbError::InvalidConnectionString(format!(
                    "unsupported scheme `{scheme}`; expected `sqlite`"
                )));
            }
            return Ok(Self::from_path(trimmed));
        };

        // `sqlite://` carries an empty authority; the remainder is the path.
        let path = rest.strip_prefix("//").unwrap_or(rest);
        // Query parameters are driver options we do not interpret.
        let path = path.split_once('?').map_or(path, |(path, _)| path);
        if path.is_empty() || path == "/:memory:" {
            return Ok(Self::Memory);
        }
        Ok(Self::from_path(path))
    }

    fn from_path(path: &str) -> Self {
        if path == MEMORY_TARGET {
            Self::Memory
        } else {
            Self::File(PathBuf::from(path))
        }
    }

    /// Short label used in log lines; never includes the path itself.
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::File(_) => "file",
        }
    }
}

/// Returns what follows `sqlite:` / `sqlite+<driver>:`, or `None` for other
/// schemes and bare paths.
fn strip_sqlite_scheme(value: &str) -> Option<&str> {
    let (scheme, rest) = value.split_once(':')?;
    let driver = scheme.strip_prefix(SQLITE_SCHEME)?;
    match driver.strip_prefix('+') {
        Some(name) if !name.is_empty() => Some(rest),
        None if driver.is_empty() => Some(rest),
        _ => None,
    }
}
