//! Store configuration resolved from the process environment.
//!
//! # Invariants
//! - Missing variables fall back to defaults; present-but-blank values are
//!   treated as missing.
//! - `log_level` is validated here so startup fails before any file is opened.

use crate::logging::{default_log_level, normalize_level};
use crate::service::user_store::{StoreError, StoreResult};
use std::path::PathBuf;

/// Connection string variable.
pub const DATABASE_URL_ENV: &str = "USERBOOK_DATABASE_URL";
/// Log level variable (`trace|debug|info|warn|error`).
pub const LOG_LEVEL_ENV: &str = "USERBOOK_LOG_LEVEL";
/// Absolute log directory variable; file logging is off when unset.
pub const LOG_DIR_ENV: &str = "USERBOOK_LOG_DIR";

pub const DEFAULT_DATABASE_URL: &str = "sqlite::memory:";

/// Runtime settings for a `UserStore` and its logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub database_url: String,
    pub log_level: &'static str,
    pub log_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            log_level: default_log_level(),
            log_dir: None,
        }
    }
}

impl StoreConfig {
    /// Reads settings from `USERBOOK_*` environment variables.
    ///
    /// # Errors
    /// - `StoreError::Config` when a variable holds an unusable value.
    pub fn from_env() -> StoreResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves settings through `lookup`, which maps a variable name to its
    /// value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> StoreResult<Self> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();
        if let Some(url) = read(DATABASE_URL_ENV) {
            config.database_url = url;
        }
        if let Some(level) = read(LOG_LEVEL_ENV) {
            config.log_level = normalize_level(&level).map_err(StoreError::Config)?;
        }
        config.log_dir = read(LOG_DIR_ENV).map(PathBuf::from);
        Ok(config)
    }

    /// Overrides the connection string, e.g. from a command-line argument.
    pub fn with_database_url(mut self, database_url: impl Into<String>) -> Self {
        self.database_url = database_url.into();
        self
    }
}
