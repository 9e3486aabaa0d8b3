//! Persistence layer for user accounts and their email addresses.
//!
//! `UserStore` owns one SQLite connection and exposes the CRUD contract;
//! `SqliteUserRepository` holds the SQL.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::StoreConfig;
pub use logging::{default_log_level, init_from_config, init_logging, logging_status};
pub use model::user::{Address, AddressId, User, UserId, UserValidationError, USER_NAME_MAX_CHARS};
pub use repo::user_repo::{
    LookupKey, RepoError, RepoResult, SqliteUserRepository, UserRepository,
};
pub use service::user_store::{StoreError, StoreResult, UserStore};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
