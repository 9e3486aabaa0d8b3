//! User store: one owned SQLite connection plus the user/address CRUD API.
//!
//! # Responsibility
//! - Open a connection from a connection string and bootstrap the schema.
//! - Route every operation through `SqliteUserRepository`.
//! - Emit metadata-only `event=... module=store` log lines.
//!
//! # Invariants
//! - Every method takes `&mut self`; a store is never shared between callers
//!   without external synchronization.
//! - Each mutating call commits before returning.
//! - Names and email addresses are never written to logs.

use crate::config::StoreConfig;
use crate::db::{open_db_in_memory, open_url, DbError};
use crate::model::user::{Address, AddressId, User, UserId};
use crate::repo::user_repo::{RepoError, RepoResult, SqliteUserRepository, UserRepository};
use log::{debug, error, info};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub type StoreResult<T> = Result<T, StoreError>;

/// Error returned by store lifecycle calls.
#[derive(Debug)]
pub enum StoreError {
    /// Configuration could not be resolved from the environment.
    Config(String),
    /// Connection, bootstrap or close failure.
    Db(DbError),
    /// Failure inside a repository operation.
    Repo(RepoError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(message) => write!(f, "invalid store configuration: {message}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(_) => None,
            Self::Db(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<RepoError> for StoreError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Owns one connection and exposes user/address CRUD against it.
pub struct UserStore {
    conn: Connection,
}

impl UserStore {
    /// Opens the database named by `connection_string` and creates the
    /// `user_account` and `address` tables when absent.
    ///
    /// # Errors
    /// - `StoreError::Db` when the string is invalid or the target cannot be
    ///   opened or bootstrapped.
    pub fn open(connection_string: &str) -> StoreResult<Self> {
        let conn = open_url(connection_string)?;
        Self::from_connection(conn)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = open_db_in_memory()?;
        Self::from_connection(conn)
    }

    /// Opens the database named by `config.database_url`.
    pub fn from_config(config: &StoreConfig) -> StoreResult<Self> {
        Self::open(&config.database_url)
    }

    /// Wraps an already bootstrapped connection.
    ///
    /// The schema is checked once here; later calls reuse the result.
    ///
    /// # Errors
    /// - `StoreError::Repo` when the connection lacks the expected schema.
    pub fn from_connection(mut conn: Connection) -> StoreResult<Self> {
        SqliteUserRepository::try_new(&mut conn)?;
        Ok(Self { conn })
    }

    /// Releases the connection.
    ///
    /// Consumes the store, so a closed store cannot be used again.
    pub fn close(self) -> StoreResult<()> {
        match self.conn.close() {
            Ok(()) => {
                info!("event=store_close module=store status=ok");
                Ok(())
            }
            Err((_conn, err)) => {
                error!(
                    "event=store_close module=store status=error error_code=close_failed error={}",
                    err
                );
                Err(StoreError::Db(err.into()))
            }
        }
    }

    /// Borrows the underlying connection for read-only inspection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Persists `user` and its attached addresses.
    ///
    /// On success `user.id` and every `address.id` / `address.user_id` are set.
    pub fn add_user(&mut self, user: &mut User) -> RepoResult<UserId> {
        let result = self.with_repo(|repo| repo.add_user(user));
        log_outcome("user_add", &result);
        result
    }

    pub fn get_user(&mut self, id: UserId) -> RepoResult<Option<User>> {
        let result = self.with_repo(|repo| repo.get_user(id));
        log_outcome("user_get", &result);
        result
    }

    /// Returns the single user named `name`.
    ///
    /// # Errors
    /// - `RepoError::NotFound` when no user has this name.
    /// - `RepoError::AmbiguousMatch` when several users share it.
    pub fn get_user_by_name(&mut self, name: &str) -> RepoResult<User> {
        let result = self.with_repo(|repo| repo.get_user_by_name(name));
        log_outcome("user_get_by_name", &result);
        result
    }

    pub fn list_users(&mut self) -> RepoResult<Vec<User>> {
        let result = self.with_repo(|repo| repo.list_users());
        log_outcome("user_list", &result);
        result
    }

    /// Returns the single address of `user` equal to `email_address`.
    pub fn find_address(&mut self, user: &User, email_address: &str) -> RepoResult<Address> {
        self.with_repo(|repo| repo.find_address(user, email_address))
    }

    /// Adds a new address owned by `user` and appends it to `user.addresses`.
    pub fn add_address_to_user(
        &mut self,
        user: &mut User,
        email_address: &str,
    ) -> RepoResult<AddressId> {
        let result = self.with_repo(|repo| repo.add_address_to_user(user, email_address));
        log_outcome("address_add", &result);
        result
    }

    /// Changes the single address of `user` equal to `old_email` to `new_email`.
    pub fn update_address(
        &mut self,
        user: &mut User,
        old_email: &str,
        new_email: &str,
    ) -> RepoResult<()> {
        let result = self.with_repo(|repo| repo.update_address(user, old_email, new_email));
        log_outcome("address_update", &result);
        result
    }

    /// Removes the single address of `user` equal to `email_address`; the
    /// detached row is deleted.
    pub fn remove_address_from_user(
        &mut self,
        user: &mut User,
        email_address: &str,
    ) -> RepoResult<()> {
        let result = self.with_repo(|repo| repo.remove_address_from_user(user, email_address));
        log_outcome("address_remove", &result);
        result
    }

    /// Deletes `user` and every address it owns.
    pub fn delete_user(&mut self, user: &mut User) -> RepoResult<()> {
        let result = self.with_repo(|repo| repo.delete_user(user));
        log_outcome("user_delete", &result);
        result
    }

    fn with_repo<T>(
        &mut self,
        op: impl FnOnce(&mut SqliteUserRepository<'_>) -> RepoResult<T>,
    ) -> RepoResult<T> {
        let started_at = Instant::now();
        let mut repo = SqliteUserRepository::new_unchecked(&mut self.conn);
        let result = op(&mut repo);
        debug!(
            "event=store_op module=store duration_us={}",
            started_at.elapsed().as_micros()
        );
        result
    }
}

fn log_outcome<T>(event: &str, result: &RepoResult<T>) {
    match result {
        Ok(_) => info!("event={event} module=store status=ok"),
        Err(err) if err.is_not_found() || err.is_ambiguous() => {
            info!("event={event} module=store status=miss error_code={}", error_code(err));
        }
        Err(err) => error!(
            "event={event} module=store status=error error_code={}",
            error_code(err)
        ),
    }
}

fn error_code(err: &RepoError) -> &'static str {
    match err {
        RepoError::Validation(_) => "validation_failed",
        RepoError::Db(_) => "db_error",
        RepoError::NotFound(_) => "not_found",
        RepoError::AmbiguousMatch { .. } => "ambiguous_match",
        RepoError::ConstraintViolation(_) => "constraint_violation",
        RepoError::Detached => "user_detached",
        RepoError::AlreadyPersisted(_) => "already_persisted",
        RepoError::InvalidData(_) => "invalid_data",
        RepoError::UninitializedConnection { .. }
        | RepoError::MissingRequiredTable(_)
        | RepoError::MissingRequiredColumn { .. } => "schema_not_ready",
    }
}
