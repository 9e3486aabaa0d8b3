//! User/address repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD APIs over `user_account` and its owned `address` rows.
//! - Keep SQL details inside the core persistence boundary.
//! - Keep the caller's in-memory `User` in step with committed rows.
//!
//! # Invariants
//! - Write paths call `validate()` before SQL mutations; read paths return
//!   stored rows as they are, so legacy rows stay reachable.
//! - Unsaved addresses (`id == None`) in a persisted user's collection are
//!   inserted by the next mutating call on that user.
//! - Every mutation runs in one immediate transaction and commits before
//!   returning; an error drops the transaction, which rolls it back.
//! - In-memory ids/collections are updated only after a successful commit.
//! - Lookups that require one row fail on zero (`NotFound`) and on more than
//!   one (`AmbiguousMatch`).
//! - Deleting a user deletes its addresses first, then the user row.

use crate::db::schema::{latest_version, schema_version, ADDRESS_TABLE, USER_TABLE};
use crate::db::DbError;
use crate::model::user::{Address, AddressId, User, UserId, UserValidationError};
use rusqlite::{params, Connection, ErrorCode, Row, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

const USER_SELECT_SQL: &str = "SELECT id, name, fullname FROM user_account";
const ADDRESS_SELECT_SQL: &str = "SELECT id, email_address, user_id FROM address";

pub type RepoResult<T> = Result<T, RepoError>;

/// Identifies what a unique-match lookup searched for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupKey {
    UserId(UserId),
    UserName(String),
    Address {
        user_id: UserId,
        email_address: String,
    },
}

impl Display for LookupKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UserId(id) => write!(f, "user id {id}"),
            Self::UserName(name) => write!(f, "user name `{name}`"),
            Self::Address {
                user_id,
                email_address,
            } => write!(f, "address `{email_address}` of user id {user_id}"),
        }
    }
}

/// Repository error for user/address persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(UserValidationError),
    Db(DbError),
    /// A unique lookup matched no row.
    NotFound(LookupKey),
    /// A unique lookup matched more than one row.
    AmbiguousMatch { key: LookupKey, count: usize },
    /// SQLite rejected a write (foreign key, NOT NULL, ...).
    ConstraintViolation(String),
    /// The operation needs a persisted user but `user.id` is `None`.
    Detached,
    /// `add_user` was given a user that already has an id.
    AlreadyPersisted(UserId),
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl RepoError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::AmbiguousMatch { .. })
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(key) => write!(f, "no row found for {key}"),
            Self::AmbiguousMatch { key, count } => {
                write!(f, "expected one row for {key}, found {count}")
            }
            Self::ConstraintViolation(message) => write!(f, "constraint violation: {message}"),
            Self::Detached => write!(f, "user has not been persisted"),
            Self::AlreadyPersisted(id) => write!(f, "user {id} is already persisted"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match required {expected_version}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "missing required column `{table}.{column}`")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<UserValidationError> for RepoError {
    fn from(value: UserValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::Sqlite(err) => err.into(),
            other => Self::Db(other),
        }
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        if value.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) {
            return Self::ConstraintViolation(value.to_string());
        }
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for user and address CRUD operations.
pub trait UserRepository {
    /// Inserts the user and every attached address; returns the new user id.
    fn add_user(&mut self, user: &mut User) -> RepoResult<UserId>;
    /// Gets one user (with addresses) by primary key.
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    /// Gets the single user with this exact name.
    fn get_user_by_name(&self, name: &str) -> RepoResult<User>;
    /// Lists all users ordered by id.
    fn list_users(&self) -> RepoResult<Vec<User>>;
    /// Gets the single address of `user` with this exact email.
    fn find_address(&self, user: &User, email_address: &str) -> RepoResult<Address>;
    /// Appends a new address to `user`; returns the new address id.
    fn add_address_to_user(&mut self, user: &mut User, email_address: &str)
        -> RepoResult<AddressId>;
    /// Rewrites the single matching address of `user`.
    fn update_address(&mut self, user: &mut User, old_email: &str, new_email: &str)
        -> RepoResult<()>;
    /// Deletes the single matching address of `user`.
    fn remove_address_from_user(&mut self, user: &mut User, email_address: &str)
        -> RepoResult<()>;
    /// Deletes the user and all of its addresses.
    fn delete_user(&mut self, user: &mut User) -> RepoResult<()>;
}

/// SQLite-backed user repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    /// Constructs a repository from a bootstrapped connection.
    ///
    /// # Errors
    /// - `UninitializedConnection` when the schema version is behind.
    /// - `MissingRequiredTable` / `MissingRequiredColumn` when the tables do
    ///   not have the expected shape.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    /// Wraps a connection whose schema the caller has already checked with
    /// [`SqliteUserRepository::try_new`].
    pub(crate) fn new_unchecked(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn add_user(&mut self, user: &mut User) -> RepoResult<UserId> {
        if let Some(id) = user.id {
            return Err(RepoError::AlreadyPersisted(id));
        }
        user.validate()?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO user_account (name, fullname) VALUES (?1, ?2);",
            params![user.name.as_str(), user.fullname.as_deref()],
        )?;
        let user_id = tx.last_insert_rowid();

        let mut address_ids = Vec::with_capacity(user.addresses.len());
        for address in &user.addresses {
            address_ids.push(insert_address(&tx, user_id, &address.email_address)?);
        }
        tx.commit()?;

        user.id = Some(user_id);
        for (address, address_id) in user.addresses.iter_mut().zip(address_ids) {
            address.id = Some(address_id);
            address.user_id = Some(user_id);
        }
        Ok(user_id)
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        let mut users = query_users(self.conn, &format!("{USER_SELECT_SQL} WHERE id = ?1;"), id)?;
        match users.pop() {
            Some(user) => Ok(Some(with_addresses(self.conn, user)?)),
            None => Ok(None),
        }
    }

    fn get_user_by_name(&self, name: &str) -> RepoResult<User> {
        let users = query_users(
            self.conn,
            &format!("{USER_SELECT_SQL} WHERE name = ?1 ORDER BY id ASC;"),
            name,
        )?;
        let user = exactly_one(users, LookupKey::UserName(name.to_string()))?;
        with_addresses(self.conn, user)
    }

    fn list_users(&self) -> RepoResult<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} ORDER BY id ASC;"))?;
        let users = stmt
            .query_map([], parse_user_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        users
            .into_iter()
            .map(|user| with_addresses(self.conn, user))
            .collect()
    }

    fn find_address(&self, user: &User, email_address: &str) -> RepoResult<Address> {
        let user_id = user.id.ok_or(RepoError::Detached)?;
        find_address_in(self.conn, user_id, email_address)
    }

    fn add_address_to_user(
        &mut self,
        user: &mut User,
        email_address: &str,
    ) -> RepoResult<AddressId> {
        let user_id = user.id.ok_or(RepoError::Detached)?;
        validate_pending(user)?;
        Address::new(email_address).validate()?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let pending_ids = insert_pending_addresses(&tx, user_id, user)?;
        let address_id = insert_address(&tx, user_id, email_address)?;
        tx.commit()?;

        apply_pending_ids(user, user_id, pending_ids);
        user.addresses.push(Address {
            id: Some(address_id),
            email_address: email_address.to_string(),
            user_id: Some(user_id),
        });
        Ok(address_id)
    }

    fn update_address(
        &mut self,
        user: &mut User,
        old_email: &str,
        new_email: &str,
    ) -> RepoResult<()> {
        let user_id = user.id.ok_or(RepoError::Detached)?;
        validate_pending(user)?;
        Address::new(new_email).validate()?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let pending_ids = insert_pending_addresses(&tx, user_id, user)?;
        let address = find_address_in(&tx, user_id, old_email)?;
        tx.execute(
            "UPDATE address SET email_address = ?1 WHERE id = ?2;",
            params![new_email, address.id],
        )?;
        tx.commit()?;

        apply_pending_ids(user, user_id, pending_ids);
        if let Some(cached) = user
            .addresses
            .iter_mut()
            .find(|cached| cached.id == address.id)
        {
            cached.email_address = new_email.to_string();
        }
        Ok(())
    }

    fn remove_address_from_user(
        &mut self,
        user: &mut User,
        email_address: &str,
    ) -> RepoResult<()> {
        let user_id = user.id.ok_or(RepoError::Detached)?;
        validate_pending(user)?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let pending_ids = insert_pending_addresses(&tx, user_id, user)?;
        let address = find_address_in(&tx, user_id, email_address)?;
        tx.execute("DELETE FROM address WHERE id = ?1;", [address.id])?;
        tx.commit()?;

        apply_pending_ids(user, user_id, pending_ids);
        user.addresses.retain(|cached| cached.id != address.id);
        Ok(())
    }

    fn delete_user(&mut self, user: &mut User) -> RepoResult<()> {
        let user_id = user.id.ok_or(RepoError::Detached)?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute("DELETE FROM address WHERE user_id = ?1;", [user_id])?;
        let changed = tx.execute("DELETE FROM user_account WHERE id = ?1;", [user_id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(LookupKey::UserId(user_id)));
        }
        tx.commit()?;

        user.id = None;
        user.addresses.clear();
        Ok(())
    }
}

fn insert_address(conn: &Connection, user_id: UserId, email_address: &str) -> RepoResult<AddressId> {
    conn.execute(
        "INSERT INTO address (email_address, user_id) VALUES (?1, ?2);",
        params![email_address, user_id],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Addresses pushed onto a persisted user's collection without an id are
/// written by the next mutating call on that user.
fn validate_pending(user: &User) -> Result<(), UserValidationError> {
    user.addresses
        .iter()
        .filter(|address| address.id.is_none())
        .try_for_each(Address::validate)
}

fn insert_pending_addresses(
    conn: &Connection,
    user_id: UserId,
    user: &User,
) -> RepoResult<Vec<AddressId>> {
    user.addresses
        .iter()
        .filter(|address| address.id.is_none())
        .map(|address| insert_address(conn, user_id, &address.email_address))
        .collect()
}

fn apply_pending_ids(user: &mut User, user_id: UserId, ids: Vec<AddressId>) {
    let pending = user
        .addresses
        .iter_mut()
        .filter(|address| address.id.is_none());
    for (address, address_id) in pending.zip(ids) {
        address.id = Some(address_id);
        address.user_id = Some(user_id);
    }
}

fn find_address_in(conn: &Connection, user_id: UserId, email_address: &str) -> RepoResult<Address> {
    let mut stmt = conn.prepare(&format!(
        "{ADDRESS_SELECT_SQL}
         WHERE user_id = ?1
           AND email_address = ?2
         ORDER BY id ASC;"
    ))?;
    let addresses = stmt
        .query_map(params![user_id, email_address], parse_address_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    exactly_one(
        addresses,
        LookupKey::Address {
            user_id,
            email_address: email_address.to_string(),
        },
    )
}

fn query_users(
    conn: &Connection,
    sql: &str,
    param: impl rusqlite::ToSql,
) -> RepoResult<Vec<User>> {
    let mut stmt = conn.prepare(sql)?;
    let users = stmt
        .query_map([param], parse_user_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(users)
}

fn with_addresses(conn: &Connection, mut user: User) -> RepoResult<User> {
    let Some(user_id) = user.id else {
        return Err(RepoError::InvalidData(
            "user row loaded without id".to_string(),
        ));
    };

    let mut stmt = conn.prepare(&format!(
        "{ADDRESS_SELECT_SQL} WHERE user_id = ?1 ORDER BY id ASC;"
    ))?;
    user.addresses = stmt
        .query_map([user_id], parse_address_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(user)
}

fn exactly_one<T>(mut rows: Vec<T>, key: LookupKey) -> RepoResult<T> {
    match rows.len() {
        0 => Err(RepoError::NotFound(key)),
        1 => rows.pop().ok_or(RepoError::NotFound(key)),
        count => Err(RepoError::AmbiguousMatch { key, count }),
    }
}

fn parse_user_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: Some(row.get("id")?),
        name: row.get("name")?,
        fullname: row.get("fullname")?,
        addresses: Vec::new(),
    })
}

fn parse_address_row(row: &Row<'_>) -> rusqlite::Result<Address> {
    Ok(Address {
        id: Some(row.get("id")?),
        email_address: row.get("email_address")?,
        user_id: Some(row.get("user_id")?),
    })
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = schema_version(conn)?;
    if actual_version < expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    let required: [(&'static str, &[&'static str]); 2] = [
        (USER_TABLE, &["id", "name", "fullname"]),
        (ADDRESS_TABLE, &["id", "email_address", "user_id"]),
    ];
    for (table, columns) in required {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(RepoError::MissingRequiredColumn { table, column });
            }
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
