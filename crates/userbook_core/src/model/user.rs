//! User and address records.
//!
//! # Invariants
//! - `id` is `None` until storage assigns one.
//! - `User::name` holds at most [`USER_NAME_MAX_CHARS`] characters.
//! - `Address::email_address` is never blank.
//! - `User::addresses` is ordered by address id (insertion order).

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Storage-generated user primary key.
pub type UserId = i64;
/// Storage-generated address primary key.
pub type AddressId = i64;

/// Column width of `user_account.name`.
pub const USER_NAME_MAX_CHARS: usize = 30;

/// Validation errors for user/address records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserValidationError {
    NameTooLong { length: usize, max: usize },
    EmptyEmailAddress,
}

impl Display for UserValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NameTooLong { length, max } => {
                write!(f, "user name has {length} characters; at most {max} allowed")
            }
            Self::EmptyEmailAddress => write!(f, "email_address cannot be empty"),
        }
    }
}

impl Error for UserValidationError {}

/// A user account and the addresses it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Option<UserId>,
    pub name: String,
    pub fullname: Option<String>,
    /// Owned collection; deleting the user deletes every entry.
    #[serde(default)]
    pub addresses: Vec<Address>,
}

impl User {
    /// Creates an unsaved user with no addresses.
    pub fn new(name: impl Into<String>, fullname: Option<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            fullname,
            addresses: Vec::new(),
        }
    }

    /// Builder-style helper that attaches an unsaved address.
    pub fn with_address(mut self, email_address: impl Into<String>) -> Self {
        self.addresses.push(Address::new(email_address));
        self
    }

    /// Checks column constraints for the user and all attached addresses.
    pub fn validate(&self) -> Result<(), UserValidationError> {
        let length = self.name.chars().count();
        if length > USER_NAME_MAX_CHARS {
            return Err(UserValidationError::NameTooLong {
                length,
                max: USER_NAME_MAX_CHARS,
            });
        }
        self.addresses.iter().try_for_each(Address::validate)
    }

    /// Returns whether storage has assigned an id.
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Email addresses in collection order.
    pub fn email_addresses(&self) -> Vec<&str> {
        self.addresses
            .iter()
            .map(|address| address.email_address.as_str())
            .collect()
    }
}

impl Display for User {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "User(id=")?;
        fmt_id(f, self.id)?;
        write!(f, ", name={:?}, fullname=", self.name)?;
        match &self.fullname {
            Some(fullname) => write!(f, "{fullname:?})"),
            None => write!(f, "None)"),
        }
    }
}

/// An email address owned by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: Option<AddressId>,
    pub email_address: String,
    /// Owning user; set once the address is attached to a persisted user.
    pub user_id: Option<UserId>,
}

impl Address {
    /// Creates an unsaved, unattached address.
    pub fn new(email_address: impl Into<String>) -> Self {
        Self {
            id: None,
            email_address: email_address.into(),
            user_id: None,
        }
    }

    pub fn validate(&self) -> Result<(), UserValidationError> {
        if self.email_address.trim().is_empty() {
            return Err(UserValidationError::EmptyEmailAddress);
        }
        Ok(())
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Address(id=")?;
        fmt_id(f, self.id)?;
        write!(f, ", email_address={:?})", self.email_address)
    }
}

fn fmt_id(f: &mut Formatter<'_>, id: Option<i64>) -> std::fmt::Result {
    match id {
        Some(id) => write!(f, "{id}"),
        None => write!(f, "None"),
    }
}
