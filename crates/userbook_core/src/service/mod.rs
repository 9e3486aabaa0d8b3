//! Store facade over the user repository.
//!
//! # Responsibility
//! - Own the single connection a caller works against.
//! - Expose the CRUD contract with open/close lifecycle and logging.

pub mod user_store;
