//! Domain records for users and their email addresses.
//!
//! # Responsibility
//! - Define plain data records mirrored by the `user_account` and `address`
//!   tables.
//! - Keep validation rules next to the data they guard.
//!
//! # Invariants
//! - Records carry no storage handle; persistence lives in `repo`.
//! - An address belongs to exactly one user through `user_id`.

pub mod user;
