//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define data access contracts for users and their addresses.
//! - Isolate SQLite query details from the store facade.
//!
//! # Invariants
//! - Repository writes enforce `User::validate()` / `Address::validate()`
//!   before persistence.
//! - Repository APIs return semantic errors (`NotFound`, `AmbiguousMatch`,
//!   `ConstraintViolation`) in addition to DB transport errors.

pub mod user_repo;
