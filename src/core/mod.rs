//! Core Module for BanksLight
//!
//! This module contains the shared infrastructure of the data-access core:
//! the store connection, query execution, schema introspection and the
//! error taxonomy used across every public operation.

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{BankslightError, Result};
