//! Database Module
//!
//! This module provides the store-facing half of BanksLight, organized into
//! focused submodules.
//!
//! ## Architecture
//!
//! - **Connection Management** (`connection.rs`): lazy, shared handle to the SQLite store
//! - **Query Execution** (`query.rs`): parameter binding, read-only execution, cancellation
//! - **Schema Introspection** (`schema.rs`): table listing and column metadata
//!
//! ## Error Handling
//!
//! All operations return `BankslightError`; driver errors are classified at
//! the boundary of each public function.
pub mod connection;
pub mod query;
pub mod schema;

pub use connection::*;
pub use query::*;
pub use schema::*;
