// Core infrastructure modules
pub mod config;
pub mod core;
pub mod table;

// Feature-specific modules
pub mod catalog;
pub mod charts;
pub mod cli;
pub mod customers;
pub mod service;

#[doc(hidden)]
pub mod test_utils;

pub use crate::catalog::{CatalogEntry, QueryCatalog};
pub use crate::config::{Config, StoreConfig};
pub use crate::core::db::{CallOptions, CancelToken, ConnectionManager, Params, QueryExecutor};
pub use crate::core::{BankslightError, Result};
pub use crate::customers::{CustomerFilter, CustomerService, MutationResult, NewCustomer};
pub use crate::service::BankService;
pub use crate::table::{Table, Value};
