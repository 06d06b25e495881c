//! BanksLight Error Module
//!
//! This module defines the error taxonomy for the BanksLight data-access core.
//! Every public operation classifies store-driver failures into one of these
//! variants at its boundary, so no raw `rusqlite::Error` reaches a caller.
use thiserror::Error;

/// Error type for the BanksLight core.
///
/// Only [`BankslightError::Connection`] is fatal; every other variant is
/// recoverable and its message is meant to be shown to the user verbatim.
#[derive(Error, Debug)]
pub enum BankslightError {
    /// The store could not be opened or the handle is unusable
    #[error("Connection error: {0}")]
    Connection(String),

    /// Unknown catalog id or table name
    #[error("Not found: {0}")]
    NotFound(String),

    /// A read statement failed to prepare, bind or execute
    #[error("Query error: {0}")]
    Query(String),

    /// A create collided with an existing customer id
    #[error("Duplicate key: customer '{0}' already exists")]
    DuplicateKey(String),

    /// A write failed for any reason other than a duplicate key
    #[error("Mutation error: {0}")]
    Mutation(String),

    /// Input rejected before it was submitted to the store
    #[error("Validation error: {field} {reason}")]
    Validation { field: &'static str, reason: String },

    /// The call was interrupted by its cancel token or timeout
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unsupported export format
    #[error("Export error: {0}")]
    Export(String),
}

impl BankslightError {
    /// Whether the session cannot continue after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BankslightError::Connection(_))
    }

    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        BankslightError::Validation {
            field,
            reason: reason.into(),
        }
    }
}

/// Type alias for Result to use BankslightError as the error type.
pub type Result<T> = std::result::Result<T, BankslightError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let conn_err = BankslightError::Connection("unable to open database file".to_string());
        assert!(conn_err.to_string().contains("Connection error"));

        let query_err = BankslightError::Query("no such table: foo".to_string());
        assert_eq!(query_err.to_string(), "Query error: no such table: foo");

        let dup_err = BankslightError::DuplicateKey("C001".to_string());
        assert_eq!(
            dup_err.to_string(),
            "Duplicate key: customer 'C001' already exists"
        );

        let validation = BankslightError::validation("age", "must be between 1 and 120");
        assert_eq!(
            validation.to_string(),
            "Validation error: age must be between 1 and 120"
        );
    }

    #[test]
    fn test_only_connection_errors_are_fatal() {
        assert!(BankslightError::Connection("gone".into()).is_fatal());
        assert!(!BankslightError::NotFound("x".into()).is_fatal());
        assert!(!BankslightError::Query("x".into()).is_fatal());
        assert!(!BankslightError::DuplicateKey("x".into()).is_fatal());
        assert!(!BankslightError::Mutation("x".into()).is_fatal());
        assert!(!BankslightError::Cancelled("x".into()).is_fatal());
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: BankslightError = io_err.into();
        match err {
            BankslightError::Io(_) => {}
            _ => panic!("Expected IO error"),
        }

        let json_err: std::result::Result<serde_json::Value, serde_json::Error> =
            serde_json::from_str("{ invalid json }");
        let err: BankslightError = json_err.unwrap_err().into();
        match err {
            BankslightError::Json(_) => {}
            _ => panic!("Expected JSON error"),
        }
    }
}
