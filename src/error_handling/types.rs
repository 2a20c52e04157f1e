//! Error type definitions.
//!
//! This module defines the error types used throughout the application.

use std::time::Duration;

use log::SetLoggerError;
use thiserror::Error;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// The configured database location does not form a valid URL.
    #[error("Invalid database URL: {0}")]
    DatabaseUrlError(#[from] url::ParseError),

    /// The chip table could not be created on start-up.
    #[error("Schema bootstrap error: {0}")]
    SchemaError(#[from] DatabaseError),
}

/// Error types for database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// SQL execution or connection error reported by the driver.
    #[error("SQL error: {0}")]
    SqlError(#[from] sqlx::Error),

    /// Opening a new session did not finish within the connect timeout.
    #[error("Database connection attempt timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// A statement inside a transaction did not finish within its bound.
    #[error("Statement timed out after {0:?}")]
    StatementTimeout(Duration),
}

impl DatabaseError {
    /// The driver error underneath, if any.
    pub fn as_sqlx(&self) -> Option<&sqlx::Error> {
        match self {
            DatabaseError::SqlError(e) => Some(e),
            _ => None,
        }
    }
}

/// Errors that abort a bulk import as a whole.
///
/// Per-row problems never surface here; they are collected in the outcome.
#[derive(Error, Debug)]
pub enum ImportError {
    /// The batch contained no rows; no transaction was opened.
    #[error("Import batch is empty")]
    EmptyBatch,

    /// The upload itself could not be decoded into rows.
    #[error("Invalid import payload: {0}")]
    InvalidPayload(String),

    /// The transaction could not be opened, or failed on an infrastructure error.
    #[error("Import failed: {0}")]
    Database(#[from] DatabaseError),
}

impl From<sqlx::Error> for ImportError {
    fn from(e: sqlx::Error) -> Self {
        ImportError::Database(DatabaseError::SqlError(e))
    }
}

/// Why a single import row was skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowRejection {
    /// None of the number aliases carried a value.
    #[error("number is required")]
    MissingNumber,

    /// The number did not reduce to 10 or 11 digits.
    #[error("invalid number: expected 10 or 11 digits, got {digits}")]
    InvalidNumber { digits: usize },

    /// The number is already stored, or was inserted earlier in the same batch.
    #[error("number {0} already exists")]
    DuplicateNumber(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_rejection_messages() {
        assert_eq!(RowRejection::MissingNumber.to_string(), "number is required");
        assert_eq!(
            RowRejection::InvalidNumber { digits: 8 }.to_string(),
            "invalid number: expected 10 or 11 digits, got 8"
        );
        assert_eq!(
            RowRejection::DuplicateNumber("11988887777".into()).to_string(),
            "number 11988887777 already exists"
        );
    }

    #[test]
    fn test_import_error_from_sqlx() {
        let err: ImportError = sqlx::Error::PoolClosed.into();
        assert!(matches!(
            err,
            ImportError::Database(DatabaseError::SqlError(sqlx::Error::PoolClosed))
        ));
    }

    #[test]
    fn test_database_error_as_sqlx() {
        assert!(DatabaseError::SqlError(sqlx::Error::RowNotFound)
            .as_sqlx()
            .is_some());
        assert!(DatabaseError::ConnectTimeout(Duration::from_secs(10))
            .as_sqlx()
            .is_none());
    }
}
