//! Storage error types

use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query error
    #[error("Query error: {0}")]
    Query(String),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Unique constraint violated
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// Referenced record does not exist
    #[error("Foreign key violation: {0}")]
    ForeignKey(String),

    /// Transaction error
    #[error("Transaction error: {0}")]
    Transaction(String),
}

impl StorageError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// The unit of work was already committed or rolled back
    pub fn finished() -> Self {
        Self::Transaction("unit of work already finished".to_string())
    }
}
