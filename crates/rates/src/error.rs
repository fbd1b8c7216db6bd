//! Rate resolution error types

use thiserror::Error;

/// Errors that can occur while resolving a price
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RateError {
    /// Symbol failed validation; nothing was looked up
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Live source failed and no last-known-good price exists
    #[error("Rate unavailable: {0}")]
    Unavailable(String),

    /// Cache backend error
    #[error("Cache error: {0}")]
    Cache(String),

    /// Market-data source error
    #[error("Source error: {0}")]
    Source(String),

    /// Market-data source did not answer in time
    #[error("Source timed out after {0} ms")]
    Timeout(u64),

    /// Invalid resolver configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RateError {
    /// Label used for the failure counter
    pub fn reason(&self) -> &'static str {
        match self {
            RateError::InvalidSymbol(_) => "invalid_symbol",
            RateError::Unavailable(_) => "unavailable",
            RateError::Cache(_) => "cache",
            RateError::Source(_) => "source",
            RateError::Timeout(_) => "timeout",
            RateError::Config(_) => "config",
        }
    }
}

/// Result type for rate operations
pub type Result<T> = std::result::Result<T, RateError>;
