//! Common error types for CryptoSwap

use thiserror::Error;

/// Common error type used across CryptoSwap crates
#[derive(Error, Debug)]
pub enum Error {
    /// Input failed to parse or validate
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias using the common Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
