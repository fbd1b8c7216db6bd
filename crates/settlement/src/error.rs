//! Settlement error types

use rust_decimal::Decimal;
use thiserror::Error;

use common::CurrencyId;
use storage::StorageError;

/// Errors that can occur during settlement operations
#[derive(Error, Debug)]
pub enum SettlementError {
    #[error("Currency not found: {0}")]
    CurrencyNotFound(CurrencyId),

    /// Reserve cannot cover the amount
    #[error("Insufficient reserve in {currency}: required {required}, available {available}")]
    InsufficientReserve {
        currency: String,
        required: Decimal,
        available: Decimal,
    },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result type for settlement operations
pub type Result<T> = std::result::Result<T, SettlementError>;
