//! OMS error types

use rust_decimal::Decimal;
use thiserror::Error;

use common::OrderStatus;
use rates::RateError;
use settlement::SettlementError;
use storage::StorageError;

use crate::policy::LimitBreach;

/// Errors that can occur in the Order Management System
#[derive(Error, Debug)]
pub enum OmsError {
    /// Request failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Order, currency or transaction not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller may not act on the resource
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Unverified account exceeded a limit
    #[error("Limit exceeded: {0}")]
    PolicyDenied(LimitBreach),

    /// Status change is not an edge of the order state machine
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Cumulative payments do not cover the order
    #[error("Payment incomplete: paid {paid} of {required}")]
    PaymentIncomplete { paid: Decimal, required: Decimal },

    /// Destination reserve cannot cover the payout
    #[error("Insufficient reserve in {currency}: required {required}, available {available}")]
    InsufficientReserve {
        currency: String,
        required: Decimal,
        available: Decimal,
    },

    /// No live or last-known-good price
    #[error("Rate unavailable: {0}")]
    RateUnavailable(String),

    /// Storage or other internal failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl OmsError {
    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            OmsError::Validation(_) => "VALIDATION_ERROR",
            OmsError::NotFound(_) => "NOT_FOUND",
            OmsError::Forbidden(_) => "FORBIDDEN",
            OmsError::PolicyDenied(_) => "POLICY_DENIED",
            OmsError::InvalidTransition { .. } => "INVALID_TRANSITION",
            OmsError::PaymentIncomplete { .. } => "PAYMENT_INCOMPLETE",
            OmsError::InsufficientReserve { .. } => "INSUFFICIENT_RESERVE",
            OmsError::RateUnavailable(_) => "RATE_UNAVAILABLE",
            OmsError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub(crate) fn staff_only() -> Self {
        OmsError::Forbidden("operator or admin role required".to_string())
    }
}

impl From<StorageError> for OmsError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => OmsError::NotFound(what),
            StorageError::Duplicate(what) => OmsError::Validation(format!("already exists: {}", what)),
            StorageError::ForeignKey(what) => OmsError::NotFound(what),
            other => {
                tracing::error!(error = %other, "Storage failure");
                OmsError::Internal(other.to_string())
            }
        }
    }
}

impl From<SettlementError> for OmsError {
    fn from(err: SettlementError) -> Self {
        match err {
            SettlementError::CurrencyNotFound(id) => OmsError::NotFound(format!("currency {}", id)),
            SettlementError::InsufficientReserve {
                currency,
                required,
                available,
            } => OmsError::InsufficientReserve {
                currency,
                required,
                available,
            },
            SettlementError::InvalidAmount(msg) => OmsError::Validation(msg),
            SettlementError::Storage(e) => e.into(),
        }
    }
}

impl From<RateError> for OmsError {
    fn from(err: RateError) -> Self {
        match err {
            RateError::InvalidSymbol(msg) => OmsError::Validation(format!("invalid symbol: {}", msg)),
            other => OmsError::RateUnavailable(other.to_string()),
        }
    }
}

/// Result type for OMS operations
pub type Result<T> = std::result::Result<T, OmsError>;
