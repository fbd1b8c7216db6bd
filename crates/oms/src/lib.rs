//! Order Management System for CryptoSwap
//!
//! This crate handles the exchange order lifecycle.
//!
//! # Features
//!
//! - Order creation with live pricing and a flagged default-price fallback
//! - Limits for unverified accounts
//! - Payment recording and the order state machine
//! - Settlement through the reserve ledger, at most once per order
//! - Currency administration, public rates and order analytics
//!
//! # Feature Flags
//!
//! - `api` - Enable HTTP API

pub mod error;
pub mod manager;
pub mod policy;
pub mod state;
pub mod types;
pub mod wallet;

#[cfg(feature = "api")]
pub mod api;

// Re-export commonly used types
pub use error::{OmsError, Result};
pub use manager::{OrderManager, MAX_PAGE};
pub use policy::{LimitBreach, LimitDecision, LimitPolicy};
pub use types::{
    CreateOrder, CreatedOrder, DailyVolume, OrdersSummary, PaymentReceipt, PriceOrigin, StatusStats,
};
