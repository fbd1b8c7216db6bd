//! Settlement for CryptoSwap
//!
//! This crate owns the two pieces of the engine that move or prove money:
//!
//! - [`ledger`] - per-currency reserve with an idempotent, serialized debit
//! - [`audit`] - append-only action log; an `order.complete` entry is the
//!   single proof that an order's payout left the reserve
//!
//! Every operation has an `_in` form that runs inside a caller's unit of work,
//! so order status changes, debits and audit entries commit together.

pub mod audit;
pub mod error;
pub mod ledger;

pub use error::{Result, SettlementError};
pub use ledger::SettleOutcome;
