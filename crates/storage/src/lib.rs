//! Storage abstractions for CryptoSwap
//!
//! This crate owns the persisted records (currencies, orders, payment
//! transactions, audit entries) and the transactional unit-of-work seam the
//! engine crates run against.
//!
//! # Backends
//!
//! - [`InMemoryStore`] - single-process store for development and tests
//! - `PostgresStore` - PostgreSQL via `sqlx` (feature `postgres`)
//!
//! # Feature Flags
//!
//! - `postgres` - Enable PostgreSQL storage

pub mod error;
pub mod models;
pub mod store;

pub use error::StorageError;
pub use models::{
    normalize_code, AuditEntry, Currency, Order, OrderFilter, Transaction, SETTLEMENT_ACTION,
};
pub use store::memory::InMemoryStore;
pub use store::traits::{Store, UnitOfWork};

#[cfg(feature = "postgres")]
pub use store::postgres::PostgresStore;

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;
