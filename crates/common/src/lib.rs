//! Common types and utilities for CryptoSwap
//!
//! This crate provides shared types used across all CryptoSwap crates.
//!
//! # Modules
//!
//! - [`error`] - Common error types
//! - [`types`] - Shared domain types (ids, roles, verification tiers, order status)

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
