//! Observability infrastructure for CryptoSwap
//!
//! This crate provides:
//! - Structured logging via tracing
//! - Prometheus metrics for the swap engine and its HTTP surface
//!
//! # Quick Start
//!
//! ```ignore
//! use observability::{init_logging, LogFormat};
//!
//! init_logging("swapd", LogFormat::Pretty)?;
//!
//! // Optional; without it every metric call is a no-op
//! observability::metrics::init_metrics(9090)?;
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat};
pub use metrics::{init_metrics, HttpMetrics, RequestMetricsGuard};
