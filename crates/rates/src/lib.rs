//! Price resolution for CryptoSwap
//!
//! Resolves the price of a trading pair such as `BTCUSDT` through three
//! layers: a short-lived cache, the live market-data source, and a durable
//! last-known-good value written on every successful live fetch.
//!
//! # Feature Flags
//!
//! - `redis` - Enable the Redis price cache
//! - `client` - Enable the Binance HTTP price source

pub mod cache;
pub mod error;
pub mod resolver;
pub mod source;
pub mod symbol;

pub use cache::{InMemoryPriceCache, PriceCache};
pub use error::{RateError, Result};
pub use resolver::{Quote, RateOrigin, RateResolver};
pub use source::{PriceSource, StaticPriceSource};
pub use symbol::SymbolPolicy;

#[cfg(feature = "redis")]
pub use cache::redis::RedisPriceCache;

#[cfg(feature = "client")]
pub use source::http::BinancePriceSource;
