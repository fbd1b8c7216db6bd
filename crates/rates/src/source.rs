//! Market-data price source - trait and implementations

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::error::{RateError, Result};

/// Live price lookup by symbol - protocol agnostic
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Fetch the current price of a validated, upper-case symbol
    async fn fetch_price(&self, symbol: &str) -> Result<Decimal>;
}

// ==================== Static Implementation ====================

/// Fixed prices for development and tests
#[derive(Default)]
pub struct StaticPriceSource {
    prices: Mutex<HashMap<String, Decimal>>,
    failing: AtomicBool,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StaticPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure a price for a symbol
    pub fn with_price(self, symbol: &str, price: Decimal) -> Self {
        self.set_price(symbol, price);
        self
    }

    /// Configure an artificial latency for every fetch
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Configure the source to fail every fetch
    pub fn failing(self) -> Self {
        self.set_failing(true);
        self
    }

    pub fn set_price(&self, symbol: &str, price: Decimal) {
        self.prices.lock().insert(symbol.to_uppercase(), price);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of fetches so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceSource for StaticPriceSource {
    async fn fetch_price(&self, symbol: &str) -> Result<Decimal> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(RateError::Source("static source offline".to_string()));
        }

        self.prices
            .lock()
            .get(symbol)
            .copied()
            .ok_or_else(|| RateError::Source(format!("no price for {}", symbol)))
    }
}

// ==================== HTTP Implementation ====================

#[cfg(feature = "client")]
pub mod http {
    use std::str::FromStr;
    use std::time::Duration;

    use async_trait::async_trait;
    use reqwest::Client;
    use rust_decimal::Decimal;
    use serde::Deserialize;

    use super::PriceSource;
    use crate::error::{RateError, Result};

    #[derive(Debug, Deserialize)]
    struct TickerPrice {
        price: String,
    }

    /// Binance public ticker API
    pub struct BinancePriceSource {
        client: Client,
        base_url: String,
    }

    impl BinancePriceSource {
        pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
            let client = Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| RateError::Config(e.to_string()))?;

            Ok(Self {
                client,
                base_url: base_url.trim_end_matches('/').to_string(),
            })
        }
    }

    #[async_trait]
    impl PriceSource for BinancePriceSource {
        async fn fetch_price(&self, symbol: &str) -> Result<Decimal> {
            let url = format!("{}/api/v3/ticker/price", self.base_url);

            let response = self
                .client
                .get(&url)
                .query(&[("symbol", symbol)])
                .send()
                .await
                .map_err(|e| RateError::Source(e.to_string()))?;

            if !response.status().is_success() {
                return Err(RateError::Source(format!(
                    "ticker request for {} returned {}",
                    symbol,
                    response.status()
                )));
            }

            let ticker = response
                .json::<TickerPrice>()
                .await
                .map_err(|e| RateError::Source(e.to_string()))?;

            Decimal::from_str(&ticker.price)
                .map_err(|e| RateError::Source(format!("unparseable price '{}': {}", ticker.price, e)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_static_prices() {
        let source = StaticPriceSource::new().with_price("btcusdt", dec!(50000));
        assert_eq!(source.fetch_price("BTCUSDT").await.unwrap(), dec!(50000));
        assert_matches!(source.fetch_price("ETHUSDT").await, Err(RateError::Source(_)));
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_static_failure_toggle() {
        let source = StaticPriceSource::new().with_price("BTCUSDT", dec!(1)).failing();
        assert_matches!(source.fetch_price("BTCUSDT").await, Err(RateError::Source(_)));

        source.set_failing(false);
        assert!(source.fetch_price("BTCUSDT").await.is_ok());
    }
}
