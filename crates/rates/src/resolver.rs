//! Layered rate resolution
//!
//! `price:<SYMBOL>` holds a short-lived copy of the last live price and
//! `last_good:<SYMBOL>` holds the same value without expiry. Both store
//! `{"price": "<decimal>"}`.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use observability::metrics::{record_rate_failure, record_rate_resolution};

use crate::cache::PriceCache;
use crate::error::{RateError, Result};
use crate::source::PriceSource;
use crate::symbol::SymbolPolicy;

const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Where a resolved price came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateOrigin {
    Cache,
    Live,
    LastKnownGood,
}

impl RateOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateOrigin::Cache => "cache",
            RateOrigin::Live => "live",
            RateOrigin::LastKnownGood => "last_good",
        }
    }
}

/// A resolved price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Normalized symbol
    pub symbol: String,
    pub price: Decimal,
    pub origin: RateOrigin,
}

#[derive(Serialize, Deserialize)]
struct CachedPrice {
    price: Decimal,
}

fn price_key(symbol: &str) -> String {
    format!("price:{}", symbol)
}

fn last_good_key(symbol: &str) -> String {
    format!("last_good:{}", symbol)
}

/// Rate resolver: cache, then live source, then last-known-good
///
/// Never retries the live call and never holds a lock across it.
pub struct RateResolver {
    cache: Arc<dyn PriceCache>,
    source: Arc<dyn PriceSource>,
    policy: SymbolPolicy,
    cache_ttl: Duration,
    fetch_timeout: Duration,
}

impl RateResolver {
    pub fn new(cache: Arc<dyn PriceCache>, source: Arc<dyn PriceSource>, policy: SymbolPolicy) -> Self {
        Self {
            cache,
            source,
            policy,
            cache_ttl: DEFAULT_CACHE_TTL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn from_config(
        cache: Arc<dyn PriceCache>,
        source: Arc<dyn PriceSource>,
        config: &config::RatesConfig,
    ) -> Result<Self> {
        Ok(Self::new(cache, source, SymbolPolicy::from_config(config)?)
            .with_cache_ttl(Duration::from_secs(config.cache_ttl_seconds))
            .with_fetch_timeout(Duration::from_millis(config.timeout_ms)))
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn policy(&self) -> &SymbolPolicy {
        &self.policy
    }

    /// Resolve a symbol to a price
    pub async fn resolve(&self, symbol: &str) -> Result<Decimal> {
        self.quote(symbol).await.map(|quote| quote.price)
    }

    /// Resolve a symbol, reporting which layer answered
    pub async fn quote(&self, raw_symbol: &str) -> Result<Quote> {
        let result = self.resolve_layers(raw_symbol).await;
        match &result {
            Ok(quote) => record_rate_resolution(quote.origin.as_str()),
            Err(e) => record_rate_failure(e.reason()),
        }
        result
    }

    /// Resolve many symbols; a failing symbol maps to `None`
    pub async fn quotes(&self, symbols: &[String]) -> Vec<(String, Option<Decimal>)> {
        let mut result = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let price = match self.resolve(symbol).await {
                Ok(price) => Some(price),
                Err(e) => {
                    debug!(symbol = %symbol, error = %e, "Rate omitted from listing");
                    None
                }
            };
            result.push((symbol.clone(), price));
        }
        result
    }

    async fn resolve_layers(&self, raw_symbol: &str) -> Result<Quote> {
        let symbol = self.policy.normalize(raw_symbol)?;

        if let Some(price) = self.read_cached(&price_key(&symbol)).await {
            debug!(symbol = %symbol, %price, "Rate cache hit");
            return Ok(Quote {
                symbol,
                price,
                origin: RateOrigin::Cache,
            });
        }

        let failure = match tokio::time::timeout(self.fetch_timeout, self.source.fetch_price(&symbol)).await {
            Ok(Ok(price)) if price > Decimal::ZERO => {
                self.store_live(&symbol, price).await;
                info!(symbol = %symbol, %price, "Rate fetched from source");
                return Ok(Quote {
                    symbol,
                    price,
                    origin: RateOrigin::Live,
                });
            }
            Ok(Ok(price)) => RateError::Source(format!("non-positive price {}", price)),
            Ok(Err(e)) => e,
            Err(_) => RateError::Timeout(self.fetch_timeout.as_millis() as u64),
        };

        match self.read_cached(&last_good_key(&symbol)).await {
            Some(price) => {
                warn!(symbol = %symbol, %price, error = %failure, "Live rate failed, using last known good");
                Ok(Quote {
                    symbol,
                    price,
                    origin: RateOrigin::LastKnownGood,
                })
            }
            None => {
                warn!(symbol = %symbol, error = %failure, "Live rate failed with no fallback");
                Err(RateError::Unavailable(symbol))
            }
        }
    }

    /// Cache read; errors and unparseable values count as a miss
    async fn read_cached(&self, key: &str) -> Option<Decimal> {
        let raw = match self.cache.get(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!(key, error = %e, "Price cache read failed");
                return None;
            }
        };

        match serde_json::from_str::<CachedPrice>(&raw) {
            Ok(cached) if cached.price > Decimal::ZERO => Some(cached.price),
            _ => {
                debug!(key, "Ignoring unparseable cached price");
                None
            }
        }
    }

    /// Write both cache layers; failures are logged only
    async fn store_live(&self, symbol: &str, price: Decimal) {
        let payload = match serde_json::to_string(&CachedPrice { price }) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(symbol, error = %e, "Failed to encode price for cache");
                return;
            }
        };

        if let Err(e) = self
            .cache
            .set(&price_key(symbol), &payload, Some(self.cache_ttl))
            .await
        {
            warn!(symbol, error = %e, "Failed to cache price");
        }
        if let Err(e) = self.cache.set(&last_good_key(symbol), &payload, None).await {
            warn!(symbol, error = %e, "Failed to store last known good price");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{InMemoryPriceCache, MockPriceCache};
    use crate::source::{MockPriceSource, StaticPriceSource};
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn resolver(cache: Arc<dyn PriceCache>, source: Arc<dyn PriceSource>) -> RateResolver {
        RateResolver::new(cache, source, SymbolPolicy::default())
    }

    #[tokio::test]
    async fn test_cache_hit_skips_source() {
        let cache = Arc::new(InMemoryPriceCache::new());
        cache
            .set("price:BTCUSDT", r#"{"price":"51000"}"#, Some(Duration::from_secs(30)))
            .await
            .unwrap();

        let mut source = MockPriceSource::new();
        source.expect_fetch_price().times(0);

        let quote = resolver(cache, Arc::new(source)).quote("btcusdt").await.unwrap();
        assert_eq!(quote.price, dec!(51000));
        assert_eq!(quote.origin, RateOrigin::Cache);
    }

    #[tokio::test]
    async fn test_miss_fetches_and_populates_both_layers() {
        let cache = Arc::new(InMemoryPriceCache::new());
        let mut source = MockPriceSource::new();
        source.expect_fetch_price().times(1).returning(|_| Ok(dec!(50123.45)));

        let resolver = resolver(cache.clone(), Arc::new(source));
        let quote = resolver.quote("BTCUSDT").await.unwrap();
        assert_eq!(quote.origin, RateOrigin::Live);
        assert_eq!(quote.price, dec!(50123.45));

        assert!(cache.get("price:BTCUSDT").await.unwrap().is_some());
        assert!(cache.get("last_good:BTCUSDT").await.unwrap().is_some());

        // Served from cache; the mock allows one call only
        let again = resolver.quote("BTCUSDT").await.unwrap();
        assert_eq!(again.origin, RateOrigin::Cache);
        assert_eq!(again.price, dec!(50123.45));
    }

    #[tokio::test]
    async fn test_source_failure_uses_last_good() {
        let cache = Arc::new(InMemoryPriceCache::new());
        cache.set("last_good:BTCUSDT", r#"{"price":50000}"#, None).await.unwrap();
        let source = Arc::new(StaticPriceSource::new().failing());

        let quote = resolver(cache, source.clone()).quote("BTCUSDT").await.unwrap();
        assert_eq!(quote.price, dec!(50000));
        assert_eq!(quote.origin, RateOrigin::LastKnownGood);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_source_failure_without_fallback() {
        let cache = Arc::new(InMemoryPriceCache::new());
        let source = Arc::new(StaticPriceSource::new().failing());

        let result = resolver(cache, source).resolve("BTCUSDT").await;
        assert_matches!(result, Err(RateError::Unavailable(symbol)) if symbol == "BTCUSDT");
    }

    #[tokio::test]
    async fn test_invalid_symbol_touches_nothing() {
        // Mocks without expectations panic on any call
        let cache = MockPriceCache::new();
        let mut source = MockPriceSource::new();
        source.expect_fetch_price().times(0);

        let result = resolver(Arc::new(cache), Arc::new(source)).resolve("bad###").await;
        assert_matches!(result, Err(RateError::InvalidSymbol(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_source_times_out_to_last_good() {
        let cache = Arc::new(InMemoryPriceCache::new());
        cache.set("last_good:ETHUSDT", r#"{"price":"3000"}"#, None).await.unwrap();
        let source = Arc::new(
            StaticPriceSource::new()
                .with_price("ETHUSDT", dec!(3100))
                .with_delay(Duration::from_secs(60)),
        );

        let resolver = resolver(cache, source).with_fetch_timeout(Duration::from_millis(200));
        let quote = resolver.quote("ETHUSDT").await.unwrap();
        assert_eq!(quote.origin, RateOrigin::LastKnownGood);
        assert_eq!(quote.price, dec!(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_price_expires() {
        let cache = Arc::new(InMemoryPriceCache::new());
        let source = Arc::new(StaticPriceSource::new().with_price("BTCUSDT", dec!(50000)));
        let resolver = resolver(cache, source.clone()).with_cache_ttl(Duration::from_secs(30));

        resolver.resolve("BTCUSDT").await.unwrap();
        resolver.resolve("BTCUSDT").await.unwrap();
        assert_eq!(source.calls(), 1);

        tokio::time::advance(Duration::from_secs(31)).await;
        source.set_price("BTCUSDT", dec!(52000));
        assert_eq!(resolver.resolve("BTCUSDT").await.unwrap(), dec!(52000));
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_cache_errors_do_not_fail_live_fetch() {
        let mut cache = MockPriceCache::new();
        cache
            .expect_get()
            .returning(|_| Err(RateError::Cache("connection refused".into())));
        cache
            .expect_set()
            .returning(|_, _, _| Err(RateError::Cache("connection refused".into())));
        let source = Arc::new(StaticPriceSource::new().with_price("BTCUSDT", dec!(50000)));

        let quote = resolver(Arc::new(cache), source).quote("BTCUSDT").await.unwrap();
        assert_eq!(quote.origin, RateOrigin::Live);
    }

    #[tokio::test]
    async fn test_garbage_in_cache_is_a_miss() {
        let cache = Arc::new(InMemoryPriceCache::new());
        cache.set("price:BTCUSDT", "not json", None).await.unwrap();
        let source = Arc::new(StaticPriceSource::new().with_price("BTCUSDT", dec!(50000)));

        let quote = resolver(cache, source).quote("BTCUSDT").await.unwrap();
        assert_eq!(quote.origin, RateOrigin::Live);
    }

    #[tokio::test]
    async fn test_quotes_maps_failures_to_none() {
        let cache = Arc::new(InMemoryPriceCache::new());
        let source = Arc::new(StaticPriceSource::new().with_price("BTCUSDT", dec!(50000)));
        let resolver = resolver(cache, source);

        let listing = resolver
            .quotes(&["BTCUSDT".to_string(), "XRPUSDT".to_string(), "bad###".to_string()])
            .await;
        assert_eq!(
            listing,
            vec![
                ("BTCUSDT".to_string(), Some(dec!(50000))),
                ("XRPUSDT".to_string(), None),
                ("bad###".to_string(), None),
            ]
        );
    }
}
