//! Price cache - trait and implementations

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::error::Result;

/// Key/value cache with optional per-key expiry
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceCache: Send + Sync {
    /// Read a key; expired keys read as absent
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a key; `None` means the key never expires
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;
}

// ==================== In-Memory Implementation ====================

/// Process-local cache for development and tests
#[derive(Default)]
pub struct InMemoryPriceCache {
    entries: Mutex<HashMap<String, (String, Option<Instant>)>>,
}

impl InMemoryPriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .values()
            .filter(|(_, expires)| expires.map_or(true, |at| at > now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PriceCache for InMemoryPriceCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock();
        let expired = match entries.get(key) {
            None => return Ok(None),
            Some((_, Some(at))) => *at <= Instant::now(),
            Some((_, None)) => false,
        };
        if expired {
            entries.remove(key);
            return Ok(None);
        }
        Ok(entries.get(key).map(|(value, _)| value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let expires = ttl.map(|ttl| Instant::now() + ttl);
        self.entries
            .lock()
            .insert(key.to_string(), (value.to_string(), expires));
        Ok(())
    }
}

// ==================== Redis Implementation ====================

#[cfg(feature = "redis")]
pub mod redis {
    use std::sync::Arc;
    use std::time::Duration;

    use ::redis::aio::ConnectionManager;
    use ::redis::AsyncCommands;
    use async_trait::async_trait;
    use tracing::info;

    use super::PriceCache;
    use crate::error::{RateError, Result};

    /// Redis-backed price cache shared by every process
    pub struct RedisPriceCache {
        redis: Arc<tokio::sync::Mutex<ConnectionManager>>,
        key_prefix: String,
    }

    impl RedisPriceCache {
        pub async fn connect(config: &config::RedisConfig) -> Result<Self> {
            let client =
                ::redis::Client::open(config.url.as_str()).map_err(|e| RateError::Cache(e.to_string()))?;

            let connection_manager = client
                .get_connection_manager()
                .await
                .map_err(|e| RateError::Cache(e.to_string()))?;

            info!(prefix = %config.key_prefix, "Connected to Redis price cache");

            Ok(Self {
                redis: Arc::new(tokio::sync::Mutex::new(connection_manager)),
                key_prefix: config.key_prefix.clone(),
            })
        }

        fn key(&self, key: &str) -> String {
            format!("{}{}", self.key_prefix, key)
        }
    }

    #[async_trait]
    impl PriceCache for RedisPriceCache {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            let key = self.key(key);
            let mut redis = self.redis.lock().await;
            redis
                .get::<_, Option<String>>(&key)
                .await
                .map_err(|e| RateError::Cache(e.to_string()))
        }

        async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
            let key = self.key(key);
            let mut redis = self.redis.lock().await;
            match ttl {
                Some(ttl) => ::redis::cmd("SET")
                    .arg(&key)
                    .arg(value)
                    .arg("EX")
                    .arg(ttl.as_secs().max(1))
                    .query_async::<_, ()>(&mut *redis)
                    .await,
                None => redis.set::<_, _, ()>(&key, value).await,
            }
            .map_err(|e| RateError::Cache(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let cache = InMemoryPriceCache::new();
        cache.set("price:BTCUSDT", "{}", Some(Duration::from_secs(30))).await.unwrap();
        cache.set("last_good:BTCUSDT", "{}", None).await.unwrap();
        assert_eq!(cache.len(), 2);

        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(cache.get("price:BTCUSDT").await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get("price:BTCUSDT").await.unwrap().is_none());
        assert!(cache.get("last_good:BTCUSDT").await.unwrap().is_some());
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_overwrite() {
        let cache = InMemoryPriceCache::new();
        cache.set("k", "1", None).await.unwrap();
        cache.set("k", "2", None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("2"));
        assert!(cache.get("missing").await.unwrap().is_none());
    }
}
