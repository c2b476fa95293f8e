//! Caching layer for market series to reduce API calls

use cached::{Cached, TimedCache};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Cache key for a provider lookup
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Data provider ("fred", "alpha_vantage")
    pub provider: String,
    /// Series id or currency pair
    pub series: String,
}

impl CacheKey {
    /// Create a new cache key
    pub fn new(provider: impl Into<String>, series: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            series: series.into(),
        }
    }
}

/// Thread-safe TTL cache of series values
#[derive(Clone)]
pub struct MarketCache {
    cache: Arc<RwLock<TimedCache<CacheKey, f64>>>,
}

impl MarketCache {
    /// Create a new cache with specified TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Arc::new(RwLock::new(TimedCache::with_lifespan(ttl))),
        }
    }

    /// Get a value from the cache
    pub async fn get(&self, key: &CacheKey) -> Option<f64> {
        let mut cache = self.cache.write().await;
        cache.cache_get(key).copied()
    }

    /// Insert a value into the cache
    pub async fn insert(&self, key: CacheKey, value: f64) {
        let mut cache = self.cache.write().await;
        let _ = cache.cache_set(key, value);
    }

    /// Return the cached value or fetch, cache and return a fresh one
    ///
    /// Failed fetches are not cached.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: CacheKey, fetcher: F) -> Result<f64, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<f64, E>>,
    {
        if let Some(value) = self.get(&key).await {
            tracing::debug!("Cache hit for key: {:?}", key);
            return Ok(value);
        }

        tracing::debug!("Cache miss for key: {:?}", key);

        let value = fetcher().await?;
        self.insert(key, value).await;

        Ok(value)
    }
}
