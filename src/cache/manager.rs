//! Cache manager: typed JSON values over a byte backend, with statistics.

use super::backend::CacheBackend;
use super::key::CacheKey;
use crate::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub key_prefix: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            key_prefix: None,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }
}

/// Counters since startup. `errors` counts backend failures and entries that
/// no longer decode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub errors: u64,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

/// Point-in-time view of one cache, served by the health route.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheReport {
    pub backend: &'static str,
    pub entries: usize,
    pub ttl_secs: u64,
    #[serde(flatten)]
    pub stats: CacheStats,
    pub hit_ratio: f64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    errors: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

pub struct CacheManager {
    config: CacheConfig,
    backend: Box<dyn CacheBackend>,
    counters: Counters,
}

impl CacheManager {
    pub fn new(config: CacheConfig, backend: Box<dyn CacheBackend>) -> Self {
        Self {
            config,
            backend,
            counters: Counters::default(),
        }
    }

    /// Cached value for `key`. An entry that no longer decodes as `T` is
    /// dropped and reported as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Result<Option<T>> {
        let key = self.namespaced(key);
        let data = match self.backend.get(&key).await {
            Ok(Some(data)) => data,
            Ok(None) => {
                Counters::bump(&self.counters.misses);
                return Ok(None);
            }
            Err(e) => {
                Counters::bump(&self.counters.errors);
                return Err(e);
            }
        };

        match serde_json::from_slice(&data) {
            Ok(value) => {
                Counters::bump(&self.counters.hits);
                Ok(Some(value))
            }
            Err(e) => {
                debug!(key = %key, error = %e, "discarding undecodable cache entry");
                Counters::bump(&self.counters.errors);
                Counters::bump(&self.counters.misses);
                self.backend.delete(&key).await?;
                Ok(None)
            }
        }
    }

    pub async fn set<T: Serialize>(&self, key: &CacheKey, value: &T) -> Result<()> {
        self.set_with_ttl(key, value, self.config.ttl).await
    }

    pub async fn set_with_ttl<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Duration) -> Result<()> {
        let data = serde_json::to_vec(value)?;
        let key = self.namespaced(key);
        let outcome = self.backend.set(&key, &data, ttl).await;
        let counter = if outcome.is_ok() { &self.counters.sets } else { &self.counters.errors };
        Counters::bump(counter);
        outcome
    }

    pub async fn delete(&self, key: &CacheKey) -> Result<bool> {
        let key = self.namespaced(key);
        match self.backend.delete(&key).await {
            Ok(removed) => {
                if removed {
                    Counters::bump(&self.counters.deletes);
                }
                Ok(removed)
            }
            Err(e) => {
                Counters::bump(&self.counters.errors);
                Err(e)
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub async fn report(&self) -> Result<CacheReport> {
        let stats = self.stats();
        Ok(CacheReport {
            backend: self.backend_name(),
            entries: self.backend.len().await?,
            ttl_secs: self.config.ttl.as_secs(),
            hit_ratio: stats.hit_ratio(),
            stats,
        })
    }

    fn namespaced(&self, key: &CacheKey) -> CacheKey {
        match self.config.key_prefix {
            Some(ref prefix) => key.prefixed(prefix),
            None => key.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryCache, NullCache};
    use serde_json::{json, Value};

    fn memory_manager(ttl: Duration) -> CacheManager {
        CacheManager::new(CacheConfig::new().with_ttl(ttl), Box::new(MemoryCache::new(16)))
    }

    #[tokio::test]
    async fn test_repeated_reads_are_identical() {
        let cache = memory_manager(Duration::from_secs(60));
        let key = CacheKey::for_endpoint("funnel", [("date_from", "2024-03-01")]);
        let payload = json!({ "stages": [{ "name": "Clicks", "value": 10, "percentage": 100.0 }] });
        cache.set(&key, &payload).await.unwrap();

        let first: Value = cache.get(&key).await.unwrap().unwrap();
        let second: Value = cache.get(&key).await.unwrap().unwrap();
        assert_eq!(serde_json::to_vec(&first).unwrap(), serde_json::to_vec(&second).unwrap());
        assert_eq!(first, payload);
        assert_eq!(cache.stats().hits, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_counts_as_miss() {
        let cache = memory_manager(Duration::from_secs(300));
        let key = CacheKey::new("campaigns");
        cache.set_with_ttl(&key, &json!([1]), Duration::from_secs(5)).await.unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;

        let hit: Option<Value> = cache.get(&key).await.unwrap();
        assert!(hit.is_none());
        assert_eq!(cache.stats(), CacheStats { misses: 1, sets: 1, ..Default::default() });
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_dropped() {
        let cache = memory_manager(Duration::from_secs(60));
        let key = CacheKey::new("funnel");
        cache.set(&key, &json!("not a number")).await.unwrap();

        assert_eq!(cache.get::<u32>(&key).await.unwrap(), None);
        assert_eq!(cache.get::<Value>(&key).await.unwrap(), None);
        let stats = cache.stats();
        assert_eq!((stats.errors, stats.misses, stats.hits), (1, 2, 0));
    }

    #[tokio::test]
    async fn test_prefix_separates_namespaces() {
        let backend = std::sync::Arc::new(MemoryCache::new(4));
        let key = CacheKey::new("k");
        let v1 = CacheManager::new(CacheConfig::new().with_key_prefix("v1"), Box::new(Shared(backend.clone())));
        let v2 = CacheManager::new(CacheConfig::new().with_key_prefix("v2"), Box::new(Shared(backend)));

        v1.set(&key, &7u32).await.unwrap();
        assert_eq!(v1.get::<u32>(&key).await.unwrap(), Some(7));
        assert_eq!(v2.get::<u32>(&key).await.unwrap(), None);
        assert!(v1.delete(&key).await.unwrap());
        assert_eq!(v1.stats().deletes, 1);
    }

    #[tokio::test]
    async fn test_report() {
        let cache = memory_manager(Duration::from_secs(300));
        let key = CacheKey::new("campaigns");
        cache.get::<Value>(&key).await.unwrap();
        cache.set(&key, &json!([])).await.unwrap();
        cache.get::<Value>(&key).await.unwrap();

        let report = cache.report().await.unwrap();
        assert_eq!(report.backend, "memory");
        assert_eq!(report.entries, 1);
        assert_eq!(report.hit_ratio, 0.5);
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            json!({
                "backend": "memory", "entries": 1, "ttlSecs": 300,
                "hits": 1, "misses": 1, "sets": 1, "deletes": 0, "errors": 0,
                "hitRatio": 0.5
            })
        );

        let off = CacheManager::new(CacheConfig::new(), Box::new(NullCache));
        off.set(&key, &1u32).await.unwrap();
        assert_eq!(off.get::<u32>(&key).await.unwrap(), None);
        assert_eq!(off.report().await.unwrap().backend, "null");
    }

    /// Lets two managers share one backend.
    struct Shared(std::sync::Arc<MemoryCache>);

    #[async_trait::async_trait]
    impl CacheBackend for Shared {
        async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
            self.0.get(key).await
        }
        async fn set(&self, key: &CacheKey, value: &[u8], ttl: Duration) -> Result<()> {
            self.0.set(key, value, ttl).await
        }
        async fn delete(&self, key: &CacheKey) -> Result<bool> {
            self.0.delete(key).await
        }
        async fn len(&self) -> Result<usize> {
            self.0.len().await
        }
        fn name(&self) -> &'static str {
            "shared"
        }
    }
}
