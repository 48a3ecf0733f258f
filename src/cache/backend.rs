//! Cache backend implementations.

use super::key::CacheKey;
use crate::Result;
use async_trait::async_trait;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

struct CacheEntry {
    data: Vec<u8>,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.stored_at.elapsed() >= self.ttl
    }
}

/// Byte store behind a [`CacheManager`](super::CacheManager).
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Live entry for `key`; expired entries read as absent.
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &CacheKey, value: &[u8], ttl: Duration) -> Result<()>;
    async fn delete(&self, key: &CacheKey) -> Result<bool>;
    /// Number of live entries.
    async fn len(&self) -> Result<usize>;
    fn name(&self) -> &'static str;
}

/// In-memory cache; least recently used entries are evicted at capacity.
pub struct MemoryCache {
    entries: Mutex<LruCache<CacheKey, CacheEntry>>,
}

impl MemoryCache {
    pub fn new(max_entries: usize) -> Self {
        let cap = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(cap)),
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if !entry.is_expired() => return Ok(Some(entry.data.clone())),
            Some(_) => {}
            None => return Ok(None),
        }
        entries.pop(key);
        Ok(None)
    }

    async fn set(&self, key: &CacheKey, value: &[u8], ttl: Duration) -> Result<()> {
        let entry = CacheEntry {
            data: value.to_vec(),
            stored_at: Instant::now(),
            ttl,
        };
        self.entries.lock().await.put(key.clone(), entry);
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.entries.lock().await.pop(key).is_some())
    }

    async fn len(&self) -> Result<usize> {
        let entries = self.entries.lock().await;
        Ok(entries.iter().filter(|(_, e)| !e.is_expired()).count())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Stores nothing. Selected when caching is switched off in the configuration.
#[derive(Debug, Default)]
pub struct NullCache;

#[async_trait]
impl CacheBackend for NullCache {
    async fn get(&self, _: &CacheKey) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
    async fn set(&self, _: &CacheKey, _: &[u8], _: Duration) -> Result<()> {
        Ok(())
    }
    async fn delete(&self, _: &CacheKey) -> Result<bool> {
        Ok(false)
    }
    async fn len(&self) -> Result<usize> {
        Ok(0)
    }
    fn name(&self) -> &'static str {
        "null"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache = MemoryCache::new(10);
        let key = CacheKey::new("k");
        cache.set(&key, b"v", Duration::from_secs(60)).await.unwrap();

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get(&key).await.unwrap(), Some(b"v".to_vec()));
        assert_eq!(cache.len().await.unwrap(), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.len().await.unwrap(), 0);
        assert_eq!(cache.get(&key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let cache = MemoryCache::new(2);
        let ttl = Duration::from_secs(60);
        cache.set(&CacheKey::new("a"), b"1", ttl).await.unwrap();
        cache.set(&CacheKey::new("b"), b"2", ttl).await.unwrap();
        // Touch "a" so "b" becomes least recently used.
        cache.get(&CacheKey::new("a")).await.unwrap();
        cache.set(&CacheKey::new("c"), b"3", ttl).await.unwrap();

        assert_eq!(cache.len().await.unwrap(), 2);
        assert!(cache.get(&CacheKey::new("a")).await.unwrap().is_some());
        assert!(cache.get(&CacheKey::new("b")).await.unwrap().is_none());
        assert!(cache.get(&CacheKey::new("c")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_and_null_cache() {
        let cache = MemoryCache::new(4);
        let key = CacheKey::new("gone");
        cache.set(&key, b"x", Duration::from_secs(5)).await.unwrap();
        assert!(cache.delete(&key).await.unwrap());
        assert!(!cache.delete(&key).await.unwrap());

        let null = NullCache;
        null.set(&key, b"x", Duration::from_secs(5)).await.unwrap();
        assert_eq!(null.get(&key).await.unwrap(), None);
        assert_eq!(null.len().await.unwrap(), 0);
    }
}
