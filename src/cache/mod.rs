//! 响应缓存模块：为各路由处理器提供带 TTL 的内存缓存。
//!
//! # Response Caching Module
//!
//! Route handlers cache reshaped upstream responses so repeated dashboard
//! refreshes within a short window cost no extra upstream calls and no queue
//! time.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CacheManager`] | TTL handling, key namespacing and hit/miss statistics |
//! | [`CacheReport`] | Backend, live entries and counters, as shown on `/health` |
//! | [`CacheConfig`] | TTL and key prefix |
//! | [`CacheBackend`] | Trait for implementing custom cache backends |
//! | [`MemoryCache`] | In-memory LRU-bounded cache |
//! | [`NullCache`] | No-op backend used when caching is disabled |
//! | [`CacheKey`] | Key derived from endpoint name and query parameters |
//!
//! ## Cache Keys
//!
//! Keys are built from the endpoint name and the sorted query parameters. The
//! reserved [`CACHE_BUST_PARAM`] (`_t`) never takes part in the key; handlers
//! treat its presence as "delete, then refetch".
//!
//! ```rust
//! use vmetrics::cache::{CacheConfig, CacheKey, CacheManager, MemoryCache};
//! use std::time::Duration;
//!
//! # async fn run() -> vmetrics::Result<()> {
//! let cache = CacheManager::new(
//!     CacheConfig::new().with_ttl(Duration::from_secs(60)),
//!     Box::new(MemoryCache::new(1000)),
//! );
//! let key = CacheKey::for_endpoint("campaigns", [("date_from", "2024-01-01")]);
//! cache.set(&key, &vec![1, 2, 3]).await?;
//! let hit: Option<Vec<u32>> = cache.get(&key).await?;
//! assert_eq!(hit, Some(vec![1, 2, 3]));
//! # Ok(())
//! # }
//! ```

mod backend;
mod key;
mod manager;

pub use backend::{CacheBackend, MemoryCache, NullCache};
pub use key::{CacheKey, CACHE_BUST_PARAM};
pub use manager::{CacheConfig, CacheManager, CacheReport, CacheStats};
