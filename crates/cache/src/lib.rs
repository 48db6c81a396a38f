//! Response caching for ncli
//!
//! This crate layers the pieces every remote read goes through:
//! - An in-memory TTL cache with bounded size
//! - A persistent disk tier with atomic writes and a size budget
//! - Request deduplication for concurrent identical calls
//! - `CachedFetch`, which composes them with retry and a circuit breaker

pub mod dedup;
pub mod disk;
pub mod entry;
pub mod fetch;
pub mod keys;
pub mod memory;
pub mod stats;

pub use dedup::{DedupStats, DeduplicationManager};
pub use disk::{DiskCacheConfig, DiskCacheError, DiskCacheManager, EnforcementReport};
pub use entry::{CacheEntry, DiskCacheEntry};
pub use fetch::{CachedFetch, FetchOptions};
pub use keys::{cache_key, KeyPart};
pub use memory::MemoryCache;
pub use stats::{CacheStats, DiskCacheStats};
