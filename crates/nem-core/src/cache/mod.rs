//! Tiered query-result cache: an in-process LRU bounded by bytes and TTL,
//! an optional redb-backed disk tier, and per-key single-flight so
//! concurrent misses for the same query execute once.

mod config;
mod disk;
mod key;
mod memory;
mod single_flight;

pub use config::{CacheConfig, DiskCacheConfig};
pub use disk::{DiskCache, DiskCacheStats, DiskEntry, EntryHeader, DISK_SCHEMA_VERSION};
pub use key::CacheKey;
pub use memory::{CacheStats, MemoryCache};
pub use single_flight::{Flight, LeaderGuard, Role, SingleFlight};
