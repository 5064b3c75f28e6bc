use crate::cache::config::CacheConfig;
use crate::cache::key::CacheKey;
use crate::types::{DataType, ResultSet};
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

struct CachedEntry {
    value: Arc<ResultSet>,
    data_type: DataType,
    /// `None` when the TTL is too large to represent as an instant.
    expires_at: Option<Instant>,
    size_bytes: usize,
}

struct Inner {
    /// Unbounded by count; the byte budget drives eviction.
    lru: LruCache<CacheKey, CachedEntry>,
    bytes: usize,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    invalidations: AtomicU64,
    rejected: AtomicU64,
}

/// Snapshot of cache state and counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub bytes: usize,
    pub max_bytes: usize,
    pub hits: u64,
    pub misses: u64,
    pub stores: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub invalidations: u64,
    /// Results too large for the per-entry or aggregate budget.
    pub rejected: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }
}

/// In-process LRU cache bounded by bytes, with per-entry TTL.
///
/// The lock is held only for bookkeeping, never while a query runs. LRU
/// eviction and TTL expiry are independent: an entry is dropped as soon as
/// either applies.
pub struct MemoryCache {
    config: CacheConfig,
    inner: Mutex<Inner>,
    counters: Counters,
}

impl MemoryCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                lru: LruCache::unbounded(),
                bytes: 0,
            }),
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<ResultSet>> {
        let value = self.lookup(key);
        let counter = if value.is_some() {
            &self.counters.hits
        } else {
            &self.counters.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        value
    }

    /// Like `get`, without touching the hit/miss counters. Used to re-check
    /// a key the caller has already counted as a miss.
    pub fn peek_fresh(&self, key: &CacheKey) -> Option<Arc<ResultSet>> {
        self.lookup(key)
    }

    fn lookup(&self, key: &CacheKey) -> Option<Arc<ResultSet>> {
        if !self.config.enabled {
            return None;
        }

        let mut inner = self.inner.lock();
        let expired = is_expired(inner.lru.peek(key)?, Instant::now());

        if expired {
            if let Some(entry) = inner.lru.pop(key) {
                inner.bytes -= entry.size_bytes;
            }
            self.counters.expirations.fetch_add(1, Ordering::Relaxed);
            log::debug!("memory cache EXPIRED {}", key.short());
            return None;
        }

        inner.lru.get(key).map(|e| e.value.clone())
    }

    /// Store a result. Returns false when the result does not fit the
    /// per-entry or aggregate budget (nothing is evicted in that case).
    pub fn insert(&self, key: CacheKey, value: Arc<ResultSet>) -> bool {
        self.insert_until(key, value, None)
    }

    /// Store a result that must not outlive `deadline`. The entry expires at
    /// the earlier of the deadline and the configured TTL.
    pub fn insert_until(
        &self,
        key: CacheKey,
        value: Arc<ResultSet>,
        deadline: Option<Instant>,
    ) -> bool {
        if !self.config.enabled {
            return false;
        }

        let now = Instant::now();
        let expires_at = match (deadline, now.checked_add(self.config.ttl)) {
            (Some(deadline), Some(ttl)) => Some(deadline.min(ttl)),
            (deadline, ttl) => deadline.or(ttl),
        };
        if expires_at.is_some_and(|at| at <= now) {
            return false;
        }

        let size_bytes = value.estimated_bytes() + key.as_str().len();
        if size_bytes > self.config.max_entry_bytes || size_bytes > self.config.max_bytes {
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            log::debug!(
                "memory cache REJECT {} ({} bytes over budget)",
                key.short(),
                size_bytes
            );
            return false;
        }

        let mut inner = self.inner.lock();
        self.purge_expired_locked(&mut inner);

        if let Some(old) = inner.lru.pop(&key) {
            inner.bytes -= old.size_bytes;
        }

        while inner.bytes + size_bytes > self.config.max_bytes {
            match inner.lru.pop_lru() {
                Some((evicted_key, evicted)) => {
                    inner.bytes -= evicted.size_bytes;
                    self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                    log::debug!("memory cache EVICT {}", evicted_key.short());
                }
                None => break,
            }
        }

        let data_type = value.data_type;
        inner.bytes += size_bytes;
        inner.lru.push(
            key,
            CachedEntry {
                value,
                data_type,
                expires_at,
                size_bytes,
            },
        );
        self.counters.stores.fetch_add(1, Ordering::Relaxed);
        true
    }

    pub fn invalidate(&self, key: &CacheKey) -> bool {
        let mut inner = self.inner.lock();
        match inner.lru.pop(key) {
            Some(entry) => {
                inner.bytes -= entry.size_bytes;
                self.counters.invalidations.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Drop every entry holding results for `data_type`.
    pub fn invalidate_data_type(&self, data_type: DataType) -> usize {
        let mut inner = self.inner.lock();
        let keys: Vec<CacheKey> = inner
            .lru
            .iter()
            .filter(|(_, e)| e.data_type == data_type)
            .map(|(k, _)| k.clone())
            .collect();

        for key in &keys {
            if let Some(entry) = inner.lru.pop(key) {
                inner.bytes -= entry.size_bytes;
            }
        }
        self.counters
            .invalidations
            .fetch_add(keys.len() as u64, Ordering::Relaxed);
        keys.len()
    }

    /// Eagerly drop entries past their TTL. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        let mut inner = self.inner.lock();
        self.purge_expired_locked(&mut inner)
    }

    fn purge_expired_locked(&self, inner: &mut Inner) -> usize {
        let now = Instant::now();
        let expired: Vec<CacheKey> = inner
            .lru
            .iter()
            .filter(|(_, e)| is_expired(e, now))
            .map(|(k, _)| k.clone())
            .collect();

        for key in &expired {
            if let Some(entry) = inner.lru.pop(key) {
                inner.bytes -= entry.size_bytes;
            }
        }
        self.counters
            .expirations
            .fetch_add(expired.len() as u64, Ordering::Relaxed);
        expired.len()
    }

    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock();
        let count = inner.lru.len();
        inner.lru.clear();
        inner.bytes = 0;
        count
    }

    pub fn len(&self) -> usize {
        self.inner.lock().lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().lru.is_empty()
    }

    pub fn size_bytes(&self) -> usize {
        self.inner.lock().bytes
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.inner.lock().lru.contains(key)
    }

    pub fn stats(&self) -> CacheStats {
        let (entries, bytes) = {
            let inner = self.inner.lock();
            (inner.lru.len(), inner.bytes)
        };
        CacheStats {
            entries,
            bytes,
            max_bytes: self.config.max_bytes,
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            stores: self.counters.stores.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            expirations: self.counters.expirations.load(Ordering::Relaxed),
            invalidations: self.counters.invalidations.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
        }
    }
}

fn is_expired(entry: &CachedEntry, now: Instant) -> bool {
    entry.expires_at.is_some_and(|at| now > at)
}
