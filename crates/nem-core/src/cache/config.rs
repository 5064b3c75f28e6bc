use crate::error::{NemError, Result};
use std::path::PathBuf;
use std::time::Duration;

/// In-process cache budget and freshness.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Aggregate byte budget across all entries. Default: 256 MiB.
    pub max_bytes: usize,

    /// Results larger than this are returned but never cached. Default: 64 MiB.
    pub max_entry_bytes: usize,

    /// Time-to-live for each entry. Default: 5 minutes.
    pub ttl: Duration,

    /// Disable to bypass the memory tier entirely.
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_bytes: 256 * 1024 * 1024,
            max_entry_bytes: 64 * 1024 * 1024,
            ttl: Duration::from_secs(300),
            enabled: true,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_bytes(mut self, bytes: usize) -> Self {
        self.max_bytes = bytes;
        self
    }

    pub fn with_max_entry_bytes(mut self, bytes: usize) -> Self {
        self.max_entry_bytes = bytes;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_bytes == 0 {
            return Err(NemError::Configuration("cache max_bytes must be > 0".into()));
        }
        if self.max_entry_bytes == 0 {
            return Err(NemError::Configuration(
                "cache max_entry_bytes must be > 0".into(),
            ));
        }
        if self.ttl.is_zero() {
            return Err(NemError::Configuration("cache ttl must be > 0".into()));
        }
        Ok(())
    }
}

/// Optional persistent tier.
#[derive(Debug, Clone)]
pub struct DiskCacheConfig {
    /// Directory holding `query-cache.redb`.
    pub dir: PathBuf,

    /// Wall-clock lifetime of a persisted entry. Default: 24 hours.
    pub ttl: Duration,

    /// Serialized payloads above this size are not persisted. Default: 128 MiB.
    pub max_entry_bytes: usize,
}

impl DiskCacheConfig {
    pub const FILE_NAME: &'static str = "query-cache.redb";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ttl: Duration::from_secs(24 * 3600),
            max_entry_bytes: 128 * 1024 * 1024,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_max_entry_bytes(mut self, bytes: usize) -> Self {
        self.max_entry_bytes = bytes;
        self
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.join(Self::FILE_NAME)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ttl.is_zero() {
            return Err(NemError::Configuration("disk cache ttl must be > 0".into()));
        }
        if self.max_entry_bytes == 0 {
            return Err(NemError::Configuration(
                "disk cache max_entry_bytes must be > 0".into(),
            ));
        }
        Ok(())
    }
}
