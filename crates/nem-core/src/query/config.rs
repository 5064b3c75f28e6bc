use crate::cache::{CacheConfig, DiskCacheConfig};
use crate::error::{NemError, Result};
use crate::resolution::ResolutionConfig;
use crate::retry::RetryPolicy;
use crate::store::PoolConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Everything a [`QueryManager`](crate::QueryManager) needs at startup.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory holding `<table>.csv` files.
    pub data_dir: PathBuf,

    /// `DUID,FUEL,REGION` metadata. Defaults to `<data_dir>/units.csv` when
    /// that file exists.
    pub units_file: Option<PathBuf>,

    pub resolution: ResolutionConfig,
    pub cache: CacheConfig,

    /// Persistent tier; `None` keeps the cache in memory only.
    pub disk_cache: Option<DiskCacheConfig>,

    pub pool: PoolConfig,
    pub retry: RetryPolicy,

    /// Upper bound on waiting for another caller's in-flight query.
    pub request_timeout: Duration,
}

impl EngineConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            units_file: None,
            resolution: ResolutionConfig::default(),
            cache: CacheConfig::default(),
            disk_cache: None,
            pool: PoolConfig::default(),
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_units_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.units_file = Some(path.into());
        self
    }

    pub fn with_resolution(mut self, resolution: ResolutionConfig) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_disk_cache(mut self, disk: DiskCacheConfig) -> Self {
        self.disk_cache = Some(disk);
        self
    }

    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// The units file to load, if any.
    pub fn resolved_units_file(&self) -> Option<PathBuf> {
        match &self.units_file {
            Some(path) => Some(path.clone()),
            None => {
                let default = self.data_dir.join("units.csv");
                default.is_file().then_some(default)
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.resolution.validate()?;
        self.cache.validate()?;
        if let Some(disk) = &self.disk_cache {
            disk.validate()?;
        }
        self.pool.validate()?;
        self.retry.validate()?;
        if self.request_timeout.is_zero() {
            return Err(NemError::Configuration(
                "request_timeout must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(EngineConfig::new("/data/nem").validate().is_ok());
    }

    #[test]
    fn test_nested_errors_surface() {
        let config = EngineConfig::new("/data/nem").with_pool(PoolConfig::default().with_size(0));
        assert!(matches!(config.validate(), Err(NemError::Configuration(_))));

        let config = EngineConfig::new("/data/nem").with_request_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_explicit_units_file_wins() {
        let config = EngineConfig::new("/data/nem").with_units_file("/etc/nem/units.csv");
        assert_eq!(config.resolved_units_file(), Some(PathBuf::from("/etc/nem/units.csv")));
        assert_eq!(EngineConfig::new("/nonexistent").resolved_units_file(), None);
    }
}
