use anyhow::Context;
use chrono::TimeDelta;
use nem_core::{
    CacheConfig, DataType, DatasetProfile, DiskCacheConfig, EngineConfig, PoolConfig,
    ResolutionConfig, RetryPolicy,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Contents of `nem.toml`. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NemConfig {
    pub data: DataSection,
    pub resolution: ResolutionSection,
    pub cache: CacheSection,
    pub disk_cache: DiskCacheSection,
    pub pool: PoolSection,
    pub retry: RetrySection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataSection {
    /// Directory of `<table>.csv` files.
    pub dir: PathBuf,
    /// `DUID,FUEL,REGION` file; defaults to `<dir>/units.csv` if present.
    pub units_file: Option<PathBuf>,
    /// How long a CLI caller waits on another caller's identical query.
    pub request_timeout_secs: u64,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./data"),
            units_file: None,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ProfileSection {
    pub entity_count: u64,
    pub bytes_per_row: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResolutionSection {
    pub fine_range_threshold_days: i64,
    pub recent_window_hours: i64,
    pub memory_cap_mb: u64,
    /// Overrides keyed by data type tag (`generation`, `price`, `transmission`).
    pub profiles: BTreeMap<String, ProfileSection>,
}

impl Default for ResolutionSection {
    fn default() -> Self {
        Self {
            fine_range_threshold_days: 14,
            recent_window_hours: 24,
            memory_cap_mb: 512,
            profiles: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheSection {
    pub enabled: bool,
    pub max_mb: usize,
    pub max_entry_mb: usize,
    pub ttl_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            enabled: true,
            max_mb: 256,
            max_entry_mb: 64,
            ttl_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiskCacheSection {
    pub enabled: bool,
    pub dir: PathBuf,
    pub ttl_hours: u64,
    pub max_entry_mb: usize,
}

impl Default for DiskCacheSection {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: PathBuf::from("./cache"),
            ttl_hours: 24,
            max_entry_mb: 128,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PoolSection {
    pub size: usize,
    pub checkout_timeout_ms: u64,
}

impl Default for PoolSection {
    fn default() -> Self {
        Self {
            size: 4,
            checkout_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrySection {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
    pub jitter: f64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 50,
            max_backoff_ms: 2_000,
            multiplier: 2.0,
            jitter: 0.5,
        }
    }
}

const MIB: u64 = 1024 * 1024;

impl NemConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    /// Defaults when the file is absent; a file that exists but does not
    /// parse is still an error.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!("{} not found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn with_data_dir(mut self, dir: Option<PathBuf>) -> Self {
        if let Some(dir) = dir {
            self.data.dir = dir;
        }
        self
    }

    pub fn to_engine_config(&self) -> anyhow::Result<EngineConfig> {
        let mut resolution = ResolutionConfig::default()
            .with_fine_range_threshold(TimeDelta::days(self.resolution.fine_range_threshold_days))
            .with_recent_window(TimeDelta::hours(self.resolution.recent_window_hours))
            .with_memory_cap_bytes(self.resolution.memory_cap_mb.saturating_mul(MIB));
        for (tag, profile) in &self.resolution.profiles {
            let data_type: DataType = tag.parse()?;
            resolution = resolution.with_profile(
                data_type,
                DatasetProfile::new(profile.entity_count, profile.bytes_per_row),
            );
        }

        let mut cache = CacheConfig::default()
            .with_max_bytes(self.cache.max_mb.saturating_mul(MIB as usize))
            .with_max_entry_bytes(self.cache.max_entry_mb.saturating_mul(MIB as usize))
            .with_ttl(Duration::from_secs(self.cache.ttl_secs));
        if !self.cache.enabled {
            cache = cache.disabled();
        }

        let retry = RetryPolicy {
            max_attempts: self.retry.max_attempts,
            initial_backoff: Duration::from_millis(self.retry.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.retry.max_backoff_ms),
            multiplier: self.retry.multiplier,
            jitter: self.retry.jitter,
        };

        let mut engine = EngineConfig::new(&self.data.dir)
            .with_resolution(resolution)
            .with_cache(cache)
            .with_pool(
                PoolConfig::default()
                    .with_size(self.pool.size)
                    .with_checkout_timeout(Duration::from_millis(self.pool.checkout_timeout_ms)),
            )
            .with_retry(retry)
            .with_request_timeout(Duration::from_secs(self.data.request_timeout_secs));

        if let Some(units) = &self.data.units_file {
            engine = engine.with_units_file(units);
        }
        if self.disk_cache.enabled {
            engine = engine.with_disk_cache(
                DiskCacheConfig::new(&self.disk_cache.dir)
                    .with_ttl(Duration::from_secs(self.disk_cache.ttl_hours * 3600))
                    .with_max_entry_bytes(self.disk_cache.max_entry_mb.saturating_mul(MIB as usize)),
            );
        }
        Ok(engine)
    }

    /// Every problem found, empty when the config is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        match self.to_engine_config() {
            Ok(engine) => {
                if let Err(e) = engine.validate() {
                    errors.push(e.to_string());
                }
            }
            Err(e) => errors.push(e.to_string()),
        }
        if !self.data.dir.is_dir() {
            errors.push(format!(
                "data.dir {} is not a directory",
                self.data.dir.display()
            ));
        }
        if let Some(units) = &self.data.units_file {
            if !units.is_file() {
                errors.push(format!("data.units_file {} does not exist", units.display()));
            }
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: NemConfig = toml::from_str(
            r#"
            [data]
            dir = "/srv/nem"

            [cache]
            ttl_secs = 60

            [resolution.profiles.generation]
            entity_count = 600
            bytes_per_row = 72
            "#,
        )
        .unwrap();
        assert_eq!(config.data.dir, PathBuf::from("/srv/nem"));
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.cache.max_mb, 256);
        assert!(!config.disk_cache.enabled);

        let engine = config.to_engine_config().unwrap();
        assert_eq!(engine.cache.ttl, Duration::from_secs(60));
        assert_eq!(
            engine.resolution.profile(DataType::Generation).unwrap().entity_count,
            600
        );
        assert!(engine.disk_cache.is_none());
    }

    #[test]
    fn test_unknown_profile_tag_rejected() {
        let config: NemConfig = toml::from_str(
            r#"
            [resolution.profiles.rooftop]
            entity_count = 1
            bytes_per_row = 1
            "#,
        )
        .unwrap();
        assert!(config.to_engine_config().is_err());
        assert!(!config.validate().is_empty());
    }

    #[test]
    fn test_validate_reports_bad_values() {
        let dir = TempDir::new().unwrap();
        let mut config = NemConfig::default().with_data_dir(Some(dir.path().to_path_buf()));
        assert!(config.validate().is_empty(), "{:?}", config.validate());

        config.pool.size = 0;
        config.data.units_file = Some(dir.path().join("missing.csv"));
        let errors = config.validate();
        assert_eq!(errors.len(), 2, "{errors:?}");
    }

    #[test]
    fn test_round_trips_through_toml() {
        let mut config = NemConfig::default();
        config.disk_cache.enabled = true;
        let text = toml::to_string_pretty(&config).unwrap();
        let back: NemConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = NemConfig::load_or_default(&dir.path().join("nem.toml")).unwrap();
        assert_eq!(config, NemConfig::default());
    }
}
