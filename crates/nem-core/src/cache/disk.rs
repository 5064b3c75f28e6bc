use crate::cache::config::DiskCacheConfig;
use crate::cache::key::CacheKey;
use crate::error::{NemError, Result};
use crate::types::{DataType, Resolution, ResultSet};
use chrono::Utc;
use redb::{Database, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// Headers are small and read on every lookup; payloads only on a fresh hit.
const HEADERS: TableDefinition<&str, &[u8]> = TableDefinition::new("entry_headers");
const PAYLOADS: TableDefinition<&str, &[u8]> = TableDefinition::new("entry_payloads");
const META: TableDefinition<&str, &[u8]> = TableDefinition::new("meta");

pub const DISK_SCHEMA_VERSION: u32 = 1;
const SCHEMA_VERSION_KEY: &str = "schema_version";

/// Per-entry metadata, enough to judge staleness without the payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntryHeader {
    pub created_at_ms: i64,
    pub expires_at_ms: i64,
    pub payload_bytes: u64,
    pub data_type: DataType,
    pub resolution: Resolution,
    pub rows: u64,
}

impl EntryHeader {
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at_ms
    }

    /// Time left before expiry, zero once expired.
    pub fn remaining_at(&self, now_ms: i64) -> Duration {
        let left = self.expires_at_ms.saturating_sub(now_ms).max(0);
        Duration::from_millis(left as u64)
    }
}

/// A fresh disk entry: its header and the decoded result.
#[derive(Debug, Clone)]
pub struct DiskEntry {
    pub header: EntryHeader,
    pub value: ResultSet,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiskCacheStats {
    pub entries: u64,
    pub expired: u64,
    pub payload_bytes: u64,
    pub file_bytes: u64,
}

/// Persistent cache tier backed by a single redb file.
pub struct DiskCache {
    db: Database,
    path: PathBuf,
    config: DiskCacheConfig,
}

impl DiskCache {
    pub fn open(config: DiskCacheConfig) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.dir).map_err(|e| {
            NemError::Configuration(format!(
                "cannot create disk cache directory {:?}: {}",
                config.dir, e
            ))
        })?;

        let path = config.db_path();
        let is_new = !path.exists();
        let db = Database::create(&path)?;

        if !is_new {
            Self::check_schema_version(&db)?;
        }

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(HEADERS)?;
            let _ = write_txn.open_table(PAYLOADS)?;
            let mut meta = write_txn.open_table(META)?;
            if is_new {
                meta.insert(SCHEMA_VERSION_KEY, DISK_SCHEMA_VERSION.to_string().as_bytes())?;
            }
        }
        write_txn.commit()?;

        log::info!("disk cache opened at {:?}", path);
        Ok(Self { db, path, config })
    }

    fn check_schema_version(db: &Database) -> Result<()> {
        let read_txn = db.begin_read()?;
        let version = read_txn
            .open_table(META)
            .ok()
            .and_then(|t| {
                t.get(SCHEMA_VERSION_KEY).ok().flatten().and_then(|v| {
                    std::str::from_utf8(v.value())
                        .ok()
                        .and_then(|s| s.parse::<u32>().ok())
                })
            })
            .unwrap_or(DISK_SCHEMA_VERSION);

        if version != DISK_SCHEMA_VERSION {
            return Err(NemError::Configuration(format!(
                "disk cache schema v{} does not match v{}; clear the cache directory",
                version, DISK_SCHEMA_VERSION
            )));
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &DiskCacheConfig {
        &self.config
    }

    pub fn header(&self, key: &CacheKey) -> Result<Option<EntryHeader>> {
        let read_txn = self.db.begin_read()?;
        let headers = read_txn.open_table(HEADERS)?;
        let header = match headers.get(key.as_str())? {
            Some(bytes) => Some(bincode::deserialize::<EntryHeader>(bytes.value())?),
            None => None,
        };
        Ok(header)
    }

    /// Fresh entry for `key`, removing it if stale.
    pub fn get(&self, key: &CacheKey) -> Result<Option<DiskEntry>> {
        let now_ms = Utc::now().timestamp_millis();

        let stale = {
            let read_txn = self.db.begin_read()?;
            let headers = read_txn.open_table(HEADERS)?;
            let header = match headers.get(key.as_str())? {
                Some(bytes) => bincode::deserialize::<EntryHeader>(bytes.value())?,
                None => return Ok(None),
            };

            if !header.is_expired_at(now_ms) {
                let payloads = read_txn.open_table(PAYLOADS)?;
                return match payloads.get(key.as_str())? {
                    Some(bytes) => Ok(Some(DiskEntry {
                        value: bincode::deserialize::<ResultSet>(bytes.value())?,
                        header,
                    })),
                    None => Ok(None),
                };
            }
            true
        };

        if stale {
            self.remove(key)?;
            log::debug!("disk cache EXPIRED {}", key.short());
        }
        Ok(None)
    }

    /// Persist a result. Returns false if the payload exceeds the per-entry cap.
    pub fn put(&self, key: &CacheKey, value: &ResultSet) -> Result<bool> {
        let payload = bincode::serialize(value)?;
        if payload.len() > self.config.max_entry_bytes {
            log::debug!(
                "disk cache REJECT {} ({} bytes)",
                key.short(),
                payload.len()
            );
            return Ok(false);
        }

        let now_ms = Utc::now().timestamp_millis();
        let header = EntryHeader {
            created_at_ms: now_ms,
            expires_at_ms: now_ms.saturating_add(self.config.ttl.as_millis() as i64),
            payload_bytes: payload.len() as u64,
            data_type: value.data_type,
            resolution: value.resolution,
            rows: value.len() as u64,
        };
        let header_bytes = bincode::serialize(&header)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut headers = write_txn.open_table(HEADERS)?;
            headers.insert(key.as_str(), header_bytes.as_slice())?;
            let mut payloads = write_txn.open_table(PAYLOADS)?;
            payloads.insert(key.as_str(), payload.as_slice())?;
        }
        write_txn.commit()?;
        Ok(true)
    }

    pub fn remove(&self, key: &CacheKey) -> Result<bool> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut headers = write_txn.open_table(HEADERS)?;
            let mut payloads = write_txn.open_table(PAYLOADS)?;
            let had_header = headers.remove(key.as_str())?.is_some();
            payloads.remove(key.as_str())?;
            had_header
        };
        write_txn.commit()?;
        Ok(removed)
    }

    /// Remove every entry whose header matches `predicate`.
    fn remove_where<F>(&self, predicate: F) -> Result<usize>
    where
        F: Fn(&EntryHeader) -> bool,
    {
        let doomed: Vec<String> = {
            let read_txn = self.db.begin_read()?;
            let headers = read_txn.open_table(HEADERS)?;
            let mut keys = Vec::new();
            for item in headers.iter()? {
                let (key, value) = item?;
                let header: EntryHeader = bincode::deserialize(value.value())?;
                if predicate(&header) {
                    keys.push(key.value().to_string());
                }
            }
            keys
        };

        if doomed.is_empty() {
            return Ok(0);
        }

        let write_txn = self.db.begin_write()?;
        {
            let mut headers = write_txn.open_table(HEADERS)?;
            let mut payloads = write_txn.open_table(PAYLOADS)?;
            for key in &doomed {
                headers.remove(key.as_str())?;
                payloads.remove(key.as_str())?;
            }
        }
        write_txn.commit()?;
        Ok(doomed.len())
    }

    pub fn purge_expired(&self) -> Result<usize> {
        let now_ms = Utc::now().timestamp_millis();
        self.remove_where(|h| h.is_expired_at(now_ms))
    }

    pub fn invalidate_data_type(&self, data_type: DataType) -> Result<usize> {
        self.remove_where(|h| h.data_type == data_type)
    }

    pub fn clear(&self) -> Result<usize> {
        self.remove_where(|_| true)
    }

    pub fn stats(&self) -> Result<DiskCacheStats> {
        let now_ms = Utc::now().timestamp_millis();
        let read_txn = self.db.begin_read()?;
        let headers = read_txn.open_table(HEADERS)?;

        let mut stats = DiskCacheStats {
            entries: headers.len()?,
            ..Default::default()
        };
        for item in headers.iter()? {
            let (_, value) = item?;
            let header: EntryHeader = bincode::deserialize(value.value())?;
            stats.payload_bytes += header.payload_bytes;
            if header.is_expired_at(now_ms) {
                stats.expired += 1;
            }
        }
        stats.file_bytes = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Record;
    use chrono::NaiveDate;
    use std::time::Duration;
    use tempfile::TempDir;

    fn sample(data_type: DataType) -> ResultSet {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 30, 0)
            .unwrap();
        ResultSet::new(
            data_type,
            Resolution::Coarse,
            vec![Record::new(ts, "NSW1", 91.5), Record::new(ts, "VIC1", 64.2)],
        )
    }

    fn open(dir: &TempDir, ttl: Duration) -> DiskCache {
        DiskCache::open(DiskCacheConfig::new(dir.path()).with_ttl(ttl)).unwrap()
    }

    #[test]
    fn test_put_get_roundtrip_and_header() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir, Duration::from_secs(60));
        let key = CacheKey::from_bytes(b"prices");

        assert!(cache.put(&key, &sample(DataType::Price)).unwrap());
        let entry = cache.get(&key).unwrap().unwrap();
        assert_eq!(entry.value, sample(DataType::Price));
        assert_eq!(entry.header.rows, entry.value.len() as u64);

        let header = cache.header(&key).unwrap().unwrap();
        assert_eq!(header.rows, 2);
        assert_eq!(header.data_type, DataType::Price);
        assert!(header.expires_at_ms > header.created_at_ms);
    }

    #[test]
    fn test_remaining_time_from_header() {
        let header = EntryHeader {
            created_at_ms: 1_000,
            expires_at_ms: 5_000,
            payload_bytes: 10,
            data_type: DataType::Price,
            resolution: Resolution::Fine,
            rows: 1,
        };
        assert_eq!(header.remaining_at(2_000), Duration::from_secs(3));
        assert_eq!(header.remaining_at(9_000), Duration::ZERO);
        assert!(header.is_expired_at(5_000));
    }

    #[test]
    fn test_entries_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let key = CacheKey::from_bytes(b"persist");
        {
            let cache = open(&dir, Duration::from_secs(60));
            cache.put(&key, &sample(DataType::Price)).unwrap();
        }
        let cache = open(&dir, Duration::from_secs(60));
        assert!(cache.get(&key).unwrap().is_some());
    }

    #[test]
    fn test_expired_entry_removed_on_read() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir, Duration::from_millis(20));
        let key = CacheKey::from_bytes(b"short");
        cache.put(&key, &sample(DataType::Price)).unwrap();

        std::thread::sleep(Duration::from_millis(60));
        assert!(cache.get(&key).unwrap().is_none());
        assert!(cache.header(&key).unwrap().is_none());
    }

    #[test]
    fn test_purge_invalidate_and_clear() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir, Duration::from_secs(60));
        cache.put(&CacheKey::from_bytes(b"p"), &sample(DataType::Price)).unwrap();
        cache.put(&CacheKey::from_bytes(b"g"), &sample(DataType::Generation)).unwrap();
        cache.put(&CacheKey::from_bytes(b"t"), &sample(DataType::Transmission)).unwrap();

        assert_eq!(cache.purge_expired().unwrap(), 0);
        assert_eq!(cache.invalidate_data_type(DataType::Price).unwrap(), 1);
        assert_eq!(cache.stats().unwrap().entries, 2);
        assert_eq!(cache.clear().unwrap(), 2);
        assert_eq!(cache.stats().unwrap().entries, 0);
    }

    #[test]
    fn test_oversize_payload_not_persisted() {
        let dir = TempDir::new().unwrap();
        let cache = DiskCache::open(DiskCacheConfig::new(dir.path()).with_max_entry_bytes(8)).unwrap();
        let key = CacheKey::from_bytes(b"big");
        assert!(!cache.put(&key, &sample(DataType::Price)).unwrap());
        assert!(cache.get(&key).unwrap().is_none());
    }
}
