mod common;

use chrono::TimeDelta;
use common::*;
use nem_core::*;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn disk_tier_survives_restart() {
    let data = TempDir::new().unwrap();
    let cache_dir = TempDir::new().unwrap();
    let end = ts(2024, 6, 1, 0, 0);
    write_scada(data.path(), end);
    let request = DataRequest::new(DataType::Generation, end - TimeDelta::hours(2), end);

    let first = {
        let manager = QueryManager::open(
            config(data.path()).with_disk_cache(DiskCacheConfig::new(cache_dir.path())),
        )
        .unwrap();
        let output = manager.query(&request).unwrap();
        assert_eq!(output.metadata.cache_status, CacheStatus::Miss);
        manager.shutdown().unwrap();
        output
    };

    // Remove the source so a hit can only come from disk.
    std::fs::remove_file(data.path().join("scada_5min.csv")).unwrap();

    let manager = QueryManager::open(
        config(data.path()).with_disk_cache(DiskCacheConfig::new(cache_dir.path())),
    )
    .unwrap();
    let second = manager.query(&request).unwrap();
    assert_eq!(second.metadata.cache_status, CacheStatus::DiskHit);
    assert_eq!(second.result.records, first.result.records);
    assert_eq!(manager.executions(), 0);

    let disk = manager.stats().unwrap().disk.unwrap();
    assert_eq!(disk.entries, 1);

    assert_eq!(manager.clear().unwrap(), 2);
    assert!(manager.query(&request).is_err());
}

#[test]
fn expired_disk_entries_are_not_served() {
    let data = TempDir::new().unwrap();
    let cache_dir = TempDir::new().unwrap();
    let end = ts(2024, 6, 1, 0, 0);
    write_scada(data.path(), end);
    let request = DataRequest::new(DataType::Generation, end - TimeDelta::hours(1), end);

    let make_config = || {
        config(data.path())
            .with_cache(CacheConfig::default().with_ttl(Duration::from_millis(20)))
            .with_disk_cache(
                DiskCacheConfig::new(cache_dir.path()).with_ttl(Duration::from_millis(20)),
            )
    };

    let manager = QueryManager::open(make_config()).unwrap();
    manager.query(&request).unwrap();
    std::thread::sleep(Duration::from_millis(60));

    let again = manager.query(&request).unwrap();
    assert_eq!(again.metadata.cache_status, CacheStatus::Miss);
    assert_eq!(manager.executions(), 2);
    assert!(manager.stats().unwrap().memory.expirations >= 1);
}

#[test]
fn promoted_entries_keep_disk_expiry() {
    let data = TempDir::new().unwrap();
    let cache_dir = TempDir::new().unwrap();
    let end = ts(2024, 6, 1, 0, 0);
    write_scada(data.path(), end);
    let request = DataRequest::new(DataType::Generation, end - TimeDelta::hours(1), end);

    let make_config = || {
        config(data.path())
            .with_cache(CacheConfig::default().with_ttl(Duration::from_secs(30)))
            .with_disk_cache(
                DiskCacheConfig::new(cache_dir.path()).with_ttl(Duration::from_millis(800)),
            )
    };

    {
        let manager = QueryManager::open(make_config()).unwrap();
        manager.query(&request).unwrap();
    }

    let manager = QueryManager::open(make_config()).unwrap();
    let promoted = manager.query(&request).unwrap();
    assert_eq!(promoted.metadata.cache_status, CacheStatus::DiskHit);

    // Past the disk TTL, well within the memory TTL.
    std::thread::sleep(Duration::from_millis(1_000));
    let again = manager.query(&request).unwrap();
    assert_eq!(again.metadata.cache_status, CacheStatus::Miss);
    assert_eq!(manager.executions(), 1);
}
