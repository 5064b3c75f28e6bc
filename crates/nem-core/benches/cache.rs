use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use nem_core::cache::{CacheConfig, CacheKey, DiskCache, DiskCacheConfig, MemoryCache};
use nem_core::*;
use std::sync::Arc;
use tempfile::TempDir;

fn base() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn scada_frame(units: usize, intervals: i32) -> Frame {
    let mut rows = Vec::new();
    for i in 1..=intervals {
        let ts = (base() + TimeDelta::minutes(5) * i)
            .format("%Y/%m/%d %H:%M:%S")
            .to_string();
        for u in 0..units {
            rows.push(vec![ts.clone(), format!("UNIT{:03}", u), format!("{}.5", u * 10)]);
        }
    }
    Frame::from_rows("scada_5min", &["SETTLEMENTDATE", "DUID", "SCADAVALUE"], rows).unwrap()
}

fn result_set(rows: usize) -> Arc<ResultSet> {
    let records = (0..rows)
        .map(|i| Record::new(base() + TimeDelta::minutes(5 * i as i64), format!("UNIT{}", i % 50), i as f64))
        .collect();
    Arc::new(ResultSet::new(DataType::Generation, Resolution::Fine, records))
}

fn bench_memory_hit(c: &mut Criterion) {
    let cache = MemoryCache::new(CacheConfig::default());
    let key = CacheKey::from_bytes(b"hit");
    cache.insert(key.clone(), result_set(10_000));

    c.bench_function("memory cache hit", |b| {
        b.iter(|| cache.get(&key).unwrap());
    });
}

fn bench_memory_insert_with_eviction(c: &mut Criterion) {
    let value = result_set(1_000);
    let budget = value.estimated_bytes() * 16;
    let cache = MemoryCache::new(
        CacheConfig::default()
            .with_max_bytes(budget)
            .with_max_entry_bytes(budget),
    );
    let mut n = 0u64;

    c.bench_function("memory cache insert under pressure", |b| {
        b.iter(|| {
            n += 1;
            cache.insert(CacheKey::from_bytes(&n.to_le_bytes()), value.clone());
        });
    });
}

fn bench_disk_round_trip(c: &mut Criterion) {
    let temp_dir = TempDir::new().unwrap();
    let disk = DiskCache::open(DiskCacheConfig::new(temp_dir.path())).unwrap();
    let key = CacheKey::from_bytes(b"disk");
    let value = result_set(5_000);
    disk.put(&key, &value).unwrap();

    c.bench_function("disk cache hit (5k rows)", |b| {
        b.iter(|| disk.get(&key).unwrap().unwrap());
    });
}

fn bench_query_paths(c: &mut Criterion) {
    let store = MemoryStore::new();
    store.insert_table(scada_frame(100, 288));
    let request = DataRequest::new(DataType::Generation, base(), base() + TimeDelta::hours(24));

    c.bench_function("query miss (100 units x 1 day)", |b| {
        b.iter_batched(
            || {
                QueryManager::with_store(
                    EngineConfig::new("unused"),
                    store.clone(),
                    UnitRegistry::new(),
                )
                .unwrap()
            },
            |manager| manager.query(&request).unwrap(),
            BatchSize::SmallInput,
        );
    });

    let manager =
        QueryManager::with_store(EngineConfig::new("unused"), store.clone(), UnitRegistry::new())
            .unwrap();
    manager.query(&request).unwrap();
    c.bench_function("query memory hit", |b| {
        b.iter(|| manager.query(&request).unwrap());
    });
}

criterion_group!(
    benches,
    bench_memory_hit,
    bench_memory_insert_with_eviction,
    bench_disk_round_trip,
    bench_query_paths,
);
criterion_main!(benches);
