use crate::adapters::{
    adapter_for, renewable_penetration, PenetrationPoint, UnitRegistry,
};
use crate::cache::{
    CacheKey, CacheStats, DiskCache, DiskCacheStats, MemoryCache, Role, SingleFlight,
};
use crate::error::{NemError, Result};
use crate::query::aggregate::{aggregate, filter_entities};
use crate::query::config::EngineConfig;
use crate::query::request::{Aggregation, Bucket, DataRequest, GroupBy, QueryParams};
use crate::resolution::{DecisionReason, ResolutionDecision, ResolutionManager};
use crate::retry::RetryPolicy;
use crate::store::{ConnectionManager, ConnectionPool, CsvStore, PoolStatus};
use crate::time::{DateLike, TimeRange};
use crate::types::{DataType, Resolution, ResultSet};
use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Where a result came from.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    MemoryHit,
    DiskHit,
    /// Another caller was already computing this key; its result was shared.
    Coalesced,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::MemoryHit => "memory_hit",
            CacheStatus::DiskHit => "disk_hit",
            CacheStatus::Coalesced => "coalesced",
            CacheStatus::Miss => "miss",
        }
    }

    pub fn is_hit(&self) -> bool {
        !matches!(self, CacheStatus::Miss)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryMetadata {
    pub params: QueryParams,
    pub key: CacheKey,
    pub resolution: Resolution,
    pub reason: DecisionReason,
    pub cache_status: CacheStatus,
    /// Resolution manager's estimate for the chosen resolution.
    pub estimated_bytes: u64,
    pub rows: usize,
    pub elapsed: Duration,
}

/// A result plus how it was produced. The result set is shared, so repeated
/// hits hand out the same allocation.
#[derive(Debug, Clone)]
pub struct QueryOutput {
    pub result: Arc<ResultSet>,
    pub metadata: QueryMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub memory: CacheStats,
    pub disk: Option<DiskCacheStats>,
    pub pool: PoolStatus,
    /// Store scans actually issued (cache misses that executed).
    pub executions: u64,
    pub in_flight: usize,
}

/// Entry point for dashboard queries: resolution choice, cache tiers,
/// single-flight execution and store access behind one handle.
///
/// Construct once and share through an `Arc`.
///
/// # Example
/// ```rust,no_run
/// use nem_core::{DataRequest, DataType, EngineConfig, QueryManager};
///
/// let manager = QueryManager::open(EngineConfig::new("./data")).unwrap();
/// let request = DataRequest::new(DataType::Price, "2024-01-01", "2024-01-08");
/// let output = manager.query(&request).unwrap();
/// println!("{} rows at {}", output.result.len(), output.metadata.resolution);
/// ```
pub struct QueryManager {
    resolution: ResolutionManager,
    memory: MemoryCache,
    disk: Option<DiskCache>,
    flights: SingleFlight,
    pool: ConnectionPool,
    units: Arc<UnitRegistry>,
    retry: RetryPolicy,
    request_timeout: Duration,
    executions: AtomicU64,
}

impl QueryManager {
    /// Open a manager over the CSV store in `config.data_dir`.
    pub fn open(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let units = match config.resolved_units_file() {
            Some(path) => UnitRegistry::from_csv(path)?,
            None => {
                log::info!("no units file; fuel and region grouping will report Unknown");
                UnitRegistry::new()
            }
        };
        let store = CsvStore::new(&config.data_dir);
        Self::with_store(config, store, units)
    }

    /// Build a manager over any store. `config.data_dir` and
    /// `config.units_file` are ignored.
    pub fn with_store(
        config: EngineConfig,
        store: impl ConnectionManager + 'static,
        units: UnitRegistry,
    ) -> Result<Self> {
        config.validate()?;
        let resolution = ResolutionManager::new(config.resolution)?;
        let disk = match config.disk_cache {
            Some(disk_config) => Some(DiskCache::open(disk_config)?),
            None => None,
        };
        let pool = ConnectionPool::new(store, config.pool)?;

        log::info!(
            "query manager ready (memory budget {} bytes, ttl {:?}, disk tier {})",
            config.cache.max_bytes,
            config.cache.ttl,
            disk.as_ref()
                .map(|d| d.path().display().to_string())
                .unwrap_or_else(|| "off".to_string())
        );

        Ok(Self {
            resolution,
            memory: MemoryCache::new(config.cache),
            disk,
            flights: SingleFlight::new(),
            pool,
            units: Arc::new(units),
            retry: config.retry,
            request_timeout: config.request_timeout,
            executions: AtomicU64::new(0),
        })
    }

    pub fn resolution_manager(&self) -> &ResolutionManager {
        &self.resolution
    }

    pub fn units(&self) -> &UnitRegistry {
        &self.units
    }

    /// Resolution decision without running anything.
    pub fn resolve(
        &self,
        start: impl Into<DateLike>,
        end: impl Into<DateLike>,
        data_type: &str,
        user_override: Option<Resolution>,
    ) -> Result<ResolutionDecision> {
        self.resolution.resolve(start, end, data_type, user_override)
    }

    fn plan(&self, request: &DataRequest) -> Result<(ResolutionDecision, QueryParams, CacheKey)> {
        request.check_grouping()?;
        let range = TimeRange::new(request.start.clone(), request.end.clone())?;
        let decision = self.resolution.decide(request.data_type, &range, request.resolution)?;
        let params = QueryParams::new(request, &decision);
        let key = params.cache_key()?;
        Ok((decision, params, key))
    }

    /// Run a request through memory, disk, then the store.
    pub fn query(&self, request: &DataRequest) -> Result<QueryOutput> {
        let started = Instant::now();
        let (decision, params, key) = self.plan(request)?;
        let finish = |result: Arc<ResultSet>, status: CacheStatus| {
            log::debug!("{} {} ({} rows)", status.as_str(), key.short(), result.len());
            QueryOutput {
                metadata: QueryMetadata {
                    params: params.clone(),
                    key: key.clone(),
                    resolution: decision.resolution,
                    reason: decision.reason,
                    cache_status: status,
                    estimated_bytes: decision.estimated_bytes,
                    rows: result.len(),
                    elapsed: started.elapsed(),
                },
                result,
            }
        };

        if let Some(hit) = self.memory.get(&key) {
            return Ok(finish(hit, CacheStatus::MemoryHit));
        }
        if let Some((hit, deadline)) = self.disk_get(&key) {
            // Promoted entries keep the disk expiry.
            self.memory.insert_until(key.clone(), hit.clone(), deadline);
            return Ok(finish(hit, CacheStatus::DiskHit));
        }

        match self.flights.join(&key) {
            Role::Leader(guard) => {
                // A previous leader may have stored this key between our
                // miss and the join.
                if let Some(hit) = self.memory.peek_fresh(&key) {
                    guard.complete(Some(hit.clone()));
                    return Ok(finish(hit, CacheStatus::MemoryHit));
                }
                // On error the guard drops and waiters run the query themselves.
                let result = self.execute_and_store(&params, &key)?;
                guard.complete(Some(result.clone()));
                Ok(finish(result, CacheStatus::Miss))
            }
            Role::Follower(flight) => match flight.wait(self.request_timeout) {
                Some(shared) => Ok(finish(shared, CacheStatus::Coalesced)),
                None => {
                    log::debug!("in-flight leader for {} gave no result; executing", key.short());
                    let result = self.execute_and_store(&params, &key)?;
                    Ok(finish(result, CacheStatus::Miss))
                }
            },
        }
    }

    /// Fresh disk entry and the instant it stops being fresh.
    fn disk_get(&self, key: &CacheKey) -> Option<(Arc<ResultSet>, Option<Instant>)> {
        let disk = self.disk.as_ref()?;
        match disk.get(key) {
            Ok(hit) => hit.map(|entry| {
                let remaining = entry.header.remaining_at(Utc::now().timestamp_millis());
                (Arc::new(entry.value), Instant::now().checked_add(remaining))
            }),
            Err(e) => {
                log::warn!("disk cache read failed for {}: {}", key.short(), e);
                None
            }
        }
    }

    fn execute_and_store(&self, params: &QueryParams, key: &CacheKey) -> Result<Arc<ResultSet>> {
        let result = Arc::new(self.execute(params)?);
        if !self.memory.insert(key.clone(), result.clone()) {
            log::debug!("result for {} not kept in memory", key.short());
        }
        if let Some(disk) = &self.disk {
            if let Err(e) = disk.put(key, &result) {
                log::warn!("disk cache write failed for {}: {}", key.short(), e);
            }
        }
        Ok(result)
    }

    fn execute(&self, params: &QueryParams) -> Result<ResultSet> {
        self.executions.fetch_add(1, Ordering::Relaxed);
        let adapter = adapter_for(params.data_type);
        let table = adapter.table(params.resolution);
        let range = TimeRange::from_market(params.start, params.end)?;

        let frame = self
            .retry
            .run(table, |_| {
                let mut conn = self.pool.get()?;
                match conn.scan(table, adapter.time_column(), &range) {
                    Ok(frame) => Ok(frame),
                    Err(e) => {
                        if e.is_transient() {
                            conn.mark_broken();
                        }
                        Err(e)
                    }
                }
            })
            .map_err(|e| wrap_execution_error(e, params))?;

        let records = filter_entities(adapter.normalise(&frame)?, &params.entities);
        let records = if params.group_by == GroupBy::Entity && params.bucket == Bucket::Native {
            records
        } else {
            aggregate(
                &records,
                params.data_type,
                params.group_by,
                params.bucket,
                params.aggregation,
                &self.units,
            )
        };

        Ok(ResultSet::new(params.data_type, params.resolution, records))
    }

    /// Renewable share per interval of generation over a range, at whatever
    /// resolution the range warrants.
    pub fn renewable_penetration(
        &self,
        start: impl Into<DateLike>,
        end: impl Into<DateLike>,
    ) -> Result<Vec<PenetrationPoint>> {
        let request = DataRequest::new(DataType::Generation, start, end)
            .with_group_by(GroupBy::Fuel)
            .with_aggregation(Aggregation::Sum);
        let output = self.query(&request)?;
        Ok(renewable_penetration(&output.result.records))
    }

    /// Drop the cached result for one request from both tiers.
    pub fn invalidate(&self, request: &DataRequest) -> Result<bool> {
        let (_, _, key) = self.plan(request)?;
        let in_memory = self.memory.invalidate(&key);
        let on_disk = match &self.disk {
            Some(disk) => disk.remove(&key)?,
            None => false,
        };
        Ok(in_memory || on_disk)
    }

    /// Drop every cached result for a data type, e.g. after new files land.
    pub fn invalidate_data_type(&self, data_type: DataType) -> Result<usize> {
        let mut removed = self.memory.invalidate_data_type(data_type);
        if let Some(disk) = &self.disk {
            removed += disk.invalidate_data_type(data_type)?;
        }
        log::info!("invalidated {} cached results for {}", removed, data_type);
        Ok(removed)
    }

    pub fn clear(&self) -> Result<usize> {
        let mut removed = self.memory.clear();
        if let Some(disk) = &self.disk {
            removed += disk.clear()?;
        }
        log::info!("cleared {} cached results", removed);
        Ok(removed)
    }

    pub fn purge_expired(&self) -> Result<usize> {
        let mut removed = self.memory.purge_expired();
        if let Some(disk) = &self.disk {
            removed += disk.purge_expired()?;
        }
        Ok(removed)
    }

    pub fn executions(&self) -> u64 {
        self.executions.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> Result<EngineStats> {
        let disk = match &self.disk {
            Some(disk) => Some(disk.stats()?),
            None => None,
        };
        Ok(EngineStats {
            memory: self.memory.stats(),
            disk,
            pool: self.pool.status(),
            executions: self.executions(),
            in_flight: self.flights.in_flight(),
        })
    }

    /// Purge stale disk entries, log final counters and close the pool.
    pub fn shutdown(&self) -> Result<()> {
        if let Some(disk) = &self.disk {
            let purged = disk.purge_expired()?;
            if purged > 0 {
                log::info!("purged {} expired disk cache entries", purged);
            }
        }
        let stats = self.memory.stats();
        log::info!(
            "query manager shutting down: {} hits, {} misses ({:.1}% hit rate), {} executions",
            stats.hits,
            stats.misses,
            stats.hit_rate() * 100.0,
            self.executions()
        );
        self.pool.close();
        Ok(())
    }
}

/// Store and I/O failures carry the query that hit them; errors that are the
/// caller's or the data's fault pass through unchanged.
fn wrap_execution_error(error: NemError, params: &QueryParams) -> NemError {
    match error {
        NemError::Schema { .. }
        | NemError::Configuration(_)
        | NemError::TypeMismatch { .. }
        | NemError::InvalidRange { .. }
        | NemError::QueryExecution { .. } => error,
        other => NemError::QueryExecution {
            params: params.to_string(),
            reason: other.to_string(),
        },
    }
}
