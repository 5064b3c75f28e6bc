pub mod adapters;
pub mod cache;
pub mod error;
pub mod query;
pub mod resolution;
pub mod retry;
pub mod store;
pub mod time;
pub mod types;

pub use error::{NemError, Result};
pub use types::{DataType, Record, Resolution, ResultSet};
pub use time::{parse_market_timestamp, DateLike, TimeRange, MARKET_UTC_OFFSET_SECS};
pub use resolution::{
    DatasetProfile, DecisionReason, ResolutionConfig, ResolutionDecision, ResolutionManager,
};
pub use cache::{
    CacheConfig, CacheKey, CacheStats, DiskCache, DiskCacheConfig, DiskCacheStats, DiskEntry,
    MemoryCache, SingleFlight,
};
pub use store::{
    Connection, ConnectionManager, ConnectionPool, CsvStore, Frame, MemoryStore, PoolConfig,
    PoolStatus,
};
pub use adapters::{
    adapter_for, renewable_penetration, DatasetAdapter, Fuel, PenetrationPoint, UnitRegistry,
};
pub use query::{
    Aggregation, Bucket, CacheStatus, DataRequest, EngineConfig, EngineStats, GroupBy,
    QueryManager, QueryMetadata, QueryOutput, QueryParams,
};
pub use retry::RetryPolicy;
