//! Query execution over the cache tiers.

mod aggregate;
mod config;
mod manager;
mod request;

pub use aggregate::{aggregate, bucket_start, filter_entities, TOTAL_LABEL};
pub use config::EngineConfig;
pub use manager::{CacheStatus, EngineStats, QueryManager, QueryMetadata, QueryOutput};
pub use request::{Aggregation, Bucket, DataRequest, GroupBy, QueryParams};
