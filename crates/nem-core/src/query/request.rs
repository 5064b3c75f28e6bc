use crate::cache::CacheKey;
use crate::error::{NemError, Result};
use crate::resolution::ResolutionDecision;
use crate::time::DateLike;
use crate::types::{DataType, Resolution};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How raw entities are combined.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    /// Keep each DUID / region / interconnector separate.
    #[default]
    Entity,
    /// Generation only: group DUIDs by fuel via the unit registry.
    Fuel,
    /// Generation: DUID region from the registry. Price: the region itself.
    Region,
    /// Collapse everything into one series labelled `Total`.
    Total,
}

/// Time bucketing applied after grouping.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    /// Interval timestamps as stored.
    #[default]
    Native,
    Hourly,
    Daily,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    #[default]
    Sum,
    Mean,
    Min,
    Max,
}

impl GroupBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupBy::Entity => "entity",
            GroupBy::Fuel => "fuel",
            GroupBy::Region => "region",
            GroupBy::Total => "total",
        }
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupBy {
    type Err = NemError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "entity" | "duid" | "none" => Ok(GroupBy::Entity),
            "fuel" | "fuel_type" => Ok(GroupBy::Fuel),
            "region" => Ok(GroupBy::Region),
            "total" | "all" => Ok(GroupBy::Total),
            other => Err(NemError::Configuration(format!("unknown group-by '{}'", other))),
        }
    }
}

impl Bucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Native => "native",
            Bucket::Hourly => "hourly",
            Bucket::Daily => "daily",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Bucket {
    type Err = NemError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "native" | "interval" | "raw" => Ok(Bucket::Native),
            "hourly" | "hour" | "1h" => Ok(Bucket::Hourly),
            "daily" | "day" | "1d" => Ok(Bucket::Daily),
            other => Err(NemError::Configuration(format!("unknown bucket '{}'", other))),
        }
    }
}

impl Aggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::Sum => "sum",
            Aggregation::Mean => "mean",
            Aggregation::Min => "min",
            Aggregation::Max => "max",
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Aggregation {
    type Err = NemError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sum" | "total" => Ok(Aggregation::Sum),
            "mean" | "avg" | "average" => Ok(Aggregation::Mean),
            "min" => Ok(Aggregation::Min),
            "max" => Ok(Aggregation::Max),
            other => Err(NemError::Configuration(format!("unknown aggregation '{}'", other))),
        }
    }
}

/// A caller's query, before normalisation.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRequest {
    pub data_type: DataType,
    pub start: DateLike,
    pub end: DateLike,
    pub resolution: Option<Resolution>,
    /// Raw entity ids to keep; empty keeps all.
    pub entities: Vec<String>,
    pub group_by: GroupBy,
    pub bucket: Bucket,
    pub aggregation: Aggregation,
}

impl DataRequest {
    pub fn new(data_type: DataType, start: impl Into<DateLike>, end: impl Into<DateLike>) -> Self {
        Self {
            data_type,
            start: start.into(),
            end: end.into(),
            resolution: None,
            entities: Vec::new(),
            group_by: GroupBy::default(),
            bucket: Bucket::default(),
            aggregation: Aggregation::default(),
        }
    }

    /// Same as `new`, with the data type given as a tag string.
    pub fn for_tag(tag: &str, start: impl Into<DateLike>, end: impl Into<DateLike>) -> Result<Self> {
        Ok(Self::new(tag.parse()?, start, end))
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = Some(resolution);
        self
    }

    pub fn with_entities<I, S>(mut self, entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entities = entities.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_group_by(mut self, group_by: GroupBy) -> Self {
        self.group_by = group_by;
        self
    }

    pub fn with_bucket(mut self, bucket: Bucket) -> Self {
        self.bucket = bucket;
        self
    }

    pub fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    pub(crate) fn check_grouping(&self) -> Result<()> {
        let ok = match self.group_by {
            GroupBy::Entity | GroupBy::Total => true,
            GroupBy::Fuel => self.data_type == DataType::Generation,
            GroupBy::Region => matches!(self.data_type, DataType::Generation | DataType::Price),
        };
        if ok {
            Ok(())
        } else {
            Err(NemError::Configuration(format!(
                "group-by {} is not available for {}",
                self.group_by, self.data_type
            )))
        }
    }
}

/// Normalised, resolved query parameters. This is what gets hashed into the
/// cache key, so field order is part of the key format.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Hash)]
pub struct QueryParams {
    pub data_type: DataType,
    pub resolution: Resolution,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Sorted and de-duplicated.
    pub entities: Vec<String>,
    pub group_by: GroupBy,
    pub bucket: Bucket,
    pub aggregation: Aggregation,
}

impl QueryParams {
    pub fn new(request: &DataRequest, decision: &ResolutionDecision) -> Self {
        let mut entities: Vec<String> = request
            .entities
            .iter()
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect();
        entities.sort();
        entities.dedup();

        Self {
            data_type: decision.data_type,
            resolution: decision.resolution,
            start: decision.range.start(),
            end: decision.range.end(),
            entities,
            group_by: request.group_by,
            bucket: request.bucket,
            aggregation: request.aggregation,
        }
    }

    pub fn cache_key(&self) -> Result<CacheKey> {
        CacheKey::from_params(self).map_err(|e| NemError::QueryExecution {
            params: self.to_string(),
            reason: format!("cannot serialise parameters: {}", e),
        })
    }
}

impl fmt::Display for QueryParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{} .. {}] @{} group_by={} bucket={} agg={}",
            self.data_type,
            self.start,
            self.end,
            self.resolution,
            self.group_by,
            self.bucket,
            self.aggregation
        )?;
        if !self.entities.is_empty() {
            write!(f, " entities={}", self.entities.join(","))?;
        }
        Ok(())
    }
}
