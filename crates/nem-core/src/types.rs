use crate::error::{NemError, Result};
use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Granularity of a time series.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// 5-minute dispatch intervals, as published.
    Fine,
    /// 30-minute trading intervals, pre-aggregated offline from fine data.
    Coarse,
}

impl Resolution {
    pub fn interval(&self) -> TimeDelta {
        match self {
            Resolution::Fine => TimeDelta::minutes(5),
            Resolution::Coarse => TimeDelta::minutes(30),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Fine => "5min",
            Resolution::Coarse => "30min",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = NemError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fine" | "5min" | "5m" | "5" => Ok(Resolution::Fine),
            "coarse" | "30min" | "30m" | "30" => Ok(Resolution::Coarse),
            other => Err(NemError::Configuration(format!(
                "unknown resolution '{}' (expected fine/5min or coarse/30min)",
                other
            ))),
        }
    }
}

/// Dataset families served by the query layer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// Unit-level SCADA output, keyed by DUID.
    Generation,
    /// Regional reference price.
    Price,
    /// Metered interconnector flow.
    Transmission,
}

impl DataType {
    pub const ALL: [DataType; 3] = [DataType::Generation, DataType::Price, DataType::Transmission];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Generation => "generation",
            DataType::Price => "price",
            DataType::Transmission => "transmission",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = NemError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "generation" | "gen" | "scada" => Ok(DataType::Generation),
            "price" | "prices" | "rrp" => Ok(DataType::Price),
            "transmission" | "interconnector" | "flow" | "flows" => Ok(DataType::Transmission),
            other => Err(NemError::Configuration(format!("unknown data type '{}'", other))),
        }
    }
}

/// Canonical time series row: one value for one entity at one interval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    /// Interval-ending timestamp in market time.
    pub timestamp: NaiveDateTime,
    /// DUID, region id, interconnector id, or a group label after aggregation.
    pub entity: String,
    pub value: f64,
}

impl Record {
    pub fn new(timestamp: NaiveDateTime, entity: impl Into<String>, value: f64) -> Self {
        Self {
            timestamp,
            entity: entity.into(),
            value,
        }
    }
}

/// Tabular query result in the canonical schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultSet {
    pub data_type: DataType,
    pub resolution: Resolution,
    pub records: Vec<Record>,
}

impl ResultSet {
    pub const COLUMNS: [&'static str; 3] = ["timestamp", "entity", "value"];

    pub fn new(data_type: DataType, resolution: Resolution, records: Vec<Record>) -> Self {
        Self {
            data_type,
            resolution,
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Approximate heap + inline footprint, used for cache budgeting.
    pub fn estimated_bytes(&self) -> usize {
        let inline = std::mem::size_of::<Self>() + self.records.len() * std::mem::size_of::<Record>();
        let strings: usize = self.records.iter().map(|r| r.entity.len()).sum();
        inline + strings
    }

    /// Distinct entity ids, sorted.
    pub fn entities(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.records.iter().map(|r| r.entity.as_str()).collect();
        out.sort_unstable();
        out.dedup();
        out
    }
}
