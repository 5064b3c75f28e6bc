//! Date-like input normalisation.
//!
//! Every caller-supplied date or timestamp is converted to a naive
//! market-time timestamp as soon as it enters the crate. Nothing downstream
//! ever does arithmetic on mixed date/datetime values.

use crate::error::{NemError, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// NEM market time is AEST all year round (no daylight saving).
pub const MARKET_UTC_OFFSET_SECS: i32 = 10 * 3600;

const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];

pub fn market_offset() -> FixedOffset {
    FixedOffset::east_opt(MARKET_UTC_OFFSET_SECS).expect("market offset is within ±24h")
}

/// Any date-like value a caller may hand us.
#[derive(Debug, Clone, PartialEq)]
pub enum DateLike {
    /// A calendar date, read as midnight market time.
    Date(NaiveDate),
    /// A timestamp already in market time.
    Naive(NaiveDateTime),
    /// A timestamp with an explicit offset.
    Zoned(DateTime<FixedOffset>),
    Utc(DateTime<Utc>),
    /// Unparsed text from a config file, CLI flag or query string.
    Text(String),
}

impl DateLike {
    /// Normalise to a naive market-time timestamp.
    pub fn to_market_time(&self) -> Result<NaiveDateTime> {
        match self {
            DateLike::Date(d) => Ok(d.and_time(NaiveTime::MIN)),
            DateLike::Naive(dt) => Ok(*dt),
            DateLike::Zoned(dt) => Ok(dt.with_timezone(&market_offset()).naive_local()),
            DateLike::Utc(dt) => Ok(dt.with_timezone(&market_offset()).naive_local()),
            DateLike::Text(s) => parse_text(s),
        }
    }
}

/// Parse a timestamp cell or flag value into market time.
pub fn parse_market_timestamp(raw: &str) -> Result<NaiveDateTime> {
    parse_text(raw)
}

fn parse_text(raw: &str) -> Result<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(NemError::TypeMismatch {
            input: raw.to_string(),
            reason: "empty input".into(),
        });
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&market_offset()).naive_local());
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt);
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d.and_time(NaiveTime::MIN));
        }
    }

    Err(NemError::TypeMismatch {
        input: raw.to_string(),
        reason: "not a recognised date or timestamp format".into(),
    })
}

impl From<NaiveDate> for DateLike {
    fn from(d: NaiveDate) -> Self {
        DateLike::Date(d)
    }
}

impl From<NaiveDateTime> for DateLike {
    fn from(dt: NaiveDateTime) -> Self {
        DateLike::Naive(dt)
    }
}

impl From<DateTime<FixedOffset>> for DateLike {
    fn from(dt: DateTime<FixedOffset>) -> Self {
        DateLike::Zoned(dt)
    }
}

impl From<DateTime<Utc>> for DateLike {
    fn from(dt: DateTime<Utc>) -> Self {
        DateLike::Utc(dt)
    }
}

impl From<&str> for DateLike {
    fn from(s: &str) -> Self {
        DateLike::Text(s.to_string())
    }
}

impl From<String> for DateLike {
    fn from(s: String) -> Self {
        DateLike::Text(s)
    }
}

/// Inclusive market-time range with `start <= end`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TimeRange {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl TimeRange {
    /// Normalise both ends and validate ordering.
    pub fn new(start: impl Into<DateLike>, end: impl Into<DateLike>) -> Result<Self> {
        let start = start.into().to_market_time()?;
        let end = end.into().to_market_time()?;
        Self::from_market(start, end)
    }

    pub fn from_market(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        if start > end {
            return Err(NemError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    pub fn is_zero_length(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, ts: NaiveDateTime) -> bool {
        ts >= self.start && ts <= self.end
    }

    /// Number of interval boundaries of length `step` falling in the range.
    pub fn interval_count(&self, step: TimeDelta) -> u64 {
        let step_secs = step.num_seconds().max(1);
        (self.duration().num_seconds() / step_secs) as u64 + 1
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}
