use crate::error::Result;
use crate::resolution::config::ResolutionConfig;
use crate::time::{DateLike, TimeRange};
use crate::types::{DataType, Resolution};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a resolution was chosen.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    Override,
    ZeroLength,
    RecentWindow,
    RangeThreshold,
    MemoryCap,
    WithinThresholds,
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DecisionReason::Override => "explicit override",
            DecisionReason::ZeroLength => "zero-length range",
            DecisionReason::RecentWindow => "within recent window",
            DecisionReason::RangeThreshold => "range exceeds fine threshold",
            DecisionReason::MemoryCap => "fine estimate exceeds memory cap",
            DecisionReason::WithinThresholds => "within fine thresholds",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolutionDecision {
    pub data_type: DataType,
    pub range: TimeRange,
    pub resolution: Resolution,
    /// Estimated footprint at the chosen resolution.
    pub estimated_bytes: u64,
    pub reason: DecisionReason,
}

/// Chooses fine or coarse data for a request.
///
/// The decision depends only on the range, the data type and the override,
/// never on the wall clock, so it is deterministic. Widening a range can
/// only move the decision toward coarse.
#[derive(Debug, Clone)]
pub struct ResolutionManager {
    config: ResolutionConfig,
}

impl ResolutionManager {
    pub fn new(config: ResolutionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ResolutionConfig {
        &self.config
    }

    /// Boundary entry point: takes raw date-like inputs and a data type tag.
    pub fn resolve(
        &self,
        start: impl Into<DateLike>,
        end: impl Into<DateLike>,
        data_type: &str,
        user_override: Option<Resolution>,
    ) -> Result<ResolutionDecision> {
        let data_type: DataType = data_type.parse()?;
        let range = TimeRange::new(start, end)?;
        self.decide(data_type, &range, user_override)
    }

    pub fn decide(
        &self,
        data_type: DataType,
        range: &TimeRange,
        user_override: Option<Resolution>,
    ) -> Result<ResolutionDecision> {
        // Fails for data types without a profile, even when overridden.
        let fine_estimate = self.estimate_bytes(data_type, range, Resolution::Fine)?;

        let (resolution, reason) = if let Some(forced) = user_override {
            (forced, DecisionReason::Override)
        } else if range.is_zero_length() {
            (Resolution::Fine, DecisionReason::ZeroLength)
        } else if range.duration() <= self.config.recent_window {
            (Resolution::Fine, DecisionReason::RecentWindow)
        } else if range.duration() > self.config.fine_range_threshold {
            (Resolution::Coarse, DecisionReason::RangeThreshold)
        } else if fine_estimate > self.config.memory_cap_bytes {
            (Resolution::Coarse, DecisionReason::MemoryCap)
        } else {
            (Resolution::Fine, DecisionReason::WithinThresholds)
        };

        let estimated_bytes = match resolution {
            Resolution::Fine => fine_estimate,
            Resolution::Coarse => self.estimate_bytes(data_type, range, Resolution::Coarse)?,
        };

        log::debug!(
            "resolution for {} over {}: {} ({}, ~{} bytes)",
            data_type,
            range,
            resolution,
            reason,
            estimated_bytes
        );

        Ok(ResolutionDecision {
            data_type,
            range: *range,
            resolution,
            estimated_bytes,
            reason,
        })
    }

    /// intervals × entities × bytes_per_row, saturating.
    pub fn estimate_bytes(
        &self,
        data_type: DataType,
        range: &TimeRange,
        resolution: Resolution,
    ) -> Result<u64> {
        let profile = self.config.profile(data_type)?;
        Ok(range
            .interval_count(resolution.interval())
            .saturating_mul(profile.entity_count)
            .saturating_mul(profile.bytes_per_row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NemError;
    use crate::resolution::config::DatasetProfile;
    use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
    use proptest::prelude::*;

    fn base() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn manager() -> ResolutionManager {
        ResolutionManager::new(ResolutionConfig::default()).unwrap()
    }

    fn range_of(span: TimeDelta) -> TimeRange {
        let end = base() + TimeDelta::days(3000);
        TimeRange::from_market(end - span, end).unwrap()
    }

    #[test]
    fn test_zero_length_is_fine() {
        let d = manager().decide(DataType::Price, &range_of(TimeDelta::zero()), None).unwrap();
        assert_eq!(d.resolution, Resolution::Fine);
        assert_eq!(d.reason, DecisionReason::ZeroLength);
    }

    #[test]
    fn test_recent_window_ignores_memory_cap() {
        // A tiny cap that any fine query would blow through.
        let config = ResolutionConfig::new().with_memory_cap_bytes(1);
        let m = ResolutionManager::new(config).unwrap();
        let d = m.decide(DataType::Generation, &range_of(TimeDelta::hours(24)), None).unwrap();
        assert_eq!(d.resolution, Resolution::Fine);
        assert_eq!(d.reason, DecisionReason::RecentWindow);
    }

    #[test]
    fn test_long_range_goes_coarse() {
        let d = manager()
            .decide(DataType::Transmission, &range_of(TimeDelta::days(15)), None)
            .unwrap();
        assert_eq!(d.resolution, Resolution::Coarse);
        assert_eq!(d.reason, DecisionReason::RangeThreshold);
    }

    #[test]
    fn test_memory_cap_goes_coarse() {
        let config = ResolutionConfig::new()
            .with_profile(DataType::Generation, DatasetProfile::new(5_000, 1_024));
        let m = ResolutionManager::new(config).unwrap();
        let d = m.decide(DataType::Generation, &range_of(TimeDelta::days(7)), None).unwrap();
        assert_eq!(d.resolution, Resolution::Coarse);
        assert_eq!(d.reason, DecisionReason::MemoryCap);
    }

    #[test]
    fn test_override_always_honoured() {
        let m = manager();
        let d = m
            .decide(DataType::Price, &range_of(TimeDelta::days(365)), Some(Resolution::Fine))
            .unwrap();
        assert_eq!(d.resolution, Resolution::Fine);
        assert_eq!(d.reason, DecisionReason::Override);

        let d = m
            .decide(DataType::Price, &range_of(TimeDelta::hours(1)), Some(Resolution::Coarse))
            .unwrap();
        assert_eq!(d.resolution, Resolution::Coarse);
    }

    #[test]
    fn test_unknown_data_type_is_configuration_error() {
        let err = manager()
            .resolve("2024-01-01", "2024-01-02", "rooftop_pv", None)
            .unwrap_err();
        assert!(matches!(err, NemError::Configuration(_)));

        let m = ResolutionManager::new(ResolutionConfig::new().without_profile(DataType::Price)).unwrap();
        let err = m.decide(DataType::Price, &range_of(TimeDelta::hours(1)), None).unwrap_err();
        assert!(matches!(err, NemError::Configuration(_)));
    }

    #[test]
    fn test_mixed_date_and_datetime_inputs() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 8)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let d = manager().resolve(start, end, "generation", None).unwrap();
        assert_eq!(d.range.duration(), TimeDelta::days(7));
        assert_eq!(d.resolution, Resolution::Fine);
    }

    #[test]
    fn test_five_years_of_prices_is_coarse_and_under_cap() {
        let m = manager();
        let d = m
            .resolve("2019-01-01", "2024-06-01 00:00", "price", None)
            .unwrap();
        assert_eq!(d.resolution, Resolution::Coarse);
        assert!(d.estimated_bytes < m.config().memory_cap_bytes);
    }

    proptest! {
        #[test]
        fn prop_short_ranges_are_fine(minutes in 0i64..=1440) {
            let config = ResolutionConfig::new().with_memory_cap_bytes(1);
            let m = ResolutionManager::new(config).unwrap();
            let d = m.decide(DataType::Generation, &range_of(TimeDelta::minutes(minutes)), None).unwrap();
            prop_assert_eq!(d.resolution, Resolution::Fine);
        }

        #[test]
        fn prop_long_ranges_are_coarse(extra_minutes in 1i64..(3 * 365 * 1440)) {
            let span = TimeDelta::days(14) + TimeDelta::minutes(extra_minutes);
            let d = manager().decide(DataType::Price, &range_of(span), None).unwrap();
            prop_assert_eq!(d.resolution, Resolution::Coarse);
        }

        #[test]
        fn prop_widening_never_returns_to_fine(
            minutes in 0i64..(60 * 1440),
            widen in 0i64..(60 * 1440),
            entities in 1u64..20_000,
        ) {
            let config = ResolutionConfig::new()
                .with_profile(DataType::Generation, DatasetProfile::new(entities, 64));
            let m = ResolutionManager::new(config).unwrap();
            let narrow = m.decide(DataType::Generation, &range_of(TimeDelta::minutes(minutes)), None).unwrap();
            let wide = m.decide(DataType::Generation, &range_of(TimeDelta::minutes(minutes + widen)), None).unwrap();
            prop_assert!(wide.resolution >= narrow.resolution);
        }
    }
}
