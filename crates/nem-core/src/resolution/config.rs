use crate::error::{NemError, Result};
use crate::types::DataType;
use chrono::TimeDelta;
use std::collections::HashMap;

/// Size profile of one dataset, used to estimate query footprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetProfile {
    /// Typical number of distinct entities reporting per interval.
    pub entity_count: u64,

    /// Approximate in-memory cost of one canonical row.
    pub bytes_per_row: u64,
}

impl DatasetProfile {
    pub fn new(entity_count: u64, bytes_per_row: u64) -> Self {
        Self {
            entity_count,
            bytes_per_row,
        }
    }
}

/// Thresholds for choosing between fine and coarse data.
#[derive(Debug, Clone)]
pub struct ResolutionConfig {
    /// Ranges longer than this go coarse. Default: 14 days.
    pub fine_range_threshold: TimeDelta,

    /// Ranges no longer than this always go fine. Default: 24 hours.
    pub recent_window: TimeDelta,

    /// Fine-resolution estimates above this go coarse. Default: 512 MiB.
    pub memory_cap_bytes: u64,

    /// Per-dataset size profiles. A data type without a profile is a
    /// configuration error at query time.
    pub profiles: HashMap<DataType, DatasetProfile>,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        let mut profiles = HashMap::new();
        // ~500 scheduled/semi-scheduled DUIDs in the NEM
        profiles.insert(DataType::Generation, DatasetProfile::new(500, 64));
        // NSW1, QLD1, SA1, TAS1, VIC1
        profiles.insert(DataType::Price, DatasetProfile::new(5, 48));
        // N-Q-MNSP1, NSW1-QLD1, T-V-MNSP1, V-S-MNSP1, V-SA, VIC1-NSW1
        profiles.insert(DataType::Transmission, DatasetProfile::new(6, 48));

        Self {
            fine_range_threshold: TimeDelta::days(14),
            recent_window: TimeDelta::hours(24),
            memory_cap_bytes: 512 * 1024 * 1024,
            profiles,
        }
    }
}

impl ResolutionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fine_range_threshold(mut self, threshold: TimeDelta) -> Self {
        self.fine_range_threshold = threshold;
        self
    }

    pub fn with_recent_window(mut self, window: TimeDelta) -> Self {
        self.recent_window = window;
        self
    }

    pub fn with_memory_cap_bytes(mut self, cap: u64) -> Self {
        self.memory_cap_bytes = cap;
        self
    }

    pub fn with_profile(mut self, data_type: DataType, profile: DatasetProfile) -> Self {
        self.profiles.insert(data_type, profile);
        self
    }

    pub fn without_profile(mut self, data_type: DataType) -> Self {
        self.profiles.remove(&data_type);
        self
    }

    pub fn profile(&self, data_type: DataType) -> Result<&DatasetProfile> {
        self.profiles.get(&data_type).ok_or_else(|| {
            NemError::Configuration(format!("no resolution profile configured for '{}'", data_type))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.fine_range_threshold <= TimeDelta::zero() {
            return Err(NemError::Configuration(
                "fine_range_threshold must be > 0".into(),
            ));
        }

        if self.recent_window <= TimeDelta::zero() {
            return Err(NemError::Configuration("recent_window must be > 0".into()));
        }

        if self.recent_window > self.fine_range_threshold {
            return Err(NemError::Configuration(
                "recent_window must be <= fine_range_threshold".into(),
            ));
        }

        if self.memory_cap_bytes == 0 {
            return Err(NemError::Configuration("memory_cap_bytes must be > 0".into()));
        }

        for (data_type, profile) in &self.profiles {
            if profile.entity_count == 0 || profile.bytes_per_row == 0 {
                return Err(NemError::Configuration(format!(
                    "profile for '{}' must have entity_count and bytes_per_row > 0",
                    data_type
                )));
            }
        }

        Ok(())
    }
}
