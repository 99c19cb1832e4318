//! GPU sharing strategies
//!
//! A claimed GPU is either time-sliced between the containers that reference
//! it, or split into exclusive space partitions. Each strategy has its own
//! settings struct; only the one matching `GpuSharing::strategy` may be set.

use super::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumString};

/// A string-valued enumeration as it appears on the wire.
///
/// Decoding never fails on an unrecognised value: it is kept verbatim in
/// `Unknown` so validation can report exactly what the user wrote. The empty
/// string is the unset value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(
    from = "String",
    into = "String",
    bound(serialize = "T: Clone + fmt::Display", deserialize = "T: FromStr")
)]
pub enum StringEnum<T> {
    Known(T),
    Unknown(String),
}

impl<T> StringEnum<T> {
    /// The recognised value, if any.
    pub fn known(&self) -> Option<&T> {
        match self {
            StringEnum::Known(value) => Some(value),
            StringEnum::Unknown(_) => None,
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, StringEnum::Unknown(raw) if raw.is_empty())
    }
}

impl<T> Default for StringEnum<T> {
    fn default() -> Self {
        StringEnum::Unknown(String::new())
    }
}

impl<T: FromStr> From<String> for StringEnum<T> {
    fn from(raw: String) -> Self {
        match raw.parse() {
            Ok(value) => StringEnum::Known(value),
            Err(_) => StringEnum::Unknown(raw),
        }
    }
}

impl<T: FromStr> From<&str> for StringEnum<T> {
    fn from(raw: &str) -> Self {
        Self::from(raw.to_string())
    }
}

impl<T: fmt::Display> From<StringEnum<T>> for String {
    fn from(value: StringEnum<T>) -> Self {
        value.to_string()
    }
}

impl<T: fmt::Display> fmt::Display for StringEnum<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StringEnum::Known(value) => value.fmt(f),
            StringEnum::Unknown(raw) => f.write_str(raw),
        }
    }
}

/// How a claimed GPU is shared.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum SharingStrategy {
    TimeSlicing,
    SpacePartitioning,
}

impl SharingStrategy {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SharingStrategy::TimeSlicing => "TimeSlicing",
            SharingStrategy::SpacePartitioning => "SpacePartitioning",
        }
    }
}

impl From<SharingStrategy> for StringEnum<SharingStrategy> {
    fn from(strategy: SharingStrategy) -> Self {
        StringEnum::Known(strategy)
    }
}

/// Named time-slice length. The duration behind each name is node
/// configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum TimeSliceInterval {
    Default,
    Short,
    Medium,
    Long,
}

impl From<TimeSliceInterval> for StringEnum<TimeSliceInterval> {
    fn from(interval: TimeSliceInterval) -> Self {
        StringEnum::Known(interval)
    }
}

/// Settings for the `TimeSlicing` strategy.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TimeSlicingConfig {
    #[serde(default)]
    pub interval: StringEnum<TimeSliceInterval>,
}

impl TimeSlicingConfig {
    pub fn new(interval: TimeSliceInterval) -> Self {
        Self {
            interval: interval.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.interval {
            StringEnum::Known(_) => Ok(()),
            StringEnum::Unknown(raw) => Err(ConfigError::UnknownInterval(raw.clone())),
        }
    }
}

/// Settings for the `SpacePartitioning` strategy.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SpacePartitioningConfig {
    /// Number of exclusive partitions the claim receives. Must be at least 1.
    #[serde(default)]
    pub partition_count: i32,
}

impl SpacePartitioningConfig {
    pub fn new(partition_count: i32) -> Self {
        Self { partition_count }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.partition_count < 1 {
            return Err(ConfigError::InvalidPartitionCount(self.partition_count));
        }
        Ok(())
    }
}

/// Sharing settings of a `GpuConfig`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GpuSharing {
    #[serde(default)]
    pub strategy: StringEnum<SharingStrategy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_slicing_config: Option<TimeSlicingConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_partitioning_config: Option<SpacePartitioningConfig>,
}

impl GpuSharing {
    /// Time slicing with the given interval.
    pub fn time_slicing(interval: TimeSliceInterval) -> Self {
        Self {
            strategy: SharingStrategy::TimeSlicing.into(),
            time_slicing_config: Some(TimeSlicingConfig::new(interval)),
            space_partitioning_config: None,
        }
    }

    /// Space partitioning with the given partition count.
    pub fn space_partitioning(partition_count: i32) -> Self {
        Self {
            strategy: SharingStrategy::SpacePartitioning.into(),
            time_slicing_config: None,
            space_partitioning_config: Some(SpacePartitioningConfig::new(partition_count)),
        }
    }

    pub fn is_time_slicing(&self) -> bool {
        self.strategy.known() == Some(&SharingStrategy::TimeSlicing)
    }

    pub fn is_space_partitioning(&self) -> bool {
        self.strategy.known() == Some(&SharingStrategy::SpacePartitioning)
    }

    /// Time-slicing settings, checked against the strategy tag.
    ///
    /// Returns `Ok(None)` when the strategy matches but the settings were never
    /// normalized in.
    pub fn time_slicing_config(&self) -> Result<Option<&TimeSlicingConfig>, ConfigError> {
        if !self.is_time_slicing() {
            return Err(ConfigError::StrategyMismatch {
                expected: SharingStrategy::TimeSlicing.as_str(),
            });
        }
        if self.space_partitioning_config.is_some() {
            return Err(ConfigError::ConflictingConfig {
                config: "SpacePartitioningConfig",
                strategy: SharingStrategy::TimeSlicing.as_str(),
            });
        }
        Ok(self.time_slicing_config.as_ref())
    }

    /// Space-partitioning settings, checked against the strategy tag.
    pub fn space_partitioning_config(
        &self,
    ) -> Result<Option<&SpacePartitioningConfig>, ConfigError> {
        if !self.is_space_partitioning() {
            return Err(ConfigError::StrategyMismatch {
                expected: SharingStrategy::SpacePartitioning.as_str(),
            });
        }
        if self.time_slicing_config.is_some() {
            return Err(ConfigError::ConflictingConfig {
                config: "TimeSlicingConfig",
                strategy: SharingStrategy::SpacePartitioning.as_str(),
            });
        }
        Ok(self.space_partitioning_config.as_ref())
    }

    /// Install the settings of the selected strategy if they are missing.
    pub fn normalize(&mut self) {
        match self.strategy.known() {
            Some(SharingStrategy::TimeSlicing) => {
                self.time_slicing_config
                    .get_or_insert_with(|| TimeSlicingConfig::new(TimeSliceInterval::Default));
            }
            Some(SharingStrategy::SpacePartitioning) => {
                self.space_partitioning_config
                    .get_or_insert_with(|| SpacePartitioningConfig::new(1));
            }
            None => {}
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.strategy {
            StringEnum::Known(SharingStrategy::TimeSlicing) => match self.time_slicing_config()? {
                Some(config) => config.validate(),
                None => Ok(()),
            },
            StringEnum::Known(SharingStrategy::SpacePartitioning) => {
                match self.space_partitioning_config()? {
                    Some(config) => config.validate(),
                    None => Ok(()),
                }
            }
            StringEnum::Unknown(raw) => Err(ConfigError::UnknownStrategy(raw.clone())),
        }
    }
}
