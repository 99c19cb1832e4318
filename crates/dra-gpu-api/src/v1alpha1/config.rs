//! GpuConfig
//!
//! The opaque device configuration a `ResourceClaim` (or its `DeviceClass`)
//! hands to the plugin. Two independent passes are provided: `normalize`
//! installs defaults, `validate` rejects malformed values. Callers that want
//! to report exactly what the user supplied validate first; the plugin
//! normalizes first so only genuine errors remain.

use super::sharing::{GpuSharing, SharingStrategy, StringEnum, TimeSliceInterval};
use super::{ConfigError, API_VERSION, GPU_CONFIG_KIND};
use kube::core::TypeMeta;
use serde::{Deserialize, Serialize};

/// Configuration for one claimed GPU (or set of GPUs).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GpuConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sharing: Option<GpuSharing>,
}

/// The configuration the plugin applies when a claim carries none.
///
/// Already normalized and valid.
pub fn default_gpu_config() -> GpuConfig {
    GpuConfig {
        api_version: API_VERSION.to_string(),
        kind: GPU_CONFIG_KIND.to_string(),
        sharing: Some(GpuSharing::time_slicing(TimeSliceInterval::Default)),
    }
}

/// Normalize a possibly absent configuration in place.
pub fn normalize(config: Option<&mut GpuConfig>) -> Result<(), ConfigError> {
    let config = config.ok_or(ConfigError::NilConfig)?;
    config.normalize();
    Ok(())
}

/// Fully resolved sharing parameters of a validated configuration.
///
/// Consumers match on this instead of the wire tag, so a new strategy fails
/// to compile everywhere it is not handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResolvedSharing {
    TimeSlicing { interval: TimeSliceInterval },
    SpacePartitioning { partition_count: u32 },
}

impl ResolvedSharing {
    pub fn strategy(&self) -> SharingStrategy {
        match self {
            ResolvedSharing::TimeSlicing { .. } => SharingStrategy::TimeSlicing,
            ResolvedSharing::SpacePartitioning { .. } => SharingStrategy::SpacePartitioning,
        }
    }
}

impl GpuConfig {
    pub fn type_meta(&self) -> TypeMeta {
        TypeMeta {
            api_version: self.api_version.clone(),
            kind: self.kind.clone(),
        }
    }

    /// Sharing settings, or an error when none are set.
    pub fn sharing(&self) -> Result<&GpuSharing, ConfigError> {
        self.sharing.as_ref().ok_or(ConfigError::NoSharing)
    }

    /// Fill in defaults. Settings that are already present are never
    /// overwritten, so normalizing twice is the same as normalizing once.
    pub fn normalize(&mut self) {
        self.sharing
            .get_or_insert_with(|| GpuSharing {
                strategy: SharingStrategy::TimeSlicing.into(),
                ..Default::default()
            })
            .normalize();
    }

    /// Reject malformed or contradictory values. Does not apply defaults.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.sharing {
            Some(sharing) => sharing.validate(),
            None => Err(ConfigError::NoSharingStrategy),
        }
    }

    /// Validate and collapse into the closed form the plugin allocates from.
    ///
    /// Settings missing under the selected strategy resolve to their defaults.
    pub fn resolve(&self) -> Result<ResolvedSharing, ConfigError> {
        self.validate()?;
        let sharing = self.sharing()?;
        match &sharing.strategy {
            StringEnum::Known(SharingStrategy::TimeSlicing) => {
                let interval = sharing
                    .time_slicing_config()?
                    .and_then(|config| config.interval.known().copied())
                    .unwrap_or(TimeSliceInterval::Default);
                Ok(ResolvedSharing::TimeSlicing { interval })
            }
            StringEnum::Known(SharingStrategy::SpacePartitioning) => {
                let partition_count = sharing
                    .space_partitioning_config()?
                    .map(|config| config.partition_count)
                    .unwrap_or(1);
                let partition_count = u32::try_from(partition_count)
                    .map_err(|_| ConfigError::InvalidPartitionCount(partition_count))?;
                Ok(ResolvedSharing::SpacePartitioning { partition_count })
            }
            StringEnum::Unknown(raw) => Err(ConfigError::UnknownStrategy(raw.clone())),
        }
    }
}

/// Strictly decode an opaque configuration payload.
///
/// Accepts JSON or YAML. The object must declare this module's `apiVersion`
/// and the `GpuConfig` kind, and may not carry unknown fields.
pub fn decode(raw: &[u8]) -> Result<GpuConfig, ConfigError> {
    let value: serde_yaml::Value =
        serde_yaml::from_slice(raw).map_err(|e| ConfigError::Decode(e.to_string()))?;

    let type_meta: TypeMeta = serde_yaml::from_value(value.clone())
        .map_err(|e| ConfigError::Decode(e.to_string()))?;
    if type_meta.api_version != API_VERSION || type_meta.kind != GPU_CONFIG_KIND {
        return Err(ConfigError::UnsupportedType {
            api_version: type_meta.api_version,
            kind: type_meta.kind,
        });
    }

    serde_yaml::from_value(value).map_err(|e| ConfigError::Decode(e.to_string()))
}
