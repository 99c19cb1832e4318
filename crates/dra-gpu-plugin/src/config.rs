//! Plugin Configuration
//!
//! Startup settings for the plugin with environment variable overrides.
//! Values are layered: built-in defaults, then an optional YAML file, then
//! environment variables, then command-line flags (applied by the binary).
//!
//! Environment variables:
//! - `NODE_NAME` - name of the node the plugin runs on
//! - `NUM_DEVICES` - number of simulated GPUs to expose
//! - `PARTITIONS_PER_DEVICE` - space partitions each GPU can be split into
//! - `PLUGIN_DATA_DIR` - directory holding the checkpoint

use dra_gpu_api::TimeSliceInterval;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Settings for one named time-slice interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntervalSettings {
    /// Length of one time slice in milliseconds
    pub slice_ms: u64,
    /// Claims that may time-share one GPU at this interval
    pub max_tenants: u32,
}

impl IntervalSettings {
    pub fn slice(&self) -> Duration {
        Duration::from_millis(self.slice_ms)
    }
}

/// Per-interval time-slicing table. Deployment specific; the defaults only
/// make a single-node test cluster usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeSlicingSettings {
    pub default: IntervalSettings,
    pub short: IntervalSettings,
    pub medium: IntervalSettings,
    pub long: IntervalSettings,
}

impl Default for TimeSlicingSettings {
    fn default() -> Self {
        Self {
            default: IntervalSettings {
                slice_ms: 2,
                max_tenants: 4,
            },
            short: IntervalSettings {
                slice_ms: 1,
                max_tenants: 8,
            },
            medium: IntervalSettings {
                slice_ms: 5,
                max_tenants: 4,
            },
            long: IntervalSettings {
                slice_ms: 10,
                max_tenants: 2,
            },
        }
    }
}

impl TimeSlicingSettings {
    pub fn get(&self, interval: TimeSliceInterval) -> &IntervalSettings {
        match interval {
            TimeSliceInterval::Default => &self.default,
            TimeSliceInterval::Short => &self.short,
            TimeSliceInterval::Medium => &self.medium,
            TimeSliceInterval::Long => &self.long,
        }
    }

    fn validate(&self) -> Result<(), SettingsError> {
        for (field, settings) in [
            ("timeSlicing.default", &self.default),
            ("timeSlicing.short", &self.short),
            ("timeSlicing.medium", &self.medium),
            ("timeSlicing.long", &self.long),
        ] {
            if settings.max_tenants == 0 {
                return Err(SettingsError::Invalid {
                    field,
                    reason: "maxTenants must be at least 1".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Plugin configuration with sensible defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PluginConfig {
    /// Node the plugin serves (env: NODE_NAME)
    pub node_name: String,

    /// Number of simulated GPUs (env: NUM_DEVICES)
    pub num_devices: u32,

    /// Space partitions per GPU (env: PARTITIONS_PER_DEVICE)
    pub partitions_per_device: u32,

    /// Plugin state directory (env: PLUGIN_DATA_DIR)
    pub plugin_data_dir: PathBuf,

    /// Time-slice durations and tenant bounds
    pub time_slicing: TimeSlicingSettings,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            node_name: "localhost".to_string(),
            num_devices: 8,
            partitions_per_device: 8,
            plugin_data_dir: PathBuf::from("/var/lib/kubelet/plugins/gpu.resource.example.com"),
            time_slicing: TimeSlicingSettings::default(),
        }
    }
}

impl PluginConfig {
    /// Create configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Load an optional YAML file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let config = match path {
            Some(path) => {
                let mut config = Self::from_file(path)?;
                config.apply_env();
                config
            }
            None => Self::from_env(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.node_name.is_empty() {
            return Err(SettingsError::Invalid {
                field: "nodeName",
                reason: "must not be empty".to_string(),
            });
        }
        if self.partitions_per_device == 0 {
            return Err(SettingsError::Invalid {
                field: "partitionsPerDevice",
                reason: "must be at least 1".to_string(),
            });
        }
        self.time_slicing.validate()
    }

    fn apply_env(&mut self) {
        if let Ok(node_name) = std::env::var("NODE_NAME") {
            self.node_name = node_name;
        }

        if let Ok(count) = std::env::var("NUM_DEVICES") {
            if let Ok(parsed) = count.parse::<u32>() {
                self.num_devices = parsed;
            }
        }

        if let Ok(partitions) = std::env::var("PARTITIONS_PER_DEVICE") {
            if let Ok(parsed) = partitions.parse::<u32>() {
                self.partitions_per_device = parsed;
            }
        }

        if let Ok(dir) = std::env::var("PLUGIN_DATA_DIR") {
            self.plugin_data_dir = PathBuf::from(dir);
        }
    }
}
