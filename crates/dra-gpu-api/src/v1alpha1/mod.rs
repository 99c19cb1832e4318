//! `gpu.resource.example.com/v1alpha1`
//!
//! - `config`: the top-level `GpuConfig` object, defaulting and decoding
//! - `sharing`: sharing strategies and their per-strategy settings
//! - `error`: configuration errors with stable renderings

mod config;
mod error;
mod sharing;

pub use config::{decode, default_gpu_config, normalize, GpuConfig, ResolvedSharing};
pub use error::ConfigError;
pub use sharing::{
    GpuSharing, SharingStrategy, SpacePartitioningConfig, StringEnum, TimeSliceInterval,
    TimeSlicingConfig,
};

/// API group of the opaque device configuration.
pub const GROUP_NAME: &str = "gpu.resource.example.com";

/// API version of this module.
pub const VERSION: &str = "v1alpha1";

/// `apiVersion` value expected on decoded objects.
pub const API_VERSION: &str = "gpu.resource.example.com/v1alpha1";

/// `kind` of the GPU configuration object.
pub const GPU_CONFIG_KIND: &str = "GpuConfig";
