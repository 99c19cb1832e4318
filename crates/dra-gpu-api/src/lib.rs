//! DRA GPU API
//!
//! Versioned opaque-configuration types accepted by the DRA GPU kubelet plugin.
//! A `ResourceClaim` may carry a `GpuConfig` describing how the GPUs backing it
//! are shared; the plugin decodes, normalizes and validates that value before
//! preparing any device.

pub mod v1alpha1;

pub use v1alpha1::{
    default_gpu_config, ConfigError, GpuConfig, GpuSharing, ResolvedSharing,
    SharingStrategy, SpacePartitioningConfig, StringEnum, TimeSliceInterval, TimeSlicingConfig,
};
