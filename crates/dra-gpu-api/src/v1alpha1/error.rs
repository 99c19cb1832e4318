//! Configuration errors
//!
//! Rendered messages are part of the API: callers and the node agent surface
//! them verbatim, and existing tooling matches on the text.

use thiserror::Error;

/// A malformed or contradictory `GpuConfig`.
///
/// Always user-correctable; never retried by the plugin.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("config is 'nil'")]
    NilConfig,

    #[error("no sharing strategy set")]
    NoSharingStrategy,

    #[error("unknown GPU sharing strategy: {0}")]
    UnknownStrategy(String),

    #[error("unknown time-slice interval: {0}")]
    UnknownInterval(String),

    #[error("invalid partition count: {0}")]
    InvalidPartitionCount(i32),

    #[error("no sharing set to get config from")]
    NoSharing,

    #[error("strategy is not set to '{expected}'")]
    StrategyMismatch { expected: &'static str },

    #[error("cannot use {config} with the '{strategy}' strategy")]
    ConflictingConfig {
        config: &'static str,
        strategy: &'static str,
    },

    #[error("unsupported config type {api_version}, Kind={kind}")]
    UnsupportedType { api_version: String, kind: String },

    #[error("failed to decode config: {0}")]
    Decode(String),
}
