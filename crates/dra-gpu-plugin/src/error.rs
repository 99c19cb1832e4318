//! Plugin Errors
//!
//! Every failure `DeviceState` can report, grouped by `ErrorKind` so callers
//! can branch on the category while the rendered messages stay stable.

use crate::device::PoolError;
use crate::state::{CheckpointError, ClaimUid};
use dra_gpu_api::{ConfigError, SharingStrategy};
use std::fmt;
use thiserror::Error;

/// Category of a `PluginError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The claim's configuration is malformed or the request is unusable
    Config,
    /// Not enough free devices, partitions or tenant slots
    Capacity,
    /// The checkpoint could not be read or written
    Durability,
    /// Internal bookkeeping disagrees with itself
    Invariant,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Config => "config",
            ErrorKind::Capacity => "capacity",
            ErrorKind::Durability => "durability",
            ErrorKind::Invariant => "invariant",
        };
        f.write_str(name)
    }
}

/// A request the pool cannot satisfy right now.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("insufficient capacity for {strategy}: requested {requested}, available {available}")]
pub struct CapacityError {
    pub strategy: SharingStrategy,
    /// Devices (time slicing) or partitions (space partitioning) asked for
    pub requested: u32,
    /// How many of those were free when the request was planned
    pub available: u32,
}

/// A checkpointed claim that could not be restored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("claim {claim} conflicts on device {device}: {reason}")]
pub struct ConflictError {
    pub claim: ClaimUid,
    pub device: String,
    #[source]
    pub reason: PoolError,
}

#[derive(Debug, Error)]
pub enum PluginError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Capacity(#[from] CapacityError),

    #[error("checkpoint failure: {0}")]
    Durability(#[from] CheckpointError),

    #[error("invariant violation: {0}")]
    Invariant(#[source] PoolError),

    /// The task running the operation was cancelled, e.g. by runtime shutdown
    #[error("operation interrupted: {0}")]
    Interrupted(#[source] tokio::task::JoinError),
}

impl PluginError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PluginError::Config(_) | PluginError::InvalidRequest(_) => ErrorKind::Config,
            PluginError::Capacity(_) => ErrorKind::Capacity,
            PluginError::Durability(_) => ErrorKind::Durability,
            PluginError::Invariant(_) | PluginError::Interrupted(_) => ErrorKind::Invariant,
        }
    }
}
