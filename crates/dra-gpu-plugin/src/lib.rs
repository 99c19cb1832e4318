//! DRA GPU Kubelet Plugin Library
//!
//! Node-local half of the GPU dynamic resource allocation driver. The kubelet
//! asks the plugin to prepare the devices allocated to a `ResourceClaim` and
//! to release them again; this crate decides which simulated GPUs back each
//! claim, applies the requested sharing strategy and keeps a durable
//! checkpoint so prepared claims survive plugin restarts.
//!
//! - `device`: simulated GPU inventory and the shared capacity pool
//! - `state`: prepared-claim records, the claim store and its checkpoint
//! - `engine`: `DeviceState`, the single entry point for prepare/unprepare
//! - `recovery`: checkpoint reconciliation at startup
//! - `observability`: tracing setup and structured events

pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod observability;
pub mod recovery;
pub mod state;
pub mod version;

pub use config::{IntervalSettings, PluginConfig, TimeSlicingSettings};
pub use device::{Device, DevicePool, ShareMode};
pub use engine::{DeviceRequest, DeviceState};
pub use error::{CapacityError, ConflictError, ErrorKind, PluginError};
pub use recovery::RecoveryReport;
pub use state::{AppliedSharing, ClaimUid, DeviceDescriptor, PreparedClaim, PreparedDevice};
