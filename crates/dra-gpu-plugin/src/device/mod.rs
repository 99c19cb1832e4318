//! Device Module
//!
//! The GPUs this node exposes and the bookkeeping of who holds what:
//! - `inventory`: deterministic enumeration of the simulated GPUs
//! - `pool`: per-device capacity, sharing-mode binding and slot assignment

mod inventory;
mod pool;

pub use inventory::{enumerate_devices, Device, DEVICE_MODEL};
pub use pool::{DevicePool, DeviceUsage, PoolError, ShareMode};
