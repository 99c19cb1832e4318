//! Prepared-claim records.
//!
//! These are what the checkpoint persists and what `prepare` hands back, so
//! every type here is serde-stable.

use crate::device::ShareMode;
use chrono::{DateTime, Utc};
use dra_gpu_api::{SharingStrategy, TimeSliceInterval};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// UID of a `ResourceClaim`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimUid(String);

impl ClaimUid {
    pub fn new(uid: impl Into<String>) -> Self {
        Self(uid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClaimUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClaimUid {
    fn from(uid: &str) -> Self {
        Self(uid.to_string())
    }
}

impl From<String> for ClaimUid {
    fn from(uid: String) -> Self {
        Self(uid)
    }
}

/// Sharing actually applied to one prepared device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all_fields = "camelCase")]
pub enum AppliedSharing {
    TimeSlicing {
        interval: TimeSliceInterval,
        slice_ms: u64,
        /// Tenant slot held on the device
        tenant: u32,
    },
    SpacePartitioning {
        /// Partitions the claim asked for in total
        partition_count: u32,
        /// Partition indices held on this device
        partitions: Vec<u32>,
    },
}

impl AppliedSharing {
    pub fn strategy(&self) -> SharingStrategy {
        match self {
            AppliedSharing::TimeSlicing { .. } => SharingStrategy::TimeSlicing,
            AppliedSharing::SpacePartitioning { .. } => SharingStrategy::SpacePartitioning,
        }
    }
}

/// One device prepared for a claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedDevice {
    pub device: String,
    pub uuid: Uuid,
    pub sharing: AppliedSharing,
}

impl PreparedDevice {
    /// Pool mode the device was reserved under.
    pub fn mode(&self) -> ShareMode {
        match self.sharing {
            AppliedSharing::TimeSlicing { interval, .. } => ShareMode::TimeSlicing { interval },
            AppliedSharing::SpacePartitioning { .. } => ShareMode::SpacePartitioning,
        }
    }

    /// Pool slots held by this device record.
    pub fn slots(&self) -> Vec<u32> {
        match &self.sharing {
            AppliedSharing::TimeSlicing { tenant, .. } => vec![*tenant],
            AppliedSharing::SpacePartitioning { partitions, .. } => partitions.clone(),
        }
    }

    /// Runtime descriptor for the `index`-th device of the claim.
    pub fn descriptor(&self, index: usize) -> DeviceDescriptor {
        let prefix = format!("GPU_DEVICE_{index}");
        let mut env = BTreeMap::new();
        env.insert(prefix.clone(), self.device.clone());
        env.insert(
            format!("{prefix}_SHARING_STRATEGY"),
            self.sharing.strategy().to_string(),
        );
        match &self.sharing {
            AppliedSharing::TimeSlicing { interval, .. } => {
                env.insert(format!("{prefix}_TIMESLICE_INTERVAL"), interval.to_string());
            }
            AppliedSharing::SpacePartitioning {
                partition_count,
                partitions,
            } => {
                env.insert(
                    format!("{prefix}_PARTITION_COUNT"),
                    partition_count.to_string(),
                );
                let partitions: Vec<String> = partitions.iter().map(u32::to_string).collect();
                env.insert(format!("{prefix}_PARTITIONS"), partitions.join(","));
            }
        }

        DeviceDescriptor {
            device: self.device.clone(),
            uuid: self.uuid,
            env,
        }
    }
}

/// What the container runtime is told about a prepared device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub device: String,
    pub uuid: Uuid,
    pub env: BTreeMap<String, String>,
}

/// Everything recorded for one prepared claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedClaim {
    pub devices: Vec<PreparedDevice>,
    pub prepared_at: DateTime<Utc>,
}

impl PreparedClaim {
    pub fn new(devices: Vec<PreparedDevice>) -> Self {
        Self {
            devices,
            prepared_at: Utc::now(),
        }
    }

    pub fn device_names(&self) -> Vec<&str> {
        self.devices.iter().map(|d| d.device.as_str()).collect()
    }

    pub fn descriptors(&self) -> Vec<DeviceDescriptor> {
        self.devices
            .iter()
            .enumerate()
            .map(|(index, device)| device.descriptor(index))
            .collect()
    }
}
