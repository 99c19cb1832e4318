//! Device Pool
//!
//! Tracks, per device, which slots are held. A slot is a partition index
//! under space partitioning or a tenant index under time slicing. A device
//! is bound to the sharing mode of its first reservation and stays bound
//! until every slot is released again; reservations under a different mode
//! are refused.
//!
//! All mutating operations check every precondition before touching state,
//! so a failed call leaves the pool exactly as it was.

use super::Device;
use crate::config::TimeSlicingSettings;
use dra_gpu_api::TimeSliceInterval;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// How a device is being shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all_fields = "camelCase")]
pub enum ShareMode {
    TimeSlicing { interval: TimeSliceInterval },
    SpacePartitioning,
}

impl fmt::Display for ShareMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShareMode::TimeSlicing { interval } => write!(f, "TimeSlicing({interval})"),
            ShareMode::SpacePartitioning => f.write_str("SpacePartitioning"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("unknown device {0}")]
    UnknownDevice(String),

    #[error("device {device} is shared as {bound}, cannot use it for {requested}")]
    ModeConflict {
        device: String,
        bound: ShareMode,
        requested: ShareMode,
    },

    #[error("device {device} has {free} free slots, {requested} requested")]
    Insufficient {
        device: String,
        requested: u32,
        free: u32,
    },

    #[error("slot {slot} on device {device} is already held")]
    SlotTaken { device: String, slot: u32 },

    #[error("slot {slot} on device {device} is out of range (capacity {capacity})")]
    SlotOutOfRange {
        device: String,
        slot: u32,
        capacity: u32,
    },

    #[error("slot {slot} on device {device} is not reserved")]
    NotReserved { device: String, slot: u32 },

    #[error("device {device} was replaced: recorded uuid {recorded}, found {found}")]
    DeviceChanged {
        device: String,
        recorded: Uuid,
        found: Uuid,
    },
}

/// Comparable view of one device's usage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceUsage {
    pub name: String,
    pub mode: Option<ShareMode>,
    pub slots: Vec<u32>,
}

#[derive(Debug)]
struct Entry {
    device: Device,
    mode: Option<ShareMode>,
    held: BTreeSet<u32>,
}

/// Capacity bookkeeping for every device on the node.
#[derive(Debug)]
pub struct DevicePool {
    /// Inventory order
    entries: Vec<Entry>,
    by_name: HashMap<String, usize>,
    time_slicing: TimeSlicingSettings,
}

impl DevicePool {
    pub fn new(devices: Vec<Device>, time_slicing: TimeSlicingSettings) -> Self {
        let by_name = devices
            .iter()
            .enumerate()
            .map(|(index, device)| (device.name.clone(), index))
            .collect();
        let entries = devices
            .into_iter()
            .map(|device| Entry {
                device,
                mode: None,
                held: BTreeSet::new(),
            })
            .collect();

        Self {
            entries,
            by_name,
            time_slicing,
        }
    }

    pub fn time_slicing(&self) -> &TimeSlicingSettings {
        &self.time_slicing
    }

    /// All devices in inventory order.
    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.entries.iter().map(|entry| &entry.device)
    }

    pub fn device(&self, name: &str) -> Option<&Device> {
        self.by_name.get(name).map(|&index| &self.entries[index].device)
    }

    /// Devices that can still take at least one more slot under the mode
    /// they are bound to. Unbound devices are always available.
    pub fn available(&self) -> Vec<&Device> {
        self.entries
            .iter()
            .filter(|entry| match entry.mode {
                Some(mode) => self.free_in(entry, mode) > 0,
                None => true,
            })
            .map(|entry| &entry.device)
            .collect()
    }

    /// Slots `device` could still hand out under `mode`. Zero when the
    /// device is bound to another mode.
    pub fn free_shares(&self, device: &str, mode: ShareMode) -> Result<u32, PoolError> {
        let entry = self.entry(device)?;
        Ok(self.free_in(entry, mode))
    }

    /// Reserve `shares` slots on `device`, lowest free indices first.
    pub fn reserve(
        &mut self,
        device: &str,
        mode: ShareMode,
        shares: u32,
    ) -> Result<Vec<u32>, PoolError> {
        let index = self.index(device)?;
        let capacity = self.capacity(&self.entries[index].device, mode);
        let entry = &self.entries[index];
        check_mode(entry, mode)?;

        let free = capacity.saturating_sub(entry.held.len() as u32);
        if free < shares {
            return Err(PoolError::Insufficient {
                device: device.to_string(),
                requested: shares,
                free,
            });
        }
        if shares == 0 {
            return Ok(Vec::new());
        }

        let slots: Vec<u32> = (0..capacity)
            .filter(|slot| !entry.held.contains(slot))
            .take(shares as usize)
            .collect();

        let entry = &mut self.entries[index];
        entry.held.extend(slots.iter().copied());
        entry.mode = Some(mode);
        debug!(device = %device, mode = %mode, slots = ?slots, "Reserved slots");
        Ok(slots)
    }

    /// Re-assert exactly `slots` on `device`. Used when restoring claims
    /// from the checkpoint.
    pub fn reserve_slots(
        &mut self,
        device: &str,
        mode: ShareMode,
        slots: &[u32],
    ) -> Result<(), PoolError> {
        let index = self.index(device)?;
        let capacity = self.capacity(&self.entries[index].device, mode);
        let entry = &self.entries[index];
        check_mode(entry, mode)?;

        let mut seen = BTreeSet::new();
        for &slot in slots {
            if slot >= capacity {
                return Err(PoolError::SlotOutOfRange {
                    device: device.to_string(),
                    slot,
                    capacity,
                });
            }
            if entry.held.contains(&slot) || !seen.insert(slot) {
                return Err(PoolError::SlotTaken {
                    device: device.to_string(),
                    slot,
                });
            }
        }
        if seen.is_empty() {
            return Ok(());
        }

        let entry = &mut self.entries[index];
        entry.held.extend(seen);
        entry.mode = Some(mode);
        Ok(())
    }

    /// Return `slots` on `device` to the pool. Releasing a slot that is not
    /// held is an error and leaves the pool untouched.
    pub fn release(&mut self, device: &str, slots: &[u32]) -> Result<(), PoolError> {
        let index = self.index(device)?;
        let entry = &self.entries[index];

        let mut seen = BTreeSet::new();
        for &slot in slots {
            if !entry.held.contains(&slot) || !seen.insert(slot) {
                return Err(PoolError::NotReserved {
                    device: device.to_string(),
                    slot,
                });
            }
        }

        let entry = &mut self.entries[index];
        for slot in &seen {
            entry.held.remove(slot);
        }
        if entry.held.is_empty() {
            entry.mode = None;
        }
        debug!(device = %device, slots = ?slots, "Released slots");
        Ok(())
    }

    pub fn snapshot(&self) -> Vec<DeviceUsage> {
        self.entries
            .iter()
            .map(|entry| DeviceUsage {
                name: entry.device.name.clone(),
                mode: entry.mode,
                slots: entry.held.iter().copied().collect(),
            })
            .collect()
    }

    fn capacity(&self, device: &Device, mode: ShareMode) -> u32 {
        match mode {
            ShareMode::SpacePartitioning => device.partitions,
            ShareMode::TimeSlicing { interval } => self.time_slicing.get(interval).max_tenants,
        }
    }

    fn free_in(&self, entry: &Entry, mode: ShareMode) -> u32 {
        if entry.mode.is_some_and(|bound| bound != mode) {
            return 0;
        }
        self.capacity(&entry.device, mode)
            .saturating_sub(entry.held.len() as u32)
    }

    fn index(&self, device: &str) -> Result<usize, PoolError> {
        self.by_name
            .get(device)
            .copied()
            .ok_or_else(|| PoolError::UnknownDevice(device.to_string()))
    }

    fn entry(&self, device: &str) -> Result<&Entry, PoolError> {
        self.index(device).map(|index| &self.entries[index])
    }
}

fn check_mode(entry: &Entry, requested: ShareMode) -> Result<(), PoolError> {
    match entry.mode {
        Some(bound) if bound != requested => Err(PoolError::ModeConflict {
            device: entry.device.name.clone(),
            bound,
            requested,
        }),
        _ => Ok(()),
    }
}
