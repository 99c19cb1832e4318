//! Simulated GPU inventory.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Model string every simulated GPU reports.
pub const DEVICE_MODEL: &str = "LATEST-GPU-MODEL";

/// One allocatable GPU on this node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Name the scheduler allocated, e.g. `gpu-3`
    pub name: String,
    pub uuid: Uuid,
    pub model: String,
    /// Exclusive partitions the device can be split into
    pub partitions: u32,
}

/// Enumerate the GPUs of `node_name`.
///
/// UUIDs are derived from the node name and index, so the same node always
/// reports the same devices across restarts.
pub fn enumerate_devices(node_name: &str, count: u32, partitions: u32) -> Vec<Device> {
    (0..count)
        .map(|index| {
            let name = format!("gpu-{index}");
            let uuid = Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("{node_name}/{name}").as_bytes());
            Device {
                name,
                uuid,
                model: DEVICE_MODEL.to_string(),
                partitions,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enumerate_devices() {
        let devices = enumerate_devices("node-a", 3, 4);
        let names: Vec<_> = devices.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["gpu-0", "gpu-1", "gpu-2"]);
        assert!(devices.iter().all(|d| d.partitions == 4));
    }

    #[test]
    fn test_uuids_stable_per_node() {
        let first = enumerate_devices("node-a", 2, 8);
        let again = enumerate_devices("node-a", 2, 8);
        let other = enumerate_devices("node-b", 2, 8);

        assert_eq!(first, again);
        assert_ne!(first[0].uuid, first[1].uuid);
        assert_ne!(first[0].uuid, other[0].uuid);
    }
}
