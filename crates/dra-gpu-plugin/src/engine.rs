//! Preparation Engine
//!
//! `DeviceState` owns the device pool and the claim store behind one async
//! mutex. Every prepare and unprepare runs to completion while holding it,
//! including the checkpoint write, so concurrent calls observe each other's
//! effects in a single total order.
//!
//! Once the lock is taken the operation moves into its own task together
//! with the owned guard. Dropping the caller's future (a timed out RPC, for
//! example) then only stops the wait for the result, never the operation.
//!
//! A claim moves Unprepared -> Preparing -> Prepared -> Unpreparing ->
//! Unprepared. The intermediate states only exist inside the critical
//! section; a failure in either direction restores the state it started in.

use crate::config::PluginConfig;
use crate::device::{enumerate_devices, DevicePool, DeviceUsage, ShareMode};
use crate::error::{CapacityError, PluginError};
use crate::observability::events;
use crate::recovery::{self, RecoveryReport};
use crate::state::{
    AppliedSharing, Checkpoint, ClaimStore, ClaimUid, Claims, PreparedClaim, PreparedDevice,
};
use dra_gpu_api::v1alpha1::normalize;
use dra_gpu_api::{default_gpu_config, GpuConfig, ResolvedSharing};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info};
use uuid::Uuid;

/// What the node agent asks for when preparing a claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRequest {
    /// Opaque configuration from the claim; `None` uses the default config
    #[serde(default)]
    pub config: Option<GpuConfig>,
    /// Devices to time-share. Ignored for space partitioning, which is sized
    /// by the partition count.
    #[serde(default = "default_count")]
    pub count: u32,
}

fn default_count() -> u32 {
    1
}

impl Default for DeviceRequest {
    fn default() -> Self {
        Self {
            config: None,
            count: default_count(),
        }
    }
}

impl DeviceRequest {
    pub fn new(config: Option<GpuConfig>, count: u32) -> Self {
        Self { config, count }
    }

    pub fn with_config(config: GpuConfig) -> Self {
        Self {
            config: Some(config),
            ..Self::default()
        }
    }
}

/// One device's share of a planned allocation.
struct Placement {
    device: String,
    uuid: Uuid,
    shares: u32,
}

#[derive(Debug)]
struct Inner {
    pool: DevicePool,
    store: ClaimStore,
}

/// Node-local device state: the single entry point for prepare/unprepare.
#[derive(Debug)]
pub struct DeviceState {
    inner: Arc<Mutex<Inner>>,
}

impl DeviceState {
    /// Enumerate devices for `config` and recover from its checkpoint.
    pub async fn open(config: &PluginConfig) -> Result<(Self, RecoveryReport), PluginError> {
        let devices = enumerate_devices(
            &config.node_name,
            config.num_devices,
            config.partitions_per_device,
        );
        info!(
            node = %config.node_name,
            devices = devices.len(),
            partitions = config.partitions_per_device,
            "Enumerated devices"
        );
        let pool = DevicePool::new(devices, config.time_slicing.clone());
        let checkpoint = Checkpoint::open(&config.plugin_data_dir).await?;
        Self::recover(pool, checkpoint).await
    }

    /// Build the state from an existing pool, restoring claims from
    /// `checkpoint`.
    pub async fn recover(
        mut pool: DevicePool,
        checkpoint: Checkpoint,
    ) -> Result<(Self, RecoveryReport), PluginError> {
        let (claims, report) = recovery::recover(&mut pool, &checkpoint).await?;
        let state = Self {
            inner: Arc::new(Mutex::new(Inner {
                pool,
                store: ClaimStore::new(checkpoint, claims),
            })),
        };
        Ok((state, report))
    }

    /// Prepare devices for `uid`.
    ///
    /// Preparing an already prepared claim returns the recorded devices
    /// without touching anything.
    pub async fn prepare(
        &self,
        uid: &ClaimUid,
        request: DeviceRequest,
    ) -> Result<Vec<PreparedDevice>, PluginError> {
        let uid = uid.clone();
        self.run_locked(move |mut inner| async move { inner.prepare_claim(&uid, request).await })
            .await
    }

    /// Release everything prepared for `uid`. Unknown claims are a no-op.
    pub async fn unprepare(&self, uid: &ClaimUid) -> Result<(), PluginError> {
        let uid = uid.clone();
        self.run_locked(move |mut inner| async move { inner.unprepare_claim(&uid).await })
            .await
    }

    /// Take the lock, then run `body` on its own task so it completes even
    /// if this future is dropped.
    async fn run_locked<T, F, Fut>(&self, body: F) -> Result<T, PluginError>
    where
        F: FnOnce(OwnedMutexGuard<Inner>) -> Fut,
        Fut: Future<Output = Result<T, PluginError>> + Send + 'static,
        T: Send + 'static,
    {
        let guard = self.inner.clone().lock_owned().await;
        match tokio::spawn(body(guard)).await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(PluginError::Interrupted(e)),
        }
    }

    pub async fn get(&self, uid: &ClaimUid) -> Option<PreparedClaim> {
        self.inner.lock().await.store.get(uid).cloned()
    }

    pub async fn prepared_claims(&self) -> Claims {
        self.inner.lock().await.store.claims().clone()
    }

    pub async fn pool_snapshot(&self) -> Vec<DeviceUsage> {
        self.inner.lock().await.pool.snapshot()
    }

    pub async fn checkpoint_path(&self) -> PathBuf {
        self.inner.lock().await.store.checkpoint().path().to_path_buf()
    }

    /// Rewrite the checkpoint from memory. Called on shutdown.
    pub async fn flush(&self) -> Result<(), PluginError> {
        self.inner.lock().await.store.flush().await?;
        Ok(())
    }
}

impl Inner {
    async fn prepare_claim(
        &mut self,
        uid: &ClaimUid,
        request: DeviceRequest,
    ) -> Result<Vec<PreparedDevice>, PluginError> {
        if let Some(existing) = self.store.get(uid) {
            debug!(claim_uid = %uid, "Claim already prepared");
            return Ok(existing.devices.clone());
        }

        match self.allocate(uid, request).await {
            Ok(devices) => {
                let names: Vec<&str> = devices.iter().map(|d| d.device.as_str()).collect();
                let strategy = devices
                    .first()
                    .map(|d| d.sharing.strategy().as_str())
                    .unwrap_or_default();
                events::claim_prepared(uid.as_str(), strategy, &names);
                Ok(devices)
            }
            Err(e) => {
                events::claim_prepare_failed(uid.as_str(), &e.kind().to_string(), &e.to_string());
                Err(e)
            }
        }
    }

    async fn unprepare_claim(&mut self, uid: &ClaimUid) -> Result<(), PluginError> {
        let Some(claim) = self.store.get(uid).cloned() else {
            debug!(claim_uid = %uid, "Claim not prepared, nothing to release");
            return Ok(());
        };

        let mut released: Vec<&PreparedDevice> = Vec::new();
        for device in &claim.devices {
            if let Err(e) = self.pool.release(&device.device, &device.slots()) {
                self.restore(&released);
                return Err(PluginError::Invariant(e));
            }
            released.push(device);
        }

        if let Err(e) = self.store.remove(uid).await {
            self.restore(&released);
            return Err(e.into());
        }

        events::claim_unprepared(uid.as_str(), &claim.device_names());
        Ok(())
    }

    async fn allocate(
        &mut self,
        uid: &ClaimUid,
        request: DeviceRequest,
    ) -> Result<Vec<PreparedDevice>, PluginError> {
        let mut config = request.config.unwrap_or_else(default_gpu_config);
        normalize(Some(&mut config))?;
        config.validate()?;
        let sharing = config.resolve()?;

        let (mode, placements) = self.plan(sharing, request.count)?;
        let devices = self.reserve(sharing, mode, placements)?;

        if let Err(e) = self
            .store
            .insert(uid.clone(), PreparedClaim::new(devices.clone()))
            .await
        {
            self.rollback(&devices);
            return Err(e.into());
        }
        Ok(devices)
    }

    /// Pick devices for `sharing` without reserving anything.
    fn plan(
        &self,
        sharing: ResolvedSharing,
        count: u32,
    ) -> Result<(ShareMode, Vec<Placement>), PluginError> {
        let mut placements = Vec::new();

        let mode = match sharing {
            ResolvedSharing::TimeSlicing { interval } => {
                if count == 0 {
                    return Err(PluginError::InvalidRequest(
                        "device count must be at least 1".to_string(),
                    ));
                }
                let mode = ShareMode::TimeSlicing { interval };
                for device in self.pool.devices() {
                    if placements.len() == count as usize {
                        break;
                    }
                    let free = self
                        .pool
                        .free_shares(&device.name, mode)
                        .map_err(PluginError::Invariant)?;
                    if free > 0 {
                        placements.push(Placement {
                            device: device.name.clone(),
                            uuid: device.uuid,
                            shares: 1,
                        });
                    }
                }
                if placements.len() < count as usize {
                    return Err(self.capacity_error(sharing, count).into());
                }
                mode
            }
            ResolvedSharing::SpacePartitioning { partition_count } => {
                let mode = ShareMode::SpacePartitioning;
                let mut remaining = partition_count;
                for device in self.pool.devices() {
                    if remaining == 0 {
                        break;
                    }
                    let free = self
                        .pool
                        .free_shares(&device.name, mode)
                        .map_err(PluginError::Invariant)?;
                    let shares = free.min(remaining);
                    if shares > 0 {
                        placements.push(Placement {
                            device: device.name.clone(),
                            uuid: device.uuid,
                            shares,
                        });
                        remaining -= shares;
                    }
                }
                if remaining > 0 {
                    return Err(self.capacity_error(sharing, partition_count).into());
                }
                mode
            }
        };

        Ok((mode, placements))
    }

    /// Reserve every placement, or none of them.
    fn reserve(
        &mut self,
        sharing: ResolvedSharing,
        mode: ShareMode,
        placements: Vec<Placement>,
    ) -> Result<Vec<PreparedDevice>, PluginError> {
        let requested = placements.iter().map(|p| p.shares).sum();
        let mut devices = Vec::with_capacity(placements.len());

        for placement in placements {
            match self.pool.reserve(&placement.device, mode, placement.shares) {
                Ok(slots) => devices.push(self.applied(sharing, placement, slots)),
                Err(e) => {
                    error!(
                        device = %placement.device,
                        error = %e,
                        "Reservation failed after planning"
                    );
                    self.rollback(&devices);
                    return Err(self.capacity_error(sharing, requested).into());
                }
            }
        }
        Ok(devices)
    }

    fn applied(
        &self,
        sharing: ResolvedSharing,
        placement: Placement,
        slots: Vec<u32>,
    ) -> PreparedDevice {
        let sharing = match sharing {
            ResolvedSharing::TimeSlicing { interval } => AppliedSharing::TimeSlicing {
                interval,
                slice_ms: self.pool.time_slicing().get(interval).slice_ms,
                tenant: slots.first().copied().unwrap_or_default(),
            },
            ResolvedSharing::SpacePartitioning { partition_count } => {
                AppliedSharing::SpacePartitioning {
                    partition_count,
                    partitions: slots,
                }
            }
        };
        PreparedDevice {
            device: placement.device,
            uuid: placement.uuid,
            sharing,
        }
    }

    fn capacity_error(&self, sharing: ResolvedSharing, requested: u32) -> CapacityError {
        let available = match sharing {
            ResolvedSharing::TimeSlicing { interval } => {
                let mode = ShareMode::TimeSlicing { interval };
                self.pool
                    .devices()
                    .filter(|d| self.pool.free_shares(&d.name, mode).unwrap_or(0) > 0)
                    .count() as u32
            }
            ResolvedSharing::SpacePartitioning { .. } => self
                .pool
                .devices()
                .map(|d| {
                    self.pool
                        .free_shares(&d.name, ShareMode::SpacePartitioning)
                        .unwrap_or(0)
                })
                .sum(),
        };
        CapacityError {
            strategy: sharing.strategy(),
            requested,
            available,
        }
    }

    /// Release reservations made for a claim that is not going to be
    /// recorded.
    fn rollback(&mut self, devices: &[PreparedDevice]) {
        for device in devices.iter().rev() {
            if let Err(e) = self.pool.release(&device.device, &device.slots()) {
                error!(device = %device.device, error = %e, "Failed to roll back reservation");
            }
        }
    }

    /// Put back slots released for a claim that is still recorded.
    fn restore(&mut self, devices: &[&PreparedDevice]) {
        for device in devices {
            if let Err(e) = self
                .pool
                .reserve_slots(&device.device, device.mode(), &device.slots())
            {
                error!(device = %device.device, error = %e, "Failed to restore reservation");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::state::CheckpointError;
    use dra_gpu_api::{GpuSharing, StringEnum, TimeSliceInterval};
    use futures::FutureExt;
    use std::path::Path;

    fn plugin_config(dir: &Path, devices: u32, partitions: u32) -> PluginConfig {
        PluginConfig {
            node_name: "node-a".to_string(),
            num_devices: devices,
            partitions_per_device: partitions,
            plugin_data_dir: dir.join("state"),
            ..Default::default()
        }
    }

    fn time_slicing(interval: TimeSliceInterval) -> GpuConfig {
        GpuConfig {
            sharing: Some(GpuSharing::time_slicing(interval)),
            ..Default::default()
        }
    }

    fn space_partitioning(count: i32) -> GpuConfig {
        GpuConfig {
            sharing: Some(GpuSharing::space_partitioning(count)),
            ..Default::default()
        }
    }

    async fn open(dir: &Path, devices: u32, partitions: u32) -> DeviceState {
        let (state, _) = DeviceState::open(&plugin_config(dir, devices, partitions))
            .await
            .unwrap();
        state
    }

    #[tokio::test]
    async fn test_prepare_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let state = open(dir.path(), 2, 4).await;

        let devices = state
            .prepare(&ClaimUid::from("a"), DeviceRequest::default())
            .await
            .unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].device, "gpu-0");
        assert_eq!(
            devices[0].sharing,
            AppliedSharing::TimeSlicing {
                interval: TimeSliceInterval::Default,
                slice_ms: 2,
                tenant: 0
            }
        );
    }

    #[tokio::test]
    async fn test_prepare_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let state = open(dir.path(), 2, 4).await;
        let uid = ClaimUid::from("a");

        let first = state
            .prepare(&uid, DeviceRequest::with_config(space_partitioning(3)))
            .await
            .unwrap();
        let snapshot = state.pool_snapshot().await;

        // A different request for the same claim still returns the record.
        let second = state
            .prepare(&uid, DeviceRequest::with_config(space_partitioning(1)))
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(state.pool_snapshot().await, snapshot);
        assert_eq!(state.prepared_claims().await.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_config_mutates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let state = open(dir.path(), 2, 4).await;
        let before = state.pool_snapshot().await;

        let bogus = GpuConfig {
            sharing: Some(GpuSharing {
                strategy: StringEnum::from("Bogus"),
                ..Default::default()
            }),
            ..Default::default()
        };
        let err = state
            .prepare(&ClaimUid::from("a"), DeviceRequest::with_config(bogus))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert_eq!(err.to_string(), "unknown GPU sharing strategy: Bogus");

        let err = state
            .prepare(
                &ClaimUid::from("b"),
                DeviceRequest::with_config(space_partitioning(0)),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);

        assert_eq!(state.pool_snapshot().await, before);
        assert!(state.prepared_claims().await.is_empty());
        assert!(!state.checkpoint_path().await.exists());
    }

    #[tokio::test]
    async fn test_zero_count_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = open(dir.path(), 2, 4).await;

        let err = state
            .prepare(
                &ClaimUid::from("a"),
                DeviceRequest::new(Some(time_slicing(TimeSliceInterval::Short)), 0),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::InvalidRequest(_)));
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[tokio::test]
    async fn test_unprepare_unknown_claim() {
        let dir = tempfile::tempdir().unwrap();
        let state = open(dir.path(), 1, 4).await;

        state.unprepare(&ClaimUid::from("missing")).await.unwrap();
        assert!(state.pool_snapshot().await.iter().all(|u| u.slots.is_empty()));
    }

    #[tokio::test]
    async fn test_unprepare_returns_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let state = open(dir.path(), 1, 4).await;
        let before = state.pool_snapshot().await;

        state
            .prepare(
                &ClaimUid::from("a"),
                DeviceRequest::with_config(space_partitioning(4)),
            )
            .await
            .unwrap();
        state.unprepare(&ClaimUid::from("a")).await.unwrap();

        assert_eq!(state.pool_snapshot().await, before);
        assert!(state.get(&ClaimUid::from("a")).await.is_none());
    }

    #[tokio::test]
    async fn test_tenant_bound_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let state = open(dir.path(), 1, 4).await;
        let long = || DeviceRequest::with_config(time_slicing(TimeSliceInterval::Long));

        state.prepare(&ClaimUid::from("a"), long()).await.unwrap();
        let second = state.prepare(&ClaimUid::from("b"), long()).await.unwrap();
        assert_eq!(second[0].slots(), [1]);

        let err = state.prepare(&ClaimUid::from("c"), long()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Capacity);
        assert!(matches!(
            err,
            PluginError::Capacity(CapacityError {
                requested: 1,
                available: 0,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_time_slicing_spreads_over_distinct_devices() {
        let dir = tempfile::tempdir().unwrap();
        let state = open(dir.path(), 3, 4).await;

        let devices = state
            .prepare(
                &ClaimUid::from("a"),
                DeviceRequest::new(Some(time_slicing(TimeSliceInterval::Short)), 2),
            )
            .await
            .unwrap();
        let names: Vec<_> = devices.iter().map(|d| d.device.as_str()).collect();
        assert_eq!(names, ["gpu-0", "gpu-1"]);

        let err = state
            .prepare(
                &ClaimUid::from("b"),
                DeviceRequest::new(Some(time_slicing(TimeSliceInterval::Short)), 4),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Capacity);
    }

    #[tokio::test]
    async fn test_mode_conflict_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = open(dir.path(), 1, 4).await;

        state
            .prepare(
                &ClaimUid::from("a"),
                DeviceRequest::with_config(time_slicing(TimeSliceInterval::Short)),
            )
            .await
            .unwrap();
        let before = state.pool_snapshot().await;

        for config in [
            space_partitioning(1),
            time_slicing(TimeSliceInterval::Long),
        ] {
            let err = state
                .prepare(&ClaimUid::from("b"), DeviceRequest::with_config(config))
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Capacity);
        }
        assert_eq!(state.pool_snapshot().await, before);
    }

    #[tokio::test]
    async fn test_partitions_span_devices() {
        let dir = tempfile::tempdir().unwrap();
        let state = open(dir.path(), 2, 4).await;

        state
            .prepare(
                &ClaimUid::from("a"),
                DeviceRequest::with_config(space_partitioning(3)),
            )
            .await
            .unwrap();
        let devices = state
            .prepare(
                &ClaimUid::from("b"),
                DeviceRequest::with_config(space_partitioning(3)),
            )
            .await
            .unwrap();

        assert_eq!(devices.len(), 2);
        assert_eq!((devices[0].device.as_str(), devices[0].slots()), ("gpu-0", vec![3]));
        assert_eq!((devices[1].device.as_str(), devices[1].slots()), ("gpu-1", vec![0, 1]));

        let claim = state.get(&ClaimUid::from("b")).await.unwrap();
        let descriptors = claim.descriptors();
        assert_eq!(descriptors[1].env["GPU_DEVICE_1_PARTITIONS"], "0,1");
        assert_eq!(descriptors[1].env["GPU_DEVICE_1_PARTITION_COUNT"], "3");

        let err = state
            .prepare(
                &ClaimUid::from("c"),
                DeviceRequest::with_config(space_partitioning(3)),
            )
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "insufficient capacity for SpacePartitioning: requested 3, available 2"
        );
    }

    #[tokio::test]
    async fn test_durability_failure_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let state = open(dir.path(), 2, 4).await;
        let kept = ClaimUid::from("kept");

        state
            .prepare(&kept, DeviceRequest::with_config(space_partitioning(2)))
            .await
            .unwrap();
        let before = state.pool_snapshot().await;

        std::fs::remove_dir_all(dir.path().join("state")).unwrap();

        let err = state
            .prepare(
                &ClaimUid::from("lost"),
                DeviceRequest::with_config(space_partitioning(2)),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Durability);
        assert_eq!(state.pool_snapshot().await, before);
        assert!(state.get(&ClaimUid::from("lost")).await.is_none());

        let err = state.unprepare(&kept).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Durability);
        assert_eq!(state.pool_snapshot().await, before);
        assert!(state.get(&kept).await.is_some());
    }

    #[tokio::test]
    async fn test_dropped_prepare_runs_to_completion() {
        let dir = tempfile::tempdir().unwrap();
        let state = open(dir.path(), 1, 4).await;
        let a = ClaimUid::from("a");

        // Polled once, then abandoned by the caller.
        drop(
            state
                .prepare(&a, DeviceRequest::with_config(space_partitioning(4)))
                .now_or_never(),
        );

        let claim = state.get(&a).await.expect("claim recorded");
        assert_eq!(claim.devices[0].slots(), [0, 1, 2, 3]);
        assert_eq!(state.pool_snapshot().await[0].slots, [0, 1, 2, 3]);
        let on_disk = std::fs::read_to_string(state.checkpoint_path().await).unwrap();
        assert!(on_disk.contains("\"a\""));

        // Nothing leaked: releasing it frees the whole device.
        state.unprepare(&a).await.unwrap();
        state
            .prepare(
                &ClaimUid::from("b"),
                DeviceRequest::with_config(space_partitioning(4)),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_dropped_unprepare_runs_to_completion() {
        let dir = tempfile::tempdir().unwrap();
        let state = open(dir.path(), 1, 4).await;
        let a = ClaimUid::from("a");
        let b = ClaimUid::from("b");

        state
            .prepare(&a, DeviceRequest::with_config(space_partitioning(4)))
            .await
            .unwrap();
        drop(state.unprepare(&a).now_or_never());

        let devices = state
            .prepare(&b, DeviceRequest::with_config(space_partitioning(4)))
            .await
            .unwrap();
        assert_eq!(devices[0].slots(), [0, 1, 2, 3]);
        assert!(state.get(&a).await.is_none());
        assert_eq!(
            state.prepared_claims().await.keys().collect::<Vec<_>>(),
            [&b]
        );
    }

    #[tokio::test]
    async fn test_second_state_on_same_dir_refused() {
        let dir = tempfile::tempdir().unwrap();
        let state = open(dir.path(), 1, 4).await;

        let err = DeviceState::open(&plugin_config(dir.path(), 1, 4))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Durability);
        assert!(matches!(
            err,
            PluginError::Durability(CheckpointError::Locked { .. })
        ));

        drop(state);
        open(dir.path(), 1, 4).await;
    }

    #[test]
    fn test_request_count_defaults_to_one() {
        let request: DeviceRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request, DeviceRequest::default());

        let request: DeviceRequest = serde_json::from_str(r#"{"count": 3}"#).unwrap();
        assert_eq!(request.count, 3);
        assert!(request.config.is_none());
    }

    #[tokio::test]
    async fn test_flush_writes_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let state = open(dir.path(), 1, 4).await;
        let path = state.checkpoint_path().await;
        assert!(!path.exists());

        state.flush().await.unwrap();
        assert!(path.exists());
    }
}
