//! Concurrent prepare/unprepare against one shared `DeviceState`.

use dra_gpu_api::{GpuConfig, GpuSharing, TimeSliceInterval};
use dra_gpu_plugin::{ClaimUid, DeviceRequest, DeviceState, ErrorKind, PluginConfig};
use futures::future::join_all;
use std::sync::Arc;

async fn open(dir: &std::path::Path, devices: u32, partitions: u32) -> Arc<DeviceState> {
    let config = PluginConfig {
        node_name: "node-a".to_string(),
        num_devices: devices,
        partitions_per_device: partitions,
        plugin_data_dir: dir.to_path_buf(),
        ..Default::default()
    };
    let (state, _) = DeviceState::open(&config).await.unwrap();
    Arc::new(state)
}

fn space_partitioning(count: i32) -> DeviceRequest {
    DeviceRequest::with_config(GpuConfig {
        sharing: Some(GpuSharing::space_partitioning(count)),
        ..Default::default()
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_claims_filling_capacity_all_succeed() {
    let dir = tempfile::tempdir().unwrap();
    let state = open(dir.path(), 4, 4).await;

    // 16 partitions in total, requested in uneven pieces.
    let counts = [3, 5, 2, 1, 4, 1];
    let tasks = counts.iter().enumerate().map(|(i, &count)| {
        let state = state.clone();
        tokio::spawn(async move {
            state
                .prepare(&ClaimUid::from(format!("claim-{i}")), space_partitioning(count))
                .await
        })
    });

    for result in join_all(tasks).await {
        result.unwrap().unwrap();
    }

    let usage = state.pool_snapshot().await;
    assert!(usage.iter().all(|u| u.slots.len() == 4));

    let err = state
        .prepare(&ClaimUid::from("one-more"), space_partitioning(1))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Capacity);
    assert_eq!(state.pool_snapshot().await, usage);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_tenant_slots_never_oversubscribed() {
    let dir = tempfile::tempdir().unwrap();
    // Short allows eight tenants per device with the default settings.
    let state = open(dir.path(), 2, 4).await;

    let tasks = (0..20).map(|i| {
        let state = state.clone();
        tokio::spawn(async move {
            let request = DeviceRequest::with_config(GpuConfig {
                sharing: Some(GpuSharing::time_slicing(TimeSliceInterval::Short)),
                ..Default::default()
            });
            state.prepare(&ClaimUid::from(format!("claim-{i}")), request).await
        })
    });

    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();
    let prepared = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(prepared, 16);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| e.kind() == ErrorKind::Capacity));

    assert_eq!(state.prepared_claims().await.len(), 16);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_interleaved_prepare_unprepare_settles_empty() {
    let dir = tempfile::tempdir().unwrap();
    let state = open(dir.path(), 2, 4).await;
    let empty = state.pool_snapshot().await;

    let tasks = (0..8).map(|i| {
        let state = state.clone();
        tokio::spawn(async move {
            let uid = ClaimUid::from(format!("claim-{}", i % 4));
            for _ in 0..5 {
                // Capacity errors are expected while other tasks hold slots.
                let _ = state.prepare(&uid, space_partitioning(2)).await;
                state.unprepare(&uid).await.unwrap();
            }
        })
    });
    for joined in join_all(tasks).await {
        joined.unwrap();
    }

    assert_eq!(state.pool_snapshot().await, empty);
    assert!(state.prepared_claims().await.is_empty());
}
