//! Startup Recovery
//!
//! Rebuilds pool usage from the checkpoint. Each checkpointed claim has its
//! exact slots re-asserted; a claim naming a device that no longer exists
//! (by name or by UUID), or whose slots no longer fit, is dropped as a whole
//! and the pruned checkpoint is written back.

use crate::device::{DevicePool, PoolError};
use crate::error::ConflictError;
use crate::observability::events;
use crate::state::{Checkpoint, CheckpointError, ClaimUid, Claims, PreparedClaim, PreparedDevice};
use tracing::error;

/// Outcome of reconciling the checkpoint against the device pool.
#[derive(Debug, Default)]
pub struct RecoveryReport {
    pub restored: Vec<ClaimUid>,
    pub dropped: Vec<ConflictError>,
}

/// Load `checkpoint` and re-reserve every claim in `pool`.
///
/// Returns the surviving claims. A missing checkpoint yields empty state.
pub async fn recover(
    pool: &mut DevicePool,
    checkpoint: &Checkpoint,
) -> Result<(Claims, RecoveryReport), CheckpointError> {
    let loaded = checkpoint.load().await?.unwrap_or_default();
    let mut claims = Claims::new();
    let mut report = RecoveryReport::default();

    for (uid, claim) in loaded {
        match restore_claim(pool, &claim) {
            Ok(()) => {
                events::claim_restored(uid.as_str(), &claim.device_names());
                report.restored.push(uid.clone());
                claims.insert(uid, claim);
            }
            Err((device, reason)) => {
                events::claim_dropped(uid.as_str(), &device, &reason.to_string());
                report.dropped.push(ConflictError {
                    claim: uid,
                    device,
                    reason,
                });
            }
        }
    }

    if !report.dropped.is_empty() {
        checkpoint.store(&claims).await?;
    }

    events::checkpoint_recovered(
        &checkpoint.path().display().to_string(),
        report.restored.len(),
        report.dropped.len(),
    );
    Ok((claims, report))
}

/// Reserve all slots of `claim`, or none of them.
fn restore_claim(pool: &mut DevicePool, claim: &PreparedClaim) -> Result<(), (String, PoolError)> {
    let mut applied: Vec<&PreparedDevice> = Vec::new();

    for device in &claim.devices {
        let reserved = match pool.device(&device.device) {
            Some(current) if current.uuid != device.uuid => Err(PoolError::DeviceChanged {
                device: device.device.clone(),
                recorded: device.uuid,
                found: current.uuid,
            }),
            _ => pool.reserve_slots(&device.device, device.mode(), &device.slots()),
        };
        if let Err(reason) = reserved {
            for done in applied.iter().rev() {
                if let Err(e) = pool.release(&done.device, &done.slots()) {
                    error!(device = %done.device, error = %e, "Failed to undo partial restore");
                }
            }
            return Err((device.device.clone(), reason));
        }
        applied.push(device);
    }
    Ok(())
}
