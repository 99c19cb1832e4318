//! Structured Events
//!
//! Provides structured event logging with consistent fields across the plugin.
//! Each event type has a dedicated function that ensures consistent field naming.
//!
//! Event types:
//! - `claim_prepared` - Devices prepared for a claim
//! - `claim_unprepared` - Claim released its devices
//! - `claim_prepare_failed` - Prepare rejected or failed
//! - `claim_restored` - Claim re-asserted from the checkpoint
//! - `claim_dropped` - Checkpointed claim could not be restored
//! - `checkpoint_recovered` - Startup reconciliation finished

use tracing::{error, info, warn};

/// Emit a claim prepared event
pub fn claim_prepared(claim_uid: &str, strategy: &str, devices: &[&str]) {
    info!(
        event_type = "claim_prepared",
        claim_uid = %claim_uid,
        strategy = %strategy,
        devices = %devices.join(","),
        "Claim prepared"
    );
}

/// Emit a claim unprepared event
pub fn claim_unprepared(claim_uid: &str, devices: &[&str]) {
    info!(
        event_type = "claim_unprepared",
        claim_uid = %claim_uid,
        devices = %devices.join(","),
        "Claim unprepared"
    );
}

/// Emit a claim prepare failed event
pub fn claim_prepare_failed(claim_uid: &str, kind: &str, error: &str) {
    warn!(
        event_type = "claim_prepare_failed",
        claim_uid = %claim_uid,
        kind = %kind,
        error = %error,
        "Claim prepare failed"
    );
}

/// Emit a claim restored event
pub fn claim_restored(claim_uid: &str, devices: &[&str]) {
    info!(
        event_type = "claim_restored",
        claim_uid = %claim_uid,
        devices = %devices.join(","),
        "Claim restored from checkpoint"
    );
}

/// Emit a claim dropped event
pub fn claim_dropped(claim_uid: &str, device: &str, reason: &str) {
    error!(
        event_type = "claim_dropped",
        claim_uid = %claim_uid,
        device = %device,
        reason = %reason,
        "Claim dropped during recovery"
    );
}

/// Emit a checkpoint recovered event
pub fn checkpoint_recovered(path: &str, restored: usize, dropped: usize) {
    info!(
        event_type = "checkpoint_recovered",
        path = %path,
        restored = restored,
        dropped = dropped,
        "Checkpoint recovered"
    );
}
