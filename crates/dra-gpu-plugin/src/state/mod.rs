//! Claim State
//!
//! - `prepared`: records describing what was prepared for each claim
//! - `checkpoint`: versioned, checksummed on-disk copy of those records
//! - `store`: the in-memory map kept in lockstep with the checkpoint

mod checkpoint;
mod prepared;
mod store;

pub use checkpoint::{
    Checkpoint, CheckpointError, Claims, CHECKPOINT_FILE_NAME, CHECKPOINT_VERSION, LOCK_FILE_NAME,
};
pub use prepared::{AppliedSharing, ClaimUid, DeviceDescriptor, PreparedClaim, PreparedDevice};
pub use store::ClaimStore;
