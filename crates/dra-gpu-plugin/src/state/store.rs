//! In-memory claim store backed by the checkpoint.
//!
//! Every mutation is written to the checkpoint first and only committed to
//! memory once the write succeeded, so memory never runs ahead of disk.

use super::checkpoint::{Checkpoint, CheckpointError, Claims};
use super::{ClaimUid, PreparedClaim};

#[derive(Debug)]
pub struct ClaimStore {
    claims: Claims,
    checkpoint: Checkpoint,
}

impl ClaimStore {
    pub fn new(checkpoint: Checkpoint, claims: Claims) -> Self {
        Self { claims, checkpoint }
    }

    pub fn get(&self, uid: &ClaimUid) -> Option<&PreparedClaim> {
        self.claims.get(uid)
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    pub async fn insert(
        &mut self,
        uid: ClaimUid,
        claim: PreparedClaim,
    ) -> Result<(), CheckpointError> {
        let mut next = self.claims.clone();
        next.insert(uid, claim);
        self.commit(next).await
    }

    pub async fn remove(&mut self, uid: &ClaimUid) -> Result<Option<PreparedClaim>, CheckpointError> {
        let mut next = self.claims.clone();
        let removed = next.remove(uid);
        if removed.is_some() {
            self.commit(next).await?;
        }
        Ok(removed)
    }

    /// Rewrite the checkpoint from memory.
    pub async fn flush(&self) -> Result<(), CheckpointError> {
        self.checkpoint.store(&self.claims).await
    }

    async fn commit(&mut self, next: Claims) -> Result<(), CheckpointError> {
        self.checkpoint.store(&next).await?;
        self.claims = next;
        Ok(())
    }
}
