//! Checkpoint file.
//!
//! File format (JSON):
//! - `version`: schema version, currently `v1`
//! - `checksum`: xxhash64 of the JSON encoding of `claims`
//! - `claims`: prepared claims keyed by claim UID
//!
//! Writes go to a sibling temp file which is fsynced and then renamed over
//! the checkpoint, so readers see either the old or the new file. The
//! directory is fsynced after the rename.
//!
//! A handle holds an exclusive lock on `checkpoint.lock` in the same
//! directory for as long as it (or any clone) lives. A second handle on the
//! directory fails to open, in this process or another one.

use super::{ClaimUid, PreparedClaim};
use fs4::fs_std::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error};

pub const CHECKPOINT_FILE_NAME: &str = "checkpoint.json";
pub const CHECKPOINT_VERSION: &str = "v1";
pub const LOCK_FILE_NAME: &str = "checkpoint.lock";

/// Prepared claims as persisted.
pub type Claims = BTreeMap<ClaimUid, PreparedClaim>;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("failed to {op} {path}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("checkpoint directory {path} is locked by another writer")]
    Locked { path: PathBuf },

    #[error("checkpoint {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("failed to encode checkpoint: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Serialize, Deserialize)]
struct CheckpointFile {
    version: String,
    checksum: u64,
    claims: Claims,
}

/// Handle on the checkpoint file inside the plugin data directory.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    dir: PathBuf,
    path: PathBuf,
    _lock: Arc<std::fs::File>,
}

impl Checkpoint {
    /// Use `dir` for the checkpoint, creating it if needed, and take the
    /// writer lock. Fails with `Locked` if another handle holds it.
    pub async fn open(dir: &Path) -> Result<Self, CheckpointError> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| CheckpointError::Io {
                op: "create directory",
                path: dir.to_path_buf(),
                source,
            })?;
        let lock = lock_dir(dir)?;
        debug!(dir = %dir.display(), "Acquired checkpoint lock");
        Ok(Self {
            dir: dir.to_path_buf(),
            path: dir.join(CHECKPOINT_FILE_NAME),
            _lock: Arc::new(lock),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the checkpoint. `None` when no checkpoint was ever written.
    pub async fn load(&self) -> Result<Option<Claims>, CheckpointError> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(CheckpointError::Io {
                    op: "read",
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let file: CheckpointFile =
            serde_json::from_slice(&data).map_err(|e| self.corrupt(e.to_string()))?;

        if file.version != CHECKPOINT_VERSION {
            return Err(self.corrupt(format!(
                "unsupported version {} (expected {})",
                file.version, CHECKPOINT_VERSION
            )));
        }

        let computed = checksum(&file.claims)?;
        if computed != file.checksum {
            error!(
                path = %self.path.display(),
                stored = file.checksum,
                computed = computed,
                "Checkpoint checksum mismatch"
            );
            return Err(self.corrupt(format!(
                "checksum mismatch: stored={:#x}, computed={:#x}",
                file.checksum, computed
            )));
        }

        Ok(Some(file.claims))
    }

    /// Atomically replace the checkpoint with `claims`.
    pub async fn store(&self, claims: &Claims) -> Result<(), CheckpointError> {
        let file = CheckpointFile {
            version: CHECKPOINT_VERSION.to_string(),
            checksum: checksum(claims)?,
            claims: claims.clone(),
        };
        let data = serde_json::to_vec_pretty(&file)?;

        let temp_path = self.path.with_extension("json.tmp");
        if let Err(e) = self.replace_with(&temp_path, &data).await {
            discard(&temp_path).await;
            return Err(e);
        }

        // Persist the rename itself.
        tokio::fs::File::open(&self.dir)
            .await
            .map_err(io_err("open directory", &self.dir))?
            .sync_all()
            .await
            .map_err(io_err("sync directory", &self.dir))?;

        debug!(path = %self.path.display(), claims = claims.len(), "Checkpoint written");
        Ok(())
    }

    async fn replace_with(&self, temp_path: &Path, data: &[u8]) -> Result<(), CheckpointError> {
        let mut temp = tokio::fs::File::create(temp_path)
            .await
            .map_err(io_err("create", temp_path))?;
        temp.write_all(data)
            .await
            .map_err(io_err("write", temp_path))?;
        temp.sync_all()
            .await
            .map_err(io_err("sync", temp_path))?;
        drop(temp);

        tokio::fs::rename(temp_path, &self.path)
            .await
            .map_err(io_err("rename", &self.path))
    }

    fn corrupt(&self, reason: String) -> CheckpointError {
        CheckpointError::Corrupt {
            path: self.path.clone(),
            reason,
        }
    }
}

fn io_err(op: &'static str, path: &Path) -> impl FnOnce(std::io::Error) -> CheckpointError {
    let path = path.to_path_buf();
    move |source| CheckpointError::Io { op, path, source }
}

fn lock_dir(dir: &Path) -> Result<std::fs::File, CheckpointError> {
    let path = dir.join(LOCK_FILE_NAME);
    let file = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .map_err(|source| CheckpointError::Io {
            op: "open",
            path: path.clone(),
            source,
        })?;

    match file.try_lock_exclusive() {
        Ok(()) => Ok(file),
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Err(CheckpointError::Locked {
            path: dir.to_path_buf(),
        }),
        Err(source) => Err(CheckpointError::Io {
            op: "lock",
            path,
            source,
        }),
    }
}

/// Remove a temp file left by a failed write.
async fn discard(temp_path: &Path) {
    match tokio::fs::remove_file(temp_path).await {
        Ok(()) => debug!(path = %temp_path.display(), "Removed partial checkpoint"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => error!(
            path = %temp_path.display(),
            error = %e,
            "Failed to remove partial checkpoint"
        ),
    }
}

fn checksum(claims: &Claims) -> Result<u64, CheckpointError> {
    let encoded = serde_json::to_vec(claims)?;
    Ok(xxhash_rust::xxh64::xxh64(&encoded, 0))
}
