//! Lock file guarding each driver against overlapping invocations.
//!
//! The guard is an advisory exclusive lock on an open file handle. The kernel
//! drops it when the handle closes, including when the holding process dies,
//! so a crashed run never leaves a lock behind.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::StateError;

/// Who holds the lock. Informational only; the file lock is the guard.
#[derive(Debug, Serialize, Deserialize)]
struct LockRecord {
    owner: String,
    acquired_at: DateTime<Utc>,
}

/// Held for the lifetime of one driver run.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
    file: File,
}

impl InstanceLock {
    /// Take the exclusive lock on `path` without blocking.
    ///
    /// The lock file itself is left in place between runs; only the lock on
    /// the open handle matters.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Locked`] when another run holds the lock, or
    /// [`StateError::Io`] when the lock file cannot be opened or written.
    pub fn acquire(path: &Path, now: DateTime<Utc>, owner: &str) -> Result<Self, StateError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StateError::io(parent, e))?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| StateError::io(path, e))?;

        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => {}
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                let owner = read_record(&mut file)
                    .map_or_else(|| "an unidentified run".to_string(), |held| held.owner);
                return Err(StateError::Locked {
                    path: path.to_path_buf(),
                    owner,
                });
            }
            Err(e) => return Err(StateError::io(path, e)),
        }

        let record = LockRecord {
            owner: owner.to_string(),
            acquired_at: now,
        };
        write_record(&mut file, &record).map_err(|e| StateError::io(path, e))?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_record(file: &mut File) -> Option<LockRecord> {
    let mut raw = String::new();
    file.read_to_string(&mut raw).ok()?;
    serde_json::from_str(&raw).ok()
}

fn write_record(file: &mut File, record: &LockRecord) -> std::io::Result<()> {
    let body = serde_json::to_vec(record).map_err(std::io::Error::other)?;
    file.set_len(0)?;
    file.rewind()?;
    file.write_all(&body)?;
    file.flush()
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        // Closing the handle releases the lock; this only clears the owner.
        if let Err(e) = self.file.set_len(0) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to clear lock owner");
        }
    }
}
