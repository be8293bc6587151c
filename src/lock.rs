//! Single-instance lock manager.
//!
//! An advisory exclusive lock on a fixed path enforces at-most-one live
//! scheduler instance on a host. The lock file carries the holder's
//! metadata as JSON; absence of the file is the unlocked state.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::Local;
use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Metadata written into the lock file by the holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    pub pid: u32,
    pub started_at: String,
    pub hostname: String,
}

impl LockRecord {
    /// Build a record for the current process.
    pub fn current() -> Self {
        Self {
            pid: std::process::id(),
            started_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            hostname: detect_hostname(),
        }
    }
}

/// What `check_existing` observed without taking the lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockState {
    /// No lock file present
    Free,
    /// Lock file present with readable metadata
    Held(LockRecord),
    /// Lock file present but the metadata could not be parsed.
    /// Reported distinctly so contention is never masked as "not running".
    Unreadable,
}

impl LockState {
    /// Whether another instance appears to be running.
    pub fn is_held(&self) -> bool {
        !matches!(self, LockState::Free)
    }
}

/// Manages the scheduler's exclusive lock file.
pub struct LockManager {
    lock_file: PathBuf,
    held: Option<File>,
}

impl LockManager {
    /// Create a manager for the given lock file path. Does not touch the file.
    pub fn new(lock_file: impl AsRef<Path>) -> Self {
        Self {
            lock_file: lock_file.as_ref().to_path_buf(),
            held: None,
        }
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.lock_file
    }

    /// Try to take the exclusive lock without blocking.
    ///
    /// Returns `Ok(true)` and writes this process's metadata on success,
    /// `Ok(false)` when another instance holds the lock. The file is opened
    /// without truncation so a failed attempt never corrupts the holder's
    /// metadata.
    pub fn acquire(&mut self) -> Result<bool> {
        if self.held.is_some() {
            return Ok(true);
        }

        if let Some(parent) = self.lock_file.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_file)?;

        if file.try_lock_exclusive().is_err() {
            return Ok(false);
        }

        // Holder metadata is written only after the lock is ours.
        let record = LockRecord::current();
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(serde_json::to_string(&record)?.as_bytes())?;
        file.flush()?;

        self.held = Some(file);
        Ok(true)
    }

    /// Release the lock and delete the file. Idempotent: releasing a lock
    /// that was never acquired is a no-op.
    pub fn release(&mut self) {
        if let Some(file) = self.held.take() {
            let _ = fs2::FileExt::unlock(&file);
            drop(file);
            if self.lock_file.exists() {
                if let Err(e) = fs::remove_file(&self.lock_file) {
                    log::debug!("Failed to remove lock file {}: {}", self.lock_file.display(), e);
                }
            }
        }
    }

    /// Whether this manager currently holds the lock.
    pub fn is_held(&self) -> bool {
        self.held.is_some()
    }

    /// Read the existing lock metadata without taking the lock.
    pub fn check_existing(&self) -> LockState {
        if !self.lock_file.exists() {
            return LockState::Free;
        }

        let mut content = String::new();
        match File::open(&self.lock_file).and_then(|mut f| f.read_to_string(&mut content)) {
            Ok(_) => match serde_json::from_str::<LockRecord>(&content) {
                Ok(record) => LockState::Held(record),
                Err(e) => {
                    log::warn!(
                        "Lock file {} exists but is unparsable: {}",
                        self.lock_file.display(),
                        e
                    );
                    LockState::Unreadable
                }
            },
            Err(e) => {
                log::warn!("Lock file {} exists but is unreadable: {}", self.lock_file.display(), e);
                LockState::Unreadable
            }
        }
    }
}

impl Drop for LockManager {
    fn drop(&mut self) {
        self.release();
    }
}

/// Best-effort hostname detection: environment first, then the `hostname`
/// binary, falling back to "unknown".
fn detect_hostname() -> String {
    if let Ok(name) = std::env::var("HOSTNAME") {
        if !name.trim().is_empty() {
            return name.trim().to_string();
        }
    }

    Command::new("hostname")
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
