//! Size-rotated scheduler audit log.
//!
//! Append-only writer producing `TIMESTAMP - LEVEL - MESSAGE` lines.
//! Before each write, if the current file exceeds the byte threshold, the
//! file is renamed through a bounded chain of numbered backups and a fresh
//! file is started. Rotation runs synchronously on the calling thread.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::error::Result;

/// Default number of rotated backups to keep.
pub const DEFAULT_BACKUP_COUNT: usize = 3;

/// Append-only log writer with size-based rotation.
pub struct RotatingLogger {
    log_file: PathBuf,
    max_bytes: u64,
    backup_count: usize,
}

impl RotatingLogger {
    /// Create a logger writing to `log_file`, rotating past `max_bytes`.
    pub fn new(log_file: impl AsRef<Path>, max_bytes: u64) -> Self {
        Self {
            log_file: log_file.as_ref().to_path_buf(),
            max_bytes,
            backup_count: DEFAULT_BACKUP_COUNT,
        }
    }

    /// Set the number of numbered backups kept after rotation.
    pub fn with_backup_count(mut self, backup_count: usize) -> Self {
        self.backup_count = backup_count;
        self
    }

    /// Path of the active log file.
    pub fn path(&self) -> &Path {
        &self.log_file
    }

    /// Size of the active log file in bytes, 0 when absent.
    pub fn current_size(&self) -> u64 {
        fs::metadata(&self.log_file).map(|m| m.len()).unwrap_or(0)
    }

    /// Log an INFO line. Write failures are reported on the ambient logger
    /// rather than interrupting the caller.
    pub fn info(&self, message: &str) {
        log::info!("{}", message);
        self.emit("INFO", message);
    }

    /// Log a WARNING line.
    pub fn warning(&self, message: &str) {
        log::warn!("{}", message);
        self.emit("WARNING", message);
    }

    /// Log an ERROR line.
    pub fn error(&self, message: &str) {
        log::error!("{}", message);
        self.emit("ERROR", message);
    }

    fn emit(&self, level: &str, message: &str) {
        if let Err(e) = self.write_line(level, message) {
            log::warn!("Failed to write audit log {}: {}", self.log_file.display(), e);
        }
    }

    fn write_line(&self, level: &str, message: &str) -> Result<()> {
        self.rotate_if_needed()?;

        if let Some(parent) = self.log_file.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&self.log_file)?;
        writeln!(
            file,
            "{} - {} - {}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            level,
            message
        )?;
        Ok(())
    }

    /// Rotate when the current file exceeds the threshold: shift existing
    /// backups up one slot (the oldest past the bound is discarded), then
    /// move the current file to `.1`.
    fn rotate_if_needed(&self) -> Result<()> {
        let size = match fs::metadata(&self.log_file) {
            Ok(meta) => meta.len(),
            Err(_) => return Ok(()),
        };

        if size <= self.max_bytes {
            return Ok(());
        }

        if self.backup_count == 0 {
            fs::remove_file(&self.log_file)?;
            return Ok(());
        }

        for index in (1..self.backup_count).rev() {
            let from = self.backup_path(index);
            if from.exists() {
                fs::rename(&from, self.backup_path(index + 1))?;
            }
        }
        fs::rename(&self.log_file, self.backup_path(1))?;
        Ok(())
    }

    /// Path of the numbered backup, e.g. `scheduler.log.1`.
    pub fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = self.log_file.as_os_str().to_os_string();
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }
}
