//! Inbox sweep - turns newly dropped files into Needs_Action report notes.
//!
//! For each regular file in Inbox a `<stem>_report.md` note is written into
//! Needs_Action carrying the file's name, size, and detection time. Files
//! already reported are skipped, both within this process's lifetime and
//! across restarts (an existing report note suppresses re-reporting).

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;

use super::{Vault, now_stamp};
use crate::error::Result;

/// Outcome of one sweep over the Inbox.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepSummary {
    /// Report notes written this sweep
    pub reported: usize,
    /// Inbox files skipped as already reported
    pub skipped: usize,
}

/// Scans the Inbox and writes report notes into Needs_Action.
pub struct InboxSweep {
    vault: Vault,
    seen: HashSet<PathBuf>,
}

impl InboxSweep {
    pub fn new(vault: Vault) -> Self {
        Self {
            vault,
            seen: HashSet::new(),
        }
    }

    /// Sweep the Inbox once. A missing Inbox is an empty sweep, not an error.
    pub fn sweep(&mut self) -> Result<SweepSummary> {
        let inbox = self.vault.inbox();
        let mut summary = SweepSummary::default();

        let Ok(entries) = fs::read_dir(&inbox) else {
            log::debug!("Inbox {} does not exist, nothing to sweep", inbox.display());
            return Ok(summary);
        };

        fs::create_dir_all(self.vault.needs_action())?;

        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let report_path = self.report_path_for(&path);
            if self.seen.contains(&path) || report_path.exists() {
                summary.skipped += 1;
                continue;
            }

            match self.write_report(&path, &report_path) {
                Ok(()) => {
                    self.seen.insert(path);
                    summary.reported += 1;
                }
                Err(e) => {
                    log::error!("Failed to report inbox file {}: {}", path.display(), e);
                    return Err(e);
                }
            }
        }

        Ok(summary)
    }

    /// Report note path in Needs_Action for an inbox file.
    fn report_path_for(&self, file: &Path) -> PathBuf {
        let stem = file
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "unnamed".to_string());
        self.vault.needs_action().join(format!("{}_report.md", stem))
    }

    fn write_report(&self, file: &Path, report_path: &Path) -> Result<()> {
        let filename = file
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "unnamed".to_string());
        let size = fs::metadata(file).map(|m| m.len()).unwrap_or(0);
        let timestamp = now_stamp();

        let content = format!(
            "# New File Detected\n\n\
             **Filename:** {}\n\
             **File Size:** {} bytes\n\
             **Timestamp:** {}\n\
             **Status:** pending\n",
            filename, size, timestamp
        );
        fs::write(report_path, content)?;

        self.vault.append_operation(&json!({
            "timestamp": timestamp,
            "operation": "inbox_sweep",
            "original_file": file.display().to_string(),
            "created_report": report_path.display().to_string(),
            "file_size": size,
            "status": "success",
        }))?;

        log::info!("Created report for '{}' in Needs_Action", filename);
        Ok(())
    }
}
