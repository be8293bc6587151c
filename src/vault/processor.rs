//! Plan builder - turns Needs_Action notes into Plans and archives them.
//!
//! For each markdown note in Needs_Action: write a `plan_<stem>.md`
//! checklist into Plans, move the note into Done, append an operation
//! record, and surface the activity on the Dashboard. Per-file failures
//! are counted and do not stop the batch.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;

use super::{Vault, now_stamp};
use crate::error::Result;

const ACTIVITY_MARKER: &str = "## Recent Activity";

/// Outcome of one pass over Needs_Action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessSummary {
    pub processed: usize,
    pub errors: usize,
}

/// Dashboard activity line for one processed file.
#[derive(Debug, Clone)]
struct Activity {
    timestamp: String,
    item: String,
}

/// Processes Needs_Action markdown notes into plans.
pub struct PlanBuilder {
    vault: Vault,
}

impl PlanBuilder {
    pub fn new(vault: Vault) -> Self {
        Self { vault }
    }

    /// Process every markdown note currently in Needs_Action.
    pub fn process(&self) -> Result<ProcessSummary> {
        let mut summary = ProcessSummary::default();

        let notes = self.scan_needs_action();
        if notes.is_empty() {
            log::debug!("No markdown files in Needs_Action");
            return Ok(summary);
        }

        fs::create_dir_all(self.vault.plans())?;
        fs::create_dir_all(self.vault.done())?;

        let mut activity = Vec::new();
        for note in notes {
            match self.process_note(&note) {
                Ok(item) => {
                    summary.processed += 1;
                    activity.push(Activity {
                        timestamp: now_stamp(),
                        item,
                    });
                }
                Err(e) => {
                    summary.errors += 1;
                    log::error!("Failed to process {}: {}", note.display(), e);
                    let _ = self.vault.append_operation(&json!({
                        "timestamp": now_stamp(),
                        "operation": "process_needs_action",
                        "original_file": note.display().to_string(),
                        "error": e.to_string(),
                        "status": "error",
                    }));
                }
            }
        }

        if !activity.is_empty() {
            if let Err(e) = self.update_dashboard(&activity) {
                summary.errors += 1;
                log::error!("Failed to update dashboard: {}", e);
            }
        }

        Ok(summary)
    }

    /// Markdown files in Needs_Action, extension matched case-insensitively.
    fn scan_needs_action(&self) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(self.vault.needs_action()) else {
            return Vec::new();
        };
        let mut notes: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .filter(|p| {
                p.extension()
                    .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("md"))
                    .unwrap_or(false)
            })
            .collect();
        notes.sort();
        notes
    }

    /// Write the plan, archive the note, record the operation. Returns the
    /// original file name for the dashboard.
    fn process_note(&self, note: &Path) -> Result<String> {
        let original = note
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "unnamed.md".to_string());
        let stem = note
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "unnamed".to_string());

        let plan_name = format!("plan_{}.md", stem);
        let plan_path = self.vault.plans().join(&plan_name);
        fs::write(&plan_path, plan_content(&original))?;

        let done_path = self.vault.done().join(&original);
        fs::rename(note, &done_path)?;

        self.vault.append_operation(&json!({
            "timestamp": now_stamp(),
            "operation": "process_needs_action",
            "original_file": original,
            "plan_file": plan_name,
            "moved_to": done_path.display().to_string(),
            "status": "success",
        }))?;

        log::info!("Processed '{}' into {}", original, plan_name);
        Ok(original)
    }

    /// Insert activity lines under the dashboard's Recent Activity section,
    /// creating the file or the section when absent.
    fn update_dashboard(&self, activity: &[Activity]) -> Result<()> {
        let dashboard = self.vault.dashboard();
        let content = if dashboard.exists() {
            fs::read_to_string(&dashboard)?
        } else {
            format!("# Dashboard\n\n{}\n\n", ACTIVITY_MARKER)
        };

        let mut lines = String::new();
        for entry in activity {
            lines.push_str(&format!("- {}: Processed file - {}\n", entry.timestamp, entry.item));
        }

        let updated = match content.find(ACTIVITY_MARKER) {
            Some(pos) => {
                let insert_at = pos + ACTIVITY_MARKER.len();
                format!("{}\n{}{}", &content[..insert_at], lines, &content[insert_at..])
            }
            None => format!("{}\n{}\n{}", content, ACTIVITY_MARKER, lines),
        };

        fs::write(&dashboard, updated)?;
        Ok(())
    }
}

fn plan_content(original: &str) -> String {
    format!(
        "# Action Plan for {}\n\n\
         ## Checklist\n\
         - [ ] Review item\n\
         - [ ] Decide action\n\
         - [ ] Mark complete\n\n\
         ## Notes\n\
         Add your notes here about the required actions.\n",
        original
    )
}
