//! Vault layout and status reporting.
//!
//! The vault is the working directory tree the scheduler and its steps
//! observe and mutate: Inbox, Needs_Action, Plans, Done, plus the approval
//! folders and the Logs directory.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;

use crate::error::Result;

pub mod inbox;
pub mod processor;

pub use inbox::InboxSweep;
pub use processor::PlanBuilder;

/// Handle on a vault root with typed access to its folders.
#[derive(Debug, Clone)]
pub struct Vault {
    root: PathBuf,
}

/// File counts across the watched vault folders.
#[derive(Debug, Clone, Serialize)]
pub struct VaultStatus {
    pub inbox_count: usize,
    pub needs_action_count: usize,
    pub plans_count: usize,
    pub done_count: usize,
    pub needs_approval_count: usize,
    pub timestamp: String,
}

impl Vault {
    /// Create a vault handle rooted at the given directory.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn inbox(&self) -> PathBuf {
        self.root.join("Inbox")
    }

    pub fn needs_action(&self) -> PathBuf {
        self.root.join("Needs_Action")
    }

    pub fn plans(&self) -> PathBuf {
        self.root.join("Plans")
    }

    pub fn done(&self) -> PathBuf {
        self.root.join("Done")
    }

    pub fn needs_approval(&self) -> PathBuf {
        self.root.join("Needs_Approval")
    }

    pub fn approved(&self) -> PathBuf {
        self.root.join("Approved")
    }

    pub fn rejected(&self) -> PathBuf {
        self.root.join("Rejected")
    }

    pub fn logs(&self) -> PathBuf {
        self.root.join("Logs")
    }

    pub fn dashboard(&self) -> PathBuf {
        self.root.join("Dashboard.md")
    }

    /// Create all vault folders that are missing.
    pub fn ensure_dirs(&self) -> Result<()> {
        if self.root.exists() && !self.root.is_dir() {
            return Err(crate::SilverdError::Vault(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }
        for dir in [
            self.inbox(),
            self.needs_action(),
            self.plans(),
            self.done(),
            self.needs_approval(),
            self.approved(),
            self.rejected(),
            self.logs(),
        ] {
            fs::create_dir_all(&dir)?;
        }
        Ok(())
    }

    /// Count regular files in a directory; a missing directory counts as 0.
    pub fn count_files(dir: &Path) -> usize {
        let Ok(entries) = fs::read_dir(dir) else {
            return 0;
        };
        entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .count()
    }

    /// Snapshot of the queue depth across watched folders. Read-only; never
    /// touches the lock.
    pub fn status(&self) -> VaultStatus {
        VaultStatus {
            inbox_count: Self::count_files(&self.inbox()),
            needs_action_count: Self::count_files(&self.needs_action()),
            plans_count: Self::count_files(&self.plans()),
            done_count: Self::count_files(&self.done()),
            needs_approval_count: Self::count_files(&self.needs_approval()),
            timestamp: now_stamp(),
        }
    }

    /// Append an operation record to the line-delimited JSON operations log.
    pub fn append_operation(&self, record: &serde_json::Value) -> Result<()> {
        let logs = self.logs();
        fs::create_dir_all(&logs)?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(logs.join("operations.jsonl"))?;
        writeln!(file, "{}", serde_json::to_string(record)?)?;
        Ok(())
    }
}

/// Timestamp in the vault's human-readable format.
pub fn now_stamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_folder_paths() {
        let vault = Vault::new("/vault");
        assert_eq!(vault.inbox(), PathBuf::from("/vault/Inbox"));
        assert_eq!(vault.needs_action(), PathBuf::from("/vault/Needs_Action"));
        assert_eq!(vault.plans(), PathBuf::from("/vault/Plans"));
        assert_eq!(vault.done(), PathBuf::from("/vault/Done"));
        assert_eq!(vault.dashboard(), PathBuf::from("/vault/Dashboard.md"));
    }

    #[test]
    fn test_ensure_dirs_creates_all_folders() {
        let temp = TempDir::new().unwrap();
        let vault = Vault::new(temp.path());
        vault.ensure_dirs().unwrap();

        assert!(vault.inbox().is_dir());
        assert!(vault.needs_action().is_dir());
        assert!(vault.plans().is_dir());
        assert!(vault.done().is_dir());
        assert!(vault.needs_approval().is_dir());
        assert!(vault.logs().is_dir());
    }

    #[test]
    fn test_ensure_dirs_rejects_file_root() {
        let temp = TempDir::new().unwrap();
        let file_root = temp.path().join("not_a_dir");
        fs::write(&file_root, "x").unwrap();

        let err = Vault::new(&file_root).ensure_dirs().unwrap_err();
        assert!(matches!(err, crate::SilverdError::Vault(_)));
    }

    #[test]
    fn test_ensure_dirs_idempotent() {
        let temp = TempDir::new().unwrap();
        let vault = Vault::new(temp.path());
        vault.ensure_dirs().unwrap();
        vault.ensure_dirs().unwrap();
    }

    #[test]
    fn test_count_files_missing_directory_is_zero() {
        let temp = TempDir::new().unwrap();
        assert_eq!(Vault::count_files(&temp.path().join("missing")), 0);
    }

    #[test]
    fn test_count_files_ignores_directories() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.md"), "x").unwrap();
        fs::write(temp.path().join("b.md"), "y").unwrap();
        fs::create_dir(temp.path().join("subdir")).unwrap();

        assert_eq!(Vault::count_files(temp.path()), 2);
    }

    #[test]
    fn test_status_counts() {
        let temp = TempDir::new().unwrap();
        let vault = Vault::new(temp.path());
        vault.ensure_dirs().unwrap();

        fs::write(vault.inbox().join("mail.txt"), "x").unwrap();
        fs::write(vault.needs_action().join("todo.md"), "x").unwrap();
        fs::write(vault.needs_action().join("todo2.md"), "x").unwrap();

        let status = vault.status();
        assert_eq!(status.inbox_count, 1);
        assert_eq!(status.needs_action_count, 2);
        assert_eq!(status.plans_count, 0);
        assert_eq!(status.done_count, 0);
        assert!(!status.timestamp.is_empty());
    }

    #[test]
    fn test_status_on_empty_root() {
        let temp = TempDir::new().unwrap();
        let vault = Vault::new(temp.path().join("nothing_here"));
        let status = vault.status();
        assert_eq!(status.inbox_count, 0);
        assert_eq!(status.needs_action_count, 0);
    }

    #[test]
    fn test_append_operation() {
        let temp = TempDir::new().unwrap();
        let vault = Vault::new(temp.path());

        vault
            .append_operation(&serde_json::json!({"operation": "test", "status": "success"}))
            .unwrap();
        vault
            .append_operation(&serde_json::json!({"operation": "test2", "status": "success"}))
            .unwrap();

        let content = fs::read_to_string(vault.logs().join("operations.jsonl")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["operation"], "test");
    }

    #[test]
    fn test_now_stamp_format() {
        let stamp = now_stamp();
        assert_eq!(stamp.len(), 19);
        assert_eq!(&stamp[10..11], " ");
    }
}
