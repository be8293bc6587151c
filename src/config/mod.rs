//! Configuration loading and defaults.
//!
//! Settings come from a YAML file found through a search chain (explicit
//! `--config` path, then `./.silverd.yml`, then the user config directory),
//! with command-line flags layered on top. Every field has a default, so a
//! missing config file is not an error.

use std::path::PathBuf;
use std::time::Duration;

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

const DEFAULT_INTERVAL_MINUTES: i64 = 5;
const DEFAULT_MAX_LOG_SIZE_MB: u64 = 5;
const DEFAULT_LOG_BACKUPS: usize = 3;
const DEFAULT_SCRIPT_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Vault root directory.
    pub vault_root: PathBuf,

    /// Minutes between iterations. Values below 1 are clamped, not rejected.
    pub interval_minutes: i64,

    /// Log rotation threshold in megabytes.
    pub max_log_size_mb: u64,

    /// How many rotated backups to keep.
    pub log_backups: usize,

    /// Hard timeout for external scripts, in seconds.
    pub script_timeout_secs: u64,

    /// External watcher script. When unset the built-in inbox sweep runs.
    pub watcher_script: Option<PathBuf>,

    /// External planner script. When unset the built-in plan builder runs.
    pub planner_script: Option<PathBuf>,

    /// Log file override. Defaults to Logs/silverd.log under the vault.
    pub log_file: Option<PathBuf>,

    /// Lock file override. Defaults to Logs/.silverd.lock under the vault.
    pub lock_file: Option<PathBuf>,

    pub approval: ApprovalConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalConfig {
    /// How long to wait for a human decision before timing out.
    pub timeout_minutes: u64,

    /// How often to re-read a pending request document.
    pub poll_interval_secs: u64,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            timeout_minutes: 60,
            poll_interval_secs: 10,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            vault_root: PathBuf::from("."),
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
            max_log_size_mb: DEFAULT_MAX_LOG_SIZE_MB,
            log_backups: DEFAULT_LOG_BACKUPS,
            script_timeout_secs: DEFAULT_SCRIPT_TIMEOUT_SECS,
            watcher_script: None,
            planner_script: None,
            log_file: None,
            lock_file: None,
            approval: ApprovalConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the first file in the search chain, falling
    /// back to defaults when none exists.
    pub fn load(explicit: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let local = PathBuf::from(".silverd.yml");
        if local.exists() {
            return Self::from_file(&local);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user = config_dir.join("silverd").join("silverd.yml");
            if user.exists() {
                return Self::from_file(&user);
            }
        }

        Ok(Self::default())
    }

    fn from_file(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;
        serde_yaml::from_str(&content)
            .context(format!("Failed to parse config file: {}", path.display()))
    }

    /// Layer command-line overrides on top of the file values.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(vault) = &cli.vault {
            self.vault_root = vault.clone();
        }
        if let Some(interval) = cli.interval {
            self.interval_minutes = interval;
        }
        if let Some(log_file) = &cli.log_file {
            self.log_file = Some(log_file.clone());
        }
        if let Some(lock_file) = &cli.lock_file {
            self.lock_file = Some(lock_file.clone());
        }
        if let Some(max_log_size) = cli.max_log_size {
            self.max_log_size_mb = max_log_size;
        }
    }

    /// Iteration interval, silently clamped to at least one minute.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.max(1) as u64 * 60)
    }

    pub fn script_timeout(&self) -> Duration {
        Duration::from_secs(self.script_timeout_secs)
    }

    pub fn max_log_size_bytes(&self) -> u64 {
        self.max_log_size_mb * 1024 * 1024
    }

    pub fn log_file_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| self.vault_root.join("Logs").join("silverd.log"))
    }

    pub fn lock_file_path(&self) -> PathBuf {
        self.lock_file
            .clone()
            .unwrap_or_else(|| self.vault_root.join("Logs").join(".silverd.lock"))
    }

    pub fn approval_timeout(&self) -> Duration {
        Duration::from_secs(self.approval.timeout_minutes * 60)
    }

    pub fn approval_poll_interval(&self) -> Duration {
        Duration::from_secs(self.approval.poll_interval_secs)
    }
}
