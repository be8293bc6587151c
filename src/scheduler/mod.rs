//! Scheduler core.
//!
//! One instance at a time holds the vault lock and drives iterations at the
//! configured interval. An iteration runs the watcher step then the planner
//! step; the planner always runs, even after a watcher failure. Step failures
//! are counted and logged, never fatal. The lock is released on every exit
//! path and the process exit code is 0 only when no iteration recorded an
//! error.

pub mod stats;
pub mod step;

pub use stats::IterationStats;
pub use step::{InboxSweepStep, PlanBuilderStep, ScriptStep, Step, StepOutcome};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use serde_json::json;

use crate::config::Config;
use crate::error::Result;
use crate::lock::{LockManager, LockState};
use crate::logger::RotatingLogger;
use crate::runner::{resolve_script, ScriptRunner};
use crate::vault::Vault;

/// Drives the watcher/planner loop over a vault.
pub struct Scheduler {
    vault: Vault,
    logger: RotatingLogger,
    lock: LockManager,
    stats: IterationStats,
    watcher: Box<dyn Step>,
    planner: Box<dyn Step>,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
}

impl Scheduler {
    /// Build a scheduler from configuration, creating the vault layout if
    /// needed.
    pub fn new(config: &Config) -> Result<Self> {
        let vault = Vault::new(&config.vault_root);
        vault.ensure_dirs()?;

        let logger = RotatingLogger::new(config.log_file_path(), config.max_log_size_bytes())
            .with_backup_count(config.log_backups);
        let lock = LockManager::new(config.lock_file_path());
        let runner = ScriptRunner::new(config.script_timeout());

        let watcher: Box<dyn Step> = match &config.watcher_script {
            Some(script) => Box::new(ScriptStep::new(
                "vault-watcher",
                resolve_script(&config.vault_root, script),
                Vec::new(),
                runner.clone(),
            )),
            None => Box::new(InboxSweepStep::new(vault.clone())),
        };
        let planner: Box<dyn Step> = match &config.planner_script {
            Some(script) => Box::new(ScriptStep::new(
                "task-planner",
                resolve_script(&config.vault_root, script),
                vec!["--once".to_string()],
                runner,
            )),
            None => Box::new(PlanBuilderStep::new(vault.clone())),
        };

        Ok(Self {
            vault,
            logger,
            lock,
            stats: IterationStats::new(),
            watcher,
            planner,
            interval: config.interval(),
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Shared shutdown flag, set by the signal listener.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Run iterations until a shutdown signal arrives. Returns the process
    /// exit code.
    pub async fn run_daemon(&mut self) -> i32 {
        if !self.acquire_or_report() {
            return 1;
        }
        spawn_signal_listener(self.shutdown.clone());

        self.stats.start();
        self.logger.info("============================================================");
        self.logger.info(&format!(
            "Scheduler started (pid {}), interval {}s",
            std::process::id(),
            self.interval.as_secs()
        ));
        self.logger.info("============================================================");

        while !self.shutdown.load(Ordering::SeqCst) {
            self.run_iteration().await;
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }
            self.sleep_until_next().await;
        }

        self.finish("Scheduler stopped")
    }

    /// Run exactly one iteration and exit. Returns the process exit code.
    pub async fn run_once(&mut self) -> i32 {
        if !self.acquire_or_report() {
            return 1;
        }
        self.stats.start();
        self.logger.info("Running a single iteration");
        self.run_iteration().await;
        self.finish("Single iteration complete")
    }

    /// Release the lock, log the run summary, and compute the exit code.
    fn finish(&mut self, reason: &str) -> i32 {
        self.lock.release();
        let summary = self.stats.summary();
        self.logger.info(&format!("{}. Stats: {}", reason, summary));
        if self.stats.errors == 0 { 0 } else { 1 }
    }

    /// Take the lock, or report who holds it and bail.
    fn acquire_or_report(&mut self) -> bool {
        match self.lock.acquire() {
            Ok(true) => true,
            Ok(false) => {
                let holder = match self.lock.check_existing() {
                    LockState::Held(record) => format!(
                        "another instance is running (pid {} on {}, started {})",
                        record.pid, record.hostname, record.started_at
                    ),
                    LockState::Unreadable => {
                        "another instance holds the lock but its metadata is unreadable".to_string()
                    }
                    LockState::Free => "lock is contended but no lock file was found".to_string(),
                };
                self.logger
                    .error(&crate::SilverdError::LockContention(holder).to_string());
                false
            }
            Err(e) => {
                self.logger.error(&format!("Failed to acquire lock: {}", e));
                false
            }
        }
    }

    /// One watcher + planner pass. The planner runs regardless of the
    /// watcher's outcome.
    async fn run_iteration(&mut self) {
        self.stats.record_iteration();

        let watcher_outcome = self.watcher.run().await;
        self.stats.record_watcher_run();
        if watcher_outcome.success {
            self.logger
                .info(&format!("{}: {}", self.watcher.name(), watcher_outcome.detail));
        } else {
            let message = format!("{} failed: {}", self.watcher.name(), watcher_outcome.detail);
            self.logger.error(&message);
            self.stats.record_error(message);
        }

        let planner_outcome = self.planner.run().await;
        self.stats.record_planner_run();
        if planner_outcome.success {
            self.logger
                .info(&format!("{}: {}", self.planner.name(), planner_outcome.detail));
        } else {
            let message = format!("{} failed: {}", self.planner.name(), planner_outcome.detail);
            self.logger.error(&message);
            self.stats.record_error(message);
        }

        let status = self.vault.status();
        self.logger.info(&format!(
            "Iteration complete. Inbox: {}, Needs_Action: {}, Plans: {}",
            status.inbox_count, status.needs_action_count, status.plans_count
        ));
    }

    /// Sleep out the interval in one-second slices so a shutdown signal is
    /// honored promptly without cancelling an in-flight step.
    async fn sleep_until_next(&self) {
        let mut remaining = self.interval;
        while remaining > Duration::ZERO && !self.shutdown.load(Ordering::SeqCst) {
            let slice = remaining.min(Duration::from_secs(1));
            tokio::time::sleep(slice).await;
            remaining = remaining.saturating_sub(slice);
        }
    }
}

/// Report scheduler and vault state without touching the lock. Safe to run
/// while a daemon holds it. Returns the process exit code.
pub fn show_status(config: &Config, json_output: bool) -> i32 {
    let vault = Vault::new(&config.vault_root);
    let lock = LockManager::new(config.lock_file_path());

    let (state_label, record) = match lock.check_existing() {
        LockState::Held(record) => ("RUNNING", Some(record)),
        LockState::Free => ("NOT_RUNNING", None),
        LockState::Unreadable => ("UNKNOWN", None),
    };

    let vault_status = vault.status();
    let log_path = config.log_file_path();
    let log_size_mb = std::fs::metadata(&log_path)
        .map(|m| m.len() as f64 / (1024.0 * 1024.0))
        .unwrap_or(0.0);

    if json_output {
        let payload = json!({
            "scheduler": {
                "state": state_label,
                "pid": record.as_ref().map(|r| r.pid),
                "hostname": record.as_ref().map(|r| r.hostname.clone()),
                "started_at": record.as_ref().map(|r| r.started_at.clone()),
            },
            "vault": serde_json::to_value(&vault_status).unwrap_or(serde_json::Value::Null),
            "log_file": {
                "path": log_path.display().to_string(),
                "size_mb": (log_size_mb * 100.0).round() / 100.0,
            },
            "timestamp": vault_status.timestamp,
        });
        println!("{}", payload);
        return 0;
    }

    println!("{}", "Scheduler Status".bold());
    println!("{}", "================".bold());
    match (state_label, &record) {
        ("RUNNING", Some(record)) => println!(
            "  State:        {} (pid {} on {}, started {})",
            "RUNNING".green().bold(),
            record.pid,
            record.hostname,
            record.started_at
        ),
        ("UNKNOWN", _) => println!(
            "  State:        {} (lock held, metadata unreadable)",
            "UNKNOWN".yellow().bold()
        ),
        _ => println!("  State:        {}", "NOT RUNNING".red()),
    }
    println!();
    println!("{}", "Vault".bold());
    println!("  Inbox:          {}", vault_status.inbox_count);
    println!("  Needs_Action:   {}", vault_status.needs_action_count);
    println!("  Plans:          {}", vault_status.plans_count);
    println!("  Done:           {}", vault_status.done_count);
    println!("  Needs_Approval: {}", vault_status.needs_approval_count);
    println!();
    println!("  Log file:       {} ({:.2} MB)", log_path.display(), log_size_mb);
    println!("  As of:          {}", vault_status.timestamp);
    0
}

/// Listen for SIGINT/SIGTERM and flip the shutdown flag. The loop notices the
/// flag cooperatively; no task is cancelled mid-step.
fn spawn_signal_listener(shutdown: Arc<AtomicBool>) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut term = match signal(SignalKind::terminate()) {
                Ok(term) => term,
                Err(e) => {
                    log::error!("Failed to install SIGTERM handler: {}", e);
                    return;
                }
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        log::info!("Shutdown signal received");
        shutdown.store(true, Ordering::SeqCst);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn test_config(root: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.vault_root = root.to_path_buf();
        config
    }

    #[tokio::test]
    async fn test_run_once_empty_vault_exits_zero() {
        let temp = TempDir::new().unwrap();
        let mut scheduler = Scheduler::new(&test_config(temp.path())).unwrap();

        let code = scheduler.run_once().await;
        assert_eq!(code, 0);
        assert_eq!(scheduler.stats.iterations, 1);
        assert_eq!(scheduler.stats.watcher_runs, 1);
        assert_eq!(scheduler.stats.planner_runs, 1);
    }

    #[tokio::test]
    async fn test_run_once_processes_inbox_to_done() {
        let temp = TempDir::new().unwrap();
        let config = test_config(temp.path());
        let vault = Vault::new(temp.path());
        vault.ensure_dirs().unwrap();
        fs::write(vault.inbox().join("report.csv"), "a,b").unwrap();

        let mut scheduler = Scheduler::new(&config).unwrap();
        let code = scheduler.run_once().await;

        assert_eq!(code, 0);
        assert!(vault.plans().join("plan_report_report.md").exists());
        assert!(vault.done().join("report_report.md").exists());
    }

    #[tokio::test]
    async fn test_run_once_missing_watcher_script_exits_one() {
        let temp = TempDir::new().unwrap();
        let mut config = test_config(temp.path());
        config.watcher_script = Some(temp.path().join("no_such_watcher.sh"));

        let mut scheduler = Scheduler::new(&config).unwrap();
        let code = scheduler.run_once().await;

        // Watcher failure is recorded, but the planner still ran.
        assert_eq!(code, 1);
        assert_eq!(scheduler.stats.errors, 1);
        assert_eq!(scheduler.stats.planner_runs, 1);
    }

    #[tokio::test]
    async fn test_run_once_releases_lock() {
        let temp = TempDir::new().unwrap();
        let config = test_config(temp.path());

        let mut scheduler = Scheduler::new(&config).unwrap();
        scheduler.run_once().await;

        let mut second = LockManager::new(config.lock_file_path());
        assert!(second.acquire().unwrap());
        second.release();
    }

    #[tokio::test]
    async fn test_run_once_refused_while_lock_held() {
        let temp = TempDir::new().unwrap();
        let config = test_config(temp.path());
        Vault::new(temp.path()).ensure_dirs().unwrap();

        let mut holder = LockManager::new(config.lock_file_path());
        assert!(holder.acquire().unwrap());

        let mut scheduler = Scheduler::new(&config).unwrap();
        let code = scheduler.run_once().await;
        assert_eq!(code, 1);
        assert_eq!(scheduler.stats.iterations, 0);

        holder.release();
    }

    #[test]
    fn test_show_status_does_not_create_lock_file() {
        let temp = TempDir::new().unwrap();
        let config = test_config(temp.path());
        Vault::new(temp.path()).ensure_dirs().unwrap();

        let code = show_status(&config, true);
        assert_eq!(code, 0);
        assert!(!config.lock_file_path().exists());
    }

    #[test]
    fn test_show_status_safe_while_daemon_holds_lock() {
        let temp = TempDir::new().unwrap();
        let config = test_config(temp.path());
        Vault::new(temp.path()).ensure_dirs().unwrap();

        let mut holder = LockManager::new(config.lock_file_path());
        assert!(holder.acquire().unwrap());

        assert_eq!(show_status(&config, true), 0);

        // Status did not disturb the holder's lock or metadata.
        match holder.check_existing() {
            LockState::Held(record) => assert_eq!(record.pid, std::process::id()),
            other => panic!("expected held lock, got {:?}", other),
        }
        holder.release();
    }
}
