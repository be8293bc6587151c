//! Run counters for the scheduler.

use std::time::Instant;

use serde_json::json;

/// Counters accumulated across scheduler iterations.
#[derive(Debug)]
pub struct IterationStats {
    started: Option<Instant>,
    pub iterations: u64,
    pub errors: u64,
    pub watcher_runs: u64,
    pub planner_runs: u64,
    pub last_run: Option<String>,
    pub last_error: Option<String>,
}

impl IterationStats {
    pub fn new() -> Self {
        Self {
            started: None,
            iterations: 0,
            errors: 0,
            watcher_runs: 0,
            planner_runs: 0,
            last_run: None,
            last_error: None,
        }
    }

    /// Mark the start of the run. Uptime is measured from here.
    pub fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    pub fn record_iteration(&mut self) {
        self.iterations += 1;
        self.last_run = Some(crate::vault::now_stamp());
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors += 1;
        self.last_error = Some(message.into());
    }

    pub fn record_watcher_run(&mut self) {
        self.watcher_runs += 1;
    }

    pub fn record_planner_run(&mut self) {
        self.planner_runs += 1;
    }

    /// Human-readable uptime, or "N/A" before `start` was called.
    pub fn uptime(&self) -> String {
        match self.started {
            Some(started) => {
                let total = started.elapsed().as_secs();
                let hours = total / 3600;
                let minutes = (total % 3600) / 60;
                let seconds = total % 60;
                format!("{}h {}m {}s", hours, minutes, seconds)
            }
            None => "N/A".to_string(),
        }
    }

    pub fn summary(&self) -> serde_json::Value {
        json!({
            "uptime": self.uptime(),
            "iterations": self.iterations,
            "errors": self.errors,
            "watcher_runs": self.watcher_runs,
            "planner_runs": self.planner_runs,
            "last_run": self.last_run,
            "last_error": self.last_error,
        })
    }
}

impl Default for IterationStats {
    fn default() -> Self {
        Self::new()
    }
}
