//! Iteration steps.
//!
//! An iteration runs the watcher step then the planner step. Each step is
//! either a configured external script (run through the script runner) or
//! the built-in native fallback. All failure modes collapse into the same
//! `StepOutcome` contract.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::runner::ScriptRunner;
use crate::vault::{InboxSweep, PlanBuilder, Vault};

/// Result of one step execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub success: bool,
    pub detail: String,
}

impl StepOutcome {
    pub fn ok(detail: impl Into<String>) -> Self {
        Self {
            success: true,
            detail: detail.into(),
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            success: false,
            detail: detail.into(),
        }
    }
}

/// One unit of iteration work.
#[async_trait]
pub trait Step: Send {
    /// Short name used in logs and counters.
    fn name(&self) -> &str;

    /// Run the step to completion. Never panics; errors become failure
    /// outcomes.
    async fn run(&mut self) -> StepOutcome;
}

/// Step that shells out to an external script.
pub struct ScriptStep {
    name: String,
    script: PathBuf,
    args: Vec<String>,
    runner: ScriptRunner,
}

impl ScriptStep {
    pub fn new(
        name: impl Into<String>,
        script: PathBuf,
        args: Vec<String>,
        runner: ScriptRunner,
    ) -> Self {
        Self {
            name: name.into(),
            script,
            args,
            runner,
        }
    }
}

#[async_trait]
impl Step for ScriptStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&mut self) -> StepOutcome {
        let outcome = self.runner.run(&self.script, &self.args).await;
        StepOutcome {
            success: outcome.success,
            detail: outcome.output,
        }
    }
}

/// Built-in watcher: sweeps the Inbox into Needs_Action report notes.
pub struct InboxSweepStep {
    sweep: InboxSweep,
}

impl InboxSweepStep {
    pub fn new(vault: Vault) -> Self {
        Self {
            sweep: InboxSweep::new(vault),
        }
    }
}

#[async_trait]
impl Step for InboxSweepStep {
    fn name(&self) -> &str {
        "vault-watcher"
    }

    async fn run(&mut self) -> StepOutcome {
        match self.sweep.sweep() {
            Ok(summary) => StepOutcome::ok(format!(
                "reported {} file(s), skipped {}",
                summary.reported, summary.skipped
            )),
            Err(e) => StepOutcome::failed(format!("inbox sweep failed: {}", e)),
        }
    }
}

/// Built-in planner: turns Needs_Action notes into Plans.
pub struct PlanBuilderStep {
    builder: PlanBuilder,
}

impl PlanBuilderStep {
    pub fn new(vault: Vault) -> Self {
        Self {
            builder: PlanBuilder::new(vault),
        }
    }
}

#[async_trait]
impl Step for PlanBuilderStep {
    fn name(&self) -> &str {
        "task-planner"
    }

    async fn run(&mut self) -> StepOutcome {
        match self.builder.process() {
            Ok(summary) if summary.errors == 0 => {
                StepOutcome::ok(format!("processed {} note(s)", summary.processed))
            }
            Ok(summary) => StepOutcome::failed(format!(
                "processed {} note(s), {} failed",
                summary.processed, summary.errors
            )),
            Err(e) => StepOutcome::failed(format!("plan builder failed: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_step_outcome_constructors() {
        let ok = StepOutcome::ok("done");
        assert!(ok.success);
        assert_eq!(ok.detail, "done");

        let failed = StepOutcome::failed("broke");
        assert!(!failed.success);
        assert_eq!(failed.detail, "broke");
    }

    #[tokio::test]
    async fn test_script_step_missing_script_fails() {
        let mut step = ScriptStep::new(
            "vault-watcher",
            PathBuf::from("/nonexistent/watch.sh"),
            Vec::new(),
            ScriptRunner::new(Duration::from_secs(5)),
        );
        assert_eq!(step.name(), "vault-watcher");

        let outcome = step.run().await;
        assert!(!outcome.success);
        assert!(outcome.detail.contains("Script not found"));
    }

    #[tokio::test]
    async fn test_inbox_sweep_step_on_empty_vault() {
        let temp = TempDir::new().unwrap();
        let vault = Vault::new(temp.path());
        vault.ensure_dirs().unwrap();

        let mut step = InboxSweepStep::new(vault);
        assert_eq!(step.name(), "vault-watcher");

        let outcome = step.run().await;
        assert!(outcome.success);
        assert!(outcome.detail.contains("reported 0"));
    }

    #[tokio::test]
    async fn test_plan_builder_step_on_empty_vault() {
        let temp = TempDir::new().unwrap();
        let vault = Vault::new(temp.path());
        vault.ensure_dirs().unwrap();

        let mut step = PlanBuilderStep::new(vault);
        assert_eq!(step.name(), "task-planner");

        let outcome = step.run().await;
        assert!(outcome.success);
        assert!(outcome.detail.contains("processed 0"));
    }

    #[tokio::test]
    async fn test_native_steps_compose_into_pipeline() {
        let temp = TempDir::new().unwrap();
        let vault = Vault::new(temp.path());
        vault.ensure_dirs().unwrap();
        fs::write(vault.inbox().join("invoice.pdf"), "x").unwrap();

        let mut watcher = InboxSweepStep::new(vault.clone());
        let mut planner = PlanBuilderStep::new(vault.clone());

        assert!(watcher.run().await.success);
        assert!(planner.run().await.success);

        // The sweep's report note was planned and archived in one pass.
        assert!(vault.plans().join("plan_invoice_report.md").exists());
        assert!(vault.done().join("invoice_report.md").exists());
    }
}
