//! Script runner - executes sub-scripts as isolated child processes.
//!
//! Every failure mode (missing script, spawn error, timeout, non-zero
//! exit) collapses into the same `ScriptOutcome` contract so the scheduler
//! treats them uniformly.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

/// Default wall-clock timeout for a sub-script.
pub const DEFAULT_SCRIPT_TIMEOUT: Duration = Duration::from_secs(300);

/// Result of one sub-script invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOutcome {
    pub success: bool,
    pub output: String,
}

impl ScriptOutcome {
    fn failure(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
        }
    }
}

/// Runs external scripts with a hard upper-bound timeout.
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    timeout: Duration,
}

impl Default for ScriptRunner {
    fn default() -> Self {
        Self::new(DEFAULT_SCRIPT_TIMEOUT)
    }
}

impl ScriptRunner {
    /// Create a runner with the given per-script timeout.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// The configured timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run a script to completion, capturing stdout and stderr.
    ///
    /// A missing script path is a failure outcome, not an error. A script
    /// that outlives the timeout is killed and reported as a failure;
    /// whatever it completed before being killed stands.
    pub async fn run(&self, script: &Path, args: &[String]) -> ScriptOutcome {
        if !script.exists() {
            return ScriptOutcome::failure(format!("Script not found: {}", script.display()));
        }

        let mut cmd = Command::new(script);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return ScriptOutcome::failure(format!(
                    "Script execution error: {}: {}",
                    script.display(),
                    e
                ));
            }
        };

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return ScriptOutcome::failure(format!(
                    "Script execution error: {}: {}",
                    script.display(),
                    e
                ));
            }
            Err(_) => {
                return ScriptOutcome::failure(format!(
                    "Script timed out after {}s: {}",
                    self.timeout.as_secs(),
                    script.display()
                ));
            }
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            if !combined.is_empty() {
                combined.push('\n');
            }
            combined.push_str(&stderr);
        }

        if output.status.success() {
            ScriptOutcome {
                success: true,
                output: combined,
            }
        } else {
            ScriptOutcome::failure(format!(
                "Script failed with code {:?}: {}",
                output.status.code(),
                combined
            ))
        }
    }
}

/// Resolve a script path relative to a base directory unless absolute.
pub fn resolve_script(base: &Path, script: &Path) -> PathBuf {
    if script.is_absolute() {
        script.to_path_buf()
    } else {
        base.join(script)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn write_script(temp: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = temp.path().join(name);
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_missing_script_is_failure_not_error() {
        let runner = ScriptRunner::default();
        let outcome = runner.run(Path::new("/nonexistent/script.sh"), &[]).await;
        assert!(!outcome.success);
        assert!(outcome.output.contains("Script not found"));
    }

    #[tokio::test]
    async fn test_successful_script_captures_stdout() {
        let temp = TempDir::new().unwrap();
        let script = write_script(&temp, "ok.sh", "echo hello");

        let runner = ScriptRunner::default();
        let outcome = runner.run(&script, &[]).await;
        assert!(outcome.success);
        assert!(outcome.output.contains("hello"));
    }

    #[tokio::test]
    async fn test_script_arguments_are_passed() {
        let temp = TempDir::new().unwrap();
        let script = write_script(&temp, "args.sh", "echo \"$1\"");

        let runner = ScriptRunner::default();
        let outcome = runner.run(&script, &["--once".to_string()]).await;
        assert!(outcome.success);
        assert!(outcome.output.contains("--once"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure_with_output() {
        let temp = TempDir::new().unwrap();
        let script = write_script(&temp, "fail.sh", "echo diagnostics >&2\nexit 3");

        let runner = ScriptRunner::default();
        let outcome = runner.run(&script, &[]).await;
        assert!(!outcome.success);
        assert!(outcome.output.contains("code Some(3)"));
        assert!(outcome.output.contains("diagnostics"));
    }

    #[tokio::test]
    async fn test_timeout_is_failure() {
        let temp = TempDir::new().unwrap();
        let script = write_script(&temp, "slow.sh", "sleep 5");

        let runner = ScriptRunner::new(Duration::from_millis(100));
        let outcome = runner.run(&script, &[]).await;
        assert!(!outcome.success);
        assert!(outcome.output.contains("timed out"));
    }

    #[tokio::test]
    async fn test_stdout_and_stderr_combined() {
        let temp = TempDir::new().unwrap();
        let script = write_script(&temp, "both.sh", "echo out\necho err >&2");

        let runner = ScriptRunner::default();
        let outcome = runner.run(&script, &[]).await;
        assert!(outcome.success);
        assert!(outcome.output.contains("out"));
        assert!(outcome.output.contains("err"));
    }

    #[test]
    fn test_resolve_script_relative() {
        let resolved = resolve_script(Path::new("/vault"), Path::new("scripts/watch.sh"));
        assert_eq!(resolved, PathBuf::from("/vault/scripts/watch.sh"));
    }

    #[test]
    fn test_resolve_script_absolute() {
        let resolved = resolve_script(Path::new("/vault"), Path::new("/usr/bin/watch.sh"));
        assert_eq!(resolved, PathBuf::from("/usr/bin/watch.sh"));
    }

    #[test]
    fn test_default_timeout() {
        let runner = ScriptRunner::default();
        assert_eq!(runner.timeout(), Duration::from_secs(300));
    }
}
