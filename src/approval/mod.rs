//! Human-in-the-loop approvals.
//!
//! Sensitive actions are written into the vault as Markdown documents under
//! Needs_Approval with a `status: PENDING` line. A human edits the status
//! line to APPROVED or REJECTED; the store polls the file from disk to read
//! the decision. No watcher or IPC is involved, the file is the protocol.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{Result, SilverdError};
use crate::vault::{now_stamp, Vault};

/// Decision state as read from the request document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalState {
    Pending,
    Approved,
    Rejected,
}

/// Final disposition of a request after waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalOutcome {
    Approved,
    Rejected,
    Timeout,
}

impl ApprovalOutcome {
    fn prefix(&self) -> &'static str {
        match self {
            ApprovalOutcome::Approved => "approved_",
            ApprovalOutcome::Rejected => "rejected_",
            ApprovalOutcome::Timeout => "timeout_",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ApprovalOutcome::Approved => "APPROVED",
            ApprovalOutcome::Rejected => "REJECTED",
            ApprovalOutcome::Timeout => "TIMED OUT",
        }
    }
}

/// A request for human sign-off on an action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub request_id: String,
    pub created_at: String,
    pub action_name: String,
    pub payload: serde_json::Value,
    pub status: ApprovalState,
    pub approver: Option<String>,
    pub decision_date: Option<String>,
}

impl ApprovalRequest {
    pub fn new(action_name: impl Into<String>, payload: serde_json::Value) -> Self {
        let action_name = action_name.into();
        Self {
            request_id: generate_request_id(&action_name),
            created_at: now_stamp(),
            action_name,
            payload,
            status: ApprovalState::Pending,
            approver: None,
            decision_date: None,
        }
    }
}

/// Where approval requests live and how decisions are read back.
pub trait ApprovalStore {
    /// Persist a request and return its id.
    fn submit(&self, request: &ApprovalRequest) -> Result<String>;

    /// Read the current decision for a request.
    fn poll(&self, request_id: &str) -> Result<ApprovalState>;
}

/// Vault-backed store: one Markdown document per request.
pub struct FileApprovalStore {
    vault: Vault,
}

impl FileApprovalStore {
    pub fn new(vault: Vault) -> Self {
        Self { vault }
    }

    fn request_path(&self, request_id: &str) -> PathBuf {
        self.vault.needs_approval().join(format!("{}.md", request_id))
    }

    /// Poll until the request is decided or the timeout elapses.
    pub async fn wait_for_decision(
        &self,
        request_id: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<ApprovalOutcome> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match self.poll(request_id)? {
                ApprovalState::Approved => return Ok(ApprovalOutcome::Approved),
                ApprovalState::Rejected => return Ok(ApprovalOutcome::Rejected),
                ApprovalState::Pending => {}
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(ApprovalOutcome::Timeout);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Move the request document out of Needs_Approval and stamp the outcome.
    /// Approved and rejected requests are archived; timed-out requests go to
    /// Needs_Action for a human to revisit.
    pub fn finalize(&self, request_id: &str, outcome: ApprovalOutcome) -> Result<PathBuf> {
        let source = self.request_path(request_id);
        if !source.exists() {
            return Err(SilverdError::ApprovalNotFound(request_id.to_string()));
        }

        let target_dir = match outcome {
            ApprovalOutcome::Approved => self.vault.approved(),
            ApprovalOutcome::Rejected => self.vault.rejected(),
            ApprovalOutcome::Timeout => self.vault.needs_action(),
        };
        fs::create_dir_all(&target_dir)?;

        let file_name = format!("{}{}.md", outcome.prefix(), request_id);
        let mut target = target_dir.join(&file_name);
        if target.exists() {
            let stamp = chrono::Local::now().format("%Y%m%d%H%M%S");
            target = target_dir.join(format!("{}{}_{}.md", outcome.prefix(), request_id, stamp));
        }

        let mut content = fs::read_to_string(&source)?;
        content.push_str(&format!("\n*{} at {}*\n", outcome.label(), now_stamp()));
        fs::write(&target, content)?;
        fs::remove_file(&source)?;

        self.append_action_log(request_id, outcome)?;
        Ok(target)
    }

    fn append_action_log(&self, request_id: &str, outcome: ApprovalOutcome) -> Result<()> {
        use std::io::Write;
        let logs = self.vault.logs();
        fs::create_dir_all(&logs)?;
        let record = json!({
            "timestamp": now_stamp(),
            "request_id": request_id,
            "outcome": outcome.label(),
        });
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(logs.join("actions.jsonl"))?;
        writeln!(file, "{}", record)?;
        Ok(())
    }
}

impl ApprovalStore for FileApprovalStore {
    fn submit(&self, request: &ApprovalRequest) -> Result<String> {
        let dir = self.vault.needs_approval();
        fs::create_dir_all(&dir)?;

        let path = self.request_path(&request.request_id);
        if path.exists() {
            return Err(SilverdError::InvalidState(format!(
                "request {} was already submitted",
                request.request_id
            )));
        }

        let payload = mask_sensitive(&request.payload);
        let body = format!(
            "# Approval Request: {action}\n\n\
             - **Request ID**: {id}\n\
             - **Created**: {created}\n\n\
             ## Payload\n\n\
             ```json\n{payload}\n```\n\n\
             ## Decision\n\n\
             status: PENDING\n\n\
             Change the status line to `status: APPROVED` or `status: REJECTED`.\n",
            action = request.action_name,
            id = request.request_id,
            created = request.created_at,
            payload = serde_json::to_string_pretty(&payload)?,
        );
        fs::write(&path, body)?;

        self.vault.append_operation(&json!({
            "timestamp": now_stamp(),
            "operation": "approval_submitted",
            "request_id": request.request_id,
            "action": request.action_name,
        }))?;
        Ok(request.request_id.clone())
    }

    /// A missing document reads as pending: the request may not have been
    /// written yet, and a decision must be explicit.
    fn poll(&self, request_id: &str) -> Result<ApprovalState> {
        let path = self.request_path(request_id);
        if !path.exists() {
            return Ok(ApprovalState::Pending);
        }

        let content = fs::read_to_string(&path)?;
        for line in content.lines() {
            let line = line.trim().to_lowercase();
            if let Some(value) = line.strip_prefix("status:") {
                return Ok(match value.trim() {
                    "approved" => ApprovalState::Approved,
                    "rejected" => ApprovalState::Rejected,
                    _ => ApprovalState::Pending,
                });
            }
        }
        Ok(ApprovalState::Pending)
    }
}

/// Replace values of credential-like keys with "***" recursively.
fn mask_sensitive(value: &serde_json::Value) -> serde_json::Value {
    const SENSITIVE: &[&str] = &["password", "secret", "token", "api_key", "credential"];
    match value {
        serde_json::Value::Object(map) => {
            let mut masked = serde_json::Map::new();
            for (key, val) in map {
                let lowered = key.to_lowercase();
                if SENSITIVE.iter().any(|s| lowered.contains(s)) {
                    masked.insert(key.clone(), json!("***"));
                } else {
                    masked.insert(key.clone(), mask_sensitive(val));
                }
            }
            serde_json::Value::Object(masked)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(mask_sensitive).collect())
        }
        other => other.clone(),
    }
}

fn generate_request_id(action_name: &str) -> String {
    let slug: String = action_name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let now_ms = chrono::Local::now().timestamp_millis();
    let salt: u16 = rand::rng().random();
    format!("{}-{}-{:04x}", slug, now_ms, salt)
}
