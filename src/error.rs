//! Error types for silverd.
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur in silverd
#[derive(Debug, Error)]
pub enum SilverdError {
    /// Another instance already holds the scheduler lock
    #[error("Lock contention: {0}")]
    LockContention(String),

    /// Approval request not found in the store
    #[error("Approval request not found: {0}")]
    ApprovalNotFound(String),

    /// Invalid state transition or operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Vault directory error
    #[error("Vault error: {0}")]
    Vault(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for silverd operations
pub type Result<T> = std::result::Result<T, SilverdError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_contention_error() {
        let err = SilverdError::LockContention("pid 1234".to_string());
        assert_eq!(err.to_string(), "Lock contention: pid 1234");
    }

    #[test]
    fn test_approval_not_found_error() {
        let err = SilverdError::ApprovalNotFound("email-001".to_string());
        assert_eq!(err.to_string(), "Approval request not found: email-001");
    }

    #[test]
    fn test_invalid_state_error() {
        let err = SilverdError::InvalidState("already finalized".to_string());
        assert_eq!(err.to_string(), "Invalid state: already finalized");
    }

    #[test]
    fn test_vault_error() {
        let err = SilverdError::Vault("Inbox is not a directory".to_string());
        assert_eq!(err.to_string(), "Vault error: Inbox is not a directory");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: SilverdError = io_err.into();
        assert!(matches!(err, SilverdError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: SilverdError = json_err.into();
        assert!(matches!(err, SilverdError::Json(_)));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<i32> {
            Ok(42)
        }

        fn returns_err() -> Result<i32> {
            Err(SilverdError::InvalidState("test".to_string()))
        }

        assert!(returns_ok().is_ok());
        assert!(returns_err().is_err());
    }
}
