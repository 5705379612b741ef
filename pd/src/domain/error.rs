//! Pairing error types

use thiserror::Error;

use crate::links::LinkError;

/// Errors surfaced by pairing operations
#[derive(Debug, Error)]
pub enum PairingError {
    /// Empty or missing user name, rejected at the boundary
    #[error("A valid name is required (got {0:?})")]
    InvalidUser(String),

    /// Name longer than the wire protocol allows
    #[error("Name is too long ({len} bytes, at most {max})")]
    NameTooLong { len: usize, max: usize },

    /// The meeting-link collaborator failed; the partner was put back at the head of the queue
    #[error("Meeting link generation failed: {0}")]
    LinkGeneration(#[from] LinkError),

    /// The coordinator task is gone (shut down or crashed)
    #[error("Pairing coordinator is unavailable")]
    CoordinatorClosed,

    /// The daemon could not be reached or answered garbage
    #[error("Failed to reach the pairing service: {0}")]
    Transport(String),

    /// The daemon reported a failure
    #[error("{message}")]
    Remote { message: String, retryable: bool },
}

impl PairingError {
    /// Check if the caller may simply try again
    pub fn is_retryable(&self) -> bool {
        match self {
            PairingError::InvalidUser(_) => false,
            PairingError::NameTooLong { .. } => false,
            PairingError::LinkGeneration(_) => true,
            PairingError::CoordinatorClosed => true,
            PairingError::Transport(_) => true,
            PairingError::Remote { retryable, .. } => *retryable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_invalid_user_not_retryable() {
        assert!(!PairingError::InvalidUser(String::new()).is_retryable());
        assert!(!PairingError::NameTooLong { len: 300, max: 256 }.is_retryable());
    }

    #[test]
    fn test_link_failure_is_retryable() {
        // Even a permanent collaborator error leaves the requester free to retry
        let err = PairingError::from(LinkError::InvalidResponse("no link".to_string()));
        assert!(err.is_retryable());

        let err = PairingError::from(LinkError::Timeout(Duration::from_secs(5)));
        assert!(err.is_retryable());
        assert!(err.to_string().contains("Meeting link generation failed"));
    }

    #[test]
    fn test_coordinator_closed_is_retryable() {
        assert!(PairingError::CoordinatorClosed.is_retryable());
        assert!(PairingError::Transport("connection refused".to_string()).is_retryable());
    }

    #[test]
    fn test_remote_error_keeps_flag() {
        let err = PairingError::Remote {
            message: "A valid name is required".to_string(),
            retryable: false,
        };
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "A valid name is required");
    }
}
