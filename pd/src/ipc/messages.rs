//! IPC message types for daemon communication
//!
//! Simple JSON-over-newline protocol. Each message is a single line of JSON followed by `\n`.
//! Pairing answers carry the `{"status": ...}` shapes clients already know:
//!
//! ```text
//! {"type":"Status","status":"PAIRED","partnerName":"Alice","meetLink":"https://..."}
//! {"type":"Status","status":"WAITING"}
//! {"type":"Status","status":"IDLE"}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::coordinator::CoordinatorMetrics;
use crate::domain::{PairingError, PairingResult, PairingStatus, UserId};

/// Messages from CLI to Daemon
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum DaemonMessage {
    /// Find a partner or join the waiting queue
    FindPartner { name: String },

    /// Poll pairing status (consumes a finished match)
    CheckStatus { name: String },

    /// Leave the waiting queue
    CancelWait { name: String },

    /// Fetch coordinator metrics
    Metrics,

    /// Ping to check if daemon is alive
    Ping,

    /// Request daemon to stop gracefully
    Shutdown,
}

/// Pairing status as seen on the wire
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusView {
    Paired {
        #[serde(rename = "partnerName")]
        partner_name: String,
        #[serde(rename = "meetLink")]
        meet_link: String,
        #[serde(rename = "pairedAt", default, skip_serializing_if = "Option::is_none")]
        paired_at: Option<DateTime<Utc>>,
    },
    Waiting,
    Idle,
}

impl StatusView {
    pub fn paired(result: &PairingResult) -> Self {
        StatusView::Paired {
            partner_name: result.partner_id.to_string(),
            meet_link: result.meeting_link.clone(),
            paired_at: Some(result.paired_at),
        }
    }

    /// Convert back into a domain status
    pub fn into_status(self) -> Result<PairingStatus, PairingError> {
        match self {
            StatusView::Paired {
                partner_name,
                meet_link,
                paired_at,
            } => {
                let partner = UserId::parse(&partner_name)
                    .map_err(|_| PairingError::Transport("daemon sent a pairing without a partner name".to_string()))?;
                Ok(PairingStatus::Paired(PairingResult::new(
                    partner,
                    meet_link,
                    paired_at.unwrap_or_else(Utc::now),
                )))
            }
            StatusView::Waiting => Ok(PairingStatus::Waiting),
            StatusView::Idle => Ok(PairingStatus::Idle),
        }
    }
}

/// Responses from Daemon to CLI
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum DaemonResponse {
    /// Pairing status for a find/check request
    Status(StatusView),

    /// Acknowledgment
    Ok,

    /// Pong response to ping
    Pong { version: String },

    /// Coordinator metrics
    Metrics(CoordinatorMetrics),

    /// Error response
    Error { message: String, retryable: bool },
}

impl DaemonResponse {
    /// Wire form of a domain status
    pub fn from_status(status: PairingStatus) -> Self {
        match status {
            PairingStatus::Idle => DaemonResponse::Status(StatusView::Idle),
            PairingStatus::Waiting => DaemonResponse::Status(StatusView::Waiting),
            PairingStatus::Paired(result) => DaemonResponse::Status(StatusView::paired(&result)),
            PairingStatus::Error { message, retryable } => DaemonResponse::Error { message, retryable },
        }
    }

    /// Wire form of a failed operation
    pub fn from_error(err: &PairingError) -> Self {
        DaemonResponse::Error {
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}
