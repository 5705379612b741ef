//! Pairing results and per-user status

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UserId;

/// What one side of a match receives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingResult {
    /// The other participant
    #[serde(rename = "partner-id")]
    pub partner_id: UserId,

    /// Meeting link shared by both participants
    #[serde(rename = "meeting-link")]
    pub meeting_link: String,

    /// When the match was committed
    #[serde(rename = "paired-at")]
    pub paired_at: DateTime<Utc>,
}

impl PairingResult {
    pub fn new(partner_id: UserId, meeting_link: impl Into<String>, paired_at: DateTime<Utc>) -> Self {
        Self {
            partner_id,
            meeting_link: meeting_link.into(),
            paired_at,
        }
    }
}

/// Result of a `request_partner` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// A waiter was found; this is the caller's half of the match
    Paired(PairingResult),

    /// The caller joined the tail of the waiting queue
    Waiting,

    /// The caller was already waiting, matching, or holding an unread result
    NoOp,
}

impl MatchOutcome {
    /// Client-facing view: a no-op reads as "already waiting"
    pub fn into_status(self) -> PairingStatus {
        match self {
            MatchOutcome::Paired(result) => PairingStatus::Paired(result),
            MatchOutcome::Waiting | MatchOutcome::NoOp => PairingStatus::Waiting,
        }
    }
}

/// Per-user pairing status, derived on every request and never stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingStatus {
    Idle,
    Waiting,
    Paired(PairingResult),
    Error { message: String, retryable: bool },
}

impl PairingStatus {
    /// Short uppercase label used on the wire and in the CLI
    pub fn label(&self) -> &'static str {
        match self {
            PairingStatus::Idle => "IDLE",
            PairingStatus::Waiting => "WAITING",
            PairingStatus::Paired(_) => "PAIRED",
            PairingStatus::Error { .. } => "ERROR",
        }
    }

    pub fn is_paired(&self) -> bool {
        matches!(self, PairingStatus::Paired(_))
    }
}
