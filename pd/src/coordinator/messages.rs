//! Message types for the Coordinator

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::domain::{MatchOutcome, PairingError, PairingResult, PairingStatus, UserId};
use crate::links::LinkError;

/// Internal requests to the Coordinator task
#[derive(Debug)]
pub enum CoordRequest {
    /// Find a partner for a user, or queue them
    RequestPartner {
        user: UserId,
        reply_tx: oneshot::Sender<Result<MatchOutcome, PairingError>>,
    },

    /// Consuming status read for a user
    PollStatus {
        user: UserId,
        reply_tx: oneshot::Sender<PairingStatus>,
    },

    /// Remove a user from the waiting queue; replies whether they were queued
    CancelWait {
        user: UserId,
        reply_tx: oneshot::Sender<bool>,
    },

    /// Put back a `Paired` result that could not be delivered
    ///
    /// Replies whether it is being held for the user's next poll.
    ReturnResult {
        user: UserId,
        result: PairingResult,
        reply_tx: oneshot::Sender<bool>,
    },

    /// Link generation finished for a reserved match (internal)
    MatchLinked { match_id: Uuid, link: String },

    /// Link generation failed for a reserved match (internal)
    MatchFailed { match_id: Uuid, error: LinkError },

    /// Get current metrics
    GetMetrics {
        reply_tx: oneshot::Sender<CoordinatorMetrics>,
    },

    /// Shutdown the coordinator
    Shutdown,
}

/// Coordinator metrics for observability
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorMetrics {
    pub waiting: usize,
    #[serde(rename = "pending-results")]
    pub pending_results: usize,
    #[serde(rename = "matches-in-flight")]
    pub matches_in_flight: usize,
    #[serde(rename = "matches-completed")]
    pub matches_completed: u64,
    #[serde(rename = "link-failures")]
    pub link_failures: u64,
    #[serde(rename = "requests-received")]
    pub requests_received: u64,
}
