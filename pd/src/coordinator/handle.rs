//! CoordinatorHandle - Client interface for the pairing operations

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::messages::{CoordRequest, CoordinatorMetrics};
use crate::domain::{MatchOutcome, PairingError, PairingResult, PairingStatus, UserId};

/// Handle for talking to the Coordinator task
///
/// This handle is cloneable and can be shared across connections and tasks.
/// Every operation is a single message to the coordinator, so each one is
/// applied atomically with respect to all the others.
#[derive(Clone, Debug)]
pub struct CoordinatorHandle {
    /// Sender to the Coordinator task
    tx: mpsc::Sender<CoordRequest>,
}

impl CoordinatorHandle {
    pub(crate) fn new(tx: mpsc::Sender<CoordRequest>) -> Self {
        debug!("CoordinatorHandle::new: called");
        Self { tx }
    }

    async fn send(&self, req: CoordRequest) -> Result<(), PairingError> {
        self.tx.send(req).await.map_err(|_| PairingError::CoordinatorClosed)
    }

    /// Find a partner, or join the waiting queue
    ///
    /// If a match is found this waits for the meeting link before returning.
    pub async fn request_partner(&self, user: &UserId) -> Result<MatchOutcome, PairingError> {
        debug!(%user, "CoordinatorHandle::request_partner: called");
        let (reply_tx, reply_rx) = oneshot::channel();

        self.send(CoordRequest::RequestPartner {
            user: user.clone(),
            reply_tx,
        })
        .await?;

        debug!("CoordinatorHandle::request_partner: waiting for reply");
        reply_rx.await.map_err(|_| PairingError::CoordinatorClosed)?
    }

    /// Check status; a `Paired` answer is handed out only once
    pub async fn poll_status(&self, user: &UserId) -> Result<PairingStatus, PairingError> {
        debug!(%user, "CoordinatorHandle::poll_status: called");
        let (reply_tx, reply_rx) = oneshot::channel();

        self.send(CoordRequest::PollStatus {
            user: user.clone(),
            reply_tx,
        })
        .await?;

        reply_rx.await.map_err(|_| PairingError::CoordinatorClosed)
    }

    /// Leave the waiting queue; returns whether the user was queued
    pub async fn cancel_wait(&self, user: &UserId) -> Result<bool, PairingError> {
        debug!(%user, "CoordinatorHandle::cancel_wait: called");
        let (reply_tx, reply_rx) = oneshot::channel();

        self.send(CoordRequest::CancelWait {
            user: user.clone(),
            reply_tx,
        })
        .await?;

        reply_rx.await.map_err(|_| PairingError::CoordinatorClosed)
    }

    /// Hand back a `Paired` result the caller could not deliver
    ///
    /// Returns whether the coordinator is holding it for the next poll.
    pub async fn return_result(&self, user: &UserId, result: PairingResult) -> Result<bool, PairingError> {
        debug!(%user, "CoordinatorHandle::return_result: called");
        let (reply_tx, reply_rx) = oneshot::channel();

        self.send(CoordRequest::ReturnResult {
            user: user.clone(),
            result,
            reply_tx,
        })
        .await?;

        reply_rx.await.map_err(|_| PairingError::CoordinatorClosed)
    }

    /// Get current coordinator metrics
    pub async fn metrics(&self) -> Result<CoordinatorMetrics, PairingError> {
        debug!("CoordinatorHandle::metrics: called");
        let (reply_tx, reply_rx) = oneshot::channel();

        self.send(CoordRequest::GetMetrics { reply_tx }).await?;

        debug!("CoordinatorHandle::metrics: waiting for reply");
        reply_rx.await.map_err(|_| PairingError::CoordinatorClosed)
    }

    /// Request shutdown of the Coordinator
    pub async fn shutdown(&self) -> Result<(), PairingError> {
        debug!("CoordinatorHandle::shutdown: called");
        self.send(CoordRequest::Shutdown).await
    }
}
