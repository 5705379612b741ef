//! Client-side wait session
//!
//! A [`WaitSession`] asks for a partner once and, while the answer is
//! "waiting", polls on a fixed interval until it gets a result, hits an
//! error, or is cancelled. The same loop drives both the in-process
//! coordinator and a remote daemon through [`PairingService`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::coordinator::CoordinatorHandle;
use crate::domain::{MatchOutcome, PairingError, PairingStatus, UserId};
use crate::ipc::DaemonClient;

/// Default interval between status polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(3000);

/// Shortest interval a session will poll at
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// The three pairing operations as seen from a waiting user
#[async_trait]
pub trait PairingService: Send + Sync {
    /// Ask to be paired; `Waiting` means the caller should start polling
    async fn find_partner(&self, user: &UserId) -> Result<PairingStatus, PairingError>;

    /// Consuming status read
    async fn check_status(&self, user: &UserId) -> Result<PairingStatus, PairingError>;

    /// Best-effort removal from the queue; failures are only logged
    async fn cancel_wait(&self, user: &UserId);
}

#[async_trait]
impl PairingService for CoordinatorHandle {
    async fn find_partner(&self, user: &UserId) -> Result<PairingStatus, PairingError> {
        self.request_partner(user).await.map(MatchOutcome::into_status)
    }

    async fn check_status(&self, user: &UserId) -> Result<PairingStatus, PairingError> {
        self.poll_status(user).await
    }

    async fn cancel_wait(&self, user: &UserId) {
        if let Err(e) = CoordinatorHandle::cancel_wait(self, user).await {
            warn!(%user, error = %e, "cancel_wait: coordinator unavailable");
        }
    }
}

#[async_trait]
impl PairingService for DaemonClient {
    async fn find_partner(&self, user: &UserId) -> Result<PairingStatus, PairingError> {
        let view = DaemonClient::find_partner(self, user.as_str())
            .await
            .map_err(into_pairing_error)?;
        view.into_status()
    }

    async fn check_status(&self, user: &UserId) -> Result<PairingStatus, PairingError> {
        let view = DaemonClient::check_status(self, user.as_str())
            .await
            .map_err(into_pairing_error)?;
        view.into_status()
    }

    async fn cancel_wait(&self, user: &UserId) {
        if let Err(e) = DaemonClient::cancel_wait(self, user.as_str()).await {
            warn!(%user, error = %e, "cancel_wait: daemon request failed");
        }
    }
}

/// Recover a daemon-reported error, otherwise treat it as a transport failure
fn into_pairing_error(report: eyre::Report) -> PairingError {
    match report.downcast::<PairingError>() {
        Ok(err) => err,
        Err(report) => PairingError::Transport(format!("{:#}", report)),
    }
}

/// One user's search for a partner
pub struct WaitSession {
    service: Arc<dyn PairingService>,
    name: String,
    poll_interval: Duration,
}

impl WaitSession {
    /// `poll_interval` is raised to [`MIN_POLL_INTERVAL`] if shorter
    pub fn new(service: Arc<dyn PairingService>, name: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            service,
            name: name.into(),
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
        }
    }

    /// Run until paired, failed, or cancelled
    ///
    /// A message on `cancel_rx` ends the session with `Idle`. Dropping the
    /// sender does not cancel.
    pub async fn run(self, mut cancel_rx: mpsc::Receiver<()>) -> PairingStatus {
        debug!(name = %self.name, poll_interval = ?self.poll_interval, "WaitSession::run: called");

        let user = match UserId::parse(&self.name) {
            Ok(user) => user,
            Err(e) => return error_status(&e),
        };

        let first = tokio::select! {
            result = self.service.find_partner(&user) => result,
            Some(()) = cancel_rx.recv() => {
                info!(%user, "Search cancelled");
                self.service.cancel_wait(&user).await;
                return PairingStatus::Idle;
            }
        };

        match first {
            Ok(PairingStatus::Waiting) => {
                info!(%user, "Waiting for a partner");
            }
            Ok(status) => {
                debug!(%user, status = status.label(), "WaitSession::run: resolved on first request");
                return status;
            }
            Err(e) => {
                warn!(%user, error = %e, "Partner request failed");
                self.service.cancel_wait(&user).await;
                return error_status(&e);
            }
        }

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.service.check_status(&user).await {
                        Ok(PairingStatus::Waiting) => {
                            debug!(%user, "WaitSession::run: still waiting");
                        }
                        Ok(PairingStatus::Idle) => {
                            warn!(%user, "No longer queued, ending search");
                            return PairingStatus::Idle;
                        }
                        Ok(status) => {
                            info!(%user, status = status.label(), "Search finished");
                            return status;
                        }
                        Err(e) => {
                            warn!(%user, error = %e, "Status poll failed");
                            self.service.cancel_wait(&user).await;
                            return error_status(&e);
                        }
                    }
                }

                Some(()) = cancel_rx.recv() => {
                    info!(%user, "Search cancelled");
                    self.service.cancel_wait(&user).await;
                    return PairingStatus::Idle;
                }
            }
        }
    }
}

fn error_status(err: &PairingError) -> PairingStatus {
    PairingStatus::Error {
        message: err.to_string(),
        retryable: err.is_retryable(),
    }
}
