//! Main Coordinator task implementation

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::CoordinatorConfig;
use super::handle::CoordinatorHandle;
use super::messages::{CoordRequest, CoordinatorMetrics};
use super::state::{PairingState, RequestStep, Reservation};
use crate::domain::{MatchOutcome, PairingError, PairingStatus, UserId};
use crate::links::{LinkError, LinkGenerator};

type OutcomeReply = oneshot::Sender<Result<MatchOutcome, PairingError>>;

/// The Coordinator owns the waiting queue and the unread results
///
/// All state lives inside [`Coordinator::run`] and is touched by that task
/// only. Link generation runs on spawned tasks and reports back through the
/// same request channel, so the loop never waits on the network.
pub struct Coordinator {
    config: CoordinatorConfig,
    links: Arc<dyn LinkGenerator>,
    tx: mpsc::Sender<CoordRequest>,
    rx: mpsc::Receiver<CoordRequest>,
}

impl Coordinator {
    /// Create a new Coordinator with the given configuration and link source
    pub fn new(config: CoordinatorConfig, links: Arc<dyn LinkGenerator>) -> Self {
        let (tx, rx) = mpsc::channel(config.channel_buffer);
        Self { config, links, tx, rx }
    }

    /// Get a sender for creating handles
    pub fn sender(&self) -> mpsc::Sender<CoordRequest> {
        self.tx.clone()
    }

    /// Create a handle for issuing pairing operations
    pub fn handle(&self) -> CoordinatorHandle {
        CoordinatorHandle::new(self.tx.clone())
    }

    /// Run the Coordinator task
    ///
    /// This consumes the Coordinator and runs until shutdown is requested.
    /// Requesters still waiting on a link at shutdown see
    /// [`PairingError::CoordinatorClosed`].
    pub async fn run(mut self) {
        let mut state = PairingState::new();
        let mut awaiting_link: HashMap<Uuid, OutcomeReply> = HashMap::new();

        // Metrics
        let mut metrics = CoordinatorMetrics::default();

        info!("Coordinator started");

        while let Some(req) = self.rx.recv().await {
            match req {
                CoordRequest::RequestPartner { user, reply_tx } => {
                    metrics.requests_received += 1;

                    match state.begin_request(user.clone()) {
                        RequestStep::NoOp => {
                            debug!(%user, "Duplicate request ignored");
                            let _ = reply_tx.send(Ok(MatchOutcome::NoOp));
                        }
                        RequestStep::Enqueued => {
                            info!(%user, waiting = state.waiting(), "User is now waiting");
                            let _ = reply_tx.send(Ok(MatchOutcome::Waiting));
                        }
                        RequestStep::Reserved(reservation) => {
                            info!(
                                match_id = %reservation.match_id,
                                requester = %reservation.requester,
                                partner = %reservation.partner,
                                "Pairing users"
                            );
                            awaiting_link.insert(reservation.match_id, reply_tx);
                            self.spawn_link_generation(&reservation);
                        }
                    }
                }

                CoordRequest::MatchLinked { match_id, link } => {
                    let Some(committed) = state.commit_match(match_id, link, Utc::now()) else {
                        warn!(%match_id, "Link arrived for unknown match");
                        continue;
                    };
                    metrics.matches_completed += 1;

                    info!(
                        %match_id,
                        requester = %committed.requester,
                        partner = %committed.partner,
                        "Pairing complete"
                    );

                    let outcome = Ok(MatchOutcome::Paired(committed.requester_result.clone()));
                    let delivered = match awaiting_link.remove(&match_id) {
                        Some(reply_tx) => reply_tx.send(outcome).is_ok(),
                        None => false,
                    };

                    // The requester hung up while the link was being made: keep
                    // their half for the next poll instead of dropping it
                    if !delivered {
                        warn!(%match_id, requester = %committed.requester, "Requester gone, holding result");
                        let requester = committed.requester.clone();
                        if !state.store_unclaimed(committed.requester, committed.requester_result) {
                            warn!(%match_id, %requester, "Could not hold result for requester");
                        }
                    }
                }

                CoordRequest::MatchFailed { match_id, error } => {
                    metrics.link_failures += 1;

                    match state.abort_match(match_id) {
                        Some(reservation) if reservation.partner_cancelled() => {
                            warn!(%match_id, error = %error, partner = %reservation.partner, "Link generation failed; partner had cancelled");
                        }
                        Some(reservation) => {
                            warn!(%match_id, error = %error, partner = %reservation.partner, "Link generation failed; partner back at head of queue");
                        }
                        None => {
                            warn!(%match_id, error = %error, "Link failure for unknown match");
                        }
                    }

                    if let Some(reply_tx) = awaiting_link.remove(&match_id) {
                        let _ = reply_tx.send(Err(PairingError::LinkGeneration(error)));
                    }
                }

                CoordRequest::PollStatus { user, reply_tx } => {
                    let status = state.poll(&user);
                    debug!(%user, status = status.label(), "Status polled");
                    // A consumed result whose reader vanished goes back for the next poll
                    if let Err(PairingStatus::Paired(result)) = reply_tx.send(status) {
                        warn!(%user, "Poller gone, holding result");
                        state.store_unclaimed(user, result);
                    }
                }

                CoordRequest::ReturnResult { user, result, reply_tx } => {
                    let held = state.store_unclaimed(user.clone(), result);
                    if held {
                        info!(%user, "Undelivered result returned, holding for next poll");
                    } else {
                        warn!(%user, "Undelivered result dropped, user already has a newer match");
                    }
                    let _ = reply_tx.send(held);
                }

                CoordRequest::CancelWait { user, reply_tx } => {
                    let removed = state.cancel(&user);
                    if removed {
                        info!(%user, "User cancelled their search");
                    } else {
                        debug!(%user, "Cancel for user not in queue");
                    }
                    let _ = reply_tx.send(removed);
                }

                CoordRequest::GetMetrics { reply_tx } => {
                    metrics.waiting = state.waiting();
                    metrics.pending_results = state.pending_results();
                    metrics.matches_in_flight = state.matches_in_flight();
                    let _ = reply_tx.send(metrics.clone());
                }

                CoordRequest::Shutdown => {
                    info!("Coordinator shutting down");
                    break;
                }
            }

            debug_assert!(state.check_invariants().is_ok(), "{:?}", state.check_invariants());
        }

        if !awaiting_link.is_empty() {
            warn!(count = awaiting_link.len(), "Coordinator stopped with matches in flight");
        }
        info!("Coordinator stopped");
    }

    /// Generate the meeting link off the coordinator task
    fn spawn_link_generation(&self, reservation: &Reservation) {
        let links = Arc::clone(&self.links);
        let tx = self.tx.clone();
        let timeout = self.config.link_timeout();
        let match_id = reservation.match_id;
        let requester = reservation.requester.clone();
        let partner = reservation.partner.clone();

        tokio::spawn(async move {
            let result = generate_with_timeout(links.as_ref(), &requester, &partner, timeout).await;
            let msg = match result {
                Ok(link) => CoordRequest::MatchLinked { match_id, link },
                Err(error) => CoordRequest::MatchFailed { match_id, error },
            };
            if tx.send(msg).await.is_err() {
                warn!(%match_id, "Coordinator gone before match could be settled");
            }
        });
    }
}

async fn generate_with_timeout(
    links: &dyn LinkGenerator,
    requester: &UserId,
    partner: &UserId,
    timeout: Duration,
) -> Result<String, LinkError> {
    match tokio::time::timeout(timeout, links.generate(requester, partner)).await {
        Ok(result) => result,
        Err(_) => Err(LinkError::Timeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::links::testing::ScriptedLinkGenerator;

    fn user(name: &str) -> UserId {
        UserId::parse(name).unwrap()
    }

    fn spawn(links: Arc<dyn LinkGenerator>) -> (CoordinatorHandle, tokio::task::JoinHandle<()>) {
        let coord = Coordinator::new(CoordinatorConfig::default(), links);
        let handle = coord.handle();
        let task = tokio::spawn(coord.run());
        (handle, task)
    }

    #[tokio::test]
    async fn test_alice_bob_scenario() {
        let (handle, task) = spawn(Arc::new(ScriptedLinkGenerator::new(vec![Ok("https://meet.test/X".to_string())])));

        assert_eq!(handle.request_partner(&user("Alice")).await.unwrap(), MatchOutcome::Waiting);

        let bob = match handle.request_partner(&user("Bob")).await.unwrap() {
            MatchOutcome::Paired(result) => result,
            other => panic!("expected Paired, got {:?}", other),
        };
        assert_eq!(bob.partner_id, user("Alice"));
        assert_eq!(bob.meeting_link, "https://meet.test/X");

        let alice = match handle.poll_status(&user("Alice")).await.unwrap() {
            PairingStatus::Paired(result) => result,
            other => panic!("expected Paired, got {:?}", other),
        };
        assert_eq!(alice.partner_id, user("Bob"));
        assert_eq!(alice.meeting_link, bob.meeting_link);
        assert_eq!(alice.paired_at, bob.paired_at);

        assert_eq!(handle.poll_status(&user("Alice")).await.unwrap(), PairingStatus::Idle);
        assert_eq!(handle.poll_status(&user("Bob")).await.unwrap(), PairingStatus::Idle);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_carol_cancel_scenario() {
        let (handle, task) = spawn(Arc::new(ScriptedLinkGenerator::new(vec![])));

        assert_eq!(handle.request_partner(&user("Carol")).await.unwrap(), MatchOutcome::Waiting);
        assert!(handle.cancel_wait(&user("Carol")).await.unwrap());
        assert_eq!(handle.poll_status(&user("Carol")).await.unwrap(), PairingStatus::Idle);

        // Cancelling again is a harmless no-op
        assert!(!handle.cancel_wait(&user("Carol")).await.unwrap());

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_dave_duplicate_request() {
        let (handle, task) = spawn(Arc::new(ScriptedLinkGenerator::new(vec![])));

        assert_eq!(handle.request_partner(&user("Dave")).await.unwrap(), MatchOutcome::Waiting);
        assert_eq!(handle.request_partner(&user("Dave")).await.unwrap(), MatchOutcome::NoOp);

        let metrics = handle.metrics().await.unwrap();
        assert_eq!(metrics.waiting, 1);
        assert_eq!(metrics.requests_received, 2);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_link_failure_requeues_partner_and_surfaces_error() {
        let links = Arc::new(ScriptedLinkGenerator::new(vec![Err(LinkError::Api {
            status: 503,
            message: "calendar down".to_string(),
        })]));
        let (handle, task) = spawn(links.clone());

        handle.request_partner(&user("Alice")).await.unwrap();
        let err = handle.request_partner(&user("Bob")).await.unwrap_err();
        assert!(matches!(err, PairingError::LinkGeneration(_)));
        assert!(err.is_retryable());

        // Alice is still waiting and Bob is free to retry
        assert_eq!(handle.poll_status(&user("Alice")).await.unwrap(), PairingStatus::Waiting);
        assert_eq!(handle.poll_status(&user("Bob")).await.unwrap(), PairingStatus::Idle);

        match handle.request_partner(&user("Bob")).await.unwrap() {
            MatchOutcome::Paired(result) => assert_eq!(result.partner_id, user("Alice")),
            other => panic!("expected Paired on retry, got {:?}", other),
        }
        assert_eq!(links.call_count(), 2);

        let metrics = handle.metrics().await.unwrap();
        assert_eq!(metrics.link_failures, 1);
        assert_eq!(metrics.matches_completed, 1);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_link_timeout_counts_as_failure() {
        let links = Arc::new(ScriptedLinkGenerator::new(vec![]).with_delay(Duration::from_secs(5)));
        let config = CoordinatorConfig {
            link_timeout_secs: 0,
            ..Default::default()
        };
        let coord = Coordinator::new(config, links);
        let handle = coord.handle();
        let task = tokio::spawn(coord.run());

        handle.request_partner(&user("Alice")).await.unwrap();
        let err = handle.request_partner(&user("Bob")).await.unwrap_err();
        assert!(matches!(err, PairingError::LinkGeneration(LinkError::Timeout(_))));
        assert_eq!(handle.poll_status(&user("Alice")).await.unwrap(), PairingStatus::Waiting);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_match_in_progress_reads_as_waiting() {
        let links = Arc::new(ScriptedLinkGenerator::new(vec![]).with_delay(Duration::from_millis(200)));
        let (handle, task) = spawn(links);

        handle.request_partner(&user("Alice")).await.unwrap();

        let bob_handle = handle.clone();
        let bob = tokio::spawn(async move { bob_handle.request_partner(&user("Bob")).await });

        // The coordinator keeps answering while the link is being generated
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(handle.poll_status(&user("Alice")).await.unwrap(), PairingStatus::Waiting);
        assert_eq!(handle.request_partner(&user("Alice")).await.unwrap(), MatchOutcome::NoOp);
        assert_eq!(handle.metrics().await.unwrap().matches_in_flight, 1);

        // Cancelling mid-match does not roll the match back
        assert!(!handle.cancel_wait(&user("Alice")).await.unwrap());

        assert!(matches!(bob.await.unwrap().unwrap(), MatchOutcome::Paired(_)));
        assert!(handle.poll_status(&user("Alice")).await.unwrap().is_paired());

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_abandoned_requester_gets_result_on_poll() {
        let links = Arc::new(ScriptedLinkGenerator::new(vec![]).with_delay(Duration::from_millis(100)));
        let coord = Coordinator::new(CoordinatorConfig::default(), links);
        let sender = coord.sender();
        let handle = coord.handle();
        let task = tokio::spawn(coord.run());

        handle.request_partner(&user("Alice")).await.unwrap();

        // Bob asks and immediately hangs up
        let (reply_tx, reply_rx) = oneshot::channel();
        sender
            .send(CoordRequest::RequestPartner {
                user: user("Bob"),
                reply_tx,
            })
            .await
            .unwrap();
        drop(reply_rx);

        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(handle.poll_status(&user("Bob")).await.unwrap().is_paired());
        assert!(handle.poll_status(&user("Alice")).await.unwrap().is_paired());
        assert_eq!(handle.poll_status(&user("Bob")).await.unwrap(), PairingStatus::Idle);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_poller_gone_keeps_result() {
        let coord = Coordinator::new(
            CoordinatorConfig::default(),
            Arc::new(ScriptedLinkGenerator::new(vec![])),
        );
        let sender = coord.sender();
        let handle = coord.handle();
        let task = tokio::spawn(coord.run());

        handle.request_partner(&user("Alice")).await.unwrap();
        handle.request_partner(&user("Bob")).await.unwrap();

        // Alice's poll is consumed by a reader that is already gone
        let (reply_tx, reply_rx) = oneshot::channel();
        drop(reply_rx);
        sender
            .send(CoordRequest::PollStatus {
                user: user("Alice"),
                reply_tx,
            })
            .await
            .unwrap();

        assert!(handle.poll_status(&user("Alice")).await.unwrap().is_paired());
        assert_eq!(handle.poll_status(&user("Alice")).await.unwrap(), PairingStatus::Idle);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_returned_result_is_held_for_next_poll() {
        let (handle, task) = spawn(Arc::new(ScriptedLinkGenerator::new(vec![])));

        handle.request_partner(&user("Alice")).await.unwrap();
        let bob = match handle.request_partner(&user("Bob")).await.unwrap() {
            MatchOutcome::Paired(result) => result,
            other => panic!("expected Paired, got {:?}", other),
        };

        assert!(handle.return_result(&user("Bob"), bob.clone()).await.unwrap());
        assert_eq!(handle.poll_status(&user("Bob")).await.unwrap(), PairingStatus::Paired(bob));
        assert_eq!(handle.poll_status(&user("Bob")).await.unwrap(), PairingStatus::Idle);

        handle.shutdown().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_fails_pending_operations() {
        let (handle, task) = spawn(Arc::new(ScriptedLinkGenerator::new(vec![])));

        handle.shutdown().await.unwrap();
        task.await.unwrap();

        let result = handle.request_partner(&user("Eve")).await;
        assert!(matches!(result, Err(PairingError::CoordinatorClosed)));
    }
}
