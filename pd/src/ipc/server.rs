//! Request dispatch for the daemon side of the socket
//!
//! Each accepted connection gets its own task; all of them share one
//! [`CoordinatorHandle`], so concurrent clients are serialized by the
//! coordinator rather than by the accept loop.

use eyre::Result;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::listener::{peer_closed, read_message, send_response};
use super::messages::{DaemonMessage, DaemonResponse, StatusView};
use crate::VERSION;
use crate::coordinator::CoordinatorHandle;
use crate::domain::{PairingStatus, UserId};

/// Accept connections until a shutdown signal arrives
pub async fn serve(
    listener: UnixListener,
    handle: CoordinatorHandle,
    shutdown_tx: mpsc::Sender<()>,
    mut shutdown_rx: mpsc::Receiver<()>,
) -> Result<()> {
    info!("IPC server accepting connections");

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, _addr)) => {
                        debug!("serve: IPC connection accepted");
                        let handle = handle.clone();
                        let shutdown_tx = shutdown_tx.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, handle, shutdown_tx).await {
                                warn!(error = %e, "serve: IPC connection error");
                            }
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "serve: IPC accept error");
                    }
                }
            }

            _ = shutdown_rx.recv() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    Ok(())
}

/// Read one request, answer it, close
///
/// A `Paired` answer is the only copy of that result once the coordinator
/// has handed it out. If the client is gone by the time it is ready, or the
/// write fails, the result goes back to the coordinator for the next poll.
pub async fn handle_connection(
    mut stream: UnixStream,
    handle: CoordinatorHandle,
    shutdown_tx: mpsc::Sender<()>,
) -> Result<()> {
    let msg = match read_message(&mut stream).await {
        Ok(msg) => msg,
        Err(e) => {
            let response = DaemonResponse::Error {
                message: format!("{:#}", e),
                retryable: false,
            };
            return send_response(&mut stream, &response).await;
        }
    };

    let recipient = match &msg {
        DaemonMessage::FindPartner { name } | DaemonMessage::CheckStatus { name } => Some(name.clone()),
        _ => None,
    };

    let response = dispatch(msg, &handle, &shutdown_tx).await;

    let sent = if peer_closed(&stream).await {
        Err(eyre::eyre!("Client hung up before the answer was ready"))
    } else {
        send_response(&mut stream, &response).await
    };

    if let Err(e) = sent {
        if let (Some(name), DaemonResponse::Status(view @ StatusView::Paired { .. })) = (recipient, response) {
            return_undelivered(&handle, &name, view).await;
        }
        return Err(e);
    }
    Ok(())
}

/// Give an undelivered `Paired` answer back to the coordinator
async fn return_undelivered(handle: &CoordinatorHandle, name: &str, view: StatusView) {
    let (Ok(user), Ok(PairingStatus::Paired(result))) = (UserId::parse(name), view.into_status()) else {
        return;
    };
    match handle.return_result(&user, result).await {
        Ok(true) => info!(%user, "Undelivered pairing result kept for next poll"),
        Ok(false) => warn!(%user, "Undelivered pairing result dropped"),
        Err(e) => warn!(%user, error = %e, "Could not return undelivered pairing result"),
    }
}

/// Map one protocol message onto the coordinator
///
/// Names are validated here, before anything reaches the coordinator.
pub async fn dispatch(msg: DaemonMessage, handle: &CoordinatorHandle, shutdown_tx: &mpsc::Sender<()>) -> DaemonResponse {
    debug!(?msg, "dispatch: called");
    match msg {
        DaemonMessage::FindPartner { name } => {
            let user = match UserId::parse(&name) {
                Ok(user) => user,
                Err(e) => return DaemonResponse::from_error(&e),
            };
            match handle.request_partner(&user).await {
                Ok(outcome) => DaemonResponse::from_status(outcome.into_status()),
                Err(e) => {
                    warn!(%user, error = %e, "dispatch: find partner failed");
                    DaemonResponse::from_error(&e)
                }
            }
        }

        DaemonMessage::CheckStatus { name } => {
            let user = match UserId::parse(&name) {
                Ok(user) => user,
                Err(e) => return DaemonResponse::from_error(&e),
            };
            match handle.poll_status(&user).await {
                Ok(status) => DaemonResponse::from_status(status),
                Err(e) => DaemonResponse::from_error(&e),
            }
        }

        DaemonMessage::CancelWait { name } => {
            let user = match UserId::parse(&name) {
                Ok(user) => user,
                Err(e) => return DaemonResponse::from_error(&e),
            };
            // Cancellation is acknowledged whether or not it applied
            if let Err(e) = handle.cancel_wait(&user).await {
                warn!(%user, error = %e, "dispatch: cancel failed");
            }
            DaemonResponse::Ok
        }

        DaemonMessage::Metrics => match handle.metrics().await {
            Ok(metrics) => DaemonResponse::Metrics(metrics),
            Err(e) => DaemonResponse::from_error(&e),
        },

        DaemonMessage::Ping => DaemonResponse::Pong {
            version: VERSION.to_string(),
        },

        DaemonMessage::Shutdown => {
            info!("Shutdown requested over IPC");
            let _ = shutdown_tx.try_send(());
            DaemonResponse::Ok
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    use crate::coordinator::{Coordinator, CoordinatorConfig};
    use crate::ipc::wire::{MAX_RESPONSE_SIZE, read_line_limited, write_line};
    use crate::links::MockLinkGenerator;
    use crate::links::testing::ScriptedLinkGenerator;

    fn start() -> (CoordinatorHandle, mpsc::Sender<()>, mpsc::Receiver<()>) {
        let coord = Coordinator::new(
            CoordinatorConfig::default(),
            Arc::new(MockLinkGenerator::new("https://meet.test")),
        );
        let handle = coord.handle();
        tokio::spawn(coord.run());
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        (handle, shutdown_tx, shutdown_rx)
    }

    fn find(name: &str) -> DaemonMessage {
        DaemonMessage::FindPartner { name: name.to_string() }
    }

    fn check(name: &str) -> DaemonMessage {
        DaemonMessage::CheckStatus { name: name.to_string() }
    }

    #[tokio::test]
    async fn test_dispatch_pairing_flow() {
        let (handle, tx, _rx) = start();

        assert_eq!(
            dispatch(find("Alice"), &handle, &tx).await,
            DaemonResponse::Status(StatusView::Waiting)
        );

        let bob_link = match dispatch(find("Bob"), &handle, &tx).await {
            DaemonResponse::Status(StatusView::Paired {
                partner_name, meet_link, ..
            }) => {
                assert_eq!(partner_name, "Alice");
                meet_link
            }
            other => panic!("Expected Paired, got {:?}", other),
        };

        match dispatch(check("Alice"), &handle, &tx).await {
            DaemonResponse::Status(StatusView::Paired {
                partner_name, meet_link, ..
            }) => {
                assert_eq!(partner_name, "Bob");
                assert_eq!(meet_link, bob_link);
            }
            other => panic!("Expected Paired, got {:?}", other),
        }

        assert_eq!(
            dispatch(check("Alice"), &handle, &tx).await,
            DaemonResponse::Status(StatusView::Idle)
        );
    }

    #[tokio::test]
    async fn test_dispatch_duplicate_request_reads_as_waiting() {
        let (handle, tx, _rx) = start();

        dispatch(find("Dave"), &handle, &tx).await;
        assert_eq!(
            dispatch(find("Dave"), &handle, &tx).await,
            DaemonResponse::Status(StatusView::Waiting)
        );
        match dispatch(DaemonMessage::Metrics, &handle, &tx).await {
            DaemonResponse::Metrics(metrics) => assert_eq!(metrics.waiting, 1),
            other => panic!("Expected Metrics, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dispatch_rejects_blank_names() {
        let (handle, tx, _rx) = start();

        for msg in [
            find(""),
            check("  "),
            DaemonMessage::CancelWait { name: String::new() },
        ] {
            match dispatch(msg, &handle, &tx).await {
                DaemonResponse::Error { retryable, .. } => assert!(!retryable),
                other => panic!("Expected Error, got {:?}", other),
            }
        }

        match dispatch(DaemonMessage::Metrics, &handle, &tx).await {
            DaemonResponse::Metrics(metrics) => assert_eq!(metrics.requests_received, 0),
            other => panic!("Expected Metrics, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dispatch_cancel_always_acknowledged() {
        let (handle, tx, _rx) = start();

        let cancel = DaemonMessage::CancelWait {
            name: "Nobody".to_string(),
        };
        assert_eq!(dispatch(cancel.clone(), &handle, &tx).await, DaemonResponse::Ok);

        handle.shutdown().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(dispatch(cancel, &handle, &tx).await, DaemonResponse::Ok);
    }

    #[tokio::test]
    async fn test_dispatch_ping_and_shutdown() {
        let (handle, tx, mut rx) = start();

        assert_eq!(
            dispatch(DaemonMessage::Ping, &handle, &tx).await,
            DaemonResponse::Pong {
                version: VERSION.to_string()
            }
        );

        assert_eq!(dispatch(DaemonMessage::Shutdown, &handle, &tx).await, DaemonResponse::Ok);
        assert!(rx.try_recv().is_ok());
    }

    async fn send_line(client: &mut UnixStream, msg: &DaemonMessage) {
        write_line(client, &serde_json::to_string(msg).unwrap()).await.unwrap();
    }

    #[tokio::test]
    async fn test_answer_kept_when_client_hangs_up_during_link() {
        let links = ScriptedLinkGenerator::new(vec![]).with_delay(Duration::from_millis(200));
        let coord = Coordinator::new(CoordinatorConfig::default(), Arc::new(links));
        let handle = coord.handle();
        tokio::spawn(coord.run());
        let (tx, _rx) = mpsc::channel(1);

        handle.request_partner(&UserId::parse("Alice").unwrap()).await.unwrap();

        let (server, mut client) = UnixStream::pair().unwrap();
        let conn = tokio::spawn(handle_connection(server, handle.clone(), tx));
        send_line(&mut client, &find("Bob")).await;

        // Bob gives up while the link is still being made
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(client);
        assert!(conn.await.unwrap().is_err());

        let bob = UserId::parse("Bob").unwrap();
        assert!(handle.poll_status(&bob).await.unwrap().is_paired());
        assert_eq!(handle.poll_status(&bob).await.unwrap(), PairingStatus::Idle);
        assert!(handle.poll_status(&UserId::parse("Alice").unwrap()).await.unwrap().is_paired());
    }

    #[tokio::test]
    async fn test_connection_answers_one_request() {
        let (handle, tx, _rx) = start();
        let (server, mut client) = UnixStream::pair().unwrap();
        let conn = tokio::spawn(handle_connection(server, handle, tx));

        send_line(&mut client, &DaemonMessage::Ping).await;
        let line = read_line_limited(&mut client, MAX_RESPONSE_SIZE).await.unwrap();
        let response: DaemonResponse = serde_json::from_str(&line).unwrap();
        assert!(matches!(response, DaemonResponse::Pong { .. }));
        conn.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_connection_rejects_oversized_request() {
        let (handle, tx, _rx) = start();
        let (server, mut client) = UnixStream::pair().unwrap();
        let conn = tokio::spawn(handle_connection(server, handle, tx));

        let mut junk = vec![b'x'; 8192];
        junk.push(b'\n');
        client.write_all(&junk).await.unwrap();

        let line = read_line_limited(&mut client, MAX_RESPONSE_SIZE).await.unwrap();
        match serde_json::from_str::<DaemonResponse>(&line).unwrap() {
            DaemonResponse::Error { message, retryable } => {
                assert!(message.contains("exceeds"));
                assert!(!retryable);
            }
            other => panic!("Expected Error, got {:?}", other),
        }
        let _ = conn.await;
    }
}
