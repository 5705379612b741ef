//! IPC client for talking to a running pairing daemon
//!
//! Each call opens a connection, sends one newline-delimited JSON message,
//! reads one response, and closes.

use std::path::PathBuf;
use std::time::Duration;

use eyre::{Context, Result};
use tokio::net::UnixStream;
use tracing::debug;

use super::get_socket_path;
use super::messages::{DaemonMessage, DaemonResponse, StatusView};
use super::wire::{MAX_REQUEST_SIZE, MAX_RESPONSE_SIZE, read_line_limited, write_line};
use crate::coordinator::CoordinatorMetrics;
use crate::domain::PairingError;

/// Default timeout for each IPC step (connect, write, read)
///
/// A `find_partner` that lands on a match waits for the meeting link, so
/// callers talking to a daemon with a long link timeout should raise this
/// with [`DaemonClient::with_timeout`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for communicating with the daemon via IPC
#[derive(Debug, Clone)]
pub struct DaemonClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl Default for DaemonClient {
    fn default() -> Self {
        Self::new()
    }
}

impl DaemonClient {
    /// Create a new client with the default socket path
    pub fn new() -> Self {
        Self {
            socket_path: get_socket_path(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Create a client with a custom socket path
    pub fn with_socket_path(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set a custom timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check if the daemon socket exists
    pub fn socket_exists(&self) -> bool {
        self.socket_path.exists()
    }

    pub fn socket_path(&self) -> &PathBuf {
        &self.socket_path
    }

    /// Ask to be paired
    pub async fn find_partner(&self, name: &str) -> Result<StatusView> {
        debug!(%name, "DaemonClient: find_partner");
        let msg = DaemonMessage::FindPartner { name: name.to_string() };
        expect_status(self.send_message(msg).await?)
    }

    /// Poll for a pairing result
    pub async fn check_status(&self, name: &str) -> Result<StatusView> {
        debug!(%name, "DaemonClient: check_status");
        let msg = DaemonMessage::CheckStatus { name: name.to_string() };
        expect_status(self.send_message(msg).await?)
    }

    /// Leave the waiting queue
    pub async fn cancel_wait(&self, name: &str) -> Result<()> {
        debug!(%name, "DaemonClient: cancel_wait");
        let msg = DaemonMessage::CancelWait { name: name.to_string() };
        expect_ok(self.send_message(msg).await?)
    }

    /// Fetch coordinator counters
    pub async fn metrics(&self) -> Result<CoordinatorMetrics> {
        debug!("DaemonClient: metrics");
        match self.send_message(DaemonMessage::Metrics).await? {
            DaemonResponse::Metrics(metrics) => Ok(metrics),
            other => Err(unexpected(other)),
        }
    }

    /// Check if daemon is alive and get its version
    pub async fn ping(&self) -> Result<String> {
        debug!("DaemonClient: pinging daemon");
        match self.send_message(DaemonMessage::Ping).await? {
            DaemonResponse::Pong { version } => Ok(version),
            other => Err(unexpected(other)),
        }
    }

    /// Request daemon to shutdown gracefully
    pub async fn shutdown(&self) -> Result<()> {
        debug!("DaemonClient: requesting daemon shutdown");
        expect_ok(self.send_message(DaemonMessage::Shutdown).await?)
    }

    /// Send a message to the daemon and wait for response
    async fn send_message(&self, msg: DaemonMessage) -> Result<DaemonResponse> {
        debug!(?self.socket_path, ?msg, "DaemonClient: sending message");

        let mut stream = tokio::time::timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .context("Connection timeout")?
            .context("Failed to connect to daemon socket")?;

        let msg_json = serde_json::to_string(&msg).context("Failed to serialize message")?;
        if msg_json.len() > MAX_REQUEST_SIZE {
            return Err(eyre::eyre!("Message too large: {} bytes", msg_json.len()));
        }

        tokio::time::timeout(self.timeout, write_line(&mut stream, &msg_json))
            .await
            .context("Write timeout")??;

        let line = tokio::time::timeout(self.timeout, read_line_limited(&mut stream, MAX_RESPONSE_SIZE))
            .await
            .context("Read timeout")??;

        let response: DaemonResponse = serde_json::from_str(&line).context("Failed to parse daemon response")?;
        debug!(?response, "DaemonClient: received response");
        Ok(response)
    }
}

fn expect_status(response: DaemonResponse) -> Result<StatusView> {
    match response {
        DaemonResponse::Status(view) => Ok(view),
        other => Err(unexpected(other)),
    }
}

fn expect_ok(response: DaemonResponse) -> Result<()> {
    match response {
        DaemonResponse::Ok => Ok(()),
        other => Err(unexpected(other)),
    }
}

/// Daemon-reported errors keep their retry hint so callers can downcast them
fn unexpected(response: DaemonResponse) -> eyre::Report {
    match response {
        DaemonResponse::Error { message, retryable } => eyre::Report::new(PairingError::Remote { message, retryable }),
        other => eyre::eyre!("Unexpected response: {:?}", other),
    }
}
