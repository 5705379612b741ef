//! Daemon side of the socket: binding, and one request/response per connection

use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Context, Result};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, warn};

use super::messages::{DaemonMessage, DaemonResponse};
use super::wire::{MAX_REQUEST_SIZE, MAX_RESPONSE_SIZE, read_line_limited, write_line};

/// How long a connected client gets to send its request
pub const REQUEST_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Bind the daemon socket at `socket_path`
///
/// A socket left behind by an earlier run is replaced. Any other kind of
/// file at that path is an error rather than something to delete.
pub fn create_listener_at(socket_path: &Path) -> Result<(UnixListener, PathBuf)> {
    debug!(?socket_path, "create_listener_at: called");

    if let Some(dir) = socket_path.parent() {
        std::fs::create_dir_all(dir).context(format!("Failed to create socket directory {}", dir.display()))?;
    }

    match std::fs::symlink_metadata(socket_path) {
        Ok(meta) if meta.file_type().is_socket() => {
            debug!(?socket_path, "create_listener_at: replacing leftover socket");
            std::fs::remove_file(socket_path).context("Failed to remove leftover socket")?;
        }
        Ok(_) => {
            eyre::bail!("{} exists and is not a socket", socket_path.display());
        }
        Err(_) => {}
    }

    let listener = UnixListener::bind(socket_path).context(format!("Failed to bind {}", socket_path.display()))?;
    Ok((listener, socket_path.to_path_buf()))
}

/// Remove the socket file on shutdown
pub fn cleanup_socket(socket_path: &Path) {
    match std::fs::remove_file(socket_path) {
        Ok(()) => debug!(?socket_path, "cleanup_socket: removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(?socket_path, error = %e, "Failed to remove socket file"),
    }
}

/// Read the connection's single request
///
/// Bounded in both size and time: a client that never finishes its line is
/// dropped after [`REQUEST_READ_TIMEOUT`].
pub async fn read_message(stream: &mut UnixStream) -> Result<DaemonMessage> {
    read_message_within(stream, REQUEST_READ_TIMEOUT).await
}

async fn read_message_within(stream: &mut UnixStream, timeout: Duration) -> Result<DaemonMessage> {
    let line = tokio::time::timeout(timeout, read_line_limited(&mut *stream, MAX_REQUEST_SIZE))
        .await
        .context("Timed out waiting for a request")??;

    let msg: DaemonMessage = serde_json::from_str(&line).context("Failed to parse IPC message")?;
    debug!(?msg, "read_message: parsed");
    Ok(msg)
}

/// Write the connection's single response
pub async fn send_response(stream: &mut UnixStream, response: &DaemonResponse) -> Result<()> {
    let json = serde_json::to_string(response).context("Failed to serialize response")?;
    if json.len() > MAX_RESPONSE_SIZE {
        eyre::bail!("Response too large: {} bytes", json.len());
    }
    write_line(stream, &json).await?;
    debug!(?response, "send_response: sent");
    Ok(())
}

/// Whether the client has already closed its end
///
/// Only looks at readiness the reactor has already seen; never waits.
pub async fn peer_closed(stream: &UnixStream) -> bool {
    let mut probe = [0u8; 1];
    tokio::select! {
        biased;
        ready = stream.readable() => match ready {
            Ok(()) => match stream.try_read(&mut probe) {
                Ok(0) => true,
                Ok(_) => false,
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => false,
                Err(_) => true,
            },
            Err(_) => true,
        },
        _ = std::future::ready(()) => false,
    }
}
