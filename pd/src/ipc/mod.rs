//! Inter-Process Communication with the pairing daemon
//!
//! Unix Domain Socket transport for the request/poll triad. One JSON message
//! per connection, answered by one JSON response.

use std::path::PathBuf;

pub mod client;
pub mod listener;
pub mod messages;
pub mod server;
pub mod wire;

pub use client::DaemonClient;
pub use messages::{DaemonMessage, DaemonResponse, StatusView};

/// Get the default socket path for daemon IPC
pub fn get_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("pairdaemon")
        .join("pd.sock")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_path_ends_with_pd_sock() {
        let path = get_socket_path();
        assert!(path.ends_with("pairdaemon/pd.sock"));
    }
}
