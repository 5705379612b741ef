//! PairDaemon - first-come partner matchmaking
//!
//! Users ask to be paired; the first waiting user is matched with the next
//! arrival and both receive the same meeting link, each exactly once.
//!
//! # Core Concepts
//!
//! - **Single owner**: all pairing state lives in one coordinator task
//! - **FIFO fairness**: the longest-waiting user is matched first
//! - **Consuming reads**: a pairing result is deleted as it is delivered
//! - **Polling clients**: waiters poll for their result on a fixed interval
//!
//! # Modules
//!
//! - [`domain`] - User ids, pairing results and statuses, errors
//! - [`coordinator`] - Pairing state machine and the actor that owns it
//! - [`links`] - Meeting-link generator trait and providers
//! - [`ipc`] - Unix socket protocol, server and client
//! - [`session`] - Client-side wait/poll loop
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod ipc;
pub mod links;
pub mod session;

/// Crate version, reported by `ping`
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Re-export commonly used types
pub use config::{ClientConfig, Config, IpcConfig, LinksConfig};
pub use coordinator::{Coordinator, CoordinatorConfig, CoordinatorHandle, CoordinatorMetrics, PairingState};
pub use domain::{MatchOutcome, PairingError, PairingResult, PairingStatus, UserId};
pub use ipc::{DaemonClient, DaemonMessage, DaemonResponse, StatusView};
pub use links::{LinkError, LinkGenerator, MockLinkGenerator, create_generator};
pub use session::{PairingService, WaitSession};
