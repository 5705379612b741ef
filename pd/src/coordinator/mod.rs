//! Pairing coordinator
//!
//! A single task owns the waiting queue and the unread match results and
//! serves three operations:
//! - **request_partner:** match against the longest waiter, or join the queue
//! - **poll_status:** consuming read of a finished match
//! - **cancel_wait:** leave the queue
//!
//! Meeting links are generated off-task; a match is published to both sides
//! only once its link exists.

mod config;
mod core;
mod handle;
mod messages;
mod state;

pub use config::CoordinatorConfig;
pub use core::Coordinator;
pub use handle::CoordinatorHandle;
pub use messages::{CoordRequest, CoordinatorMetrics};
pub use state::{CommittedMatch, PairingState, RequestStep, Reservation, WaitingQueue};
