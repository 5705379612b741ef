//! Domain types for the pairing daemon
//!
//! Users are identified by a free-text name. A match hands each side a
//! [`PairingResult`] naming the partner and the shared meeting link.

mod error;
mod id;
mod pairing;

pub use error::PairingError;
pub use id::{MAX_USER_ID_LEN, UserId};
pub use pairing::{MatchOutcome, PairingResult, PairingStatus};
