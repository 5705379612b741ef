//! Coordinator configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Channel buffer size for coordinator requests
    #[serde(rename = "channel-buffer", default = "default_channel_buffer")]
    pub channel_buffer: usize,

    /// Upper bound on a single meeting-link generation, in seconds
    #[serde(rename = "link-timeout-secs", default = "default_link_timeout_secs")]
    pub link_timeout_secs: u64,
}

fn default_channel_buffer() -> usize {
    debug!("default_channel_buffer: called");
    1000
}

fn default_link_timeout_secs() -> u64 {
    debug!("default_link_timeout_secs: called");
    30
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        debug!("CoordinatorConfig::default: called");
        Self {
            channel_buffer: 1000,
            link_timeout_secs: 30,
        }
    }
}

impl CoordinatorConfig {
    /// Get the link generation timeout as a Duration
    pub fn link_timeout(&self) -> Duration {
        debug!(link_timeout_secs = %self.link_timeout_secs, "CoordinatorConfig::link_timeout: called");
        Duration::from_secs(self.link_timeout_secs)
    }
}
