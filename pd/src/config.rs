//! PairDaemon configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::coordinator::CoordinatorConfig;
use crate::session::DEFAULT_POLL_INTERVAL;

/// Main PairDaemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR); `--log-level` wins over this
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Pairing coordinator tuning
    pub coordinator: CoordinatorConfig,

    /// Meeting-link provider configuration
    pub links: LinksConfig,

    /// IPC socket configuration
    pub ipc: IpcConfig,

    /// Client-side polling configuration
    pub client: ClientConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for candidate in Self::candidate_paths() {
            if candidate.exists() {
                match Self::load_from_file(&candidate) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", candidate.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is set up
    ///
    /// Errors are swallowed: a broken config file is reported properly by
    /// [`Config::load`] once logging exists.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let paths = match config_path {
            Some(path) => vec![path.clone()],
            None => Self::candidate_paths(),
        };

        paths
            .into_iter()
            .filter(|p| p.exists())
            .find_map(|p| fs::read_to_string(p).ok())
            .and_then(|content| serde_yaml::from_str::<Self>(&content).ok())
            .and_then(|config| config.log_level)
    }

    /// Reject values that would panic or spin at runtime
    pub fn validate(&self) -> Result<()> {
        if self.client.poll_interval_ms == 0 {
            eyre::bail!("client.poll-interval-ms must be at least 1");
        }
        if self.coordinator.channel_buffer == 0 {
            eyre::bail!("coordinator.channel-buffer must be at least 1");
        }
        Ok(())
    }

    /// Per-step timeout for CLI requests to the daemon
    ///
    /// Covers a `pair` that lands on a match and waits out link generation.
    pub fn client_timeout(&self) -> Duration {
        self.coordinator.link_timeout() + crate::ipc::client::DEFAULT_TIMEOUT
    }

    /// Project-local config first, then the user config
    fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".pairdaemon.yml")];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("pairdaemon").join("pairdaemon.yml"));
        }
        paths
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Meeting-link provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinksConfig {
    /// Provider name ("mock" or "http")
    pub provider: String,

    /// Base URL for mock links
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Endpoint the http provider posts pairs to
    pub endpoint: String,

    /// Environment variable containing the bearer token for the http provider
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Length of the scheduled meeting
    #[serde(rename = "meeting-minutes")]
    pub meeting_minutes: i64,
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            provider: "mock".to_string(),
            base_url: "https://meet.google.com".to_string(),
            endpoint: "http://localhost:8088/v1/meetings".to_string(),
            api_key_env: "MEET_API_TOKEN".to_string(),
            timeout_ms: 10_000,
            meeting_minutes: 30,
        }
    }
}

/// IPC socket configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IpcConfig {
    /// Socket path override (defaults to the runtime dir)
    #[serde(rename = "socket-path")]
    pub socket_path: Option<PathBuf>,
}

impl IpcConfig {
    /// Resolve the socket path, falling back to the default location
    pub fn resolved_socket_path(&self) -> PathBuf {
        self.socket_path.clone().unwrap_or_else(crate::ipc::get_socket_path)
    }
}

/// Client-side polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Interval between status polls while waiting, in milliseconds
    #[serde(rename = "poll-interval-ms")]
    pub poll_interval_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
        }
    }
}

impl ClientConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
