//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

/// PairDaemon - first-come partner matchmaking
#[derive(Parser)]
#[command(
    name = "pd",
    about = "Pairs waiting users first-come-first-served and hands both a meeting link",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the pairing daemon in the foreground
    Serve {
        /// Socket path (overrides config)
        #[arg(short, long)]
        socket: Option<PathBuf>,
    },

    /// Ask to be paired once and print the answer
    Pair {
        /// Name to pair under
        name: String,
    },

    /// Poll once for a pairing result (consumes it)
    Status {
        /// Name used when pairing
        name: String,
    },

    /// Leave the waiting queue
    Cancel {
        /// Name used when pairing
        name: String,
    },

    /// Ask to be paired and keep polling until matched (Ctrl-C cancels)
    Wait {
        /// Name to pair under
        name: String,

        /// Poll interval in milliseconds (overrides config)
        #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
        interval_ms: Option<u64>,
    },

    /// Show coordinator counters
    Stats {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Check that the daemon is alive
    Ping,

    /// Ask the daemon to shut down
    Stop,
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("pairdaemon")
        .join("logs")
        .join("pairdaemon.log");
    debug!(?path, "get_log_path: returning path");
    path
}

/// Generate the after_help text with daemon status and log location
pub fn generate_after_help(socket_path: &std::path::Path) -> String {
    debug!(?socket_path, "generate_after_help: called");
    let mut help = String::new();

    help.push_str("Daemon:\n");
    let (icon, status) = if socket_path.exists() {
        ("\u{2705}", "socket present")
    } else {
        ("\u{274C}", "not running")
    };
    help.push_str(&format!("  {} {} ({})\n", icon, status, socket_path.display()));

    help.push('\n');
    help.push_str(&format!("Logs are written to: {}\n", get_log_path().display()));
    help
}

/// Output format for the stats command
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}
