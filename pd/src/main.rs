//! PairDaemon - first-come partner matchmaking
//!
//! CLI entry point for running the daemon and talking to it.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{CommandFactory, FromArgMatches};
use colored::Colorize;
use eyre::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use pairdaemon::cli::{Cli, Command, OutputFormat, generate_after_help, get_log_path};
use pairdaemon::config::Config;
use pairdaemon::coordinator::{Coordinator, CoordinatorMetrics};
use pairdaemon::domain::{PairingError, PairingStatus};
use pairdaemon::ipc::{self, DaemonClient};
use pairdaemon::links::create_generator;
use pairdaemon::session::WaitSession;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log here since logging isn't initialized yet
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Build command with dynamic after_help that shows daemon status
    let cmd = Cli::command().after_help(generate_after_help(&ipc::get_socket_path()));
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!("PairDaemon loaded config: links provider={}", config.links.provider);

    let client = DaemonClient::with_socket_path(config.ipc.resolved_socket_path()).with_timeout(config.client_timeout());

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Some(Command::Serve { socket }) => {
            let socket_path = socket.unwrap_or_else(|| config.ipc.resolved_socket_path());
            cmd_serve(&config, socket_path).await
        }
        Some(Command::Pair { name }) => cmd_pair(&client, &name).await,
        Some(Command::Status { name }) => cmd_status(&client, &name).await,
        Some(Command::Cancel { name }) => cmd_cancel(&client, &name).await,
        Some(Command::Wait { name, interval_ms }) => {
            let interval = interval_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| config.client.poll_interval());
            cmd_wait(client, &name, interval).await
        }
        Some(Command::Stats { format }) => cmd_stats(&client, format).await,
        Some(Command::Ping) => cmd_ping(&client).await,
        Some(Command::Stop) => cmd_stop(&client).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    }
}

/// Run the coordinator and IPC server until a signal or a `stop` request
async fn cmd_serve(config: &Config, socket_path: PathBuf) -> Result<()> {
    debug!(?socket_path, "cmd_serve: called");

    let probe = DaemonClient::with_socket_path(socket_path.clone()).with_timeout(Duration::from_millis(500));
    if probe.socket_exists() && probe.ping().await.is_ok() {
        println!("PairDaemon is already running at {}", socket_path.display());
        return Ok(());
    }

    let links = create_generator(&config.links).context("Failed to create link generator")?;
    info!("Link generator initialized ({})", config.links.provider);

    let coordinator = Coordinator::new(config.coordinator.clone(), links);
    let handle = coordinator.handle();
    let coord_task = tokio::spawn(coordinator.run());
    info!("Coordinator started");

    let (listener, socket_path) = ipc::listener::create_listener_at(&socket_path)?;
    info!(?socket_path, "IPC socket listening");

    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
    let mut server = tokio::spawn(ipc::server::serve(
        listener,
        handle.clone(),
        shutdown_tx.clone(),
        shutdown_rx,
    ));

    println!(
        "{} PairDaemon listening on {}",
        "\u{2713}".green(),
        socket_path.display().to_string().cyan()
    );

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => {
                warn!("SIGINT received");
                let _ = shutdown_tx.send(()).await;
            }
            _ = sigterm.recv() => {
                warn!("SIGTERM received");
                let _ = shutdown_tx.send(()).await;
            }
            result = &mut server => {
                debug!("cmd_serve: server stopped on request");
                ipc::listener::cleanup_socket(&socket_path);
                let _ = handle.shutdown().await;
                let _ = coord_task.await;
                result.context("IPC server task panicked")??;
                println!("PairDaemon stopped");
                return Ok(());
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        let _ = shutdown_tx.send(()).await;
    }

    info!("Daemon shutting down...");
    let _ = server.await;
    ipc::listener::cleanup_socket(&socket_path);

    if let Err(e) = handle.shutdown().await {
        debug!(error = %e, "cmd_serve: coordinator already stopped");
    }
    let _ = coord_task.await;

    println!("PairDaemon stopped");
    Ok(())
}

async fn cmd_pair(client: &DaemonClient, name: &str) -> Result<()> {
    debug!(%name, "cmd_pair: called");
    let view = client.find_partner(name).await.map_err(with_hint)?;
    print_status(&view.into_status()?);
    Ok(())
}

async fn cmd_status(client: &DaemonClient, name: &str) -> Result<()> {
    debug!(%name, "cmd_status: called");
    let view = client.check_status(name).await.map_err(with_hint)?;
    print_status(&view.into_status()?);
    Ok(())
}

async fn cmd_cancel(client: &DaemonClient, name: &str) -> Result<()> {
    debug!(%name, "cmd_cancel: called");
    client.cancel_wait(name).await.map_err(with_hint)?;
    println!("{} Stopped searching for {}", "\u{2713}".green(), name);
    Ok(())
}

/// Search until paired; Ctrl-C cancels the search
async fn cmd_wait(client: DaemonClient, name: &str, interval: Duration) -> Result<()> {
    debug!(%name, ?interval, "cmd_wait: called");

    let (cancel_tx, cancel_rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cancel_tx.send(()).await;
        }
    });

    println!("Searching for a partner as {}... (Ctrl-C to cancel)", name.bold());
    let status = WaitSession::new(Arc::new(client), name, interval).run(cancel_rx).await;
    print_status(&status);

    match status {
        PairingStatus::Error { message, .. } => Err(eyre::eyre!(message)),
        _ => Ok(()),
    }
}

async fn cmd_stats(client: &DaemonClient, format: OutputFormat) -> Result<()> {
    debug!(?format, "cmd_stats: called");
    let metrics = client.metrics().await.map_err(with_hint)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&metrics)?),
        OutputFormat::Text => print_metrics(&metrics),
    }
    Ok(())
}

async fn cmd_ping(client: &DaemonClient) -> Result<()> {
    debug!("cmd_ping: called");
    let version = client.ping().await.map_err(with_hint)?;
    println!("{} PairDaemon {} is running", "\u{2713}".green(), version);
    Ok(())
}

async fn cmd_stop(client: &DaemonClient) -> Result<()> {
    debug!("cmd_stop: called");
    if !client.socket_exists() {
        println!("PairDaemon is not running");
        return Ok(());
    }
    client.shutdown().await.context("Failed to stop daemon")?;
    println!("{} Shutdown requested", "\u{2713}".green());
    Ok(())
}

/// Daemon-reported errors pass through; anything else is a connection problem
fn with_hint(report: eyre::Report) -> eyre::Report {
    if report.downcast_ref::<PairingError>().is_some() {
        report
    } else {
        report.wrap_err("Failed to reach pairing daemon (is `pd serve` running?)")
    }
}

fn print_status(status: &PairingStatus) {
    match status {
        PairingStatus::Paired(result) => {
            println!("{} with {}", status.label().green().bold(), result.partner_id.as_str().bold());
            println!("  Meet: {}", result.meeting_link.cyan());
        }
        PairingStatus::Waiting => println!("{}", status.label().yellow()),
        PairingStatus::Idle => println!("{}", status.label().dimmed()),
        PairingStatus::Error { message, retryable } => {
            let hint = if *retryable { " (try again)" } else { "" };
            println!("{}: {}{}", status.label().red().bold(), message, hint);
        }
    }
}

fn print_metrics(metrics: &CoordinatorMetrics) {
    println!("{}", "Pairing coordinator".bold());
    println!("  Waiting:            {}", metrics.waiting);
    println!("  Pending results:    {}", metrics.pending_results);
    println!("  Matches in flight:  {}", metrics.matches_in_flight);
    println!("  Matches completed:  {}", metrics.matches_completed);
    println!("  Link failures:      {}", metrics.link_failures);
    println!("  Requests received:  {}", metrics.requests_received);
}
