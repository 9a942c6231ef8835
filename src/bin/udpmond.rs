//! udpmon daemon - tracks machines and sessions announced over UDP
//!
//! Listens for session announcements, join requests and heartbeats, times
//! out silent machines, and redraws a status report on a fixed interval.
//!
//! # Usage
//!
//! ```text
//! udpmond                 # report every 1s, wait up to 15s per intake cycle
//! udpmond 2 5             # report every 2s, wait up to 5s per intake cycle
//! udpmond --json          # JSON lines instead of the console report
//! udpmond --port 9106 --port 9104 --liveness-timeout 3
//! ```

use std::fs::{self, OpenOptions};
use std::net::IpAddr;
use std::path::PathBuf;
use std::process;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use udpmond::config::MonitorConfig;
use udpmond::engine::spawn_engine;
use udpmond::intake::run_intake;
use udpmond::render::{ConsoleRenderer, JsonRenderer};
use udpmond::report::spawn_report_task;
use udpmond::transport::UdpTransport;

// ============================================================================
// CLI Arguments
// ============================================================================

/// udpmon daemon - machine liveness and session monitor
#[derive(Parser, Debug)]
#[command(name = "udpmond", version, about)]
struct Args {
    /// Seconds between status reports
    report_interval: Option<u64>,

    /// Seconds each intake cycle waits for datagrams
    poll_timeout: Option<u64>,

    /// Config file (default: <config_dir>/udpmon/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Address to bind the UDP sockets to
    #[arg(long, value_name = "ADDR")]
    bind: Option<IpAddr>,

    /// Port to listen on; repeat for several ports
    #[arg(long = "port", value_name = "PORT")]
    ports: Vec<u16>,

    /// Seconds of silence before a machine is marked offline
    #[arg(long, value_name = "SECS")]
    liveness_timeout: Option<u64>,

    /// Emit each report as a JSON line instead of the console layout
    #[arg(long)]
    json: bool,

    /// Log to stderr instead of the log file
    #[arg(long)]
    log_stderr: bool,
}

impl Args {
    /// Applies command-line overrides on top of the loaded config.
    fn apply(&self, config: &mut MonitorConfig) {
        if let Some(secs) = self.report_interval {
            config.report_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = self.poll_timeout {
            config.poll_timeout = Duration::from_secs(secs);
        }
        if let Some(bind) = self.bind {
            config.bind_address = bind;
        }
        if !self.ports.is_empty() {
            config.ports = self.ports.clone();
        }
        if let Some(secs) = self.liveness_timeout {
            config.liveness_timeout = Duration::from_secs(secs);
        }
    }
}

// ============================================================================
// Logging
// ============================================================================

fn log_file_path() -> PathBuf {
    dirs::state_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("udpmon")
        .join("udpmond.log")
}

/// Opens the log file in append mode. Returns `None` (logging disabled) if
/// that fails, after telling the user why.
fn create_log_file() -> Option<fs::File> {
    let log_path = log_file_path();

    if let Some(parent) = log_path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            eprintln!("Warning: Failed to create log directory {parent:?}: {e}");
            return None;
        }
    }

    match OpenOptions::new().create(true).append(true).open(&log_path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("Warning: Failed to open log file {log_path:?}: {e}");
            None
        }
    }
}

fn init_logging(to_stderr: bool) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive("udpmond=info".parse()?)
        .add_directive("udpmon_protocol=info".parse()?);

    if to_stderr {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return Ok(());
    }

    // The console belongs to the status report, so logs go to a file
    match create_log_file() {
        Some(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .init(),
        None => tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("off"))
            .init(),
    }

    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_stderr)?;

    let mut config = MonitorConfig::load(args.config.as_deref()).context("Failed to load config")?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        bind = %config.bind_address,
        ports = ?config.ports,
        "udpmon daemon starting"
    );

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let engine = spawn_engine(config.engine_config(), cancel_token.clone());

    let mut transport = UdpTransport::bind(
        config.bind_address,
        &config.ports,
        config.max_datagram_bytes,
    )
    .await
    .context("Failed to open UDP sockets")?;

    let report_task = if args.json {
        spawn_report_task(
            engine.clone(),
            JsonRenderer::stdout(),
            config.report_interval,
            cancel_token.clone(),
        )
    } else {
        spawn_report_task(
            engine.clone(),
            ConsoleRenderer::stdout(),
            config.report_interval,
            cancel_token.clone(),
        )
    };

    let result = run_intake(
        &mut transport,
        &engine,
        config.poll_timeout,
        cancel_token.clone(),
    )
    .await;

    // Tear down in order: background tasks, engine, then sockets
    cancel_token.cancel();
    let _ = report_task.await;

    match engine.shutdown().await {
        Ok(summary) => info!(
            machines = summary.machines,
            online = summary.online,
            sessions = summary.sessions,
            "Registries released"
        ),
        Err(e) => error!(error = %e, "Engine already stopped"),
    }
    drop(transport);

    match result {
        Ok(stats) => {
            info!(
                cycles = stats.cycles,
                datagrams = stats.datagrams,
                dropped = stats.dropped,
                "udpmon daemon stopped"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Intake failed");
            Err(e).context("Intake loop stopped")
        }
    }
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
