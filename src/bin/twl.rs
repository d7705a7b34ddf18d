//! twl - record Twitch chat channels to log files
//!
//! Joins every given channel on its own connection, answers keep-alive
//! pings, and appends everything received to `<log-dir>/<channel>.log`
//! until the duration elapses or the process is interrupted.
//!
//! # Usage
//!
//! ```bash
//! # Listen to two channels for ten minutes
//! TWL_NICK=mybot TWL_TOKEN=abc123 twl -c somechannel -c otherchannel -d 600
//!
//! # Custom log directory and config, JSON summary on exit
//! twl --nick mybot --token oauth:abc123 -c somechannel \
//!     --log-dir ./logs --config ./twl.toml --json
//!
//! # Enable debug logging
//! RUST_LOG=twl_listener=debug twl -c somechannel
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: stop listening early; channels are closed as usual

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use twl_core::{ChannelList, Identity, ListenerConfig};
use twl_listener::{ListenSummary, Listener};

/// Directory name used under the platform config/data directories.
const APP_DIR: &str = "twitch-listener";

/// Record Twitch chat channels to per-channel log files
#[derive(Parser, Debug)]
#[command(name = "twl", version, about)]
struct Args {
    /// Account nickname
    #[arg(long, env = "TWL_NICK")]
    nick: String,

    /// Access token, with or without the `oauth:` prefix
    #[arg(long, env = "TWL_TOKEN", hide_env_values = true)]
    token: String,

    /// Application client id
    #[arg(long, env = "TWL_CLIENT_ID", default_value = "")]
    client_id: String,

    /// Channel to join (repeatable)
    #[arg(short = 'c', long = "channel", required = true)]
    channels: Vec<String>,

    /// How long to listen, in seconds
    #[arg(short = 'd', long, default_value_t = 60)]
    duration: u64,

    /// Directory for the channel logs
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// TOML config file (defaults to the user config dir when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

/// Returns the default log directory.
fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("logs")
}

/// Returns the default config file path.
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
}

/// Loads the explicit config, the default one if it exists, or defaults.
fn load_config(explicit: Option<&Path>) -> Result<ListenerConfig> {
    if let Some(path) = explicit {
        return ListenerConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()));
    }
    match default_config_path() {
        Some(path) if path.exists() => ListenerConfig::load(&path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        _ => Ok(ListenerConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("twl=info".parse()?)
                .add_directive("twl_listener=info".parse()?)
                .add_directive("twl_core=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let config = load_config(args.config.as_deref())?;
    let identity =
        Identity::new(&args.nick, &args.token, &args.client_id).context("Invalid credentials")?;
    let channels = ChannelList::parse(&args.channels).context("Invalid channel list")?;
    let log_dir = args.log_dir.clone().unwrap_or_else(default_log_dir);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        server = %config.server_addr(),
        log_dir = %log_dir.display(),
        "twl starting"
    );

    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
            return;
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let listener = Listener::tcp(identity, config).with_cancellation(cancel_token);
    let summary = listener
        .listen(&log_dir, &channels, Duration::from_secs(args.duration))
        .await
        .context("Listening failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    Ok(())
}

fn print_summary(summary: &ListenSummary) {
    println!(
        "Listened {:.1}s over {} ticks{}",
        summary.elapsed_ms as f64 / 1000.0,
        summary.ticks,
        if summary.cancelled { " (cancelled)" } else { "" }
    );
    for report in &summary.channels {
        println!(
            "  {:<24} {:>8} bytes  {:>4} pings  {}  -> {}",
            report.channel.as_str(),
            report.stats.bytes_logged,
            report.stats.pings_answered,
            report.close_reason,
            report.log_path.display()
        );
    }
    for failed in summary.failed_channels() {
        warn!(channel = %failed.channel, reason = %failed.close_reason, "Channel ended early");
    }
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
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
