//! Container Health Watchdog - Main Entry Point

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use watchdog::{init_logging, Settings, Watchdog};

#[derive(Parser, Debug)]
#[command(name = "watchdog")]
#[command(about = "Escalates failing container health checks into alerts")]
#[command(version)]
struct Cli {
    /// Configuration file (default: ./watchdog.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Emit JSON log lines
    #[arg(long)]
    json_logs: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings =
        Settings::load(cli.config.as_deref()).context("failed to load configuration")?;
    if cli.json_logs {
        settings.logging.json = true;
    }
    init_logging(&settings.logging, cli.verbose)?;

    info!("=== Container Health Watchdog v{} ===", env!("CARGO_PKG_VERSION"));
    info!(
        "Docker socket: {}, alert endpoint: {}",
        settings.runtime.docker_socket.display(),
        settings.dispatcher.base_url
    );

    let watchdog = Watchdog::from_settings(&settings)?;
    watchdog
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for ctrl-c, shutting down");
            }
        })
        .await;

    Ok(())
}
