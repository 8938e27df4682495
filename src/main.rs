//! `relay` binary: load settings, start the relay, wait for ctrl-c.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use relay_telemetry::{init_telemetry, TelemetryConfig};

/// Device/observer WebSocket relay.
#[derive(Parser)]
#[command(name = "relay", version)]
struct Cli {
    /// Settings file (defaults to ~/.relay/settings.json).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen port, overriding settings and environment.
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable debug-level logging.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let path = cli.config.unwrap_or_else(relay_settings::settings_path);
    let mut settings = relay_settings::load_settings_from_path(&path)
        .with_context(|| format!("loading settings from {}", path.display()))?;
    if let Some(port) = cli.port {
        settings.server.port = port;
    }
    if cli.verbose {
        settings.logging.level = "debug".into();
    }

    let _ = init_telemetry(&TelemetryConfig::from_settings(&settings.logging));

    let gateway = relay_server::build_gateway(&settings.enrichment)
        .context("building enrichment gateway")?;
    let handle = relay_server::start(&settings, gateway)
        .await
        .with_context(|| format!("binding {}:{}", settings.server.host, settings.server.port))?;

    tracing::info!(addr = %handle.local_addr, "relay ready");

    tokio::signal::ctrl_c()
        .await
        .context("listening for ctrl-c")?;

    tracing::info!("shutting down");
    handle.shutdown().await;
    Ok(())
}
