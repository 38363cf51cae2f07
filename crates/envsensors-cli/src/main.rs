mod cli;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use envsensors_network::{SocketServer, SocketServerConfig};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(&cli);

    let bind_addr = tokio::net::lookup_host((cli.host.as_str(), cli.port))
        .await
        .with_context(|| format!("Failed to resolve {}:{}", cli.host, cli.port))?
        .next()
        .with_context(|| format!("No address found for {}:{}", cli.host, cli.port))?;

    let config = SocketServerConfig {
        bind_addr,
        simulation_mode: cli.simulation_mode,
        mock_read_interval: Duration::from_millis(cli.mock_read_interval_ms),
        ..Default::default()
    };

    let server = SocketServer::bind(config).await?;
    info!(addr = %server.local_addr()?, version = envsensors_core::VERSION, "Agent ready");

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
    }
    Ok(())
}

fn setup_logging(cli: &Cli) {
    let filter_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_level));

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}
