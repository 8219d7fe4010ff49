//! Beacon Server: Pusher-compatible multi-tenant WebSocket broker
//!
//! Main entry point that loads configuration, initializes logging and
//! starts the server.

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use beacon_core::config::AppConfig;

/// Command line arguments.
#[derive(Debug, Parser)]
#[command(name = "beacon-server", version, about = "Pusher-compatible WebSocket broker")]
struct Cli {
    /// Configuration overlay to load from `config/{env}`.
    #[arg(long, env = "BEACON_ENV", default_value = "development")]
    env: String,

    /// Overrides `server.host`.
    #[arg(long)]
    host: Option<String>,

    /// Overrides `server.port`.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(&cli.env)
        .with_context(|| format!("Failed to load configuration for '{}'", cli.env))?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    init_logging(&config);
    tracing::info!(
        env = %cli.env,
        version = env!("CARGO_PKG_VERSION"),
        "Configuration loaded"
    );

    beacon_api::run_server(config)
        .await
        .context("Server terminated with an error")?;
    Ok(())
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}
