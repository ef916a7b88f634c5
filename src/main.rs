//! fluent-router server binary.
//!
//! Builds an application from a TOML file (capabilities + declarative
//! routes) and serves it until Ctrl-C or SIGTERM.

use std::path::PathBuf;

use clap::Parser;

use fluent_router::config::{load_config, AppConfig};
use fluent_router::lifecycle::build_app;
use fluent_router::observability::init_logging;
use fluent_router::{AppRegistry, CapabilityRegistry, LaunchOptions};

#[derive(Parser)]
#[command(name = "fluent-router")]
#[command(about = "Serve an application described by a TOML file", long_about = None)]
struct Cli {
    /// Configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on; overrides `server.port`.
    #[arg(short, long)]
    port: Option<u16>,

    /// Startup message; overrides `server.message`.
    #[arg(short, long)]
    message: Option<String>,

    /// Do not log the startup message.
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(message) = cli.message {
        config.server.message = Some(message);
    }
    if cli.quiet {
        config.server.log_startup = false;
    }

    init_logging(&config.logging)?;

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        request_timeout_secs = config.server.request_timeout_secs,
        "Configuration loaded"
    );

    let mut registry = AppRegistry::with_server_config(config.server.clone());
    build_app(&config, &mut registry, CapabilityRegistry::with_defaults())?;

    registry.launch(LaunchOptions::from(&config.server)).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
