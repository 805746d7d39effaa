//! rudder - CLI entry point

use clap::Parser;
use rudder::hub::{self, AppState};
use rudder::{Tunnel, VERSION};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "rudder")]
#[command(version = VERSION)]
#[command(about = "Rule-driven traffic router")]
struct Args {
    /// Path to configuration file
    #[arg(short = 'c', long = "config", default_value = "config.yaml")]
    config: PathBuf,

    /// Control API listen address
    #[arg(long = "ext-ctl", default_value = "127.0.0.1:9090")]
    external_controller: SocketAddr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rudder=info".parse()?),
        )
        .init();

    let args = Args::parse();

    info!("rudder v{}", VERSION);
    info!("Loading configuration from: {}", args.config.display());

    let tunnel = Tunnel::new(&args.config);
    if let Err(e) = tunnel.update_config().await {
        error!("Failed to load configuration: {}", e);
        std::process::exit(1);
    }

    let state = AppState::new(tunnel);
    let addr = args.external_controller;
    let api = tokio::spawn(async move {
        if let Err(e) = hub::start_server(state, addr).await {
            warn!("Control API server error: {}", e);
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");
    api.abort();

    Ok(())
}
