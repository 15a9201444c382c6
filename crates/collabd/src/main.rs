//! collabd: serves collaborative editing rooms over TCP.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use collab_server::ServerConfig;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod transport;

#[derive(Parser)]
#[command(name = "collabd", version, about = "Collaborative editing daemon")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the configuration file
    #[arg(long)]
    address: Option<String>,

    /// Port to listen on, overriding the configuration file
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => ServerConfig::default(),
    };
    if let Some(address) = cli.address {
        config.address = address;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    config.validate().context("invalid configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with_target(true)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %config.bind_addr(),
        user_capacity = config.user_capacity,
        room_capacity = config.room_capacity,
        "starting collabd"
    );

    transport::serve(config, shutdown_signal()).await?;
    info!("collabd stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
}
