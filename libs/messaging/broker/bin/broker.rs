//! Broker binary
//!
//! Usage:
//!   broker
//!   broker --config config/broker.toml
//!   broker --bind 0.0.0.0:1234 --log-level debug --json-logs

use anyhow::{Context, Result};
use broker::BrokerServer;
use broker_config::BrokerConfig;
use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "broker")]
#[command(about = "Topic/channel message broker")]
#[command(version)]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long)]
    log_level: Option<String>,

    /// Enable JSON logging format
    #[arg(long)]
    json_logs: bool,

    /// Listen address; overrides the config file
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = BrokerConfig::load(args.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(bind) = &args.bind {
        config.server.bind_address = bind.clone();
    }
    config.validate().context("Invalid configuration")?;

    init_logging(&args, &config)?;

    info!("Starting broker");
    if let Some(path) = &args.config {
        info!("Configuration: {}", path.display());
    }

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    let server = BrokerServer::new(&config);
    if let Err(e) = server.serve(listener, shutdown_signal()).await {
        error!("Broker failed: {}", e);
        return Err(e.into());
    }

    Ok(())
}

fn init_logging(args: &Args, config: &BrokerConfig) -> Result<()> {
    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());

    // RUST_LOG wins when set
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&level))
        .with_context(|| format!("Invalid log level '{level}'"))?;

    if args.json_logs || config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for CTRL+C: {}", e);
        // Without a signal handler, run until killed
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
