//! `nina-bridge`: publish NINA device state to MQTT and route commands back.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, warn};

use ninabridge_core::BridgeConfig;
use ninabridge_devices::{Bridge, MqttTransport, NinaClient, COMMAND_QUEUE_CAPACITY};

#[derive(Parser, Debug)]
#[command(name = "nina-bridge")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn log_level(verbose: u8) -> tracing::Level {
    match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    }
}

fn init_logging(verbose: u8) {
    // JSON output for container deployments
    let json_logging = std::env::var("NINA_BRIDGE_LOG_JSON")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level(verbose).as_str()));

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_ids(false)
            .compact()
            .init();
    }
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            warn!(error = %e, "Cannot listen for SIGTERM, waiting for Ctrl-C only");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = BridgeConfig::from_file(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    info!(
        config = %args.config.display(),
        broker = %config.mqtt.full_broker_addr(),
        nina = %config.nina.api_uri,
        "Starting NINA bridge"
    );

    let api = Arc::new(NinaClient::new(
        &config.nina,
        config.mqtt.topics.command_response_timeout(),
    )?);

    let (tx, rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
    let transport = Arc::new(MqttTransport::connect(&config.mqtt, tx));

    let mut bridge = Bridge::new(config, api, transport.clone())?;
    bridge.start(rx);

    shutdown_signal().await;
    info!("Shutdown requested");

    let stats = bridge.stop().await;
    transport.disconnect().await;

    let stats = stats?;
    info!(
        published = stats.published,
        failed = stats.failed,
        "NINA bridge stopped"
    );
    Ok(())
}
