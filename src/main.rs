//! Telemetry client entry point
//!
//! Parses flags, builds the credential and TLS config, establishes one
//! encrypted connection, and publishes until SIGINT/SIGTERM.

use clap::{Parser, Subcommand};
use iothub_telemetry::auth::{build_tls_config, Credential, TrustBundle};
use iothub_telemetry::config::{ConnectionIdentity, Settings};
use iothub_telemetry::error::DeviceResult;
use iothub_telemetry::lifecycle::LifecycleController;
use iothub_telemetry::observability::init_default_logging;
use iothub_telemetry::transport::mqtt::MqttClient;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

/// Secure periodic telemetry publisher for IoT Hub style brokers
#[derive(Parser)]
#[command(name = "iothub-telemetry")]
#[command(about = "Publishes timestamped telemetry to an IoT hub over TLS")]
#[command(version)]
struct Cli {
    /// IoT hub name (host is derived as <hub-name>.<cloud-domain>)
    #[arg(long, env = "HUB_NAME")]
    hub_name: String,

    /// Device id used as MQTT client id and in the publish topic
    #[arg(long, env = "DEVICE_ID")]
    device_id: String,

    /// Optional TOML file with tuning settings
    #[arg(short, long, value_name = "FILE", env = "TELEMETRY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authenticate with an X.509 client certificate at the TLS layer
    X509 {
        /// PEM-encoded device certificate chain
        #[arg(long, env = "CERT_FILE")]
        cert_file: PathBuf,
        /// PEM-encoded device private key
        #[arg(long, env = "KEY_FILE")]
        key_file: PathBuf,
    },
    /// Authenticate with a shared access signature as the MQTT password
    Sas {
        /// Pre-signed shared access signature token
        #[arg(long, env = "SAS_TOKEN")]
        sas_token: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    info!(
        "Starting telemetry publisher v{}",
        env!("CARGO_PKG_VERSION")
    );

    if let Err(e) = run(cli).await {
        error!("Fatal: {e}");
        process::exit(1);
    }

    info!("Shutdown complete");
}

async fn run(cli: Cli) -> DeviceResult<()> {
    let settings = match &cli.config {
        Some(path) => {
            info!("Loading settings from: {}", path.display());
            Settings::load_from_file(path)?
        }
        None => Settings::default(),
    };

    let identity = ConnectionIdentity::new(cli.hub_name, cli.device_id)?;

    let credential = match &cli.command {
        Commands::X509 {
            cert_file,
            key_file,
        } => Credential::from_cert_files(cert_file, key_file)?,
        Commands::Sas { sas_token } => Credential::sas_token(sas_token.clone()),
    };

    let trust = TrustBundle::load(&settings.hub.root_ca_path)?;
    let tls = Arc::new(build_tls_config(trust, &credential)?);

    let transport = MqttClient::new(&identity, &settings, &credential, tls);
    let controller = LifecycleController::new(identity, settings, transport);

    // Graceful shutdown on SIGINT or SIGTERM
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    let shutdown = async move {
        tokio::select! {
            _ = sigint.recv() => info!("Received SIGINT, shutting down gracefully..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully..."),
        }
    };

    controller.run(shutdown).await?;
    Ok(())
}
