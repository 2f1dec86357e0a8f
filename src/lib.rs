//! Secure periodic telemetry publisher
//!
//! A reference client that connects a simulated IoT device to an Azure IoT
//! Hub style MQTT broker over mutually authenticated TLS and publishes a
//! timestamped payload on a fixed interval until a shutdown signal arrives.
//!
//! # Overview
//!
//! The crate is organized around five small components:
//! - [`auth::TrustBundle`] loads the root certificate pool from disk
//! - [`auth::build_tls_config`] pins TLS 1.2 and wires in one of the two
//!   credential strategies ([`auth::Credential`])
//! - [`transport::mqtt::MqttClient`] owns the single broker session
//! - [`publisher::TelemetryPublisher`] publishes one event per tick
//! - [`lifecycle::LifecycleController`] wires them together and drains on
//!   SIGINT/SIGTERM
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use iothub_telemetry::auth::{build_tls_config, Credential, TrustBundle};
//! use iothub_telemetry::config::{ConnectionIdentity, Settings};
//! use iothub_telemetry::lifecycle::LifecycleController;
//! use iothub_telemetry::transport::mqtt::MqttClient;
//! use std::sync::Arc;
//!
//! # async fn run() -> iothub_telemetry::DeviceResult<()> {
//! let settings = Settings::default();
//! let identity = ConnectionIdentity::new("myhub", "dev01")?;
//! let credential = Credential::sas_token("SharedAccessSignature sr=...");
//!
//! let trust = TrustBundle::load(&settings.hub.root_ca_path)?;
//! let tls = Arc::new(build_tls_config(trust, &credential)?);
//!
//! let transport = MqttClient::new(&identity, &settings, &credential, tls);
//! let controller = LifecycleController::new(identity, settings, transport);
//! controller.run(std::future::pending()).await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod publisher;
pub mod testing;
pub mod transport;

pub use auth::{build_tls_config, Credential, TrustBundle};
pub use config::{ConnectionIdentity, PublishFailurePolicy, Settings};
pub use error::{DeviceError, DeviceResult};
pub use lifecycle::{LifecycleController, RunState};
pub use publisher::{TelemetryEvent, TelemetryPublisher};
pub use transport::mqtt::MqttClient;
pub use transport::Transport;
