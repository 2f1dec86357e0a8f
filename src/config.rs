//! Configuration for the telemetry publisher
//!
//! Connection identity (hub name, device id) comes from the CLI; everything
//! else is tunable through an optional TOML file and falls back to the
//! defaults the reference client ships with.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Pinned IoT Hub REST api-version carried in the MQTT username.
pub const DEFAULT_API_VERSION: &str = "2018-06-30";

/// Default cloud DNS suffix appended to the hub name.
pub const DEFAULT_CLOUD_DOMAIN: &str = "azure-devices.net";

/// Tunable settings, all optional on disk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Settings {
    #[serde(default)]
    pub telemetry: TelemetrySection,
    #[serde(default)]
    pub mqtt: MqttSection,
    #[serde(default)]
    pub hub: HubSection,
}

/// Telemetry loop tuning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TelemetrySection {
    /// Seconds between publishes
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Device-scoped topic suffix, appended to `devices/<device_id>/`
    #[serde(default = "default_topic_suffix")]
    pub topic_suffix: String,
    /// What to do when a publish fails
    #[serde(default)]
    pub on_publish_failure: PublishFailurePolicy,
}

/// Policy applied by the publish loop when a publish fails
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PublishFailurePolicy {
    /// Stop the loop and let the controller tear the process down
    #[default]
    Abort,
    /// Log the failure and keep ticking
    Continue,
}

/// MQTT session tuning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MqttSection {
    /// Liveness heartbeat interval in seconds
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    /// Cap on the delay between library reconnect attempts, in milliseconds
    #[serde(default = "default_reconnect_max_interval_ms")]
    pub reconnect_max_interval_ms: u64,
    /// How long to wait for the broker CONNACK before the initial
    /// connection is declared failed, in seconds
    #[serde(default = "default_connack_timeout_secs")]
    pub connack_timeout_secs: u64,
    /// How long a QoS 1 publish may wait for its PUBACK, in seconds
    #[serde(default = "default_puback_timeout_secs")]
    pub puback_timeout_secs: u64,
    /// Grace period for draining in-flight work at disconnect, in milliseconds
    #[serde(default = "default_disconnect_grace_ms")]
    pub disconnect_grace_ms: u64,
}

/// Hub addressing and trust material
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HubSection {
    /// DNS suffix appended to the hub name to form the broker host
    #[serde(default = "default_cloud_domain")]
    pub cloud_domain: String,
    /// api-version pinned into the MQTT username
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// PEM bundle of root certificates the broker chain must verify against
    #[serde(default = "default_root_ca_path")]
    pub root_ca_path: PathBuf,
}

fn default_interval_secs() -> u64 {
    2
}

fn default_topic_suffix() -> String {
    "messages/events/".to_string()
}

fn default_keep_alive_secs() -> u64 {
    30
}

fn default_reconnect_max_interval_ms() -> u64 {
    1000
}

fn default_connack_timeout_secs() -> u64 {
    30
}

fn default_puback_timeout_secs() -> u64 {
    10
}

fn default_disconnect_grace_ms() -> u64 {
    250
}

fn default_cloud_domain() -> String {
    DEFAULT_CLOUD_DOMAIN.to_string()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_root_ca_path() -> PathBuf {
    PathBuf::from("certs/IoTHubRootCA_Baltimore.pem")
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            topic_suffix: default_topic_suffix(),
            on_publish_failure: PublishFailurePolicy::default(),
        }
    }
}

impl Default for MqttSection {
    fn default() -> Self {
        Self {
            keep_alive_secs: default_keep_alive_secs(),
            reconnect_max_interval_ms: default_reconnect_max_interval_ms(),
            connack_timeout_secs: default_connack_timeout_secs(),
            puback_timeout_secs: default_puback_timeout_secs(),
            disconnect_grace_ms: default_disconnect_grace_ms(),
        }
    }
}

impl Default for HubSection {
    fn default() -> Self {
        Self {
            cloud_domain: default_cloud_domain(),
            api_version: default_api_version(),
            root_ca_path: default_root_ca_path(),
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Invalid hub name: {0}")]
    InvalidHubName(String),
    #[error("Invalid device id: {0}")]
    InvalidDeviceId(String),
}

impl Settings {
    /// Load settings from a TOML file; every field is optional
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.telemetry.interval_secs)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.mqtt.keep_alive_secs)
    }

    pub fn reconnect_max_interval(&self) -> Duration {
        Duration::from_millis(self.mqtt.reconnect_max_interval_ms)
    }

    pub fn connack_timeout(&self) -> Duration {
        Duration::from_secs(self.mqtt.connack_timeout_secs)
    }

    pub fn puback_timeout(&self) -> Duration {
        Duration::from_secs(self.mqtt.puback_timeout_secs)
    }

    pub fn disconnect_grace(&self) -> Duration {
        Duration::from_millis(self.mqtt.disconnect_grace_ms)
    }
}

/// Hub-scoped device identity, validated before any network activity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionIdentity {
    pub hub_name: String,
    pub device_id: String,
}

impl ConnectionIdentity {
    /// Validate and build an identity. Both fields must be non-empty and
    /// free of characters that would corrupt the derived broker address,
    /// username, or publish topic.
    pub fn new(
        hub_name: impl Into<String>,
        device_id: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let hub_name = hub_name.into();
        let device_id = device_id.into();

        validate_name(&hub_name).map_err(ConfigError::InvalidHubName)?;
        validate_name(&device_id).map_err(ConfigError::InvalidDeviceId)?;

        Ok(Self {
            hub_name,
            device_id,
        })
    }
}

fn validate_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("must be non-empty".to_string());
    }

    // `/` corrupts the username and topic derivations, `+` and `#` are
    // topic wildcards, whitespace and control characters break the broker
    // address. Everything else (`$ : @ ( )` included) is passed through.
    let broken = name
        .chars()
        .any(|c| matches!(c, '/' | '+' | '#') || c.is_whitespace() || c.is_control());
    if broken {
        return Err(format!(
            "'{name}' may not contain '/', '+', '#', or whitespace"
        ));
    }

    Ok(())
}
