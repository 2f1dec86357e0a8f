//! Pure connection pieces for the MQTT client
//!
//! Address, username, and topic derivation plus option construction live
//! here so they can be tested without any network.

use crate::auth::Credential;
use crate::config::{ConnectionIdentity, Settings, DEFAULT_CLOUD_DOMAIN};
use rumqttc::{MqttOptions, TlsConfiguration, Transport as RumqttcTransport};
use std::sync::Arc;
use thiserror::Error;

/// Secure MQTT port used for hub connections
pub const SECURE_MQTT_PORT: u16 = 8883;

/// Connection state for the MQTT session
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// Initial state - waiting for the broker CONNACK
    Connecting,
    /// CONNACK received, session ready
    Connected,
    /// Session lost with reason; the event loop keeps retrying
    Disconnected(String),
    /// Retrying after a dropped session
    Reconnecting,
}

/// MQTT transport errors
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("No CONNACK received within the configured timeout")]
    ConnackTimeout,

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Publish not acknowledged within the configured timeout")]
    PubackTimeout,

    #[error("Not connected - current state: {state:?}")]
    NotConnected { state: ConnectionState },

    #[error("Connection already established")]
    AlreadyConnected,
}

/// Broker host: `<hub>.<cloud_domain>`
pub fn derive_broker_host(hub_name: &str, cloud_domain: &str) -> String {
    format!("{hub_name}.{cloud_domain}")
}

/// Hub-scoped MQTT username carrying identity and the pinned api-version:
/// `<hub>.<cloud_domain>/<device_id>/?api-version=<version>`
pub fn derive_username_in(
    hub_name: &str,
    cloud_domain: &str,
    device_id: &str,
    api_version: &str,
) -> String {
    format!("{hub_name}.{cloud_domain}/{device_id}/?api-version={api_version}")
}

/// Username derivation against the default cloud domain
pub fn derive_username(hub_name: &str, device_id: &str, api_version: &str) -> String {
    derive_username_in(hub_name, DEFAULT_CLOUD_DOMAIN, device_id, api_version)
}

/// Device-scoped publish topic: `devices/<device_id>/<suffix>`
pub fn derive_topic(device_id: &str, topic_suffix: &str) -> String {
    format!("devices/{device_id}/{topic_suffix}")
}

/// Build the MQTT options for one session: clean session, keep-alive
/// heartbeat, TLS transport, hub-style username, and the token as password
/// when the credential carries one.
pub fn configure_mqtt_options(
    identity: &ConnectionIdentity,
    settings: &Settings,
    credential: &Credential,
    tls: Arc<rustls::ClientConfig>,
) -> MqttOptions {
    let host = derive_broker_host(&identity.hub_name, &settings.hub.cloud_domain);
    let mut options = MqttOptions::new(identity.device_id.clone(), host, SECURE_MQTT_PORT);

    options.set_clean_session(true);
    options.set_keep_alive(settings.keep_alive());
    options.set_transport(RumqttcTransport::Tls(TlsConfiguration::Rustls(tls)));

    let username = derive_username_in(
        &identity.hub_name,
        &settings.hub.cloud_domain,
        &identity.device_id,
        &settings.hub.api_version,
    );
    // The hub requires the username for both credential paths. X.509 has no
    // application-layer password; the broker ignores the empty one.
    options.set_credentials(username, credential.password().unwrap_or_default());

    options
}
