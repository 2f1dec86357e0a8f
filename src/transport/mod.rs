//! Transport layer for broker communication
//!
//! Provides a transport abstraction and the MQTT implementation so the
//! lifecycle controller and publisher can be exercised against a mock.

use std::time::Duration;

pub mod mqtt;

/// Transport trait for the device-to-broker session
///
/// One live session per run: `connect` once at startup, sequential
/// `publish` calls from the single periodic task, `disconnect` exactly once
/// on the way out.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Establish the session; fails if the handshake or the broker
    /// acknowledgment does not succeed.
    async fn connect(&mut self) -> Result<(), Self::Error>;

    /// Publish a payload at acknowledged-delivery quality; returns once the
    /// broker has acknowledged or the wait is declared failed.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), Self::Error>;

    /// Release the session, waiting up to `grace` for in-flight work to
    /// drain. Safe to call more than once; later calls are no-ops.
    async fn disconnect(&self, grace: Duration) -> Result<(), Self::Error>;

    /// Whether the session is currently established
    fn is_connected(&self) -> bool;
}

/// Type alias for the MQTT transport
pub type MqttTransport = mqtt::MqttClient;
