//! MQTT transport implementation
//!
//! `connection` holds the pure pieces (derivations, option construction,
//! state and error types); `client` owns the live session and its event
//! loop supervisor.

pub mod client;
pub mod connection;

pub use client::MqttClient;
pub use connection::{
    configure_mqtt_options, derive_broker_host, derive_topic, derive_username,
    derive_username_in, ConnectionState, TransportError, SECURE_MQTT_PORT,
};
