//! Mock transport for testing

use crate::transport::mqtt::{ConnectionState, TransportError};
use crate::transport::Transport;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub type PublishedMessage = (String, Vec<u8>);

/// Mock transport recording every publish and counting lifecycle calls.
/// Clones share state, so a test can keep a probe handle while the
/// lifecycle controller consumes the transport.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    published: Arc<Mutex<Vec<PublishedMessage>>>,
    connected: Arc<AtomicBool>,
    publish_attempts: Arc<AtomicUsize>,
    disconnect_calls: Arc<AtomicUsize>,
    fail_connect: bool,
    fail_publish: bool,
    hang_publish: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport whose first handshake fails
    pub fn failing_connect() -> Self {
        Self {
            fail_connect: true,
            ..Default::default()
        }
    }

    /// Transport that accepts the connection but rejects every publish
    pub fn failing_publish() -> Self {
        Self {
            fail_publish: true,
            ..Default::default()
        }
    }

    /// Transport whose publishes never complete, as if the broker never
    /// acknowledged
    pub fn hanging_publish() -> Self {
        Self {
            hang_publish: true,
            ..Default::default()
        }
    }

    pub async fn get_published(&self) -> Vec<PublishedMessage> {
        self.published.lock().await.clone()
    }

    pub fn publish_attempts(&self) -> usize {
        self.publish_attempts.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Error = TransportError;

    async fn connect(&mut self) -> Result<(), Self::Error> {
        if self.fail_connect {
            return Err(TransportError::Handshake(
                "mock handshake failure".to_string(),
            ));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), Self::Error> {
        self.publish_attempts.fetch_add(1, Ordering::SeqCst);
        if self.hang_publish {
            std::future::pending::<()>().await;
        }
        if self.fail_publish {
            return Err(TransportError::Publish("mock publish failure".to_string()));
        }
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected {
                state: ConnectionState::Connecting,
            });
        }
        self.published
            .lock()
            .await
            .push((topic.to_string(), payload));
        Ok(())
    }

    async fn disconnect(&self, _grace: Duration) -> Result<(), Self::Error> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
