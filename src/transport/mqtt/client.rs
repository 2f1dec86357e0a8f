//! MQTT connection manager
//!
//! Owns the one live session per run. A spawned supervisor task drives the
//! rumqttc event loop, reports session state over a watch channel, and
//! forwards broker PUBACKs so QoS 1 publishes block until acknowledged.
//! Publishes come from a single periodic task, so acknowledgments arrive in
//! publish order on the one connection; an ack whose publish already timed
//! out is counted and discarded, never credited to a later publish.

use super::connection::{configure_mqtt_options, ConnectionState, TransportError};
use crate::auth::Credential;
use crate::config::{ConnectionIdentity, Settings};
use crate::transport::Transport;
use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, Packet, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub struct MqttClient {
    client: AsyncClient,
    event_loop: Mutex<Option<EventLoop>>,
    state_rx: watch::Receiver<ConnectionState>,
    state_tx: watch::Sender<ConnectionState>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    acks: Mutex<AckTracker>,
    ack_tx: mpsc::UnboundedSender<u16>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
    reconnect_max_interval: Duration,
    connack_timeout: Duration,
    puback_timeout: Duration,
}

/// Acknowledgment bookkeeping for the sequential publisher. `stale` counts
/// publishes whose ack wait was abandoned on timeout; their acks still
/// arrive in order and must be skipped before the next publish can claim
/// one as its own.
struct AckTracker {
    rx: mpsc::UnboundedReceiver<u16>,
    stale: usize,
}

impl MqttClient {
    /// Build the client from the validated identity, the tunable settings,
    /// the selected credential, and the TLS config the authenticator
    /// produced. No network activity happens until `connect`.
    pub fn new(
        identity: &ConnectionIdentity,
        settings: &Settings,
        credential: &Credential,
        tls: Arc<rustls::ClientConfig>,
    ) -> Self {
        let options = configure_mqtt_options(identity, settings, credential, tls);
        let (client, event_loop) = AsyncClient::new(options, 10);

        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (ack_tx, ack_rx) = mpsc::unbounded_channel();

        Self {
            client,
            event_loop: Mutex::new(Some(event_loop)),
            state_rx,
            state_tx,
            shutdown_tx,
            shutdown_rx,
            acks: Mutex::new(AckTracker { rx: ack_rx, stale: 0 }),
            ack_tx,
            supervisor: Mutex::new(None),
            reconnect_max_interval: settings.reconnect_max_interval(),
            connack_timeout: settings.connack_timeout(),
            puback_timeout: settings.puback_timeout(),
        }
    }

    /// Current session state
    pub fn connection_state(&self) -> ConnectionState {
        self.state_rx.borrow().clone()
    }

    /// Drive the event loop until shutdown is signalled. Session state and
    /// incoming PUBACKs are fanned out over the channels; poll errors put
    /// the session in `Disconnected` and rumqttc retries on the next poll,
    /// throttled to the configured maximum interval.
    async fn supervise(
        mut event_loop: EventLoop,
        state_tx: watch::Sender<ConnectionState>,
        ack_tx: mpsc::UnboundedSender<u16>,
        mut shutdown_rx: watch::Receiver<bool>,
        reconnect_max_interval: Duration,
    ) {
        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        debug!("event loop supervisor stopping");
                        break;
                    }
                }
                event = event_loop.poll() => match event {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                        if ack.code == ConnectReturnCode::Success {
                            info!("broker acknowledged connection");
                            let _ = state_tx.send(ConnectionState::Connected);
                        } else {
                            warn!(code = ?ack.code, "broker refused connection");
                            let _ = state_tx.send(ConnectionState::Disconnected(format!(
                                "broker refused connection: {:?}",
                                ack.code
                            )));
                        }
                    }
                    Ok(Event::Incoming(Packet::PubAck(ack))) => {
                        let _ = ack_tx.send(ack.pkid);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "mqtt event loop error");
                        let _ = state_tx.send(ConnectionState::Disconnected(e.to_string()));
                        tokio::time::sleep(reconnect_max_interval).await;
                        let _ = state_tx.send(ConnectionState::Reconnecting);
                    }
                }
            }
        }
    }

    /// Wait until the state channel reports a settled outcome for the
    /// initial connection attempt.
    async fn wait_for_connack(
        mut state_rx: watch::Receiver<ConnectionState>,
        timeout: Duration,
    ) -> Result<(), TransportError> {
        tokio::time::timeout(timeout, async {
            loop {
                let settled = match &*state_rx.borrow_and_update() {
                    ConnectionState::Connected => Some(Ok(())),
                    ConnectionState::Disconnected(reason) => {
                        Some(Err(TransportError::Handshake(reason.clone())))
                    }
                    ConnectionState::Connecting | ConnectionState::Reconnecting => None,
                };
                if let Some(outcome) = settled {
                    return outcome;
                }
                if state_rx.changed().await.is_err() {
                    return Err(TransportError::Handshake(
                        "event loop terminated before CONNACK".to_string(),
                    ));
                }
            }
        })
        .await
        .map_err(|_| TransportError::ConnackTimeout)?
    }
}

#[async_trait]
impl Transport for MqttClient {
    type Error = TransportError;

    /// Start the event loop and block until the broker CONNACK arrives.
    /// There is no retry-then-degrade path here: a failed first handshake
    /// surfaces as an error and the caller aborts startup.
    async fn connect(&mut self) -> Result<(), Self::Error> {
        let event_loop = self
            .event_loop
            .lock()
            .await
            .take()
            .ok_or(TransportError::AlreadyConnected)?;

        let handle = tokio::spawn(Self::supervise(
            event_loop,
            self.state_tx.clone(),
            self.ack_tx.clone(),
            self.shutdown_rx.clone(),
            self.reconnect_max_interval,
        ));
        *self.supervisor.lock().await = Some(handle);

        Self::wait_for_connack(self.state_rx.clone(), self.connack_timeout).await
    }

    /// QoS 1 publish that returns once the broker PUBACK arrives. Publishes
    /// are strictly sequential from the one periodic task and the broker
    /// acks them in order, so after skipping the acks of abandoned waits
    /// the next ack off the channel belongs to this publish.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), Self::Error> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected {
                state: self.connection_state(),
            });
        }

        let mut acks = self.acks.lock().await;

        // Anything queued before this publish belongs to an earlier wait
        // that timed out.
        while acks.stale > 0 {
            match acks.rx.try_recv() {
                Ok(pkid) => {
                    acks.stale -= 1;
                    debug!(pkid, "discarded acknowledgment of an abandoned publish");
                }
                Err(_) => break,
            }
        }

        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| TransportError::Publish(e.to_string()))?;

        let deadline = tokio::time::Instant::now() + self.puback_timeout;
        loop {
            match tokio::time::timeout_at(deadline, acks.rx.recv()).await {
                Ok(Some(pkid)) if acks.stale > 0 => {
                    acks.stale -= 1;
                    debug!(pkid, "discarded late acknowledgment of an abandoned publish");
                }
                Ok(Some(pkid)) => {
                    debug!(topic, pkid, "publish acknowledged");
                    return Ok(());
                }
                Ok(None) => {
                    return Err(TransportError::Publish(
                        "event loop terminated before acknowledgment".to_string(),
                    ));
                }
                Err(_) => {
                    acks.stale += 1;
                    return Err(TransportError::PubackTimeout);
                }
            }
        }
    }

    /// Release the session exactly once. Signals the supervisor, sends the
    /// MQTT disconnect, waits up to `grace` for the loop to drain, then
    /// aborts it unconditionally. Later calls find no supervisor and
    /// return immediately.
    async fn disconnect(&self, grace: Duration) -> Result<(), Self::Error> {
        let Some(mut handle) = self.supervisor.lock().await.take() else {
            debug!("disconnect called with no live session");
            return Ok(());
        };

        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.client.disconnect().await {
            debug!(error = %e, "disconnect packet not sent, tearing down anyway");
        }

        if tokio::time::timeout(grace, &mut handle).await.is_err() {
            warn!(grace_ms = grace.as_millis() as u64, "grace period elapsed, aborting event loop");
            handle.abort();
        }

        let _ = self.state_tx.send(ConnectionState::Disconnected(
            "client disconnected".to_string(),
        ));
        info!("mqtt session released");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        matches!(*self.state_rx.borrow(), ConnectionState::Connected)
    }
}

impl Drop for MqttClient {
    fn drop(&mut self) {
        // Belt-and-braces: the lifecycle controller is expected to have
        // disconnected already. If not, stop the supervisor so the task
        // does not outlive the client.
        let _ = self.shutdown_tx.send(true);
        if let Ok(mut supervisor) = self.supervisor.try_lock() {
            if let Some(handle) = supervisor.take() {
                error!("mqtt client dropped while connected, aborting event loop");
                handle.abort();
            }
        }
    }
}
