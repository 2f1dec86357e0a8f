//! Lifecycle controller
//!
//! Runs exactly once per process invocation through the states
//! Starting -> Connected -> Publishing -> Draining -> Terminated. There is
//! no restart transition: any terminal error ends the run and the process.

use crate::config::{ConnectionIdentity, Settings};
use crate::publisher::TelemetryPublisher;
use crate::transport::Transport;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Run states, entered strictly in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Configuration validated, trust loaded, credential built
    Starting,
    /// Transport and session established
    Connected,
    /// Periodic publish task running
    Publishing,
    /// Shutdown signal observed, no further ticks scheduled
    Draining,
    /// Connection released
    Terminated,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Starting => "starting",
            RunState::Connected => "connected",
            RunState::Publishing => "publishing",
            RunState::Draining => "draining",
            RunState::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Wires identity, settings, and transport together and owns the run
pub struct LifecycleController<T>
where
    T: Transport + 'static,
{
    identity: ConnectionIdentity,
    settings: Settings,
    transport: T,
}

impl<T> LifecycleController<T>
where
    T: Transport + 'static,
{
    pub fn new(identity: ConnectionIdentity, settings: Settings, transport: T) -> Self {
        Self {
            identity,
            settings,
            transport,
        }
    }

    /// Run to completion: connect, publish until `shutdown` resolves (or a
    /// publish failure under the abort policy ends the loop early), then
    /// release the connection within the grace period. The publish task is
    /// joined before disconnect, so teardown never races an in-flight
    /// publish.
    pub async fn run<S>(self, shutdown: S) -> Result<(), T::Error>
    where
        S: Future<Output = ()>,
    {
        let mut state = RunState::Starting;
        info!(state = %state, device_id = %self.identity.device_id, "lifecycle started");

        let mut transport = self.transport;
        transport.connect().await?;
        state = RunState::Connected;
        info!(state = %state, hub = %self.identity.hub_name, "session established");

        let transport = Arc::new(transport);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let publisher = TelemetryPublisher::new(
            &self.identity.device_id,
            &self.settings.telemetry.topic_suffix,
            self.settings.interval(),
            self.settings.telemetry.on_publish_failure,
        );
        info!(topic = publisher.topic(), interval_secs = self.settings.telemetry.interval_secs, "publishing telemetry");

        let mut publish_task = tokio::spawn(publisher.run(transport.clone(), cancel_rx));
        state = RunState::Publishing;
        debug!(state = %state, "periodic task running");

        // Block until the external signal arrives or the publish loop ends
        // on its own (abort policy).
        let early_outcome = tokio::select! {
            () = shutdown => {
                state = RunState::Draining;
                info!(state = %state, "shutdown signal received");
                let _ = cancel_tx.send(true);
                None
            }
            outcome = &mut publish_task => {
                state = RunState::Draining;
                warn!(state = %state, "publish loop ended before shutdown signal");
                Some(outcome)
            }
        };

        // Join the periodic task before releasing the connection so
        // teardown cannot race an in-flight publish. A publish stuck
        // waiting on its acknowledgment gets the grace period, then the
        // task is aborted so teardown stays bounded.
        let loop_outcome = match early_outcome {
            Some(outcome) => outcome,
            None => {
                let grace = self.settings.disconnect_grace();
                match tokio::time::timeout(grace, &mut publish_task).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        warn!("publish still in flight after grace period, aborting task");
                        publish_task.abort();
                        publish_task.await
                    }
                }
            }
        };

        // Exactly-once release on every exit path
        let disconnect_result = transport.disconnect(self.settings.disconnect_grace()).await;
        state = RunState::Terminated;
        info!(state = %state, "connection released");

        match loop_outcome {
            Ok(loop_result) => {
                loop_result?;
                disconnect_result
            }
            Err(join_error) => {
                warn!(error = %join_error, "publish task did not join cleanly");
                disconnect_result
            }
        }
    }
}
