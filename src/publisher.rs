//! Telemetry publisher
//!
//! Formats a timestamped payload on a fixed interval and publishes it to
//! the device-scoped topic. The loop observes a shutdown watch channel
//! before every tick; an in-progress tick is never interrupted.

use crate::config::PublishFailurePolicy;
use crate::transport::mqtt::derive_topic;
use crate::transport::Transport;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Ephemeral value produced each tick and discarded after publish
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryEvent {
    pub timestamp: DateTime<Utc>,
}

impl TelemetryEvent {
    pub fn now() -> Self {
        Self {
            timestamp: Utc::now(),
        }
    }

    /// Ad-hoc payload string carrying the device timestamp
    pub fn to_payload(&self) -> String {
        format!("{{device_time:{}}}", self.timestamp.to_rfc3339())
    }
}

/// Periodic publisher for one device-scoped topic
pub struct TelemetryPublisher {
    topic: String,
    interval: Duration,
    failure_policy: PublishFailurePolicy,
}

impl TelemetryPublisher {
    pub fn new(
        device_id: &str,
        topic_suffix: &str,
        interval: Duration,
        failure_policy: PublishFailurePolicy,
    ) -> Self {
        Self {
            topic: derive_topic(device_id, topic_suffix),
            interval,
            failure_policy,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Run the periodic loop until shutdown is signalled or, under the
    /// abort policy, a publish fails. Each tick triggers exactly one
    /// publish; ticks are sequential on the one shared connection.
    pub async fn run<T: Transport>(
        self,
        transport: Arc<T>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> Result<(), T::Error> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // tokio fires the first tick immediately; consume it so the first
        // publish lands one full interval after startup.
        ticker.tick().await;

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        debug!("shutdown observed, no further ticks scheduled");
                        return Ok(());
                    }
                }
                _ = ticker.tick() => {
                    if *shutdown_rx.borrow() {
                        return Ok(());
                    }

                    let event = TelemetryEvent::now();
                    let payload = event.to_payload();
                    match transport.publish(&self.topic, payload.into_bytes()).await {
                        Ok(()) => debug!(topic = %self.topic, "telemetry published"),
                        Err(e) => match self.failure_policy {
                            PublishFailurePolicy::Abort => {
                                warn!(error = %e, "publish failed, aborting loop");
                                return Err(e);
                            }
                            PublishFailurePolicy::Continue => {
                                warn!(error = %e, "publish failed, continuing");
                            }
                        },
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mocks::MockTransport;

    #[test]
    fn test_payload_embeds_timestamp() {
        let event = TelemetryEvent::now();
        let payload = event.to_payload();
        assert!(payload.starts_with("{device_time:"));
        assert!(payload.ends_with('}'));
        assert!(payload.contains(&event.timestamp.to_rfc3339()));
    }

    #[test]
    fn test_topic_derivation() {
        let publisher = TelemetryPublisher::new(
            "contoso-device-01",
            "messages/events/",
            Duration::from_secs(2),
            PublishFailurePolicy::Abort,
        );
        assert_eq!(
            publisher.topic(),
            "devices/contoso-device-01/messages/events/"
        );
    }

    async fn connected_mock() -> Arc<MockTransport> {
        let mut transport = MockTransport::new();
        transport.connect().await.unwrap();
        Arc::new(transport)
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_publish_per_tick() {
        let transport = connected_mock().await;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let publisher = TelemetryPublisher::new(
            "dev01",
            "messages/events/",
            Duration::from_secs(2),
            PublishFailurePolicy::Abort,
        );

        let handle = tokio::spawn(publisher.run(transport.clone(), shutdown_rx));
        // Three intervals pass under the paused clock
        tokio::time::sleep(Duration::from_millis(6100)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();

        let published = transport.get_published().await;
        assert_eq!(published.len(), 3);
        assert!(published
            .iter()
            .all(|(topic, _)| topic == "devices/dev01/messages/events/"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_tick_after_shutdown() {
        let transport = connected_mock().await;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let publisher = TelemetryPublisher::new(
            "dev01",
            "messages/events/",
            Duration::from_secs(2),
            PublishFailurePolicy::Abort,
        );

        let handle = tokio::spawn(publisher.run(transport.clone(), shutdown_rx));
        tokio::time::sleep(Duration::from_millis(2100)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();
        let count = transport.get_published().await.len();

        // Time keeps passing, nothing else may be scheduled
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(transport.get_published().await.len(), count);
        assert_eq!(count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_policy_stops_loop_on_failure() {
        let transport = Arc::new(MockTransport::failing_publish());
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let publisher = TelemetryPublisher::new(
            "dev01",
            "messages/events/",
            Duration::from_secs(2),
            PublishFailurePolicy::Abort,
        );

        let result = publisher.run(transport, shutdown_rx).await;
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_continue_policy_keeps_ticking() {
        let transport = Arc::new(MockTransport::failing_publish());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let publisher = TelemetryPublisher::new(
            "dev01",
            "messages/events/",
            Duration::from_secs(2),
            PublishFailurePolicy::Continue,
        );

        let handle = tokio::spawn(publisher.run(transport.clone(), shutdown_rx));
        tokio::time::sleep(Duration::from_millis(6100)).await;
        shutdown_tx.send(true).unwrap();
        // Failures were logged, not fatal
        handle.await.unwrap().unwrap();
        assert!(transport.publish_attempts() >= 3);
    }
}
