//! End-to-end lifecycle behavior against the mock transport

use iothub_telemetry::config::{ConnectionIdentity, PublishFailurePolicy, Settings};
use iothub_telemetry::lifecycle::LifecycleController;
use iothub_telemetry::testing::mocks::MockTransport;
use iothub_telemetry::transport::Transport;
use std::time::Duration;
use tokio::sync::oneshot;

fn controller(
    transport: MockTransport,
    settings: Settings,
) -> LifecycleController<MockTransport> {
    let identity = ConnectionIdentity::new("contoso-hub", "contoso-device-01").unwrap();
    LifecycleController::new(identity, settings, transport)
}

#[tokio::test(start_paused = true)]
async fn publishes_on_device_scoped_topic_until_signal() {
    let transport = MockTransport::new();
    let probe = transport.clone();

    controller(transport, Settings::default())
        .run(async {
            tokio::time::sleep(Duration::from_millis(8100)).await;
        })
        .await
        .unwrap();

    let published = probe.get_published().await;
    assert_eq!(published.len(), 4);
    for (topic, payload) in &published {
        assert_eq!(topic, "devices/contoso-device-01/messages/events/");
        let payload = String::from_utf8(payload.clone()).unwrap();
        assert!(payload.starts_with("{device_time:"));
    }
    assert_eq!(probe.disconnect_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn no_publish_after_signal_and_disconnect_within_grace() {
    let transport = MockTransport::new();
    let probe = transport.clone();
    let (signal_tx, signal_rx) = oneshot::channel::<()>();

    let run = tokio::spawn(controller(transport, Settings::default()).run(async move {
        let _ = signal_rx.await;
    }));

    tokio::time::sleep(Duration::from_millis(2100)).await;
    let before_signal = probe.publish_attempts();
    signal_tx.send(()).unwrap();
    run.await.unwrap().unwrap();

    // No tick was scheduled after the signal, and the connection was
    // released exactly once.
    assert_eq!(probe.publish_attempts(), before_signal);
    assert_eq!(probe.disconnect_calls(), 1);
    assert!(!probe.is_connected());

    // Ticks would have kept coming without the signal
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(probe.publish_attempts(), before_signal);
}

#[tokio::test]
async fn failed_handshake_aborts_before_publishing() {
    let transport = MockTransport::failing_connect();
    let probe = transport.clone();

    let result = controller(transport, Settings::default())
        .run(std::future::pending())
        .await;

    assert!(result.is_err());
    assert_eq!(probe.publish_attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn abort_policy_surfaces_publish_failure() {
    let mut settings = Settings::default();
    settings.telemetry.on_publish_failure = PublishFailurePolicy::Abort;
    let transport = MockTransport::failing_publish();
    let probe = transport.clone();

    let result = controller(transport, settings)
        .run(std::future::pending())
        .await;

    assert!(result.is_err());
    assert_eq!(probe.publish_attempts(), 1);
    // Even the failure path releases the connection
    assert_eq!(probe.disconnect_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn continue_policy_outlives_publish_failures() {
    let mut settings = Settings::default();
    settings.telemetry.on_publish_failure = PublishFailurePolicy::Continue;
    let transport = MockTransport::failing_publish();
    let probe = transport.clone();

    controller(transport, settings)
        .run(async {
            tokio::time::sleep(Duration::from_millis(6100)).await;
        })
        .await
        .unwrap();

    assert_eq!(probe.publish_attempts(), 3);
    assert_eq!(probe.disconnect_calls(), 1);
}

#[tokio::test]
async fn mock_disconnect_is_idempotent() {
    let mut transport = MockTransport::new();
    transport.connect().await.unwrap();
    transport.disconnect(Duration::from_millis(250)).await.unwrap();
    transport.disconnect(Duration::from_millis(250)).await.unwrap();
    assert_eq!(transport.disconnect_calls(), 2);
    assert!(!transport.is_connected());
}
