//! Full pipeline tests: detector, event channel and dispatcher running
//! together against an in-memory fleet, on virtual time.

use alerting::{AlertStatus, Endpoint, RecordingTransport};
use container_runtime::{HealthStatus, InMemoryRuntime};
use std::sync::Arc;
use std::time::Duration;
use watchdog::{ConfigError, Settings, Watchdog};

fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.dispatcher.host = "server2".to_string();
    settings
}

/// `(endpoint, is_alarm, status)` of every request, in order
fn summary(transport: &RecordingTransport) -> Vec<(Endpoint, bool, AlertStatus)> {
    transport
        .requests()
        .into_iter()
        .map(|(endpoint, alert)| (endpoint, alert.is_alarm, alert.status))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_failing_container_is_alarmed_then_cleared() {
    let runtime = Arc::new(InMemoryRuntime::with_containers([
        ("web-1", HealthStatus::Unhealthy),
        ("db", HealthStatus::Healthy),
    ]));
    let transport = Arc::new(RecordingTransport::new());
    let watchdog = Watchdog::new(&settings(), runtime.clone(), transport.clone()).unwrap();

    let fleet = runtime.clone();
    watchdog
        .run_until(async move {
            tokio::time::sleep(Duration::from_secs(45)).await;
            fleet.set_health("web-1", HealthStatus::Healthy);
            tokio::time::sleep(Duration::from_secs(25)).await;
        })
        .await;

    assert_eq!(
        summary(&transport),
        vec![
            (Endpoint::Raise, false, AlertStatus::Active),
            (Endpoint::Raise, true, AlertStatus::Active),
            (Endpoint::Clear, false, AlertStatus::Cleared),
            (Endpoint::Clear, true, AlertStatus::Cleared),
        ]
    );
    for (_, alert) in transport.requests() {
        assert_eq!(alert.host, "server2");
        assert_eq!(alert.details, "The web-1 container healthcheck failed");
    }
}

#[tokio::test(start_paused = true)]
async fn test_recovery_before_alarm_still_alarms_then_clears() {
    let runtime = Arc::new(InMemoryRuntime::with_containers([("web-1", HealthStatus::Unhealthy)]));
    let transport = Arc::new(RecordingTransport::new());
    let watchdog = Watchdog::new(&settings(), runtime.clone(), transport.clone()).unwrap();

    let fleet = runtime.clone();
    watchdog
        .run_until(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            fleet.set_health("web-1", HealthStatus::Healthy);
            tokio::time::sleep(Duration::from_secs(60)).await;
        })
        .await;

    // Warning cleared at the first reconcile; the alarm still fires at the
    // end of the recheck delay and is cleared in the same dispatcher step.
    assert_eq!(
        summary(&transport),
        vec![
            (Endpoint::Raise, false, AlertStatus::Active),
            (Endpoint::Clear, false, AlertStatus::Cleared),
            (Endpoint::Raise, true, AlertStatus::Active),
            (Endpoint::Clear, true, AlertStatus::Cleared),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_removed_container_alerts_are_cleared() {
    let runtime = Arc::new(InMemoryRuntime::with_containers([("worker", HealthStatus::Unhealthy)]));
    let transport = Arc::new(RecordingTransport::new());
    let watchdog = Watchdog::new(&settings(), runtime.clone(), transport.clone()).unwrap();

    let fleet = runtime.clone();
    watchdog
        .run_until(async move {
            tokio::time::sleep(Duration::from_secs(45)).await;
            fleet.remove("worker");
            tokio::time::sleep(Duration::from_secs(25)).await;
        })
        .await;

    let clears: Vec<_> = summary(&transport)
        .into_iter()
        .filter(|(endpoint, _, _)| *endpoint == Endpoint::Clear)
        .collect();
    assert_eq!(clears.len(), 2);
}

#[test]
fn test_invalid_settings_rejected() {
    let mut settings = settings();
    settings.detector.concurrency = 0;

    let result = Watchdog::new(
        &settings,
        Arc::new(InMemoryRuntime::new()),
        Arc::new(RecordingTransport::new()),
    );

    assert!(matches!(result, Err(ConfigError::Detector(_))));
}
