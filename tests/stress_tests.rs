// Stress harness tests: fan-out/fan-in cardinality, rejection, timing

mod common;

use common::TestBackend;
use gamemon::aggregator::MetricsAggregator;
use gamemon::models::{LogLevel, MonitorSnapshot};
use gamemon::stress::StressHarness;
use std::sync::Arc;
use tokio::time::{Duration, Instant};

fn aggregator() -> Arc<MetricsAggregator> {
    Arc::new(MetricsAggregator::new(100, 500))
}

fn harness(ws_url: String, aggregator: Arc<MetricsAggregator>) -> StressHarness {
    StressHarness::new(
        ws_url,
        Duration::from_secs(2),
        Duration::from_millis(10),
        aggregator,
    )
}

fn connect_attempts(snapshot: &MonitorSnapshot) -> usize {
    snapshot
        .activity
        .iter()
        .filter(|e| e.source == "stress" && e.message.starts_with("stress client"))
        .filter(|e| e.message.ends_with("connected") || e.message.contains("connect failed"))
        .count()
}

fn teardown_attempts(snapshot: &MonitorSnapshot) -> usize {
    snapshot
        .activity
        .iter()
        .filter(|e| e.source == "stress" && e.message.starts_with("stress client"))
        .filter(|e| {
            e.message.ends_with("closed")
                || e.message.contains("close failed")
                || e.message.contains("had no open channel")
        })
        .count()
}

#[tokio::test]
async fn test_stress_run_has_exact_log_cardinality() {
    let backend = TestBackend::spawn().await;
    let aggregator = aggregator();
    let harness = harness(backend.ws_url(), aggregator.clone());

    let report = harness
        .run_stress_test(10, Duration::from_millis(200))
        .await;

    assert!(!report.rejected);
    assert_eq!(report.connected, 10);
    assert_eq!(report.failed, 0);
    assert_eq!(backend.accepted_connections(), 10);

    let snapshot = aggregator.snapshot();
    assert_eq!(connect_attempts(&snapshot), 10);
    assert_eq!(teardown_attempts(&snapshot), 10);
    assert!(snapshot
        .activity
        .iter()
        .any(|e| e.message.contains("stress test completed: 10 connected, 0 failed")));
    backend.shutdown();
}

#[tokio::test]
async fn test_stress_hold_duration_is_respected() {
    let backend = TestBackend::spawn().await;
    let aggregator = aggregator();
    let harness = harness(backend.ws_url(), aggregator.clone());

    let started = Instant::now();
    let report = harness.run_stress_test(2, Duration::from_millis(300)).await;
    assert_eq!(report.connected, 2);
    assert!(
        started.elapsed() >= Duration::from_millis(300),
        "run must hold connections for the requested duration"
    );
    backend.shutdown();
}

#[tokio::test]
async fn test_second_stress_run_is_rejected_while_in_flight() {
    let backend = TestBackend::spawn().await;
    let aggregator = aggregator();
    let harness = Arc::new(harness(backend.ws_url(), aggregator.clone()));

    let first = {
        let harness = harness.clone();
        tokio::spawn(async move { harness.run_stress_test(3, Duration::from_millis(500)).await })
    };
    tokio::time::sleep(Duration::from_millis(150)).await;

    let second = harness.run_stress_test(2, Duration::from_millis(100)).await;
    assert!(second.rejected);
    assert_eq!(second.connected, 0);

    let first = first.await.unwrap();
    assert!(!first.rejected);
    assert_eq!(first.connected, 3);

    // The rejected run made no connection attempts of its own.
    assert_eq!(backend.accepted_connections(), 3);
    let snapshot = aggregator.snapshot();
    assert_eq!(connect_attempts(&snapshot), 3);
    assert!(snapshot
        .activity
        .iter()
        .any(|e| e.level == LogLevel::Warning && e.message.contains("already in flight")));
    backend.shutdown();
}

#[tokio::test]
async fn test_stress_completes_when_every_connect_fails() {
    let aggregator = aggregator();
    // Nothing listens on port 9 (discard); every connect is refused.
    let harness = StressHarness::new(
        "ws://127.0.0.1:9/".into(),
        Duration::from_millis(500),
        Duration::from_millis(5),
        aggregator.clone(),
    );

    let report = harness.run_stress_test(5, Duration::from_millis(50)).await;
    assert!(!report.rejected);
    assert_eq!(report.connected, 0);
    assert_eq!(report.failed, 5);

    let snapshot = aggregator.snapshot();
    assert_eq!(connect_attempts(&snapshot), 5);
    assert_eq!(teardown_attempts(&snapshot), 5);
    assert!(snapshot
        .activity
        .iter()
        .any(|e| e.message.contains("stress test completed: 0 connected, 5 failed")));
}

#[tokio::test]
async fn test_new_run_allowed_after_previous_completes() {
    let backend = TestBackend::spawn().await;
    let aggregator = aggregator();
    let harness = harness(backend.ws_url(), aggregator.clone());

    let first = harness.run_stress_test(2, Duration::from_millis(50)).await;
    assert!(!first.rejected);
    let second = harness.run_stress_test(2, Duration::from_millis(50)).await;
    assert!(!second.rejected);
    assert_eq!(backend.accepted_connections(), 4);
    backend.shutdown();
}
