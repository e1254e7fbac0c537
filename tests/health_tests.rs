//! Health probing, status derivation and alert throttling.

mod support;

use exchange_mesh::{
    types::{Alert, AlertFilter, AlertLevel, ExchangeMetrics, HealthStatus},
    health::AlertHandler,
    ExchangeError,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use support::{mesh_with, MockExchange};
use tokio_test::assert_ok;

fn critical_alerts(alerts: &[Alert]) -> usize {
    alerts.iter().filter(|a| a.level == AlertLevel::Critical).count()
}

#[tokio::test(start_paused = true)]
async fn disconnected_exchange_goes_offline_and_is_excluded() {
    let venues = [
        MockExchange::quoting("ex-1"),
        MockExchange::quoting("ex-2"),
        MockExchange::quoting("ex-3"),
    ];
    venues[1].set_connected(false);
    let mesh = mesh_with(&venues, |_| {});
    mesh.selector().set_priority("ex-2", 100);

    let reports = mesh.monitor().run_cycle().await;
    assert_eq!(reports[0].status, HealthStatus::Healthy);
    assert_eq!(reports[1].status, HealthStatus::Offline);
    assert_eq!(reports[2].status, HealthStatus::Healthy);
    assert!(!mesh.executor().metrics("ex-2").connection_status);

    let alerts = mesh.monitor().get_alerts(&AlertFilter::default());
    assert_eq!(critical_alerts(&alerts), 1);
    assert_eq!(alerts[0].exchange_name, "ex-2");

    for _ in 0..5 {
        let chosen = mesh.selector().select_best("BTCUSDT", None).await;
        assert_ne!(chosen.as_deref(), Some("ex-2"));
        assert!(chosen.is_some());
    }
    assert!(!mesh.selector().routable_exchanges("BTCUSDT").await.contains(&"ex-2".to_string()));
}

#[tokio::test(start_paused = true)]
async fn repeated_alerts_are_deduplicated_within_cooldown() {
    let venue = MockExchange::quoting("ex-1");
    let mesh = mesh_with(&[venue], |c| c.monitor.alert_cooldown_secs = 300);
    let monitor = mesh.monitor();
    let metrics = ExchangeMetrics::new("ex-1");
    let issues = vec!["connectivity check failed".to_string()];

    assert_eq!(monitor.generate_alerts("ex-1", HealthStatus::Offline, &metrics, &issues).len(), 1);
    tokio::time::advance(Duration::from_secs(10)).await;
    assert!(monitor.generate_alerts("ex-1", HealthStatus::Offline, &metrics, &issues).is_empty());
    assert_eq!(monitor.get_alerts(&AlertFilter::default()).len(), 1);

    tokio::time::advance(Duration::from_secs(291)).await;
    assert_eq!(monitor.generate_alerts("ex-1", HealthStatus::Offline, &metrics, &issues).len(), 1);
    assert_eq!(monitor.get_alerts(&AlertFilter::default()).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn hung_probe_times_out_without_blocking_others() {
    let fast = MockExchange::quoting("fast");
    let hung = MockExchange::quoting("hung");
    hung.set_probe_delay(Duration::from_secs(3600));
    let mesh = mesh_with(&[fast, hung], |c| c.monitor.probe_timeout_secs = 2);

    let reports = mesh.monitor().run_cycle().await;
    assert_eq!(reports[0].status, HealthStatus::Healthy);
    assert_eq!(reports[1].status, HealthStatus::Offline);
    assert!(reports[1].issues[0].contains("timed out"));
}

#[tokio::test(start_paused = true)]
async fn slow_api_probe_marks_degraded() {
    let slow = MockExchange::quoting("slow");
    let mesh = mesh_with(&[slow.clone()], |c| {
        c.health.response_time_threshold_ms = 1_000;
        c.monitor.probe_timeout_secs = 30;
    });
    slow.set_probe_delay(Duration::from_secs(2));

    let reports = mesh.monitor().run_cycle().await;
    assert_eq!(reports[0].status, HealthStatus::Degraded);
    assert!(reports[0].response_time.unwrap() >= Duration::from_secs(2));
    assert_eq!(mesh.monitor().get_exchange_status("slow").await, HealthStatus::Degraded);
}

#[tokio::test(start_paused = true)]
async fn failing_traffic_makes_exchange_unhealthy_with_error_rate_warning() {
    let venue = MockExchange::quoting("flaky");
    venue.fail_always(Some(ExchangeError::from_status(500, "")));
    let mesh = mesh_with(&[venue.clone()], |_| {});

    for _ in 0..12 {
        let outcome = mesh
            .executor()
            .execute_operation("flaky", &exchange_mesh::exchange::ExchangeOperation::ticker("BTCUSDT"))
            .await;
        assert!(!outcome.success);
    }

    let reports = mesh.monitor().run_cycle().await;
    assert_eq!(reports[0].status, HealthStatus::Unhealthy);

    let alerts = mesh.monitor().get_alerts(&AlertFilter::default());
    assert!(alerts.iter().any(|a| a.level == AlertLevel::Error));
    assert!(alerts.iter().any(|a| a.level == AlertLevel::Warning && a.title == "High error rate"));
}

#[tokio::test(start_paused = true)]
async fn unresolved_filter_hides_resolved_alerts() {
    let venue = MockExchange::quoting("ex-1");
    venue.set_connected(false);
    let mesh = mesh_with(&[venue], |_| {});
    mesh.monitor().run_cycle().await;

    let open = mesh.monitor().get_alerts(&AlertFilter::unresolved());
    assert_eq!(open.len(), 1);
    assert!(mesh.monitor().resolve_alert(&open[0].id));
    assert!(mesh.monitor().get_alerts(&AlertFilter::unresolved()).is_empty());
    assert_eq!(mesh.monitor().get_alerts(&AlertFilter::all()).len(), 1);
}

struct Recorder(Mutex<Vec<String>>);

#[async_trait]
impl AlertHandler for Recorder {
    async fn on_alert(&self, alert: Alert) {
        self.0.lock().push(alert.exchange_name);
    }
}

#[tokio::test(start_paused = true)]
async fn subscribers_receive_alerts_until_unsubscribed() {
    let venue = MockExchange::quoting("ex-1");
    venue.set_connected(false);
    let mesh = mesh_with(&[venue.clone()], |c| c.monitor.alert_cooldown_secs = 1);
    let monitor = mesh.monitor();

    let (channel_id, mut rx) = monitor.subscribe();
    let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
    let handler_id = monitor.subscribe_handler(recorder.clone());

    monitor.run_cycle().await;
    let alert = assert_ok!(rx.try_recv());
    assert_eq!(alert.level, AlertLevel::Critical);
    for _ in 0..10 {
        if !recorder.0.lock().is_empty() {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(recorder.0.lock().as_slice(), ["ex-1".to_string()]);

    assert!(monitor.unsubscribe(channel_id));
    assert!(monitor.unsubscribe(handler_id));
    tokio::time::advance(Duration::from_secs(2)).await;
    monitor.run_cycle().await;
    assert_eq!(monitor.get_alerts(&AlertFilter::default()).len(), 2);
    assert_eq!(recorder.0.lock().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn recovered_exchange_returns_to_healthy() {
    let venue = MockExchange::quoting("ex-1");
    venue.set_connected(false);
    let mesh = mesh_with(&[venue.clone()], |_| {});

    mesh.monitor().run_cycle().await;
    assert_eq!(mesh.monitor().get_exchange_status("ex-1").await, HealthStatus::Offline);

    venue.set_connected(true);
    mesh.monitor().run_cycle().await;
    assert_eq!(mesh.monitor().get_exchange_status("ex-1").await, HealthStatus::Healthy);
    assert!(mesh.executor().metrics("ex-1").last_check.is_some());
}
