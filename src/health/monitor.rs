//! Periodic exchange health probing
//!
//! Every cycle probes all enabled exchanges concurrently: a connectivity check first, then a
//! lightweight server-time call through the [`RequestExecutor`] so that probes share the same
//! admission control, retry policy and metrics as regular traffic. Each probe runs on its own
//! task under its own timeout; a hung or panicking exchange only affects its own report.

use chrono::Utc;
use parking_lot::RwLock as SyncRwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use super::{derive_status, AlertBus, AlertHandler, AlertLog, SubscriptionId};
use crate::{
    config::{HealthThresholds, MonitorConfig, HIGH_ERROR_RATE_MIN_REQUESTS, MAX_ALERT_LOG_SIZE},
    errors::{MeshError, MeshResult},
    exchange::{ExchangeOperation, ExchangeReply},
    network::RequestExecutor,
    types::{Alert, AlertFilter, AlertLevel, ExchangeMetrics, HealthReport, HealthStatus},
};

struct ProbeResult {
    connected: bool,
    response_time: Option<Duration>,
    issues: Vec<String>,
}

struct MonitorTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct HealthMonitor {
    executor: Arc<RequestExecutor>,
    config: MonitorConfig,
    thresholds: SyncRwLock<HealthThresholds>,
    reports: RwLock<HashMap<String, HealthReport>>,
    alerts: AlertLog,
    bus: AlertBus,
    task: Mutex<Option<MonitorTask>>,
    cycles: AtomicU64,
}

impl HealthMonitor {
    pub fn new(executor: Arc<RequestExecutor>, config: MonitorConfig, thresholds: HealthThresholds) -> Self {
        Self {
            alerts: AlertLog::new(config.alert_cooldown(), MAX_ALERT_LOG_SIZE),
            executor,
            config,
            thresholds: SyncRwLock::new(thresholds),
            reports: RwLock::new(HashMap::new()),
            bus: AlertBus::new(),
            task: Mutex::new(None),
            cycles: AtomicU64::new(0),
        }
    }

    /// Spawns the periodic probe loop. The first cycle runs immediately.
    pub async fn start(self: &Arc<Self>) -> MeshResult<()> {
        let mut task = self.task.lock().await;
        if task.is_some() {
            return Err(MeshError::AlreadyRunning);
        }

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let monitor = Arc::clone(self);
        let interval_period = self.config.interval();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(interval_period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        tokio::select! {
                            reports = monitor.run_cycle() => monitor.log_cycle(&reports),
                            _ = shutdown_rx.changed() => break,
                        }
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
            debug!("Health monitor loop exited");
        });

        info!("🩺 Health monitor started (every {:?}, probe timeout {:?})", interval_period, self.config.probe_timeout());
        *task = Some(MonitorTask { shutdown, handle });
        Ok(())
    }

    /// Signals the loop and waits until it has exited. A no-op when not running.
    pub async fn stop(&self) {
        let Some(task) = self.task.lock().await.take() else {
            return;
        };
        let _ = task.shutdown.send(true);
        if let Err(e) = task.handle.await {
            error!("Health monitor task ended abnormally: {}", e);
        }
        info!("🛑 Health monitor stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.task.lock().await.is_some()
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Probes every enabled exchange once and returns a report per exchange, in registry order.
    pub async fn run_cycle(self: &Arc<Self>) -> Vec<HealthReport> {
        let names = self.executor.registry().enabled_names();
        let mut probes = JoinSet::new();
        for (index, name) in names.iter().enumerate() {
            let monitor = Arc::clone(self);
            let name = name.clone();
            probes.spawn(async move { (index, monitor.probe_with_timeout(&name).await) });
        }

        let mut results: Vec<Option<ProbeResult>> = names.iter().map(|_| None).collect();
        while let Some(joined) = probes.join_next().await {
            match joined {
                Ok((index, probe)) => results[index] = Some(probe),
                Err(e) => error!("Health probe task failed: {}", e),
            }
        }

        let mut reports = Vec::with_capacity(names.len());
        for (name, probe) in names.iter().zip(results) {
            let probe = probe.unwrap_or_else(|| ProbeResult {
                connected: self.executor.metrics(name).connection_status,
                response_time: None,
                issues: vec!["health probe aborted unexpectedly".to_string()],
            });
            reports.push(self.finish_probe(name, probe).await);
        }

        self.cycles.fetch_add(1, Ordering::Relaxed);
        reports
    }

    async fn probe_with_timeout(&self, exchange: &str) -> ProbeResult {
        let timeout = self.config.probe_timeout();
        match tokio::time::timeout(timeout, self.probe(exchange)).await {
            Ok(probe) => probe,
            Err(_) => {
                warn!("⏱️  Health probe for {} timed out after {:?}", exchange, timeout);
                ProbeResult {
                    connected: false,
                    response_time: None,
                    issues: vec![format!("health probe timed out after {:?}", timeout)],
                }
            }
        }
    }

    async fn probe(&self, exchange: &str) -> ProbeResult {
        let mut issues = Vec::new();

        let connected = match self
            .executor
            .execute_operation(exchange, &ExchangeOperation::Connectivity)
            .await
            .into_result()
        {
            Ok(ExchangeReply::Connectivity(up)) => up,
            Ok(_) => true,
            Err((kind, e)) => {
                issues.push(format!("connectivity check failed [{}]: {}", kind, e));
                false
            }
        };
        if !connected {
            if issues.is_empty() {
                issues.push("exchange reports it is not reachable".to_string());
            }
            return ProbeResult { connected, response_time: None, issues };
        }

        let api = self
            .executor
            .execute_operation(exchange, &ExchangeOperation::ServerTime)
            .await;
        if !api.success {
            issues.push(format!(
                "api probe failed [{}]: {}",
                api.error_kind.map(|k| k.as_str()).unwrap_or("UNKNOWN"),
                api.error.as_deref().unwrap_or("unknown error")
            ));
        }

        ProbeResult {
            connected,
            response_time: Some(api.latency),
            issues,
        }
    }

    async fn finish_probe(&self, exchange: &str, probe: ProbeResult) -> HealthReport {
        let metrics = self.executor.metrics_store().update(exchange, |m| {
            m.last_check = Some(Utc::now());
            m.connection_status = probe.connected;
            m.clone()
        });
        let thresholds = self.thresholds.read().clone();
        let status = derive_status(&metrics, &thresholds, probe.response_time, &probe.issues);

        let report = HealthReport {
            exchange_name: exchange.to_string(),
            status,
            response_time: probe.response_time,
            issues: probe.issues,
            metrics,
            checked_at: Utc::now(),
        };

        let previous = self
            .reports
            .write()
            .await
            .insert(exchange.to_string(), report.clone())
            .map(|r| r.status);
        if previous.is_some_and(|p| p != status) {
            info!("🔄 {} health changed: {} -> {}", exchange, previous.unwrap_or_default(), status);
        }

        self.generate_alerts(exchange, status, &report.metrics, &report.issues);
        report
    }

    /// Builds alert candidates for one exchange and records those that pass the cooldown gate.
    /// Returns the alerts that were recorded and published.
    pub fn generate_alerts(
        &self,
        exchange: &str,
        status: HealthStatus,
        metrics: &ExchangeMetrics,
        issues: &[String],
    ) -> Vec<Alert> {
        let thresholds = self.thresholds.read().clone();
        let mut candidates = Vec::new();

        match status {
            HealthStatus::Offline => candidates.push(Alert::new(
                exchange,
                AlertLevel::Critical,
                "Exchange offline".to_string(),
                format!("{} is unreachable: {}", exchange, issues.join("; ")),
            )),
            HealthStatus::Unhealthy => candidates.push(Alert::new(
                exchange,
                AlertLevel::Error,
                "Exchange unhealthy".to_string(),
                format!(
                    "{} success rate {:.1}% with {} errors over {} requests",
                    exchange,
                    metrics.success_rate * 100.0,
                    metrics.error_count,
                    metrics.total_requests
                ),
            )),
            HealthStatus::Degraded => candidates.push(Alert::new(
                exchange,
                AlertLevel::Warning,
                "Exchange degraded".to_string(),
                if issues.is_empty() {
                    format!("{} responding slowly (avg {:?})", exchange, metrics.avg_response_time)
                } else {
                    format!("{}: {}", exchange, issues.join("; "))
                },
            )),
            HealthStatus::Healthy | HealthStatus::Unknown => {}
        }

        if metrics.success_rate < thresholds.success_rate_threshold
            && metrics.total_requests > HIGH_ERROR_RATE_MIN_REQUESTS
        {
            candidates.push(Alert::new(
                exchange,
                AlertLevel::Warning,
                "High error rate".to_string(),
                format!(
                    "{} success rate {:.1}% is below {:.1}%",
                    exchange,
                    metrics.success_rate * 100.0,
                    thresholds.success_rate_threshold * 100.0
                ),
            ));
        }

        let mut emitted = Vec::new();
        for candidate in candidates {
            let Some(alert) = self.alerts.try_record(candidate) else {
                continue;
            };
            match alert.level {
                AlertLevel::Critical | AlertLevel::Error => {
                    error!("🚨 [{}] {}: {}", alert.level, alert.title, alert.message)
                }
                AlertLevel::Warning => warn!("⚠️  [{}] {}: {}", alert.level, alert.title, alert.message),
                AlertLevel::Info => info!("ℹ️  {}: {}", alert.title, alert.message),
            }
            self.bus.publish(&alert);
            emitted.push(alert);
        }
        emitted
    }

    fn log_cycle(&self, reports: &[HealthReport]) {
        let healthy = reports.iter().filter(|r| r.status == HealthStatus::Healthy).count();
        info!("🩺 Health cycle: {}/{} exchanges healthy", healthy, reports.len());
        for report in reports.iter().filter(|r| r.status != HealthStatus::Healthy) {
            warn!("   {} is {} ({})", report.exchange_name, report.status, report.issues.join("; "));
        }
    }

    /// Latest status of every registered exchange; `Unknown` until the first probe completes.
    pub async fn get_health_status(&self) -> HashMap<String, HealthStatus> {
        let reports = self.reports.read().await;
        self.executor
            .registry()
            .names()
            .into_iter()
            .map(|name| {
                let status = reports.get(&name).map(|r| r.status).unwrap_or_default();
                (name, status)
            })
            .collect()
    }

    pub async fn get_exchange_status(&self, exchange: &str) -> HealthStatus {
        self.reports
            .read()
            .await
            .get(exchange)
            .map(|r| r.status)
            .unwrap_or_default()
    }

    /// Latest report per probed exchange, in registry order.
    pub async fn get_health_reports(&self) -> Vec<HealthReport> {
        let reports = self.reports.read().await;
        self.executor
            .registry()
            .names()
            .iter()
            .filter_map(|name| reports.get(name).cloned())
            .collect()
    }

    pub fn get_alerts(&self, filter: &AlertFilter) -> Vec<Alert> {
        self.alerts.list(filter)
    }

    pub fn resolve_alert(&self, id: &str) -> bool {
        let resolved = self.alerts.resolve(id);
        if resolved {
            info!("✅ Alert {} resolved", id);
        }
        resolved
    }

    pub fn thresholds(&self) -> HealthThresholds {
        self.thresholds.read().clone()
    }

    /// Takes effect from the next cycle.
    pub fn set_thresholds(&self, thresholds: HealthThresholds) {
        info!("Health thresholds updated: {:?}", thresholds);
        *self.thresholds.write() = thresholds;
    }

    pub fn set_alert_cooldown(&self, cooldown: Duration) {
        self.alerts.set_cooldown(cooldown);
    }

    pub fn alert_bus(&self) -> &AlertBus {
        &self.bus
    }

    pub fn subscribe(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<Alert>) {
        self.bus.subscribe_channel()
    }

    pub fn subscribe_handler(&self, handler: Arc<dyn AlertHandler>) -> SubscriptionId {
        self.bus.subscribe_handler(handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }
}
