//! Health monitoring types

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Offline,
    #[default]
    Unknown,
}

impl HealthStatus {
    /// Statuses the selector is allowed to route to.
    pub fn is_selectable(&self) -> bool {
        matches!(self, HealthStatus::Healthy | HealthStatus::Degraded)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "HEALTHY",
            HealthStatus::Degraded => "DEGRADED",
            HealthStatus::Unhealthy => "UNHEALTHY",
            HealthStatus::Offline => "OFFLINE",
            HealthStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Running request statistics for one exchange.
#[derive(Debug, Clone, Serialize)]
pub struct ExchangeMetrics {
    pub exchange_name: String,
    pub avg_response_time: Duration,
    pub success_rate: f64,
    pub error_count: u64,
    pub total_requests: u64,
    pub last_check: Option<DateTime<Utc>>,
    pub connection_status: bool,
}

impl ExchangeMetrics {
    pub fn new(exchange_name: &str) -> Self {
        Self {
            exchange_name: exchange_name.to_string(),
            avg_response_time: Duration::ZERO,
            success_rate: 1.0,
            error_count: 0,
            total_requests: 0,
            last_check: None,
            connection_status: true,
        }
    }

    /// Folds one finished call into the running averages.
    pub fn record(&mut self, success: bool, latency: Duration) {
        self.total_requests += 1;
        if !success {
            self.error_count += 1;
        }

        let n = self.total_requests as f64;
        let avg = self.avg_response_time.as_secs_f64();
        self.avg_response_time =
            Duration::from_secs_f64(avg + (latency.as_secs_f64() - avg) / n);

        self.success_rate = ((self.total_requests - self.error_count) as f64 / n).clamp(0.0, 1.0);
    }

    pub fn reset(&mut self) {
        *self = Self {
            last_check: self.last_check,
            connection_status: self.connection_status,
            ..Self::new(&self.exchange_name)
        };
    }
}

/// Outcome of probing one exchange during a health cycle.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub exchange_name: String,
    pub status: HealthStatus,
    pub response_time: Option<Duration>,
    pub issues: Vec<String>,
    pub metrics: ExchangeMetrics,
    pub checked_at: DateTime<Utc>,
}
