//! Health status derivation

use std::time::Duration;
use crate::{
    config::HealthThresholds,
    types::{ExchangeMetrics, HealthStatus},
};

/// Derives an exchange's status from its metrics and the issues found this cycle.
///
/// `response_time` is the latency of this cycle's API probe; when absent the running
/// average is used instead.
pub fn derive_status(
    metrics: &ExchangeMetrics,
    thresholds: &HealthThresholds,
    response_time: Option<Duration>,
    issues: &[String],
) -> HealthStatus {
    if !metrics.connection_status {
        return HealthStatus::Offline;
    }
    if metrics.error_count > thresholds.max_error_count
        || metrics.success_rate < thresholds.success_rate_threshold
    {
        return HealthStatus::Unhealthy;
    }
    let response_time = response_time.unwrap_or(metrics.avg_response_time);
    if response_time > thresholds.response_time_threshold() || !issues.is_empty() {
        return HealthStatus::Degraded;
    }
    HealthStatus::Healthy
}
