//! Health-aware exchange selection with sticky routing and switch damping

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use crate::{
    config::{SelectorConfig, SCORE_RESPONSE_TIME_CEILING},
    exchange::{ExchangeEntry, ExchangeRegistry},
    health::HealthMonitor,
    network::MetricsStore,
    types::{ExchangeMetrics, HealthStatus},
};

const LATENCY_WEIGHT: f64 = 0.4;
const SUCCESS_WEIGHT: f64 = 0.4;
const PRIORITY_WEIGHT: f64 = 0.2;

/// Weighted score in `[0, 1]` for priorities up to 100.
pub fn score_exchange(metrics: &ExchangeMetrics, priority: u32) -> f64 {
    let latency = (1.0
        - metrics.avg_response_time.as_secs_f64() / SCORE_RESPONSE_TIME_CEILING.as_secs_f64())
    .clamp(0.0, 1.0);
    LATENCY_WEIGHT * latency + SUCCESS_WEIGHT * metrics.success_rate + PRIORITY_WEIGHT * priority as f64 / 100.0
}

pub struct ExchangeSelector {
    registry: Arc<ExchangeRegistry>,
    metrics: Arc<MetricsStore>,
    monitor: Arc<HealthMonitor>,
    priorities: RwLock<HashMap<String, u32>>,
    /// Last time each exchange became a switch target.
    switches: Mutex<HashMap<String, Instant>>,
    switch_cooldown: Duration,
    default_priority: u32,
    auto_switch: AtomicBool,
    load_balancing: AtomicBool,
}

impl ExchangeSelector {
    pub fn new(
        registry: Arc<ExchangeRegistry>,
        metrics: Arc<MetricsStore>,
        monitor: Arc<HealthMonitor>,
        config: &SelectorConfig,
    ) -> Self {
        Self {
            registry,
            metrics,
            monitor,
            priorities: RwLock::new(HashMap::new()),
            switches: Mutex::new(HashMap::new()),
            switch_cooldown: config.switch_cooldown(),
            default_priority: config.default_priority,
            auto_switch: AtomicBool::new(config.auto_switch),
            load_balancing: AtomicBool::new(config.load_balancing),
        }
    }

    /// Picks the exchange to route `symbol` to.
    ///
    /// A selectable `current` exchange is always kept. Otherwise the highest scoring healthy
    /// or degraded exchange is chosen, unless it became a switch target less than the switch
    /// cooldown ago, in which case `current` is kept. Returns `None` when nothing is selectable.
    pub async fn select_best(&self, symbol: &str, current: Option<&str>) -> Option<String> {
        let statuses = self.monitor.get_health_status().await;
        let candidates: Vec<&Arc<ExchangeEntry>> = self
            .registry
            .enabled()
            .filter(|entry| entry.supports(symbol))
            .filter(|entry| {
                statuses
                    .get(&entry.name)
                    .copied()
                    .unwrap_or_default()
                    .is_selectable()
            })
            .collect();

        if candidates.is_empty() {
            debug!("No selectable exchange for {}", symbol);
            return None;
        }

        if let Some(current) = current {
            if candidates.iter().any(|entry| entry.name == current) {
                return Some(current.to_string());
            }
            if !self.auto_switch() {
                debug!("Auto-switch disabled, keeping {} for {}", current, symbol);
                return Some(current.to_string());
            }
        }

        let scored: Vec<(String, f64)> = candidates
            .iter()
            .map(|entry| (entry.name.clone(), self.score(&entry.name)))
            .collect();
        let chosen = if current.is_none() && self.load_balancing() {
            weighted_pick(&scored, rand::random::<f64>())
        } else {
            best_scored(&scored)
        }?;

        let Some(current) = current else {
            debug!("Selected {} for {}", chosen, symbol);
            return Some(chosen);
        };

        let now = Instant::now();
        let mut switches = self.switches.lock();
        if let Some(last) = switches.get(&chosen) {
            let age = now.saturating_duration_since(*last);
            if age < self.switch_cooldown {
                warn!(
                    "⏸️  Switch {} -> {} for {} damped ({:?} since last switch to it)",
                    current, chosen, symbol, age
                );
                return Some(current.to_string());
            }
        }
        switches.insert(chosen.clone(), now);
        info!("🔀 Switching {} from {} to {}", symbol, current, chosen);
        Some(chosen)
    }

    pub fn score(&self, exchange: &str) -> f64 {
        score_exchange(&self.metrics.snapshot(exchange), self.priority(exchange))
    }

    /// Scores of every selectable exchange for `symbol`, in registry order.
    pub async fn scores(&self, symbol: &str) -> Vec<(String, f64)> {
        let statuses = self.monitor.get_health_status().await;
        self.registry
            .enabled()
            .filter(|entry| entry.supports(symbol))
            .filter(|entry| statuses.get(&entry.name).copied().unwrap_or_default().is_selectable())
            .map(|entry| (entry.name.clone(), self.score(&entry.name)))
            .collect()
    }

    /// Enabled exchanges supporting `symbol` that are not known to be down.
    /// Exchanges that have not been probed yet are included.
    pub async fn routable_exchanges(&self, symbol: &str) -> Vec<String> {
        let statuses = self.monitor.get_health_status().await;
        self.registry
            .enabled()
            .filter(|entry| entry.supports(symbol))
            .filter(|entry| {
                !matches!(
                    statuses.get(&entry.name).copied().unwrap_or_default(),
                    HealthStatus::Unhealthy | HealthStatus::Offline
                )
            })
            .map(|entry| entry.name.clone())
            .collect()
    }

    pub fn priority(&self, exchange: &str) -> u32 {
        self.priorities
            .read()
            .get(exchange)
            .copied()
            .unwrap_or(self.default_priority)
    }

    pub fn set_priority(&self, exchange: &str, priority: u32) {
        info!("Priority for {} set to {}", exchange, priority);
        self.priorities.write().insert(exchange.to_string(), priority);
    }

    pub fn auto_switch(&self) -> bool {
        self.auto_switch.load(Ordering::Relaxed)
    }

    pub fn set_auto_switch(&self, enabled: bool) {
        self.auto_switch.store(enabled, Ordering::Relaxed);
    }

    pub fn load_balancing(&self) -> bool {
        self.load_balancing.load(Ordering::Relaxed)
    }

    pub fn set_load_balancing(&self, enabled: bool) {
        self.load_balancing.store(enabled, Ordering::Relaxed);
    }

    pub fn last_switch_to(&self, exchange: &str) -> Option<Instant> {
        self.switches.lock().get(exchange).copied()
    }

    /// Marks `exchange` as a fresh switch target, e.g. after a manual failover.
    pub fn record_switch(&self, exchange: &str) {
        self.switches.lock().insert(exchange.to_string(), Instant::now());
    }
}

/// Highest score wins; the first of equal scores is kept.
fn best_scored(scored: &[(String, f64)]) -> Option<String> {
    let mut best: Option<&(String, f64)> = None;
    for candidate in scored {
        if best.is_none_or(|b| candidate.1 > b.1) {
            best = Some(candidate);
        }
    }
    best.map(|(name, _)| name.clone())
}

/// Roulette-wheel pick proportional to score. `roll` is uniform in `[0, 1)`.
fn weighted_pick(scored: &[(String, f64)], roll: f64) -> Option<String> {
    let total: f64 = scored.iter().map(|(_, s)| s.max(0.0)).sum();
    if total <= 0.0 {
        return scored.first().map(|(name, _)| name.clone());
    }
    let mut target = roll * total;
    for (name, score) in scored {
        target -= score.max(0.0);
        if target < 0.0 {
            return Some(name.clone());
        }
    }
    scored.last().map(|(name, _)| name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(entries: &[(&str, f64)]) -> Vec<(String, f64)> {
        entries.iter().map(|(n, s)| (n.to_string(), *s)).collect()
    }

    #[test]
    fn score_weights_latency_success_and_priority() {
        let mut metrics = ExchangeMetrics::new("okx");
        metrics.avg_response_time = Duration::from_secs(5);
        metrics.success_rate = 0.5;
        let score = score_exchange(&metrics, 50);
        assert!((score - (0.4 * 0.5 + 0.4 * 0.5 + 0.2 * 0.5)).abs() < 1e-9);

        metrics.avg_response_time = Duration::from_secs(30);
        let slow = score_exchange(&metrics, 50);
        assert!((slow - (0.4 * 0.5 + 0.2 * 0.5)).abs() < 1e-9);
    }

    #[test]
    fn ties_keep_registry_order() {
        let s = scored(&[("a", 0.7), ("b", 0.9), ("c", 0.9)]);
        assert_eq!(best_scored(&s).as_deref(), Some("b"));
        assert_eq!(best_scored(&[]), None);
    }

    #[test]
    fn weighted_pick_follows_roll() {
        let s = scored(&[("a", 1.0), ("b", 3.0)]);
        assert_eq!(weighted_pick(&s, 0.0).as_deref(), Some("a"));
        assert_eq!(weighted_pick(&s, 0.24).as_deref(), Some("a"));
        assert_eq!(weighted_pick(&s, 0.26).as_deref(), Some("b"));
        assert_eq!(weighted_pick(&s, 0.999).as_deref(), Some("b"));

        let zero = scored(&[("x", 0.0), ("y", 0.0)]);
        assert_eq!(weighted_pick(&zero, 0.5).as_deref(), Some("x"));
    }
}
