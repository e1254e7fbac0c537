//! Shared per-exchange request metrics

use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;
use crate::types::ExchangeMetrics;

/// Written by the executor on every call and by the health monitor on every probe.
#[derive(Default)]
pub struct MetricsStore {
    inner: RwLock<HashMap<String, ExchangeMetrics>>,
}

impl MetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, exchange: &str, success: bool, latency: Duration) {
        self.update(exchange, |metrics| metrics.record(success, latency));
    }

    pub fn update<R>(&self, exchange: &str, f: impl FnOnce(&mut ExchangeMetrics) -> R) -> R {
        let mut inner = self.inner.write();
        let metrics = inner
            .entry(exchange.to_string())
            .or_insert_with(|| ExchangeMetrics::new(exchange));
        f(metrics)
    }

    pub fn snapshot(&self, exchange: &str) -> ExchangeMetrics {
        self.inner
            .read()
            .get(exchange)
            .cloned()
            .unwrap_or_else(|| ExchangeMetrics::new(exchange))
    }

    pub fn all(&self) -> Vec<ExchangeMetrics> {
        let mut all: Vec<_> = self.inner.read().values().cloned().collect();
        all.sort_by(|a, b| a.exchange_name.cmp(&b.exchange_name));
        all
    }

    pub fn reset(&self, exchange: &str) {
        self.update(exchange, |metrics| metrics.reset());
    }
}
