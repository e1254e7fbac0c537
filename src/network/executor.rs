//! Rate-limited, retrying request executor

use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, warn};
use super::{retry_with_backoff, LimiterSet, MetricsStore, RateLimitRule, RetryPolicy};
use crate::{
    errors::{ErrorKind, ExchangeError, MeshError, MeshResult},
    exchange::{ExchangeAdapter, ExchangeOperation, ExchangeRegistry, ExchangeReply},
    types::{ExchangeMetrics, RequestOutcome},
};

pub struct RequestExecutor {
    registry: Arc<ExchangeRegistry>,
    metrics: Arc<MetricsStore>,
    policy: RwLock<RetryPolicy>,
    limiters: RwLock<HashMap<String, Arc<LimiterSet>>>,
}

impl RequestExecutor {
    pub fn new(registry: Arc<ExchangeRegistry>, metrics: Arc<MetricsStore>, policy: RetryPolicy) -> Self {
        Self {
            registry,
            metrics,
            policy: RwLock::new(policy),
            limiters: RwLock::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<ExchangeRegistry> {
        &self.registry
    }

    pub fn metrics_store(&self) -> &Arc<MetricsStore> {
        &self.metrics
    }

    /// Replaces the limiters guarding `exchange`. An empty rule list removes admission control.
    pub fn set_rate_limits(&self, exchange: &str, rules: &[RateLimitRule]) -> MeshResult<()> {
        if self.registry.entry(exchange).is_none() {
            return Err(MeshError::UnknownExchange(exchange.to_string()));
        }
        for rule in rules {
            rule.validate(exchange)?;
        }
        let mut limiters = self.limiters.write();
        if rules.is_empty() {
            limiters.remove(exchange);
        } else {
            limiters.insert(exchange.to_string(), Arc::new(LimiterSet::new(rules)));
        }
        Ok(())
    }

    pub fn rate_limits(&self, exchange: &str) -> Vec<RateLimitRule> {
        self.limiters
            .read()
            .get(exchange)
            .map(|set| set.rules().to_vec())
            .unwrap_or_default()
    }

    pub fn set_retry_policy(&self, policy: RetryPolicy) {
        *self.policy.write() = policy;
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.policy.read().clone()
    }

    pub fn metrics(&self, exchange: &str) -> ExchangeMetrics {
        self.metrics.snapshot(exchange)
    }

    pub fn all_metrics(&self) -> Vec<ExchangeMetrics> {
        self.metrics.all()
    }

    pub fn reset_metrics(&self, exchange: &str) {
        self.metrics.reset(exchange);
    }

    /// Admission check for one attempt. Never waits for capacity.
    fn admit(&self, exchange: &str) -> Result<(), ExchangeError> {
        let set = self.limiters.read().get(exchange).cloned();
        let Some(set) = set else {
            return Ok(());
        };
        set.admit().map_err(|(rule, retry_after)| {
            ExchangeError::RateLimited(format!(
                "{} admission denied by {} (capacity back in {:?})",
                exchange, rule, retry_after
            ))
        })
    }

    /// Runs `operation` against `exchange` with admission control and retries, and records
    /// the call in the exchange's metrics.
    pub async fn execute<T, F, Fut>(&self, exchange: &str, operation: F) -> RequestOutcome<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ExchangeError>>,
    {
        let policy = self.retry_policy();
        let started = Instant::now();
        let operation = &operation;

        let attempt = move || {
            let executor = self;
            async move {
                executor.admit(exchange)?;
                operation().await
            }
        };
        let report = retry_with_backoff(attempt, &policy, exchange).await;
        let latency = started.elapsed();

        let success = report.result.is_ok();
        self.metrics.record(exchange, success, report.last_attempt_latency);

        match report.result {
            Ok(data) => {
                debug!(
                    exchange,
                    latency_ms = latency.as_millis() as u64,
                    retries = report.retry_count,
                    "Request succeeded"
                );
                RequestOutcome::succeeded(data, latency, report.retry_count)
            }
            Err(e) => {
                let kind = report.error_kind.unwrap_or(ErrorKind::Unknown);
                warn!(
                    exchange,
                    kind = %kind,
                    retries = report.retry_count,
                    "Request failed: {}", e
                );
                RequestOutcome::failed(e.to_string(), kind, latency, report.retry_count)
            }
        }
    }

    /// Resolves the exchange's adapter and runs a named operation through [`execute`](Self::execute).
    pub async fn execute_operation(
        &self,
        exchange: &str,
        operation: &ExchangeOperation,
    ) -> RequestOutcome<ExchangeReply> {
        let Some(adapter) = self.registry.adapter(exchange) else {
            return RequestOutcome::failed(
                format!("unknown exchange '{}'", exchange),
                ErrorKind::Validation,
                Default::default(),
                0,
            );
        };
        let adapter: &dyn ExchangeAdapter = adapter.as_ref();
        self.execute(exchange, move || operation.dispatch(adapter)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{SimulatedExchange, SimulationConfig};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn executor_with(names: &[&str], policy: RetryPolicy) -> RequestExecutor {
        let mut registry = ExchangeRegistry::new();
        for name in names {
            let venue = SimulatedExchange::new(
                name,
                SimulationConfig { base_latency_ms: 0, latency_jitter_ms: 0, ..Default::default() },
            );
            registry.register(name, Arc::new(venue), vec![], true).unwrap();
        }
        RequestExecutor::new(Arc::new(registry), Arc::new(MetricsStore::new()), policy)
    }

    #[tokio::test(start_paused = true)]
    async fn admission_denial_counts_as_rate_limited_attempt() {
        let executor = executor_with(&["binance"], RetryPolicy::no_retry());
        executor
            .set_rate_limits("binance", &[RateLimitRule::token_bucket(1, 60.0)])
            .unwrap();

        let first: RequestOutcome<u32> = executor.execute("binance", || async { Ok(1) }).await;
        assert!(first.success);

        let calls = AtomicU32::new(0);
        let second: RequestOutcome<u32> = executor
            .execute("binance", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(2) }
            })
            .await;
        assert!(!second.success);
        assert_eq!(second.error_kind, Some(ErrorKind::RateLimit));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let metrics = executor.metrics("binance");
        assert_eq!(metrics.total_requests, 2);
        assert_eq!(metrics.error_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_attempts_recover_once_capacity_returns() {
        let policy = RetryPolicy {
            max_retries: 3,
            strategy: crate::network::BackoffStrategy::Fixed,
            base_delay_ms: 1_000,
            ..Default::default()
        };
        let executor = executor_with(&["kraken"], policy);
        executor
            .set_rate_limits("kraken", &[RateLimitRule::token_bucket(1, 1.0)])
            .unwrap();

        let _: RequestOutcome<()> = executor.execute("kraken", || async { Ok(()) }).await;
        let outcome: RequestOutcome<()> = executor.execute("kraken", || async { Ok(()) }).await;
        assert!(outcome.success);
        assert_eq!(outcome.retry_count, 1);
    }

    #[tokio::test]
    async fn unknown_exchange_is_a_validation_failure() {
        let executor = executor_with(&["okx"], RetryPolicy::default());
        let outcome = executor
            .execute_operation("nowhere", &ExchangeOperation::ServerTime)
            .await;
        assert_eq!(outcome.error_kind, Some(ErrorKind::Validation));
        assert!(executor.set_rate_limits("nowhere", &[]).is_err());
    }

    #[tokio::test]
    async fn named_operation_reaches_adapter() {
        let executor = executor_with(&["okx"], RetryPolicy::default());
        let outcome = executor
            .execute_operation("okx", &ExchangeOperation::ticker("BTCUSDT"))
            .await;
        assert!(outcome.success);
        assert!(outcome.data.unwrap().as_ticker().is_some());
        assert!(outcome.latency < Duration::from_secs(1));
    }
}
