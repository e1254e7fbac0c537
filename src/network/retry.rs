//! Retry policy and backoff loop

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::warn;
use crate::errors::{classify, ErrorKind, ExchangeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    Immediate,
    Fixed,
    Linear,
    Exponential,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub strategy: BackoffStrategy,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub retryable_kinds: Vec<ErrorKind>,
    /// Spreads each delay by up to ±10 %.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            strategy: BackoffStrategy::Exponential,
            base_delay_ms: 100,
            max_delay_ms: 5000,
            retryable_kinds: ErrorKind::default_retryable(),
            jitter: false,
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    pub fn should_retry(&self, attempt: u32, kind: ErrorKind) -> bool {
        attempt < self.max_retries && self.retryable_kinds.contains(&kind)
    }

    /// Delay before retry number `retry_index` (zero-based).
    pub fn delay_for(&self, retry_index: u32) -> Duration {
        let base = self.base_delay_ms;
        let ms = match self.strategy {
            BackoffStrategy::Immediate => 0,
            BackoffStrategy::Fixed => base,
            BackoffStrategy::Linear => base
                .saturating_mul(retry_index as u64 + 1)
                .min(self.max_delay_ms),
            BackoffStrategy::Exponential => {
                let factor = 1u64.checked_shl(retry_index).unwrap_or(u64::MAX);
                base.saturating_mul(factor).min(self.max_delay_ms)
            }
        };

        if self.jitter && ms > 0 {
            let jitter = ms as f64 * 0.2 * (rand::random::<f64>() - 0.5);
            Duration::from_millis((ms as f64 + jitter).max(0.0) as u64)
        } else {
            Duration::from_millis(ms)
        }
    }
}

/// What a retry loop ended with.
#[derive(Debug)]
pub struct RetryReport<T> {
    pub result: Result<T, ExchangeError>,
    pub error_kind: Option<ErrorKind>,
    pub retry_count: u32,
    pub last_attempt_latency: Duration,
}

/// Runs `operation` until it succeeds, fails with a non-retryable kind, or the policy's
/// retries are spent. Attempts run strictly one after another.
pub async fn retry_with_backoff<F, Fut, T>(
    mut operation: F,
    policy: &RetryPolicy,
    context: &str,
) -> RetryReport<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ExchangeError>>,
{
    let mut attempt = 0;

    loop {
        let started = Instant::now();
        let result = operation().await;
        let latency = started.elapsed();

        match result {
            Ok(value) => {
                return RetryReport {
                    result: Ok(value),
                    error_kind: None,
                    retry_count: attempt,
                    last_attempt_latency: latency,
                };
            }
            Err(e) => {
                let kind = classify(&e);
                if !policy.should_retry(attempt, kind) {
                    return RetryReport {
                        result: Err(e),
                        error_kind: Some(kind),
                        retry_count: attempt,
                        last_attempt_latency: latency,
                    };
                }

                let delay = policy.delay_for(attempt);
                warn!(
                    "Attempt {}/{} failed for {}: {} [{}]. Retrying in {:?}...",
                    attempt + 1,
                    policy.max_retries + 1,
                    context,
                    e,
                    kind,
                    delay
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
            }
        }
    }
}
