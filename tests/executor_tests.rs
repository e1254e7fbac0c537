//! Admission control, retry and metrics behaviour of the request executor.

mod support;

use exchange_mesh::{
    exchange::ExchangeOperation,
    network::{Admission, BackoffStrategy, RateLimitRule, RetryPolicy, TokenBucket},
    ErrorKind, ExchangeError, RequestOutcome,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use support::{mesh_with, MockExchange};
use tokio_test::assert_ok;

fn retrying(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        strategy: BackoffStrategy::Immediate,
        ..Default::default()
    }
}

#[tokio::test(start_paused = true)]
async fn token_bucket_refills_after_window() {
    let bucket = TokenBucket::new(5, Duration::from_secs(1));
    for _ in 0..5 {
        assert_eq!(bucket.acquire(1), Admission::Granted);
    }
    assert!(!bucket.acquire(1).is_granted());

    tokio::time::advance(Duration::from_secs(1)).await;
    assert!(bucket.acquire(1).is_granted());
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_until_success() {
    let venue = MockExchange::quoting("binance");
    let mesh = mesh_with(&[venue.clone()], |c| c.retry = retrying(3));

    let calls = AtomicU32::new(0);
    let outcome: RequestOutcome<&str> = mesh
        .executor()
        .execute("binance", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ExchangeError::Connection("reset by peer".to_string()))
                } else {
                    Ok("pong")
                }
            }
        })
        .await;

    assert!(outcome.success);
    assert_eq!(outcome.retry_count, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(assert_ok!(outcome.into_result()), "pong");

    let metrics = mesh.executor().metrics("binance");
    assert_eq!(metrics.total_requests, 1);
    assert_eq!(metrics.error_count, 0);
}

#[tokio::test(start_paused = true)]
async fn auth_failures_are_never_retried() {
    let venue = MockExchange::quoting("kraken");
    venue.fail_always(Some(ExchangeError::from_status(401, "bad signature")));
    let mesh = mesh_with(&[venue.clone()], |c| c.retry = retrying(5));

    let outcome = mesh
        .executor()
        .execute_operation("kraken", &ExchangeOperation::ticker("BTCUSDT"))
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.error_kind, Some(ErrorKind::Auth));
    assert_eq!(outcome.retry_count, 0);
    assert_eq!(venue.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn retries_stop_at_max_and_report_last_error() {
    let venue = MockExchange::quoting("okx");
    venue.fail_always(Some(ExchangeError::from_status(503, "maintenance")));
    let mesh = mesh_with(&[venue.clone()], |c| c.retry = retrying(2));

    let outcome = mesh
        .executor()
        .execute_operation("okx", &ExchangeOperation::ticker("BTCUSDT"))
        .await;

    assert!(!outcome.success);
    assert_eq!(outcome.error_kind, Some(ErrorKind::Api));
    assert_eq!(outcome.retry_count, 2);
    assert_eq!(venue.calls(), 3);

    let metrics = mesh.executor().metrics("okx");
    assert_eq!(metrics.total_requests, 1);
    assert_eq!(metrics.error_count, 1);
    assert_eq!(metrics.success_rate, 0.0);
}

#[tokio::test(start_paused = true)]
async fn exhausted_rate_limit_fails_fast_without_calling_venue() {
    let venue = MockExchange::quoting("bybit");
    let mesh = mesh_with(&[venue.clone()], |c| {
        c.default_rate_limits = vec![RateLimitRule::token_bucket(2, 1.0)];
    });
    let ticker = ExchangeOperation::ticker("BTCUSDT");

    assert!(mesh.executor().execute_operation("bybit", &ticker).await.success);
    assert!(mesh.executor().execute_operation("bybit", &ticker).await.success);

    let denied = mesh.executor().execute_operation("bybit", &ticker).await;
    assert!(!denied.success);
    assert_eq!(denied.error_kind, Some(ErrorKind::RateLimit));
    assert_eq!(venue.calls(), 2);

    tokio::time::advance(Duration::from_secs(1)).await;
    assert!(mesh.executor().execute_operation("bybit", &ticker).await.success);
    assert_eq!(venue.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn sliding_window_limits_are_enforced_alongside_buckets() {
    let venue = MockExchange::quoting("gate");
    let mesh = mesh_with(&[venue.clone()], |_| {});
    mesh.executor()
        .set_rate_limits(
            "gate",
            &[
                RateLimitRule::token_bucket(10, 1.0),
                RateLimitRule::sliding_window(3, 60.0),
            ],
        )
        .unwrap();
    let ticker = ExchangeOperation::ticker("BTCUSDT");

    for _ in 0..3 {
        assert!(mesh.executor().execute_operation("gate", &ticker).await.success);
    }
    let denied = mesh.executor().execute_operation("gate", &ticker).await;
    assert_eq!(denied.error_kind, Some(ErrorKind::RateLimit));

    tokio::time::advance(Duration::from_secs(60)).await;
    assert!(mesh.executor().execute_operation("gate", &ticker).await.success);
}

#[tokio::test]
async fn reset_metrics_clears_counters() {
    let venue = MockExchange::quoting("htx");
    venue.fail_next([ExchangeError::Rejected("invalid symbol".to_string())]);
    let mesh = mesh_with(&[venue.clone()], |_| {});

    let outcome = mesh
        .executor()
        .execute_operation("htx", &ExchangeOperation::ticker("NOPE"))
        .await;
    assert_eq!(outcome.error_kind, Some(ErrorKind::Validation));
    assert_eq!(mesh.executor().metrics("htx").error_count, 1);

    mesh.executor().reset_metrics("htx");
    let metrics = mesh.executor().metrics("htx");
    assert_eq!(metrics.total_requests, 0);
    assert_eq!(metrics.error_count, 0);
}
