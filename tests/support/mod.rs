//! Shared fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use exchange_mesh::{
    config::{Config, ExchangeConfig},
    exchange::{ExchangeAdapter, SharedAdapter},
    network::RetryPolicy,
    types::{
        Balance, CancelRequest, Kline, OrderAck, OrderBook, OrderRequest, OrderStatus, PriceLevel,
        Ticker,
    },
    ExchangeError, MeshContext, MeshError,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Scriptable in-memory venue.
///
/// Market and order calls pop scripted failures first, then fall back to the persistent
/// failure if one is set. Health probes (`test_connectivity`, `get_server_time`) only look
/// at the `connected` flag and `probe_delay`.
pub struct MockExchange {
    name: String,
    bid: Mutex<Decimal>,
    ask: Mutex<Decimal>,
    connected: AtomicBool,
    delay: Mutex<Duration>,
    probe_delay: Mutex<Duration>,
    scripted_failures: Mutex<VecDeque<ExchangeError>>,
    persistent_failure: Mutex<Option<ExchangeError>>,
    order_failure: Mutex<Option<ExchangeError>>,
    calls: AtomicU32,
    placed: Mutex<Vec<OrderRequest>>,
}

impl MockExchange {
    pub fn new(name: &str, bid: Decimal, ask: Decimal) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            bid: Mutex::new(bid),
            ask: Mutex::new(ask),
            connected: AtomicBool::new(true),
            delay: Mutex::new(Duration::ZERO),
            probe_delay: Mutex::new(Duration::ZERO),
            scripted_failures: Mutex::new(VecDeque::new()),
            persistent_failure: Mutex::new(None),
            order_failure: Mutex::new(None),
            calls: AtomicU32::new(0),
            placed: Mutex::new(Vec::new()),
        })
    }

    pub fn quoting(name: &str) -> Arc<Self> {
        Self::new(name, dec!(49990), dec!(50010))
    }

    pub fn set_quote(&self, bid: Decimal, ask: Decimal) {
        *self.bid.lock() = bid;
        *self.ask.lock() = ask;
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    pub fn set_probe_delay(&self, delay: Duration) {
        *self.probe_delay.lock() = delay;
    }

    pub fn fail_next(&self, errors: impl IntoIterator<Item = ExchangeError>) {
        self.scripted_failures.lock().extend(errors);
    }

    pub fn fail_always(&self, error: Option<ExchangeError>) {
        *self.persistent_failure.lock() = error;
    }

    /// Makes `place_order` fail while quotes keep working.
    pub fn reject_orders(&self, error: Option<ExchangeError>) {
        *self.order_failure.lock() = error;
    }

    /// Market and order calls seen so far, failed ones included.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn placed_orders(&self) -> Vec<OrderRequest> {
        self.placed.lock().clone()
    }

    async fn call(&self) -> Result<(), ExchangeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.scripted_failures.lock().pop_front() {
            return Err(error);
        }
        match self.persistent_failure.lock().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn probe(&self) {
        let delay = *self.probe_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    fn level(price: Decimal) -> PriceLevel {
        PriceLevel { price, quantity: dec!(1) }
    }
}

#[async_trait]
impl ExchangeAdapter for MockExchange {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_ticker(&self, symbol: &str) -> Result<Ticker, ExchangeError> {
        self.call().await?;
        let (bid, ask) = (*self.bid.lock(), *self.ask.lock());
        Ok(Ticker {
            symbol: symbol.to_string(),
            bid,
            ask,
            last: (bid + ask) / dec!(2),
            volume: dec!(10),
            timestamp: Utc::now(),
        })
    }

    async fn get_order_book(&self, symbol: &str, limit: usize) -> Result<OrderBook, ExchangeError> {
        self.call().await?;
        let (bid, ask) = (*self.bid.lock(), *self.ask.lock());
        let bids = (0..limit).map(|i| Self::level(bid - Decimal::from(i))).collect();
        let asks = (0..limit).map(|i| Self::level(ask + Decimal::from(i))).collect();
        Ok(OrderBook {
            symbol: symbol.to_string(),
            bids,
            asks,
            timestamp: Utc::now(),
        })
    }

    async fn get_klines(&self, _symbol: &str, _interval: &str, _limit: usize) -> Result<Vec<Kline>, ExchangeError> {
        self.call().await?;
        Ok(Vec::new())
    }

    async fn get_balance(&self) -> Result<Vec<Balance>, ExchangeError> {
        self.call().await?;
        Ok(vec![Balance {
            asset: "USDT".to_string(),
            free: dec!(1000),
            locked: dec!(0),
        }])
    }

    async fn place_order(&self, request: &OrderRequest) -> Result<OrderAck, ExchangeError> {
        self.call().await?;
        if let Some(error) = self.order_failure.lock().clone() {
            return Err(error);
        }
        self.placed.lock().push(request.clone());
        let n = self.placed.lock().len();
        Ok(OrderAck {
            order_id: format!("{}-{}", self.name, n),
            symbol: request.symbol.clone(),
            side: request.side,
            status: OrderStatus::New,
            filled_quantity: Decimal::ZERO,
            price: request.price,
        })
    }

    async fn cancel_order(&self, request: &CancelRequest) -> Result<OrderAck, ExchangeError> {
        self.call().await?;
        Err(ExchangeError::Rejected(format!("invalid order id {}", request.order_id)))
    }

    async fn get_server_time(&self) -> Result<DateTime<Utc>, ExchangeError> {
        self.probe().await;
        Ok(Utc::now())
    }

    async fn test_connectivity(&self) -> Result<bool, ExchangeError> {
        self.probe().await;
        Ok(self.connected.load(Ordering::SeqCst))
    }
}

/// Config for `mocks` with no admission limits and no retries.
pub fn config_for(mocks: &[Arc<MockExchange>]) -> Config {
    let mut config = Config::default();
    config.exchanges = mocks
        .iter()
        .map(|m| ExchangeConfig::simulated(m.name(), dec!(50000)))
        .collect();
    config.default_rate_limits = Vec::new();
    config.retry = RetryPolicy::no_retry();
    config.logging.directory = None;
    config
}

pub fn mesh_with(mocks: &[Arc<MockExchange>], tweak: impl FnOnce(&mut Config)) -> MeshContext {
    let mut config = config_for(mocks);
    tweak(&mut config);
    MeshContext::init_with(config, |exchange| {
        mocks
            .iter()
            .find(|m| m.name() == exchange.name)
            .map(|m| Arc::clone(m) as SharedAdapter)
            .ok_or_else(|| MeshError::UnknownExchange(exchange.name.clone()))
    })
    .expect("mesh builds")
}
