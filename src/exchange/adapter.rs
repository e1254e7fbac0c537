//! Venue adapter trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use crate::{
    errors::ExchangeError,
    types::{Balance, CancelRequest, Kline, OrderAck, OrderBook, OrderRequest, Ticker},
};

/// One exchange's REST surface, as seen by the execution layer.
///
/// Implementations own request building and response parsing; they must not retry or rate
/// limit on their own, the executor does both.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    fn name(&self) -> &str;

    async fn get_ticker(&self, symbol: &str) -> Result<Ticker, ExchangeError>;

    async fn get_order_book(&self, symbol: &str, limit: usize) -> Result<OrderBook, ExchangeError>;

    async fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Kline>, ExchangeError>;

    async fn get_balance(&self) -> Result<Vec<Balance>, ExchangeError>;

    async fn place_order(&self, request: &OrderRequest) -> Result<OrderAck, ExchangeError>;

    async fn cancel_order(&self, request: &CancelRequest) -> Result<OrderAck, ExchangeError>;

    async fn get_server_time(&self) -> Result<DateTime<Utc>, ExchangeError>;

    /// `Ok(false)` means the venue answered but reports itself unavailable.
    async fn test_connectivity(&self) -> Result<bool, ExchangeError>;
}

pub type SharedAdapter = Arc<dyn ExchangeAdapter>;
