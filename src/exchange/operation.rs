//! Named exchange operations and their replies

use chrono::{DateTime, Utc};
use serde::Serialize;
use super::ExchangeAdapter;
use crate::{
    errors::ExchangeError,
    types::{Balance, CancelRequest, Kline, OrderAck, OrderBook, OrderRequest, Ticker},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExchangeOperation {
    Ticker { symbol: String },
    OrderBook { symbol: String, limit: usize },
    Klines { symbol: String, interval: String, limit: usize },
    Balance,
    PlaceOrder(OrderRequest),
    CancelOrder(CancelRequest),
    ServerTime,
    Connectivity,
}

impl ExchangeOperation {
    pub fn ticker(symbol: &str) -> Self {
        ExchangeOperation::Ticker { symbol: symbol.to_string() }
    }

    pub fn order_book(symbol: &str, limit: usize) -> Self {
        ExchangeOperation::OrderBook { symbol: symbol.to_string(), limit }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExchangeOperation::Ticker { .. } => "get_ticker",
            ExchangeOperation::OrderBook { .. } => "get_order_book",
            ExchangeOperation::Klines { .. } => "get_klines",
            ExchangeOperation::Balance => "get_balance",
            ExchangeOperation::PlaceOrder(_) => "place_order",
            ExchangeOperation::CancelOrder(_) => "cancel_order",
            ExchangeOperation::ServerTime => "get_server_time",
            ExchangeOperation::Connectivity => "test_connectivity",
        }
    }

    pub async fn dispatch(&self, adapter: &dyn ExchangeAdapter) -> Result<ExchangeReply, ExchangeError> {
        let reply = match self {
            ExchangeOperation::Ticker { symbol } => ExchangeReply::Ticker(adapter.get_ticker(symbol).await?),
            ExchangeOperation::OrderBook { symbol, limit } => {
                ExchangeReply::OrderBook(adapter.get_order_book(symbol, *limit).await?)
            }
            ExchangeOperation::Klines { symbol, interval, limit } => {
                ExchangeReply::Klines(adapter.get_klines(symbol, interval, *limit).await?)
            }
            ExchangeOperation::Balance => ExchangeReply::Balances(adapter.get_balance().await?),
            ExchangeOperation::PlaceOrder(request) => ExchangeReply::Order(adapter.place_order(request).await?),
            ExchangeOperation::CancelOrder(request) => ExchangeReply::Order(adapter.cancel_order(request).await?),
            ExchangeOperation::ServerTime => ExchangeReply::ServerTime(adapter.get_server_time().await?),
            ExchangeOperation::Connectivity => ExchangeReply::Connectivity(adapter.test_connectivity().await?),
        };
        Ok(reply)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ExchangeReply {
    Ticker(Ticker),
    OrderBook(OrderBook),
    Klines(Vec<Kline>),
    Balances(Vec<Balance>),
    Order(OrderAck),
    ServerTime(DateTime<Utc>),
    Connectivity(bool),
}

impl ExchangeReply {
    pub fn as_ticker(&self) -> Option<&Ticker> {
        match self {
            ExchangeReply::Ticker(ticker) => Some(ticker),
            _ => None,
        }
    }

    pub fn as_order_book(&self) -> Option<&OrderBook> {
        match self {
            ExchangeReply::OrderBook(book) => Some(book),
            _ => None,
        }
    }

    pub fn as_balances(&self) -> Option<&[Balance]> {
        match self {
            ExchangeReply::Balances(balances) => Some(balances),
            _ => None,
        }
    }

    pub fn into_order(self) -> Option<OrderAck> {
        match self {
            ExchangeReply::Order(ack) => Some(ack),
            _ => None,
        }
    }
}
