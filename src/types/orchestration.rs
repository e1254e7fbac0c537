//! Fan-out request and result types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::time::Duration;
use crate::{
    errors::ErrorKind,
    exchange::{ExchangeOperation, ExchangeReply},
};
use super::{OrderAck, PriceLevel};

#[derive(Debug, Clone)]
pub struct ExchangeRequest {
    pub exchange_name: String,
    pub operation: ExchangeOperation,
    pub timeout: Duration,
}

impl ExchangeRequest {
    pub fn new(exchange_name: &str, operation: ExchangeOperation, timeout: Duration) -> Self {
        Self {
            exchange_name: exchange_name.to_string(),
            operation,
            timeout,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExchangeResponse {
    /// Position of the originating request in the submitted batch.
    pub index: usize,
    pub exchange_name: String,
    pub operation_name: String,
    pub success: bool,
    pub data: Option<ExchangeReply>,
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub latency: Duration,
    pub retry_count: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParallelRequestResult {
    pub successful: Vec<ExchangeResponse>,
    pub failed: Vec<ExchangeResponse>,
    pub success_rate: f64,
    pub total_elapsed: Duration,
}

impl ParallelRequestResult {
    pub fn total(&self) -> usize {
        self.successful.len() + self.failed.len()
    }
}

/// Result of routing an order to the best-priced venue.
#[derive(Debug, Clone, Serialize)]
pub struct OrderPlacement {
    pub success: bool,
    pub exchange: Option<String>,
    pub order: Option<OrderAck>,
    pub price: Option<Decimal>,
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
}

impl OrderPlacement {
    pub fn rejected(exchange: Option<String>, price: Option<Decimal>, error: String, kind: ErrorKind) -> Self {
        Self {
            success: false,
            exchange,
            order: None,
            price,
            error: Some(error),
            error_kind: Some(kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VenueLevel {
    pub exchange: String,
    pub level: PriceLevel,
}

/// Order books of several venues merged into one ladder per side.
#[derive(Debug, Clone, Serialize)]
pub struct AggregatedOrderBook {
    pub symbol: String,
    pub bids: Vec<VenueLevel>,
    pub asks: Vec<VenueLevel>,
    pub sources: Vec<String>,
    pub built_at: DateTime<Utc>,
}

impl AggregatedOrderBook {
    pub fn best_bid(&self) -> Option<&VenueLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&VenueLevel> {
        self.asks.first()
    }
}

/// Running stats per (exchange, operation) pair.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OperationStats {
    pub total_requests: u64,
    pub error_count: u64,
    pub timeout_count: u64,
    pub avg_response_time: Duration,
    pub success_rate: f64,
}

impl OperationStats {
    pub fn record(&mut self, success: bool, timed_out: bool, latency: Duration) {
        self.total_requests += 1;
        if !success {
            self.error_count += 1;
        }
        if timed_out {
            self.timeout_count += 1;
        }
        let n = self.total_requests as f64;
        let avg = self.avg_response_time.as_secs_f64();
        self.avg_response_time = Duration::from_secs_f64(avg + (latency.as_secs_f64() - avg) / n);
        self.success_rate = ((self.total_requests - self.error_count) as f64 / n).clamp(0.0, 1.0);
    }
}
