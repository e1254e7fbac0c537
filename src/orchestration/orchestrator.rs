//! Parallel multi-exchange orchestration
//!
//! Fans requests out to several exchanges at once through the [`RequestExecutor`], each under
//! its own timeout, and builds best-price, arbitrage and order-routing decisions on top.

use chrono::Utc;
use futures_util::future::join_all;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use crate::{
    arbitrage,
    config::OrchestratorConfig,
    errors::ErrorKind,
    exchange::{ExchangeOperation, ExchangeReply},
    network::RequestExecutor,
    routing::ExchangeSelector,
    types::{
        AggregatedOrderBook, ArbitrageOpportunity, Balance, BestPrice, ExchangeRequest,
        ExchangeResponse, OperationStats, OrderPlacement, OrderRequest, OrderSide, OrderType,
        ParallelRequestResult, Ticker, VenueLevel,
    },
};

pub struct Orchestrator {
    executor: Arc<RequestExecutor>,
    selector: Arc<ExchangeSelector>,
    config: OrchestratorConfig,
    stats: RwLock<HashMap<(String, String), OperationStats>>,
}

impl Orchestrator {
    pub fn new(executor: Arc<RequestExecutor>, selector: Arc<ExchangeSelector>, config: OrchestratorConfig) -> Self {
        Self {
            executor,
            selector,
            config,
            stats: RwLock::new(HashMap::new()),
        }
    }

    pub fn selector(&self) -> &Arc<ExchangeSelector> {
        &self.selector
    }

    /// Runs every request concurrently. A request that outlives its timeout fails with kind
    /// `Timeout` without affecting the others.
    pub async fn execute_parallel(&self, requests: Vec<ExchangeRequest>) -> ParallelRequestResult {
        let started = Instant::now();
        let total = requests.len();

        let responses = join_all(
            requests
                .iter()
                .enumerate()
                .map(|(index, request)| self.execute_one(index, request)),
        )
        .await;

        let (successful, failed): (Vec<_>, Vec<_>) = responses.into_iter().partition(|r| r.success);
        let success_rate = if total == 0 {
            0.0
        } else {
            successful.len() as f64 / total as f64
        };

        debug!(
            "Parallel batch finished: {}/{} succeeded in {:?}",
            successful.len(),
            total,
            started.elapsed()
        );

        ParallelRequestResult {
            successful,
            failed,
            success_rate,
            total_elapsed: started.elapsed(),
        }
    }

    async fn execute_one(&self, index: usize, request: &ExchangeRequest) -> ExchangeResponse {
        let operation_name = request.operation.name();
        let mut response = ExchangeResponse {
            index,
            exchange_name: request.exchange_name.clone(),
            operation_name: operation_name.to_string(),
            success: false,
            data: None,
            error: None,
            error_kind: None,
            latency: Duration::ZERO,
            retry_count: 0,
        };

        if self.executor.registry().entry(&request.exchange_name).is_none() {
            response.error = Some(format!("unknown exchange '{}'", request.exchange_name));
            response.error_kind = Some(ErrorKind::Validation);
            return response;
        }

        let started = Instant::now();
        let call = self
            .executor
            .execute_operation(&request.exchange_name, &request.operation);
        let timed_out = match tokio::time::timeout(request.timeout, call).await {
            Ok(outcome) => {
                response.success = outcome.success;
                response.data = outcome.data;
                response.error = outcome.error;
                response.error_kind = outcome.error_kind;
                response.latency = outcome.latency;
                response.retry_count = outcome.retry_count;
                false
            }
            Err(_) => {
                warn!(
                    "⏱️  {} on {} timed out after {:?}",
                    operation_name, request.exchange_name, request.timeout
                );
                response.error = Some("timeout".to_string());
                response.error_kind = Some(ErrorKind::Timeout);
                response.latency = started.elapsed();
                // The dropped executor call never reached its own metrics update.
                self.executor
                    .metrics_store()
                    .record(&request.exchange_name, false, response.latency);
                true
            }
        };

        self.stats
            .write()
            .entry((request.exchange_name.clone(), operation_name.to_string()))
            .or_default()
            .record(response.success, timed_out, response.latency);
        response
    }

    /// Enabled exchanges listing `symbol`, in registry order, whatever their health.
    pub fn quoting_exchanges(&self, symbol: &str) -> Vec<String> {
        self.executor
            .registry()
            .enabled()
            .filter(|entry| entry.supports(symbol))
            .map(|entry| entry.name.clone())
            .collect()
    }

    pub fn order_book_depth(&self) -> usize {
        self.config.order_book_depth
    }

    /// Tickers from every enabled exchange that answered, in registry order.
    pub async fn get_all_tickers(&self, symbol: &str) -> Vec<(String, Ticker)> {
        let exchanges = self.quoting_exchanges(symbol);
        let requests = exchanges
            .iter()
            .map(|name| ExchangeRequest::new(name, ExchangeOperation::ticker(symbol), self.config.request_timeout()))
            .collect();

        let mut result = self.execute_parallel(requests).await;
        result.successful.sort_by_key(|r| r.index);
        result
            .successful
            .into_iter()
            .filter_map(|r| match r.data {
                Some(ExchangeReply::Ticker(ticker)) => Some((r.exchange_name, ticker)),
                _ => None,
            })
            .collect()
    }

    /// Lowest ask when buying, highest bid when selling. Ties keep the first exchange.
    pub async fn get_best_price(&self, symbol: &str, side: OrderSide) -> Option<BestPrice> {
        let tickers = self.get_all_tickers(symbol).await;
        best_quote(symbol, side, &tickers)
    }

    /// Every ordered pair of quoting exchanges, both directions, profitable or not.
    pub async fn find_arbitrage_opportunities(&self, symbol: &str, quantity: Decimal) -> Vec<ArbitrageOpportunity> {
        let tickers = self.get_all_tickers(symbol).await;
        let opportunities = arbitrage::find_opportunities(symbol, &tickers, quantity);
        debug!(
            "Evaluated {} arbitrage pairs for {} across {} exchanges",
            opportunities.len(),
            symbol,
            tickers.len()
        );
        opportunities
    }

    /// Places `order` only on the exchange quoting the best price for its side.
    pub async fn place_order_on_best_exchange(&self, order: &OrderRequest) -> OrderPlacement {
        let Some(best) = self.get_best_price(&order.symbol, order.side).await else {
            return OrderPlacement::rejected(
                None,
                None,
                format!("no exchange quoted {}", order.symbol),
                ErrorKind::Unknown,
            );
        };

        info!(
            "🎯 Routing {} {} {} to {} at {}",
            order.side, order.quantity, order.symbol, best.exchange, best.price
        );
        let mut order = order.clone();
        if order.order_type == OrderType::Limit && order.price.is_none() {
            order.price = Some(best.price);
        }
        self.place_on(&best.exchange, order, Some(best.price)).await
    }

    /// Places `order` on the selector's choice, keeping `current` while it is healthy.
    pub async fn route_order(&self, order: &OrderRequest, current: Option<&str>) -> OrderPlacement {
        let Some(exchange) = self.selector.select_best(&order.symbol, current).await else {
            return OrderPlacement::rejected(
                None,
                None,
                format!("no healthy exchange available for {}", order.symbol),
                ErrorKind::Unknown,
            );
        };
        self.place_on(&exchange, order.clone(), order.price).await
    }

    async fn place_on(&self, exchange: &str, order: OrderRequest, price: Option<Decimal>) -> OrderPlacement {
        let request = ExchangeRequest::new(exchange, ExchangeOperation::PlaceOrder(order), self.config.request_timeout());
        let result = self.execute_parallel(vec![request]).await;

        if let Some(response) = result.successful.into_iter().next() {
            let order = response.data.and_then(ExchangeReply::into_order);
            let price = price.or_else(|| order.as_ref().and_then(|ack| ack.price));
            return OrderPlacement {
                success: true,
                exchange: Some(exchange.to_string()),
                order,
                price,
                error: None,
                error_kind: None,
            };
        }

        match result.failed.into_iter().next() {
            Some(response) => {
                warn!("❌ Order on {} failed: {}", exchange, response.error.as_deref().unwrap_or("unknown error"));
                OrderPlacement::rejected(
                    Some(exchange.to_string()),
                    price,
                    response.error.unwrap_or_else(|| "unknown error".to_string()),
                    response.error_kind.unwrap_or(ErrorKind::Unknown),
                )
            }
            None => OrderPlacement::rejected(
                Some(exchange.to_string()),
                price,
                "order was not dispatched".to_string(),
                ErrorKind::Unknown,
            ),
        }
    }

    /// Merges the order books of every enabled exchange that answered, bids descending and asks
    /// ascending. Equal prices keep registry order. Each side is cut to `depth` levels.
    pub async fn get_aggregated_order_book(&self, symbol: &str, depth: usize) -> Option<AggregatedOrderBook> {
        let exchanges = self.quoting_exchanges(symbol);
        let requests = exchanges
            .iter()
            .map(|name| ExchangeRequest::new(name, ExchangeOperation::order_book(symbol, depth), self.config.request_timeout()))
            .collect();

        let mut result = self.execute_parallel(requests).await;
        result.successful.sort_by_key(|r| r.index);

        let mut bids = Vec::new();
        let mut asks = Vec::new();
        let mut sources = Vec::new();
        for response in result.successful {
            let Some(ExchangeReply::OrderBook(book)) = response.data else {
                continue;
            };
            bids.extend(book.bids.into_iter().map(|level| VenueLevel { exchange: response.exchange_name.clone(), level }));
            asks.extend(book.asks.into_iter().map(|level| VenueLevel { exchange: response.exchange_name.clone(), level }));
            sources.push(response.exchange_name);
        }
        if sources.is_empty() {
            return None;
        }

        bids.sort_by(|a, b| b.level.price.cmp(&a.level.price));
        asks.sort_by(|a, b| a.level.price.cmp(&b.level.price));
        bids.truncate(depth);
        asks.truncate(depth);

        Some(AggregatedOrderBook {
            symbol: symbol.to_string(),
            bids,
            asks,
            sources,
            built_at: Utc::now(),
        })
    }

    /// Balances of every enabled exchange that answered.
    pub async fn get_all_balances(&self) -> HashMap<String, Vec<Balance>> {
        let requests = self
            .executor
            .registry()
            .enabled_names()
            .iter()
            .map(|name| ExchangeRequest::new(name, ExchangeOperation::Balance, self.config.request_timeout()))
            .collect();

        self.execute_parallel(requests)
            .await
            .successful
            .into_iter()
            .filter_map(|r| match r.data {
                Some(ExchangeReply::Balances(balances)) => Some((r.exchange_name, balances)),
                _ => None,
            })
            .collect()
    }

    pub fn operation_stats(&self) -> HashMap<(String, String), OperationStats> {
        self.stats.read().clone()
    }

    pub fn reset_operation_stats(&self) {
        self.stats.write().clear();
    }
}

/// Best taker price across `tickers`; non-positive prices are ignored.
pub fn best_quote(symbol: &str, side: OrderSide, tickers: &[(String, Ticker)]) -> Option<BestPrice> {
    let mut best: Option<(&str, Decimal)> = None;
    for (exchange, ticker) in tickers {
        let price = ticker.price_for(side);
        if price <= Decimal::ZERO {
            continue;
        }
        let better = match (side, best) {
            (_, None) => true,
            (OrderSide::Buy, Some((_, current))) => price < current,
            (OrderSide::Sell, Some((_, current))) => price > current,
        };
        if better {
            best = Some((exchange.as_str(), price));
        }
    }
    best.map(|(exchange, price)| BestPrice {
        exchange: exchange.to_string(),
        symbol: symbol.to_string(),
        side,
        price,
    })
}
