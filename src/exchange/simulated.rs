//! In-process venue with simulated latency and failures

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use rand::Rng;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;
use super::ExchangeAdapter;
use crate::{
    errors::ExchangeError,
    types::{
        Balance, CancelRequest, Kline, OrderAck, OrderBook, OrderRequest, OrderSide, OrderStatus,
        OrderType, PriceLevel, Ticker,
    },
};

#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub base_latency_ms: u64,
    pub latency_jitter_ms: u64,
    /// Probability in [0, 1] that any call fails with a transient error.
    pub failure_rate: f64,
    pub spread_bps: u32,
    pub default_mid_price: Decimal,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            base_latency_ms: 50,
            latency_jitter_ms: 25,
            failure_rate: 0.0,
            spread_bps: 10,
            default_mid_price: dec!(50000),
        }
    }
}

pub struct SimulatedExchange {
    name: String,
    config: SimulationConfig,
    mid_prices: RwLock<HashMap<String, Decimal>>,
    online: AtomicBool,
    order_seq: AtomicU64,
}

impl SimulatedExchange {
    pub fn new(name: &str, config: SimulationConfig) -> Self {
        Self {
            name: name.to_string(),
            config,
            mid_prices: RwLock::new(HashMap::new()),
            online: AtomicBool::new(true),
            order_seq: AtomicU64::new(1),
        }
    }

    pub fn set_mid_price(&self, symbol: &str, price: Decimal) {
        self.mid_prices.write().insert(symbol.to_uppercase(), price);
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Release);
    }

    fn mid_price(&self, symbol: &str) -> Decimal {
        self.mid_prices
            .read()
            .get(&symbol.to_uppercase())
            .copied()
            .unwrap_or(self.config.default_mid_price)
    }

    fn half_spread(&self, mid: Decimal) -> Decimal {
        mid * Decimal::from(self.config.spread_bps) / dec!(10000) / dec!(2)
    }

    /// Sleeps for the simulated latency, then rolls for a transient failure.
    async fn simulate_call(&self, operation: &str) -> Result<(), ExchangeError> {
        if !self.online.load(Ordering::Acquire) {
            return Err(ExchangeError::Connection(format!("{} is unreachable", self.name)));
        }

        let jitter = if self.config.latency_jitter_ms > 0 {
            rand::rng().random_range(0..=self.config.latency_jitter_ms)
        } else {
            0
        };
        tokio::time::sleep(Duration::from_millis(self.config.base_latency_ms + jitter)).await;

        if self.config.failure_rate > 0.0 && rand::random::<f64>() < self.config.failure_rate {
            debug!("🎭 {} simulated failure on {}", self.name, operation);
            let err = if rand::random::<bool>() {
                ExchangeError::from_status(503, "simulated outage")
            } else {
                ExchangeError::Timeout(format!("simulated {} timeout", operation))
            };
            return Err(err);
        }
        Ok(())
    }
}

#[async_trait]
impl ExchangeAdapter for SimulatedExchange {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_ticker(&self, symbol: &str) -> Result<Ticker, ExchangeError> {
        self.simulate_call("get_ticker").await?;
        let mid = self.mid_price(symbol);
        let half = self.half_spread(mid);
        Ok(Ticker {
            symbol: symbol.to_uppercase(),
            bid: mid - half,
            ask: mid + half,
            last: mid,
            volume: dec!(1000),
            timestamp: Utc::now(),
        })
    }

    async fn get_order_book(&self, symbol: &str, limit: usize) -> Result<OrderBook, ExchangeError> {
        self.simulate_call("get_order_book").await?;
        let mid = self.mid_price(symbol);
        let half = self.half_spread(mid);
        let tick = (mid * dec!(0.0001)).max(dec!(0.01));

        let bids = (0..limit)
            .map(|i| PriceLevel {
                price: mid - half - tick * Decimal::from(i),
                quantity: dec!(0.5) + Decimal::from(i) * dec!(0.25),
            })
            .collect();
        let asks = (0..limit)
            .map(|i| PriceLevel {
                price: mid + half + tick * Decimal::from(i),
                quantity: dec!(0.5) + Decimal::from(i) * dec!(0.25),
            })
            .collect();

        Ok(OrderBook {
            symbol: symbol.to_uppercase(),
            bids,
            asks,
            timestamp: Utc::now(),
        })
    }

    async fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Kline>, ExchangeError> {
        self.simulate_call("get_klines").await?;
        let step = match interval {
            "1m" => ChronoDuration::minutes(1),
            "5m" => ChronoDuration::minutes(5),
            "1h" => ChronoDuration::hours(1),
            "1d" => ChronoDuration::days(1),
            other => return Err(ExchangeError::Rejected(format!("invalid interval '{}'", other))),
        };
        let mid = self.mid_price(symbol);
        let now = Utc::now();
        Ok((0..limit)
            .rev()
            .map(|i| Kline {
                open_time: now - step * (i as i32 + 1),
                open: mid,
                high: mid,
                low: mid,
                close: mid,
                volume: Decimal::ZERO,
            })
            .collect())
    }

    async fn get_balance(&self) -> Result<Vec<Balance>, ExchangeError> {
        self.simulate_call("get_balance").await?;
        Ok(vec![
            Balance { asset: "USDT".to_string(), free: dec!(100000), locked: Decimal::ZERO },
            Balance { asset: "BTC".to_string(), free: dec!(2), locked: Decimal::ZERO },
        ])
    }

    async fn place_order(&self, request: &OrderRequest) -> Result<OrderAck, ExchangeError> {
        self.simulate_call("place_order").await?;
        if request.quantity <= Decimal::ZERO {
            return Err(ExchangeError::Rejected("invalid order quantity".to_string()));
        }
        let mid = self.mid_price(&request.symbol);
        let half = self.half_spread(mid);
        let touch = match request.side {
            OrderSide::Buy => mid + half,
            OrderSide::Sell => mid - half,
        };
        let (status, filled, price) = match (request.order_type, request.price) {
            (OrderType::Market, _) => (OrderStatus::Filled, request.quantity, touch),
            (OrderType::Limit, Some(limit)) => {
                let crosses = match request.side {
                    OrderSide::Buy => limit >= touch,
                    OrderSide::Sell => limit <= touch,
                };
                if crosses {
                    (OrderStatus::Filled, request.quantity, touch)
                } else {
                    (OrderStatus::New, Decimal::ZERO, limit)
                }
            }
            (OrderType::Limit, None) => {
                return Err(ExchangeError::Rejected("invalid limit order: missing price".to_string()));
            }
        };

        let seq = self.order_seq.fetch_add(1, Ordering::Relaxed);
        Ok(OrderAck {
            order_id: format!("{}-{}", self.name, seq),
            symbol: request.symbol.clone(),
            side: request.side,
            status,
            filled_quantity: filled,
            price: Some(price),
        })
    }

    async fn cancel_order(&self, request: &CancelRequest) -> Result<OrderAck, ExchangeError> {
        self.simulate_call("cancel_order").await?;
        Ok(OrderAck {
            order_id: request.order_id.clone(),
            symbol: request.symbol.clone(),
            side: OrderSide::Buy,
            status: OrderStatus::Canceled,
            filled_quantity: Decimal::ZERO,
            price: None,
        })
    }

    async fn get_server_time(&self) -> Result<DateTime<Utc>, ExchangeError> {
        self.simulate_call("get_server_time").await?;
        Ok(Utc::now())
    }

    async fn test_connectivity(&self) -> Result<bool, ExchangeError> {
        Ok(self.online.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant_config() -> SimulationConfig {
        SimulationConfig {
            base_latency_ms: 0,
            latency_jitter_ms: 0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn ticker_straddles_mid_price() {
        let venue = SimulatedExchange::new("sim", instant_config());
        venue.set_mid_price("BTCUSDT", dec!(40000));

        let ticker = venue.get_ticker("btcusdt").await.unwrap();
        assert_eq!(ticker.last, dec!(40000));
        assert_eq!(ticker.bid, dec!(39980));
        assert_eq!(ticker.ask, dec!(40020));
    }

    #[tokio::test]
    async fn offline_venue_fails_with_transport_error() {
        let venue = SimulatedExchange::new("sim", instant_config());
        venue.set_online(false);

        assert!(!venue.test_connectivity().await.unwrap());
        let err = venue.get_server_time().await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn resting_limit_order_is_not_filled() {
        let venue = SimulatedExchange::new("sim", instant_config());
        let order = OrderRequest::limit("BTCUSDT", OrderSide::Buy, dec!(1), dec!(1000));

        let ack = venue.place_order(&order).await.unwrap();
        assert_eq!(ack.status, OrderStatus::New);
        assert_eq!(ack.filled_quantity, Decimal::ZERO);
    }
}
