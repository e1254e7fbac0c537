//! Arbitrage and best-execution types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use super::OrderSide;

/// Cross-exchange price discrepancy for one ordered (buy, sell) pair.
///
/// Both directions of every pair are reported, profitable or not.
#[derive(Debug, Clone, Serialize)]
pub struct ArbitrageOpportunity {
    pub id: String,
    pub symbol: String,
    pub buy_exchange: String,
    pub sell_exchange: String,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    pub profit_rate: Decimal,
    pub quantity: Decimal,
    pub detected_at: DateTime<Utc>,
}

impl ArbitrageOpportunity {
    /// Gross profit before fees for the opportunity's quantity.
    pub fn expected_profit(&self) -> Decimal {
        (self.sell_price - self.buy_price) * self.quantity
    }

    pub fn is_profitable(&self, min_profit_rate: Decimal) -> bool {
        self.profit_rate > Decimal::ZERO && self.profit_rate >= min_profit_rate
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestPrice {
    pub exchange: String,
    pub symbol: String,
    pub side: OrderSide,
    pub price: Decimal,
}
