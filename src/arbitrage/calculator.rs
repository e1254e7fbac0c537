//! Arbitrage opportunity calculation

use chrono::Utc;
use rust_decimal::prelude::*;
use crate::types::{ArbitrageOpportunity, Ticker};

/// Prices buying on `buy` at its ask and selling on `sell` at its bid.
///
/// Returns `None` when the buy side has no usable ask.
pub fn calculate_arbitrage(
    symbol: &str,
    buy: (&str, &Ticker),
    sell: (&str, &Ticker),
    quantity: Decimal,
) -> Option<ArbitrageOpportunity> {
    let (buy_exchange, buy_ticker) = buy;
    let (sell_exchange, sell_ticker) = sell;
    let buy_price = buy_ticker.ask;
    let sell_price = sell_ticker.bid;

    if buy_price <= Decimal::ZERO {
        return None;
    }

    let profit_rate = (sell_price - buy_price) / buy_price;

    Some(ArbitrageOpportunity {
        id: uuid::Uuid::new_v4().to_string(),
        symbol: symbol.to_string(),
        buy_exchange: buy_exchange.to_string(),
        sell_exchange: sell_exchange.to_string(),
        buy_price,
        sell_price,
        profit_rate,
        quantity,
        detected_at: Utc::now(),
    })
}

/// Evaluates every ordered pair of distinct exchanges, both directions, in quote order.
pub fn find_opportunities(
    symbol: &str,
    quotes: &[(String, Ticker)],
    quantity: Decimal,
) -> Vec<ArbitrageOpportunity> {
    let mut opportunities = Vec::new();
    for (i, (buy_exchange, buy_ticker)) in quotes.iter().enumerate() {
        for (j, (sell_exchange, sell_ticker)) in quotes.iter().enumerate() {
            if i == j {
                continue;
            }
            if let Some(opportunity) = calculate_arbitrage(
                symbol,
                (buy_exchange, buy_ticker),
                (sell_exchange, sell_ticker),
                quantity,
            ) {
                opportunities.push(opportunity);
            }
        }
    }
    opportunities
}

/// Opportunities at or above `min_profit_rate`, best first.
pub fn rank_profitable(
    opportunities: &[ArbitrageOpportunity],
    min_profit_rate: Decimal,
) -> Vec<ArbitrageOpportunity> {
    let mut profitable: Vec<_> = opportunities
        .iter()
        .filter(|o| o.is_profitable(min_profit_rate))
        .cloned()
        .collect();
    profitable.sort_by(|a, b| b.profit_rate.cmp(&a.profit_rate));
    profitable
}
