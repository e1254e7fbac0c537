//! Display and printing utilities

use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::time::Instant;
use tracing::{info, warn};
use crate::types::{
    AggregatedOrderBook, Alert, ArbitrageOpportunity, BestPrice, ExchangeMetrics, HealthReport, HealthStatus,
    OperationStats, ParallelRequestResult,
};

fn status_icon(status: HealthStatus) -> &'static str {
    match status {
        HealthStatus::Healthy => "🟢",
        HealthStatus::Degraded => "🟡",
        HealthStatus::Unhealthy => "🟠",
        HealthStatus::Offline => "🔴",
        HealthStatus::Unknown => "⚪",
    }
}

pub fn print_health_table(reports: &[HealthReport]) {
    info!("\n🩺 Exchange Health");
    for report in reports {
        info!(
            "   {} {:<14} {:<10} rt={:>8} ok={:>5.1}% err={:<4} req={}",
            status_icon(report.status),
            report.exchange_name,
            report.status,
            report
                .response_time
                .map(|rt| format!("{}ms", rt.as_millis()))
                .unwrap_or_else(|| "-".to_string()),
            report.metrics.success_rate * 100.0,
            report.metrics.error_count,
            report.metrics.total_requests,
        );
        for issue in &report.issues {
            warn!("      ↳ {}", issue);
        }
    }
}

pub fn print_best_prices(symbol: &str, best_bid: Option<&BestPrice>, best_ask: Option<&BestPrice>) {
    let fmt = |p: Option<&BestPrice>| {
        p.map(|p| format!("{:.2} @ {}", p.price, p.exchange))
            .unwrap_or_else(|| "n/a".to_string())
    };
    info!("💱 {} best bid {} | best ask {}", symbol, fmt(best_bid), fmt(best_ask));
}

pub fn print_aggregated_book(book: &AggregatedOrderBook) {
    info!(
        "📚 {} book from {} venues ({} bids / {} asks)",
        book.symbol,
        book.sources.len(),
        book.bids.len(),
        book.asks.len()
    );
    for (bid, ask) in book.bids.iter().zip(book.asks.iter()).take(5) {
        info!(
            "   {:>14.4} x {:<10.4} {:<12} | {:>14.4} x {:<10.4} {}",
            bid.level.price, bid.level.quantity, bid.exchange, ask.level.price, ask.level.quantity, ask.exchange
        );
    }
}

pub fn print_arbitrage_opportunity(opportunity: &ArbitrageOpportunity) {
    warn!("\n🎯 ARBITRAGE OPPORTUNITY #{}", opportunity.id);
    warn!("📍 Symbol: {}", opportunity.symbol);
    warn!("📋 Buy on {} → Sell on {}", opportunity.buy_exchange, opportunity.sell_exchange);
    warn!("💰 Profit Analysis:");
    warn!("   Buy Price:  {:.4}", opportunity.buy_price);
    warn!("   Sell Price: {:.4}", opportunity.sell_price);
    warn!("   Rate: {:.4}%", opportunity.profit_rate * Decimal::ONE_HUNDRED);
    warn!("   Expected Profit ({}): {:.4}", opportunity.quantity, opportunity.expected_profit());
}

pub fn print_parallel_result(label: &str, result: &ParallelRequestResult) {
    info!(
        "⚡ {}: {}/{} ok ({:.0}%) in {:?}",
        label,
        result.successful.len(),
        result.total(),
        result.success_rate * 100.0,
        result.total_elapsed
    );
    for failed in &result.failed {
        warn!(
            "   ✗ {} {} [{}] {}",
            failed.exchange_name,
            failed.operation_name,
            failed.error_kind.map(|k| k.as_str()).unwrap_or("UNKNOWN"),
            failed.error.as_deref().unwrap_or("")
        );
    }
}

pub fn print_alert(alert: &Alert) {
    warn!("🚨 [{}] {} - {}: {}", alert.level, alert.exchange_name, alert.title, alert.message);
}

pub fn print_session_stats(
    start_time: Instant,
    metrics: &[ExchangeMetrics],
    operation_stats: &HashMap<(String, String), OperationStats>,
    opportunities_seen: u64,
    profitable_opportunities: u64,
    open_alerts: usize,
) {
    let runtime = start_time.elapsed().as_secs() / 60;

    info!("\n📊 Session Statistics ({} minutes)", runtime);
    info!("   🌐 EXCHANGES:");
    for m in metrics {
        info!(
            "     {:<14} req={:<6} err={:<4} ok={:>5.1}% avg={}ms {}",
            m.exchange_name,
            m.total_requests,
            m.error_count,
            m.success_rate * 100.0,
            m.avg_response_time.as_millis(),
            if m.connection_status { "connected" } else { "DISCONNECTED" }
        );
    }

    if !operation_stats.is_empty() {
        info!("   ⚙️  OPERATIONS:");
        let mut keys: Vec<_> = operation_stats.keys().collect();
        keys.sort();
        for key in keys {
            let stats = &operation_stats[key];
            info!(
                "     {}/{}: {} calls, {} errors, {} timeouts, avg {}ms",
                key.0,
                key.1,
                stats.total_requests,
                stats.error_count,
                stats.timeout_count,
                stats.avg_response_time.as_millis()
            );
        }
    }

    info!("   📈 ARBITRAGE:");
    info!("     Pairs evaluated: {}", opportunities_seen);
    info!("     Profitable: {}", profitable_opportunities);
    info!("   🚨 Open alerts: {}", open_alerts);
    info!("");
}
