//! Exchange Mesh - Main Entry Point
//!
//! Runs the mesh against the configured venues and periodically reports health, best prices
//! and arbitrage spreads until Ctrl+C.

use anyhow::Result;
use exchange_mesh::*;
use std::time::Duration;
use tokio::time::{self, Instant};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = Config::load(&config_path)?;

    let _logging_guard = utils::setup_logging(&config.logging)?;

    info!("🕸️  Exchange Mesh v{}", env!("CARGO_PKG_VERSION"));
    info!("📋 Configuration ({}):", config_path);
    for exchange in &config.exchanges {
        info!(
            "   {} [{:?}] {}",
            exchange.name,
            exchange.kind,
            if exchange.enabled { "enabled" } else { "disabled" }
        );
    }
    info!("   Retry: {} retries, {:?} backoff", config.retry.max_retries, config.retry.strategy);
    info!("   Probe interval: {}s, switch cooldown: {}s", config.monitor.interval_secs, config.selector.switch_cooldown_secs);
    info!("   Watching: {}", config.watch.symbols.join(", "));

    let mesh = MeshContext::init(config)?;

    let requests = mesh
        .registry()
        .enabled_names()
        .iter()
        .map(|name| {
            ExchangeRequest::new(
                name,
                exchange::ExchangeOperation::Connectivity,
                mesh.config().orchestrator.request_timeout(),
            )
        })
        .collect();
    let connectivity = mesh.orchestrator().execute_parallel(requests).await;
    utils::print_parallel_result("Connectivity check", &connectivity);

    mesh.start().await?;

    let (_alert_subscription, mut alerts) = mesh.monitor().subscribe();
    tokio::spawn(async move {
        while let Some(alert) = alerts.recv().await {
            utils::print_alert(&alert);
        }
    });

    let start_time = Instant::now();
    let mut state = ReportState::default();
    let mut interval = time::interval(Duration::from_secs(mesh.config().watch.report_interval_secs.max(1)));

    info!("\n🚀 Starting report loop...\n");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                run_report_cycle(&mesh, &mut state).await;
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    error!("Failed to listen for Ctrl+C: {}", e);
                }
                info!("\n📛 Received shutdown signal (Ctrl+C)...");
                break;
            }
        }
    }

    mesh.shutdown().await;

    utils::print_session_stats(
        start_time,
        &mesh.executor().all_metrics(),
        &mesh.orchestrator().operation_stats(),
        state.opportunities_seen,
        state.profitable_opportunities,
        mesh.monitor().get_alerts(&AlertFilter::unresolved()).len(),
    );

    Ok(())
}

#[derive(Default)]
struct ReportState {
    opportunities_seen: u64,
    profitable_opportunities: u64,
}

async fn run_report_cycle(mesh: &MeshContext, state: &mut ReportState) {
    let reports = mesh.monitor().get_health_reports().await;
    if !reports.is_empty() {
        utils::print_health_table(&reports);
    }

    let orchestrator = mesh.orchestrator();
    let watch = &mesh.config().watch;

    for symbol in &watch.symbols {
        let best_bid = orchestrator.get_best_price(symbol, OrderSide::Sell).await;
        let best_ask = orchestrator.get_best_price(symbol, OrderSide::Buy).await;
        if best_bid.is_none() && best_ask.is_none() {
            warn!("⚠️  No exchange quoted {}", symbol);
            continue;
        }
        utils::print_best_prices(symbol, best_bid.as_ref(), best_ask.as_ref());

        if let Some(book) = orchestrator
            .get_aggregated_order_book(symbol, orchestrator.order_book_depth())
            .await
        {
            utils::print_aggregated_book(&book);
        }

        let opportunities = orchestrator
            .find_arbitrage_opportunities(symbol, watch.arbitrage_quantity)
            .await;
        state.opportunities_seen += opportunities.len() as u64;

        let profitable = arbitrage::rank_profitable(&opportunities, watch.min_profit_rate);
        state.profitable_opportunities += profitable.len() as u64;
        for opportunity in &profitable {
            utils::print_arbitrage_opportunity(opportunity);
        }

        match mesh.selector().select_best(symbol, None).await {
            Some(exchange) => info!("🧭 {} routes to {}", symbol, exchange),
            None => warn!("🧭 No healthy route for {}", symbol),
        }
    }
}
