//! Builds venue adapters from configuration

use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use super::{HttpExchangeAdapter, SharedAdapter, SimulatedExchange, SimulationConfig};
use crate::{
    config::{ExchangeConfig, ExchangeKind},
    errors::{MeshError, MeshResult},
};

pub fn build_adapter(config: &ExchangeConfig) -> MeshResult<SharedAdapter> {
    match config.kind {
        ExchangeKind::Http => {
            let base_url = config.base_url.as_deref().ok_or_else(|| {
                MeshError::config("exchanges.base_url", format!("http exchange '{}' needs a base_url", config.name))
            })?;
            let adapter = HttpExchangeAdapter::new(
                &config.name,
                base_url,
                Duration::from_secs(config.request_timeout_secs),
            )?
            .with_api_key(config.api_key());
            info!("🌐 {} -> {}", config.name, base_url);
            Ok(Arc::new(adapter))
        }
        ExchangeKind::Simulated => {
            let settings = &config.simulation;
            let venue = SimulatedExchange::new(
                &config.name,
                SimulationConfig {
                    base_latency_ms: settings.base_latency_ms,
                    latency_jitter_ms: settings.latency_jitter_ms,
                    failure_rate: settings.failure_rate,
                    spread_bps: settings.spread_bps,
                    ..Default::default()
                },
            );
            for (symbol, price) in &settings.mid_prices {
                venue.set_mid_price(symbol, *price);
            }
            info!("🧪 {} -> simulated venue", config.name);
            Ok(Arc::new(venue))
        }
    }
}
