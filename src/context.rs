//! Wiring of the execution layer
//!
//! `MeshContext` owns one instance of every component and shares them by `Arc`, so the
//! executor, monitor, selector and orchestrator all see the same registry and metrics.

use std::sync::Arc;
use tracing::info;
use crate::{
    config::{Config, ExchangeConfig},
    errors::MeshResult,
    exchange::{build_adapter, ExchangeRegistry, SharedAdapter},
    health::HealthMonitor,
    network::{MetricsStore, RequestExecutor},
    orchestration::Orchestrator,
    routing::ExchangeSelector,
};

pub struct MeshContext {
    config: Config,
    registry: Arc<ExchangeRegistry>,
    metrics: Arc<MetricsStore>,
    executor: Arc<RequestExecutor>,
    monitor: Arc<HealthMonitor>,
    selector: Arc<ExchangeSelector>,
    orchestrator: Arc<Orchestrator>,
}

impl MeshContext {
    /// Builds adapters for every configured exchange and wires the components.
    pub fn init(config: Config) -> MeshResult<Self> {
        Self::init_with(config, build_adapter)
    }

    /// Like [`init`](Self::init) with a caller-supplied adapter for each configured exchange.
    pub fn init_with<F>(config: Config, mut make_adapter: F) -> MeshResult<Self>
    where
        F: FnMut(&ExchangeConfig) -> MeshResult<SharedAdapter>,
    {
        config.validate()?;

        let mut registry = ExchangeRegistry::new();
        for exchange in &config.exchanges {
            let adapter = make_adapter(exchange)?;
            registry.register(&exchange.name, adapter, exchange.symbols.clone(), exchange.enabled)?;
        }
        let registry = Arc::new(registry);
        let metrics = Arc::new(MetricsStore::new());

        let executor = Arc::new(RequestExecutor::new(
            Arc::clone(&registry),
            Arc::clone(&metrics),
            config.retry.clone(),
        ));
        for exchange in &config.exchanges {
            executor.set_rate_limits(&exchange.name, &config.rate_limits_for(exchange))?;
        }

        let monitor = Arc::new(HealthMonitor::new(
            Arc::clone(&executor),
            config.monitor.clone(),
            config.health.clone(),
        ));

        let selector = Arc::new(ExchangeSelector::new(
            Arc::clone(&registry),
            Arc::clone(&metrics),
            Arc::clone(&monitor),
            &config.selector,
        ));
        for exchange in &config.exchanges {
            if let Some(priority) = exchange.priority {
                selector.set_priority(&exchange.name, priority);
            }
        }

        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&executor),
            Arc::clone(&selector),
            config.orchestrator.clone(),
        ));

        info!(
            "✅ Mesh initialized with {} exchanges ({} enabled)",
            registry.len(),
            registry.enabled_names().len()
        );

        Ok(Self {
            config,
            registry,
            metrics,
            executor,
            monitor,
            selector,
            orchestrator,
        })
    }

    /// Starts background health monitoring.
    pub async fn start(&self) -> MeshResult<()> {
        self.monitor.start().await
    }

    /// Stops background work and waits for it to finish.
    pub async fn shutdown(&self) {
        self.monitor.stop().await;
        info!("Mesh shut down");
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ExchangeRegistry> {
        &self.registry
    }

    pub fn metrics(&self) -> &Arc<MetricsStore> {
        &self.metrics
    }

    pub fn executor(&self) -> &Arc<RequestExecutor> {
        &self.executor
    }

    pub fn monitor(&self) -> &Arc<HealthMonitor> {
        &self.monitor
    }

    pub fn selector(&self) -> &Arc<ExchangeSelector> {
        &self.selector
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }
}
