//! Registry of configured exchanges, in configuration order

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;
use super::SharedAdapter;
use crate::errors::{MeshError, MeshResult};

pub struct ExchangeEntry {
    pub name: String,
    pub adapter: SharedAdapter,
    /// Symbols the venue lists; empty means every symbol is accepted.
    pub symbols: Vec<String>,
    enabled: AtomicBool,
}

impl ExchangeEntry {
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn supports(&self, symbol: &str) -> bool {
        self.symbols.is_empty() || self.symbols.iter().any(|s| s.eq_ignore_ascii_case(symbol))
    }
}

#[derive(Default)]
pub struct ExchangeRegistry {
    entries: Vec<Arc<ExchangeEntry>>,
}

impl ExchangeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: &str,
        adapter: SharedAdapter,
        symbols: Vec<String>,
        enabled: bool,
    ) -> MeshResult<()> {
        if self.entry(name).is_some() {
            return Err(MeshError::config("exchanges", format!("duplicate exchange name '{}'", name)));
        }
        self.entries.push(Arc::new(ExchangeEntry {
            name: name.to_string(),
            adapter,
            symbols,
            enabled: AtomicBool::new(enabled),
        }));
        Ok(())
    }

    pub fn entry(&self, name: &str) -> Option<&Arc<ExchangeEntry>> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn adapter(&self, name: &str) -> Option<SharedAdapter> {
        self.entry(name).map(|e| e.adapter.clone())
    }

    pub fn entries(&self) -> &[Arc<ExchangeEntry>] {
        &self.entries
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    pub fn enabled(&self) -> impl Iterator<Item = &Arc<ExchangeEntry>> {
        self.entries.iter().filter(|e| e.is_enabled())
    }

    pub fn enabled_names(&self) -> Vec<String> {
        self.enabled().map(|e| e.name.clone()).collect()
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.entry(name).is_some_and(|e| e.is_enabled())
    }

    pub fn set_enabled(&self, name: &str, enabled: bool) -> MeshResult<()> {
        let entry = self
            .entry(name)
            .ok_or_else(|| MeshError::UnknownExchange(name.to_string()))?;
        entry.enabled.store(enabled, Ordering::Release);
        info!(exchange = name, enabled, "Exchange availability changed");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::{SimulatedExchange, SimulationConfig};

    fn sim(name: &str) -> SharedAdapter {
        Arc::new(SimulatedExchange::new(name, SimulationConfig::default()))
    }

    #[test]
    fn keeps_registration_order_and_rejects_duplicates() {
        let mut registry = ExchangeRegistry::new();
        registry.register("okx", sim("okx"), vec![], true).unwrap();
        registry.register("binance", sim("binance"), vec![], true).unwrap();
        assert!(registry.register("okx", sim("okx"), vec![], true).is_err());
        assert_eq!(registry.names(), vec!["okx".to_string(), "binance".to_string()]);
    }

    #[test]
    fn toggling_enabled_filters_names() {
        let mut registry = ExchangeRegistry::new();
        registry.register("a", sim("a"), vec![], true).unwrap();
        registry.register("b", sim("b"), vec!["BTCUSDT".to_string()], true).unwrap();
        registry.set_enabled("a", false).unwrap();

        assert_eq!(registry.enabled_names(), vec!["b".to_string()]);
        assert!(registry.entry("b").unwrap().supports("btcusdt"));
        assert!(!registry.entry("b").unwrap().supports("ETHUSDT"));
        assert!(registry.set_enabled("missing", true).is_err());
    }
}
