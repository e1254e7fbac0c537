//! Typed configuration, TOML loading and environment overrides

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use crate::{
    errors::{MeshError, MeshResult},
    network::{RateLimitRule, RetryPolicy},
};

// Configuration constants
pub const DEFAULT_PROBE_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SWITCH_COOLDOWN_SECS: u64 = 300;
pub const DEFAULT_ALERT_COOLDOWN_SECS: u64 = 300;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_EXCHANGE_PRIORITY: u32 = 50;
pub const HIGH_ERROR_RATE_MIN_REQUESTS: u64 = 10;
/// Response time at which the latency component of an exchange score reaches zero.
pub const SCORE_RESPONSE_TIME_CEILING: Duration = Duration::from_secs(10);
pub const MAX_ALERT_LOG_SIZE: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeKind {
    Http,
    Simulated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub base_latency_ms: u64,
    pub latency_jitter_ms: u64,
    pub failure_rate: f64,
    pub spread_bps: u32,
    pub mid_prices: HashMap<String, Decimal>,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            base_latency_ms: 50,
            latency_jitter_ms: 25,
            failure_rate: 0.0,
            spread_bps: 10,
            mid_prices: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeConfig {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub kind: ExchangeKind,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Name of the environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub symbols: Vec<String>,
    #[serde(default)]
    pub priority: Option<u32>,
    /// Overrides `Config::default_rate_limits` when non-empty.
    #[serde(default)]
    pub rate_limits: Vec<RateLimitRule>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub simulation: SimulationSettings,
}

impl ExchangeConfig {
    pub fn simulated(name: &str, mid_price: Decimal) -> Self {
        let mut simulation = SimulationSettings::default();
        simulation.mid_prices.insert("BTCUSDT".to_string(), mid_price);
        Self {
            name: name.to_string(),
            enabled: true,
            kind: ExchangeKind::Simulated,
            base_url: None,
            api_key_env: None,
            symbols: Vec::new(),
            priority: None,
            rate_limits: Vec::new(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            simulation,
        }
    }

    pub fn api_key(&self) -> Option<String> {
        self.api_key_env.as_ref().and_then(|var| env::var(var).ok())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthThresholds {
    pub response_time_threshold_ms: u64,
    pub success_rate_threshold: f64,
    pub max_error_count: u64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            response_time_threshold_ms: 5_000,
            success_rate_threshold: 0.95,
            max_error_count: 10,
        }
    }
}

impl HealthThresholds {
    pub fn response_time_threshold(&self) -> Duration {
        Duration::from_millis(self.response_time_threshold_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub interval_secs: u64,
    pub probe_timeout_secs: u64,
    pub alert_cooldown_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_PROBE_INTERVAL_SECS,
            probe_timeout_secs: DEFAULT_PROBE_TIMEOUT_SECS,
            alert_cooldown_secs: DEFAULT_ALERT_COOLDOWN_SECS,
        }
    }
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn alert_cooldown(&self) -> Duration {
        Duration::from_secs(self.alert_cooldown_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub switch_cooldown_secs: u64,
    pub auto_switch: bool,
    pub load_balancing: bool,
    pub default_priority: u32,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            switch_cooldown_secs: DEFAULT_SWITCH_COOLDOWN_SECS,
            auto_switch: true,
            load_balancing: false,
            default_priority: DEFAULT_EXCHANGE_PRIORITY,
        }
    }
}

impl SelectorConfig {
    pub fn switch_cooldown(&self) -> Duration {
        Duration::from_secs(self.switch_cooldown_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub request_timeout_secs: u64,
    pub order_book_depth: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            order_book_depth: 20,
        }
    }
}

impl OrchestratorConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
    /// Rolling log file directory; `None` logs to the console only.
    pub directory: Option<String>,
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            directory: Some("output/logs".to_string()),
            file_prefix: "exchange-mesh.log".to_string(),
        }
    }
}

/// What the binary reports on every report tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub symbols: Vec<String>,
    pub report_interval_secs: u64,
    pub arbitrage_quantity: Decimal,
    pub min_profit_rate: Decimal,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            symbols: vec!["BTCUSDT".to_string()],
            report_interval_secs: 30,
            arbitrage_quantity: dec!(0.1),
            min_profit_rate: dec!(0.001),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub exchanges: Vec<ExchangeConfig>,
    pub retry: RetryPolicy,
    pub default_rate_limits: Vec<RateLimitRule>,
    pub health: HealthThresholds,
    pub monitor: MonitorConfig,
    pub selector: SelectorConfig,
    pub orchestrator: OrchestratorConfig,
    pub logging: LoggingConfig,
    pub watch: WatchConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exchanges: vec![
                ExchangeConfig::simulated("sim-alpha", dec!(50000)),
                ExchangeConfig::simulated("sim-beta", dec!(50040)),
                ExchangeConfig::simulated("sim-gamma", dec!(49980)),
            ],
            retry: RetryPolicy::default(),
            default_rate_limits: vec![
                RateLimitRule::token_bucket(20, 1.0),
                RateLimitRule::sliding_window(1200, 60.0),
            ],
            health: HealthThresholds::default(),
            monitor: MonitorConfig::default(),
            selector: SelectorConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            logging: LoggingConfig::default(),
            watch: WatchConfig::default(),
        }
    }
}

impl Config {
    /// Reads `path` when it exists, otherwise starts from defaults, then applies
    /// environment overrides and validates the result.
    pub fn load(path: impl AsRef<Path>) -> MeshResult<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|source| MeshError::ReadConfig {
                path: path.display().to_string(),
                source,
            })?;
            toml::from_str(&raw).map_err(|source| MeshError::ParseConfig {
                path: path.display().to_string(),
                source,
            })?
        } else {
            Config::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> MeshResult<Self> {
        let config: Config = toml::from_str(raw).map_err(|source| MeshError::ParseConfig {
            path: "<inline>".to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_parse("MESH_PROBE_INTERVAL_SECS") {
            self.monitor.interval_secs = v;
        }
        if let Some(v) = env_parse("MESH_PROBE_TIMEOUT_SECS") {
            self.monitor.probe_timeout_secs = v;
        }
        if let Some(v) = env_parse("MESH_ALERT_COOLDOWN_SECS") {
            self.monitor.alert_cooldown_secs = v;
        }
        if let Some(v) = env_parse("MESH_SWITCH_COOLDOWN_SECS") {
            self.selector.switch_cooldown_secs = v;
        }
        if let Some(v) = env_parse("MESH_MAX_RETRIES") {
            self.retry.max_retries = v;
        }
        if let Ok(level) = env::var("MESH_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(dir) = env::var("MESH_LOG_DIR") {
            self.logging.directory = if dir.is_empty() { None } else { Some(dir) };
        }
    }

    pub fn validate(&self) -> MeshResult<()> {
        let mut seen = HashSet::new();
        for exchange in &self.exchanges {
            if exchange.name.trim().is_empty() {
                return Err(MeshError::config("exchanges.name", "must not be empty"));
            }
            if !seen.insert(exchange.name.as_str()) {
                return Err(MeshError::config(
                    "exchanges.name",
                    format!("duplicate exchange '{}'", exchange.name),
                ));
            }
            if exchange.kind == ExchangeKind::Http && exchange.base_url.is_none() {
                return Err(MeshError::config(
                    "exchanges.base_url",
                    format!("http exchange '{}' needs a base_url", exchange.name),
                ));
            }
            if !(0.0..=1.0).contains(&exchange.simulation.failure_rate) {
                return Err(MeshError::config(
                    "exchanges.simulation.failure_rate",
                    format!("must be within [0, 1] for '{}'", exchange.name),
                ));
            }
            for rule in &exchange.rate_limits {
                rule.validate(&exchange.name)?;
            }
        }
        for rule in &self.default_rate_limits {
            rule.validate("default")?;
        }

        if !(0.0..=1.0).contains(&self.health.success_rate_threshold) {
            return Err(MeshError::config(
                "health.success_rate_threshold",
                format!("must be within [0, 1], got {}", self.health.success_rate_threshold),
            ));
        }
        if self.monitor.interval_secs == 0 {
            return Err(MeshError::config("monitor.interval_secs", "must be positive"));
        }
        if self.monitor.probe_timeout_secs == 0 {
            return Err(MeshError::config("monitor.probe_timeout_secs", "must be positive"));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(MeshError::config("retry.base_delay_ms", "must not exceed max_delay_ms"));
        }
        Ok(())
    }

    /// Rate limit rules in force for `exchange`.
    pub fn rate_limits_for(&self, exchange: &ExchangeConfig) -> Vec<RateLimitRule> {
        if exchange.rate_limits.is_empty() {
            self.default_rate_limits.clone()
        } else {
            exchange.rate_limits.clone()
        }
    }
}

fn env_parse<T: FromStr>(var: &str) -> Option<T> {
    env::var(var).ok().and_then(|s| s.parse().ok())
}

fn default_true() -> bool {
    true
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}
