//! Exchange Mesh - resilient execution layer over multiple trading venues
//!
//! Every venue call goes through a rate-limited, retrying executor that keeps per-exchange
//! metrics. A health monitor probes venues on a schedule and raises throttled alerts, a
//! selector routes symbols to healthy venues with sticky, damped failover, and an
//! orchestrator fans requests out in parallel for best-price and arbitrage decisions.

pub mod config;
pub mod types;
pub mod errors;
pub mod network;
pub mod exchange;
pub mod health;
pub mod routing;
pub mod arbitrage;
pub mod orchestration;
pub mod context;
pub mod utils;

// Re-export commonly used items
pub use config::Config;
pub use context::MeshContext;
pub use errors::{ErrorKind, ExchangeError, MeshError, MeshResult};
pub use types::*;
