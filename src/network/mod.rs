//! Request execution: admission control, retries and per-exchange metrics

pub mod rate_limit;
pub mod retry;
pub mod metrics;
pub mod executor;

pub use rate_limit::*;
pub use retry::*;
pub use metrics::*;
pub use executor::*;
