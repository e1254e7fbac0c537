//! Cross-exchange arbitrage detection

pub mod calculator;

pub use calculator::*;
