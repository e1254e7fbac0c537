//! Multi-exchange fan-out, best execution and arbitrage scanning

pub mod orchestrator;

pub use orchestrator::*;
