//! Core data types and structures

pub mod market;
pub mod request;
pub mod health;
pub mod alerts;
pub mod arbitrage;
pub mod orchestration;

pub use market::*;
pub use request::*;
pub use health::*;
pub use alerts::*;
pub use arbitrage::*;
pub use orchestration::*;
