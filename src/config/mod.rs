//! Configuration management for the execution layer

pub mod settings;

pub use settings::*;
