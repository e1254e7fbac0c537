//! Error types, failure classification and crate-level results

pub mod exchange_error;
pub mod classifier;
pub mod mesh_error;

pub use exchange_error::*;
pub use classifier::*;
pub use mesh_error::*;
