//! Exchange health monitoring and alerting

pub mod status;
pub mod alerts;
pub mod monitor;

pub use status::*;
pub use alerts::*;
pub use monitor::*;
