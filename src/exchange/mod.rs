//! Exchange adapter boundary: the trait venues implement, the operations the core can issue,
//! and the registry of configured venues

pub mod adapter;
pub mod operation;
pub mod registry;
pub mod http;
pub mod simulated;
pub mod factory;

pub use adapter::*;
pub use operation::*;
pub use registry::*;
pub use http::*;
pub use simulated::*;
pub use factory::*;
