//! Exchange selection and failover routing

pub mod selector;

pub use selector::*;
