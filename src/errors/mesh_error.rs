//! Crate-level error types for configuration and lifecycle failures

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MeshError {
    #[error("Invalid configuration: {field} - {reason}")]
    Config {
        field: String,
        reason: String,
    },

    #[error("Failed to read config file {path}")]
    ReadConfig {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}")]
    ParseConfig {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Unknown exchange: {0}")]
    UnknownExchange(String),

    #[error("Invalid rate limit rule for {exchange}: {reason}")]
    InvalidRule {
        exchange: String,
        reason: String,
    },

    #[error("Failed to build HTTP client for {exchange}")]
    ClientBuild {
        exchange: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Health monitor is already running")]
    AlreadyRunning,
}

impl MeshError {
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        MeshError::Config {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub type MeshResult<T> = Result<T, MeshError>;
