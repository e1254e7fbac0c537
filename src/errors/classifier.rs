//! Failure classification

use serde::{Deserialize, Serialize};
use std::fmt;
use super::ExchangeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Network,
    Timeout,
    RateLimit,
    Auth,
    Validation,
    Api,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Network => "NETWORK",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::RateLimit => "RATE_LIMIT",
            ErrorKind::Auth => "AUTH",
            ErrorKind::Validation => "VALIDATION",
            ErrorKind::Api => "API",
            ErrorKind::Unknown => "UNKNOWN",
        }
    }

    /// Kinds the default retry policy recovers from.
    pub fn default_retryable() -> Vec<ErrorKind> {
        vec![
            ErrorKind::Network,
            ErrorKind::Api,
            ErrorKind::RateLimit,
            ErrorKind::Timeout,
        ]
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps an adapter failure onto the fixed error taxonomy. First match wins.
pub fn classify(error: &ExchangeError) -> ErrorKind {
    if error.is_transport() {
        return ErrorKind::Network;
    }
    classify_message(&error.to_string())
}

pub fn classify_message(message: &str) -> ErrorKind {
    let msg = message.to_lowercase();

    if msg.contains("timeout") {
        ErrorKind::Timeout
    } else if msg.contains("rate limit") || msg.contains("too many requests") {
        ErrorKind::RateLimit
    } else if msg.contains("unauthorized") || msg.contains("authentication") {
        ErrorKind::Auth
    } else if msg.contains("invalid") || msg.contains("validation") {
        ErrorKind::Validation
    } else if msg.contains("api") || msg.contains("server") {
        ErrorKind::Api
    } else {
        ErrorKind::Unknown
    }
}
