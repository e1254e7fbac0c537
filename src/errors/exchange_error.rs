//! Failures reported by exchange adapters

use thiserror::Error;

/// Raw failure of a single exchange call.
///
/// Adapters return these; the executor turns them into an [`ErrorKind`](super::ErrorKind)
/// through [`classify`](super::classify). `Connection` and `Io` are transport-level failures,
/// every other variant is classified by its message.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExchangeError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("request timeout: {0}")]
    Timeout(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("{0}")]
    Rejected(String),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("invalid operation for {exchange}: {operation} is not supported")]
    Unsupported { exchange: String, operation: String },

    #[error("{0}")]
    Other(String),
}

impl ExchangeError {
    /// Connection and OS-level failures, as opposed to errors reported by the venue.
    pub fn is_transport(&self) -> bool {
        matches!(self, ExchangeError::Connection(_) | ExchangeError::Io(_))
    }

    /// Builds an HTTP error whose message carries the wording the classifier keys on.
    pub fn from_status(status: u16, body: &str) -> Self {
        let reason = match status {
            429 | 418 => "too many requests",
            401 | 403 => "unauthorized",
            400 | 404 | 422 => "invalid request",
            500..=599 => "server error",
            _ => "unexpected status",
        };
        let message = if body.trim().is_empty() {
            reason.to_string()
        } else {
            format!("{} - {}", reason, body.trim())
        };
        ExchangeError::Http { status, message }
    }

    pub fn unsupported(exchange: &str, operation: &str) -> Self {
        ExchangeError::Unsupported {
            exchange: exchange.to_string(),
            operation: operation.to_string(),
        }
    }
}

impl From<std::io::Error> for ExchangeError {
    fn from(err: std::io::Error) -> Self {
        ExchangeError::Io(err.to_string())
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExchangeError::Timeout(err.to_string())
        } else if err.is_connect() {
            ExchangeError::Connection(err.to_string())
        } else if err.is_decode() {
            ExchangeError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            ExchangeError::from_status(status.as_u16(), "")
        } else {
            ExchangeError::Other(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        ExchangeError::Decode(err.to_string())
    }
}
