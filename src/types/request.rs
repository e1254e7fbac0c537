//! Outcome of a single executor call

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use crate::errors::ErrorKind;

/// Result of one `RequestExecutor::execute` call, including every retry it made.
#[derive(Debug, Clone, Serialize)]
pub struct RequestOutcome<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub latency: Duration,
    pub retry_count: u32,
    pub timestamp: DateTime<Utc>,
}

impl<T> RequestOutcome<T> {
    pub fn succeeded(data: T, latency: Duration, retry_count: u32) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_kind: None,
            latency,
            retry_count,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(error: String, kind: ErrorKind, latency: Duration, retry_count: u32) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            error_kind: Some(kind),
            latency,
            retry_count,
            timestamp: Utc::now(),
        }
    }

    pub fn into_result(self) -> Result<T, (ErrorKind, String)> {
        match self.data {
            Some(data) if self.success => Ok(data),
            _ => Err((
                self.error_kind.unwrap_or(ErrorKind::Unknown),
                self.error.unwrap_or_else(|| "no data returned".to_string()),
            )),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> RequestOutcome<U> {
        RequestOutcome {
            success: self.success,
            data: self.data.map(f),
            error: self.error,
            error_kind: self.error_kind,
            latency: self.latency,
            retry_count: self.retry_count,
            timestamp: self.timestamp,
        }
    }
}
