//! Alert types

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertLevel {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AlertLevel::Info => "INFO",
            AlertLevel::Warning => "WARNING",
            AlertLevel::Error => "ERROR",
            AlertLevel::Critical => "CRITICAL",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub id: String,
    pub exchange_name: String,
    pub level: AlertLevel,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Alert {
    pub fn new(exchange_name: &str, level: AlertLevel, title: String, message: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            exchange_name: exchange_name.to_string(),
            level,
            title,
            message,
            created_at: Utc::now(),
            resolved: false,
            resolved_at: None,
        }
    }
}

/// Selection criteria for `HealthMonitor::get_alerts`.
#[derive(Debug, Clone, Default)]
pub struct AlertFilter {
    pub exchange_name: Option<String>,
    pub min_level: Option<AlertLevel>,
    pub include_resolved: bool,
}

impl AlertFilter {
    pub fn unresolved() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self {
            include_resolved: true,
            ..Self::default()
        }
    }

    pub fn matches(&self, alert: &Alert) -> bool {
        if alert.resolved && !self.include_resolved {
            return false;
        }
        if let Some(name) = &self.exchange_name {
            if &alert.exchange_name != name {
                return false;
            }
        }
        match self.min_level {
            Some(level) => alert.level >= level,
            None => true,
        }
    }
}
