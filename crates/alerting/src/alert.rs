//! Alert payloads

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status carried in the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Active,
    Cleared,
}

/// Warning-level or alarm-level notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AlertKind {
    Warning,
    Alarm,
}

impl AlertKind {
    /// Map the event `escalated` flag to a kind
    pub fn from_is_alarm(is_alarm: bool) -> Self {
        if is_alarm {
            AlertKind::Alarm
        } else {
            AlertKind::Warning
        }
    }

    /// Whether this is the alarm kind
    pub fn is_alarm(self) -> bool {
        self == AlertKind::Alarm
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertKind::Warning => f.write_str("warning"),
            AlertKind::Alarm => f.write_str("alarm"),
        }
    }
}

/// Alert endpoint a payload is posted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Endpoint {
    /// `POST {base}/alerts`
    Raise,
    /// `POST {base}/clear-alert`
    Clear,
}

impl Endpoint {
    /// Path below the base URL
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Raise => "alerts",
            Endpoint::Clear => "clear-alert",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Alert body as the alerting endpoint expects it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub severity: String,
    pub host: String,
    pub details: String,
    pub is_alarm: bool,
    pub status: AlertStatus,
}

impl Alert {
    /// Alert about a failing service's health check.
    pub fn healthcheck_failed(
        severity: &str,
        host: &str,
        service: &str,
        kind: AlertKind,
        status: AlertStatus,
    ) -> Self {
        Self {
            severity: severity.to_string(),
            host: host.to_string(),
            details: format!("The {service} container healthcheck failed"),
            is_alarm: kind.is_alarm(),
            status,
        }
    }

    /// Kind derived from `is_alarm`
    pub fn kind(&self) -> AlertKind {
        AlertKind::from_is_alarm(self.is_alarm)
    }
}
