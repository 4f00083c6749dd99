//! Dispatcher configuration

use crate::DispatchError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Alert dispatcher configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Base URL of the alerting endpoint
    pub base_url: String,
    /// Seconds to wait for an event before reconciling anyway (default: 10)
    pub poll_interval_secs: u64,
    /// Delivery attempts per endpoint and unit (default: 3)
    pub max_retries: u32,
    /// First backoff delay; doubles after each failed attempt (default: 1000)
    pub initial_backoff_ms: u64,
    /// Seconds an exhausted retry budget stays exhausted (default: 300)
    pub retry_cooldown_secs: u64,
    /// HTTP request timeout (default: 10)
    pub request_timeout_secs: u64,
    /// Severity field of every alert
    pub severity: String,
    /// Host field of every alert
    pub host: String,
    /// Undeliverable alerts kept for inspection (default: 100)
    pub dead_letter_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            poll_interval_secs: 10,
            max_retries: 3,
            initial_backoff_ms: 1000,
            retry_cooldown_secs: 300,
            request_timeout_secs: 10,
            severity: "medium".to_string(),
            host: "localhost".to_string(),
            dead_letter_capacity: 100,
        }
    }
}

impl DispatcherConfig {
    /// Dispatcher wake-up interval
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Delay before the first retry
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    /// How long an exhausted budget stays exhausted
    pub fn retry_cooldown(&self) -> Duration {
        Duration::from_secs(self.retry_cooldown_secs)
    }

    /// Per-request HTTP timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Check retry budget and base URL
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.max_retries == 0 {
            return Err(DispatchError::InvalidConfig(
                "max_retries must be at least 1".to_string(),
            ));
        }
        let url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| DispatchError::InvalidConfig(format!("base_url {}: {e}", self.base_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(DispatchError::InvalidConfig(format!(
                "base_url must be http(s), got {}",
                url.scheme()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DispatcherConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_backoff(), Duration::from_secs(1));
        assert_eq!(config.poll_interval(), Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let config = DispatcherConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = DispatcherConfig {
            base_url: "ftp://alerts.local".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_retry_budget_rejected() {
        let config = DispatcherConfig {
            max_retries: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(DispatchError::InvalidConfig(_))));
    }
}
