//! Escalation configuration

use crate::DetectorError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Escalation detector configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// Seconds between detection cycles (default: 30)
    pub poll_interval_secs: u64,
    /// Seconds between health rechecks inside one escalation (default: 30)
    pub recheck_delay_secs: u64,
    /// Check cycles before a failure escalates to an alarm (default: 2)
    pub max_retries: u32,
    /// Escalations running at once (default: 5)
    pub concurrency: usize,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            recheck_delay_secs: 30,
            max_retries: 2,
            concurrency: 5,
        }
    }
}

impl EscalationConfig {
    /// Delay between detection cycles
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Delay between rechecks of one container
    pub fn recheck_delay(&self) -> Duration {
        Duration::from_secs(self.recheck_delay_secs)
    }

    /// Check retry budget and pool size
    pub fn validate(&self) -> Result<(), DetectorError> {
        if self.max_retries == 0 {
            return Err(DetectorError::InvalidConfig(
                "max_retries must be at least 1".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(DetectorError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EscalationConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
        assert_eq!(config.recheck_delay(), Duration::from_secs(30));
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.concurrency, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_budgets_rejected() {
        let config = EscalationConfig {
            max_retries: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = EscalationConfig {
            concurrency: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
