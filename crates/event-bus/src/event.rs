//! Escalation event wire schema

use serde::{Deserialize, Serialize};

/// A failing service observed by the detector.
///
/// On the wire the escalation flag travels as `status`:
/// `{"service": "web-1", "status": true}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationEvent {
    pub service: String,
    /// `false` for a warning, `true` for the terminal alarm of an episode
    #[serde(rename = "status")]
    pub escalated: bool,
}

impl EscalationEvent {
    /// Create a warning-level event
    pub fn warning(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            escalated: false,
        }
    }

    /// Create an alarm-level event
    pub fn alarm(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            escalated: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_schema_uses_status_field() {
        let json = serde_json::to_value(EscalationEvent::alarm("web-1")).unwrap();
        assert_eq!(json, serde_json::json!({"service": "web-1", "status": true}));

        let event: EscalationEvent =
            serde_json::from_str(r#"{"service":"db","status":false}"#).unwrap();
        assert_eq!(event, EscalationEvent::warning("db"));
    }
}
