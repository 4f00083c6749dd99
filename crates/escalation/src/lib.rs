//! Escalation Detector
//!
//! Polls container health and decides when a failing service becomes
//! alert-worthy:
//! - one [`Escalation`] state machine per unhealthy container and episode
//! - bounded worker pool for concurrent escalations
//! - [`ProcessedSet`] so an episode raises its alarm only once

mod config;
mod detector;
mod machine;
mod processed;

pub use config::EscalationConfig;
pub use detector::{CycleReport, Detector};
pub use machine::{Escalation, EscalationState, Step};
pub use processed::ProcessedSet;

use container_runtime::RuntimeError;
use thiserror::Error;

/// Detector errors
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Container runtime query failed: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("Invalid escalation config: {0}")]
    InvalidConfig(String),
}
