//! Alerting System
//!
//! Turns escalation events into alert notifications:
//! - deduplication by unit and alert kind
//! - bounded, exponentially backed-off delivery retries
//! - reconciliation of raised alerts against live container health

mod alert;
mod config;
mod dispatcher;
mod ledger;
mod transport;

pub use alert::{Alert, AlertKind, AlertStatus, Endpoint};
pub use config::DispatcherConfig;
pub use dispatcher::{DeadLetter, Delivery, Dispatcher};
pub use ledger::{backoff_delay, AlertLedger, RetryLedger};
pub use transport::{AlertTransport, HttpTransport, RecordingTransport, TransportError};

use container_runtime::RuntimeError;
use thiserror::Error;

/// Dispatcher errors
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Container runtime query failed: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("Alert transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Invalid dispatcher config: {0}")]
    InvalidConfig(String),
}
