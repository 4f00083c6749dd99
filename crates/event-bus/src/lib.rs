//! Escalation Event Bus
//!
//! The only coupling between the escalation detector and the alert
//! dispatcher: a bounded multi-producer, single-consumer FIFO of
//! [`EscalationEvent`]s, plus the shutdown signal both loops observe.

mod channel;
mod event;
mod shutdown;

pub use channel::{channel, EventReceiver, EventSender, OverflowPolicy};
pub use event::EscalationEvent;
pub use shutdown::{Shutdown, ShutdownTrigger};

use thiserror::Error;

/// Default channel capacity
pub const DEFAULT_CAPACITY: usize = 1024;

/// Event channel errors
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The receiving side is gone; the event is handed back
    #[error("Event channel closed, dropping event for {}", .0.service)]
    Closed(EscalationEvent),

    /// Shutdown was requested while waiting for capacity
    #[error("Shutdown requested while waiting for channel capacity")]
    Shutdown,
}
