//! Per-container escalation state machine
//!
//! One machine covers one unhealthy episode. It is advanced by discrete
//! health observations and never sleeps itself; the detector owns timing.
//!
//! ```text
//! Unknown ──unhealthy──▶ Warned(1) ──unhealthy──▶ … ──(last cycle)──▶ Alarmed
//!    │                      │
//!    └──healthy──▶ Recovered ◀┘       (escalated elsewhere ▶ Suppressed)
//! ```
//!
//! Health only matters on warning cycles; the last cycle alarms regardless.

use event_bus::EscalationEvent;

/// Where an escalation currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationState {
    /// Nothing observed yet
    Unknown,
    /// Warning emitted on the given check cycle
    Warned(u32),
    /// Terminal alarm emitted
    Alarmed,
    /// Container passed its health check; escalation abandoned
    Recovered,
    /// Another escalation already alarmed this episode
    Suppressed,
}

/// Outcome of one tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Emit this warning, then recheck after the recheck delay
    Warn(EscalationEvent),
    /// Emit this alarm and mark the unit processed
    Alarm(EscalationEvent),
    /// Stop without emitting
    Stop,
}

/// Escalation of one container through a bounded number of check cycles
#[derive(Debug, Clone)]
pub struct Escalation {
    service: String,
    max_retries: u32,
    /// Check cycle the next tick evaluates, starting at 1
    retry: u32,
    state: EscalationState,
}

impl Escalation {
    /// Create an escalation allowing `max_retries` check cycles (at least one)
    pub fn new(service: impl Into<String>, max_retries: u32) -> Self {
        Self {
            service: service.into(),
            max_retries: max_retries.max(1),
            retry: 1,
            state: EscalationState::Unknown,
        }
    }

    /// Whether the next tick is the alarm cycle.
    ///
    /// `healthy` is ignored on that tick, so callers may skip the query.
    pub fn alarm_due(&self) -> bool {
        self.retry >= self.max_retries
    }

    /// Advance by one check cycle.
    ///
    /// Cycles `1..max_retries` warn unless the container recovered; cycle
    /// `max_retries` alarms without looking at `healthy`. An alarm raised
    /// elsewhere ends the escalation silently.
    pub fn tick(&mut self, healthy: bool, already_escalated: bool) -> Step {
        if self.is_finished() {
            return Step::Stop;
        }
        if already_escalated {
            self.state = EscalationState::Suppressed;
            return Step::Stop;
        }

        if self.alarm_due() {
            self.state = EscalationState::Alarmed;
            return Step::Alarm(EscalationEvent::alarm(self.service.clone()));
        }
        if healthy {
            self.state = EscalationState::Recovered;
            return Step::Stop;
        }

        self.state = EscalationState::Warned(self.retry);
        self.retry += 1;
        Step::Warn(EscalationEvent::warning(self.service.clone()))
    }

    /// The alarm lost the race to another escalation of the same unit.
    pub fn suppress(&mut self) {
        self.state = EscalationState::Suppressed;
    }

    /// Current state
    pub fn state(&self) -> EscalationState {
        self.state
    }

    /// Container name this escalation watches
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Alarmed, recovered, or suppressed
    pub fn is_finished(&self) -> bool {
        matches!(
            self.state,
            EscalationState::Alarmed | EscalationState::Recovered | EscalationState::Suppressed
        )
    }
}
