//! Alert and retry bookkeeping

use crate::{AlertKind, Endpoint};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Units with an outstanding, delivered, uncleared alert, per kind.
///
/// Only confirmed deliveries change membership.
#[derive(Debug, Clone, Default)]
pub struct AlertLedger {
    warnings: BTreeSet<String>,
    alarms: BTreeSet<String>,
}

impl AlertLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&self, kind: AlertKind) -> &BTreeSet<String> {
        match kind {
            AlertKind::Warning => &self.warnings,
            AlertKind::Alarm => &self.alarms,
        }
    }

    fn set_mut(&mut self, kind: AlertKind) -> &mut BTreeSet<String> {
        match kind {
            AlertKind::Warning => &mut self.warnings,
            AlertKind::Alarm => &mut self.alarms,
        }
    }

    /// Record a delivered raise. Returns `false` if it was already active.
    pub fn record_raised(&mut self, kind: AlertKind, unit: &str) -> bool {
        self.set_mut(kind).insert(unit.to_string())
    }

    /// Record a delivered clear. Clearing an inactive unit is a no-op.
    pub fn record_cleared(&mut self, kind: AlertKind, unit: &str) -> bool {
        self.set_mut(kind).remove(unit)
    }

    /// Whether `unit` has an active alert of this kind
    pub fn is_active(&self, kind: AlertKind, unit: &str) -> bool {
        self.set(kind).contains(unit)
    }

    /// Active units of one kind, in name order
    pub fn active(&self, kind: AlertKind) -> impl Iterator<Item = &str> {
        self.set(kind).iter().map(String::as_str)
    }

    /// Active alerts across both kinds
    pub fn len(&self) -> usize {
        self.warnings.len() + self.alarms.len()
    }

    /// Whether no alert is active
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty() && self.alarms.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
struct RetryEntry {
    attempts: u32,
    exhausted_at: Option<Instant>,
}

/// Failed delivery attempts per `(endpoint, unit)`.
///
/// Raise and clear budgets of the same unit are independent. An exhausted
/// budget stays exhausted for the cooldown, then starts over.
#[derive(Debug, Clone)]
pub struct RetryLedger {
    entries: HashMap<(Endpoint, String), RetryEntry>,
    max_retries: u32,
    cooldown: Duration,
}

impl RetryLedger {
    /// Create a ledger allowing `max_retries` attempts per key
    pub fn new(max_retries: u32, cooldown: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            max_retries,
            cooldown,
        }
    }

    /// Attempts allowed per key
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Failed attempts recorded for the key
    pub fn attempts(&self, endpoint: Endpoint, unit: &str) -> u32 {
        self.entries
            .get(&(endpoint, unit.to_string()))
            .map(|e| e.attempts)
            .unwrap_or(0)
    }

    /// Whether the budget is used up. Drops entries whose cooldown expired.
    pub fn is_exhausted(&mut self, endpoint: Endpoint, unit: &str) -> bool {
        let key = (endpoint, unit.to_string());
        let Some(entry) = self.entries.get(&key) else {
            return false;
        };
        if entry.attempts < self.max_retries {
            return false;
        }
        match entry.exhausted_at {
            Some(at) if at.elapsed() >= self.cooldown => {
                debug!(%endpoint, service = %unit, "retry budget cooldown expired");
                self.entries.remove(&key);
                false
            }
            _ => true,
        }
    }

    /// Count a failed attempt and return the new total, capped at the budget.
    pub fn record_failure(&mut self, endpoint: Endpoint, unit: &str) -> u32 {
        let max = self.max_retries;
        let entry = self
            .entries
            .entry((endpoint, unit.to_string()))
            .or_insert(RetryEntry {
                attempts: 0,
                exhausted_at: None,
            });
        entry.attempts = (entry.attempts + 1).min(max);
        if entry.attempts >= max && entry.exhausted_at.is_none() {
            entry.exhausted_at = Some(Instant::now());
        }
        entry.attempts
    }

    /// Forget the key after a successful delivery.
    pub fn reset(&mut self, endpoint: Endpoint, unit: &str) {
        self.entries.remove(&(endpoint, unit.to_string()));
    }

    /// Keys with recorded failures
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no failures are recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Delay before retry number `attempt` (1-based): `initial * 2^(attempt-1)`.
pub fn backoff_delay(initial: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    initial.saturating_mul(factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_raise_is_deduplicated() {
        let mut ledger = AlertLedger::new();
        assert!(ledger.record_raised(AlertKind::Warning, "web-1"));
        assert!(!ledger.record_raised(AlertKind::Warning, "web-1"));
        assert!(ledger.record_raised(AlertKind::Alarm, "web-1"));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_clearing_inactive_unit_is_noop() {
        let mut ledger = AlertLedger::new();
        assert!(!ledger.record_cleared(AlertKind::Alarm, "ghost"));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_kinds_clear_independently() {
        let mut ledger = AlertLedger::new();
        ledger.record_raised(AlertKind::Warning, "web-1");
        ledger.record_raised(AlertKind::Alarm, "web-1");

        assert!(ledger.record_cleared(AlertKind::Warning, "web-1"));
        assert!(!ledger.is_active(AlertKind::Warning, "web-1"));
        assert!(ledger.is_active(AlertKind::Alarm, "web-1"));
        assert_eq!(ledger.active(AlertKind::Alarm).collect::<Vec<_>>(), vec!["web-1"]);
    }

    #[test]
    fn test_backoff_doubles() {
        let initial = Duration::from_secs(1);
        assert_eq!(backoff_delay(initial, 1), Duration::from_secs(1));
        assert_eq!(backoff_delay(initial, 2), Duration::from_secs(2));
        assert_eq!(backoff_delay(initial, 3), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budgets_are_per_endpoint() {
        let mut retries = RetryLedger::new(3, Duration::from_secs(300));
        for _ in 0..3 {
            retries.record_failure(Endpoint::Raise, "web-1");
        }
        assert!(retries.is_exhausted(Endpoint::Raise, "web-1"));
        assert!(!retries.is_exhausted(Endpoint::Clear, "web-1"));
        assert_eq!(retries.attempts(Endpoint::Clear, "web-1"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_budget_expires_after_cooldown() {
        let mut retries = RetryLedger::new(2, Duration::from_secs(300));
        retries.record_failure(Endpoint::Clear, "web-1");
        retries.record_failure(Endpoint::Clear, "web-1");
        assert!(retries.is_exhausted(Endpoint::Clear, "web-1"));

        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(retries.is_exhausted(Endpoint::Clear, "web-1"));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!retries.is_exhausted(Endpoint::Clear, "web-1"));
        assert_eq!(retries.attempts(Endpoint::Clear, "web-1"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_clears_attempts() {
        let mut retries = RetryLedger::new(3, Duration::from_secs(300));
        retries.record_failure(Endpoint::Raise, "web-1");
        retries.reset(Endpoint::Raise, "web-1");
        assert_eq!(retries.attempts(Endpoint::Raise, "web-1"), 0);
        assert!(retries.is_empty());
    }

    proptest! {
        #[test]
        fn prop_backoff_matches_closed_form(initial_ms in 1u64..5_000, attempt in 1u32..16) {
            let initial = Duration::from_millis(initial_ms);
            let expected = Duration::from_millis(initial_ms * (1u64 << (attempt - 1)));
            prop_assert_eq!(backoff_delay(initial, attempt), expected);
        }

        #[test]
        fn prop_attempts_never_exceed_budget(max in 1u32..8, failures in 0usize..32) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .unwrap();
            runtime.block_on(async {
                let mut retries = RetryLedger::new(max, Duration::from_secs(60));
                for _ in 0..failures {
                    retries.record_failure(Endpoint::Raise, "svc");
                }
                assert!(retries.attempts(Endpoint::Raise, "svc") <= max);
                assert_eq!(
                    retries.is_exhausted(Endpoint::Raise, "svc"),
                    failures as u32 >= max
                );
            });
        }
    }
}
