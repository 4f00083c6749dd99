//! Units whose terminal alarm was already emitted

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Shared set of escalated units.
///
/// Every operation is a single locked transaction, so concurrent
/// escalation tasks never lose an update.
#[derive(Debug, Clone, Default)]
pub struct ProcessedSet {
    inner: Arc<Mutex<HashSet<String>>>,
}

impl ProcessedSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether `unit` has been alarmed this episode
    pub fn contains(&self, unit: &str) -> bool {
        self.lock().contains(unit)
    }

    /// Mark a unit as escalated.
    ///
    /// Returns `false` if it already was, in which case the caller must not
    /// emit another alarm.
    pub fn mark(&self, unit: &str) -> bool {
        self.lock().insert(unit.to_string())
    }

    /// Re-arm escalation for a unit. Returns whether it was marked.
    pub fn rearm(&self, unit: &str) -> bool {
        let removed = self.lock().remove(unit);
        if removed {
            debug!(service = %unit, "escalation re-armed");
        }
        removed
    }

    /// Keep only units for which `keep` holds; returns the re-armed units.
    pub fn retain(&self, keep: impl Fn(&str) -> bool) -> Vec<String> {
        let mut set = self.lock();
        let rearmed: Vec<String> = set.iter().filter(|u| !keep(u.as_str())).cloned().collect();
        for unit in &rearmed {
            set.remove(unit);
        }
        rearmed
    }

    /// Units currently marked
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no unit is marked
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
