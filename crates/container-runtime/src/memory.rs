//! In-memory container runtime

use crate::{ContainerRef, ContainerRuntime, HealthStatus, RuntimeError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

/// Fleet table that tests and dry runs mutate directly.
///
/// Listings are ordered by container name.
#[derive(Debug, Default)]
pub struct InMemoryRuntime {
    containers: Mutex<BTreeMap<String, HealthStatus>>,
    /// Number of upcoming queries that fail
    failures: Mutex<u32>,
}

impl InMemoryRuntime {
    /// Create an empty fleet
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a runtime from `(name, health)` pairs.
    pub fn with_containers<'a>(containers: impl IntoIterator<Item = (&'a str, HealthStatus)>) -> Self {
        let runtime = Self::new();
        for (name, health) in containers {
            runtime.set_health(name, health);
        }
        runtime
    }

    /// Create or update a container.
    pub fn set_health(&self, name: &str, health: HealthStatus) {
        let mut containers = self.containers.lock().unwrap_or_else(PoisonError::into_inner);
        if health == HealthStatus::Absent {
            containers.remove(name);
        } else {
            containers.insert(name.to_string(), health);
        }
    }

    /// Remove a container from the fleet.
    pub fn remove(&self, name: &str) {
        self.set_health(name, HealthStatus::Absent);
    }

    /// Make the next `count` queries fail with [`RuntimeError::Unavailable`].
    pub fn fail_next(&self, count: u32) {
        *self.failures.lock().unwrap_or_else(PoisonError::into_inner) = count;
    }

    fn check_failure(&self) -> Result<(), RuntimeError> {
        let mut failures = self.failures.lock().unwrap_or_else(PoisonError::into_inner);
        if *failures > 0 {
            *failures -= 1;
            return Err(RuntimeError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }

    fn filtered(&self, keep: impl Fn(HealthStatus) -> bool) -> Result<Vec<ContainerRef>, RuntimeError> {
        self.check_failure()?;
        let containers = self.containers.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(containers
            .iter()
            .filter(|(_, health)| keep(**health))
            .map(|(name, health)| ContainerRef::new(name.clone(), *health))
            .collect())
    }
}

#[async_trait]
impl ContainerRuntime for InMemoryRuntime {
    async fn list_unhealthy(&self) -> Result<Vec<ContainerRef>, RuntimeError> {
        self.filtered(|h| h == HealthStatus::Unhealthy)
    }

    async fn list_healthy(&self) -> Result<Vec<ContainerRef>, RuntimeError> {
        self.filtered(|h| h == HealthStatus::Healthy)
    }

    async fn list_all(&self) -> Result<Vec<ContainerRef>, RuntimeError> {
        self.filtered(|_| true)
    }
}
