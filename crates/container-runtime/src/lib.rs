//! Container Runtime Queries
//!
//! Reports container identity and health-check state. The detector and the
//! dispatcher depend only on the [`ContainerRuntime`] trait:
//! - [`DockerRuntime`] talks to the Docker Engine API over its unix socket
//! - [`InMemoryRuntime`] keeps a mutable fleet table for tests and dry runs

mod container;
mod docker;
mod error;
mod memory;

pub use container::{ContainerRef, HealthStatus};
pub use docker::{DockerConfig, DockerRuntime, DEFAULT_SOCKET};
pub use error::RuntimeError;
pub use memory::InMemoryRuntime;

use async_trait::async_trait;
use std::collections::HashSet;

/// Read-only view of the container fleet.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Containers whose health check currently fails
    async fn list_unhealthy(&self) -> Result<Vec<ContainerRef>, RuntimeError>;

    /// Containers whose health check currently passes
    async fn list_healthy(&self) -> Result<Vec<ContainerRef>, RuntimeError>;

    /// Every container the runtime currently knows about
    async fn list_all(&self) -> Result<Vec<ContainerRef>, RuntimeError>;

    /// Health of a single container, looked up by name.
    ///
    /// Returns [`HealthStatus::Absent`] when no container carries the name.
    async fn health_of(&self, name: &str) -> Result<HealthStatus, RuntimeError> {
        let health = self
            .list_all()
            .await?
            .into_iter()
            .find(|c| c.name == name)
            .map(|c| c.health)
            .unwrap_or(HealthStatus::Absent);
        Ok(health)
    }
}

/// Collect the names of a container listing.
pub fn names(containers: &[ContainerRef]) -> HashSet<String> {
    containers.iter().map(|c| c.name.clone()).collect()
}
