//! Container identity and health

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Health-check state reported for a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    /// No health check configured, or the check is still starting
    Unknown,
    /// The container no longer exists
    Absent,
}

impl HealthStatus {
    /// Parse the health suffix Docker appends to a container status line,
    /// e.g. `"Up 3 minutes (unhealthy)"`.
    pub fn from_status_line(status: &str) -> Self {
        if status.ends_with("(healthy)") {
            HealthStatus::Healthy
        } else if status.ends_with("(unhealthy)") {
            HealthStatus::Unhealthy
        } else {
            HealthStatus::Unknown
        }
    }

    /// Whether the health check passes
    pub fn is_healthy(self) -> bool {
        self == HealthStatus::Healthy
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::Unknown => "unknown",
            HealthStatus::Absent => "absent",
        };
        f.write_str(s)
    }
}

/// Reference to a container as reported by the runtime.
///
/// Two references are equal when they carry the same name, whatever their
/// id or health: a recreated container keeps its alert history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerRef {
    pub id: String,
    pub name: String,
    pub health: HealthStatus,
}

impl ContainerRef {
    /// Create a reference whose id is its name
    pub fn new(name: impl Into<String>, health: HealthStatus) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            health,
        }
    }
}

impl PartialEq for ContainerRef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ContainerRef {}

impl Hash for ContainerRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}
