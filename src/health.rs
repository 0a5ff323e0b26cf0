//! Health reports built from the sandbox manager's probes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::execution::models::ContainerDescriptor;
use crate::execution::SandboxManager;

/// Overall status of the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    /// Database and container runtime are both up.
    Healthy,
    /// Database is up, container runtime is not.
    Degraded,
    /// Database is down.
    Unhealthy,
}

impl OverallStatus {
    pub fn from_components(database_healthy: bool, runtime_healthy: bool) -> Self {
        match (database_healthy, runtime_healthy) {
            (true, true) => OverallStatus::Healthy,
            (true, false) => OverallStatus::Degraded,
            (false, _) => OverallStatus::Unhealthy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    Healthy,
    Unhealthy,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Components {
    pub database: ComponentHealth,
    pub docker: ComponentHealth,
}

/// Status of the system as a whole.
///
/// Database health is owned by the caller and passed in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemHealth {
    pub status: OverallStatus,
    pub timestamp: DateTime<Utc>,
    pub components: Components,
}

impl SystemHealth {
    pub async fn check(manager: &SandboxManager, database_healthy: bool) -> Self {
        let runtime_healthy = manager.is_healthy().await;
        Self::from_parts(database_healthy, runtime_healthy, Utc::now())
    }

    pub fn from_parts(
        database_healthy: bool,
        runtime_healthy: bool,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            status: OverallStatus::from_components(database_healthy, runtime_healthy),
            timestamp,
            components: Components {
                database: ComponentHealth {
                    status: if database_healthy {
                        ComponentStatus::Healthy
                    } else {
                        ComponentStatus::Unhealthy
                    },
                    kind: "postgresql".to_string(),
                },
                docker: ComponentHealth {
                    status: if runtime_healthy {
                        ComponentStatus::Healthy
                    } else {
                        ComponentStatus::Unavailable
                    },
                    kind: "sandbox".to_string(),
                },
            },
        }
    }
}

/// Runtime availability and the containers the engine currently owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerHealth {
    pub timestamp: DateTime<Utc>,
    pub docker_available: bool,
    pub active_containers: usize,
    pub containers: Vec<ContainerDescriptor>,
}

impl ContainerHealth {
    pub async fn check(manager: &SandboxManager) -> Self {
        let containers = manager.list_active().await;
        let docker_available = manager.is_healthy().await;

        Self {
            timestamp: Utc::now(),
            docker_available,
            active_containers: containers.len(),
            containers,
        }
    }
}
