//! Scoped lifecycle of one sandbox container.
//!
//! A `ContainerGuard` owns exactly one container from the moment the daemon
//! creates it. Phases follow this lifecycle:
//!
//! ```text
//! CREATED → STARTED → COMPLETED | TIMED_OUT | ERRORED → REMOVED
//! ```
//!
//! `release` force-removes the container and is the normal way out. If the
//! guard is dropped without being released (an early return, a panic, or the
//! owning future being cancelled) the drop handler schedules the same
//! forced removal on the ambient tokio runtime.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::DockerError;
use crate::execution::runtime::{ContainerRuntime, ContainerSpec, LogStream};
use crate::metrics::MetricsCollector;

/// Lifecycle phase of a guarded container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerPhase {
    Created,
    Started,
    Completed,
    TimedOut,
    Errored,
    Removed,
}

impl std::fmt::Display for ContainerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerPhase::Created => write!(f, "created"),
            ContainerPhase::Started => write!(f, "started"),
            ContainerPhase::Completed => write!(f, "completed"),
            ContainerPhase::TimedOut => write!(f, "timed_out"),
            ContainerPhase::Errored => write!(f, "errored"),
            ContainerPhase::Removed => write!(f, "removed"),
        }
    }
}

/// Exclusive owner of one sandbox container.
pub struct ContainerGuard {
    runtime: Arc<dyn ContainerRuntime>,
    /// `None` once the container has been handed to removal.
    id: Option<String>,
    phase: ContainerPhase,
}

impl ContainerGuard {
    /// Creates the container described by `spec`.
    ///
    /// # Errors
    ///
    /// Returns the daemon error; no container exists in that case.
    pub async fn create(
        runtime: Arc<dyn ContainerRuntime>,
        spec: &ContainerSpec,
    ) -> Result<Self, DockerError> {
        let id = runtime.create(spec).await?;

        tracing::info!(
            container = %short_id(&id),
            image = %spec.image,
            "Created sandbox container"
        );

        Ok(Self {
            runtime,
            id: Some(id),
            phase: ContainerPhase::Created,
        })
    }

    /// Starts the container.
    pub async fn start(&mut self) -> Result<(), DockerError> {
        if self.phase != ContainerPhase::Created {
            return Err(DockerError::Api(format!(
                "Cannot start container in {} phase",
                self.phase
            )));
        }

        match self.runtime.start(self.id()).await {
            Ok(()) => {
                self.phase = ContainerPhase::Started;
                Ok(())
            }
            Err(e) => {
                self.phase = ContainerPhase::Errored;
                Err(e)
            }
        }
    }

    /// Waits for the container to exit. Unbounded; see `kill`.
    pub async fn wait(&mut self) -> Result<i64, DockerError> {
        match self.runtime.wait(self.id()).await {
            Ok(code) => {
                self.phase = ContainerPhase::Completed;
                Ok(code)
            }
            Err(e) => {
                self.phase = ContainerPhase::Errored;
                Err(e)
            }
        }
    }

    /// Kills the container after its deadline passed.
    pub async fn kill(&mut self) -> Result<(), DockerError> {
        self.phase = ContainerPhase::TimedOut;
        self.runtime.kill(self.id()).await
    }

    /// Reads one output stream.
    pub async fn logs(&self, stream: LogStream) -> Result<String, DockerError> {
        self.runtime.logs(self.id(), stream).await
    }

    /// Records that the run failed after the container was created.
    pub fn mark_errored(&mut self) {
        if self.phase != ContainerPhase::TimedOut {
            self.phase = ContainerPhase::Errored;
        }
    }

    /// Force-removes the container.
    ///
    /// Failures are logged at warning level and swallowed: by the time a
    /// container is released its result is already final.
    pub async fn release(mut self) -> ContainerPhase {
        let Some(id) = self.id.take() else {
            return self.phase;
        };

        match self.runtime.remove(&id, true).await {
            Ok(()) => {
                tracing::debug!(container = %short_id(&id), phase = %self.phase, "Removed container");
                MetricsCollector::new().record_removal(true);
            }
            Err(e) => {
                tracing::warn!(container = %short_id(&id), "Failed to remove container: {}", e);
                MetricsCollector::new().record_removal(false);
            }
        }

        self.phase = ContainerPhase::Removed;
        self.phase
    }

    /// Returns the container ID.
    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }

    /// Returns the current phase.
    pub fn phase(&self) -> ContainerPhase {
        self.phase
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };

        let runtime = self.runtime.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                tracing::warn!(
                    container = %short_id(&id),
                    phase = %self.phase,
                    "Container dropped without release, scheduling removal"
                );
                handle.spawn(async move {
                    if let Err(e) = runtime.remove(&id, true).await {
                        tracing::warn!(container = %short_id(&id), "Failed to remove container: {}", e);
                    }
                });
            }
            Err(_) => {
                tracing::error!(
                    container = %short_id(&id),
                    "Container dropped outside a tokio runtime; it will be left for cleanup_all"
                );
            }
        }
    }
}

impl std::fmt::Debug for ContainerGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerGuard")
            .field("id", &self.id)
            .field("phase", &self.phase)
            .finish()
    }
}

/// First 12 characters of a container ID, as the docker CLI prints them.
pub fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}
