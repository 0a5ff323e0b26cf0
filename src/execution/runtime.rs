//! The container runtime seam.
//!
//! `ContainerRuntime` is the set of daemon operations the engine consumes.
//! `DockerClient` implements it over bollard; tests substitute an in-memory
//! runtime.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DockerError;
use crate::execution::models::ContainerDescriptor;
use crate::execution::resources::ResourceLimits;

/// Everything needed to create one sandbox container.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    /// Argument vector run directly, without a shell.
    pub cmd: Vec<String>,
    /// Environment in `KEY=VALUE` form.
    pub env: Vec<String>,
    pub labels: HashMap<String, String>,
    pub limits: ResourceLimits,
    pub network_disabled: bool,
}

/// Which output stream to read from a container's logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

/// Cumulative CPU counters at one sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuCounters {
    /// Total CPU time consumed by the container, in nanoseconds.
    pub total_usage: u64,
    /// Total CPU time of the host, in nanoseconds.
    pub system_usage: Option<u64>,
}

/// Cumulative byte counters of one virtual network interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkCounters {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

/// One block I/O service-bytes entry (`op` is e.g. `Read`, `Write`, `Total`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockIoEntry {
    pub op: String,
    pub value: u64,
}

/// A single non-streaming statistics sample.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsSnapshot {
    pub cpu: CpuCounters,
    /// Counters from the previous sample.
    pub precpu: CpuCounters,
    pub memory_usage_bytes: Option<u64>,
    pub networks: HashMap<String, NetworkCounters>,
    pub block_io: Vec<BlockIoEntry>,
    pub started_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
}

/// Operations the engine needs from a container daemon.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Create a container. Returns its ID.
    async fn create(&self, spec: &ContainerSpec) -> Result<String, DockerError>;

    async fn start(&self, id: &str) -> Result<(), DockerError>;

    /// Block until the container stops. Returns its exit code.
    ///
    /// Unbounded; callers impose their own deadline.
    async fn wait(&self, id: &str) -> Result<i64, DockerError>;

    /// Send SIGKILL.
    async fn kill(&self, id: &str) -> Result<(), DockerError>;

    /// Graceful stop (SIGTERM, then SIGKILL after a grace period).
    async fn stop(&self, id: &str) -> Result<(), DockerError>;

    async fn logs(&self, id: &str, stream: LogStream) -> Result<String, DockerError>;

    async fn remove(&self, id: &str, force: bool) -> Result<(), DockerError>;

    /// All containers, running or not, carrying `label` (`key=value` or `key`).
    async fn list_by_label(&self, label: &str) -> Result<Vec<ContainerDescriptor>, DockerError>;

    /// One statistics sample, including the previous CPU sample.
    async fn stats(&self, id: &str) -> Result<StatsSnapshot, DockerError>;

    async fn ping(&self) -> Result<(), DockerError>;
}
