//! Resource limits for sandbox containers.
//!
//! Every workload class maps to one fixed row of ceilings. The table is
//! policy, not input: callers pick a `ContainerType`, never the numbers.

use serde::{Deserialize, Serialize};

/// CPU scheduling period shared by every class, in microseconds.
pub const CPU_PERIOD: i64 = 100_000;

/// Workload class of a sandbox container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContainerType {
    /// Run code snippets.
    #[default]
    Execution,
    /// Run a project's test suite.
    TestRunner,
    /// Serve an application for preview.
    Preview,
}

impl ContainerType {
    /// Label value used for discovery.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerType::Execution => "execution",
            ContainerType::TestRunner => "test_runner",
            ContainerType::Preview => "preview",
        }
    }
}

impl std::fmt::Display for ContainerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContainerType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "execution" => Ok(ContainerType::Execution),
            "test_runner" => Ok(ContainerType::TestRunner),
            "preview" => Ok(ContainerType::Preview),
            other => Err(format!(
                "unknown container type '{other}' (expected execution, test_runner or preview)"
            )),
        }
    }
}

/// Resource ceilings applied to one container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Memory limit in megabytes.
    pub memory_mb: u64,
    /// CPU period in microseconds.
    pub cpu_period: i64,
    /// CPU quota in microseconds per period.
    pub cpu_quota: i64,
    /// Maximum number of processes allowed.
    pub pids_limit: i64,
}

impl ResourceLimits {
    /// Creates limits for `cpus` whole CPUs at the shared period.
    pub const fn new(memory_mb: u64, cpus: i64, pids_limit: i64) -> Self {
        Self {
            memory_mb,
            cpu_period: CPU_PERIOD,
            cpu_quota: CPU_PERIOD * cpus,
            pids_limit,
        }
    }

    /// Returns memory limit in bytes.
    pub fn memory_bytes(&self) -> i64 {
        (self.memory_mb * 1024 * 1024) as i64
    }

    /// Returns the number of CPUs the quota buys.
    pub fn cpu_equivalent(&self) -> f64 {
        self.cpu_quota as f64 / self.cpu_period as f64
    }
}

/// Static mapping from workload class to resource ceilings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePolicy {
    pub execution: ResourceLimits,
    pub test_runner: ResourceLimits,
    pub preview: ResourceLimits,
}

impl Default for ResourcePolicy {
    fn default() -> Self {
        Self {
            execution: ResourceLimits::new(512, 1, 100),
            test_runner: ResourceLimits::new(2048, 2, 200),
            preview: ResourceLimits::new(1024, 1, 150),
        }
    }
}

impl ResourcePolicy {
    /// Get the limits row for a workload class.
    pub fn limits_for(&self, container_type: ContainerType) -> ResourceLimits {
        match container_type {
            ContainerType::Execution => self.execution,
            ContainerType::TestRunner => self.test_runner,
            ContainerType::Preview => self.preview,
        }
    }
}
