//! Container execution layer.
//!
//! Runs untrusted snippets in short-lived Docker containers through the
//! bollard crate, under fixed resource ceilings and with networking off.
//!
//! # Architecture
//!
//! Every execution owns one container, which moves through:
//! ```text
//! CREATED → STARTED → COMPLETED | TIMED_OUT | ERRORED → REMOVED
//! ```
//!
//! # Example
//!
//! ```ignore
//! use sandbox_engine::config::SandboxConfig;
//! use sandbox_engine::execution::{ContainerType, ExecutionRequest, SandboxManager};
//!
//! let manager = SandboxManager::new(SandboxConfig::default())?;
//!
//! let request = ExecutionRequest::new("python", "print('hello')").with_timeout(10)?;
//! let result = manager.execute(&request, ContainerType::Execution).await;
//! assert_eq!(result.stdout, "hello\n");
//! ```

pub mod container;
pub mod docker_client;
pub mod handle;
pub mod language;
pub mod manager;
pub mod models;
pub mod resources;
pub mod runtime;

pub use container::{ContainerGuard, ContainerPhase};
pub use docker_client::DockerClient;
pub use handle::RuntimeHandle;
pub use language::{build_command, ImageCatalog};
pub use manager::SandboxManager;
pub use models::{
    ContainerDescriptor, ContainerStatus, ExecutionRequest, ExecutionResult, ExecutionTimeout,
    PreviewRequest, PreviewResult, TestExecutionRequest, TestExecutionResult, TestTimeout,
    KILLED_EXIT_CODE,
};
pub use resources::{ContainerType, ResourceLimits, ResourcePolicy};
pub use runtime::{ContainerRuntime, ContainerSpec, LogStream, StatsSnapshot};
