//! sandbox-engine: run untrusted code snippets in isolated containers.
//!
//! This library provides the container lifecycle, resource policy, metrics
//! and cleanup needed to execute short programs under fixed limits with
//! networking disabled.

pub mod cli;
pub mod config;
pub mod error;
pub mod execution;
pub mod health;
pub mod metrics;
pub mod skill;

// Re-export commonly used types
pub use config::SandboxConfig;
pub use error::{ConfigError, DockerError, RequestError};
pub use execution::{ContainerType, ExecutionRequest, ExecutionResult, SandboxManager};
