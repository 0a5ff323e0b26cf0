//! Request and result types for sandbox workloads.
//!
//! Requests are built once per call and never persisted. Results are the
//! only thing a caller of the engine ever sees: infrastructure failures and
//! failures of the user's code share the same shape and differ only in the
//! `error` text.

use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroU16;

use serde::{Deserialize, Serialize};

use crate::error::RequestError;

/// Exit code reported when a container is killed after its timeout.
pub const KILLED_EXIT_CODE: i64 = 137;

/// A timeout in whole seconds, bounded to `[1, MAX]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct BoundedSeconds<const DEFAULT: u64, const MAX_SECS: u64>(u64);

/// Timeout of a code execution: default 30 s, at most 300 s.
pub type ExecutionTimeout = BoundedSeconds<30, 300>;

/// Timeout of a test run: default 300 s, at most 1800 s.
pub type TestTimeout = BoundedSeconds<300, 1800>;

impl<const DEFAULT: u64, const MAX_SECS: u64> BoundedSeconds<DEFAULT, MAX_SECS> {
    pub const MIN: u64 = 1;
    pub const MAX: u64 = MAX_SECS;

    pub fn new(seconds: u64) -> Result<Self, RequestError> {
        if (Self::MIN..=Self::MAX).contains(&seconds) {
            Ok(Self(seconds))
        } else {
            Err(RequestError::TimeoutOutOfRange {
                value: seconds,
                min: Self::MIN,
                max: Self::MAX,
            })
        }
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    pub fn as_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.0)
    }
}

impl<const DEFAULT: u64, const MAX_SECS: u64> Default for BoundedSeconds<DEFAULT, MAX_SECS> {
    fn default() -> Self {
        Self(DEFAULT)
    }
}

impl<const DEFAULT: u64, const MAX_SECS: u64> TryFrom<u64> for BoundedSeconds<DEFAULT, MAX_SECS> {
    type Error = RequestError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl<const DEFAULT: u64, const MAX_SECS: u64> From<BoundedSeconds<DEFAULT, MAX_SECS>> for u64 {
    fn from(value: BoundedSeconds<DEFAULT, MAX_SECS>) -> Self {
        value.0
    }
}

/// Request to execute code in a sandbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Language tag (python, javascript, typescript).
    pub language: String,
    /// Source code to evaluate.
    pub code: String,
    /// Files the snippet refers to. Carried for callers; never mounted.
    #[serde(default)]
    pub context_files: Vec<String>,
    /// Environment variables set inside the container.
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    #[serde(default, rename = "timeout_seconds")]
    pub timeout: ExecutionTimeout,
}

impl ExecutionRequest {
    /// Creates a request with no context files, no environment and the
    /// default 30 second timeout.
    pub fn new(language: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            code: code.into(),
            context_files: Vec::new(),
            environment: BTreeMap::new(),
            timeout: ExecutionTimeout::default(),
        }
    }

    /// Sets the timeout in seconds.
    ///
    /// # Errors
    ///
    /// Returns `RequestError::TimeoutOutOfRange` outside `[1, 300]`.
    pub fn with_timeout(mut self, seconds: u64) -> Result<Self, RequestError> {
        self.timeout = ExecutionTimeout::new(seconds)?;
        Ok(self)
    }

    /// Adds an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    /// Sets the context file list.
    pub fn with_context_files(mut self, files: Vec<String>) -> Self {
        self.context_files = files;
        self
    }

    /// Environment in `KEY=VALUE` form.
    pub fn env_entries(&self) -> Vec<String> {
        self.environment
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect()
    }
}

/// Result of code execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Exit code (0 = success, 137 = killed on timeout).
    pub exit_code: i64,
    pub stdout: String,
    pub stderr: String,
    /// Wall time in milliseconds.
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_used_mb: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    /// A completed run with the exit code the process reported.
    pub fn completed(exit_code: i64, stdout: String, stderr: String, duration_ms: u64) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
            duration_ms,
            memory_used_mb: None,
            error: None,
        }
    }

    /// A run that never produced process output.
    pub fn failure(error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            exit_code: 1,
            stdout: String::new(),
            stderr: String::new(),
            duration_ms,
            memory_used_mb: None,
            error: Some(error.into()),
        }
    }

    /// Check if execution was successful.
    pub fn is_success(&self) -> bool {
        self.exit_code == 0 && self.error.is_none()
    }

    pub fn is_timeout(&self) -> bool {
        self.exit_code == KILLED_EXIT_CODE && self.error.is_some()
    }
}

/// Request to run tests in a sandbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestExecutionRequest {
    pub project_path: String,
    pub test_command: String,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    #[serde(default, rename = "timeout_seconds")]
    pub timeout: TestTimeout,
}

impl TestExecutionRequest {
    pub fn new(project_path: impl Into<String>, test_command: impl Into<String>) -> Self {
        Self {
            project_path: project_path.into(),
            test_command: test_command.into(),
            environment: BTreeMap::new(),
            timeout: TestTimeout::default(),
        }
    }
}

/// Result of a test run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestExecutionResult {
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
    pub output: String,
    pub duration_ms: u64,
    #[serde(default)]
    pub failures: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestExecutionResult {
    /// Test runs need the project directory mounted, which is not supported yet.
    pub fn not_implemented() -> Self {
        Self {
            passed: 0,
            failed: 0,
            skipped: 0,
            output: String::new(),
            duration_ms: 0,
            failures: Vec::new(),
            coverage: None,
            error: Some(
                "Test execution requires project directory mounting (not yet implemented)"
                    .to_string(),
            ),
        }
    }
}

fn default_preview_port() -> NonZeroU16 {
    NonZeroU16::new(3000).unwrap_or(NonZeroU16::MIN)
}

/// Request to start a preview container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewRequest {
    pub project_path: String,
    pub command: String,
    #[serde(default = "default_preview_port")]
    pub port: NonZeroU16,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

impl PreviewRequest {
    pub fn new(project_path: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            project_path: project_path.into(),
            command: command.into(),
            port: default_preview_port(),
            environment: BTreeMap::new(),
        }
    }

    /// Sets the port the preview listens on.
    ///
    /// # Errors
    ///
    /// Returns `RequestError::InvalidPort` outside `[1, 65535]`.
    pub fn with_port(mut self, port: u32) -> Result<Self, RequestError> {
        self.port = u16::try_from(port)
            .ok()
            .and_then(NonZeroU16::new)
            .ok_or(RequestError::InvalidPort(port))?;
        Ok(self)
    }
}

/// Status of a sandbox container as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerStatus {
    Creating,
    Running,
    Completed,
    Failed,
    Timeout,
    Killed,
}

impl std::fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerStatus::Creating => write!(f, "creating"),
            ContainerStatus::Running => write!(f, "running"),
            ContainerStatus::Completed => write!(f, "completed"),
            ContainerStatus::Failed => write!(f, "failed"),
            ContainerStatus::Timeout => write!(f, "timeout"),
            ContainerStatus::Killed => write!(f, "killed"),
        }
    }
}

/// Result of starting a preview container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewResult {
    pub container_id: String,
    pub url: String,
    pub status: ContainerStatus,
    pub logs: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PreviewResult {
    /// Previews need the project directory mounted, which is not supported yet.
    pub fn not_implemented() -> Self {
        Self {
            container_id: String::new(),
            url: String::new(),
            status: ContainerStatus::Failed,
            logs: String::new(),
            error: Some(
                "Preview mode requires project directory mounting (not yet implemented)"
                    .to_string(),
            ),
        }
    }
}

/// A sandbox container discovered through its ownership label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerDescriptor {
    pub id: String,
    pub name: String,
    pub status: String,
    pub image: String,
    pub labels: HashMap<String, String>,
}
