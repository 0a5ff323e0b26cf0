//! Sandbox manager: the boundary callers use to run code in containers.
//!
//! `execute` never fails. Each step returns `Result<_, ExecutionFailure>`
//! and the final value is folded into an `ExecutionResult` in exactly one
//! place. A container, once created, is owned by a `ContainerGuard` and is
//! force-removed on every path out of `execute`, including panics inside the
//! runtime client and cancellation of the returned future.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::config::SandboxConfig;
use crate::error::{ConfigError, DockerError};
use crate::execution::container::{short_id, ContainerGuard};
use crate::execution::handle::RuntimeHandle;
use crate::execution::language::build_command;
use crate::execution::models::{
    ContainerDescriptor, ExecutionRequest, ExecutionResult, PreviewRequest, PreviewResult,
    TestExecutionRequest, TestExecutionResult, KILLED_EXIT_CODE,
};
use crate::execution::resources::ContainerType;
use crate::execution::runtime::{ContainerRuntime, ContainerSpec, LogStream};
use crate::metrics::{
    ContainerMetrics, ExecutionOutcome, MetricsCollector, UNSUPPORTED_LANGUAGE,
};

/// Why an execution did not produce a normal result.
#[derive(Debug)]
enum ExecutionFailure {
    /// Rejected before any container was created.
    Validation(String),
    /// The base image is not present on the daemon.
    ImageMissing(String),
    /// The daemon rejected a request.
    Api(String),
    /// The process outlived its timeout and was killed.
    Timeout { seconds: u64 },
    /// Anything else, including a panic in the runtime client.
    Unexpected(String),
}

impl From<DockerError> for ExecutionFailure {
    fn from(e: DockerError) -> Self {
        match e {
            DockerError::ImageNotFound { .. } => ExecutionFailure::ImageMissing(e.to_string()),
            DockerError::Api(_) => ExecutionFailure::Api(e.to_string()),
            DockerError::ContainerNotFound { .. } => {
                ExecutionFailure::Api(format!("Docker API error: {e}"))
            }
            other => ExecutionFailure::Unexpected(other.to_string()),
        }
    }
}

impl ExecutionFailure {
    fn outcome(&self) -> ExecutionOutcome {
        match self {
            ExecutionFailure::Validation(_) => ExecutionOutcome::Invalid,
            ExecutionFailure::Timeout { .. } => ExecutionOutcome::Timeout,
            _ => ExecutionOutcome::Error,
        }
    }

    fn into_result(self, elapsed_ms: u64) -> ExecutionResult {
        match self {
            // Rejected before any work was done.
            ExecutionFailure::Validation(message) => ExecutionResult::failure(message, 0),
            ExecutionFailure::ImageMissing(message)
            | ExecutionFailure::Api(message)
            | ExecutionFailure::Unexpected(message) => {
                ExecutionResult::failure(message, elapsed_ms)
            }
            // The timeout budget is reported, not the measured time.
            ExecutionFailure::Timeout { seconds } => ExecutionResult {
                exit_code: KILLED_EXIT_CODE,
                ..ExecutionResult::failure(
                    format!("Execution timed out after {seconds} seconds"),
                    seconds.saturating_mul(1000),
                )
            },
        }
    }
}

/// Runs untrusted code in short-lived, resource-limited containers.
///
/// Invocations are independent and may run concurrently. The only shared
/// state is the lazily built runtime handle.
pub struct SandboxManager {
    config: SandboxConfig,
    handle: RuntimeHandle,
    collector: MetricsCollector,
}

impl SandboxManager {
    /// A manager backed by the local Docker daemon.
    ///
    /// The daemon is not contacted until the first operation that needs it.
    pub fn new(config: SandboxConfig) -> Result<Self, ConfigError> {
        let handle = RuntimeHandle::docker(config.api_timeout());
        Self::with_handle(config, handle)
    }

    /// A manager backed by an already constructed runtime.
    pub fn with_runtime(
        config: SandboxConfig,
        runtime: Arc<dyn ContainerRuntime>,
    ) -> Result<Self, ConfigError> {
        Self::with_handle(config, RuntimeHandle::ready(runtime))
    }

    pub fn with_handle(config: SandboxConfig, handle: RuntimeHandle) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            handle,
            collector: MetricsCollector::new(),
        })
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Executes a code snippet in a fresh container.
    ///
    /// Always returns a result; infrastructure failures are reported through
    /// `ExecutionResult::error` with exit code 1. A timed out run reports exit
    /// code 137 and the timeout as its duration.
    #[instrument(
        skip_all,
        fields(language = %request.language, container_type = %container_type)
    )]
    pub async fn execute(
        &self,
        request: &ExecutionRequest,
        container_type: ContainerType,
    ) -> ExecutionResult {
        let started = Instant::now();

        let outcome = AssertUnwindSafe(self.run(request, container_type, started))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                let message = panic_message(payload.as_ref());
                error!("Execution panicked: {}", message);
                Err(ExecutionFailure::Unexpected(format!(
                    "Execution failed: {message}"
                )))
            });

        let (result, kind) = match outcome {
            Ok(result) => {
                let kind = ExecutionOutcome::of(&result);
                (result, kind)
            }
            Err(failure) => {
                let kind = failure.outcome();
                match &failure {
                    ExecutionFailure::Validation(message) => {
                        debug!("Rejected request: {}", message)
                    }
                    ExecutionFailure::Timeout { seconds } => {
                        warn!(timeout_seconds = seconds, "Execution timed out")
                    }
                    ExecutionFailure::ImageMissing(message) | ExecutionFailure::Api(message) => {
                        warn!("Execution failed: {}", message)
                    }
                    ExecutionFailure::Unexpected(message) => {
                        error!("Execution failed: {}", message)
                    }
                }
                (failure.into_result(elapsed_ms(started)), kind)
            }
        };

        self.collector.record_execution(
            kind,
            self.language_label(&request.language),
            container_type,
            result.duration_ms,
        );

        result
    }

    /// Metric label for a requested language. Only catalog languages get
    /// their own series.
    fn language_label<'a>(&'a self, language: &'a str) -> &'a str {
        match self.config.images.resolve(language) {
            Some(_) => language,
            None => UNSUPPORTED_LANGUAGE,
        }
    }

    async fn run(
        &self,
        request: &ExecutionRequest,
        container_type: ContainerType,
        started: Instant,
    ) -> Result<ExecutionResult, ExecutionFailure> {
        let spec = self.container_spec(request, container_type)?;

        let runtime = self.handle.get().await?;
        let mut guard = ContainerGuard::create(runtime, &spec).await?;

        let result = Self::drive(&mut guard, request, started).await;
        if result.is_err() {
            guard.mark_errored();
        }
        guard.release().await;

        result
    }

    /// Validates the request and resolves everything the container needs.
    fn container_spec(
        &self,
        request: &ExecutionRequest,
        container_type: ContainerType,
    ) -> Result<ContainerSpec, ExecutionFailure> {
        let image = self
            .config
            .images
            .resolve(&request.language)
            .ok_or_else(|| {
                ExecutionFailure::Validation(format!(
                    "Unsupported language: {}. Supported: {}",
                    request.language,
                    self.config.images.supported().join(", ")
                ))
            })?;

        if request.code.trim().is_empty() {
            return Err(ExecutionFailure::Validation("No code provided".to_string()));
        }

        let cmd = build_command(&request.language, &request.code)
            .map_err(|e| ExecutionFailure::Validation(e.to_string()))?;

        let labels = HashMap::from([
            (self.config.owner_label_key(), "sandbox".to_string()),
            (
                self.config.class_label_key(),
                container_type.as_str().to_string(),
            ),
        ]);

        Ok(ContainerSpec {
            name: format!("sandbox-{}", Uuid::new_v4()),
            image: image.to_string(),
            cmd,
            env: request.env_entries(),
            labels,
            limits: self.config.policy.limits_for(container_type),
            network_disabled: true,
        })
    }

    async fn drive(
        guard: &mut ContainerGuard,
        request: &ExecutionRequest,
        started: Instant,
    ) -> Result<ExecutionResult, ExecutionFailure> {
        guard.start().await?;

        let waited = tokio::time::timeout(request.timeout.as_duration(), guard.wait()).await;
        let exit_code = match waited {
            Ok(exit) => exit?,
            Err(_) => {
                if let Err(e) = guard.kill().await {
                    warn!(container = %short_id(guard.id()), "Failed to kill timed out container: {}", e);
                }
                return Err(ExecutionFailure::Timeout {
                    seconds: request.timeout.as_secs(),
                });
            }
        };

        let stdout = guard.logs(LogStream::Stdout).await?;
        let stderr = guard.logs(LogStream::Stderr).await?;
        let duration_ms = elapsed_ms(started);

        info!(
            container = %short_id(guard.id()),
            exit_code,
            duration_ms,
            "Container completed"
        );

        Ok(ExecutionResult::completed(
            exit_code,
            stdout,
            stderr,
            duration_ms,
        ))
    }

    /// Runs a project's tests. Not supported yet: project directories are
    /// never mounted, so this always returns the same failure.
    pub async fn run_tests(&self, request: &TestExecutionRequest) -> TestExecutionResult {
        debug!(project = %request.project_path, "Test execution requested");
        TestExecutionResult::not_implemented()
    }

    /// Starts a preview server. Not supported yet, for the same reason as
    /// `run_tests`.
    pub async fn start_preview(&self, request: &PreviewRequest) -> PreviewResult {
        debug!(project = %request.project_path, port = request.port.get(), "Preview requested");
        PreviewResult::not_implemented()
    }

    /// Stops and removes a preview container. Returns `false` on any failure.
    pub async fn stop_preview(&self, container_id: &str) -> bool {
        let stopped = async {
            let runtime = self.handle.get().await?;
            runtime.stop(container_id).await?;
            runtime.remove(container_id, false).await
        };

        match stopped.await {
            Ok(()) => {
                info!(container = %short_id(container_id), "Stopped preview container");
                true
            }
            Err(e) => {
                error!("Failed to stop container {}: {}", container_id, e);
                false
            }
        }
    }

    /// One metrics sample for a container, or `None` if it cannot be read.
    pub async fn metrics(&self, container_id: &str) -> Option<ContainerMetrics> {
        let sample = async {
            let runtime = self.handle.get().await?;
            runtime.stats(container_id).await
        };

        match sample.await {
            Ok(stats) => Some(ContainerMetrics::from_snapshot(container_id, &stats)),
            Err(e) => {
                error!("Failed to get metrics for {}: {}", container_id, e);
                None
            }
        }
    }

    /// Every container carrying the ownership label, in any state.
    ///
    /// Returns an empty list if the daemon cannot be queried.
    pub async fn list_active(&self) -> Vec<ContainerDescriptor> {
        match self.owned_containers().await {
            Ok(containers) => containers,
            Err(e) => {
                error!("Failed to list containers: {}", e);
                Vec::new()
            }
        }
    }

    /// Force-removes every owned container.
    ///
    /// A failed removal is logged and the sweep continues. Returns the number
    /// of containers actually removed.
    pub async fn cleanup_all(&self) -> usize {
        let containers = match self.owned_containers().await {
            Ok(containers) => containers,
            Err(e) => {
                error!("Failed to cleanup containers: {}", e);
                return 0;
            }
        };

        let runtime = match self.handle.get().await {
            Ok(runtime) => runtime,
            Err(e) => {
                error!("Failed to cleanup containers: {}", e);
                return 0;
            }
        };

        let mut removed = 0;
        for container in &containers {
            match runtime.remove(&container.id, true).await {
                Ok(()) => {
                    removed += 1;
                    self.collector.record_removal(true);
                }
                Err(e) => {
                    warn!("Failed to remove container {}: {}", container.id, e);
                    self.collector.record_removal(false);
                }
            }
        }

        info!(removed, found = containers.len(), "Cleaned up sandbox containers");
        removed
    }

    /// Whether the daemon answers a ping. Never fails.
    pub async fn is_healthy(&self) -> bool {
        let ping = async {
            let runtime = self.handle.get().await?;
            runtime.ping().await
        };

        match ping.await {
            Ok(()) => true,
            Err(e) => {
                debug!("Health check failed: {}", e);
                false
            }
        }
    }

    async fn owned_containers(&self) -> Result<Vec<ContainerDescriptor>, DockerError> {
        let runtime = self.handle.get().await?;
        runtime.list_by_label(&self.config.owner_selector()).await
    }
}

impl std::fmt::Debug for SandboxManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxManager")
            .field("config", &self.config)
            .field("handle", &self.handle)
            .finish()
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
