//! Recording helpers for execution telemetry.
//!
//! `MetricsCollector` wraps the raw Prometheus metrics so call sites pass
//! domain values instead of label strings. Every method is a no-op until
//! `init_metrics()` has run.

use super::prometheus::{
    CLEANUP_FAILURES, CONTAINERS_REMOVED, EXECUTIONS_TOTAL, EXECUTION_DURATION,
};
use crate::execution::models::ExecutionResult;
use crate::execution::resources::ContainerType;

/// Language label recorded for requests naming a language the engine does not run.
pub const UNSUPPORTED_LANGUAGE: &str = "unsupported";

/// Outcome label of one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Exit code 0, no error.
    Success,
    /// The process ran and exited non-zero.
    Failure,
    /// Killed at its deadline.
    Timeout,
    /// Rejected before a container was created.
    Invalid,
    /// Infrastructure failure.
    Error,
}

impl ExecutionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionOutcome::Success => "success",
            ExecutionOutcome::Failure => "failure",
            ExecutionOutcome::Timeout => "timeout",
            ExecutionOutcome::Invalid => "invalid",
            ExecutionOutcome::Error => "error",
        }
    }

    /// Classifies a finished result that ran a container.
    pub fn of(result: &ExecutionResult) -> Self {
        if result.is_success() {
            ExecutionOutcome::Success
        } else if result.is_timeout() {
            ExecutionOutcome::Timeout
        } else if result.error.is_some() {
            ExecutionOutcome::Error
        } else {
            ExecutionOutcome::Failure
        }
    }
}

/// Metrics collector for sandbox operations.
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    pub fn new() -> Self {
        Self
    }

    /// Record one execution.
    pub fn record_execution(
        &self,
        outcome: ExecutionOutcome,
        language: &str,
        container_type: ContainerType,
        duration_ms: u64,
    ) {
        if let Some(executions) = EXECUTIONS_TOTAL.get() {
            executions
                .with_label_values(&[outcome.as_str(), language])
                .inc();
        }

        if let Some(duration) = EXECUTION_DURATION.get() {
            duration
                .with_label_values(&[container_type.as_str()])
                .observe(duration_ms as f64 / 1000.0);
        }

        tracing::trace!(
            outcome = outcome.as_str(),
            language = language,
            container_type = container_type.as_str(),
            duration_ms = duration_ms,
            "Recorded execution metric"
        );
    }

    /// Record a container removal attempt.
    pub fn record_removal(&self, removed: bool) {
        let counter = if removed {
            CONTAINERS_REMOVED.get()
        } else {
            CLEANUP_FAILURES.get()
        };

        if let Some(counter) = counter {
            counter.inc();
        }
    }
}
