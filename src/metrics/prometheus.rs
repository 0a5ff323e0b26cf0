//! Prometheus metrics registration and export.
//!
//! This module defines the Prometheus metrics the engine records about its
//! own work and provides functions for initializing and exporting them.

use prometheus::{CounterVec, Encoder, HistogramVec, IntCounter, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

/// Global Prometheus registry for all sandbox-engine metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Total executions, labeled by outcome and language.
pub static EXECUTIONS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Execution duration in seconds, labeled by container type.
pub static EXECUTION_DURATION: OnceLock<HistogramVec> = OnceLock::new();

/// Sandbox containers successfully removed.
pub static CONTAINERS_REMOVED: OnceLock<IntCounter> = OnceLock::new();

/// Container removals that failed.
pub static CLEANUP_FAILURES: OnceLock<IntCounter> = OnceLock::new();

/// Initialize all metrics and register them with the registry.
///
/// Call once at startup. Later calls are no-ops for the globals.
///
/// # Errors
///
/// Returns a `prometheus::Error` if metric registration fails.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let registry = Registry::new();

    let executions_total = CounterVec::new(
        Opts::new(
            "sandbox_engine_executions_total",
            "Total number of sandbox executions",
        ),
        &["outcome", "language"],
    )?;

    let execution_duration = HistogramVec::new(
        prometheus::HistogramOpts::new(
            "sandbox_engine_execution_duration_seconds",
            "Sandbox execution wall time in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0]),
        &["container_type"],
    )?;

    let containers_removed = IntCounter::new(
        "sandbox_engine_containers_removed_total",
        "Sandbox containers removed",
    )?;

    let cleanup_failures = IntCounter::new(
        "sandbox_engine_cleanup_failures_total",
        "Sandbox container removals that failed",
    )?;

    registry.register(Box::new(executions_total.clone()))?;
    registry.register(Box::new(execution_duration.clone()))?;
    registry.register(Box::new(containers_removed.clone()))?;
    registry.register(Box::new(cleanup_failures.clone()))?;

    // If any of these fail, metrics were already initialized (idempotent)
    let _ = REGISTRY.set(registry);
    let _ = EXECUTIONS_TOTAL.set(executions_total);
    let _ = EXECUTION_DURATION.set(execution_duration);
    let _ = CONTAINERS_REMOVED.set(containers_removed);
    let _ = CLEANUP_FAILURES.set(cleanup_failures);

    tracing::info!("Prometheus metrics initialized successfully");

    Ok(())
}

/// Export all registered metrics in Prometheus text format.
///
/// If the registry has not been initialized or encoding fails, returns a
/// comment line describing the problem.
pub fn export_metrics() -> String {
    let Some(registry) = REGISTRY.get() else {
        return "# Metrics not initialized. Call init_metrics() first.\n".to_string();
    };

    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# Error encoding metrics: {}\n", e);
    }

    String::from_utf8(buffer)
        .unwrap_or_else(|e| format!("# Error converting metrics to UTF-8: {}\n", e))
}
