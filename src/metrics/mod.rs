//! Container metrics and engine telemetry.
//!
//! * `container` derives instantaneous metrics (CPU %, memory, network,
//!   disk, uptime) from a runtime statistics sample.
//! * `prometheus` and `collectors` record what the engine itself does:
//!   executions by outcome, durations, removals.
//!
//! # Example
//!
//! ```ignore
//! use sandbox_engine::metrics::{init_metrics, export_metrics};
//!
//! init_metrics().expect("Failed to initialize metrics");
//! // ... run executions ...
//! let metrics_text = export_metrics();
//! ```

pub mod collectors;
pub mod container;
pub mod prometheus;

pub use collectors::{ExecutionOutcome, MetricsCollector, UNSUPPORTED_LANGUAGE};
pub use container::{cpu_percent, ContainerMetrics};
pub use prometheus::{export_metrics, init_metrics};
