//! Instantaneous container metrics derived from cumulative counters.

use serde::{Deserialize, Serialize};

use crate::execution::runtime::StatsSnapshot;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Metrics for a running container.
///
/// Derived from one statistics sample; never authoritative state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerMetrics {
    pub container_id: String,
    pub cpu_percent: f64,
    pub memory_mb: f64,
    pub network_rx_bytes: u64,
    pub network_tx_bytes: u64,
    pub disk_read_bytes: u64,
    pub disk_write_bytes: u64,
    pub uptime_seconds: u64,
}

impl ContainerMetrics {
    /// Builds metrics from a statistics sample.
    pub fn from_snapshot(container_id: impl Into<String>, stats: &StatsSnapshot) -> Self {
        let (network_rx_bytes, network_tx_bytes) = stats
            .networks
            .values()
            .fold((0u64, 0u64), |(rx, tx), n| {
                (rx.saturating_add(n.rx_bytes), tx.saturating_add(n.tx_bytes))
            });

        let (disk_read_bytes, disk_write_bytes) =
            stats
                .block_io
                .iter()
                .fold((0u64, 0u64), |(read, write), entry| {
                    if entry.op.eq_ignore_ascii_case("read") {
                        (read.saturating_add(entry.value), write)
                    } else if entry.op.eq_ignore_ascii_case("write") {
                        (read, write.saturating_add(entry.value))
                    } else {
                        (read, write)
                    }
                });

        let memory_bytes = stats.memory_usage_bytes.unwrap_or(0) as f64;

        let uptime_seconds = match (stats.started_at, stats.read_at) {
            (Some(started), Some(read)) => (read - started).num_seconds().max(0) as u64,
            _ => 0,
        };

        Self {
            container_id: container_id.into(),
            cpu_percent: round2(cpu_percent(stats)),
            memory_mb: round2(memory_bytes / BYTES_PER_MB),
            network_rx_bytes,
            network_tx_bytes,
            disk_read_bytes,
            disk_write_bytes,
            uptime_seconds,
        }
    }
}

/// CPU share between two samples, as a percentage of host CPU time.
///
/// Zero unless both the container delta and the system delta are strictly
/// positive, which covers the first sample and counter resets.
pub fn cpu_percent(stats: &StatsSnapshot) -> f64 {
    let usage_delta = stats.cpu.total_usage as i128 - stats.precpu.total_usage as i128;
    let system_delta = stats.cpu.system_usage.unwrap_or(0) as i128
        - stats.precpu.system_usage.unwrap_or(0) as i128;

    if usage_delta > 0 && system_delta > 0 {
        (usage_delta as f64 / system_delta as f64) * 100.0
    } else {
        0.0
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
