//! Docker API wrapper using the bollard crate.
//!
//! `DockerClient` implements `ContainerRuntime` against the local Docker
//! daemon and translates bollard's errors and models into the engine's.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, KillContainerOptions,
    ListContainersOptions, LogOutput, LogsOptions, RemoveContainerOptions, StartContainerOptions,
    Stats, StatsOptions, StopContainerOptions, WaitContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::models::{ContainerSummary, HostConfig};
use bollard::Docker;
use chrono::{DateTime, Utc};
use futures::StreamExt;

use crate::error::DockerError;
use crate::execution::models::ContainerDescriptor;
use crate::execution::runtime::{
    BlockIoEntry, ContainerRuntime, ContainerSpec, CpuCounters, LogStream, NetworkCounters,
    StatsSnapshot,
};

/// Grace period for `stop` before the daemon escalates to SIGKILL.
const STOP_GRACE_SECONDS: i64 = 10;

/// Docker client wrapper for container operations.
#[derive(Debug, Clone)]
pub struct DockerClient {
    docker: Docker,
}

impl DockerClient {
    /// Creates a Docker client for the local daemon.
    ///
    /// `api_timeout` bounds every daemon request, including the wait for a
    /// container to exit, so it must exceed the longest execution timeout.
    ///
    /// # Errors
    ///
    /// Returns `DockerError::DaemonUnavailable` if no daemon endpoint can be
    /// configured from the environment.
    pub fn new(api_timeout: Duration) -> Result<Self, DockerError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| DockerError::DaemonUnavailable(format!("Failed to connect: {e}")))?
            .with_timeout(api_timeout);

        Ok(Self { docker })
    }

    /// Creates a client and verifies the daemon answers a ping.
    pub async fn connect(api_timeout: Duration) -> Result<Self, DockerError> {
        let client = Self::new(api_timeout)?;
        client.ping().await?;
        tracing::info!("Docker client initialized successfully");
        Ok(client)
    }

    /// Creates a new Docker client from an existing bollard Docker instance.
    pub fn from_docker(docker: Docker) -> Self {
        Self { docker }
    }

    async fn started_at(&self, id: &str) -> Result<Option<DateTime<Utc>>, DockerError> {
        let info = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| not_found_or(e, id))?;

        Ok(info
            .state
            .and_then(|s| s.started_at)
            .as_deref()
            .and_then(parse_timestamp))
    }

    async fn exit_code_from_inspect(&self, id: &str) -> Result<i64, DockerError> {
        let info = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| not_found_or(e, id))?;

        let state = info
            .state
            .ok_or_else(|| DockerError::StreamEnded("Container has no state".to_string()))?;

        match (state.running, state.exit_code) {
            (Some(false), Some(code)) => Ok(code),
            _ => Err(DockerError::StreamEnded(
                "Container did not exit normally".to_string(),
            )),
        }
    }
}

#[async_trait]
impl ContainerRuntime for DockerClient {
    async fn create(&self, spec: &ContainerSpec) -> Result<String, DockerError> {
        let options = CreateContainerOptions {
            name: spec.name.clone(),
            platform: None,
        };

        let response = self
            .docker
            .create_container(Some(options), build_config(spec))
            .await
            .map_err(|e| match status_code(&e) {
                Some(404) => DockerError::ImageNotFound {
                    image: spec.image.clone(),
                },
                _ => DockerError::from(e),
            })?;

        for warning in &response.warnings {
            tracing::warn!(container = %response.id, "Docker create warning: {}", warning);
        }

        Ok(response.id)
    }

    async fn start(&self, id: &str) -> Result<(), DockerError> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| not_found_or(e, id))
    }

    async fn wait(&self, id: &str) -> Result<i64, DockerError> {
        let options = WaitContainerOptions {
            condition: "not-running",
        };

        let mut stream = self.docker.wait_container(id, Some(options));

        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            // bollard reports a non-zero exit as an error carrying the code
            Some(Err(BollardError::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(not_found_or(e, id)),
            None => self.exit_code_from_inspect(id).await,
        }
    }

    async fn kill(&self, id: &str) -> Result<(), DockerError> {
        let options = KillContainerOptions { signal: "SIGKILL" };

        match self.docker.kill_container(id, Some(options)).await {
            Ok(()) => Ok(()),
            // 409: the container already stopped on its own
            Err(e) if status_code(&e) == Some(409) => Ok(()),
            Err(e) => Err(not_found_or(e, id)),
        }
    }

    async fn stop(&self, id: &str) -> Result<(), DockerError> {
        let options = StopContainerOptions {
            t: STOP_GRACE_SECONDS,
        };

        match self.docker.stop_container(id, Some(options)).await {
            Ok(()) => Ok(()),
            // 304: already stopped
            Err(e) if status_code(&e) == Some(304) => Ok(()),
            Err(e) => Err(not_found_or(e, id)),
        }
    }

    async fn logs(&self, id: &str, stream: LogStream) -> Result<String, DockerError> {
        let options = LogsOptions::<String> {
            stdout: stream == LogStream::Stdout,
            stderr: stream == LogStream::Stderr,
            follow: false,
            timestamps: false,
            tail: "all".to_string(),
            ..Default::default()
        };

        let mut logs = self.docker.logs(id, Some(options));
        let mut output = String::new();

        while let Some(chunk) = logs.next().await {
            match chunk {
                Ok(LogOutput::StdOut { message }) | Ok(LogOutput::Console { message })
                    if stream == LogStream::Stdout =>
                {
                    output.push_str(&String::from_utf8_lossy(&message));
                }
                Ok(LogOutput::StdErr { message }) if stream == LogStream::Stderr => {
                    output.push_str(&String::from_utf8_lossy(&message));
                }
                Ok(_) => {}
                Err(e) => return Err(not_found_or(e, id)),
            }
        }

        Ok(output)
    }

    async fn remove(&self, id: &str, force: bool) -> Result<(), DockerError> {
        let options = RemoveContainerOptions {
            force,
            v: true, // Remove anonymous volumes
            ..Default::default()
        };

        self.docker
            .remove_container(id, Some(options))
            .await
            .map_err(|e| not_found_or(e, id))
    }

    async fn list_by_label(&self, label: &str) -> Result<Vec<ContainerDescriptor>, DockerError> {
        let mut filters = HashMap::new();
        filters.insert("label".to_string(), vec![label.to_string()]);

        let options = ListContainersOptions::<String> {
            all: true,
            filters,
            ..Default::default()
        };

        let containers = self.docker.list_containers(Some(options)).await?;

        Ok(containers.into_iter().map(describe).collect())
    }

    async fn stats(&self, id: &str) -> Result<StatsSnapshot, DockerError> {
        let started_at = self.started_at(id).await?;

        // one_shot = false makes the daemon take two samples so the
        // precpu counters are populated.
        let options = StatsOptions {
            stream: false,
            one_shot: false,
        };

        let mut stream = self.docker.stats(id, Some(options));

        match stream.next().await {
            Some(Ok(stats)) => Ok(snapshot(stats, started_at)),
            Some(Err(e)) => Err(not_found_or(e, id)),
            None => Err(DockerError::StreamEnded(format!(
                "No statistics returned for container {id}"
            ))),
        }
    }

    async fn ping(&self) -> Result<(), DockerError> {
        self.docker
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| DockerError::DaemonUnavailable(e.to_string()))
    }
}

/// Translates a spec into the daemon's create body.
fn build_config(spec: &ContainerSpec) -> Config<String> {
    let host_config = HostConfig {
        memory: Some(spec.limits.memory_bytes()),
        cpu_period: Some(spec.limits.cpu_period),
        cpu_quota: Some(spec.limits.cpu_quota),
        pids_limit: Some(spec.limits.pids_limit),
        network_mode: spec.network_disabled.then(|| "none".to_string()),
        ..Default::default()
    };

    Config {
        image: Some(spec.image.clone()),
        cmd: Some(spec.cmd.clone()),
        env: if spec.env.is_empty() {
            None
        } else {
            Some(spec.env.clone())
        },
        labels: Some(spec.labels.clone()),
        network_disabled: Some(spec.network_disabled),
        host_config: Some(host_config),
        // Without a TTY the daemon keeps stdout and stderr apart.
        tty: Some(false),
        attach_stdin: Some(false),
        attach_stdout: Some(true),
        attach_stderr: Some(true),
        ..Default::default()
    }
}

fn describe(summary: ContainerSummary) -> ContainerDescriptor {
    let name = summary
        .names
        .as_ref()
        .and_then(|names| names.first())
        .map(|n| n.trim_start_matches('/').to_string())
        .unwrap_or_default();

    ContainerDescriptor {
        id: summary.id.unwrap_or_default(),
        name,
        status: summary.state.or(summary.status).unwrap_or_default(),
        image: summary.image.or(summary.image_id).unwrap_or_default(),
        labels: summary.labels.unwrap_or_default(),
    }
}

fn snapshot(stats: Stats, started_at: Option<DateTime<Utc>>) -> StatsSnapshot {
    let networks = stats
        .networks
        .unwrap_or_default()
        .into_iter()
        .map(|(name, n)| {
            (
                name,
                NetworkCounters {
                    rx_bytes: n.rx_bytes,
                    tx_bytes: n.tx_bytes,
                },
            )
        })
        .collect();

    let block_io = stats
        .blkio_stats
        .io_service_bytes_recursive
        .unwrap_or_default()
        .into_iter()
        .map(|e| BlockIoEntry {
            op: e.op,
            value: e.value,
        })
        .collect();

    StatsSnapshot {
        cpu: CpuCounters {
            total_usage: stats.cpu_stats.cpu_usage.total_usage,
            system_usage: stats.cpu_stats.system_cpu_usage,
        },
        precpu: CpuCounters {
            total_usage: stats.precpu_stats.cpu_usage.total_usage,
            system_usage: stats.precpu_stats.system_cpu_usage,
        },
        memory_usage_bytes: stats.memory_stats.usage,
        networks,
        block_io,
        started_at,
        read_at: parse_timestamp(&stats.read),
    }
}

/// Parses a daemon timestamp. The zero time the daemon uses for "never"
/// comes back as `None`.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
        .filter(|t| t.timestamp() > 0)
}

fn status_code(e: &BollardError) -> Option<u16> {
    match e {
        BollardError::DockerResponseServerError { status_code, .. } => Some(*status_code),
        _ => None,
    }
}

fn not_found_or(e: BollardError, id: &str) -> DockerError {
    match status_code(&e) {
        Some(404) => DockerError::ContainerNotFound { id: id.to_string() },
        _ => DockerError::from(e),
    }
}
