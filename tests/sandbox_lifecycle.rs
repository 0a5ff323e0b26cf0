//! Lifecycle tests for `SandboxManager` against an in-memory container runtime.
//!
//! The mock decides how a container behaves from markers in the snippet it
//! is asked to run (`HANG`, `PANIC`, `FAIL_START`, `FAIL_LOGS`, `EXIT3`),
//! which lets one runtime serve mixed sequences of outcomes.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use sandbox_engine::config::SandboxConfig;
use sandbox_engine::error::DockerError;
use sandbox_engine::execution::runtime::{CpuCounters, NetworkCounters};
use sandbox_engine::execution::{
    ContainerDescriptor, ContainerRuntime, ContainerSpec, ContainerStatus, ContainerType,
    ExecutionRequest, LogStream, PreviewRequest, RuntimeHandle, SandboxManager, StatsSnapshot,
    TestExecutionRequest,
};
use sandbox_engine::health::{OverallStatus, SystemHealth};
use sandbox_engine::metrics::{export_metrics, init_metrics};
use sandbox_engine::skill::{ExecuteCodeSkill, Skill, SkillOutput};

#[derive(Debug, Clone)]
struct MockContainer {
    spec: ContainerSpec,
    status: String,
}

#[derive(Debug, Default)]
struct MockState {
    next_id: u64,
    containers: HashMap<String, MockContainer>,
    specs: Vec<ContainerSpec>,
    created: usize,
    removed: Vec<(String, bool)>,
    killed: Vec<String>,
    stopped: Vec<String>,
}

#[derive(Default)]
struct MockRuntime {
    state: Mutex<MockState>,
    missing_images: HashSet<String>,
    fail_remove: HashSet<String>,
    ping_fails: bool,
}

impl MockRuntime {
    fn new() -> Self {
        Self::default()
    }

    fn with_missing_image(mut self, image: &str) -> Self {
        self.missing_images.insert(image.to_string());
        self
    }

    fn with_failing_remove(mut self, id: &str) -> Self {
        self.fail_remove.insert(id.to_string());
        self
    }

    fn with_failing_ping(mut self) -> Self {
        self.ping_fails = true;
        self
    }

    /// Inserts a container as if an earlier process had created it.
    fn seed(&self, id: &str, labels: &[(&str, &str)]) {
        let spec = ContainerSpec {
            name: format!("seeded-{id}"),
            image: "python:3.12-slim".to_string(),
            cmd: vec!["sleep".to_string(), "600".to_string()],
            env: Vec::new(),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            limits: SandboxConfig::default()
                .policy
                .limits_for(ContainerType::Execution),
            network_disabled: true,
        };
        self.state.lock().unwrap().containers.insert(
            id.to_string(),
            MockContainer {
                spec,
                status: "running".to_string(),
            },
        );
    }

    fn created(&self) -> usize {
        self.state.lock().unwrap().created
    }

    fn removed(&self) -> Vec<(String, bool)> {
        self.state.lock().unwrap().removed.clone()
    }

    fn killed(&self) -> Vec<String> {
        self.state.lock().unwrap().killed.clone()
    }

    fn last_spec(&self) -> Option<ContainerSpec> {
        self.state.lock().unwrap().specs.last().cloned()
    }

    fn alive(&self) -> usize {
        self.state.lock().unwrap().containers.len()
    }

    fn code_of(&self, id: &str) -> Result<String, DockerError> {
        let state = self.state.lock().unwrap();
        state
            .containers
            .get(id)
            .and_then(|c| c.spec.cmd.last().cloned())
            .ok_or_else(|| DockerError::ContainerNotFound { id: id.to_string() })
    }

    fn set_status(&self, id: &str, status: &str) {
        if let Some(container) = self.state.lock().unwrap().containers.get_mut(id) {
            container.status = status.to_string();
        }
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    async fn create(&self, spec: &ContainerSpec) -> Result<String, DockerError> {
        if self.missing_images.contains(&spec.image) {
            return Err(DockerError::ImageNotFound {
                image: spec.image.clone(),
            });
        }

        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("{:064x}", state.next_id);
        state.created += 1;
        state.specs.push(spec.clone());
        state.containers.insert(
            id.clone(),
            MockContainer {
                spec: spec.clone(),
                status: "created".to_string(),
            },
        );
        Ok(id)
    }

    async fn start(&self, id: &str) -> Result<(), DockerError> {
        if self.code_of(id)?.contains("FAIL_START") {
            return Err(DockerError::Api("cannot start container".to_string()));
        }
        self.set_status(id, "running");
        Ok(())
    }

    async fn wait(&self, id: &str) -> Result<i64, DockerError> {
        let code = self.code_of(id)?;
        if code.contains("HANG") {
            return Ok(std::future::pending::<i64>().await);
        }
        if code.contains("PANIC") {
            panic!("runtime client bug");
        }
        self.set_status(id, "exited");
        Ok(if code.contains("EXIT3") { 3 } else { 0 })
    }

    async fn kill(&self, id: &str) -> Result<(), DockerError> {
        self.set_status(id, "exited");
        self.state.lock().unwrap().killed.push(id.to_string());
        Ok(())
    }

    async fn stop(&self, id: &str) -> Result<(), DockerError> {
        self.code_of(id)?;
        self.set_status(id, "exited");
        self.state.lock().unwrap().stopped.push(id.to_string());
        Ok(())
    }

    async fn logs(&self, id: &str, stream: LogStream) -> Result<String, DockerError> {
        let code = self.code_of(id)?;
        if code.contains("FAIL_LOGS") {
            return Err(DockerError::Api("log driver unavailable".to_string()));
        }
        Ok(match stream {
            LogStream::Stdout => "hello\n".to_string(),
            LogStream::Stderr if code.contains("EXIT3") => "boom\n".to_string(),
            LogStream::Stderr => String::new(),
        })
    }

    async fn remove(&self, id: &str, force: bool) -> Result<(), DockerError> {
        if self.fail_remove.contains(id) {
            return Err(DockerError::Api("removal in progress".to_string()));
        }
        let mut state = self.state.lock().unwrap();
        if state.containers.remove(id).is_none() {
            return Err(DockerError::ContainerNotFound { id: id.to_string() });
        }
        state.removed.push((id.to_string(), force));
        Ok(())
    }

    async fn list_by_label(&self, label: &str) -> Result<Vec<ContainerDescriptor>, DockerError> {
        let (key, value) = label.split_once('=').unwrap_or((label, ""));
        let state = self.state.lock().unwrap();
        Ok(state
            .containers
            .iter()
            .filter(|(_, c)| {
                c.spec
                    .labels
                    .get(key)
                    .is_some_and(|v| value.is_empty() || v == value)
            })
            .map(|(id, c)| ContainerDescriptor {
                id: id.clone(),
                name: c.spec.name.clone(),
                status: c.status.clone(),
                image: c.spec.image.clone(),
                labels: c.spec.labels.clone(),
            })
            .collect())
    }

    async fn stats(&self, id: &str) -> Result<StatsSnapshot, DockerError> {
        self.code_of(id)?;
        let mut networks = HashMap::new();
        networks.insert(
            "eth0".to_string(),
            NetworkCounters {
                rx_bytes: 1024,
                tx_bytes: 512,
            },
        );
        networks.insert(
            "eth1".to_string(),
            NetworkCounters {
                rx_bytes: 100,
                tx_bytes: 50,
            },
        );
        Ok(StatsSnapshot {
            cpu: CpuCounters {
                total_usage: 200,
                system_usage: Some(1000),
            },
            precpu: CpuCounters {
                total_usage: 100,
                system_usage: Some(500),
            },
            memory_usage_bytes: Some(52_428_800),
            networks,
            block_io: Vec::new(),
            started_at: None,
            read_at: Some(Utc::now()),
        })
    }

    async fn ping(&self) -> Result<(), DockerError> {
        if self.ping_fails {
            Err(DockerError::DaemonUnavailable("ping failed".to_string()))
        } else {
            Ok(())
        }
    }
}

fn manager_with(runtime: &Arc<MockRuntime>) -> SandboxManager {
    SandboxManager::with_runtime(
        SandboxConfig::default(),
        runtime.clone() as Arc<dyn ContainerRuntime>,
    )
    .unwrap()
}

fn request(language: &str, code: &str) -> ExecutionRequest {
    ExecutionRequest::new(language, code)
}

// ============================================================================
// Execution
// ============================================================================

#[tokio::test]
async fn test_python_execution_succeeds() {
    let runtime = Arc::new(MockRuntime::new());
    let manager = manager_with(&runtime);

    let result = manager
        .execute(
            &request("python", "print('hello')").with_env("GREETING", "hi"),
            ContainerType::Execution,
        )
        .await;

    assert_eq!(result.exit_code, 0);
    assert!(result.stdout.contains("hello"));
    assert!(result.error.is_none());
    assert!(result.memory_used_mb.is_none());

    let spec = runtime.last_spec().unwrap();
    assert_eq!(spec.image, "python:3.12-slim");
    assert_eq!(spec.cmd, vec!["python", "-c", "print('hello')"]);
    assert_eq!(spec.env, vec!["GREETING=hi"]);
    assert!(spec.network_disabled);
    assert!(spec.name.starts_with("sandbox-"));
    assert_eq!(
        spec.labels.get("sandbox-engine.type").map(String::as_str),
        Some("sandbox")
    );
    assert_eq!(
        spec.labels
            .get("sandbox-engine.container_type")
            .map(String::as_str),
        Some("execution")
    );
    assert_eq!(spec.limits.memory_mb, 512);
    assert_eq!(spec.limits.cpu_period, 100_000);
    assert_eq!(spec.limits.cpu_quota, 100_000);
    assert_eq!(spec.limits.pids_limit, 100);

    assert_eq!(runtime.created(), 1);
    assert_eq!(runtime.removed().len(), 1);
    assert!(runtime.removed()[0].1, "execution containers are force-removed");
    assert!(manager.list_active().await.is_empty());
}

#[tokio::test]
async fn test_javascript_and_typescript_use_node() {
    let runtime = Arc::new(MockRuntime::new());
    let manager = manager_with(&runtime);

    for language in ["javascript", "typescript"] {
        let result = manager
            .execute(&request(language, "console.log('hello')"), ContainerType::Execution)
            .await;
        assert_eq!(result.exit_code, 0, "{language}");

        let spec = runtime.last_spec().unwrap();
        assert_eq!(spec.image, "node:20-slim");
        assert_eq!(spec.cmd, vec!["node", "-e", "console.log('hello')"]);
    }
}

#[tokio::test]
async fn test_nonzero_exit_is_reported_without_error() {
    let runtime = Arc::new(MockRuntime::new());
    let manager = manager_with(&runtime);

    let result = manager
        .execute(&request("python", "EXIT3"), ContainerType::Execution)
        .await;

    assert_eq!(result.exit_code, 3);
    assert_eq!(result.stderr, "boom\n");
    assert!(result.error.is_none());
    assert!(!result.is_success());
    assert_eq!(runtime.alive(), 0);
}

#[tokio::test]
async fn test_container_type_selects_limits() {
    let runtime = Arc::new(MockRuntime::new());
    let manager = manager_with(&runtime);

    manager
        .execute(&request("python", "print(1)"), ContainerType::TestRunner)
        .await;

    let spec = runtime.last_spec().unwrap();
    assert_eq!(spec.limits.memory_mb, 2048);
    assert_eq!(spec.limits.cpu_quota, 200_000);
    assert_eq!(spec.limits.pids_limit, 200);
    assert_eq!(
        spec.labels
            .get("sandbox-engine.container_type")
            .map(String::as_str),
        Some("test_runner")
    );
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn test_unsupported_language_creates_no_container() {
    let runtime = Arc::new(MockRuntime::new());
    let manager = manager_with(&runtime);

    let result = manager
        .execute(&request("ruby", "puts 1"), ContainerType::Execution)
        .await;

    assert_eq!(result.exit_code, 1);
    let error = result.error.unwrap();
    assert!(error.starts_with("Unsupported language: ruby"));
    assert_eq!(result.duration_ms, 0);
    for supported in ["python", "javascript", "typescript"] {
        assert!(error.contains(supported), "{error} should name {supported}");
    }
    assert_eq!(runtime.created(), 0);
}

#[tokio::test]
async fn test_blank_code_creates_no_container() {
    let runtime = Arc::new(MockRuntime::new());
    let manager = manager_with(&runtime);

    for code in ["", "   ", "\n\t\n"] {
        let result = manager
            .execute(&request("python", code), ContainerType::Execution)
            .await;
        assert_eq!(result.exit_code, 1);
        assert_eq!(result.error.as_deref(), Some("No code provided"));
        assert_eq!(result.duration_ms, 0);
    }
    assert_eq!(runtime.created(), 0);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn test_timeout_kills_and_removes() {
    let runtime = Arc::new(MockRuntime::new());
    let manager = manager_with(&runtime);

    let request = request("python", "HANG").with_timeout(1).unwrap();
    let result = manager.execute(&request, ContainerType::Execution).await;

    assert_eq!(result.exit_code, 137);
    assert_eq!(result.duration_ms, 1000);
    assert_eq!(
        result.error.as_deref(),
        Some("Execution timed out after 1 seconds")
    );
    assert!(result.stdout.is_empty());
    assert_eq!(runtime.killed().len(), 1);
    assert_eq!(runtime.removed().len(), 1);
    assert!(manager.list_active().await.is_empty());
}

#[tokio::test]
async fn test_missing_image_is_reported() {
    let runtime = Arc::new(MockRuntime::new().with_missing_image("python:3.12-slim"));
    let manager = manager_with(&runtime);

    let result = manager
        .execute(&request("python", "print(1)"), ContainerType::Execution)
        .await;

    assert_eq!(result.exit_code, 1);
    assert_eq!(
        result.error.as_deref(),
        Some("Docker image not found: python:3.12-slim")
    );
    assert_eq!(runtime.created(), 0);
}

#[tokio::test]
async fn test_api_error_removes_container() {
    let runtime = Arc::new(MockRuntime::new());
    let manager = manager_with(&runtime);

    let result = manager
        .execute(&request("python", "FAIL_START"), ContainerType::Execution)
        .await;

    assert_eq!(result.exit_code, 1);
    assert_eq!(
        result.error.as_deref(),
        Some("Docker API error: cannot start container")
    );
    assert_eq!(runtime.created(), 1);
    assert_eq!(runtime.removed().len(), 1);
}

#[tokio::test]
async fn test_log_failure_removes_container() {
    let runtime = Arc::new(MockRuntime::new());
    let manager = manager_with(&runtime);

    let result = manager
        .execute(&request("python", "FAIL_LOGS"), ContainerType::Execution)
        .await;

    assert_eq!(result.exit_code, 1);
    assert!(result.error.unwrap().starts_with("Docker API error"));
    assert_eq!(runtime.alive(), 0);
}

#[tokio::test]
async fn test_panic_in_runtime_is_contained() {
    let runtime = Arc::new(MockRuntime::new());
    let manager = manager_with(&runtime);

    let result = manager
        .execute(&request("python", "PANIC"), ContainerType::Execution)
        .await;

    assert_eq!(result.exit_code, 1);
    assert!(result.error.unwrap().contains("runtime client bug"));

    // Removal is scheduled from the guard's drop handler.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(runtime.created(), 1);
    assert_eq!(runtime.alive(), 0);
}

#[tokio::test]
async fn test_cancelled_execution_removes_container() {
    let runtime = Arc::new(MockRuntime::new());
    let manager = manager_with(&runtime);

    let request = request("python", "HANG").with_timeout(60).unwrap();
    let abandoned = tokio::time::timeout(
        Duration::from_millis(100),
        manager.execute(&request, ContainerType::Execution),
    )
    .await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(runtime.created(), 1);
    assert_eq!(runtime.alive(), 0);
}

#[tokio::test]
async fn test_no_leak_across_mixed_outcomes() {
    let runtime = Arc::new(MockRuntime::new().with_missing_image("node:20-slim"));
    let manager = manager_with(&runtime);

    let cases = [
        ("python", "print('ok')", 5),
        ("python", "EXIT3", 5),
        ("ruby", "puts 1", 5),
        ("python", "  ", 5),
        ("javascript", "console.log(1)", 5),
        ("python", "FAIL_START", 5),
        ("python", "FAIL_LOGS", 5),
        ("python", "HANG", 1),
        ("python", "PANIC", 5),
    ];

    for (language, code, timeout) in cases {
        let request = request(language, code).with_timeout(timeout).unwrap();
        let result = manager.execute(&request, ContainerType::Execution).await;
        assert!(
            [0, 1, 3, 137].contains(&result.exit_code),
            "unexpected exit code {} for {code}",
            result.exit_code
        );
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(runtime.created(), 6);
    assert_eq!(runtime.alive(), 0);
    assert!(manager.list_active().await.is_empty());
}

#[tokio::test]
async fn test_concurrent_executions_are_independent() {
    let runtime = Arc::new(MockRuntime::new());
    let manager = Arc::new(manager_with(&runtime));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let manager = manager.clone();
            tokio::spawn(async move {
                let request = ExecutionRequest::new("python", format!("print({i})"));
                manager.execute(&request, ContainerType::Execution).await
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().exit_code, 0);
    }

    assert_eq!(runtime.created(), 8);
    assert_eq!(runtime.removed().len(), 8);
}

// ============================================================================
// Inventory, cleanup, metrics
// ============================================================================

#[tokio::test]
async fn test_remove_failure_does_not_change_result() {
    // The first container the mock creates gets this id.
    let first_id = format!("{:064x}", 1);
    let runtime = Arc::new(MockRuntime::new().with_failing_remove(&first_id));
    let manager = manager_with(&runtime);

    let result = manager
        .execute(&request("python", "print('hello')"), ContainerType::Execution)
        .await;

    assert_eq!(result.exit_code, 0);
    assert_eq!(result.stdout, "hello\n");
    assert_eq!(result.error, None);
    assert!(result.is_success());
    assert!(runtime.removed().is_empty());
    assert_eq!(runtime.alive(), 1, "container is left for cleanup_all");

    let next = manager
        .execute(&request("python", "print('again')"), ContainerType::Execution)
        .await;
    assert!(next.is_success());
    assert_eq!(runtime.alive(), 1);
}

#[tokio::test]
async fn test_unknown_languages_share_one_metric_series() {
    init_metrics().unwrap();
    let runtime = Arc::new(MockRuntime::new());
    let manager = manager_with(&runtime);

    for i in 0..50 {
        let result = manager
            .execute(
                &request(&format!("bogus-lang-{i}"), "print(1)"),
                ContainerType::Execution,
            )
            .await;
        assert_eq!(result.exit_code, 1);
    }
    manager
        .execute(&request("python", "print(1)"), ContainerType::Execution)
        .await;

    let exported = export_metrics();
    let series: Vec<&str> = exported
        .lines()
        .filter(|line| line.starts_with("sandbox_engine_executions_total{"))
        .collect();
    assert!(series.iter().all(|line| !line.contains("bogus-lang-")));
    assert!(series.iter().any(|line| {
        line.contains(r#"language="unsupported""#) && line.contains(r#"outcome="invalid""#)
    }));
    assert!(series.iter().any(|line| line.contains(r#"language="python""#)));
    assert_eq!(runtime.created(), 1);
}

#[tokio::test]
async fn test_list_active_filters_by_ownership_label() {
    let runtime = Arc::new(MockRuntime::new());
    runtime.seed("owned-1", &[("sandbox-engine.type", "sandbox")]);
    runtime.seed("foreign", &[("com.example.app", "web")]);
    let manager = manager_with(&runtime);

    let active = manager.list_active().await;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, "owned-1");
    assert_eq!(active[0].status, "running");
}

#[tokio::test]
async fn test_cleanup_all_continues_past_failures() {
    let runtime = Arc::new(MockRuntime::new().with_failing_remove("owned-2"));
    for id in ["owned-1", "owned-2", "owned-3"] {
        runtime.seed(id, &[("sandbox-engine.type", "sandbox")]);
    }
    runtime.seed("foreign", &[("com.example.app", "web")]);
    let manager = manager_with(&runtime);

    assert_eq!(manager.cleanup_all().await, 2);

    let remaining = manager.list_active().await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, "owned-2");
    assert_eq!(runtime.alive(), 2, "foreign container must be untouched");
}

#[tokio::test]
async fn test_cleanup_all_without_runtime_returns_zero() {
    let handle = RuntimeHandle::lazy(|| {
        Box::pin(async { Err(DockerError::DaemonUnavailable("no socket".to_string())) })
    });
    let manager = SandboxManager::with_handle(SandboxConfig::default(), handle).unwrap();

    assert_eq!(manager.cleanup_all().await, 0);
    assert!(manager.list_active().await.is_empty());
}

#[tokio::test]
async fn test_metrics_for_known_container() {
    let runtime = Arc::new(MockRuntime::new());
    runtime.seed("owned-1", &[("sandbox-engine.type", "sandbox")]);
    let manager = manager_with(&runtime);

    let metrics = manager.metrics("owned-1").await.unwrap();
    assert_eq!(metrics.container_id, "owned-1");
    assert_eq!(metrics.cpu_percent, 20.0);
    assert_eq!(metrics.memory_mb, 50.0);
    assert_eq!(metrics.network_rx_bytes, 1124);
    assert_eq!(metrics.network_tx_bytes, 562);
    assert_eq!(metrics.uptime_seconds, 0);
}

#[tokio::test]
async fn test_metrics_for_unknown_container_is_absent() {
    let runtime = Arc::new(MockRuntime::new());
    let manager = manager_with(&runtime);

    assert!(manager.metrics("does-not-exist").await.is_none());
}

// ============================================================================
// Health and connection handle
// ============================================================================

#[tokio::test]
async fn test_is_healthy() {
    let healthy = Arc::new(MockRuntime::new());
    assert!(manager_with(&healthy).is_healthy().await);

    let failing = Arc::new(MockRuntime::new().with_failing_ping());
    assert!(!manager_with(&failing).is_healthy().await);
}

#[tokio::test]
async fn test_is_healthy_retries_failed_construction() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    let handle = RuntimeHandle::lazy(move || {
        let counter = counter.clone();
        Box::pin(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(DockerError::DaemonUnavailable("connection refused".to_string()))
        })
    });
    let manager = SandboxManager::with_handle(SandboxConfig::default(), handle).unwrap();

    assert!(!manager.is_healthy().await);
    assert!(!manager.is_healthy().await);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_runtime_is_constructed_once() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let runtime = Arc::new(MockRuntime::new());
    let counter = attempts.clone();
    let shared = runtime.clone();
    let handle = RuntimeHandle::lazy(move || {
        let counter = counter.clone();
        let runtime = shared.clone();
        Box::pin(async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(runtime as Arc<dyn ContainerRuntime>)
        })
    });
    let manager = Arc::new(SandboxManager::with_handle(SandboxConfig::default(), handle).unwrap());

    let probes: Vec<_> = (0..4)
        .map(|_| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.is_healthy().await })
        })
        .collect();
    for probe in probes {
        assert!(probe.await.unwrap());
    }
    manager
        .execute(&request("python", "print(1)"), ContainerType::Execution)
        .await;

    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_execute_without_runtime_returns_failure() {
    let handle = RuntimeHandle::lazy(|| {
        Box::pin(async { Err(DockerError::DaemonUnavailable("no socket".to_string())) })
    });
    let manager = SandboxManager::with_handle(SandboxConfig::default(), handle).unwrap();

    let result = manager
        .execute(&request("python", "print(1)"), ContainerType::Execution)
        .await;
    assert_eq!(result.exit_code, 1);
    assert!(result.error.unwrap().contains("no socket"));
}

#[tokio::test]
async fn test_system_health_degrades_without_runtime() {
    let failing = Arc::new(MockRuntime::new().with_failing_ping());
    let health = SystemHealth::check(&manager_with(&failing), true).await;
    assert_eq!(health.status, OverallStatus::Degraded);

    let healthy = Arc::new(MockRuntime::new());
    let health = SystemHealth::check(&manager_with(&healthy), true).await;
    assert_eq!(health.status, OverallStatus::Healthy);
}

// ============================================================================
// Previews and test runs
// ============================================================================

#[tokio::test]
async fn test_run_tests_and_start_preview_are_stubs() {
    let runtime = Arc::new(MockRuntime::new());
    let manager = manager_with(&runtime);

    let tests = manager
        .run_tests(&TestExecutionRequest::new("/workspace", "pytest"))
        .await;
    assert!(tests.error.unwrap().contains("not yet implemented"));

    let preview = manager
        .start_preview(&PreviewRequest::new("/workspace", "npm start"))
        .await;
    assert_eq!(preview.status, ContainerStatus::Failed);
    assert!(preview.error.unwrap().contains("not yet implemented"));

    assert_eq!(runtime.created(), 0);
}

#[tokio::test]
async fn test_stop_preview() {
    let runtime = Arc::new(MockRuntime::new());
    runtime.seed("preview-1", &[("sandbox-engine.type", "sandbox")]);
    let manager = manager_with(&runtime);

    assert!(manager.stop_preview("preview-1").await);
    assert_eq!(runtime.removed(), vec![("preview-1".to_string(), false)]);

    assert!(!manager.stop_preview("preview-1").await);
}

// ============================================================================
// Skill adapter
// ============================================================================

#[tokio::test]
async fn test_execute_code_skill() {
    let runtime = Arc::new(MockRuntime::new());
    let skill = ExecuteCodeSkill::new(Arc::new(manager_with(&runtime)));

    assert_eq!(skill.name(), "execute_code");
    assert_eq!(skill.required_permissions(), &["exec"]);

    let output = skill
        .execute(serde_json::json!({"code": "print('hello')", "language": "python"}))
        .await;
    assert!(output.is_success());
    assert_eq!(output.to_json()["stdout"], "hello\n");

    let output = skill
        .execute(serde_json::json!({"code": "1", "language": "typescript"}))
        .await;
    assert_eq!(
        output,
        SkillOutput::rejected("Unsupported language: typescript")
    );

    let output = skill
        .execute(serde_json::json!({"code": " ", "language": "python"}))
        .await;
    assert_eq!(output, SkillOutput::rejected("No code provided"));

    let output = skill
        .execute(serde_json::json!({"code": "1", "timeout": 900}))
        .await;
    assert_eq!(output.to_json()["status"], "error");

    let output = skill.execute(serde_json::json!({"language": "python"})).await;
    assert!(!output.is_success());

    assert_eq!(runtime.created(), 1);
}
