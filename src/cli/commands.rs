//! CLI command definitions for sandbox-engine.
//!
//! Every command builds one `SandboxManager` from the optional YAML config
//! and runs a single operation against it.

use crate::config::SandboxConfig;
use crate::execution::{ContainerType, ExecutionRequest, ExecutionResult, SandboxManager};
use crate::health::ContainerHealth;
use crate::metrics::{export_metrics, init_metrics};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

/// Run untrusted code snippets in resource-limited containers.
#[derive(Parser, Debug)]
#[command(name = "sandbox-engine")]
#[command(about = "Run code snippets in isolated, resource-limited Docker containers")]
#[command(version)]
#[command(
    long_about = "sandbox-engine runs Python and JavaScript snippets in short-lived Docker containers with networking disabled and fixed CPU, memory and process limits.\n\nExample usage:\n  sandbox-engine exec --language python --code \"print('hello')\" --timeout 10"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// YAML configuration file.
    #[arg(long, global = true, env = "SANDBOX_ENGINE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output JSON to stdout instead of human-readable text.
    #[arg(short = 'j', long, global = true)]
    pub json: bool,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Execute a code snippet in a fresh sandbox container.
    #[command(alias = "run")]
    Exec(ExecArgs),

    /// List every container owned by the engine.
    #[command(alias = "ls")]
    List,

    /// Force-remove every container owned by the engine.
    Cleanup,

    /// Check whether the Docker daemon is reachable.
    Health,

    /// Show resource usage of one container.
    Metrics(MetricsArgs),
}

/// Arguments for `sandbox-engine exec`.
#[derive(Parser, Debug)]
pub struct ExecArgs {
    /// Language of the snippet (python, javascript, typescript).
    #[arg(short = 'L', long)]
    pub language: String,

    /// Code to execute.
    #[arg(short, long, conflicts_with = "file", required_unless_present = "file")]
    pub code: Option<String>,

    /// Read the code from a file.
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Timeout in seconds (1-300).
    #[arg(short, long, default_value = "30")]
    pub timeout: u64,

    /// Workload class deciding the resource limits.
    #[arg(long, default_value = "execution")]
    pub container_type: ContainerType,

    /// Environment variable for the snippet, as KEY=VALUE. Repeatable.
    #[arg(short, long = "env", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,

    /// Also print the engine's Prometheus metrics after the run.
    #[arg(long)]
    pub prometheus: bool,
}

/// Arguments for `sandbox-engine metrics`.
#[derive(Parser, Debug)]
pub struct MetricsArgs {
    /// Container ID or name.
    pub container_id: String,
}

fn parse_env_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    if let Err(e) = init_metrics() {
        warn!("Failed to initialize metrics: {}", e);
    }

    let config = match &cli.config {
        Some(path) => SandboxConfig::load(path).map_err(|e| {
            anyhow::anyhow!("Failed to load config from {}: {}", path.display(), e)
        })?,
        None => SandboxConfig::default(),
    };
    let manager = SandboxManager::new(config)?;

    match cli.command {
        Commands::Exec(args) => run_exec_command(&manager, args, cli.json).await,
        Commands::List => run_list_command(&manager, cli.json).await,
        Commands::Cleanup => run_cleanup_command(&manager, cli.json).await,
        Commands::Health => run_health_command(&manager, cli.json).await,
        Commands::Metrics(args) => run_metrics_command(&manager, args, cli.json).await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn run_exec_command(
    manager: &SandboxManager,
    args: ExecArgs,
    json: bool,
) -> anyhow::Result<()> {
    let code = match (&args.code, &args.file) {
        (Some(code), _) => code.clone(),
        (None, Some(path)) => fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?,
        (None, None) => return Err(anyhow::anyhow!("Either --code or --file is required")),
    };

    let request = args
        .env
        .into_iter()
        .fold(ExecutionRequest::new(&args.language, code), |request, (k, v)| {
            request.with_env(k, v)
        })
        .with_timeout(args.timeout)?;

    info!(
        language = %args.language,
        container_type = %args.container_type,
        timeout = args.timeout,
        "Executing snippet"
    );

    let result = manager.execute(&request, args.container_type).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }

    if args.prometheus {
        println!("{}", export_metrics());
    }

    if !result.is_success() {
        std::process::exit(process_exit_code(&result));
    }

    Ok(())
}

fn print_result(result: &ExecutionResult) {
    print!("{}", result.stdout);
    eprint!("{}", result.stderr);
    if let Some(error) = &result.error {
        eprintln!("error: {}", error);
    }
    eprintln!(
        "exit code {} in {} ms",
        result.exit_code, result.duration_ms
    );
}

fn process_exit_code(result: &ExecutionResult) -> i32 {
    match i32::try_from(result.exit_code) {
        Ok(0) | Err(_) => 1,
        Ok(code) => code,
    }
}

async fn run_list_command(manager: &SandboxManager, json: bool) -> anyhow::Result<()> {
    let containers = manager.list_active().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&containers)?);
        return Ok(());
    }

    if containers.is_empty() {
        println!("No sandbox containers.");
        return Ok(());
    }

    println!("{:<14} {:<46} {:<10} IMAGE", "ID", "NAME", "STATUS");
    for container in &containers {
        println!(
            "{:<14} {:<46} {:<10} {}",
            crate::execution::container::short_id(&container.id),
            container.name,
            container.status,
            container.image
        );
    }

    Ok(())
}

async fn run_cleanup_command(manager: &SandboxManager, json: bool) -> anyhow::Result<()> {
    let removed = manager.cleanup_all().await;

    if json {
        println!("{}", serde_json::json!({ "removed": removed }));
    } else {
        println!("Removed {} sandbox container(s).", removed);
    }

    Ok(())
}

async fn run_health_command(manager: &SandboxManager, json: bool) -> anyhow::Result<()> {
    let health = ContainerHealth::check(manager).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&health)?);
    } else if health.docker_available {
        println!(
            "Docker available, {} active sandbox container(s).",
            health.active_containers
        );
    } else {
        println!("Docker unavailable.");
    }

    if !health.docker_available {
        std::process::exit(1);
    }

    Ok(())
}

async fn run_metrics_command(
    manager: &SandboxManager,
    args: MetricsArgs,
    json: bool,
) -> anyhow::Result<()> {
    let metrics = manager.metrics(&args.container_id).await.ok_or_else(|| {
        anyhow::anyhow!("No metrics available for container {}", args.container_id)
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&metrics)?);
    } else {
        println!("container:   {}", metrics.container_id);
        println!("cpu:         {:.2}%", metrics.cpu_percent);
        println!("memory:      {:.2} MB", metrics.memory_mb);
        println!(
            "network:     rx {} B, tx {} B",
            metrics.network_rx_bytes, metrics.network_tx_bytes
        );
        println!(
            "disk:        read {} B, write {} B",
            metrics.disk_read_bytes, metrics.disk_write_bytes
        );
        println!("uptime:      {} s", metrics.uptime_seconds);
    }

    Ok(())
}
