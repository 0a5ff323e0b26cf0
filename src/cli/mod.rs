//! Command-line interface for sandbox-engine.
//!
//! Provides commands to execute snippets, inspect and clean up sandbox
//! containers, and probe the container runtime.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};
