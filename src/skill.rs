//! Skill adapter exposing sandbox execution to an agent.
//!
//! A skill takes JSON arguments, runs them through a `SandboxManager` and
//! answers with a JSON object tagged by `status`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::execution::models::{ExecutionRequest, ExecutionResult};
use crate::execution::resources::ContainerType;
use crate::execution::SandboxManager;

/// Languages the skill accepts. Narrower than what the manager can run.
pub const SKILL_LANGUAGES: [&str; 2] = ["python", "javascript"];

/// Outcome of a skill invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SkillOutput {
    Success {
        exit_code: i64,
        stdout: String,
        stderr: String,
        duration_ms: u64,
    },
    Error {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        exit_code: Option<i64>,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        stdout: String,
        #[serde(default, skip_serializing_if = "String::is_empty")]
        stderr: String,
    },
}

impl SkillOutput {
    /// An error raised before anything ran.
    pub fn rejected(error: impl Into<String>) -> Self {
        SkillOutput::Error {
            error: error.into(),
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SkillOutput::Success { .. })
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({ "status": "error", "error": e.to_string() })
        })
    }
}

impl From<ExecutionResult> for SkillOutput {
    fn from(result: ExecutionResult) -> Self {
        if result.is_success() {
            return SkillOutput::Success {
                exit_code: result.exit_code,
                stdout: result.stdout,
                stderr: result.stderr,
                duration_ms: result.duration_ms,
            };
        }

        let error = result
            .error
            .unwrap_or_else(|| format!("Process exited with code {}", result.exit_code));

        SkillOutput::Error {
            error,
            exit_code: Some(result.exit_code),
            stdout: result.stdout,
            stderr: result.stderr,
        }
    }
}

/// A capability an agent can invoke with JSON arguments.
#[async_trait]
pub trait Skill: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Permissions the caller must hold.
    fn required_permissions(&self) -> &[&str];

    /// JSON schema of the accepted arguments.
    fn input_schema(&self) -> Value;

    async fn execute(&self, args: Value) -> SkillOutput;
}

fn default_language() -> String {
    "python".to_string()
}

fn default_timeout() -> u64 {
    30
}

/// Arguments of `execute_code`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteCodeArgs {
    pub code: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

/// Runs a Python or JavaScript snippet in a sandbox.
#[derive(Debug, Clone)]
pub struct ExecuteCodeSkill {
    manager: Arc<SandboxManager>,
}

impl ExecuteCodeSkill {
    pub fn new(manager: Arc<SandboxManager>) -> Self {
        Self { manager }
    }

    /// Validates typed arguments and runs them.
    pub async fn run(&self, args: ExecuteCodeArgs) -> SkillOutput {
        if !SKILL_LANGUAGES.contains(&args.language.as_str()) {
            return SkillOutput::rejected(format!("Unsupported language: {}", args.language));
        }

        if args.code.trim().is_empty() {
            return SkillOutput::rejected("No code provided");
        }

        let request = match ExecutionRequest::new(args.language, args.code).with_timeout(args.timeout)
        {
            Ok(request) => request,
            Err(e) => return SkillOutput::rejected(e.to_string()),
        };

        self.manager
            .execute(&request, ContainerType::Execution)
            .await
            .into()
    }
}

#[async_trait]
impl Skill for ExecuteCodeSkill {
    fn name(&self) -> &str {
        "execute_code"
    }

    fn description(&self) -> &str {
        "Execute Python or JavaScript code in a sandbox"
    }

    fn required_permissions(&self) -> &[&str] {
        &["exec"]
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "code": {"type": "string", "description": "Code to execute"},
                "language": {"type": "string", "enum": SKILL_LANGUAGES},
                "timeout": {"type": "integer", "default": default_timeout()}
            },
            "required": ["code", "language"]
        })
    }

    async fn execute(&self, args: Value) -> SkillOutput {
        match serde_json::from_value::<ExecuteCodeArgs>(args) {
            Ok(args) => self.run(args).await,
            Err(e) => SkillOutput::rejected(format!("Invalid parameters: {e}")),
        }
    }
}
