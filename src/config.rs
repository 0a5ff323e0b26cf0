//! Engine configuration.
//!
//! Everything here is operator configuration, fixed when the engine is
//! built. Requests can only choose a language and a workload class; images
//! and resource ceilings are never taken from a request.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::execution::language::{build_command, ImageCatalog};
use crate::execution::models::ExecutionTimeout;
use crate::execution::resources::ResourcePolicy;

/// Default prefix of the ownership labels.
pub const DEFAULT_LABEL_NAMESPACE: &str = "sandbox-engine";

/// Default per-request timeout of the daemon client, in seconds.
pub const DEFAULT_API_TIMEOUT_SECONDS: u64 = 330;

fn default_label_namespace() -> String {
    DEFAULT_LABEL_NAMESPACE.to_string()
}

fn default_api_timeout_seconds() -> u64 {
    DEFAULT_API_TIMEOUT_SECONDS
}

/// Configuration of a `SandboxManager`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Language tag to base image.
    #[serde(default)]
    pub images: ImageCatalog,
    /// Prefix of the labels attached to every container the engine creates.
    #[serde(default = "default_label_namespace")]
    pub label_namespace: String,
    /// Timeout applied to every daemon request. Must exceed the longest
    /// execution timeout, since waiting for a container is one request.
    #[serde(default = "default_api_timeout_seconds")]
    pub api_timeout_seconds: u64,
    /// Resource ceilings per workload class.
    #[serde(default)]
    pub policy: ResourcePolicy,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            images: ImageCatalog::default(),
            label_namespace: default_label_namespace(),
            api_timeout_seconds: DEFAULT_API_TIMEOUT_SECONDS,
            policy: ResourcePolicy::default(),
        }
    }
}

impl SandboxConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads and validates a YAML configuration file.
    ///
    /// Missing keys take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.images.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one language image must be configured".to_string(),
            ));
        }

        if let Some((language, _)) = self.images.iter().find(|(_, image)| image.trim().is_empty())
        {
            return Err(ConfigError::Invalid(format!(
                "image for language '{language}' is empty"
            )));
        }

        if let Some((language, _)) = self
            .images
            .iter()
            .find(|(language, _)| build_command(language, "0").is_err())
        {
            return Err(ConfigError::Invalid(format!(
                "no command is known for language '{language}'"
            )));
        }

        if self.label_namespace.is_empty()
            || self
                .label_namespace
                .chars()
                .any(|c| c == '=' || c.is_whitespace())
        {
            return Err(ConfigError::Invalid(format!(
                "label namespace '{}' must be non-empty and contain no '=' or whitespace",
                self.label_namespace
            )));
        }

        if self.api_timeout_seconds <= ExecutionTimeout::MAX {
            return Err(ConfigError::Invalid(format!(
                "api_timeout_seconds ({}) must be greater than the maximum execution timeout ({})",
                self.api_timeout_seconds,
                ExecutionTimeout::MAX
            )));
        }

        Ok(())
    }

    /// Sets the image catalog.
    pub fn with_images(mut self, images: ImageCatalog) -> Self {
        self.images = images;
        self
    }

    /// Sets the label namespace.
    pub fn with_label_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.label_namespace = namespace.into();
        self
    }

    /// Sets the resource policy.
    pub fn with_policy(mut self, policy: ResourcePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the daemon request timeout.
    pub fn with_api_timeout(mut self, seconds: u64) -> Self {
        self.api_timeout_seconds = seconds;
        self
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_seconds)
    }

    /// Key of the ownership label, e.g. `sandbox-engine.type`.
    pub fn owner_label_key(&self) -> String {
        format!("{}.type", self.label_namespace)
    }

    /// Filter matching every container the engine owns.
    pub fn owner_selector(&self) -> String {
        format!("{}=sandbox", self.owner_label_key())
    }

    /// Key of the workload class label.
    pub fn class_label_key(&self) -> String {
        format!("{}.container_type", self.label_namespace)
    }
}
