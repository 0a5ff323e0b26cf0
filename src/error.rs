//! Error types for sandbox-engine operations.
//!
//! Defines error types for the subsystems that can fail in a typed way:
//! - Container runtime (Docker daemon) interactions
//! - Configuration loading and validation
//! - Request construction
//!
//! None of these escape `SandboxManager::execute`; the controller folds them
//! into an `ExecutionResult`.

use thiserror::Error;

/// Errors that can occur during Docker operations.
#[derive(Debug, Error)]
pub enum DockerError {
    #[error("Docker daemon not available: {0}")]
    DaemonUnavailable(String),

    #[error("Docker image not found: {image}")]
    ImageNotFound { image: String },

    #[error("Container '{id}' not found")]
    ContainerNotFound { id: String },

    #[error("Docker API error: {0}")]
    Api(String),

    #[error("Container execution timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Docker stream ended unexpectedly: {0}")]
    StreamEnded(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<bollard::errors::Error> for DockerError {
    fn from(e: bollard::errors::Error) -> Self {
        use bollard::errors::Error as BollardError;

        match e {
            BollardError::DockerResponseServerError { message, .. } => DockerError::Api(message),
            BollardError::IOError { err } => DockerError::Io(err),
            other => DockerError::Api(other.to_string()),
        }
    }
}

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors that can occur while building a request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("Timeout must be between {min} and {max} seconds, got {value}")]
    TimeoutOutOfRange { value: u64, min: u64, max: u64 },

    #[error("Port must be between 1 and 65535, got {0}")]
    InvalidPort(u32),

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_maps_to_api() {
        let err = bollard::errors::Error::DockerResponseServerError {
            status_code: 500,
            message: "driver failed".to_string(),
        };
        let mapped = DockerError::from(err);
        assert!(matches!(mapped, DockerError::Api(_)));
        assert_eq!(mapped.to_string(), "Docker API error: driver failed");
    }

    #[test]
    fn test_request_error_display() {
        let err = RequestError::TimeoutOutOfRange {
            value: 0,
            min: 1,
            max: 300,
        };
        assert_eq!(
            err.to_string(),
            "Timeout must be between 1 and 300 seconds, got 0"
        );
    }
}
