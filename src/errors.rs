//! Error types for the orchestration runtime.

use thiserror::Error;

use crate::messaging::MessagingError;

/// Top-level error type surfaced by the runtime's public API.
#[derive(Debug, Error)]
pub enum ConductorError {
    #[error("Messaging error: {0}")]
    MessagingError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Invalid configuration for task '{task}': {}", violations.join("; "))]
    InvalidTaskConfiguration {
        task: String,
        violations: Vec<String>,
    },
    #[error("Unknown task type: {0}")]
    UnknownTaskType(String),
    #[error("Task '{0}' is already registered")]
    DuplicateTask(String),
    #[error("Task error: {0}")]
    TaskError(String),
}

impl From<MessagingError> for ConductorError {
    fn from(error: MessagingError) -> Self {
        ConductorError::MessagingError(error.to_string())
    }
}

impl From<config::ConfigError> for ConductorError {
    fn from(error: config::ConfigError) -> Self {
        ConductorError::ConfigurationError(error.to_string())
    }
}

pub type ConductorResult<T> = anyhow::Result<T, ConductorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_task_configuration_joins_violations() {
        let err = ConductorError::InvalidTaskConfiguration {
            task: "loader".to_string(),
            violations: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Invalid configuration for task 'loader': a; b"
        );
    }
}
