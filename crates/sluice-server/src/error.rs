//! Error types for the Sluice Server
//!
//! This module contains the error types used throughout the server.

use thiserror::Error;

use sluice_core::CoreError;

/// Server error types
#[derive(Error, Debug)]
pub enum ServerError {
    /// Resource not found
    #[error("{0} not found")]
    NotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The request conflicts with the job's current state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Container provider error
    #[error("Container provider error: {0}")]
    ProviderError(String),

    /// Completion queue error
    #[error("Completion queue error: {0}")]
    QueueError(String),

    /// Runtime error
    #[error("Runtime error: {0}")]
    RuntimeError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Internal server error
    #[error("Internal server error: {0}")]
    InternalError(String),
}

/// Result type for server operations
pub type ServerResult<T> = Result<T, ServerError>;

// Implement conversions from other error types
impl From<CoreError> for ServerError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::JobNotFound(id) => ServerError::NotFound(format!("Job {}", id)),
            CoreError::ValidationError(msg) => ServerError::ValidationError(msg),
            CoreError::JobExecutionError(msg) => ServerError::Conflict(msg),
            CoreError::ProviderError(msg) => ServerError::ProviderError(msg),
            CoreError::ConfigurationError(msg) => ServerError::ConfigError(msg),
            _ => ServerError::RuntimeError(format!("{}", err)),
        }
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(err: serde_json::Error) -> Self {
        ServerError::ValidationError(format!("JSON error: {}", err))
    }
}

impl From<reqwest::Error> for ServerError {
    fn from(err: reqwest::Error) -> Self {
        ServerError::QueueError(format!("HTTP request error: {}", err))
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        ServerError::InternalError(format!("IO error: {}", err))
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(err: anyhow::Error) -> Self {
        ServerError::InternalError(format!("Error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_mapping() {
        let not_found: ServerError = CoreError::JobNotFound("abc".to_string()).into();
        assert!(matches!(not_found, ServerError::NotFound(_)));
        assert_eq!(not_found.to_string(), "Job abc not found");

        let conflict: ServerError = CoreError::JobExecutionError("bad".to_string()).into();
        assert!(matches!(conflict, ServerError::Conflict(_)));

        let provider: ServerError = CoreError::ProviderError("down".to_string()).into();
        assert!(matches!(provider, ServerError::ProviderError(_)));

        let runtime: ServerError = CoreError::StateStoreError("lock".to_string()).into();
        assert!(matches!(runtime, ServerError::RuntimeError(_)));
    }
}
