//! Error types for the Calliope pipeline
//!
//! This module provides comprehensive error handling using thiserror for
//! structured error definitions and anyhow for error propagation.

use thiserror::Error;

/// Main error type for Calliope operations
#[derive(Error, Debug)]
pub enum CalliopeError {
    /// Generation agent request failed
    #[error("Agent API error: {0}")]
    AgentApi(String),

    /// Invalid content ID format
    #[error("Invalid content ID: {0}")]
    InvalidContentId(#[from] uuid::Error),

    /// Content item not found
    #[error("Content not found: {0}")]
    ContentNotFound(String),

    /// Poll loop interrupted before any state was observed
    #[error("Poll interrupted: {0}")]
    PollInterrupted(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid operation (e.g., approving a missing item)
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Resource already exists
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Result type alias for Calliope operations
pub type Result<T> = std::result::Result<T, CalliopeError>;

/// Convert anyhow::Error to CalliopeError
impl From<anyhow::Error> for CalliopeError {
    fn from(err: anyhow::Error) -> Self {
        CalliopeError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CalliopeError::ContentNotFound("test-id".to_string());
        assert_eq!(err.to_string(), "Content not found: test-id");
    }

    #[test]
    fn test_error_conversion() {
        let uuid_err = uuid::Uuid::parse_str("invalid");
        assert!(uuid_err.is_err());

        let calliope_err: CalliopeError = uuid_err.unwrap_err().into();
        assert!(matches!(calliope_err, CalliopeError::InvalidContentId(_)));
    }
}
