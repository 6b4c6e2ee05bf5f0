//! Error types for the spec drift agent
//!
//! Provides structured error types for spec loading, probing, and
//! reconciliation operations.

use thiserror::Error;

/// Main error type for drift operations
#[derive(Error, Debug)]
pub enum DriftError {
    /// Invalid input data or arguments
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// File access or I/O error
    #[error("File error: {0}")]
    FileError(String),

    /// Document or configuration parsing error
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Schema-related error
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// HTTP transport or API error
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl DriftError {
    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        DriftError::InvalidInput(msg.into())
    }

    /// Create a file error
    pub fn file_error(msg: impl Into<String>) -> Self {
        DriftError::FileError(msg.into())
    }

    /// Create a parse error
    pub fn parse_error(msg: impl Into<String>) -> Self {
        DriftError::ParseError(msg.into())
    }

    /// Create a schema error
    pub fn schema_error(msg: impl Into<String>) -> Self {
        DriftError::SchemaError(msg.into())
    }

    /// Create an HTTP error
    pub fn http_error(msg: impl Into<String>) -> Self {
        DriftError::HttpError(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        DriftError::InternalError(msg.into())
    }

    /// Check if this is a user-facing error (vs internal)
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            DriftError::InvalidInput(_)
                | DriftError::FileError(_)
                | DriftError::ParseError(_)
                | DriftError::SchemaError(_)
        )
    }
}

impl From<std::io::Error> for DriftError {
    fn from(err: std::io::Error) -> Self {
        DriftError::FileError(err.to_string())
    }
}

impl From<serde_json::Error> for DriftError {
    fn from(err: serde_json::Error) -> Self {
        DriftError::ParseError(format!("JSON error: {}", err))
    }
}

impl From<serde_yaml::Error> for DriftError {
    fn from(err: serde_yaml::Error) -> Self {
        DriftError::ParseError(format!("YAML error: {}", err))
    }
}

impl From<toml::de::Error> for DriftError {
    fn from(err: toml::de::Error) -> Self {
        DriftError::ParseError(format!("TOML error: {}", err))
    }
}

impl From<reqwest::Error> for DriftError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DriftError::HttpError(format!("request timed out: {}", err))
        } else if err.is_connect() {
            DriftError::HttpError(format!("connection failed: {}", err))
        } else {
            DriftError::HttpError(err.to_string())
        }
    }
}

/// Result type alias for drift operations
pub type Result<T> = std::result::Result<T, DriftError>;
