//! Error types for the check.

use kubesight_engine::EngineError;
use thiserror::Error;

/// Result type alias using [`CheckError`].
pub type Result<T> = std::result::Result<T, CheckError>;

/// Errors that stop the check.
#[derive(Error, Debug)]
pub enum CheckError {
    /// Configuration file not found.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration parse error.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration validation error.
    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    /// Cluster fixture could not be loaded.
    #[error("Failed to load fixture: {0}")]
    Fixture(#[source] kubesight_common::Error),

    /// The engine rejected its configuration.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Logging setup failed.
    #[error(transparent)]
    Logging(kubesight_common::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CheckError {
    /// Create a configuration validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ConfigValidation(msg.into())
    }
}

impl From<json5::Error> for CheckError {
    fn from(err: json5::Error) -> Self {
        Self::ConfigParse(err.to_string())
    }
}
