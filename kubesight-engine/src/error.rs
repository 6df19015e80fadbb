//! Error types for the engine.

use thiserror::Error;

use crate::kind::ResourceKind;

/// Result type alias using [`EngineError`].
pub type Result<T> = std::result::Result<T, EngineError>;

/// Configuration-time errors. These are the only errors that stop the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A resource kind name has no generator.
    #[error("Unknown resource kind: {0}")]
    UnknownKind(String),

    /// Malformed allow/deny configuration.
    #[error("Invalid metric filter: {0}")]
    Filter(String),

    /// Malformed label join.
    #[error("Invalid label join: {0}")]
    Join(String),

    /// Any other configuration problem.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The initial listing of a kind failed.
    #[error("Failed to start {kind} watcher: {source}")]
    StartFailed {
        kind: ResourceKind,
        #[source]
        source: ControlPlaneError,
    },
}

/// Errors reported by a [`ControlPlane`](crate::ControlPlane).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControlPlaneError {
    /// The control plane could not be reached.
    #[error("Control plane unavailable: {0}")]
    Unavailable(String),

    /// The requested resource version has been compacted away.
    #[error("Watch expired at resource version {0}")]
    Expired(u64),

    /// Anything else the transport reports.
    #[error("Control plane error: {0}")]
    Other(String),
}

impl ControlPlaneError {
    /// Whether the watcher must re-list before watching again.
    pub fn is_expired(&self) -> bool {
        matches!(self, ControlPlaneError::Expired(_))
    }
}

/// A generator could not make sense of an object.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerateError {
    /// A required field is absent.
    #[error("missing field '{0}'")]
    MissingField(String),

    /// A field has an unexpected type or value.
    #[error("invalid value for '{field}': {reason}")]
    InvalidField { field: String, reason: String },
}

impl GenerateError {
    /// Create an invalid field error.
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// A sender could not accept a sample.
#[derive(Error, Debug)]
pub enum SendError {
    /// The sender refused the sample.
    #[error("Sample rejected: {0}")]
    Rejected(String),

    /// Writing to the sink failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The sample could not be encoded.
    #[error("Encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}
