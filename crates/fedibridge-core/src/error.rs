//! Error types for `fedibridge` core library.

use thiserror::Error;

/// Result type alias using `fedibridge` Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for `fedibridge` operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The (module, method) pair is not part of the permission table
    #[error("No permission configured for {module}.{method}")]
    UnknownPermission { module: String, method: String },

    /// Envelope does not match the namespace/kind contract
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn unknown_permission(module: &str, method: &str) -> Self {
        Self::UnknownPermission {
            module: module.to_string(),
            method: method.to_string(),
        }
    }
}
