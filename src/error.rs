//! Error types for storage permission resolution

use thiserror::Error;

use crate::config::ConfigError;
use crate::mask::PermissionKind;

/// The main error type for permission operations
#[derive(Debug, Error)]
pub enum PermissionError {
    /// The only error surfaced to callers of the gate for a refused operation.
    /// Never carries mask values.
    #[error("access denied: {kind} on '{path}'")]
    AuthorizationDenied { path: String, kind: PermissionKind },

    #[error("inconsistent grant state: {0}")]
    InconsistentGrantState(String),

    #[error("permission record store unavailable: {0}")]
    RecordStoreUnavailable(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid mask: {0}")]
    InvalidMask(String),

    #[error("invalid sid: {0}")]
    InvalidSid(String),

    /// Failure reported by the wrapped storage provider
    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl PermissionError {
    pub fn denied(path: impl Into<String>, kind: PermissionKind) -> Self {
        PermissionError::AuthorizationDenied { path: path.into(), kind }
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, PermissionError::AuthorizationDenied { .. })
    }
}

/// Result type alias for permission operations
pub type Result<T> = std::result::Result<T, PermissionError>;

/// Convert a store-level error into `RecordStoreUnavailable`
pub fn err<E: std::error::Error>(e: E) -> PermissionError {
    PermissionError::RecordStoreUnavailable(e.to_string())
}
