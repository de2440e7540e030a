//! Error types for the sync engine.

use confsync_core::{CoreError, MultiError};
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Error from the object model or the local side.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The API answered with an error status.
    #[error("API error {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body.
        message: String,
    },

    /// The request did not reach the API.
    #[error("transport error: {0}")]
    Transport(String),

    /// The API response could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A plan breaks a domain invariant and was not executed.
    #[error("{0}")]
    InvalidPlan(String),

    /// The project directory could not be loaded.
    #[error("project directory is invalid:\n{0}")]
    InvalidLocalState(CoreError),

    /// Missing or invalid engine configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,
}

impl SyncError {
    /// Creates an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Returns true if the API reported that the object already exists.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        match self {
            SyncError::Api { status, message } => {
                (*status == 400 || *status == 409) && message.to_lowercase().contains("already exists")
            }
            _ => false,
        }
    }

    /// Returns true if the API reported that the object does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::Api { status: 404, .. })
    }
}

impl From<MultiError> for SyncError {
    fn from(value: MultiError) -> Self {
        SyncError::Core(CoreError::Multi(value))
    }
}

/// Appends a sync error to an aggregate, keeping nested aggregates nested.
pub fn push_error(errors: &mut MultiError, error: SyncError) {
    match error {
        SyncError::Core(e) => errors.push(e),
        other => errors.push_message(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_exists_detection() {
        assert!(SyncError::api(400, "Configuration already exists.").is_already_exists());
        assert!(!SyncError::api(500, "already exists").is_already_exists());
        assert!(!SyncError::Transport("x".into()).is_already_exists());
        assert!(SyncError::api(404, "not found").is_not_found());
    }

    #[test]
    fn nested_aggregate_stays_nested() {
        let mut inner = MultiError::with_prefix("inner");
        inner.push_message("a");
        let mut outer = MultiError::with_prefix("outer");
        push_error(&mut outer, SyncError::from(inner));
        push_error(&mut outer, SyncError::Cancelled);
        assert_eq!(outer.to_string(), "outer:\n- inner:\n  - a\n- operation cancelled");
    }
}
