//! Error types for confsync core.

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in confsync core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A file could not be read or parsed.
    #[error("file \"{path}\" is invalid: {message}")]
    InvalidFile {
        /// Project relative path of the file.
        path: String,
        /// Description of the problem.
        message: String,
    },

    /// Manifest is missing or malformed.
    #[error("manifest is not valid: {message}")]
    InvalidManifest {
        /// Description of the problem.
        message: String,
    },

    /// Project directory (the `.confsync` marker) was not found.
    #[error("project directory not found, \".confsync\" is missing in \"{path}\" and its parents")]
    ProjectNotFound {
        /// Directory where the search started.
        path: String,
    },

    /// Another process holds the project lock.
    #[error("project is locked: another process is working with it")]
    ProjectLocked,

    /// Object failed structural validation.
    #[error("{object} is not valid: {message}")]
    Validation {
        /// Description of the object.
        object: String,
        /// Description of the problem.
        message: String,
    },

    /// Two objects resolved to the same path.
    #[error("path \"{path}\" is already used by {owner}, it cannot be used by {other}")]
    PathCollision {
        /// The colliding path.
        path: String,
        /// Key that owns the path.
        owner: String,
        /// Key that requested the path.
        other: String,
    },

    /// Parent-path resolution visited the same key twice.
    #[error("cyclic parent path detected at {key}")]
    CyclicPath {
        /// Key where the cycle was detected.
        key: String,
    },

    /// Object was expected in the state but is missing.
    #[error("{key} not found")]
    NotFound {
        /// Description of the missing object.
        key: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },

    /// Operation was cancelled before it started.
    #[error("operation cancelled")]
    Cancelled,

    /// A worker task panicked or was aborted.
    #[error("worker failed: {message}")]
    WorkerFailed {
        /// Description of the failure.
        message: String,
    },

    /// Several errors collected from independent operations.
    #[error("{0}")]
    Multi(MultiError),
}

impl CoreError {
    /// Creates an invalid file error.
    pub fn invalid_file(path: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::InvalidFile {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Creates an invalid manifest error.
    pub fn invalid_manifest(message: impl Into<String>) -> Self {
        Self::InvalidManifest {
            message: message.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(object: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            object: object.into(),
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(key: impl fmt::Display) -> Self {
        Self::NotFound {
            key: key.to_string(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }
}

/// One entry of a [`MultiError`].
#[derive(Debug, Clone, PartialEq, Eq)]
enum ErrorItem {
    Message(String),
    Nested(MultiError),
}

/// Aggregate of independent failures.
///
/// Errors are kept in insertion order. A prefix turns the aggregate into a
/// titled group, which renders as:
///
/// ```text
/// cannot perform the push operation:
/// - default branch cannot be deleted
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultiError {
    prefix: Option<String>,
    items: Vec<ErrorItem>,
}

impl MultiError {
    /// Creates an empty aggregate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty aggregate with a title.
    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            items: Vec::new(),
        }
    }

    /// Appends an error. Aggregates are nested, other errors are flattened to text.
    pub fn push(&mut self, error: impl Into<CoreError>) {
        match error.into() {
            CoreError::Multi(multi) => self.append(multi),
            other => self.items.push(ErrorItem::Message(other.to_string())),
        }
    }

    /// Appends a plain message.
    pub fn push_message(&mut self, message: impl Into<String>) {
        self.items.push(ErrorItem::Message(message.into()));
    }

    /// Appends another aggregate.
    ///
    /// An untitled aggregate is merged item by item, a titled one is nested.
    pub fn append(&mut self, other: MultiError) {
        if other.is_empty() {
            return;
        }
        if other.prefix.is_none() {
            self.items.extend(other.items);
        } else {
            self.items.push(ErrorItem::Nested(other));
        }
    }

    /// Number of direct entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the aggregate as an error if anything was collected.
    pub fn into_result(self) -> CoreResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(CoreError::Multi(self))
        }
    }

    /// Wraps the aggregate under a new title.
    #[must_use]
    pub fn prefixed(self, prefix: impl Into<String>) -> MultiError {
        let mut out = MultiError::with_prefix(prefix);
        out.append(self);
        out
    }

    fn write_items(
        &self,
        f: &mut fmt::Formatter<'_>,
        indent: usize,
        mut newline: bool,
    ) -> fmt::Result {
        let pad = "  ".repeat(indent);
        for item in &self.items {
            if newline {
                writeln!(f)?;
            }
            newline = true;
            match item {
                ErrorItem::Message(message) => write!(f, "{pad}- {message}")?,
                ErrorItem::Nested(nested) => {
                    write!(f, "{pad}- {}:", nested.prefix.as_deref().unwrap_or_default())?;
                    nested.write_items(f, indent + 1, true)?;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(prefix) => {
                write!(f, "{prefix}:")?;
                self.write_items(f, 0, true)
            }
            None => self.write_items(f, 0, false),
        }
    }
}

impl std::error::Error for MultiError {}

impl From<MultiError> for CoreError {
    fn from(value: MultiError) -> Self {
        CoreError::Multi(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_multi_error_is_ok() {
        assert!(MultiError::new().into_result().is_ok());
        assert!(MultiError::with_prefix("title").into_result().is_ok());
    }

    #[test]
    fn prefixed_rendering() {
        let mut errors = MultiError::with_prefix("cannot perform the push operation");
        errors.push_message("default branch cannot be deleted");
        assert_eq!(
            errors.to_string(),
            "cannot perform the push operation:\n- default branch cannot be deleted"
        );
    }

    #[test]
    fn nested_rendering() {
        let mut inner = MultiError::with_prefix("cannot save \"main\"");
        inner.push_message("disk full");
        inner.push_message("permission denied");

        let mut outer = MultiError::with_prefix("local changes failed");
        outer.append(inner);
        outer.push(CoreError::ProjectLocked);

        assert_eq!(
            outer.to_string(),
            "local changes failed:\n- cannot save \"main\":\n  - disk full\n  - permission denied\n- project is locked: another process is working with it"
        );
    }

    #[test]
    fn untitled_aggregates_are_flattened() {
        let mut a = MultiError::new();
        a.push_message("first");
        let mut b = MultiError::new();
        b.push_message("second");
        a.push(CoreError::Multi(b));
        assert_eq!(a.len(), 2);
        assert_eq!(a.to_string(), "- first\n- second");
    }
}
