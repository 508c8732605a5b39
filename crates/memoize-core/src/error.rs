//! Error types for the memoizing wrapper.

use std::path::{Path, PathBuf};

/// Memoization errors.
///
/// None of these are retried or recovered from inside the crate: the
/// operation that failed returns the error and nothing further executes.
#[derive(Debug, thiserror::Error)]
pub enum MemoizeError {
    /// An argument or return value could not be encoded or decoded.
    #[error("serialization error: {message}")]
    Serialization { message: String },

    /// Creating, reading, writing or removing something on disk failed.
    #[error("storage error at {}: {message}", path.display())]
    Storage { path: PathBuf, message: String },

    /// An explicit cache key cannot be used as a file name.
    #[error("invalid cache key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// A wrapped function asked for an argument that is missing or unresolved.
    #[error("argument error: {message}")]
    Argument { message: String },

    /// Configuration could not be loaded or is inconsistent.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl MemoizeError {
    pub(crate) fn serialization(err: impl std::fmt::Display) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }

    pub(crate) fn storage(path: &Path, action: &str, err: impl std::fmt::Display) -> Self {
        Self::Storage {
            path: path.to_path_buf(),
            message: format!("failed to {}: {}", action, err),
        }
    }

    /// Whether the error came from the on-disk tier.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }

    /// Whether the error came from the serialization collaborator.
    pub fn is_serialization(&self) -> bool {
        matches!(self, Self::Serialization { .. })
    }
}

impl From<serde_json::Error> for MemoizeError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err)
    }
}

/// Result type for memoization operations.
pub type MemoizeResult<T> = Result<T, MemoizeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_message_includes_path() {
        let err = MemoizeError::storage(Path::new("/tmp/x"), "write cache entry", "disk full");
        assert!(err.is_storage());
        assert_eq!(
            err.to_string(),
            "storage error at /tmp/x: failed to write cache entry: disk full"
        );
    }

    #[test]
    fn test_json_error_is_serialization() {
        let err: MemoizeError = serde_json::from_str::<u32>("\"nope\"").unwrap_err().into();
        assert!(err.is_serialization());
        assert!(!err.is_storage());
    }
}
