//! Error types for hukum-db.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for hukum-db operations.
pub type DbResult<T> = Result<T, DbError>;

/// Errors that can occur in hukum-db operations.
#[derive(Debug, Error)]
pub enum DbError {
    /// Vector store I/O error.
    #[error("Vector store I/O error at {path}: {message}")]
    VectorIo { path: PathBuf, message: String },

    /// Vector store parse error.
    #[error("Vector store parse error at {path}: {message}")]
    VectorParse { path: PathBuf, message: String },

    /// Vector dimension mismatch.
    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Vector store not found.
    #[error("Vector store not found at {path}")]
    StoreNotFound { path: PathBuf },

    /// Vector store exists on disk but does not match the requested configuration.
    #[error("Vector store at {path} is incompatible: {reason}")]
    StoreIncompatible { path: PathBuf, reason: String },

    /// Requested backend is unknown or compiled out.
    #[error("Vector store backend '{backend}' is unavailable: {reason}")]
    BackendUnavailable { backend: String, reason: String },

    /// LanceDB error.
    #[cfg(feature = "lancedb")]
    #[error("LanceDB error: {message}")]
    LanceDb { message: String },

    /// IO error wrapper.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error wrapper.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic internal error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a vector I/O error.
    pub fn vector_io(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::VectorIo {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a vector parse error.
    pub fn vector_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::VectorParse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a store incompatible error.
    pub fn store_incompatible(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::StoreIncompatible {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

#[cfg(feature = "lancedb")]
impl From<lancedb::Error> for DbError {
    fn from(err: lancedb::Error) -> Self {
        Self::LanceDb {
            message: err.to_string(),
        }
    }
}
