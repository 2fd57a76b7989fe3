//! Error types for hukum-core.

use std::path::PathBuf;

use thiserror::Error;

/// Domain-specific errors for Hukum operations.
#[derive(Error, Debug)]
pub enum HukumError {
    /// The engine was used before `ensure_ready()` succeeded.
    #[error("Engine not initialized. Call `ensure_ready()` before serving queries.")]
    NotInitialized,

    /// Building the lexical index failed (e.g. every chunk tokenized to nothing).
    #[error("Failed to build lexical index: {reason}")]
    IndexBuild {
        /// Why the build was rejected.
        reason: String,
    },

    /// The lexical index has no documents for an operation that needs them.
    #[error("Lexical index is empty. Run `hukum index <PATHS>` first.")]
    IndexNotReady,

    /// A configuration value is invalid.
    #[error("Invalid configuration: {message}. {hint}")]
    InvalidConfiguration {
        /// Description of the invalid configuration.
        message: String,
        /// Actionable hint on how to fix it.
        hint: String,
    },

    /// Invalid argument provided to a command.
    #[error("{0}")]
    InvalidArgument(String),

    /// Lexical snapshot I/O error.
    #[error("Index store I/O error at `{path}`: {message}")]
    IndexStoreIo {
        /// Path to the snapshot file or directory.
        path: PathBuf,
        /// Description of the I/O error.
        message: String,
    },

    /// Lexical snapshot decode error or incompatible format.
    #[error("Index store parse error at `{path}`: {message}")]
    IndexStoreParse {
        /// Path to the snapshot file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Encoding or decoding of an in-memory structure failed.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Description of the failure.
        message: String,
    },

    // =========================================================================
    // Collaborator Errors
    // =========================================================================
    /// Semantic search backend failed.
    #[error("Semantic search via `{backend}` failed: {reason}")]
    SemanticSearch {
        /// The vector store backend.
        backend: String,
        /// Reason for the failure.
        reason: String,
    },

    /// Embedding the query or documents failed.
    #[error("Embedding with model `{model_id}` failed: {reason}")]
    Embedding {
        /// The embedding model identifier.
        model_id: String,
        /// Reason for the failure.
        reason: String,
    },

    /// Cross-encoder scoring failed.
    #[error("Reranker inference failed for model `{model_id}`: {reason}")]
    Reranker {
        /// The reranker model identifier.
        model_id: String,
        /// Reason for the failure.
        reason: String,
    },

    /// Answer generation failed, after the fallback attempt where one applies.
    #[error("Generation with model `{model_id}` failed: {reason}")]
    Generation {
        /// The generation model identifier.
        model_id: String,
        /// Reason for the failure.
        reason: String,
    },

    /// A collaborator could not be constructed or reached.
    #[error("Backend `{backend}` is not ready: {reason}")]
    BackendNotReady {
        /// The backend that is unavailable.
        backend: String,
        /// Reason why the backend is unavailable.
        reason: String,
    },

    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A wrapped generic error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HukumError {
    /// Shorthand for [`HukumError::InvalidConfiguration`].
    pub fn invalid_config(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
            hint: hint.into(),
        }
    }

    /// True for failures of optional collaborators that the query path absorbs.
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            Self::SemanticSearch { .. }
                | Self::Embedding { .. }
                | Self::Reranker { .. }
                | Self::BackendNotReady { .. }
        )
    }
}

/// Conversion from an infrastructure crate's result into `Result<T, HukumError>`.
///
/// Implemented in `db_adapter` and `model_adapter`.
pub trait IntoHukumResult<T> {
    /// Convert the error side into a [`HukumError`].
    fn into_hukum_result(self) -> Result<T, HukumError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_message_includes_hint() {
        let err = HukumError::invalid_config("lexical.b must be in [0, 1]", "Use 0.75");
        let msg = err.to_string();
        assert!(msg.contains("lexical.b"));
        assert!(msg.ends_with("Use 0.75"));
    }

    #[test]
    fn test_degradable_classification() {
        assert!(HukumError::SemanticSearch {
            backend: "lancedb".into(),
            reason: "down".into()
        }
        .is_degradable());
        assert!(!HukumError::Generation {
            model_id: "llama3".into(),
            reason: "timeout".into()
        }
        .is_degradable());
        assert!(!HukumError::NotInitialized.is_degradable());
    }
}
