//! Error types for hukum-model.
//!
//! Discovery errors spell out where models were searched and how to install
//! them, since a missing model directory is the most common first-run failure.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for hukum-model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors that can occur in hukum-model operations.
#[derive(Debug, Error)]
pub enum ModelError {
    // ========================================================================
    // Model discovery errors
    // ========================================================================
    /// No models directory found in any search location.
    #[error("{}", format_models_dir_not_found(.searched))]
    ModelsDirectoryNotFound { searched: Vec<PathBuf> },

    /// Model files not found at expected location.
    #[error("{}", format_model_not_found(.model_id, .path))]
    ModelNotFound { model_id: String, path: PathBuf },

    /// Model directory exists but is missing required files.
    #[error("{}", format_incomplete_model(.path, .missing))]
    IncompleteModelFiles {
        path: PathBuf,
        missing: Vec<&'static str>,
    },

    // ========================================================================
    // Model loading errors
    // ========================================================================
    #[error("Failed to load model '{model_id}': {message}")]
    ModelLoad { model_id: String, message: String },

    #[error("Invalid model configuration: {message}\n\nThe model's config.json may be corrupted or incompatible.\nTry re-downloading the model from Hugging Face.")]
    InvalidConfig { message: String },

    // ========================================================================
    // Inference errors
    // ========================================================================
    #[error("Tokenization failed: {message}")]
    Tokenization { message: String },

    #[error("Embedding failed for model '{model_id}': {message}")]
    EmbeddingFailed { model_id: String, message: String },

    #[error("Reranking failed for model '{model_id}': {message}")]
    RerankingFailed { model_id: String, message: String },

    /// Text generation failed or the server returned an unusable response.
    #[error("Generation failed for model '{model_id}': {message}")]
    GenerationFailed { model_id: String, message: String },

    // ========================================================================
    // Provider errors
    // ========================================================================
    #[error("Provider '{provider}' not available: {reason}")]
    ProviderNotAvailable { provider: String, reason: String },

    #[error("Compute device not available: {reason}\n\nHukum tried to use GPU acceleration but it is not available.\nSet reranker.device to 'cpu' in ~/.hukum/config.yaml to use CPU-only inference.")]
    DeviceNotAvailable { reason: String },

    /// HTTP transport error talking to a generation server.
    #[error("HTTP error calling {url}: {message}")]
    Http { url: String, message: String },

    // ========================================================================
    // I/O errors
    // ========================================================================
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn format_models_dir_not_found(searched: &[PathBuf]) -> String {
    let list = searched
        .iter()
        .enumerate()
        .map(|(i, p)| format!("  {}. {}", i + 1, p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Models directory not found.\n\n\
        Hukum searched these locations:\n\
        {list}\n\n\
        To fix:\n\
        1. Set $HUKUM_MODELS_DIR to your models directory, OR\n\
        2. Download models into ~/.hukum/models/, OR\n\
        3. Place a models/ directory next to the hukum binary."
    )
}

fn format_model_not_found(model_id: &str, path: &std::path::Path) -> String {
    format!(
        "Model not found: {model_id}\n\n\
        Expected at: {}\n\n\
        Download it from Hugging Face so the directory contains\n\
        config.json, model.safetensors and tokenizer.json.",
        path.display()
    )
}

fn format_incomplete_model(path: &std::path::Path, missing: &[&str]) -> String {
    format!(
        "Incomplete model installation at {}\n\n\
        Missing files: {}\n\n\
        A complete model directory must contain:\n\
        - config.json (model configuration)\n\
        - model.safetensors (model weights)\n\
        - tokenizer.json (tokenizer configuration)",
        path.display(),
        missing.join(", ")
    )
}

impl ModelError {
    pub fn model_load(model_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ModelLoad {
            model_id: model_id.into(),
            message: message.into(),
        }
    }

    pub fn embedding_failed(model_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EmbeddingFailed {
            model_id: model_id.into(),
            message: message.into(),
        }
    }

    pub fn reranking_failed(model_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RerankingFailed {
            model_id: model_id.into(),
            message: message.into(),
        }
    }

    pub fn generation_failed(model_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::GenerationFailed {
            model_id: model_id.into(),
            message: message.into(),
        }
    }

    pub fn tokenization(message: impl Into<String>) -> Self {
        Self::Tokenization {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_models_dir_not_found_lists_locations() {
        let err = ModelError::ModelsDirectoryNotFound {
            searched: vec![PathBuf::from("/a/models"), PathBuf::from("/b/models")],
        };
        let msg = err.to_string();
        assert!(msg.contains("1. /a/models"));
        assert!(msg.contains("2. /b/models"));
        assert!(msg.contains("HUKUM_MODELS_DIR"));
    }

    #[test]
    fn test_incomplete_model_lists_missing() {
        let err = ModelError::IncompleteModelFiles {
            path: PathBuf::from("/m/bge-m3"),
            missing: vec!["tokenizer.json"],
        };
        assert!(err.to_string().contains("Missing files: tokenizer.json"));
    }
}
