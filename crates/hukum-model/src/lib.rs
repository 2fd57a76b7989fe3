//! # hukum-model
//!
//! Inference layer for Hukum: embeddings, cross-encoder reranking and
//! answer generation.
//!
//! - **Embedding models**: bi-encoders producing normalized dense vectors
//! - **Reranker models**: cross-encoders scoring (query, passage) pairs
//! - **Text generators**: language models producing the final answer
//! - **Model locator**: runtime path resolution for on-disk models
//!
//! Test doubles live in consuming crates; everything here is a real backend.
//!
//! ## Model Location
//!
//! 1. `$HUKUM_MODELS_DIR`
//! 2. `~/.hukum/models`
//! 3. `{exe_dir}/models`
//!
//! ## Features
//!
//! - `embedded` (default): local Candle inference
//! - `ollama` (default): generation through an Ollama server
//! - `metal` / `cuda`: GPU acceleration for Candle
//!
//! ## Usage
//!
//! ```ignore
//! use hukum_model::{create_embedding_model, EmbeddingConfig};
//!
//! let model = create_embedding_model(&EmbeddingConfig::default())?;
//! let vectors = model.embed(&["Pasal 1 ayat (1)"])?;
//! assert_eq!(vectors[0].len(), model.dimension());
//! ```

pub mod config;
pub mod error;
pub mod model_locator;

#[cfg(feature = "embedded")]
mod device;

#[cfg(feature = "embedded")]
mod embedding;

#[cfg(feature = "embedded")]
mod reranker;

#[cfg(feature = "ollama")]
mod generation;

pub use error::{ModelError, ModelResult};

pub use config::{
    DevicePreference, EmbeddingConfig, GenerationBackendKind, GenerationConfig,
    HuggingFaceModelConfig, ModelArchitecture, ModelInfo, RerankerConfig,
};

pub use model_locator::{
    ModelKind, ModelLocator, EMBEDDINGS_SUBDIR, HUKUM_MODELS_DIR_ENV, REQUIRED_MODEL_FILES,
    RERANKERS_SUBDIR,
};

/// Multilingual embedding model with Indonesian coverage.
pub const DEFAULT_EMBEDDING_MODEL_ID: &str = "BAAI/bge-m3";
pub const DEFAULT_RERANKER_MODEL_ID: &str = "BAAI/bge-reranker-v2-m3";
pub const DEFAULT_GENERATION_MODEL: &str = "llama3";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

// ============================================================================
// Embedding Model Trait
// ============================================================================

/// Bi-encoder producing L2-normalized embeddings of length `dimension()`.
pub trait EmbeddingModel: Send + Sync + std::fmt::Debug {
    /// Embed a batch of texts, one vector per input.
    fn embed(&self, texts: &[&str]) -> ModelResult<Vec<Vec<f32>>>;

    fn embed_batch(&self, texts: &[String]) -> ModelResult<Vec<Vec<f32>>> {
        let refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
        self.embed(&refs)
    }

    /// Prefix applied to queries only. Empty means none.
    fn query_instruction(&self) -> &str {
        ""
    }

    /// Embed a search query, applying the query instruction.
    fn embed_query(&self, query: &str) -> ModelResult<Vec<f32>> {
        let text = format!("{}{}", self.query_instruction(), query);
        self.embed(&[text.as_str()])?
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::embedding_failed(self.model_id(), "empty embedding batch"))
    }

    /// Run one dummy inference so the first real query is not slow.
    fn warm_up(&self) -> ModelResult<()> {
        let _ = self.embed(&["warmup"])?;
        Ok(())
    }

    fn dimension(&self) -> usize;

    fn max_sequence_length(&self) -> usize;

    fn model_info(&self) -> &ModelInfo;

    fn model_id(&self) -> &str {
        &self.model_info().model_id
    }
}

// ============================================================================
// Reranker Model Trait
// ============================================================================

/// Cross-encoder relevance scorer. Higher scores mean more relevant.
pub trait RerankerModel: Send + Sync + std::fmt::Debug {
    /// Score (query, passage) pairs, returning one score per pair in order.
    fn score_pairs(&self, pairs: &[(String, String)]) -> ModelResult<Vec<f32>>;

    /// Score several passages against one query.
    fn score_batch(&self, query: &str, documents: &[String]) -> ModelResult<Vec<f32>> {
        let pairs: Vec<(String, String)> = documents
            .iter()
            .map(|doc| (query.to_string(), doc.clone()))
            .collect();
        self.score_pairs(&pairs)
    }

    fn warm_up(&self) -> ModelResult<()> {
        let _ = self.score_pairs(&[("warmup".to_string(), "warmup doc".to_string())])?;
        Ok(())
    }

    fn model_id(&self) -> &str;
}

// ============================================================================
// Text Generator Trait
// ============================================================================

/// Sampling options for a single generation call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerateOptions {
    pub max_tokens: usize,
    pub temperature: f32,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            max_tokens: 2048,
            temperature: 0.5,
        }
    }
}

/// Fragments of a streamed generation, in order.
pub type TokenStream = Box<dyn Iterator<Item = ModelResult<String>> + Send>;

/// Language model turning a fully formatted prompt into text.
pub trait TextGenerator: Send + Sync + std::fmt::Debug {
    fn generate(&self, prompt: &str, options: &GenerateOptions) -> ModelResult<String>;

    fn generate_stream(&self, prompt: &str, options: &GenerateOptions) -> ModelResult<TokenStream>;

    /// Cheap reachability check; never errors.
    fn is_available(&self) -> bool;

    fn model_id(&self) -> &str;
}

// ============================================================================
// Factory Functions
// ============================================================================

#[cfg(feature = "embedded")]
pub fn create_embedding_model(config: &EmbeddingConfig) -> ModelResult<Box<dyn EmbeddingModel>> {
    Ok(Box::new(embedding::CandleEmbeddingModel::new(config)?))
}

#[cfg(not(feature = "embedded"))]
pub fn create_embedding_model(_config: &EmbeddingConfig) -> ModelResult<Box<dyn EmbeddingModel>> {
    Err(ModelError::ProviderNotAvailable {
        provider: "candle".to_string(),
        reason: "No embedding providers available. Enable the 'embedded' feature.".to_string(),
    })
}

#[cfg(feature = "embedded")]
pub fn create_reranker_model(config: &RerankerConfig) -> ModelResult<Box<dyn RerankerModel>> {
    Ok(Box::new(reranker::CandleRerankerModel::new(config)?))
}

#[cfg(not(feature = "embedded"))]
pub fn create_reranker_model(_config: &RerankerConfig) -> ModelResult<Box<dyn RerankerModel>> {
    Err(ModelError::ProviderNotAvailable {
        provider: "candle".to_string(),
        reason: "No reranker providers available. Enable the 'embedded' feature.".to_string(),
    })
}

#[cfg(feature = "ollama")]
pub fn create_text_generator(config: &GenerationConfig) -> ModelResult<Box<dyn TextGenerator>> {
    match config.backend {
        GenerationBackendKind::Ollama => Ok(Box::new(generation::OllamaGenerator::new(config)?)),
    }
}

#[cfg(not(feature = "ollama"))]
pub fn create_text_generator(config: &GenerationConfig) -> ModelResult<Box<dyn TextGenerator>> {
    Err(ModelError::ProviderNotAvailable {
        provider: config.backend.to_string(),
        reason: "No generation backends available. Enable the 'ollama' feature.".to_string(),
    })
}

#[cfg(feature = "embedded")]
pub use embedding::CandleEmbeddingModel;

#[cfg(feature = "embedded")]
pub use reranker::CandleRerankerModel;

#[cfg(feature = "ollama")]
pub use generation::OllamaGenerator;

#[cfg(test)]
mod tests {
    use super::*;

    /// Bag-of-letters embedder, enough to exercise the default methods.
    #[derive(Debug)]
    struct LetterCounts {
        info: ModelInfo,
    }

    impl EmbeddingModel for LetterCounts {
        fn embed(&self, texts: &[&str]) -> ModelResult<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    let mut v = vec![0.0; 26];
                    for c in t.chars().filter(|c| c.is_ascii_lowercase()) {
                        v[(c as u8 - b'a') as usize] += 1.0;
                    }
                    v
                })
                .collect())
        }

        fn query_instruction(&self) -> &str {
            "q: "
        }

        fn dimension(&self) -> usize {
            26
        }

        fn max_sequence_length(&self) -> usize {
            512
        }

        fn model_info(&self) -> &ModelInfo {
            &self.info
        }
    }

    #[test]
    fn test_embed_query_applies_instruction() {
        let model = LetterCounts {
            info: ModelInfo::new("letters", 26, 512),
        };
        let v = model.embed_query("a").unwrap();
        // "q: a" -> one 'q', one 'a'
        assert_eq!(v[0], 1.0);
        assert_eq!(v[(b'q' - b'a') as usize], 1.0);
        assert_eq!(model.model_id(), "letters");
    }

    #[derive(Debug)]
    struct LengthScorer;

    impl RerankerModel for LengthScorer {
        fn score_pairs(&self, pairs: &[(String, String)]) -> ModelResult<Vec<f32>> {
            Ok(pairs.iter().map(|(_, d)| d.len() as f32).collect())
        }

        fn model_id(&self) -> &str {
            "length"
        }
    }

    #[test]
    fn test_score_batch_builds_pairs() {
        let scores = LengthScorer
            .score_batch("q", &["ab".to_string(), "abcd".to_string()])
            .unwrap();
        assert_eq!(scores, vec![2.0, 4.0]);
        assert!(LengthScorer.warm_up().is_ok());
    }

    #[test]
    fn test_generate_options_default() {
        let opts = GenerateOptions::default();
        assert_eq!(opts.max_tokens, 2048);
        assert!((opts.temperature - 0.5).abs() < f32::EPSILON);
    }
}
