//! Adapter layer for hukum-model infrastructure.
//!
//! Bridges hukum-model implementations into the engine ports:
//!
//! - Error conversion from `ModelError` to `HukumError`
//! - Config conversion from the YAML sections to hukum-model configs
//! - [`ModelEmbedding`], [`ModelReranker`] and [`ModelGenerator`] wrappers
//!
//! ```text
//! hukum-core engine / reranker / semantic retriever
//!        ↓
//!   model_adapter (this module)
//!        ↓
//!     hukum-model (Candle embeddings + reranking, Ollama generation)
//! ```

use std::sync::Arc;

use hukum_model::{GenerateOptions, ModelError, ModelResult};

use crate::config::{EmbeddingSection, GenerationSection, RerankerSection};
use crate::errors::{HukumError, IntoHukumResult};
use crate::ports::{EmbeddingPort, GenerationParams, GenerationPort, RerankingPort, TokenStream};

// ============================================================================
// Error Conversion
// ============================================================================

/// Convert a hukum-model error to a hukum-core error.
pub fn from_model_error(err: ModelError) -> HukumError {
    match err {
        ModelError::ModelsDirectoryNotFound { searched } => {
            let paths = searched
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            HukumError::BackendNotReady {
                backend: "model-locator".to_string(),
                reason: format!("Models directory not found. Searched: {}", paths),
            }
        }

        ModelError::ModelNotFound { model_id, path } => HukumError::BackendNotReady {
            backend: model_id,
            reason: format!("Model not found at {}", path.display()),
        },

        ModelError::IncompleteModelFiles { path, missing } => HukumError::BackendNotReady {
            backend: path.display().to_string(),
            reason: format!("Missing model files: {}", missing.join(", ")),
        },

        ModelError::ModelLoad { model_id, message } => HukumError::BackendNotReady {
            backend: model_id,
            reason: message,
        },

        ModelError::InvalidConfig { message } => HukumError::invalid_config(
            message,
            "Re-download the model or check its config.json",
        ),

        ModelError::Tokenization { message } => HukumError::Embedding {
            model_id: "tokenizer".to_string(),
            reason: message,
        },

        ModelError::EmbeddingFailed { model_id, message } => HukumError::Embedding {
            model_id,
            reason: message,
        },

        ModelError::RerankingFailed { model_id, message } => HukumError::Reranker {
            model_id,
            reason: message,
        },

        ModelError::GenerationFailed { model_id, message } => HukumError::Generation {
            model_id,
            reason: message,
        },

        ModelError::ProviderNotAvailable { provider, reason } => HukumError::BackendNotReady {
            backend: provider,
            reason,
        },

        ModelError::DeviceNotAvailable { reason } => HukumError::BackendNotReady {
            backend: "device".to_string(),
            reason,
        },

        ModelError::Http { url, message } => HukumError::BackendNotReady {
            backend: url,
            reason: message,
        },

        ModelError::Io(e) => HukumError::Io(e),

        ModelError::Json(e) => HukumError::Json(e),
    }
}

impl<T> IntoHukumResult<T> for ModelResult<T> {
    fn into_hukum_result(self) -> Result<T, HukumError> {
        self.map_err(from_model_error)
    }
}

// ============================================================================
// Config Conversion
// ============================================================================

pub fn to_model_embedding_config(section: &EmbeddingSection) -> hukum_model::EmbeddingConfig {
    let mut config = hukum_model::EmbeddingConfig {
        model_id: section.model_id.clone(),
        device: section.device,
        local_path: section.local_path.clone(),
        batch_size: section.batch_size,
        ..Default::default()
    };
    if let Some(instruction) = &section.query_instruction {
        config.query_instruction = instruction.clone();
    }
    config
}

pub fn to_model_reranker_config(section: &RerankerSection) -> hukum_model::RerankerConfig {
    hukum_model::RerankerConfig {
        model_id: section.model_id.clone(),
        device: section.device,
        local_path: section.local_path.clone(),
        max_batch: section.max_batch,
        ..Default::default()
    }
}

pub fn to_model_generation_config(section: &GenerationSection) -> hukum_model::GenerationConfig {
    hukum_model::GenerationConfig {
        model: section.model.clone(),
        base_url: section.base_url.clone(),
        timeout_secs: section.timeout_secs,
        ..Default::default()
    }
}

// ============================================================================
// Embedding Wrapper
// ============================================================================

/// [`EmbeddingPort`] over a hukum-model embedding model.
#[derive(Debug)]
pub struct ModelEmbedding {
    inner: Box<dyn hukum_model::EmbeddingModel>,
}

impl ModelEmbedding {
    pub fn new(model: Box<dyn hukum_model::EmbeddingModel>) -> Self {
        Self { inner: model }
    }

    pub fn from_config(section: &EmbeddingSection) -> Result<Self, HukumError> {
        let model = hukum_model::create_embedding_model(&to_model_embedding_config(section))
            .into_hukum_result()?;
        Ok(Self::new(model))
    }
}

impl EmbeddingPort for ModelEmbedding {
    fn embed_query(&self, text: &str) -> Result<Vec<f32>, HukumError> {
        self.inner.embed_query(text).into_hukum_result()
    }

    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, HukumError> {
        self.inner.embed_batch(texts).into_hukum_result()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    fn ensure_ready(&self) -> Result<(), HukumError> {
        self.inner.warm_up().into_hukum_result()
    }
}

// ============================================================================
// Reranker Wrapper
// ============================================================================

/// [`RerankingPort`] over a hukum-model cross-encoder.
#[derive(Debug)]
pub struct ModelReranker {
    inner: Box<dyn hukum_model::RerankerModel>,
}

impl ModelReranker {
    pub fn new(model: Box<dyn hukum_model::RerankerModel>) -> Self {
        Self { inner: model }
    }

    pub fn from_config(section: &RerankerSection) -> Result<Self, HukumError> {
        let model = hukum_model::create_reranker_model(&to_model_reranker_config(section))
            .into_hukum_result()?;
        Ok(Self::new(model))
    }
}

impl RerankingPort for ModelReranker {
    fn score_batch(&self, pairs: &[(String, String)]) -> Result<Vec<f32>, HukumError> {
        self.inner.score_pairs(pairs).into_hukum_result()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    fn warm_up(&self) -> Result<(), HukumError> {
        self.inner.warm_up().into_hukum_result()
    }
}

// ============================================================================
// Generation Wrapper
// ============================================================================

/// [`GenerationPort`] over a hukum-model text generator.
///
/// Every failure surfaces as [`HukumError::Generation`] tagged with the model id.
#[derive(Debug)]
pub struct ModelGenerator {
    inner: Box<dyn hukum_model::TextGenerator>,
}

impl ModelGenerator {
    pub fn new(generator: Box<dyn hukum_model::TextGenerator>) -> Self {
        Self { inner: generator }
    }

    pub fn from_config(section: &GenerationSection) -> Result<Self, HukumError> {
        let generator = hukum_model::create_text_generator(&to_model_generation_config(section))
            .into_hukum_result()?;
        Ok(Self::new(generator))
    }

    fn generation_error(&self, err: ModelError) -> HukumError {
        match from_model_error(err) {
            e @ HukumError::Generation { .. } => e,
            other => HukumError::Generation {
                model_id: self.inner.model_id().to_string(),
                reason: other.to_string(),
            },
        }
    }
}

fn to_options(params: &GenerationParams) -> GenerateOptions {
    GenerateOptions {
        max_tokens: params.max_tokens,
        temperature: params.temperature,
    }
}

impl GenerationPort for ModelGenerator {
    fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, HukumError> {
        self.inner
            .generate(prompt, &to_options(params))
            .map_err(|e| self.generation_error(e))
    }

    fn stream_generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<TokenStream, HukumError> {
        let model_id = self.inner.model_id().to_string();
        let stream = self
            .inner
            .generate_stream(prompt, &to_options(params))
            .map_err(|e| self.generation_error(e))?;
        Ok(Box::new(stream.map(move |item| {
            item.map_err(|e| HukumError::Generation {
                model_id: model_id.clone(),
                reason: e.to_string(),
            })
        })))
    }

    fn is_ready(&self) -> bool {
        self.inner.is_available()
    }

    fn warm_up(&self) -> Result<(), HukumError> {
        if self.inner.is_available() {
            Ok(())
        } else {
            Err(HukumError::BackendNotReady {
                backend: self.inner.model_id().to_string(),
                reason: "generation server is not reachable".to_string(),
            })
        }
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}

// ============================================================================
// Factory Functions
// ============================================================================

pub fn create_embedding_port(section: &EmbeddingSection) -> Result<Arc<dyn EmbeddingPort>, HukumError> {
    Ok(Arc::new(ModelEmbedding::from_config(section)?))
}

pub fn create_reranking_port(section: &RerankerSection) -> Result<Arc<dyn RerankingPort>, HukumError> {
    Ok(Arc::new(ModelReranker::from_config(section)?))
}

pub fn create_generation_port(
    section: &GenerationSection,
) -> Result<Arc<dyn GenerationPort>, HukumError> {
    Ok(Arc::new(ModelGenerator::from_config(section)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hukum_model::DevicePreference;
    use std::path::PathBuf;

    #[test]
    fn test_error_conversion_model_not_found() {
        let err = from_model_error(ModelError::ModelNotFound {
            model_id: "BAAI/bge-m3".to_string(),
            path: PathBuf::from("/models/bge-m3"),
        });
        match err {
            HukumError::BackendNotReady { backend, reason } => {
                assert_eq!(backend, "BAAI/bge-m3");
                assert!(reason.contains("/models/bge-m3"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_error_conversion_inference() {
        assert!(matches!(
            from_model_error(ModelError::RerankingFailed {
                model_id: "r".into(),
                message: "oom".into()
            }),
            HukumError::Reranker { .. }
        ));
        assert!(matches!(
            from_model_error(ModelError::GenerationFailed {
                model_id: "llama3".into(),
                message: "blank".into()
            }),
            HukumError::Generation { .. }
        ));
    }

    #[test]
    fn test_embedding_config_conversion() {
        let section = EmbeddingSection {
            model_id: "intfloat/multilingual-e5-large".to_string(),
            dimension: 1024,
            query_instruction: Some("query: ".to_string()),
            device: DevicePreference::Cpu,
            local_path: Some(PathBuf::from("/m/e5")),
            batch_size: 16,
        };
        let config = to_model_embedding_config(&section);
        assert_eq!(config.model_id, "intfloat/multilingual-e5-large");
        assert_eq!(config.device, DevicePreference::Cpu);
        assert_eq!(config.query_instruction, "query: ");
        assert_eq!(config.batch_size, 16);
        assert_eq!(config.local_path, Some(PathBuf::from("/m/e5")));

        let default_instruction = to_model_embedding_config(&EmbeddingSection::default());
        assert_eq!(
            default_instruction.query_instruction,
            hukum_model::EmbeddingConfig::default().query_instruction
        );
    }

    #[test]
    fn test_generation_config_conversion() {
        let mut section = GenerationSection::default();
        section.model = "qwen2.5:7b".to_string();
        section.base_url = "http://gpu-box:11434".to_string();
        let config = to_model_generation_config(&section);
        assert_eq!(config.model, "qwen2.5:7b");
        assert_eq!(config.base_url, "http://gpu-box:11434");
        assert_eq!(config.timeout_secs, 300);
    }
}
