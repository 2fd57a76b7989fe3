//! Configuration types for hukum-model.
//!
//! These are the canonical model settings. `hukum-core` maps its own YAML
//! sections onto them rather than defining duplicates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::model_locator::{extract_model_name, ModelKind, ModelLocator};
use crate::{
    DEFAULT_EMBEDDING_MODEL_ID, DEFAULT_GENERATION_MODEL, DEFAULT_OLLAMA_URL,
    DEFAULT_RERANKER_MODEL_ID,
};

// ============================================================================
// DevicePreference
// ============================================================================

/// Preference for compute device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreference {
    /// GPU if compiled in and present, else CPU.
    #[default]
    Auto,
    /// Metal on macOS, CUDA elsewhere. Fails if unavailable.
    Gpu,
    Cpu,
}

impl std::fmt::Display for DevicePreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Gpu => write!(f, "gpu"),
            Self::Cpu => write!(f, "cpu"),
        }
    }
}

impl std::str::FromStr for DevicePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "gpu" | "metal" | "cuda" => Ok(Self::Gpu),
            "cpu" => Ok(Self::Cpu),
            _ => Err(format!(
                "Unknown device: '{}'. Use 'auto', 'gpu', or 'cpu'.",
                s
            )),
        }
    }
}

// ============================================================================
// ModelArchitecture
// ============================================================================

/// Encoder architecture, inferred from a model's config.json.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelArchitecture {
    #[default]
    Bert,
    /// XLM-RoBERTa family (bge-m3, bge-reranker-v2-m3).
    XlmRoberta,
    Unknown,
}

impl std::fmt::Display for ModelArchitecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bert => write!(f, "bert"),
            Self::XlmRoberta => write!(f, "xlm-roberta"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

// ============================================================================
// ModelInfo
// ============================================================================

/// Information about a loaded model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_id: String,
    pub dimension: usize,
    pub max_seq_len: usize,
    #[serde(default)]
    pub architecture: ModelArchitecture,
}

impl ModelInfo {
    pub fn new(model_id: impl Into<String>, dimension: usize, max_seq_len: usize) -> Self {
        Self {
            model_id: model_id.into(),
            dimension,
            max_seq_len,
            architecture: ModelArchitecture::default(),
        }
    }

    pub fn with_architecture(mut self, arch: ModelArchitecture) -> Self {
        self.architecture = arch;
        self
    }
}

// ============================================================================
// EmbeddingConfig
// ============================================================================

/// Configuration for the bi-encoder embedding model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model_id")]
    pub model_id: String,

    #[serde(default)]
    pub device: DevicePreference,

    /// Explicit model directory. When unset the [`ModelLocator`] is used.
    #[serde(default)]
    pub local_path: Option<PathBuf>,

    #[serde(default = "default_max_seq_len")]
    pub max_sequence_length: usize,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Prefix prepended to queries (not documents) before embedding.
    #[serde(default = "default_query_instruction")]
    pub query_instruction: String,
}

fn default_embedding_model_id() -> String {
    DEFAULT_EMBEDDING_MODEL_ID.to_string()
}

fn default_max_seq_len() -> usize {
    512
}

fn default_batch_size() -> usize {
    32
}

fn default_query_instruction() -> String {
    "Represent this sentence for searching relevant passages: ".to_string()
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_id: default_embedding_model_id(),
            device: DevicePreference::default(),
            local_path: None,
            max_sequence_length: default_max_seq_len(),
            batch_size: default_batch_size(),
            query_instruction: default_query_instruction(),
        }
    }
}

impl EmbeddingConfig {
    /// Explicit `local_path`, else the locator result, else the default
    /// `~/.hukum/models/embeddings/{name}` path (which may not exist).
    pub fn effective_model_path(&self) -> PathBuf {
        resolve_model_path(self.local_path.as_ref(), ModelKind::Embedding, &self.model_id)
    }

    pub fn with_local_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_path = Some(path.into());
        self
    }

    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }
}

// ============================================================================
// RerankerConfig
// ============================================================================

/// Configuration for the cross-encoder reranker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RerankerConfig {
    #[serde(default = "default_reranker_model_id")]
    pub model_id: String,

    #[serde(default)]
    pub device: DevicePreference,

    #[serde(default)]
    pub local_path: Option<PathBuf>,

    /// Pairs per forward pass. Larger inputs are split.
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,

    /// Token limit for a (query, document) pair.
    #[serde(default = "default_max_seq_len")]
    pub max_length: usize,
}

fn default_reranker_model_id() -> String {
    DEFAULT_RERANKER_MODEL_ID.to_string()
}

fn default_max_batch() -> usize {
    8
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            model_id: default_reranker_model_id(),
            device: DevicePreference::default(),
            local_path: None,
            max_batch: default_max_batch(),
            max_length: default_max_seq_len(),
        }
    }
}

impl RerankerConfig {
    pub fn effective_model_path(&self) -> PathBuf {
        resolve_model_path(self.local_path.as_ref(), ModelKind::Reranker, &self.model_id)
    }

    pub fn with_local_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_path = Some(path.into());
        self
    }

    pub fn with_model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }
}

fn resolve_model_path(local: Option<&PathBuf>, kind: ModelKind, model_id: &str) -> PathBuf {
    if let Some(path) = local {
        return path.clone();
    }

    ModelLocator::new()
        .model_path(kind, model_id)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".hukum")
                .join("models")
                .join(kind.subdir())
                .join(extract_model_name(model_id))
        })
}

// ============================================================================
// GenerationConfig
// ============================================================================

/// Which generation backend to talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationBackendKind {
    /// Local Ollama server over HTTP.
    #[default]
    Ollama,
}

impl std::fmt::Display for GenerationBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ollama => write!(f, "ollama"),
        }
    }
}

/// Configuration for the answer-generating language model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(default)]
    pub backend: GenerationBackendKind,

    #[serde(default = "default_generation_model")]
    pub model: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_generation_model() -> String {
    DEFAULT_GENERATION_MODEL.to_string()
}

fn default_base_url() -> String {
    DEFAULT_OLLAMA_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            backend: GenerationBackendKind::default(),
            model: default_generation_model(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

// ============================================================================
// HuggingFaceModelConfig
// ============================================================================

/// The subset of a Hugging Face config.json needed to pick a loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HuggingFaceModelConfig {
    #[serde(default)]
    pub architectures: Vec<String>,
    #[serde(default)]
    pub hidden_size: usize,
    #[serde(default = "default_max_position")]
    pub max_position_embeddings: usize,
    #[serde(default)]
    pub model_type: String,
}

fn default_max_position() -> usize {
    512
}

impl HuggingFaceModelConfig {
    pub fn infer_architecture(&self) -> ModelArchitecture {
        match self.model_type.to_lowercase().as_str() {
            "bert" => return ModelArchitecture::Bert,
            "xlm-roberta" | "roberta" => return ModelArchitecture::XlmRoberta,
            _ => {}
        }

        for arch in &self.architectures {
            let lower = arch.to_lowercase();
            if lower.contains("roberta") {
                return ModelArchitecture::XlmRoberta;
            }
            if lower.contains("bert") {
                return ModelArchitecture::Bert;
            }
        }

        ModelArchitecture::Unknown
    }
}
