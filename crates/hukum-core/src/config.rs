//! Configuration for the Hukum engine.
//!
//! [`HukumConfig`] is loaded from YAML (`~/.hukum/config.yaml` by default).
//! Every key is optional, so an empty file yields the built-in defaults:
//!
//! ```yaml
//! lexical:
//!   k1: 1.5
//!   b: 0.75
//! fusion:
//!   method: rrf
//! gate:
//!   threshold: -7.0
//! generation:
//!   model: llama3
//!   promptStyle: llama3
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use hukum_model::DevicePreference;

use crate::context::DEFAULT_MAX_CONTEXT_CHARS;
use crate::errors::HukumError;
use crate::fusion::{FusionMethod, FusionParams, DEFAULT_RRF_K};
use crate::gate::DEFAULT_GATE_THRESHOLD;
use crate::lexical::{Bm25Params, DEFAULT_B, DEFAULT_K1};
use crate::prompts::{PromptLanguage, PromptStyle, DEFAULT_PROMPT_CONTEXT_CHARS};

/// Environment variable overriding the config file location.
pub const HUKUM_CONFIG_ENV: &str = "HUKUM_CONFIG";

/// Greeting and capability probes answered without retrieval.
pub const DEFAULT_FAST_PATH_KEYWORDS: &[&str] = &[
    "tes",
    "test",
    "halo",
    "hallo",
    "hello",
    "hi",
    "hey",
    "pemanasan",
    "cek",
    "ping",
    "coba",
    "selamat pagi",
    "selamat siang",
    "selamat sore",
    "selamat malam",
    "assalamualaikum",
    "hai",
    "apa yang bisa",
    "bisa bantu apa",
    "siapa kamu",
    "siapa anda",
    "kamu siapa",
    "anda siapa",
    "apa fungsi",
    "apa tugas",
    "bisa apa",
    "lakukan apa",
];

// ============================================================================
// HukumConfig
// ============================================================================

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HukumConfig {
    #[serde(default)]
    pub lexical: LexicalConfig,
    #[serde(default)]
    pub semantic: SemanticConfig,
    #[serde(default)]
    pub fusion: FusionConfig,
    #[serde(default)]
    pub reranker: RerankerSection,
    #[serde(default)]
    pub gate: GateConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub generation: GenerationSection,
    #[serde(default)]
    pub fast_path: FastPathConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub embedding: EmbeddingSection,
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
}

impl HukumConfig {
    /// Resolve and load configuration.
    ///
    /// Order: `explicit`, then `$HUKUM_CONFIG`, then `~/.hukum/config.yaml`.
    /// A missing file yields defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, HukumError> {
        if let Some(path) = explicit {
            return Self::from_path(path);
        }
        if let Some(path) = std::env::var_os(HUKUM_CONFIG_ENV).filter(|v| !v.is_empty()) {
            return Self::from_path(Path::new(&path));
        }
        Self::load_default()
    }

    /// Load from `~/.hukum/config.yaml`, or defaults.
    pub fn load_default() -> Result<Self, HukumError> {
        match Self::default_path() {
            Some(path) => Self::from_path(&path),
            None => {
                tracing::debug!("Could not determine home directory, using default config");
                Ok(Self::default())
            }
        }
    }

    /// Load and validate `path`. A missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns [`HukumError::InvalidConfiguration`] if the file cannot be read,
    /// parsed or validated.
    pub fn from_path(path: &Path) -> Result<Self, HukumError> {
        if !path.exists() {
            tracing::debug!("Config not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            HukumError::invalid_config(
                format!("Failed to read {}: {}", path.display(), e),
                "Check the file permissions",
            )
        })?;

        let config = Self::from_yaml(&content).map_err(|e| match e {
            HukumError::Yaml(e) => HukumError::invalid_config(
                format!("Failed to parse {}: {}", path.display(), e),
                "Fix the YAML syntax or remove the file to use defaults",
            ),
            other => other,
        })?;

        let warnings = config.validate()?;
        for warning in warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok(config)
    }

    /// Parse YAML without validating. Empty input yields defaults.
    pub fn from_yaml(content: &str) -> Result<Self, HukumError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// `~/.hukum`
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".hukum"))
    }

    /// `~/.hukum/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        Self::default_dir().map(|d| d.join("config.yaml"))
    }

    /// Check values. Returns warnings for suspicious but usable settings.
    ///
    /// # Errors
    ///
    /// Returns [`HukumError::InvalidConfiguration`] for values the engine cannot use.
    pub fn validate(&self) -> Result<Vec<String>, HukumError> {
        let mut warnings = Vec::new();

        if self.lexical.k1 < 0.0 {
            return Err(HukumError::invalid_config(
                format!("lexical.k1 ({}) cannot be negative", self.lexical.k1),
                "Use a value between 1.2 and 2.0 (default 1.5)",
            ));
        }
        if !(0.0..=1.0).contains(&self.lexical.b) {
            return Err(HukumError::invalid_config(
                format!("lexical.b ({}) must be in [0, 1]", self.lexical.b),
                "Use 0.75 for standard length normalization",
            ));
        }
        for (name, value) in [
            ("lexical.topK", self.lexical.top_k),
            ("semantic.topK", self.semantic.top_k),
            ("query.finalTopK", self.query.final_top_k),
            ("query.candidateMultiplier", self.query.candidate_multiplier),
        ] {
            if value == 0 {
                return Err(HukumError::invalid_config(
                    format!("{} cannot be 0", name),
                    "Set it to at least 1",
                ));
            }
        }
        if self.context.max_chars < 200 {
            return Err(HukumError::invalid_config(
                format!("context.maxChars ({}) is below 200", self.context.max_chars),
                "Use at least 200 characters (default 6000)",
            ));
        }
        if self.fusion.semantic_weight < 0.0 || self.fusion.lexical_weight < 0.0 {
            return Err(HukumError::invalid_config(
                "fusion weights cannot be negative",
                "Use non-negative weights (defaults 0.6 semantic, 0.4 lexical)",
            ));
        }
        if self.fusion.semantic_weight == 0.0 && self.fusion.lexical_weight == 0.0 {
            return Err(HukumError::invalid_config(
                "fusion.semanticWeight and fusion.lexicalWeight are both 0",
                "At least one weight must be positive",
            ));
        }
        if self.fusion.rrf_k <= 0.0 {
            return Err(HukumError::invalid_config(
                format!("fusion.rrfK ({}) must be positive", self.fusion.rrf_k),
                "Use 60 for standard reciprocal rank fusion",
            ));
        }

        if FusionMethod::parse(&self.fusion.method).is_none() {
            warnings.push(format!(
                "fusion.method '{}' is unknown; rrf will be used",
                self.fusion.method
            ));
        }
        if self.gate.threshold > 0.0 {
            warnings.push(format!(
                "gate.threshold ({}) is positive; many relevant queries may be rejected",
                self.gate.threshold
            ));
        }
        if self.generation.temperature > 1.5 {
            warnings.push(format!(
                "generation.temperature ({}) is very high; answers may be incoherent",
                self.generation.temperature
            ));
        }
        if self.embedding.dimension != self.vector_store.dimension {
            warnings.push(format!(
                "embedding.dimension ({}) differs from vectorStore.dimension ({})",
                self.embedding.dimension, self.vector_store.dimension
            ));
        }

        Ok(warnings)
    }

    pub fn bm25_params(&self) -> Bm25Params {
        Bm25Params {
            k1: self.lexical.k1,
            b: self.lexical.b,
        }
    }

    pub fn fusion_params(&self) -> FusionParams {
        FusionParams {
            rrf_k: self.fusion.rrf_k,
            semantic_weight: self.fusion.semantic_weight,
            lexical_weight: self.fusion.lexical_weight,
        }
    }

    /// Directory holding the lexical snapshot.
    pub fn index_dir(&self) -> PathBuf {
        self.lexical
            .index_path
            .clone()
            .unwrap_or_else(|| data_dir().join("indices"))
    }

    /// Directory holding the vector store.
    pub fn vector_dir(&self) -> PathBuf {
        self.vector_store
            .path
            .clone()
            .unwrap_or_else(|| data_dir().join("vectors"))
    }
}

fn data_dir() -> PathBuf {
    HukumConfig::default_dir().unwrap_or_else(|| PathBuf::from(".hukum"))
}

// ============================================================================
// Sections
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LexicalConfig {
    #[serde(default = "default_k1")]
    pub k1: f32,
    #[serde(default = "default_b")]
    pub b: f32,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Snapshot directory. Defaults to `~/.hukum/indices`.
    #[serde(default)]
    pub index_path: Option<PathBuf>,
}

fn default_k1() -> f32 {
    DEFAULT_K1
}

fn default_b() -> f32 {
    DEFAULT_B
}

fn default_top_k() -> usize {
    10
}

fn default_true() -> bool {
    true
}

impl Default for LexicalConfig {
    fn default() -> Self {
        Self {
            k1: default_k1(),
            b: default_b(),
            top_k: default_top_k(),
            index_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticConfig {
    /// When false the engine runs lexical-only.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            top_k: default_top_k(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FusionConfig {
    /// `rrf`, `weighted` or `interleave`. Kept as a string so unknown values
    /// reach the runtime fallback instead of failing to parse.
    #[serde(default = "default_fusion_method")]
    pub method: String,
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f32,
    #[serde(default = "default_semantic_weight")]
    pub semantic_weight: f32,
    #[serde(default = "default_lexical_weight")]
    pub lexical_weight: f32,
}

fn default_fusion_method() -> String {
    FusionMethod::Rrf.as_str().to_string()
}

fn default_rrf_k() -> f32 {
    DEFAULT_RRF_K
}

fn default_semantic_weight() -> f32 {
    0.6
}

fn default_lexical_weight() -> f32 {
    0.4
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            method: default_fusion_method(),
            rrf_k: default_rrf_k(),
            semantic_weight: default_semantic_weight(),
            lexical_weight: default_lexical_weight(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RerankerSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_reranker_model_id")]
    pub model_id: String,
    #[serde(default)]
    pub device: DevicePreference,
    #[serde(default)]
    pub local_path: Option<PathBuf>,
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,
}

fn default_reranker_model_id() -> String {
    hukum_model::DEFAULT_RERANKER_MODEL_ID.to_string()
}

fn default_max_batch() -> usize {
    8
}

impl Default for RerankerSection {
    fn default() -> Self {
        Self {
            enabled: true,
            model_id: default_reranker_model_id(),
            device: DevicePreference::default(),
            local_path: None,
            max_batch: default_max_batch(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateConfig {
    /// Minimum top rerank score. Re-tune per reranking model.
    #[serde(default = "default_gate_threshold")]
    pub threshold: f32,
}

fn default_gate_threshold() -> f32 {
    DEFAULT_GATE_THRESHOLD
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            threshold: default_gate_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_true")]
    pub include_metadata: bool,
}

fn default_max_chars() -> usize {
    DEFAULT_MAX_CONTEXT_CHARS
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            include_metadata: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSection {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_fallback_max_tokens")]
    pub fallback_max_tokens: usize,
    #[serde(default = "default_fallback_temperature")]
    pub fallback_temperature: f32,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub prompt_style: PromptStyle,
    #[serde(default)]
    pub language: PromptLanguage,
    /// Context characters kept in the prompt before the truncation marker.
    #[serde(default = "default_prompt_context_chars")]
    pub prompt_context_chars: usize,
}

fn default_max_tokens() -> usize {
    2048
}

fn default_temperature() -> f32 {
    0.5
}

fn default_fallback_max_tokens() -> usize {
    200
}

fn default_fallback_temperature() -> f32 {
    0.8
}

fn default_generation_model() -> String {
    hukum_model::DEFAULT_GENERATION_MODEL.to_string()
}

fn default_base_url() -> String {
    hukum_model::DEFAULT_OLLAMA_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_prompt_context_chars() -> usize {
    DEFAULT_PROMPT_CONTEXT_CHARS
}

impl Default for GenerationSection {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            fallback_max_tokens: default_fallback_max_tokens(),
            fallback_temperature: default_fallback_temperature(),
            model: default_generation_model(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            prompt_style: PromptStyle::default(),
            language: PromptLanguage::default(),
            prompt_context_chars: default_prompt_context_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FastPathConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Substrings of the lowercased question that trigger the canned reply.
    #[serde(default = "default_fast_path_keywords")]
    pub keywords: Vec<String>,
    /// Questions with this many words or more always go through retrieval.
    #[serde(default = "default_fast_path_max_words")]
    pub max_words: usize,
}

fn default_fast_path_keywords() -> Vec<String> {
    DEFAULT_FAST_PATH_KEYWORDS
        .iter()
        .map(|k| k.to_string())
        .collect()
}

fn default_fast_path_max_words() -> usize {
    15
}

impl Default for FastPathConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            keywords: default_fast_path_keywords(),
            max_words: default_fast_path_max_words(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryConfig {
    #[serde(default = "default_final_top_k")]
    pub final_top_k: usize,
    /// Fused candidates requested per final result, for the reranker.
    #[serde(default = "default_candidate_multiplier")]
    pub candidate_multiplier: usize,
}

fn default_final_top_k() -> usize {
    5
}

fn default_candidate_multiplier() -> usize {
    2
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            final_top_k: default_final_top_k(),
            candidate_multiplier: default_candidate_multiplier(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingSection {
    #[serde(default = "default_embedding_model_id")]
    pub model_id: String,
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    #[serde(default)]
    pub query_instruction: Option<String>,
    #[serde(default)]
    pub device: DevicePreference,
    #[serde(default)]
    pub local_path: Option<PathBuf>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_embedding_model_id() -> String {
    hukum_model::DEFAULT_EMBEDDING_MODEL_ID.to_string()
}

fn default_dimension() -> usize {
    1024
}

fn default_batch_size() -> usize {
    32
}

impl Default for EmbeddingSection {
    fn default() -> Self {
        Self {
            model_id: default_embedding_model_id(),
            dimension: default_dimension(),
            query_instruction: None,
            device: DevicePreference::default(),
            local_path: None,
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorStoreConfig {
    /// `lancedb` or `simple`.
    #[serde(default = "default_vector_backend")]
    pub backend: String,
    /// Store directory. Defaults to `~/.hukum/vectors`.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_dimension")]
    pub dimension: usize,
    #[serde(default = "default_metric")]
    pub metric: String,
}

fn default_vector_backend() -> String {
    hukum_db::vector::DEFAULT_BACKEND.to_string()
}

fn default_metric() -> String {
    "cosine".to_string()
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: default_vector_backend(),
            path: None,
            dimension: default_dimension(),
            metric: default_metric(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = HukumConfig::default();
        assert_eq!(config.lexical.k1, 1.5);
        assert_eq!(config.lexical.b, 0.75);
        assert_eq!(config.fusion.method, "rrf");
        assert_eq!(config.fusion.rrf_k, 60.0);
        assert_eq!(config.gate.threshold, -7.0);
        assert_eq!(config.context.max_chars, 6000);
        assert_eq!(config.generation.max_tokens, 2048);
        assert_eq!(config.generation.fallback_max_tokens, 200);
        assert_eq!(config.fast_path.keywords.len(), 27);
        assert_eq!(config.fast_path.max_words, 15);
        assert_eq!(config.query.final_top_k, 5);
        assert!(config.validate().unwrap().is_empty());
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let config = HukumConfig::from_yaml("").unwrap();
        assert_eq!(config.embedding.dimension, 1024);
    }

    #[test]
    fn test_from_yaml_camel_case() {
        let yaml = r#"
lexical:
  k1: 1.2
  indexPath: /tmp/hukum-idx
fusion:
  method: weighted
  semanticWeight: 0.7
gate:
  threshold: -4.5
generation:
  promptStyle: chatml
  language: en
fastPath:
  keywords: [halo]
  maxWords: 5
vectorStore:
  backend: simple
"#;
        let config = HukumConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.lexical.k1, 1.2);
        assert_eq!(config.lexical.b, 0.75);
        assert_eq!(config.index_dir(), PathBuf::from("/tmp/hukum-idx"));
        assert_eq!(config.fusion.method, "weighted");
        assert_eq!(config.fusion.semantic_weight, 0.7);
        assert_eq!(config.fusion.lexical_weight, 0.4);
        assert_eq!(config.gate.threshold, -4.5);
        assert_eq!(config.generation.prompt_style, PromptStyle::ChatMl);
        assert_eq!(config.generation.language, PromptLanguage::En);
        assert_eq!(config.fast_path.keywords, vec!["halo".to_string()]);
        assert_eq!(config.vector_store.backend, "simple");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let config = HukumConfig::from_path(&temp.path().join("nope.yaml")).unwrap();
        assert_eq!(config.query.final_top_k, 5);
    }

    #[test]
    fn test_invalid_yaml_is_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.yaml");
        fs::write(&path, "lexical: [k1: ").unwrap();
        let err = HukumConfig::from_path(&path).unwrap_err();
        assert!(matches!(err, HukumError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = HukumConfig::default();
        config.lexical.b = 1.5;
        assert!(config.validate().is_err());

        let mut config = HukumConfig::default();
        config.lexical.k1 = -0.1;
        assert!(config.validate().is_err());

        let mut config = HukumConfig::default();
        config.lexical.top_k = 0;
        assert!(config.validate().is_err());

        let mut config = HukumConfig::default();
        config.context.max_chars = 100;
        assert!(config.validate().is_err());

        let mut config = HukumConfig::default();
        config.fusion.lexical_weight = -1.0;
        assert!(config.validate().is_err());

        let mut config = HukumConfig::default();
        config.fusion.lexical_weight = 0.0;
        config.fusion.semantic_weight = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_warnings() {
        let mut config = HukumConfig::default();
        config.fusion.method = "borda".to_string();
        config.gate.threshold = 1.0;
        config.generation.temperature = 2.0;
        let warnings = config.validate().unwrap();
        assert_eq!(warnings.len(), 3);
        assert!(warnings[0].contains("borda"));
    }

    #[test]
    fn test_from_path_validates() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        fs::write(&path, "lexical:\n  b: 3.0\n").unwrap();
        let err = HukumConfig::from_path(&path).unwrap_err();
        assert!(err.to_string().contains("lexical.b"));
    }
}
