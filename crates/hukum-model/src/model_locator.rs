//! Runtime path resolution for on-disk models.
//!
//! # Search Order
//!
//! 1. `$HUKUM_MODELS_DIR`
//! 2. `~/.hukum/models`
//! 3. `{exe_dir}/models`
//!
//! # Layout
//!
//! ```text
//! {models_dir}/
//!   embeddings/
//!     bge-m3/
//!       config.json
//!       model.safetensors
//!       tokenizer.json
//!   rerankers/
//!     bge-reranker-v2-m3/
//!       ...
//! ```
//!
//! Hugging Face style paths (`{models_dir}/BAAI/bge-m3`) and a flat layout
//! (`{models_dir}/bge-m3`) are accepted too.

use std::env;
use std::path::{Path, PathBuf};

use crate::error::{ModelError, ModelResult};

/// Environment variable overriding the models directory.
pub const HUKUM_MODELS_DIR_ENV: &str = "HUKUM_MODELS_DIR";

pub const EMBEDDINGS_SUBDIR: &str = "embeddings";
pub const RERANKERS_SUBDIR: &str = "rerankers";

/// Files every model directory must contain.
pub const REQUIRED_MODEL_FILES: &[&str] = &["config.json", "model.safetensors", "tokenizer.json"];

/// Which family of model is being located.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Embedding,
    Reranker,
}

impl ModelKind {
    pub fn subdir(self) -> &'static str {
        match self {
            ModelKind::Embedding => EMBEDDINGS_SUBDIR,
            ModelKind::Reranker => RERANKERS_SUBDIR,
        }
    }
}

/// Locates model directories. Never downloads anything.
#[derive(Debug, Clone, Default)]
pub struct ModelLocator {
    base_dir: Option<PathBuf>,
}

impl ModelLocator {
    pub fn new() -> Self {
        Self { base_dir: None }
    }

    /// Pin the locator to a fixed base directory.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
        }
    }

    /// Resolve the first existing models directory in search order.
    pub fn resolve_base_dir(&self) -> ModelResult<PathBuf> {
        if let Some(ref base) = self.base_dir {
            if base.is_dir() {
                return Ok(base.clone());
            }
            return Err(ModelError::ModelsDirectoryNotFound {
                searched: vec![base.clone()],
            });
        }

        let mut searched = Vec::new();

        if let Ok(env_path) = env::var(HUKUM_MODELS_DIR_ENV) {
            let path = PathBuf::from(env_path);
            if path.is_dir() {
                return Ok(path);
            }
            searched.push(path);
        }

        if let Some(home) = dirs::home_dir() {
            let path = home.join(".hukum").join("models");
            if path.is_dir() {
                return Ok(path);
            }
            searched.push(path);
        }

        if let Some(exe_dir) = env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf))
        {
            let path = exe_dir.join("models");
            if path.is_dir() {
                return Ok(path);
            }
            searched.push(path);
        }

        Err(ModelError::ModelsDirectoryNotFound { searched })
    }

    /// Resolve the directory for `model_id`, accepting a full Hugging Face id
    /// ("BAAI/bge-m3") or its short name ("bge-m3").
    pub fn model_path(&self, kind: ModelKind, model_id: &str) -> ModelResult<PathBuf> {
        let base = self.resolve_base_dir()?;
        let model_name = extract_model_name(model_id);

        let candidates = [
            base.join(kind.subdir()).join(model_name),
            base.join(model_id),
            base.join(model_name),
        ];

        candidates
            .iter()
            .find(|path| is_valid_model_dir(path))
            .cloned()
            .ok_or_else(|| ModelError::ModelNotFound {
                model_id: model_id.to_string(),
                path: candidates[0].clone(),
            })
    }

    pub fn embedding_model_path(&self, model_id: &str) -> ModelResult<PathBuf> {
        self.model_path(ModelKind::Embedding, model_id)
    }

    pub fn reranker_model_path(&self, model_id: &str) -> ModelResult<PathBuf> {
        self.model_path(ModelKind::Reranker, model_id)
    }

    /// Check that a model directory contains every required file.
    pub fn validate_model_dir(&self, path: &Path) -> ModelResult<()> {
        if !path.exists() {
            return Err(ModelError::ModelNotFound {
                model_id: path.display().to_string(),
                path: path.to_path_buf(),
            });
        }

        let missing: Vec<&'static str> = REQUIRED_MODEL_FILES
            .iter()
            .copied()
            .filter(|file| !path.join(file).exists())
            .collect();

        if !missing.is_empty() {
            return Err(ModelError::IncompleteModelFiles {
                path: path.to_path_buf(),
                missing,
            });
        }

        Ok(())
    }
}

/// "BAAI/bge-m3" → "bge-m3"
pub(crate) fn extract_model_name(model_id: &str) -> &str {
    model_id.rsplit('/').next().unwrap_or(model_id)
}

fn is_valid_model_dir(path: &Path) -> bool {
    path.is_dir() && path.join("config.json").exists()
}
