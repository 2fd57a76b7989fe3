//! Candle-based embedding model.

use std::path::Path;
use std::sync::Mutex;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use serde::Deserialize;
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
use tracing::{debug, info};

use crate::config::{EmbeddingConfig, HuggingFaceModelConfig, ModelArchitecture, ModelInfo};
use crate::device::select_device;
use crate::error::{ModelError, ModelResult};
use crate::EmbeddingModel;

enum ModelBackend {
    Bert(BertModel),
    XlmRoberta(XLMRobertaModel),
}

impl ModelBackend {
    fn forward(
        &self,
        input_ids: &Tensor,
        token_type_ids: &Tensor,
        attention_mask: &Tensor,
    ) -> candle_core::Result<Tensor> {
        match self {
            ModelBackend::Bert(model) => model.forward(input_ids, token_type_ids, Some(attention_mask)),
            ModelBackend::XlmRoberta(model) => {
                model.forward(input_ids, attention_mask, token_type_ids, None, None, None)
            }
        }
    }
}

/// How token states are collapsed into one sentence vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pooling {
    Mean,
    Cls,
}

/// sentence-transformers `1_Pooling/config.json`.
#[derive(Debug, Deserialize)]
struct PoolingConfig {
    #[serde(default)]
    pooling_mode_cls_token: bool,
}

/// Candle bi-encoder with L2-normalized output.
///
/// Supports BERT and XLM-RoBERTa checkpoints. Pooling follows the model's
/// `1_Pooling/config.json` when present (CLS for bge-m3) and defaults to
/// masked mean pooling.
pub struct CandleEmbeddingModel {
    model_info: ModelInfo,
    model: Mutex<ModelBackend>,
    tokenizer: Mutex<Tokenizer>,
    device: Device,
    pooling: Pooling,
    batch_size: usize,
    query_instruction: String,
}

impl std::fmt::Debug for CandleEmbeddingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandleEmbeddingModel")
            .field("model_id", &self.model_info.model_id)
            .field("dimension", &self.model_info.dimension)
            .field("pooling", &self.pooling)
            .finish()
    }
}

// SAFETY: the model and tokenizer are only touched behind their mutexes.
unsafe impl Send for CandleEmbeddingModel {}
unsafe impl Sync for CandleEmbeddingModel {}

impl CandleEmbeddingModel {
    pub fn new(config: &EmbeddingConfig) -> ModelResult<Self> {
        let model_path = config.effective_model_path();

        if !model_path.exists() {
            return Err(ModelError::ModelNotFound {
                model_id: config.model_id.clone(),
                path: model_path,
            });
        }

        let hf_config = load_hf_config(&model_path)?;
        let architecture = hf_config.infer_architecture();
        let dimension = hf_config.hidden_size;
        let max_seq_len = config
            .max_sequence_length
            .min(hf_config.max_position_embeddings);
        let pooling = detect_pooling(&model_path);

        info!(
            "Loading embedding model '{}' from {:?} (arch={}, dim={}, pooling={:?})",
            config.model_id, model_path, architecture, dimension, pooling
        );

        let (pad_id, pad_token) = match architecture {
            ModelArchitecture::XlmRoberta => (1, "<pad>"),
            ModelArchitecture::Bert | ModelArchitecture::Unknown => (0, "[PAD]"),
        };

        let tokenizer = load_tokenizer(&model_path, max_seq_len, pad_id, pad_token)?;
        let device = select_device(config.device)?;
        let model = load_model(&model_path, architecture, &device)?;

        Ok(Self {
            model_info: ModelInfo::new(&config.model_id, dimension, max_seq_len)
                .with_architecture(architecture),
            model: Mutex::new(model),
            tokenizer: Mutex::new(tokenizer),
            device,
            pooling,
            batch_size: config.batch_size.max(1),
            query_instruction: config.query_instruction.clone(),
        })
    }

    fn err(&self, e: impl std::fmt::Display) -> ModelError {
        ModelError::embedding_failed(&self.model_info.model_id, e.to_string())
    }

    fn pool(&self, hidden: &Tensor, mask: &Tensor) -> candle_core::Result<Tensor> {
        match self.pooling {
            Pooling::Cls => hidden.narrow(1, 0, 1)?.squeeze(1),
            Pooling::Mean => {
                let mask = mask
                    .unsqueeze(2)?
                    .to_dtype(DType::F32)?
                    .broadcast_as(hidden.shape())?;
                let sum = hidden.broadcast_mul(&mask)?.sum(1)?;
                let count = mask.sum(1)?.clamp(1e-9, f64::MAX)?;
                sum.broadcast_div(&count)
            }
        }
    }

    fn l2_normalize(embeddings: &Tensor) -> candle_core::Result<Tensor> {
        let norm = embeddings
            .sqr()?
            .sum_keepdim(1)?
            .sqrt()?
            .clamp(1e-12, f64::MAX)?;
        embeddings.broadcast_div(&norm)
    }

    fn embed_once(&self, texts: &[&str]) -> ModelResult<Vec<Vec<f32>>> {
        let encodings = {
            let tokenizer = self.tokenizer.lock().map_err(|e| self.err(e))?;
            let inputs: Vec<String> = texts.iter().map(|s| s.to_string()).collect();
            tokenizer
                .encode_batch(inputs, true)
                .map_err(|e| ModelError::tokenization(e.to_string()))?
        };

        let batch_size = encodings.len();
        let seq_len = encodings.first().map(|e| e.get_ids().len()).unwrap_or(0);

        let token_ids: Vec<u32> = encodings.iter().flat_map(|e| e.get_ids().to_vec()).collect();
        let attention_mask: Vec<u32> = encodings
            .iter()
            .flat_map(|e| e.get_attention_mask().to_vec())
            .collect();

        let token_ids = Tensor::from_vec(token_ids, (batch_size, seq_len), &self.device)
            .map_err(|e| self.err(e))?;
        let attention_mask = Tensor::from_vec(attention_mask, (batch_size, seq_len), &self.device)
            .map_err(|e| self.err(e))?;
        let token_type_ids = token_ids.zeros_like().map_err(|e| self.err(e))?;

        let hidden = {
            let model = self.model.lock().map_err(|e| self.err(e))?;
            model
                .forward(&token_ids, &token_type_ids, &attention_mask)
                .map_err(|e| self.err(format!("forward failed: {}", e)))?
        };

        let pooled = self.pool(&hidden, &attention_mask).map_err(|e| self.err(e))?;
        let normalized = Self::l2_normalize(&pooled).map_err(|e| self.err(e))?;

        normalized.to_vec2::<f32>().map_err(|e| self.err(e))
    }
}

impl EmbeddingModel for CandleEmbeddingModel {
    fn embed(&self, texts: &[&str]) -> ModelResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        debug!("Embedding {} texts", texts.len());

        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            out.extend(self.embed_once(batch)?);
        }
        Ok(out)
    }

    fn query_instruction(&self) -> &str {
        &self.query_instruction
    }

    fn dimension(&self) -> usize {
        self.model_info.dimension
    }

    fn max_sequence_length(&self) -> usize {
        self.model_info.max_seq_len
    }

    fn model_info(&self) -> &ModelInfo {
        &self.model_info
    }
}

fn detect_pooling(model_path: &Path) -> Pooling {
    let path = model_path.join("1_Pooling").join("config.json");
    std::fs::read_to_string(path)
        .ok()
        .and_then(|raw| serde_json::from_str::<PoolingConfig>(&raw).ok())
        .map(|cfg| {
            if cfg.pooling_mode_cls_token {
                Pooling::Cls
            } else {
                Pooling::Mean
            }
        })
        .unwrap_or(Pooling::Mean)
}

pub(crate) fn load_hf_config(model_path: &Path) -> ModelResult<HuggingFaceModelConfig> {
    let config_path = model_path.join("config.json");
    if !config_path.exists() {
        return Err(ModelError::model_load(
            model_path.display().to_string(),
            "config.json not found",
        ));
    }
    let content = std::fs::read_to_string(&config_path)?;
    serde_json::from_str(&content).map_err(|e| ModelError::InvalidConfig {
        message: e.to_string(),
    })
}

pub(crate) fn load_tokenizer(
    model_path: &Path,
    max_length: usize,
    pad_id: u32,
    pad_token: &str,
) -> ModelResult<Tokenizer> {
    let tokenizer_path = model_path.join("tokenizer.json");
    if !tokenizer_path.exists() {
        return Err(ModelError::model_load(
            model_path.display().to_string(),
            "tokenizer.json not found",
        ));
    }

    let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
        .map_err(|e| ModelError::model_load(model_path.display().to_string(), e.to_string()))?;

    tokenizer.with_padding(Some(PaddingParams {
        strategy: PaddingStrategy::BatchLongest,
        pad_id,
        pad_token: pad_token.to_string(),
        ..Default::default()
    }));

    tokenizer
        .with_truncation(Some(TruncationParams {
            max_length,
            ..Default::default()
        }))
        .map_err(|e| ModelError::model_load(model_path.display().to_string(), e.to_string()))?;

    Ok(tokenizer)
}

fn load_model(
    model_path: &Path,
    architecture: ModelArchitecture,
    device: &Device,
) -> ModelResult<ModelBackend> {
    let weights_path = model_path.join("model.safetensors");
    if !weights_path.exists() {
        return Err(ModelError::model_load(
            model_path.display().to_string(),
            "model.safetensors not found",
        ));
    }

    let load_err = |e: candle_core::Error| {
        ModelError::model_load(model_path.display().to_string(), e.to_string())
    };

    // SAFETY: the weights file is not modified while mapped.
    let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], DTYPE, device) }
        .map_err(load_err)?;

    let content = std::fs::read_to_string(model_path.join("config.json"))?;
    match architecture {
        ModelArchitecture::Bert | ModelArchitecture::Unknown => {
            let config: BertConfig = serde_json::from_str(&content)?;
            Ok(ModelBackend::Bert(BertModel::load(vb, &config).map_err(load_err)?))
        }
        ModelArchitecture::XlmRoberta => {
            let config: XLMRobertaConfig = serde_json::from_str(&content)?;
            Ok(ModelBackend::XlmRoberta(
                XLMRobertaModel::new(&config, vb).map_err(load_err)?,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_detect_pooling() {
        let dir = TempDir::new().unwrap();
        assert_eq!(detect_pooling(dir.path()), Pooling::Mean);

        std::fs::create_dir_all(dir.path().join("1_Pooling")).unwrap();
        std::fs::write(
            dir.path().join("1_Pooling/config.json"),
            r#"{"word_embedding_dimension":1024,"pooling_mode_cls_token":true}"#,
        )
        .unwrap();
        assert_eq!(detect_pooling(dir.path()), Pooling::Cls);
    }

    #[test]
    fn test_missing_model_dir() {
        let config = EmbeddingConfig::default().with_local_path("/nonexistent/bge-m3");
        assert!(matches!(
            CandleEmbeddingModel::new(&config),
            Err(ModelError::ModelNotFound { .. })
        ));
    }

    #[test]
    fn test_invalid_config_json() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.json"), "not json").unwrap();
        assert!(matches!(
            load_hf_config(dir.path()),
            Err(ModelError::InvalidConfig { .. })
        ));
    }
}
