//! Candle cross-encoder reranker.

use std::sync::Mutex;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use candle_transformers::models::xlm_roberta::{
    Config as XLMRobertaConfig, XLMRobertaForSequenceClassification,
};
use tokenizers::{Encoding, Tokenizer};
use tracing::{debug, info, warn};

use crate::config::{DevicePreference, ModelArchitecture, RerankerConfig};
use crate::device::{gpu_not_available_reason, try_gpu};
use crate::embedding::{load_hf_config, load_tokenizer};
use crate::error::{ModelError, ModelResult};
use crate::model_locator::ModelLocator;
use crate::RerankerModel;

enum CrossEncoder {
    /// BERT encoder plus a single-logit linear head over the CLS token.
    Bert {
        model: BertModel,
        classifier_weight: Tensor,
        classifier_bias: Tensor,
    },
    XlmRoberta(XLMRobertaForSequenceClassification),
}

/// Cross-encoder scoring (query, passage) pairs. Scores are raw logits.
pub struct CandleRerankerModel {
    model_id: String,
    model: CrossEncoder,
    tokenizer: Mutex<Tokenizer>,
    device: Device,
    max_batch: usize,
}

impl std::fmt::Debug for CandleRerankerModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandleRerankerModel")
            .field("model_id", &self.model_id)
            .field("max_batch", &self.max_batch)
            .finish()
    }
}

// SAFETY: weights are read-only after load; the tokenizer sits behind a mutex.
unsafe impl Send for CandleRerankerModel {}
unsafe impl Sync for CandleRerankerModel {}

impl CandleRerankerModel {
    pub fn new(config: &RerankerConfig) -> ModelResult<Self> {
        let model_path = config.effective_model_path();

        if !model_path.exists() {
            return Err(ModelError::ModelNotFound {
                model_id: config.model_id.clone(),
                path: model_path,
            });
        }
        ModelLocator::new().validate_model_dir(&model_path)?;

        info!(
            "Loading reranker model '{}' from {:?}",
            config.model_id, model_path
        );

        // Cross-encoder batch matmul is unreliable on Metal, so Auto stays on CPU.
        let device = match config.device {
            DevicePreference::Auto | DevicePreference::Cpu => Device::Cpu,
            DevicePreference::Gpu => {
                let device = try_gpu().ok_or_else(|| ModelError::DeviceNotAvailable {
                    reason: gpu_not_available_reason(),
                })?;
                warn!("Reranker using GPU (may fail on some queries)");
                device
            }
        };

        let hf_config = load_hf_config(&model_path)?;
        let architecture = hf_config.infer_architecture();
        let raw_config = std::fs::read_to_string(model_path.join("config.json"))?;

        let load_err = |e: candle_core::Error| ModelError::model_load(&config.model_id, e.to_string());

        // SAFETY: the weights file is not modified while mapped.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(
                &[model_path.join("model.safetensors")],
                DType::F32,
                &device,
            )
        }
        .map_err(load_err)?;

        let (model, pad_id, pad_token) = match architecture {
            ModelArchitecture::XlmRoberta => {
                let cfg: XLMRobertaConfig = serde_json::from_str(&raw_config)?;
                let model =
                    XLMRobertaForSequenceClassification::new(1, &cfg, vb).map_err(load_err)?;
                (CrossEncoder::XlmRoberta(model), 1, "<pad>")
            }
            ModelArchitecture::Bert | ModelArchitecture::Unknown => {
                let cfg: BertConfig = serde_json::from_str(&raw_config)?;
                let model = BertModel::load(vb.clone(), &cfg).map_err(load_err)?;
                let classifier_weight = vb
                    .get((1, cfg.hidden_size), "classifier.weight")
                    .map_err(|e| {
                        ModelError::model_load(&config.model_id, format!("classifier.weight: {}", e))
                    })?;
                let classifier_bias = vb.get(1, "classifier.bias").map_err(|e| {
                    ModelError::model_load(&config.model_id, format!("classifier.bias: {}", e))
                })?;
                (
                    CrossEncoder::Bert {
                        model,
                        classifier_weight,
                        classifier_bias,
                    },
                    0,
                    "[PAD]",
                )
            }
        };

        let tokenizer = load_tokenizer(&model_path, config.max_length, pad_id, pad_token)?;

        info!("Reranker '{}' ({}) loaded on {:?}", config.model_id, architecture, device);

        Ok(Self {
            model_id: config.model_id.clone(),
            model,
            tokenizer: Mutex::new(tokenizer),
            device,
            max_batch: config.max_batch.max(1),
        })
    }

    fn err(&self, e: impl std::fmt::Display) -> ModelError {
        ModelError::reranking_failed(&self.model_id, e.to_string())
    }

    fn score_chunk(&self, pairs: &[(String, String)]) -> ModelResult<Vec<f32>> {
        let encodings = {
            let tokenizer = self.tokenizer.lock().map_err(|e| self.err(e))?;
            tokenizer
                .encode_batch(pairs.to_vec(), true)
                .map_err(|e| ModelError::tokenization(e.to_string()))?
        };

        // Tokenizer padding is BatchLongest, so every encoding has the same length.
        let batch_size = encodings.len();
        let seq_len = encodings.first().map(|e| e.get_ids().len()).unwrap_or(0);

        let collect = |f: fn(&Encoding) -> &[u32]| -> Vec<u32> {
            encodings.iter().flat_map(|e| f(e).to_vec()).collect()
        };
        let tensor = |data: Vec<u32>| Tensor::from_vec(data, (batch_size, seq_len), &self.device);

        let input_ids = tensor(collect(Encoding::get_ids)).map_err(|e| self.err(e))?;
        let attention_mask =
            tensor(collect(Encoding::get_attention_mask)).map_err(|e| self.err(e))?;
        let token_type_ids = tensor(collect(Encoding::get_type_ids)).map_err(|e| self.err(e))?;

        let logits = match &self.model {
            CrossEncoder::Bert {
                model,
                classifier_weight,
                classifier_bias,
            } => model
                .forward(&input_ids, &token_type_ids, Some(&attention_mask))
                .and_then(|hidden| hidden.narrow(1, 0, 1)?.squeeze(1))
                .and_then(|cls| cls.matmul(&classifier_weight.t()?))
                .and_then(|out| out.broadcast_add(classifier_bias)),
            CrossEncoder::XlmRoberta(model) => {
                model.forward(&input_ids, &attention_mask, &token_type_ids)
            }
        }
        .map_err(|e| self.err(format!("forward failed: {}", e)))?;

        // [batch, 1] -> [batch]
        logits
            .squeeze(1)
            .and_then(|t| t.to_dtype(DType::F32))
            .and_then(|t| t.to_vec1::<f32>())
            .map_err(|e| self.err(e))
    }
}

impl RerankerModel for CandleRerankerModel {
    fn score_pairs(&self, pairs: &[(String, String)]) -> ModelResult<Vec<f32>> {
        if pairs.is_empty() {
            return Ok(vec![]);
        }

        debug!("Scoring {} pairs on {:?}", pairs.len(), self.device);

        let mut scores = Vec::with_capacity(pairs.len());
        for chunk in pairs.chunks(self.max_batch) {
            scores.extend(self.score_chunk(chunk)?);
        }
        Ok(scores)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_model_dir() {
        let config = RerankerConfig::default().with_local_path("/nonexistent/reranker");
        assert!(matches!(
            CandleRerankerModel::new(&config),
            Err(ModelError::ModelNotFound { .. })
        ));
    }

    #[test]
    fn test_incomplete_model_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.json"), "{}").unwrap();
        let config = RerankerConfig::default().with_local_path(dir.path());
        assert!(matches!(
            CandleRerankerModel::new(&config),
            Err(ModelError::IncompleteModelFiles { .. })
        ));
    }
}
