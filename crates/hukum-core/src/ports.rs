//! Collaborator ports.
//!
//! The engine talks to every external model or store through one of these
//! traits. Implementations are held as `Arc<dyn Port>` and injected into
//! [`crate::engine::HukumEngine`]; the production ones live in
//! [`crate::db_adapter`] and [`crate::model_adapter`].

use crate::errors::HukumError;
use crate::types::{ChunkId, ChunkMetadata};

// ============================================================================
// Embedding
// ============================================================================

/// Converts text to fixed-dimension vectors.
pub trait EmbeddingPort: Send + Sync {
    /// Embed a search query. May apply a query instruction prefix.
    fn embed_query(&self, text: &str) -> Result<Vec<f32>, HukumError>;

    /// Embed a batch of document texts, one vector per input.
    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, HukumError>;

    /// Vector dimension.
    fn dimension(&self) -> usize;

    fn model_id(&self) -> &str;

    /// Load weights or check connectivity.
    fn ensure_ready(&self) -> Result<(), HukumError> {
        Ok(())
    }
}

// ============================================================================
// Semantic search
// ============================================================================

/// One vector-store hit.
///
/// `chunk_id` is `None` when the stored payload has no id; the metadata is
/// then the only way back to the chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticHit {
    pub chunk_id: Option<ChunkId>,
    pub score: f32,
    pub metadata: ChunkMetadata,
}

/// One vector to store.
#[derive(Debug, Clone, PartialEq)]
pub struct SemanticRecord {
    pub chunk_id: ChunkId,
    pub vector: Vec<f32>,
    /// Flat scalar metadata.
    pub metadata: ChunkMetadata,
}

/// Vector similarity search.
pub trait SemanticSearchPort: Send + Sync {
    /// Nearest neighbours of `vector`, best first.
    fn search(&self, vector: &[f32], top_k: usize) -> Result<Vec<SemanticHit>, HukumError>;

    /// Insert or replace records by chunk id.
    fn upsert(&self, records: &[SemanticRecord]) -> Result<(), HukumError>;

    /// Remove every vector.
    fn clear(&self) -> Result<(), HukumError>;

    fn len(&self) -> Result<usize, HukumError>;

    fn is_connected(&self) -> bool;

    fn backend_name(&self) -> &str;
}

// ============================================================================
// Reranking
// ============================================================================

/// Cross-encoder relevance scoring.
pub trait RerankingPort: Send + Sync {
    /// Score `(query, text)` pairs. Higher is more relevant; the scale is unbounded.
    fn score_batch(&self, pairs: &[(String, String)]) -> Result<Vec<f32>, HukumError>;

    fn model_id(&self) -> &str;

    fn warm_up(&self) -> Result<(), HukumError> {
        Ok(())
    }
}

// ============================================================================
// Generation
// ============================================================================

/// Sampling parameters for one generation call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: usize,
    pub temperature: f32,
}

impl GenerationParams {
    pub fn new(max_tokens: usize, temperature: f32) -> Self {
        Self {
            max_tokens,
            temperature,
        }
    }
}

/// A finite, single-use sequence of generated text fragments.
pub type TokenStream = Box<dyn Iterator<Item = Result<String, HukumError>> + Send>;

/// Text completion.
pub trait GenerationPort: Send + Sync {
    fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String, HukumError>;

    fn stream_generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<TokenStream, HukumError>;

    fn is_ready(&self) -> bool;

    fn warm_up(&self) -> Result<(), HukumError> {
        Ok(())
    }

    fn model_id(&self) -> &str;
}
