//! # hukum-core
//!
//! **Hukum** – hybrid retrieval and question answering over Indonesian legal documents.
//!
//! This crate provides the lexical index, rank fusion, reranking, relevance
//! gating, context assembly and the query state machine that ties them
//! together. It is consumed by the `hukum` CLI.
//!
//! ## Main Types
//!
//! - [`HukumEngine`] – the entry point for indexing, search and answers
//! - [`HukumPorts`] – the injected collaborators (embedding, vector store, reranker, generator)
//! - [`HukumConfig`] – YAML configuration
//! - [`HukumError`] – domain-specific error type
//!
//! ## Modules
//!
//! - [`lexical`] – BM25 index with legal-reference tokenization
//! - [`fusion`] – reciprocal-rank, weighted and interleave fusion
//! - [`reranker`] – cross-encoder reranking with pass-through degradation
//! - [`gate`] – relevance gate over the top rerank score
//! - [`context`] – length-bounded context assembly
//! - [`orchestrator`] – the per-query state machine
//! - [`ports`] – collaborator traits
//!
//! ## Example
//!
//! ```ignore
//! use hukum_core::{HukumConfig, HukumEngine, HukumPorts, QueryOptions};
//!
//! let config = HukumConfig::load_default()?;
//! let engine = HukumEngine::new(config.clone(), HukumPorts::from_config(&config)?)?;
//! engine.ensure_ready()?;
//!
//! let response = engine.answer("Apa isi Pasal 1365 KUHPerdata?", &QueryOptions::from_config(&config))?;
//! println!("{}", response.answer);
//! ```

// Modules
pub mod chunker;
pub mod config;
pub mod context;
pub mod db_adapter;
pub mod engine;
pub mod errors;
pub mod fusion;
pub mod gate;
pub mod lexical;
pub mod model_adapter;
pub mod orchestrator;
pub mod ports;
pub mod prompts;
pub mod reranker;
pub mod semantic;
pub mod types;

// Re-exports for convenience

pub use chunker::{collect_text_files, read_chunk_records, Chunker, Section};
pub use config::{
    ContextConfig, EmbeddingSection, FastPathConfig, FusionConfig, GateConfig, GenerationSection,
    HukumConfig, LexicalConfig, QueryConfig, RerankerSection, SemanticConfig, VectorStoreConfig,
    DEFAULT_FAST_PATH_KEYWORDS, HUKUM_CONFIG_ENV,
};
pub use context::{ContextAssembler, DEFAULT_MAX_CONTEXT_CHARS};
pub use engine::{EngineStats, HukumEngine, HukumPorts, IndexReport, SearchMethod};
pub use errors::{HukumError, IntoHukumResult};
pub use fusion::{
    fuse, interleave_fusion, reciprocal_rank_fusion, weighted_fusion, FusionAccumulator,
    FusionMethod, FusionParams, DEFAULT_RRF_K,
};
pub use gate::{GateVerdict, RelevanceGate, DEFAULT_GATE_THRESHOLD};
pub use lexical::{Bm25Params, ChunkLookup, LexicalIndex, LexicalIndexMeta, LexicalIndexStats};
pub use orchestrator::{
    is_fast_path, HybridResults, QueryOptions, QueryOrchestrator, QueryOutcome, QueryResponse,
    StageTimings,
};
pub use ports::{
    EmbeddingPort, GenerationParams, GenerationPort, RerankingPort, SemanticHit, SemanticRecord,
    SemanticSearchPort, TokenStream,
};
pub use prompts::{
    ChatMessage, ChatRole, LegalPromptTemplate, PromptLanguage, PromptStyle, SystemPreset,
};
pub use reranker::{RerankDocument, Reranker, Scored};
pub use semantic::SemanticRetriever;
pub use types::{CandidateSource, Chunk, ChunkId, ChunkMetadata, RetrievalCandidate, SourceRef};

// hukum-db adapter - vector stores behind the semantic search port
pub use db_adapter::{from_db_error, DbSemanticSearch};

// hukum-model adapter - embeddings, reranking and generation behind the ports
pub use model_adapter::{
    create_embedding_port, create_generation_port, create_reranking_port, from_model_error,
    ModelEmbedding, ModelGenerator, ModelReranker,
};

// Device selection is configured through hukum-model's type
pub use hukum_model::DevicePreference;
