//! The caller-facing engine.
//!
//! [`HukumEngine`] owns the lexical index and the collaborator ports and
//! exposes indexing, retrieval, answering and diagnostics. Construction is
//! two-phase: [`HukumEngine::new`] wires everything without touching models,
//! and [`HukumEngine::ensure_ready`] warms collaborators before answers are
//! served.
//!
//! # Example
//!
//! ```ignore
//! use hukum_core::{HukumConfig, HukumEngine, HukumPorts, QueryOptions};
//!
//! let config = HukumConfig::load_default()?;
//! let ports = HukumPorts::from_config(&config)?;
//! let engine = HukumEngine::new(config, ports)?;
//! engine.ensure_ready()?;
//! let response = engine.answer("apa isi pasal 1365?", &QueryOptions::from_config(engine.config()))?;
//! ```

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::HukumConfig;
use crate::context::ContextAssembler;
use crate::db_adapter::DbSemanticSearch;
use crate::errors::HukumError;
use crate::fusion::FusionMethod;
use crate::lexical::{
    load_lexical_index, remove_lexical_index, save_lexical_index, tokenize, LexicalIndex,
    LexicalIndexMeta,
};
use crate::model_adapter::{create_embedding_port, create_generation_port, create_reranking_port};
use crate::orchestrator::{QueryOptions, QueryOrchestrator, QueryResponse};
use crate::ports::{
    EmbeddingPort, GenerationParams, GenerationPort, RerankingPort, SemanticSearchPort,
    TokenStream,
};
use crate::prompts::{LegalPromptTemplate, NO_DOCUMENTS_STREAM_ANSWER};
use crate::reranker::Reranker;
use crate::semantic::SemanticRetriever;
use crate::types::{Chunk, RetrievalCandidate, SourceRef};

// ============================================================================
// Ports
// ============================================================================

/// The collaborators an engine is built from.
///
/// Only the generator is mandatory. Without an embedding model or vector
/// store the engine runs lexical-only; without a reranker candidates keep
/// their fused order.
#[derive(Clone)]
pub struct HukumPorts {
    pub embedding: Option<Arc<dyn EmbeddingPort>>,
    pub semantic: Option<Arc<dyn SemanticSearchPort>>,
    pub reranker: Option<Arc<dyn RerankingPort>>,
    pub generator: Arc<dyn GenerationPort>,
}

impl std::fmt::Debug for HukumPorts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HukumPorts")
            .field("embedding", &self.embedding.as_ref().map(|e| e.model_id().to_string()))
            .field("semantic", &self.semantic.as_ref().map(|s| s.backend_name().to_string()))
            .field("reranker", &self.reranker.as_ref().map(|r| r.model_id().to_string()))
            .field("generator", &self.generator.model_id())
            .finish()
    }
}

impl HukumPorts {
    pub fn new(generator: Arc<dyn GenerationPort>) -> Self {
        Self {
            embedding: None,
            semantic: None,
            reranker: None,
            generator,
        }
    }

    pub fn with_semantic(
        mut self,
        embedding: Arc<dyn EmbeddingPort>,
        store: Arc<dyn SemanticSearchPort>,
    ) -> Self {
        self.embedding = Some(embedding);
        self.semantic = Some(store);
        self
    }

    pub fn with_reranker(mut self, reranker: Arc<dyn RerankingPort>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Build production ports from configuration.
    ///
    /// Optional collaborators that fail to construct are logged and left out.
    /// A generator that cannot be constructed is an error.
    pub fn from_config(config: &HukumConfig) -> Result<Self, HukumError> {
        let generator = create_generation_port(&config.generation)?;
        let mut ports = Self::new(generator);

        if config.reranker.enabled {
            match create_reranking_port(&config.reranker) {
                Ok(reranker) => ports.reranker = Some(reranker),
                Err(e) => warn!("Reranker unavailable, candidates keep fused order: {}", e),
            }
        }

        if config.semantic.enabled {
            let embedding = create_embedding_port(&config.embedding);
            let store = DbSemanticSearch::open(&config.vector_store, config.vector_dir());
            match (embedding, store) {
                (Ok(embedding), Ok(store)) => {
                    ports = ports.with_semantic(embedding, Arc::new(store));
                }
                (Err(e), _) => warn!("Embedding model unavailable, running lexical-only: {}", e),
                (_, Err(e)) => warn!("Vector store unavailable, running lexical-only: {}", e),
            }
        }

        Ok(ports)
    }
}

// ============================================================================
// Engine types
// ============================================================================

/// Retrieval-only search modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMethod {
    Lexical,
    Semantic,
    Hybrid,
}

impl SearchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lexical => "bm25",
            Self::Semantic => "semantic",
            Self::Hybrid => "hybrid",
        }
    }
}

impl FromStr for SearchMethod {
    type Err = HukumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bm25" | "lexical" => Ok(Self::Lexical),
            "semantic" | "vector" => Ok(Self::Semantic),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(HukumError::InvalidArgument(format!(
                "Unknown search method '{}'. Use bm25, semantic or hybrid.",
                other
            ))),
        }
    }
}

impl std::fmt::Display for SearchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a full index rebuild.
#[derive(Debug, Clone, Serialize)]
pub struct IndexReport {
    pub document_count: usize,
    pub vocabulary_size: usize,
    /// Vectors written, or `None` when semantic indexing was skipped or failed.
    pub semantic_indexed: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub document_count: usize,
    pub vocabulary_size: usize,
    pub average_document_length: f32,
    pub total_tokens: usize,
    pub semantic_backend_connected: bool,
    pub semantic_backend: Option<String>,
    pub vector_count: Option<usize>,
    pub embedding_model: Option<String>,
    pub reranker_model: Option<String>,
    pub reranker_enabled: bool,
    pub generation_model: String,
    pub generation_backend_ready: bool,
    pub fusion_method: String,
    pub gate_threshold: f32,
    pub index_path: PathBuf,
}

// ============================================================================
// HukumEngine
// ============================================================================

pub struct HukumEngine {
    config: HukumConfig,
    /// Swapped wholesale on rebuild; readers keep the snapshot they took.
    lexical: RwLock<Arc<LexicalIndex>>,
    semantic: Option<SemanticRetriever>,
    reranker: Reranker,
    generator: Arc<dyn GenerationPort>,
    template: LegalPromptTemplate,
    ready: AtomicBool,
}

impl std::fmt::Debug for HukumEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HukumEngine")
            .field("semantic", &self.semantic)
            .field("reranker", &self.reranker)
            .field("generator", &self.generator.model_id())
            .field("ready", &self.ready.load(Ordering::SeqCst))
            .finish()
    }
}

fn lock_poisoned(what: &str) -> HukumError {
    HukumError::Other(anyhow::anyhow!("{} lock poisoned", what))
}

impl HukumEngine {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    /// Wire an engine from configuration and ports.
    ///
    /// Loads the persisted lexical index from `config.index_dir()` when one
    /// exists. Invalid configuration is an error; an unreadable snapshot is
    /// logged and the engine starts empty.
    pub fn new(config: HukumConfig, ports: HukumPorts) -> Result<Self, HukumError> {
        for warning in config.validate()? {
            warn!("Config: {}", warning);
        }

        let index_dir = config.index_dir();
        let lexical = match load_lexical_index(&index_dir) {
            Ok(Some(index)) => {
                info!(
                    "Loaded lexical index with {} documents from {}",
                    index.len(),
                    index_dir.display()
                );
                index
            }
            Ok(None) => {
                debug!("No lexical index at {}", index_dir.display());
                LexicalIndex::empty(config.bm25_params())
            }
            Err(e) => {
                warn!("Ignoring unreadable lexical index, re-index to replace it: {}", e);
                LexicalIndex::empty(config.bm25_params())
            }
        };

        let semantic = match (ports.embedding, ports.semantic) {
            (Some(embedding), Some(store)) => Some(
                SemanticRetriever::new(embedding, store)
                    .with_batch_size(config.embedding.batch_size),
            ),
            (None, None) => None,
            _ => {
                warn!("Semantic search needs both an embedding model and a vector store, running lexical-only");
                None
            }
        };

        let reranker = if config.reranker.enabled {
            Reranker::new(ports.reranker)
        } else {
            Reranker::disabled()
        };

        let template =
            LegalPromptTemplate::new(config.generation.prompt_style, config.generation.language)
                .with_max_context_chars(config.generation.prompt_context_chars);

        Ok(Self {
            config,
            lexical: RwLock::new(Arc::new(lexical)),
            semantic,
            reranker,
            generator: ports.generator,
            template,
            ready: AtomicBool::new(false),
        })
    }

    /// Warm collaborators. Idempotent; safe to retry after a failure.
    ///
    /// Reranker and embedding failures degrade. A generator that is not
    /// reachable fails with [`HukumError::BackendNotReady`].
    pub fn ensure_ready(&self) -> Result<(), HukumError> {
        if self.is_ready() {
            return Ok(());
        }

        if self.reranker.warm_up() {
            debug!("Reranker ready");
        }

        if let Some(semantic) = &self.semantic {
            if let Err(e) = semantic.embedding().ensure_ready() {
                warn!("Embedding model failed to warm up, semantic search may fail: {}", e);
            }
        }

        self.generator.warm_up()?;
        self.ready.store(true, Ordering::SeqCst);
        info!("Engine ready (generator {})", self.generator.model_id());
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn require_ready(&self) -> Result<(), HukumError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(HukumError::NotInitialized)
        }
    }

    pub fn config(&self) -> &HukumConfig {
        &self.config
    }

    /// Snapshot of the current lexical index.
    pub fn lexical_index(&self) -> Result<Arc<LexicalIndex>, HukumError> {
        self.lexical
            .read()
            .map(|guard| Arc::clone(&guard))
            .map_err(|_| lock_poisoned("lexical index"))
    }

    fn swap_lexical(&self, index: LexicalIndex) -> Result<(), HukumError> {
        let mut guard = self
            .lexical
            .write()
            .map_err(|_| lock_poisoned("lexical index"))?;
        *guard = Arc::new(index);
        Ok(())
    }

    fn orchestrator<'a>(&'a self, lexical: &'a LexicalIndex) -> QueryOrchestrator<'a> {
        QueryOrchestrator::new(
            &self.config,
            lexical,
            self.semantic.as_ref(),
            &self.reranker,
            self.generator.as_ref(),
            &self.template,
        )
    }

    // -------------------------------------------------------------------------
    // Indexing
    // -------------------------------------------------------------------------

    /// Replace the index with one built from `chunks`.
    ///
    /// The lexical index is swapped atomically; semantic indexing failures
    /// are logged and reported as `semantic_indexed: None`.
    pub fn build_index(&self, chunks: Vec<Chunk>) -> Result<IndexReport, HukumError> {
        let index = LexicalIndex::build(chunks, self.config.bm25_params())?;
        let stats = index.stats();

        let semantic_indexed = match &self.semantic {
            Some(semantic) => match semantic.index_chunks(index.chunks()) {
                Ok(count) => Some(count),
                Err(e) => {
                    warn!("Semantic indexing failed, index is lexical-only: {}", e);
                    None
                }
            },
            None => None,
        };

        self.swap_lexical(index)?;
        info!(
            "Built index: {} documents, {} terms",
            stats.document_count, stats.vocabulary_size
        );

        Ok(IndexReport {
            document_count: stats.document_count,
            vocabulary_size: stats.vocabulary_size,
            semantic_indexed,
        })
    }

    /// Persist the lexical index to `config.index_dir()`.
    pub fn save(&self) -> Result<LexicalIndexMeta, HukumError> {
        let index = self.lexical_index()?;
        if index.is_empty() {
            return Err(HukumError::IndexNotReady);
        }
        save_lexical_index(&index, &self.config.index_dir())
    }

    /// Drop every indexed chunk, on disk too. Vectors are removed only with
    /// `include_semantic`.
    pub fn clear_index(&self, include_semantic: bool) -> Result<(), HukumError> {
        self.swap_lexical(LexicalIndex::empty(self.config.bm25_params()))?;
        let removed = remove_lexical_index(&self.config.index_dir())?;
        info!(
            "Cleared lexical index{}",
            if removed { " and its snapshot" } else { "" }
        );

        if include_semantic {
            match &self.semantic {
                Some(semantic) => semantic.clear()?,
                None => warn!("No vector store configured, nothing to clear"),
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Retrieval
    // -------------------------------------------------------------------------

    /// Fused lexical + semantic candidates, no reranking or generation.
    pub fn hybrid_search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievalCandidate>, HukumError> {
        let lexical = self.lexical_index()?;
        Ok(self.orchestrator(&lexical).retrieve(query, top_k).candidates)
    }

    /// Retrieval with one explicit method.
    ///
    /// Unlike the hybrid path, a semantic-only search surfaces backend errors.
    pub fn search(
        &self,
        query: &str,
        top_k: usize,
        method: SearchMethod,
    ) -> Result<Vec<RetrievalCandidate>, HukumError> {
        let lexical = self.lexical_index()?;
        match method {
            SearchMethod::Lexical => Ok(lexical.search(query, top_k)),
            SearchMethod::Semantic => match &self.semantic {
                Some(semantic) => semantic.search(query, top_k, lexical.as_ref()),
                None => Err(HukumError::BackendNotReady {
                    backend: "semantic".to_string(),
                    reason: "no embedding model or vector store configured".to_string(),
                }),
            },
            SearchMethod::Hybrid => Ok(self.orchestrator(&lexical).retrieve(query, top_k).candidates),
        }
    }

    pub fn sources(&self, candidates: &[RetrievalCandidate]) -> Vec<SourceRef> {
        candidates.iter().map(SourceRef::from).collect()
    }

    // -------------------------------------------------------------------------
    // Answering
    // -------------------------------------------------------------------------

    /// Answer `question` through the full query state machine.
    pub fn answer(&self, question: &str, options: &QueryOptions) -> Result<QueryResponse, HukumError> {
        self.require_ready()?;
        let lexical = self.lexical_index()?;
        self.orchestrator(&lexical).run(question, options)
    }

    /// Stream an answer. Retrieval only: no reranking, gate or fallback.
    pub fn answer_stream(&self, question: &str, options: &QueryOptions) -> Result<TokenStream, HukumError> {
        self.require_ready()?;
        let lexical = self.lexical_index()?;
        let candidates = self.orchestrator(&lexical).retrieve(question, options.top_k).candidates;

        if candidates.is_empty() {
            info!("No documents matched the streamed query");
            return Ok(Box::new(std::iter::once(Ok(
                NO_DOCUMENTS_STREAM_ANSWER.to_string()
            ))));
        }

        let assembler =
            ContextAssembler::new(self.config.context.max_chars, self.config.context.include_metadata);
        let context = assembler.assemble(candidates.iter().map(|c| &c.chunk));
        let prompt = self.template.format_rag(question, &context);
        self.generator.stream_generate(
            &prompt,
            &GenerationParams::new(options.max_tokens, options.temperature),
        )
    }

    /// Direct generation with the chat template, no retrieval.
    pub fn chat(&self, question: &str, max_tokens: usize, temperature: f32) -> Result<String, HukumError> {
        self.require_ready()?;
        let prompt = self.template.format_chat(question);
        self.generator
            .generate(&prompt, &GenerationParams::new(max_tokens, temperature))
    }

    // -------------------------------------------------------------------------
    // Diagnostics
    // -------------------------------------------------------------------------

    /// Tokens the lexical index would see for `text`.
    pub fn tokens(&self, text: &str) -> Vec<String> {
        tokenize(text)
    }

    pub fn stats(&self) -> Result<EngineStats, HukumError> {
        let stats = self.lexical_index()?.stats();
        let (semantic_connected, semantic_backend, vector_count, embedding_model) =
            match &self.semantic {
                Some(semantic) => (
                    semantic.is_connected(),
                    Some(semantic.store().backend_name().to_string()),
                    semantic.store().len().ok(),
                    Some(semantic.embedding().model_id().to_string()),
                ),
                None => (false, None, None, None),
            };

        Ok(EngineStats {
            document_count: stats.document_count,
            vocabulary_size: stats.vocabulary_size,
            average_document_length: stats.average_document_length,
            total_tokens: stats.total_tokens,
            semantic_backend_connected: semantic_connected,
            semantic_backend,
            vector_count,
            embedding_model,
            reranker_model: self.reranker.model_id().map(str::to_string),
            reranker_enabled: self.reranker.is_enabled(),
            generation_model: self.generator.model_id().to_string(),
            generation_backend_ready: self.generator.is_ready(),
            fusion_method: FusionMethod::resolve(&self.config.fusion.method).to_string(),
            gate_threshold: self.config.gate.threshold,
            index_path: self.config.index_dir(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkMetadata;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    struct EchoGenerator {
        reachable: AtomicBool,
        warm_ups: AtomicUsize,
    }

    impl GenerationPort for EchoGenerator {
        fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<String, HukumError> {
            Ok("jawaban".to_string())
        }

        fn stream_generate(
            &self,
            _prompt: &str,
            _params: &GenerationParams,
        ) -> Result<TokenStream, HukumError> {
            Ok(Box::new(vec![Ok("ja".to_string()), Ok("waban".to_string())].into_iter()))
        }

        fn is_ready(&self) -> bool {
            self.reachable.load(Ordering::SeqCst)
        }

        fn warm_up(&self) -> Result<(), HukumError> {
            self.warm_ups.fetch_add(1, Ordering::SeqCst);
            if self.is_ready() {
                Ok(())
            } else {
                Err(HukumError::BackendNotReady {
                    backend: "echo".into(),
                    reason: "offline".into(),
                })
            }
        }

        fn model_id(&self) -> &str {
            "echo"
        }
    }

    fn make_engine(temp: &TempDir, reachable: bool) -> (HukumEngine, Arc<EchoGenerator>) {
        let mut config = HukumConfig::default();
        config.lexical.index_path = Some(temp.path().join("indices"));
        config.semantic.enabled = false;
        let generator = Arc::new(EchoGenerator {
            reachable: AtomicBool::new(reachable),
            warm_ups: AtomicUsize::new(0),
        });
        let engine = HukumEngine::new(config, HukumPorts::new(generator.clone())).unwrap();
        (engine, generator)
    }

    fn chunks() -> Vec<Chunk> {
        vec![
            Chunk::new("a", "Pasal 1234 tentang perikatan.", ChunkMetadata::new().with("source", "a.pdf")),
            Chunk::new("b", "Pasal 1365 tentang ganti rugi.", ChunkMetadata::new().with("source", "b.pdf")),
        ]
    }

    #[test]
    fn test_search_method_parse() {
        assert_eq!("bm25".parse::<SearchMethod>().unwrap(), SearchMethod::Lexical);
        assert_eq!("Hybrid".parse::<SearchMethod>().unwrap(), SearchMethod::Hybrid);
        assert_eq!("semantic".parse::<SearchMethod>().unwrap(), SearchMethod::Semantic);
        assert!("fuzzy".parse::<SearchMethod>().is_err());
    }

    #[test]
    fn test_answer_requires_ready() {
        let temp = TempDir::new().unwrap();
        let (engine, _) = make_engine(&temp, true);
        let opts = QueryOptions::from_config(engine.config());
        assert!(matches!(
            engine.answer("pasal 1234", &opts),
            Err(HukumError::NotInitialized)
        ));
        assert!(matches!(engine.chat("halo", 10, 0.5), Err(HukumError::NotInitialized)));
    }

    #[test]
    fn test_ensure_ready_is_retryable_and_idempotent() {
        let temp = TempDir::new().unwrap();
        let (engine, generator) = make_engine(&temp, false);

        assert!(matches!(
            engine.ensure_ready(),
            Err(HukumError::BackendNotReady { .. })
        ));
        assert!(!engine.is_ready());

        generator.reachable.store(true, Ordering::SeqCst);
        engine.ensure_ready().unwrap();
        engine.ensure_ready().unwrap();
        assert!(engine.is_ready());
        assert_eq!(generator.warm_ups.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_build_save_and_reload() {
        let temp = TempDir::new().unwrap();
        let (engine, _) = make_engine(&temp, true);
        assert!(matches!(engine.save(), Err(HukumError::IndexNotReady)));

        let report = engine.build_index(chunks()).unwrap();
        assert_eq!(report.document_count, 2);
        assert_eq!(report.semantic_indexed, None);
        engine.save().unwrap();

        let (reloaded, _) = make_engine(&temp, true);
        let before = engine.search("pasal 1365", 5, SearchMethod::Lexical).unwrap();
        let after = reloaded.search("pasal 1365", 5, SearchMethod::Lexical).unwrap();
        assert_eq!(before, after);
        assert_eq!(after[0].chunk.id.as_str(), "b");

        reloaded.clear_index(false).unwrap();
        assert_eq!(reloaded.stats().unwrap().document_count, 0);
        let (after_clear, _) = make_engine(&temp, true);
        assert_eq!(after_clear.stats().unwrap().document_count, 0);
    }

    #[test]
    fn test_semantic_search_without_backend_is_an_error() {
        let temp = TempDir::new().unwrap();
        let (engine, _) = make_engine(&temp, true);
        assert!(matches!(
            engine.search("pasal", 3, SearchMethod::Semantic),
            Err(HukumError::BackendNotReady { .. })
        ));
        let stats = engine.stats().unwrap();
        assert!(!stats.semantic_backend_connected);
        assert!(stats.generation_backend_ready);
    }

    #[test]
    fn test_stream_without_documents() {
        let temp = TempDir::new().unwrap();
        let (engine, _) = make_engine(&temp, true);
        engine.ensure_ready().unwrap();
        let opts = QueryOptions::from_config(engine.config());
        let tokens: Vec<String> = engine
            .answer_stream("pasal 1234", &opts)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(tokens, vec![NO_DOCUMENTS_STREAM_ANSWER.to_string()]);

        engine.build_index(chunks()).unwrap();
        let streamed: String = engine
            .answer_stream("pasal 1234", &opts)
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
            .concat();
        assert_eq!(streamed, "jawaban");
    }
}
