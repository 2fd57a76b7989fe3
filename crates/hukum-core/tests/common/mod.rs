//! Shared mocks for hukum-core integration tests.
//!
//! Every mock counts its calls so tests can assert which ports a query touched.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use hukum_core::{
    Chunk, ChunkId, ChunkMetadata, EmbeddingPort, GenerationParams, GenerationPort, HukumConfig,
    HukumEngine, HukumError, HukumPorts, RerankingPort, SemanticHit, SemanticRecord,
    SemanticSearchPort, TokenStream,
};
use tempfile::TempDir;

// ============================================================================
// Embedding
// ============================================================================

/// Bag-of-letters embedding: similar spelling, similar vector.
#[derive(Default)]
pub struct MockEmbedding {
    pub calls: AtomicUsize,
}

pub const MOCK_DIMENSION: usize = 26;

pub fn letter_vector(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; MOCK_DIMENSION];
    for c in text.to_lowercase().chars() {
        if c.is_ascii_lowercase() {
            v[(c as u8 - b'a') as usize] += 1.0;
        }
    }
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    v
}

impl EmbeddingPort for MockEmbedding {
    fn embed_query(&self, text: &str) -> Result<Vec<f32>, HukumError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(letter_vector(text))
    }

    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, HukumError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| letter_vector(t)).collect())
    }

    fn dimension(&self) -> usize {
        MOCK_DIMENSION
    }

    fn model_id(&self) -> &str {
        "mock-embedding"
    }
}

// ============================================================================
// Semantic search
// ============================================================================

/// In-memory cosine search. `failing` makes every search an error.
#[derive(Default)]
pub struct MockSemanticSearch {
    pub records: Mutex<Vec<SemanticRecord>>,
    pub calls: AtomicUsize,
    pub failing: bool,
    pub panicking: bool,
}

impl MockSemanticSearch {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Default::default()
        }
    }

    /// Stores records normally but panics on every search.
    pub fn panicking() -> Self {
        Self {
            panicking: true,
            ..Default::default()
        }
    }
}

impl SemanticSearchPort for MockSemanticSearch {
    fn search(&self, vector: &[f32], top_k: usize) -> Result<Vec<SemanticHit>, HukumError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panicking {
            panic!("vector store client crashed");
        }
        if self.failing {
            return Err(HukumError::SemanticSearch {
                backend: "mock".into(),
                reason: "connection refused".into(),
            });
        }
        let records = self.records.lock().unwrap();
        let mut hits: Vec<SemanticHit> = records
            .iter()
            .map(|r| SemanticHit {
                chunk_id: Some(r.chunk_id.clone()),
                score: r.vector.iter().zip(vector).map(|(a, b)| a * b).sum(),
                metadata: r.metadata.clone(),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        Ok(hits)
    }

    fn upsert(&self, records: &[SemanticRecord]) -> Result<(), HukumError> {
        if self.failing {
            return Err(HukumError::SemanticSearch {
                backend: "mock".into(),
                reason: "connection refused".into(),
            });
        }
        let mut stored = self.records.lock().unwrap();
        for record in records {
            stored.retain(|r| r.chunk_id != record.chunk_id);
            stored.push(record.clone());
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), HukumError> {
        self.records.lock().unwrap().clear();
        Ok(())
    }

    fn len(&self) -> Result<usize, HukumError> {
        Ok(self.records.lock().unwrap().len())
    }

    fn is_connected(&self) -> bool {
        !self.failing
    }

    fn backend_name(&self) -> &str {
        "mock"
    }
}

// ============================================================================
// Reranker
// ============================================================================

/// Scores a pair as `score` plus the number of query words found in the passage.
pub struct MockReranker {
    pub score: f32,
    pub calls: AtomicUsize,
}

impl MockReranker {
    pub fn scoring(score: f32) -> Self {
        Self {
            score,
            calls: AtomicUsize::new(0),
        }
    }
}

impl RerankingPort for MockReranker {
    fn score_batch(&self, pairs: &[(String, String)]) -> Result<Vec<f32>, HukumError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(pairs
            .iter()
            .map(|(query, passage)| {
                let passage = passage.to_lowercase();
                let overlap = query
                    .to_lowercase()
                    .split_whitespace()
                    .filter(|word| passage.contains(word))
                    .count();
                self.score + overlap as f32
            })
            .collect())
    }

    fn model_id(&self) -> &str {
        "mock-reranker"
    }
}

// ============================================================================
// Generator
// ============================================================================

/// Returns `reply` for every call and records the prompts it saw.
pub struct MockGenerator {
    pub reply: String,
    pub calls: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

impl MockGenerator {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl GenerationPort for MockGenerator {
    fn generate(&self, prompt: &str, _params: &GenerationParams) -> Result<String, HukumError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.reply.clone())
    }

    fn stream_generate(
        &self,
        prompt: &str,
        _params: &GenerationParams,
    ) -> Result<TokenStream, HukumError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        let tokens: Vec<Result<String, HukumError>> = self
            .reply
            .split_inclusive(' ')
            .map(|t| Ok(t.to_string()))
            .collect();
        Ok(Box::new(tokens.into_iter()))
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn model_id(&self) -> &str {
        "mock-generator"
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// The three-chunk legal corpus.
pub fn legal_chunks() -> Vec<Chunk> {
    vec![
        Chunk::new(
            ChunkId::new("kuh_1234"),
            "Pasal 1234 KUHPerdata: tiap-tiap perikatan adalah untuk memberikan sesuatu, berbuat sesuatu, atau tidak berbuat sesuatu.",
            ChunkMetadata::new()
                .with("source", "kuhperdata.pdf")
                .with("page", 12)
                .with("doc_type", "undang_undang"),
        ),
        Chunk::new(
            ChunkId::new("uu_pt"),
            "UU No. 40 Tahun 2007 tentang Perseroan Terbatas mengatur pendirian dan organ perseroan.",
            ChunkMetadata::new()
                .with("source", "uu_40_2007.pdf")
                .with("page", 1)
                .with("doc_type", "undang_undang"),
        ),
        Chunk::new(
            ChunkId::new("kuh_1365"),
            "Pasal 1365 KUHPerdata: tiap perbuatan melanggar hukum yang membawa kerugian kepada orang lain mewajibkan ganti rugi.",
            ChunkMetadata::new()
                .with("source", "kuhperdata.pdf")
                .with("page", 88)
                .with("doc_type", "undang_undang"),
        ),
    ]
}

/// Config rooted in `temp`, with semantic search on.
pub fn test_config(temp: &TempDir) -> HukumConfig {
    let mut config = HukumConfig::default();
    config.lexical.index_path = Some(temp.path().join("indices"));
    config.vector_store.path = Some(temp.path().join("vectors"));
    config.embedding.dimension = MOCK_DIMENSION;
    config.vector_store.dimension = MOCK_DIMENSION;
    config
}

/// Engine over the given ports, indexed with [`legal_chunks`] and ready.
pub fn ready_engine(config: HukumConfig, ports: HukumPorts) -> HukumEngine {
    let engine = HukumEngine::new(config, ports).expect("engine");
    engine.build_index(legal_chunks()).expect("build index");
    engine.ensure_ready().expect("ready");
    engine
}

/// Mock handles kept by a test after handing clones to the engine.
pub struct Mocks {
    pub embedding: Arc<MockEmbedding>,
    pub semantic: Arc<MockSemanticSearch>,
    pub reranker: Arc<MockReranker>,
    pub generator: Arc<MockGenerator>,
}

impl Mocks {
    pub fn new(semantic: MockSemanticSearch, rerank_score: f32, reply: &str) -> Self {
        Self {
            embedding: Arc::new(MockEmbedding::default()),
            semantic: Arc::new(semantic),
            reranker: Arc::new(MockReranker::scoring(rerank_score)),
            generator: Arc::new(MockGenerator::replying(reply)),
        }
    }

    pub fn ports(&self) -> HukumPorts {
        HukumPorts::new(self.generator.clone())
            .with_semantic(self.embedding.clone(), self.semantic.clone())
            .with_reranker(self.reranker.clone())
    }

    pub fn retrieval_calls(&self) -> usize {
        self.embedding.calls.load(Ordering::SeqCst) + self.semantic.calls.load(Ordering::SeqCst)
    }
}
