//! Semantic retrieval over the embedding and vector-store ports.
//!
//! [`SemanticRetriever`] embeds chunks at ingestion, stores them with flat
//! metadata, and maps query hits back to full chunks.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::errors::HukumError;
use crate::lexical::ChunkLookup;
use crate::ports::{EmbeddingPort, SemanticHit, SemanticRecord, SemanticSearchPort};
use crate::types::{CandidateSource, Chunk, ChunkId, ChunkMetadata, RetrievalCandidate};

/// Default number of chunks embedded per call.
pub const DEFAULT_EMBED_BATCH_SIZE: usize = 32;

/// Stored content is cut to this many characters.
pub const MAX_STORED_CONTENT_CHARS: usize = 1000;

/// Metadata keys copied into the vector payload.
const PAYLOAD_KEYS: [&str; 5] = ["source", "page", "section", "doc_type", "case_type"];

const UNKNOWN_CHUNK_ID: &str = "unknown";

/// Couples an embedding model with a vector store.
#[derive(Clone)]
pub struct SemanticRetriever {
    embedding: Arc<dyn EmbeddingPort>,
    store: Arc<dyn SemanticSearchPort>,
    batch_size: usize,
}

impl std::fmt::Debug for SemanticRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticRetriever")
            .field("embedding", &self.embedding.model_id())
            .field("store", &self.store.backend_name())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl SemanticRetriever {
    pub fn new(embedding: Arc<dyn EmbeddingPort>, store: Arc<dyn SemanticSearchPort>) -> Self {
        Self {
            embedding,
            store,
            batch_size: DEFAULT_EMBED_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn is_connected(&self) -> bool {
        self.store.is_connected()
    }

    pub fn store(&self) -> &Arc<dyn SemanticSearchPort> {
        &self.store
    }

    pub fn embedding(&self) -> &Arc<dyn EmbeddingPort> {
        &self.embedding
    }

    /// Embed and upsert every chunk. Returns the number of vectors written.
    pub fn index_chunks(&self, chunks: &[Chunk]) -> Result<usize, HukumError> {
        let mut written = 0;
        for (batch_idx, batch) in chunks.chunks(self.batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let vectors = self.embedding.embed_documents(&texts)?;
            if vectors.len() != batch.len() {
                return Err(HukumError::Embedding {
                    model_id: self.embedding.model_id().to_string(),
                    reason: format!(
                        "expected {} vectors, got {}",
                        batch.len(),
                        vectors.len()
                    ),
                });
            }

            let records: Vec<SemanticRecord> = batch
                .iter()
                .zip(vectors)
                .map(|(chunk, vector)| SemanticRecord {
                    chunk_id: chunk.id.clone(),
                    vector,
                    metadata: record_metadata(chunk),
                })
                .collect();
            self.store.upsert(&records)?;
            written += records.len();
            debug!("Indexed semantic batch {} ({} chunks)", batch_idx + 1, batch.len());
        }
        info!(
            "Indexed {} chunks into {} vector store",
            written,
            self.store.backend_name()
        );
        Ok(written)
    }

    /// Nearest chunks to `query`, best first, tagged as semantic.
    ///
    /// Hits are resolved through `lookup`; a hit the lookup does not know is
    /// rebuilt from its stored metadata.
    pub fn search(
        &self,
        query: &str,
        top_k: usize,
        lookup: &dyn ChunkLookup,
    ) -> Result<Vec<RetrievalCandidate>, HukumError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let vector = self.embedding.embed_query(query)?;
        let hits = self.store.search(&vector, top_k)?;

        Ok(hits
            .into_iter()
            .take(top_k)
            .enumerate()
            .map(|(i, hit)| {
                let score = hit.score;
                let chunk = resolve_hit(hit, lookup);
                RetrievalCandidate::new(chunk, score, CandidateSource::Semantic, i + 1)
            })
            .collect())
    }

    /// Remove every stored vector.
    pub fn clear(&self) -> Result<(), HukumError> {
        self.store.clear()?;
        warn!("Cleared {} vector store", self.store.backend_name());
        Ok(())
    }
}

/// Flat payload for a chunk: id, truncated content and the well-known keys.
pub fn record_metadata(chunk: &Chunk) -> ChunkMetadata {
    let content: String = chunk.content.chars().take(MAX_STORED_CONTENT_CHARS).collect();
    let mut meta = ChunkMetadata::new()
        .with("chunk_id", chunk.id.as_str())
        .with("content", content);
    for key in PAYLOAD_KEYS {
        if let Some(value) = chunk.metadata.get(key) {
            if !value.is_array() && !value.is_object() {
                meta.insert(key, value.clone());
            }
        }
    }
    meta
}

fn resolve_hit(hit: SemanticHit, lookup: &dyn ChunkLookup) -> Chunk {
    if let Some(chunk) = hit.chunk_id.as_ref().and_then(|id| lookup.lookup(id)) {
        return chunk.clone();
    }

    let id = hit
        .chunk_id
        .unwrap_or_else(|| ChunkId::new(UNKNOWN_CHUNK_ID));
    let content = hit.metadata.get_str("content").unwrap_or_default().to_string();
    Chunk::new(id, content, hit.metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MockEmbedding {
        calls: AtomicUsize,
    }

    impl EmbeddingPort for MockEmbedding {
        fn embed_query(&self, text: &str) -> Result<Vec<f32>, HukumError> {
            Ok(vec![text.len() as f32, 1.0])
        }

        fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, HukumError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|t| vec![t.len() as f32, 1.0]).collect())
        }

        fn dimension(&self) -> usize {
            2
        }

        fn model_id(&self) -> &str {
            "mock-embed"
        }
    }

    #[derive(Default)]
    struct MockSemanticSearch {
        records: Mutex<Vec<SemanticRecord>>,
        hits: Vec<SemanticHit>,
    }

    impl SemanticSearchPort for MockSemanticSearch {
        fn search(&self, _vector: &[f32], top_k: usize) -> Result<Vec<SemanticHit>, HukumError> {
            Ok(self.hits.iter().take(top_k).cloned().collect())
        }

        fn upsert(&self, records: &[SemanticRecord]) -> Result<(), HukumError> {
            self.records.lock().unwrap().extend_from_slice(records);
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
            true
        }

        fn backend_name(&self) -> &str {
            "mock"
        }
    }

    fn chunk(id: &str, content: &str) -> Chunk {
        Chunk::new(
            id,
            content,
            ChunkMetadata::new()
                .with("source", "putusan_1.pdf")
                .with("page", 2)
                .with("section", "amar")
                .with("extra", "not stored"),
        )
    }

    #[test]
    fn test_index_chunks_batches_and_flattens() {
        let embedding = Arc::new(MockEmbedding {
            calls: AtomicUsize::new(0),
        });
        let store = Arc::new(MockSemanticSearch::default());
        let retriever = SemanticRetriever::new(embedding.clone(), store.clone()).with_batch_size(2);

        let chunks: Vec<Chunk> = (0..5)
            .map(|i| chunk(&format!("c{i}"), &"isi ".repeat(400)))
            .collect();
        assert_eq!(retriever.index_chunks(&chunks).unwrap(), 5);
        assert_eq!(embedding.calls.load(Ordering::SeqCst), 3);

        let records = store.records.lock().unwrap();
        assert_eq!(records.len(), 5);
        let meta = &records[0].metadata;
        assert_eq!(meta.get_str("chunk_id"), Some("c0"));
        assert_eq!(meta.get_str("content").unwrap().chars().count(), 1000);
        assert_eq!(meta.section(), Some("amar"));
        assert!(meta.get("extra").is_none());
    }

    #[test]
    fn test_search_resolves_through_lookup() {
        let known = chunk("known", "Pasal 1365 KUHPerdata");
        let mut lookup = HashMap::new();
        lookup.insert(known.id.clone(), known.clone());

        let store = Arc::new(MockSemanticSearch {
            hits: vec![
                SemanticHit {
                    chunk_id: Some(ChunkId::new("known")),
                    score: 0.9,
                    metadata: ChunkMetadata::new(),
                },
                SemanticHit {
                    chunk_id: None,
                    score: 0.7,
                    metadata: ChunkMetadata::new()
                        .with("content", "isi tersimpan")
                        .with("source", "lain.pdf"),
                },
            ],
            ..Default::default()
        });
        let retriever = SemanticRetriever::new(
            Arc::new(MockEmbedding {
                calls: AtomicUsize::new(0),
            }),
            store,
        );

        let results = retriever.search("perbuatan melawan hukum", 5, &lookup).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk, known);
        assert_eq!(results[0].rank, 1);
        assert_eq!(results[0].source, CandidateSource::Semantic);
        assert_eq!(results[1].chunk.id.as_str(), "unknown");
        assert_eq!(results[1].chunk.content, "isi tersimpan");
        assert_eq!(results[1].chunk.metadata.source(), Some("lain.pdf"));
    }

    #[test]
    fn test_clear_empties_store() {
        let store = Arc::new(MockSemanticSearch::default());
        let retriever = SemanticRetriever::new(
            Arc::new(MockEmbedding {
                calls: AtomicUsize::new(0),
            }),
            store.clone(),
        );
        retriever.index_chunks(&[chunk("a", "isi")]).unwrap();
        assert_eq!(store.len().unwrap(), 1);
        retriever.clear().unwrap();
        assert_eq!(store.len().unwrap(), 0);
    }
}
