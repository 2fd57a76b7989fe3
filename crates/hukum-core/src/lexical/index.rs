//! Lexical inverted index.
//!
//! Holds the chunk set, its tokenized corpus and the aggregate statistics
//! derived from them. Statistics are always recomputed from the corpus, so an
//! index restored from a snapshot scores identically to a fresh build.

use std::collections::HashMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::scorer::{bm25_term_score, idf, Bm25Params};
use super::tokenizer::tokenize;
use crate::errors::HukumError;
use crate::types::{CandidateSource, Chunk, ChunkId, RetrievalCandidate};

/// Posting entry: document index and term frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Posting {
    doc_idx: usize,
    term_freq: u32,
}

/// Read access to chunks by id.
pub trait ChunkLookup {
    fn lookup(&self, id: &ChunkId) -> Option<&Chunk>;
}

impl ChunkLookup for HashMap<ChunkId, Chunk> {
    fn lookup(&self, id: &ChunkId) -> Option<&Chunk> {
        self.get(id)
    }
}

/// BM25 index over a fixed chunk set.
///
/// Immutable once built; rebuilding produces a new instance.
#[derive(Debug, Clone)]
pub struct LexicalIndex {
    params: Bm25Params,
    chunks: Vec<Chunk>,
    corpus: Vec<Vec<String>>,
    /// Term -> postings in document order. Document frequency is the list length.
    postings: HashMap<String, Vec<Posting>>,
    doc_lengths: Vec<usize>,
    id_to_idx: HashMap<ChunkId, usize>,
    avg_doc_len: f32,
    total_tokens: usize,
}

impl LexicalIndex {
    /// An index with no documents. Every search returns nothing.
    pub fn empty(params: Bm25Params) -> Self {
        Self {
            params,
            chunks: Vec::new(),
            corpus: Vec::new(),
            postings: HashMap::new(),
            doc_lengths: Vec::new(),
            id_to_idx: HashMap::new(),
            avg_doc_len: 0.0,
            total_tokens: 0,
        }
    }

    /// Tokenize `chunks` in parallel and build the index.
    ///
    /// # Errors
    ///
    /// Returns [`HukumError::IndexBuild`] if there are no chunks or every
    /// chunk tokenizes to nothing.
    pub fn build(chunks: Vec<Chunk>, params: Bm25Params) -> Result<Self, HukumError> {
        info!("Building lexical index from {} chunks", chunks.len());

        let corpus: Vec<Vec<String>> = chunks.par_iter().map(|c| tokenize(&c.content)).collect();
        let index = Self::from_parts(params, chunks, corpus)?;

        info!(
            "Lexical index built: {} docs, {} terms, avg length {:.1}",
            index.len(),
            index.vocabulary_size(),
            index.avg_doc_len
        );
        Ok(index)
    }

    /// Assemble an index from an already tokenized corpus.
    ///
    /// Statistics are computed sequentially in document order.
    pub fn from_parts(
        params: Bm25Params,
        chunks: Vec<Chunk>,
        corpus: Vec<Vec<String>>,
    ) -> Result<Self, HukumError> {
        if chunks.is_empty() {
            return Err(HukumError::IndexBuild {
                reason: "no chunks to index".to_string(),
            });
        }
        if chunks.len() != corpus.len() {
            return Err(HukumError::IndexBuild {
                reason: format!(
                    "{} chunks but {} tokenized documents",
                    chunks.len(),
                    corpus.len()
                ),
            });
        }

        let total_tokens: usize = corpus.iter().map(Vec::len).sum();
        if total_tokens == 0 {
            return Err(HukumError::IndexBuild {
                reason: format!("all {} chunks tokenized to zero terms", chunks.len()),
            });
        }

        let mut postings: HashMap<String, Vec<Posting>> = HashMap::new();
        let mut doc_lengths = Vec::with_capacity(corpus.len());
        for (doc_idx, tokens) in corpus.iter().enumerate() {
            doc_lengths.push(tokens.len());

            let mut term_freqs: HashMap<&str, u32> = HashMap::new();
            for token in tokens {
                *term_freqs.entry(token.as_str()).or_insert(0) += 1;
            }
            for (term, term_freq) in term_freqs {
                postings
                    .entry(term.to_string())
                    .or_default()
                    .push(Posting { doc_idx, term_freq });
            }
        }

        let mut id_to_idx = HashMap::with_capacity(chunks.len());
        for (idx, chunk) in chunks.iter().enumerate() {
            if id_to_idx.insert(chunk.id.clone(), idx).is_some() {
                warn!("Duplicate chunk id '{}' in lexical index", chunk.id);
            }
        }

        let empty_docs = doc_lengths.iter().filter(|&&len| len == 0).count();
        if empty_docs > 0 {
            debug!("{} chunks produced no tokens", empty_docs);
        }

        Ok(Self {
            params,
            avg_doc_len: total_tokens as f32 / corpus.len() as f32,
            total_tokens,
            chunks,
            corpus,
            postings,
            doc_lengths,
            id_to_idx,
        })
    }

    /// Top `top_k` chunks for `query`, descending by score.
    ///
    /// Zero-score documents are excluded. Ties keep corpus order.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<RetrievalCandidate> {
        if self.chunks.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return Vec::new();
        }

        let mut ranked: Vec<(usize, f32)> = self
            .score_tokens(&query_tokens)
            .into_iter()
            .enumerate()
            .filter(|(_, score)| *score > 0.0)
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        ranked.truncate(top_k);

        debug!(
            "Lexical search: tokens={:?}, {} results",
            query_tokens,
            ranked.len()
        );

        ranked
            .into_iter()
            .enumerate()
            .map(|(rank, (doc_idx, score))| {
                RetrievalCandidate::new(
                    self.chunks[doc_idx].clone(),
                    score,
                    CandidateSource::Lexical,
                    rank + 1,
                )
            })
            .collect()
    }

    /// BM25 score of every document for an already tokenized query.
    pub fn score_tokens(&self, query_tokens: &[String]) -> Vec<f32> {
        let num_docs = self.chunks.len();
        let mut scores = vec![0.0f32; num_docs];

        for token in query_tokens {
            let Some(postings) = self.postings.get(token) else {
                continue;
            };
            let idf_value = idf(num_docs, postings.len());
            for posting in postings {
                scores[posting.doc_idx] += bm25_term_score(
                    posting.term_freq,
                    self.doc_lengths[posting.doc_idx],
                    self.avg_doc_len,
                    idf_value,
                    &self.params,
                );
            }
        }
        scores
    }

    /// Tokens the index would produce for `text`.
    pub fn tokens(&self, text: &str) -> Vec<String> {
        tokenize(text)
    }

    pub fn chunk(&self, id: &ChunkId) -> Option<&Chunk> {
        self.id_to_idx.get(id).map(|&idx| &self.chunks[idx])
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn corpus(&self) -> &[Vec<String>] {
        &self.corpus
    }

    pub fn params(&self) -> Bm25Params {
        self.params
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.postings.len()
    }

    /// Number of documents containing `term`.
    pub fn document_frequency(&self, term: &str) -> usize {
        self.postings.get(term).map(Vec::len).unwrap_or(0)
    }

    pub fn stats(&self) -> LexicalIndexStats {
        LexicalIndexStats {
            document_count: self.chunks.len(),
            vocabulary_size: self.postings.len(),
            average_document_length: self.avg_doc_len,
            total_tokens: self.total_tokens,
            k1: self.params.k1,
            b: self.params.b,
        }
    }
}

impl ChunkLookup for LexicalIndex {
    fn lookup(&self, id: &ChunkId) -> Option<&Chunk> {
        self.chunk(id)
    }
}

/// Statistics about the lexical index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexicalIndexStats {
    pub document_count: usize,
    pub vocabulary_size: usize,
    pub average_document_length: f32,
    pub total_tokens: usize,
    pub k1: f32,
    pub b: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkMetadata;

    fn chunk(id: &str, content: &str) -> Chunk {
        Chunk::new(id, content, ChunkMetadata::new().with("source", format!("{}.pdf", id)))
    }

    fn sample() -> LexicalIndex {
        LexicalIndex::build(
            vec![
                chunk("1", "Pasal 1234 ayat (1) menyatakan bahwa setiap warga negara berhak atas perlindungan hukum."),
                chunk("2", "Berdasarkan UU No. 40 Tahun 2007 tentang Perseroan Terbatas, direksi bertanggung jawab penuh."),
                chunk("3", "Menurut Pasal 1365 KUHPerdata, setiap perbuatan melanggar hukum mewajibkan ganti kerugian."),
            ],
            Bm25Params::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_pasal_lookup_ranks_exact_reference_first() {
        let index = sample();
        let results = index.search("pasal 1234", 3);
        assert!(!results.is_empty());
        assert_eq!(results[0].chunk.id.as_str(), "1");
        assert!(results[0].score > 0.0);
        assert_eq!(results[0].rank, 1);
        assert_eq!(results[0].source, CandidateSource::Lexical);
        // "pasal_1234" only occurs in chunk 1.
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_uu_lookup() {
        let index = sample();
        let results = index.search("UU No. 40", 5);
        assert_eq!(results[0].chunk.id.as_str(), "2");
    }

    #[test]
    fn test_search_respects_top_k_and_order() {
        let index = sample();
        let results = index.search("hukum setiap", 2);
        assert!(results.len() <= 2);
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert!(results.iter().all(|r| r.score > 0.0));
    }

    #[test]
    fn test_unknown_terms_yield_nothing() {
        let index = sample();
        assert!(index.search("zzzz qqqq", 5).is_empty());
        assert!(index.search("", 5).is_empty());
        assert!(index.search("hukum", 0).is_empty());
    }

    #[test]
    fn test_empty_index_searches_empty() {
        let index = LexicalIndex::empty(Bm25Params::default());
        assert!(index.is_empty());
        assert!(index.search("pasal 1", 5).is_empty());
    }

    #[test]
    fn test_degenerate_corpus_rejected() {
        let err = LexicalIndex::build(
            vec![chunk("a", "!"), chunk("b", "x y z")],
            Bm25Params::default(),
        )
        .unwrap_err();
        assert!(matches!(err, HukumError::IndexBuild { .. }));

        let err = LexicalIndex::build(vec![], Bm25Params::default()).unwrap_err();
        assert!(matches!(err, HukumError::IndexBuild { .. }));
    }

    #[test]
    fn test_partially_empty_corpus_is_accepted() {
        let index = LexicalIndex::build(
            vec![chunk("a", "?"), chunk("b", "perseroan terbatas")],
            Bm25Params::default(),
        )
        .unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.stats().total_tokens, 2);
        assert_eq!(index.search("perseroan", 5)[0].chunk.id.as_str(), "b");
    }

    #[test]
    fn test_repeated_query_terms_add_up() {
        let index = sample();
        let once = index.score_tokens(&["direksi".to_string()]);
        let twice = index.score_tokens(&["direksi".to_string(), "direksi".to_string()]);
        assert!((twice[1] - 2.0 * once[1]).abs() < 1e-6);
    }

    #[test]
    fn test_stats_and_lookup() {
        let index = sample();
        let stats = index.stats();
        assert_eq!(stats.document_count, 3);
        assert!(stats.vocabulary_size > 10);
        assert!(stats.average_document_length > 0.0);
        assert_eq!(stats.k1, 1.5);
        assert_eq!(index.document_frequency("hukum"), 2);
        assert_eq!(index.document_frequency("pasal_1365"), 1);

        let id = ChunkId::new("3");
        assert_eq!(index.chunk(&id).map(|c| c.id.as_str()), Some("3"));
        assert!(index.lookup(&ChunkId::new("missing")).is_none());
    }

    #[test]
    fn test_ties_keep_corpus_order() {
        let index = LexicalIndex::build(
            vec![chunk("a", "hibah tanah"), chunk("b", "hibah tanah")],
            Bm25Params::default(),
        )
        .unwrap();
        let results = index.search("hibah", 2);
        assert_eq!(results[0].chunk.id.as_str(), "a");
        assert_eq!(results[1].chunk.id.as_str(), "b");
        assert_eq!(results[0].score, results[1].score);
    }
}
