//! Common types used throughout Hukum.
//!
//! Document chunks, their identifiers and metadata, and the transient
//! retrieval candidates produced per query.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// ChunkId
// ============================================================================

/// Stable identifier of a document chunk.
///
/// Derived from content hashes, so re-ingesting identical text from the same
/// source at the same position yields the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(pub String);

impl ChunkId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// `{h(source)[:8]}_{index}_{h(content)[:8]}` with `h` = blake3 hex.
    pub fn derive(source: &str, index: usize, content: &str) -> Self {
        let source_hash = blake3::hash(source.as_bytes()).to_hex();
        let content_hash = blake3::hash(content.as_bytes()).to_hex();
        Self(format!(
            "{}_{}_{}",
            &source_hash.as_str()[..8],
            index,
            &content_hash.as_str()[..8]
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChunkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ChunkId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ChunkId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ============================================================================
// ChunkMetadata
// ============================================================================

/// Ordered provenance metadata attached to a chunk.
///
/// Well-known keys: `source`, `page`, `section`, `doc_type`, `case_type`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkMetadata(pub BTreeMap<String, Value>);

impl ChunkMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String value for `key`, if present and a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Scalar value for `key` rendered as text. Null, arrays and objects yield `None`.
    pub fn get_display(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn source(&self) -> Option<&str> {
        self.get_str("source")
    }

    /// Page number as text; stored either as a number or a string.
    pub fn page(&self) -> Option<String> {
        self.get_display("page")
    }

    pub fn section(&self) -> Option<&str> {
        self.get_str("section")
    }

    pub fn doc_type(&self) -> Option<&str> {
        self.get_str("doc_type")
    }

    pub fn case_type(&self) -> Option<&str> {
        self.get_str("case_type")
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl From<BTreeMap<String, Value>> for ChunkMetadata {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

// ============================================================================
// Chunk
// ============================================================================

/// Immutable unit of retrievable text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub content: String,
    #[serde(default)]
    pub metadata: ChunkMetadata,
}

impl Chunk {
    pub fn new(id: impl Into<ChunkId>, content: impl Into<String>, metadata: ChunkMetadata) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata,
        }
    }

    /// Build a chunk whose id is derived from `source`, `index` and `content`.
    ///
    /// `source` is also recorded in the metadata unless already present.
    pub fn derived(
        source: &str,
        index: usize,
        content: impl Into<String>,
        mut metadata: ChunkMetadata,
    ) -> Self {
        let content = content.into();
        if metadata.get("source").is_none() {
            metadata.insert("source", source);
        }
        Self {
            id: ChunkId::derive(source, index, &content),
            content,
            metadata,
        }
    }
}

// ============================================================================
// Retrieval Candidates
// ============================================================================

/// Which retriever produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandidateSource {
    #[serde(rename = "bm25")]
    Lexical,
    #[serde(rename = "semantic")]
    Semantic,
    /// Contributed to by both retrievers.
    #[serde(rename = "fused")]
    Fused,
}

impl std::fmt::Display for CandidateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lexical => write!(f, "bm25"),
            Self::Semantic => write!(f, "semantic"),
            Self::Fused => write!(f, "fused"),
        }
    }
}

/// A chunk with a source-tagged score and 1-based rank. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalCandidate {
    pub chunk: Chunk,
    pub score: f32,
    pub source: CandidateSource,
    pub rank: usize,
}

impl RetrievalCandidate {
    pub fn new(chunk: Chunk, score: f32, source: CandidateSource, rank: usize) -> Self {
        Self {
            chunk,
            score,
            source,
            rank,
        }
    }

    pub fn id(&self) -> &ChunkId {
        &self.chunk.id
    }
}

/// Citation record returned alongside an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub source: String,
    pub page: Option<String>,
    pub doc_type: Option<String>,
    pub score: f32,
    pub retrieval_source: CandidateSource,
}

impl From<&RetrievalCandidate> for SourceRef {
    fn from(candidate: &RetrievalCandidate) -> Self {
        let meta = &candidate.chunk.metadata;
        Self {
            source: meta.source().unwrap_or("Unknown").to_string(),
            page: meta.page(),
            doc_type: meta.doc_type().map(str::to_string),
            score: candidate.score,
            retrieval_source: candidate.source,
        }
    }
}
