//! Vector index traits and core types.
//!
//! This module defines the core abstraction for vector storage backends.

use crate::error::DbResult;
use serde::{Deserialize, Serialize};

// ============================================================================
// VectorId
// ============================================================================

/// Unique identifier for a vector in the index.
///
/// Holds the chunk id string so vectors map back to lexical chunks without
/// a separate lookup table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VectorId(pub String);

impl VectorId {
    /// Create a new vector ID.
    pub fn new(id: impl Into<String>) -> Self {
        VectorId(id.into())
    }

    /// Borrow the underlying ID value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for VectorId {
    fn from(id: String) -> Self {
        VectorId(id)
    }
}

impl From<&str> for VectorId {
    fn from(id: &str) -> Self {
        VectorId(id.to_string())
    }
}

impl std::fmt::Display for VectorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// VectorMetric
// ============================================================================

/// Distance metric for vector similarity search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorMetric {
    /// Cosine similarity (default).
    #[default]
    Cosine,
    /// Dot product.
    Dot,
    /// Euclidean (L2) distance.
    L2,
}

impl VectorMetric {
    /// Get the metric name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            VectorMetric::Cosine => "cosine",
            VectorMetric::Dot => "dot",
            VectorMetric::L2 => "l2",
        }
    }

    /// Parse a metric name, accepting a few common aliases.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "cosine" | "cos" => Some(VectorMetric::Cosine),
            "dot" | "ip" | "inner_product" => Some(VectorMetric::Dot),
            "l2" | "euclidean" => Some(VectorMetric::L2),
            _ => None,
        }
    }
}

impl std::fmt::Display for VectorMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// VectorInsert
// ============================================================================

/// A vector to insert or update in the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorInsert {
    /// Unique identifier for this vector (the chunk id).
    pub id: VectorId,

    /// The embedding vector.
    pub vector: Vec<f32>,

    /// Flat JSON object with chunk metadata and a content preview.
    pub payload: serde_json::Value,
}

impl VectorInsert {
    /// Create a new vector insert.
    pub fn new(id: impl Into<VectorId>, vector: Vec<f32>, payload: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            vector,
            payload,
        }
    }

    /// Read a string field from the payload.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(|v| v.as_str())
    }
}

// ============================================================================
// VectorSearchResult
// ============================================================================

/// A single result from a vector similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorSearchResult {
    /// Identifier of the matched vector.
    pub id: VectorId,

    /// Similarity score, higher is better for every metric.
    pub score: f32,

    /// JSON payload associated with this vector.
    pub payload: serde_json::Value,
}

impl VectorSearchResult {
    /// Create a new search result.
    pub fn new(id: impl Into<VectorId>, score: f32, payload: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            score,
            payload,
        }
    }
}

// ============================================================================
// VectorIndexBackend Trait
// ============================================================================

/// Core trait for vector index backends.
///
/// ## Implementation Notes
///
/// - Backends must be thread-safe (`Send + Sync`).
/// - `query` returns results sorted by relevance, best first.
/// - Upsert semantics: a vector with an existing ID replaces the old one.
pub trait VectorIndexBackend: Send + Sync {
    /// Query the index for the `limit` most similar vectors.
    fn query(&self, embedding: &[f32], limit: usize) -> DbResult<Vec<VectorSearchResult>>;

    /// Insert or update vectors in the index.
    fn upsert(&self, vectors: &[VectorInsert]) -> DbResult<()>;

    /// Delete vectors by their IDs.
    fn delete(&self, ids: &[VectorId]) -> DbResult<()>;

    /// Remove every vector while keeping the store usable.
    fn clear(&self) -> DbResult<()>;

    /// Flush pending writes to persistent storage.
    fn flush(&self) -> DbResult<()>;

    /// Get the number of vectors in the index.
    fn len(&self) -> DbResult<usize>;

    /// Check if the index is empty.
    fn is_empty(&self) -> DbResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Get the dimension of vectors in this index.
    fn dimension(&self) -> usize;

    /// Get the distance metric used by this index.
    fn metric(&self) -> VectorMetric;

    /// Short backend name for logs and stats.
    fn backend_name(&self) -> &'static str;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_id() {
        let id = VectorId::new("a1b2c3d4_0_deadbeef");
        assert_eq!(id.as_str(), "a1b2c3d4_0_deadbeef");
        assert_eq!(id.to_string(), "a1b2c3d4_0_deadbeef");

        let from_str: VectorId = "x".into();
        assert_eq!(from_str, VectorId("x".to_string()));
    }

    #[test]
    fn test_vector_metric() {
        assert_eq!(VectorMetric::Cosine.as_str(), "cosine");
        assert_eq!(VectorMetric::Dot.as_str(), "dot");
        assert_eq!(VectorMetric::L2.as_str(), "l2");
        assert_eq!(VectorMetric::default(), VectorMetric::Cosine);
        assert_eq!(VectorMetric::parse("Euclidean"), Some(VectorMetric::L2));
        assert_eq!(VectorMetric::parse("hamming"), None);
    }

    #[test]
    fn test_vector_insert_payload() {
        let insert = VectorInsert::new(
            "c1",
            vec![1.0, 2.0, 3.0],
            serde_json::json!({"source": "putusan_1.txt", "page": "2"}),
        );

        assert_eq!(insert.id.as_str(), "c1");
        assert_eq!(insert.payload_str("source"), Some("putusan_1.txt"));
        assert_eq!(insert.payload_str("missing"), None);
    }
}
