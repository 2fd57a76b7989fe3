//! Cross-encoder reranking of fused candidates.
//!
//! The reranker only ever sees [`RerankDocument`]s. Any candidate shape is
//! converted at the boundary through `From<&T>`, so chunks and retrieval
//! candidates are handled uniformly.
//!
//! When no scoring model is available the reranker degrades to a pass-through:
//! the first `top_k` items in their incoming order, with no score attached.
//! A missing score means "unknown relevance", never zero.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::ports::RerankingPort;
use crate::types::{Chunk, ChunkId, ChunkMetadata, RetrievalCandidate};

// ============================================================================
// Types
// ============================================================================

/// The normalized shape the reranker scores.
#[derive(Debug, Clone, PartialEq)]
pub struct RerankDocument {
    pub id: ChunkId,
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl From<&Chunk> for RerankDocument {
    fn from(chunk: &Chunk) -> Self {
        Self {
            id: chunk.id.clone(),
            text: chunk.content.clone(),
            metadata: chunk.metadata.clone(),
        }
    }
}

impl From<&RetrievalCandidate> for RerankDocument {
    fn from(candidate: &RetrievalCandidate) -> Self {
        Self::from(&candidate.chunk)
    }
}

/// An item annotated with an optional cross-encoder score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scored<T> {
    pub item: T,
    pub rerank_score: Option<f32>,
}

impl<T> Scored<T> {
    pub fn new(item: T, rerank_score: f32) -> Self {
        Self {
            item,
            rerank_score: Some(rerank_score),
        }
    }

    pub fn unscored(item: T) -> Self {
        Self {
            item,
            rerank_score: None,
        }
    }

    pub fn into_inner(self) -> T {
        self.item
    }
}

/// Score of the first item, if it has one.
pub fn top_score<T>(items: &[Scored<T>]) -> Option<f32> {
    items.first().and_then(|s| s.rerank_score)
}

// ============================================================================
// Reranker
// ============================================================================

/// Orchestrates a [`RerankingPort`] over candidate lists.
pub struct Reranker {
    port: Option<Arc<dyn RerankingPort>>,
    enabled: AtomicBool,
}

impl Reranker {
    /// Wrap a scoring port. `None` yields a permanent pass-through.
    pub fn new(port: Option<Arc<dyn RerankingPort>>) -> Self {
        let enabled = port.is_some();
        Self {
            port,
            enabled: AtomicBool::new(enabled),
        }
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    /// Whether scoring will be attempted.
    pub fn is_enabled(&self) -> bool {
        self.port.is_some() && self.enabled.load(Ordering::Acquire)
    }

    pub fn model_id(&self) -> Option<&str> {
        self.port.as_deref().map(|p| p.model_id())
    }

    /// Warm up the model. A failure disables scoring; a later success re-enables it.
    pub fn warm_up(&self) -> bool {
        let Some(port) = &self.port else {
            return false;
        };
        match port.warm_up() {
            Ok(()) => {
                self.enabled.store(true, Ordering::Release);
                debug!("Reranker '{}' ready", port.model_id());
                true
            }
            Err(e) => {
                self.enabled.store(false, Ordering::Release);
                warn!(
                    "Reranker '{}' failed to initialize, passing candidates through: {}",
                    port.model_id(),
                    e
                );
                false
            }
        }
    }

    /// Score `items` against `query`, sort descending and keep `top_k`.
    ///
    /// Falls back to [`pass_through`] when scoring is unavailable or fails.
    /// NaN scores are recorded as absent and sort last.
    pub fn rerank<T>(&self, query: &str, items: Vec<T>, top_k: usize) -> Vec<Scored<T>>
    where
        for<'a> RerankDocument: From<&'a T>,
    {
        let port = match &self.port {
            Some(port) if self.is_enabled() && !items.is_empty() => port,
            _ => return pass_through(items, top_k),
        };

        let pairs: Vec<(String, String)> = items
            .iter()
            .map(|item| (query.to_string(), RerankDocument::from(item).text))
            .collect();

        let scores = match port.score_batch(&pairs) {
            Ok(scores) => scores,
            Err(e) => {
                warn!("Reranking failed, keeping fused order: {}", e);
                return pass_through(items, top_k);
            }
        };

        if scores.len() != items.len() {
            warn!(
                "Reranker returned {} scores for {} candidates, keeping fused order",
                scores.len(),
                items.len()
            );
            return pass_through(items, top_k);
        }

        let mut scored: Vec<Scored<T>> = items
            .into_iter()
            .zip(scores)
            .map(|(item, score)| Scored {
                item,
                rerank_score: if score.is_nan() { None } else { Some(score) },
            })
            .collect();

        scored.sort_by(|a, b| {
            let a = a.rerank_score.unwrap_or(f32::NEG_INFINITY);
            let b = b.rerank_score.unwrap_or(f32::NEG_INFINITY);
            b.total_cmp(&a)
        });
        scored.truncate(top_k);

        debug!(
            "Reranked {} candidates, top score {:?}",
            pairs.len(),
            top_score(&scored)
        );
        scored
    }
}

impl std::fmt::Debug for Reranker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reranker")
            .field("model_id", &self.model_id())
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// First `top_k` items in incoming order, unscored.
pub fn pass_through<T>(items: Vec<T>, top_k: usize) -> Vec<Scored<T>> {
    items.into_iter().take(top_k).map(Scored::unscored).collect()
}
