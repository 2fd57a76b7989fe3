//! Rank fusion of lexical and semantic result lists.
//!
//! Three interchangeable strategies:
//!
//! - **RRF** (default): `score(d) = Σ 1 / (K + rank)` over the lists containing
//!   `d`. Rank-based, so the incomparable BM25 and cosine scales do not matter.
//! - **Weighted**: `w_sem * semantic + w_lex * (bm25 / max_bm25)`.
//! - **Interleave**: alternate semantic then lexical, skipping duplicates.
//!
//! All strategies are deterministic. Candidates contributed by both lists are
//! tagged [`CandidateSource::Fused`]; the rest keep the tag of their list.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::{CandidateSource, Chunk, ChunkId, RetrievalCandidate};

/// Default RRF smoothing constant.
pub const DEFAULT_RRF_K: f32 = 60.0;

// ============================================================================
// FusionMethod
// ============================================================================

/// Fusion strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FusionMethod {
    #[default]
    Rrf,
    Weighted,
    Interleave,
}

impl FusionMethod {
    /// Parse a configured method name. Unknown names return `None`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "rrf" => Some(Self::Rrf),
            "weighted" => Some(Self::Weighted),
            "interleave" => Some(Self::Interleave),
            _ => None,
        }
    }

    /// Parse `name`, falling back to RRF with a warning.
    pub fn resolve(name: &str) -> Self {
        Self::parse(name).unwrap_or_else(|| {
            warn!("Unknown fusion method: '{}', using rrf", name);
            Self::Rrf
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rrf => "rrf",
            Self::Weighted => "weighted",
            Self::Interleave => "interleave",
        }
    }
}

impl std::fmt::Display for FusionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Constants used by the fusion strategies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionParams {
    pub rrf_k: f32,
    pub semantic_weight: f32,
    pub lexical_weight: f32,
}

impl Default for FusionParams {
    fn default() -> Self {
        Self {
            rrf_k: DEFAULT_RRF_K,
            semantic_weight: 0.6,
            lexical_weight: 0.4,
        }
    }
}

/// Fuse `lexical` and `semantic` with `method`, truncating to `top_k`.
pub fn fuse(
    method: FusionMethod,
    lexical: &[RetrievalCandidate],
    semantic: &[RetrievalCandidate],
    top_k: usize,
    params: &FusionParams,
) -> Vec<RetrievalCandidate> {
    match method {
        FusionMethod::Rrf => reciprocal_rank_fusion(lexical, semantic, params.rrf_k, top_k),
        FusionMethod::Weighted => weighted_fusion(
            lexical,
            semantic,
            params.lexical_weight,
            params.semantic_weight,
            top_k,
        ),
        FusionMethod::Interleave => interleave_fusion(lexical, semantic, top_k),
    }
}

// ============================================================================
// Accumulator
// ============================================================================

/// One list's contribution to a fused candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contribution {
    pub source: CandidateSource,
    /// 1-based position in the contributing list.
    pub rank: usize,
    pub raw_score: f32,
}

/// Aggregated score for one chunk id.
#[derive(Debug, Clone)]
pub struct FusedEntry {
    pub chunk: Chunk,
    pub score: f32,
    pub contributions: Vec<Contribution>,
}

impl FusedEntry {
    /// The shared source of all contributions, or `Fused` if they differ.
    pub fn source(&self) -> CandidateSource {
        let mut sources = self.contributions.iter().map(|c| c.source);
        match sources.next() {
            Some(first) if sources.all(|s| s == first) => first,
            Some(_) => CandidateSource::Fused,
            None => CandidateSource::Fused,
        }
    }
}

/// Chunk id -> aggregated score, in first-appearance order.
#[derive(Debug, Default)]
pub struct FusionAccumulator {
    entries: Vec<FusedEntry>,
    positions: HashMap<ChunkId, usize>,
}

impl FusionAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `amount` to the entry for `candidate`'s chunk, recording the contribution.
    pub fn add(
        &mut self,
        candidate: &RetrievalCandidate,
        source: CandidateSource,
        rank: usize,
        amount: f32,
    ) {
        let idx = match self.positions.get(&candidate.chunk.id) {
            Some(&idx) => idx,
            None => {
                self.entries.push(FusedEntry {
                    chunk: candidate.chunk.clone(),
                    score: 0.0,
                    contributions: Vec::new(),
                });
                let idx = self.entries.len() - 1;
                self.positions.insert(candidate.chunk.id.clone(), idx);
                idx
            }
        };

        let entry = &mut self.entries[idx];
        entry.score += amount;
        entry.contributions.push(Contribution {
            source,
            rank,
            raw_score: candidate.score,
        });
    }

    pub fn entries(&self) -> &[FusedEntry] {
        &self.entries
    }

    pub fn get(&self, id: &ChunkId) -> Option<&FusedEntry> {
        self.positions.get(id).map(|&idx| &self.entries[idx])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stable sort by score descending, truncate and assign ranks.
    pub fn into_ranked(self, top_k: usize) -> Vec<RetrievalCandidate> {
        let mut entries = self.entries;
        entries.sort_by(|a, b| b.score.total_cmp(&a.score));
        entries
            .into_iter()
            .take(top_k)
            .enumerate()
            .map(|(i, entry)| {
                let source = entry.source();
                RetrievalCandidate::new(entry.chunk, entry.score, source, i + 1)
            })
            .collect()
    }
}

// ============================================================================
// Strategies
// ============================================================================

/// Accumulate RRF contributions, lexical list first.
pub fn accumulate_rrf(
    lexical: &[RetrievalCandidate],
    semantic: &[RetrievalCandidate],
    k: f32,
) -> FusionAccumulator {
    let mut acc = FusionAccumulator::new();
    for (list, source) in [
        (lexical, CandidateSource::Lexical),
        (semantic, CandidateSource::Semantic),
    ] {
        for (pos, candidate) in list.iter().enumerate() {
            let rank = pos + 1;
            acc.add(candidate, source, rank, 1.0 / (k + rank as f32));
        }
    }
    acc
}

/// Reciprocal rank fusion. Ties keep first-appearance order.
pub fn reciprocal_rank_fusion(
    lexical: &[RetrievalCandidate],
    semantic: &[RetrievalCandidate],
    k: f32,
    top_k: usize,
) -> Vec<RetrievalCandidate> {
    accumulate_rrf(lexical, semantic, k).into_ranked(top_k)
}

/// Weighted score fusion.
///
/// Lexical scores are divided by the batch maximum (0 when the maximum is 0);
/// semantic scores are taken as already normalized.
pub fn weighted_fusion(
    lexical: &[RetrievalCandidate],
    semantic: &[RetrievalCandidate],
    lexical_weight: f32,
    semantic_weight: f32,
    top_k: usize,
) -> Vec<RetrievalCandidate> {
    let mut acc = FusionAccumulator::new();

    let max_lexical = lexical
        .iter()
        .map(|c| c.score)
        .fold(f32::NEG_INFINITY, f32::max);
    for (pos, candidate) in lexical.iter().enumerate() {
        let normalized = if max_lexical > 0.0 {
            candidate.score / max_lexical
        } else {
            0.0
        };
        acc.add(
            candidate,
            CandidateSource::Lexical,
            pos + 1,
            lexical_weight * normalized,
        );
    }

    for (pos, candidate) in semantic.iter().enumerate() {
        acc.add(
            candidate,
            CandidateSource::Semantic,
            pos + 1,
            semantic_weight * candidate.score,
        );
    }

    acc.into_ranked(top_k)
}

/// Alternate semantic and lexical candidates, semantic first.
///
/// Emits up to `top_k` unique chunks. When one list runs out the other
/// continues alone. Scores are the original per-list scores.
pub fn interleave_fusion(
    lexical: &[RetrievalCandidate],
    semantic: &[RetrievalCandidate],
    top_k: usize,
) -> Vec<RetrievalCandidate> {
    let mut seen: HashSet<&ChunkId> = HashSet::new();
    let mut results = Vec::with_capacity(top_k.min(lexical.len() + semantic.len()));

    let mut sem = semantic.iter();
    let mut lex = lexical.iter();
    let mut sem_done = false;
    let mut lex_done = false;

    while results.len() < top_k && !(sem_done && lex_done) {
        for (iter, done, source) in [
            (&mut sem, &mut sem_done, CandidateSource::Semantic),
            (&mut lex, &mut lex_done, CandidateSource::Lexical),
        ] {
            if results.len() >= top_k {
                break;
            }
            // Take the next unseen candidate from this list.
            loop {
                match iter.next() {
                    Some(candidate) if seen.contains(&candidate.chunk.id) => continue,
                    Some(candidate) => {
                        seen.insert(&candidate.chunk.id);
                        results.push(RetrievalCandidate::new(
                            candidate.chunk.clone(),
                            candidate.score,
                            source,
                            results.len() + 1,
                        ));
                        break;
                    }
                    None => {
                        *done = true;
                        break;
                    }
                }
            }
        }
    }

    results
}
