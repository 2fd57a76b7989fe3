//! Okapi BM25 scoring.
//!
//! ```text
//! score(D, Q) = Σ IDF(q_i) * (f(q_i, D) * (k1 + 1)) / (f(q_i, D) + k1 * (1 - b + b * |D| / avgdl))
//! ```
//!
//! IDF uses the always-positive `+1` smoothing (see [`idf`]), so scores sit
//! on a different scale from classic Okapi BM25 implementations.
//!
//! Query terms are summed with multiplicity: a term repeated in the query
//! contributes once per occurrence.

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Default term-frequency saturation for legal text.
pub const DEFAULT_K1: f32 = 1.5;

/// Default document-length normalization.
pub const DEFAULT_B: f32 = 0.75;

/// BM25 scoring parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct Bm25Params {
    /// Term frequency saturation parameter.
    pub k1: f32,
    /// Document length normalization. 0 = none, 1 = full.
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: DEFAULT_K1,
            b: DEFAULT_B,
        }
    }
}

/// Smoothed IDF, always positive:
///
/// ```text
/// IDF(t) = ln((N - df(t) + 0.5) / (df(t) + 0.5) + 1)
/// ```
///
/// This is the Lucene variant, not the classic Okapi form
/// `ln((N - df + 0.5) / (df + 0.5))` with an epsilon floor for negative
/// values. Scores are therefore larger than Okapi scores for the same corpus
/// and are not comparable with them; a term found in every document still
/// contributes a small positive weight.
#[inline]
pub fn idf(num_docs: usize, doc_freq: usize) -> f32 {
    let n = num_docs as f32;
    let df = doc_freq as f32;
    ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
}

/// Score contribution of one query term occurrence to one document.
#[inline]
pub fn bm25_term_score(
    term_freq: u32,
    doc_len: usize,
    avg_doc_len: f32,
    idf_value: f32,
    params: &Bm25Params,
) -> f32 {
    let tf = term_freq as f32;
    let dl = doc_len as f32;
    let k1 = params.k1;
    let b = params.b;

    let numerator = tf * (k1 + 1.0);
    let denominator = tf + k1 * (1.0 - b + b * dl / avg_doc_len);

    idf_value * numerator / denominator
}
