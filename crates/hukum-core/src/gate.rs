//! Relevance gate over the top rerank score.

use serde::Serialize;

/// Default minimum top rerank score. Tuned for multilingual cross-encoder logits.
pub const DEFAULT_GATE_THRESHOLD: f32 = -7.0;

/// Outcome of a gate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateVerdict {
    /// No usable score; the gate does not block.
    Bypassed,
    Confident,
    OffTopic,
}

impl GateVerdict {
    pub fn is_confident(self) -> bool {
        !matches!(self, Self::OffTopic)
    }
}

/// Decides whether reranked candidates are trustworthy enough to answer from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelevanceGate {
    threshold: f32,
}

impl Default for RelevanceGate {
    fn default() -> Self {
        Self::new(DEFAULT_GATE_THRESHOLD)
    }
}

impl RelevanceGate {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn evaluate(&self, top_score: Option<f32>) -> GateVerdict {
        match top_score {
            None => GateVerdict::Bypassed,
            Some(score) if score.is_nan() => GateVerdict::Bypassed,
            Some(score) if score >= self.threshold => GateVerdict::Confident,
            Some(_) => GateVerdict::OffTopic,
        }
    }

    /// `true` when the score is absent or at least the threshold.
    pub fn is_confident(&self, top_score: Option<f32>) -> bool {
        self.evaluate(top_score).is_confident()
    }
}
