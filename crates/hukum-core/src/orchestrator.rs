//! Query orchestration: one question end to end.
//!
//! ```text
//! FastPath → Retrieve → Rerank → Gate → Assemble → Generate → (FallbackGenerate) → Respond
//! ```
//!
//! Each state owns the data it hands to the next, so a state can only be
//! entered with what it needs. Optional collaborators degrade locally: a
//! failed retrieval branch contributes nothing, a missing reranker passes
//! candidates through, and the gate never blocks on an absent score. Only a
//! generation failure that survives the fallback attempt is returned as an
//! error.

use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::{FastPathConfig, HukumConfig};
use crate::context::ContextAssembler;
use crate::errors::HukumError;
use crate::fusion::{fuse, FusionMethod};
use crate::gate::{GateVerdict, RelevanceGate};
use crate::lexical::LexicalIndex;
use crate::ports::{GenerationParams, GenerationPort};
use crate::prompts::{
    fallback_prompt, LegalPromptTemplate, APOLOGY_ANSWER, CAPABILITY_ANSWER, EMPTY_CONTEXT_ANSWER,
    NO_DOCUMENTS_ANSWER,
};
use crate::reranker::{top_score, Reranker, Scored};
use crate::semantic::SemanticRetriever;
use crate::types::{RetrievalCandidate, SourceRef};

// ============================================================================
// Request / Response
// ============================================================================

/// Per-query knobs supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryOptions {
    /// Final number of candidates kept after reranking.
    pub top_k: usize,
    pub max_tokens: usize,
    pub temperature: f32,
    /// Return the assembled context in the response.
    pub include_context: bool,
}

impl QueryOptions {
    pub fn from_config(config: &HukumConfig) -> Self {
        Self {
            top_k: config.query.final_top_k,
            max_tokens: config.generation.max_tokens,
            temperature: config.generation.temperature,
            include_context: true,
        }
    }
}

/// How the answer was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryOutcome {
    /// Greeting or capability probe answered without retrieval.
    FastPath,
    /// Neither retriever returned anything.
    NoDocuments,
    /// The relevance gate rejected the candidates.
    OffTopic,
    /// Candidates existed but produced no context.
    EmptyContext,
    Generated,
    /// The primary generation was blank or failed; the bare-question retry answered.
    Fallback,
    /// Both generation attempts were blank.
    Apology,
}

impl QueryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FastPath => "fast_path",
            Self::NoDocuments => "no_documents",
            Self::OffTopic => "off_topic",
            Self::EmptyContext => "empty_context",
            Self::Generated => "generated",
            Self::Fallback => "fallback",
            Self::Apology => "apology",
        }
    }

    /// True when the answer came from the generator.
    pub fn is_generated(&self) -> bool {
        matches!(self, Self::Generated | Self::Fallback)
    }
}

impl std::fmt::Display for QueryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wall-clock milliseconds spent per stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageTimings {
    pub retrieve_ms: u64,
    pub rerank_ms: u64,
    pub generate_ms: u64,
    pub total_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<SourceRef>,
    pub context: String,
    /// The question as received.
    pub query: String,
    /// Reranked candidates that survived the gate.
    pub candidates: Vec<Scored<RetrievalCandidate>>,
    pub outcome: QueryOutcome,
    pub timings: StageTimings,
}

/// Fused retrieval output with per-branch counts.
#[derive(Debug, Clone, Default)]
pub struct HybridResults {
    pub candidates: Vec<RetrievalCandidate>,
    pub lexical_count: usize,
    pub semantic_count: usize,
}

// ============================================================================
// Fast path
// ============================================================================

/// Lowercased alphanumeric words of `text`.
fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Short greetings and capability probes skip retrieval entirely.
///
/// Keywords match whole words only, and multi-word keywords must appear as
/// consecutive words, so `hi` never matches inside `hibah`.
pub fn is_fast_path(question: &str, config: &FastPathConfig) -> bool {
    if !config.enabled {
        return false;
    }
    if question.split_whitespace().count() >= config.max_words {
        return false;
    }
    let question_words = words(question);
    config.keywords.iter().any(|keyword| {
        let phrase = words(keyword);
        !phrase.is_empty()
            && question_words
                .windows(phrase.len())
                .any(|window| window == phrase.as_slice())
    })
}

// ============================================================================
// Orchestrator
// ============================================================================

enum Stage {
    FastPath,
    Retrieve,
    Rerank(Vec<RetrievalCandidate>),
    Gate(Vec<Scored<RetrievalCandidate>>),
    Assemble(Vec<Scored<RetrievalCandidate>>),
    Generate {
        context: String,
        sources: Vec<SourceRef>,
    },
    FallbackGenerate {
        context: String,
        sources: Vec<SourceRef>,
        primary_error: Option<HukumError>,
    },
    Respond {
        answer: String,
        outcome: QueryOutcome,
        sources: Vec<SourceRef>,
        context: String,
    },
}

/// Per-query scratch state. Dropped when the query completes.
#[derive(Default)]
struct QuerySession {
    timings: StageTimings,
    lexical_count: usize,
    semantic_count: usize,
    fused_count: usize,
    top_score: Option<f32>,
    verdict: Option<GateVerdict>,
    candidates: Vec<Scored<RetrievalCandidate>>,
}

/// Drives one query through the stages. Borrowed views only; build one per query.
pub struct QueryOrchestrator<'a> {
    config: &'a HukumConfig,
    lexical: &'a LexicalIndex,
    semantic: Option<&'a SemanticRetriever>,
    reranker: &'a Reranker,
    generator: &'a dyn GenerationPort,
    template: &'a LegalPromptTemplate,
    gate: RelevanceGate,
    assembler: ContextAssembler,
}

impl<'a> QueryOrchestrator<'a> {
    pub fn new(
        config: &'a HukumConfig,
        lexical: &'a LexicalIndex,
        semantic: Option<&'a SemanticRetriever>,
        reranker: &'a Reranker,
        generator: &'a dyn GenerationPort,
        template: &'a LegalPromptTemplate,
    ) -> Self {
        Self {
            config,
            lexical,
            semantic: semantic.filter(|_| config.semantic.enabled),
            reranker,
            generator,
            template,
            gate: RelevanceGate::new(config.gate.threshold),
            assembler: ContextAssembler::new(
                config.context.max_chars,
                config.context.include_metadata,
            ),
        }
    }

    /// Candidates fused per query for a final `top_k`.
    pub fn candidate_pool(&self, top_k: usize) -> usize {
        top_k
            .max(1)
            .saturating_mul(self.config.query.candidate_multiplier.max(1))
    }

    /// Lexical and semantic search in parallel, then fusion to `pool` candidates.
    ///
    /// A failing branch contributes an empty list. A panic inside the semantic
    /// port is caught when the build unwinds on panic; with `panic = "abort"`
    /// it still ends the process.
    pub fn retrieve(&self, question: &str, pool: usize) -> HybridResults {
        let lexical_k = self.config.lexical.top_k.max(pool);
        let semantic_k = self.config.semantic.top_k.max(pool);

        let (lexical, semantic) = rayon::join(
            || self.lexical.search(question, lexical_k),
            || self.semantic_branch(question, semantic_k),
        );

        let method = FusionMethod::resolve(&self.config.fusion.method);
        let candidates = fuse(
            method,
            &lexical,
            &semantic,
            pool,
            &self.config.fusion_params(),
        );
        debug!(
            "Retrieved {} lexical + {} semantic, fused {} via {}",
            lexical.len(),
            semantic.len(),
            candidates.len(),
            method
        );

        HybridResults {
            candidates,
            lexical_count: lexical.len(),
            semantic_count: semantic.len(),
        }
    }

    fn semantic_branch(&self, question: &str, top_k: usize) -> Vec<RetrievalCandidate> {
        let Some(retriever) = self.semantic else {
            return Vec::new();
        };
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            retriever.search(question, top_k, self.lexical)
        }));
        match result {
            Ok(Ok(candidates)) => candidates,
            Ok(Err(e)) => {
                warn!("Semantic search failed, continuing lexical-only: {}", e);
                Vec::new()
            }
            Err(_) => {
                error!("Semantic search panicked, continuing lexical-only");
                Vec::new()
            }
        }
    }

    /// Run the full state machine for `question`.
    pub fn run(&self, question: &str, options: &QueryOptions) -> Result<QueryResponse, HukumError> {
        if question.trim().is_empty() {
            return Err(HukumError::InvalidArgument(
                "Question cannot be empty".to_string(),
            ));
        }

        let start = Instant::now();
        let mut session = QuerySession::default();
        let mut stage = Stage::FastPath;

        let (answer, outcome, sources, context) = loop {
            stage = match stage {
                Stage::FastPath => {
                    if is_fast_path(question, &self.config.fast_path) {
                        debug!("Fast path: '{}'", question.trim());
                        Stage::Respond {
                            answer: CAPABILITY_ANSWER.to_string(),
                            outcome: QueryOutcome::FastPath,
                            sources: Vec::new(),
                            context: String::new(),
                        }
                    } else {
                        Stage::Retrieve
                    }
                }

                Stage::Retrieve => {
                    let t = Instant::now();
                    let results = self.retrieve(question, self.candidate_pool(options.top_k));
                    session.timings.retrieve_ms = t.elapsed().as_millis() as u64;
                    session.lexical_count = results.lexical_count;
                    session.semantic_count = results.semantic_count;
                    session.fused_count = results.candidates.len();

                    if results.candidates.is_empty() {
                        info!("No documents matched the query");
                        Stage::Respond {
                            answer: NO_DOCUMENTS_ANSWER.to_string(),
                            outcome: QueryOutcome::NoDocuments,
                            sources: Vec::new(),
                            context: String::new(),
                        }
                    } else {
                        Stage::Rerank(results.candidates)
                    }
                }

                Stage::Rerank(candidates) => {
                    let t = Instant::now();
                    let scored = self.reranker.rerank(question, candidates, options.top_k);
                    session.timings.rerank_ms = t.elapsed().as_millis() as u64;
                    Stage::Gate(scored)
                }

                Stage::Gate(scored) => {
                    let top = top_score(&scored);
                    let verdict = self.gate.evaluate(top);
                    session.top_score = top;
                    session.verdict = Some(verdict);

                    match verdict {
                        GateVerdict::OffTopic => {
                            warn!(
                                "Top rerank score {:.3} below threshold {:.3}, clearing context and sources",
                                top.unwrap_or(f32::NAN),
                                self.gate.threshold()
                            );
                            Stage::Assemble(Vec::new())
                        }
                        GateVerdict::Confident => Stage::Assemble(scored),
                        GateVerdict::Bypassed => {
                            debug!("No rerank score, gate bypassed");
                            Stage::Assemble(scored)
                        }
                    }
                }

                Stage::Assemble(scored) => {
                    let context = self
                        .assembler
                        .assemble(scored.iter().map(|s| &s.item.chunk));
                    let sources: Vec<SourceRef> =
                        scored.iter().map(|s| SourceRef::from(&s.item)).collect();
                    session.candidates = scored;

                    if context.trim().is_empty() {
                        let outcome = if session.verdict == Some(GateVerdict::OffTopic) {
                            QueryOutcome::OffTopic
                        } else {
                            warn!("Assembled context is empty");
                            QueryOutcome::EmptyContext
                        };
                        Stage::Respond {
                            answer: EMPTY_CONTEXT_ANSWER.to_string(),
                            outcome,
                            sources,
                            context: String::new(),
                        }
                    } else {
                        Stage::Generate { context, sources }
                    }
                }

                Stage::Generate { context, sources } => {
                    let t = Instant::now();
                    let prompt = self.template.format_rag(question, &context);
                    debug!(
                        "Generating with {} context chars, {} prompt chars",
                        context.chars().count(),
                        prompt.chars().count()
                    );
                    let params = GenerationParams::new(options.max_tokens, options.temperature);
                    let result = self.generator.generate(&prompt, &params);
                    session.timings.generate_ms += t.elapsed().as_millis() as u64;

                    match result {
                        Ok(text) if !text.trim().is_empty() => Stage::Respond {
                            answer: text.trim().to_string(),
                            outcome: QueryOutcome::Generated,
                            sources,
                            context,
                        },
                        Ok(_) => {
                            error!("Generator returned an empty answer, retrying without context");
                            Stage::FallbackGenerate {
                                context,
                                sources,
                                primary_error: None,
                            }
                        }
                        Err(e) => {
                            error!("Generation failed, retrying without context: {}", e);
                            Stage::FallbackGenerate {
                                context,
                                sources,
                                primary_error: Some(e),
                            }
                        }
                    }
                }

                Stage::FallbackGenerate {
                    context,
                    sources,
                    primary_error,
                } => {
                    let t = Instant::now();
                    let params = GenerationParams::new(
                        self.config.generation.fallback_max_tokens,
                        self.config.generation.fallback_temperature,
                    );
                    let result = self.generator.generate(&fallback_prompt(question), &params);
                    session.timings.generate_ms += t.elapsed().as_millis() as u64;

                    match result {
                        Ok(text) if !text.trim().is_empty() => Stage::Respond {
                            answer: text.trim().to_string(),
                            outcome: QueryOutcome::Fallback,
                            sources,
                            context,
                        },
                        Ok(_) => {
                            warn!("Fallback generation was also empty, answering with apology");
                            Stage::Respond {
                                answer: APOLOGY_ANSWER.to_string(),
                                outcome: QueryOutcome::Apology,
                                sources,
                                context,
                            }
                        }
                        Err(e) => {
                            let reason = match primary_error {
                                Some(primary) => format!("{}; fallback: {}", primary, e),
                                None => e.to_string(),
                            };
                            return Err(HukumError::Generation {
                                model_id: self.generator.model_id().to_string(),
                                reason,
                            });
                        }
                    }
                }

                Stage::Respond {
                    answer,
                    outcome,
                    sources,
                    context,
                } => break (answer, outcome, sources, context),
            };
        };

        session.timings.total_ms = start.elapsed().as_millis() as u64;
        info!(
            "Query completed in {}ms ({}): {} chars, {} lexical + {} semantic -> {} fused, top score {:?}, gate {:?} (retrieve {}ms, rerank {}ms, generate {}ms)",
            session.timings.total_ms,
            outcome,
            question.chars().count(),
            session.lexical_count,
            session.semantic_count,
            session.fused_count,
            session.top_score,
            session.verdict,
            session.timings.retrieve_ms,
            session.timings.rerank_ms,
            session.timings.generate_ms
        );

        Ok(QueryResponse {
            answer,
            sources,
            context: if options.include_context {
                context
            } else {
                String::new()
            },
            query: question.to_string(),
            candidates: session.candidates,
            outcome,
            timings: session.timings,
        })
    }
}
