//! Invariants of the retrieval pieces, checked over generated inputs.

use hukum_core::lexical::{load_lexical_index, save_lexical_index};
use hukum_core::{
    reciprocal_rank_fusion, weighted_fusion, Bm25Params, CandidateSource, Chunk, ChunkId,
    ChunkMetadata, ContextAssembler, LexicalIndex, RelevanceGate, RetrievalCandidate,
};
use tempfile::TempDir;

const WORDS: &[&str] = &[
    "pasal", "ayat", "undang", "perdata", "pidana", "kepailitan", "debitor", "kreditor",
    "putusan", "hakim", "gugatan", "perseroan", "wanprestasi", "kerugian", "ganti", "rugi",
    "1234", "1365", "2007", "kuhperdata", "mahkamah", "agung", "banding", "kasasi",
];

/// Small deterministic generator so failures reproduce.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next() % n as u64) as usize
    }

    fn sentence(&mut self, words: usize) -> String {
        (0..words)
            .map(|_| WORDS[self.below(WORDS.len())])
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn corpus(rng: &mut Lcg, size: usize) -> Vec<Chunk> {
    (0..size)
        .map(|i| {
            let len = 3 + rng.below(20);
            Chunk::new(
                ChunkId::new(format!("doc_{}", i)),
                rng.sentence(len),
                ChunkMetadata::new().with("source", format!("doc_{}.txt", i)),
            )
        })
        .collect()
}

fn ranked(ids: &[&str], source: CandidateSource) -> Vec<RetrievalCandidate> {
    ids.iter()
        .enumerate()
        .map(|(i, id)| {
            RetrievalCandidate::new(
                Chunk::new(ChunkId::new(*id), format!("isi {}", id), ChunkMetadata::new()),
                1.0 / (i + 1) as f32,
                source,
                i + 1,
            )
        })
        .collect()
}

fn ids(candidates: &[RetrievalCandidate]) -> Vec<String> {
    candidates.iter().map(|c| c.chunk.id.as_str().to_string()).collect()
}

// ============================================================================
// Lexical index
// ============================================================================

#[test]
fn test_saved_index_scores_identically_after_load() {
    let mut rng = Lcg(7);
    for round in 0..5 {
        let temp = TempDir::new().unwrap();
        let index = LexicalIndex::build(corpus(&mut rng, 5 + round * 4), Bm25Params::default())
            .unwrap();
        save_lexical_index(&index, temp.path()).unwrap();
        let loaded = load_lexical_index(temp.path()).unwrap().unwrap();

        for _ in 0..10 {
            let words = 1 + rng.below(4);
            let query = rng.sentence(words);
            let before = index.search(&query, 10);
            let after = loaded.search(&query, 10);
            assert_eq!(ids(&before), ids(&after), "query '{}'", query);
            for (a, b) in before.iter().zip(&after) {
                assert!((a.score - b.score).abs() < 1e-6);
            }
        }
    }
}

#[test]
fn test_search_results_are_bounded_positive_and_sorted() {
    let mut rng = Lcg(11);
    let index = LexicalIndex::build(corpus(&mut rng, 30), Bm25Params::default()).unwrap();

    for _ in 0..50 {
        let words = 1 + rng.below(5);
        let query = rng.sentence(words);
        let top_k = 1 + rng.below(8);
        let results = index.search(&query, top_k);

        assert!(results.len() <= top_k);
        assert!(results.iter().all(|c| c.score > 0.0));
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
        for (i, c) in results.iter().enumerate() {
            assert_eq!(c.rank, i + 1);
            assert_eq!(c.source, CandidateSource::Lexical);
        }
    }
}

// ============================================================================
// Fusion
// ============================================================================

#[test]
fn test_rrf_scores_ignore_list_order() {
    let a = ranked(&["a", "b", "c", "d"], CandidateSource::Lexical);
    let b = ranked(&["c", "e", "a"], CandidateSource::Semantic);

    let forward = reciprocal_rank_fusion(&a, &b, 60.0, 10);
    let swapped = reciprocal_rank_fusion(&b, &a, 60.0, 10);

    assert_eq!(forward.len(), swapped.len());
    for candidate in &forward {
        let other = swapped
            .iter()
            .find(|c| c.chunk.id == candidate.chunk.id)
            .unwrap();
        assert!((candidate.score - other.score).abs() < 1e-6);

        let expected = match candidate.source {
            CandidateSource::Lexical => CandidateSource::Semantic,
            CandidateSource::Semantic => CandidateSource::Lexical,
            CandidateSource::Fused => CandidateSource::Fused,
        };
        assert_eq!(other.source, expected, "chunk {}", candidate.chunk.id.as_str());
    }

    let tag = |list: &[RetrievalCandidate], id: &str| {
        list.iter().find(|c| c.chunk.id.as_str() == id).map(|c| c.source)
    };
    assert_eq!(tag(&forward, "b"), Some(CandidateSource::Lexical));
    assert_eq!(tag(&swapped, "b"), Some(CandidateSource::Semantic));
    assert_eq!(tag(&forward, "e"), Some(CandidateSource::Semantic));
    assert_eq!(tag(&swapped, "e"), Some(CandidateSource::Lexical));
    assert_eq!(tag(&forward, "a"), Some(CandidateSource::Fused));
    assert_eq!(tag(&swapped, "a"), Some(CandidateSource::Fused));
}

#[test]
fn test_rrf_candidate_in_both_lists_outranks_single_list_peer() {
    let lexical = ranked(&["shared", "lex_only"], CandidateSource::Lexical);
    let semantic = ranked(&["sem_only", "shared"], CandidateSource::Semantic);

    let fused = reciprocal_rank_fusion(&lexical, &semantic, 60.0, 10);

    assert_eq!(fused[0].chunk.id.as_str(), "shared");
    assert_eq!(fused[0].source, CandidateSource::Fused);
    assert_eq!(fused.len(), 3);
}

#[test]
fn test_weighted_fusion_without_lexical_weight_follows_semantic_order() {
    let lexical = ranked(&["x", "y", "z"], CandidateSource::Lexical);
    let semantic = ranked(&["z", "w", "y"], CandidateSource::Semantic);

    let fused = weighted_fusion(&lexical, &semantic, 0.0, 1.0, 3);

    assert_eq!(ids(&fused), vec!["z", "w", "y"]);
}

// ============================================================================
// Gate and context
// ============================================================================

#[test]
fn test_gate_is_monotonic_in_score() {
    let gate = RelevanceGate::new(-7.0);
    let mut rng = Lcg(3);
    for _ in 0..200 {
        let low = rng.below(2000) as f32 / 100.0 - 15.0;
        let high = low + rng.below(500) as f32 / 100.0;
        if gate.is_confident(Some(low)) {
            assert!(gate.is_confident(Some(high)), "{} passed but {} did not", low, high);
        }
    }
    assert!(gate.is_confident(Some(-7.0)));
    assert!(!gate.is_confident(Some(-7.01)));
}

#[test]
fn test_assembled_context_never_exceeds_budget() {
    let mut rng = Lcg(5);
    for _ in 0..30 {
        let size = 1 + rng.below(12);
        let chunks = corpus(&mut rng, size);
        let max_chars = 200 + rng.below(600);
        let include_metadata = rng.below(2) == 0;

        let context = ContextAssembler::new(max_chars, include_metadata).assemble(chunks.iter());

        assert!(
            context.chars().count() <= max_chars,
            "{} chars over budget {}",
            context.chars().count(),
            max_chars
        );
    }
}
