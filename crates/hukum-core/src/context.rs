//! Length-bounded context assembly with provenance headers.
//!
//! Each entry is a header line followed by the chunk content:
//!
//! ```text
//! [Sumber 1: putusan_690.pdf, Halaman 4]
//! <content>
//!
//! [Sumber 2: ...]
//! ```
//!
//! Lengths are counted in characters, separators included, so the result never
//! exceeds `max_chars`.

use crate::types::Chunk;

/// Default context budget in characters.
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 6000;

/// Minimum budget left for a truncated tail entry to be worth emitting.
const MIN_TAIL_CHARS: usize = 100;

/// Slack reserved for the ellipsis and separators of a tail entry.
const TAIL_RESERVE: usize = 10;

const ELLIPSIS: &str = "...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextAssembler {
    pub max_chars: usize,
    pub include_metadata: bool,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CONTEXT_CHARS,
            include_metadata: true,
        }
    }
}

impl ContextAssembler {
    pub fn new(max_chars: usize, include_metadata: bool) -> Self {
        Self {
            max_chars,
            include_metadata,
        }
    }

    /// Provenance header for the entry at 0-based `position`.
    pub fn header(&self, position: usize, chunk: &Chunk) -> String {
        if self.include_metadata {
            let source = chunk.metadata.source().unwrap_or("Unknown");
            let page = chunk.metadata.page().unwrap_or_else(|| "?".to_string());
            format!("[Sumber {}: {}, Halaman {}]", position + 1, source, page)
        } else {
            format!("[Konteks {}]", position + 1)
        }
    }

    /// Join chunks into one context string, in order, within `max_chars`.
    ///
    /// When the next full entry does not fit, its content is cut to the
    /// remaining budget and marked with `...`, provided more than 100
    /// characters remain; assembly stops either way.
    pub fn assemble<'a, I>(&self, chunks: I) -> String
    where
        I: IntoIterator<Item = &'a Chunk>,
    {
        let mut parts: Vec<String> = Vec::new();
        let mut current = 0usize;

        for (i, chunk) in chunks.into_iter().enumerate() {
            let header = self.header(i, chunk);
            let separator = usize::from(!parts.is_empty());
            let entry = format!("{}\n{}\n", header, chunk.content);
            let entry_len = entry.chars().count();

            if current + separator + entry_len > self.max_chars {
                let remaining = self
                    .max_chars
                    .saturating_sub(current + header.chars().count() + TAIL_RESERVE);
                if remaining > MIN_TAIL_CHARS {
                    let truncated: String = chunk.content.chars().take(remaining).collect();
                    parts.push(format!("{}\n{}{}\n", header, truncated, ELLIPSIS));
                }
                break;
            }

            parts.push(entry);
            current += separator + entry_len;
        }

        parts.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkMetadata;

    fn chunk(id: &str, content: &str, source: Option<&str>, page: Option<i64>) -> Chunk {
        let mut meta = ChunkMetadata::new();
        if let Some(s) = source {
            meta.insert("source", s);
        }
        if let Some(p) = page {
            meta.insert("page", p);
        }
        Chunk::new(id, content, meta)
    }

    #[test]
    fn test_headers_and_layout() {
        let chunks = vec![
            chunk("a", "Isi pertama.", Some("putusan.pdf"), Some(4)),
            chunk("b", "Isi kedua.", None, None),
        ];
        let ctx = ContextAssembler::default().assemble(&chunks);
        assert_eq!(
            ctx,
            "[Sumber 1: putusan.pdf, Halaman 4]\nIsi pertama.\n\n[Sumber 2: Unknown, Halaman ?]\nIsi kedua.\n"
        );
    }

    #[test]
    fn test_without_metadata() {
        let chunks = vec![chunk("a", "Isi.", Some("x.pdf"), Some(1))];
        let ctx = ContextAssembler::new(1000, false).assemble(&chunks);
        assert_eq!(ctx, "[Konteks 1]\nIsi.\n");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(ContextAssembler::default().assemble(&Vec::<Chunk>::new()), "");
    }

    #[test]
    fn test_truncates_tail_entry() {
        let long = "a".repeat(500);
        let chunks = vec![
            chunk("a", &"x".repeat(200), Some("s.pdf"), Some(1)),
            chunk("b", &long, Some("s.pdf"), Some(2)),
            chunk("c", "tidak muat", Some("s.pdf"), Some(3)),
        ];
        let assembler = ContextAssembler::new(500, true);
        let ctx = assembler.assemble(&chunks);

        assert!(ctx.chars().count() <= 500);
        assert!(ctx.contains("[Sumber 2: s.pdf, Halaman 2]"));
        assert!(ctx.ends_with("...\n"));
        assert!(!ctx.contains("tidak muat"));
    }

    #[test]
    fn test_drops_tail_when_budget_too_small() {
        let chunks = vec![
            chunk("a", &"x".repeat(300), Some("s.pdf"), None),
            chunk("b", &"y".repeat(300), Some("s.pdf"), None),
        ];
        let ctx = ContextAssembler::new(400, true).assemble(&chunks);
        assert!(!ctx.contains('y'));
        assert!(!ctx.contains("Sumber 2"));
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        let content = "é".repeat(150);
        let chunks = vec![chunk("a", &content, Some("s"), Some(1))];
        let ctx = ContextAssembler::new(200, true).assemble(&chunks);
        assert!(ctx.contains(&content));
    }

    #[test]
    fn test_never_exceeds_budget() {
        let chunks: Vec<Chunk> = (0..20)
            .map(|i| chunk(&i.to_string(), &"kata ".repeat(10 + i * 7), Some("doc.pdf"), Some(i as i64)))
            .collect();
        for max in [200, 350, 777, 1500, 6000] {
            let ctx = ContextAssembler::new(max, true).assemble(&chunks);
            assert!(ctx.chars().count() <= max, "max {max}");
        }
    }
}
