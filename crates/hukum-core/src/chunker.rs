//! Plain-text ingestion: recursive character splitting with section tags.
//!
//! Text is split on the coarsest separator that occurs, recursing into finer
//! separators for pieces still longer than the chunk size, then merged back
//! into chunks of at most `chunk_size` characters with `chunk_overlap`
//! characters carried between neighbours.
//!
//! Each chunk is tagged with a coarse section of a court decision:
//! `header`, `amar`, `duduk_perkara` or `isi`.

use std::collections::VecDeque;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::errors::HukumError;
use crate::types::{Chunk, ChunkId, ChunkMetadata};

pub const DEFAULT_CHUNK_SIZE: usize = 800;
pub const DEFAULT_CHUNK_OVERLAP: usize = 150;
pub const DEFAULT_SEPARATORS: [&str; 7] = ["\n\n", "\n", ".", ";", ",", " ", ""];

/// Leading chunks always tagged `header`.
const HEADER_CHUNKS: usize = 3;
/// Leading fraction of a document tagged `header`.
const HEADER_FRACTION: f64 = 0.15;

const TEXT_EXTENSIONS: [&str; 1] = ["txt"];

// ============================================================================
// Section tags
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Header,
    Amar,
    DudukPerkara,
    Isi,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Header => "header",
            Self::Amar => "amar",
            Self::DudukPerkara => "duduk_perkara",
            Self::Isi => "isi",
        }
    }

    /// Tag chunk `index` of a document `doc_chars` long.
    pub fn classify(index: usize, text: &str, doc_chars: usize) -> Self {
        let chunk_chars = text.chars().count();
        if index < HEADER_CHUNKS
            || ((index * chunk_chars) as f64) < (doc_chars as f64) * HEADER_FRACTION
        {
            Self::Header
        } else if text.contains("MENGADILI") || text.contains("AMAR") {
            Self::Amar
        } else if text.contains("DUDUK PERKARA") {
            Self::DudukPerkara
        } else {
            Self::Isi
        }
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Chunker
// ============================================================================

#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }
}

impl Chunker {
    /// Overlap is clamped below the chunk size.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_separators(mut self, separators: Vec<String>) -> Self {
        self.separators = separators;
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text` into trimmed, non-empty pieces of at most `chunk_size` chars.
    ///
    /// A piece can only exceed the size when no separator splits it further.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let position = separators
            .iter()
            .position(|s| s.is_empty() || text.contains(s.as_str()))
            .unwrap_or(separators.len().saturating_sub(1));
        let (separator, finer) = match separators.get(position) {
            Some(sep) => (sep.as_str(), &separators[position + 1..]),
            None => ("", &separators[0..0]),
        };

        let mut chunks = Vec::new();
        let mut pending: Vec<String> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(&piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                chunks.extend(self.merge(&pending));
                pending.clear();
            }
            if finer.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    chunks.push(trimmed.to_string());
                }
            } else {
                chunks.extend(self.split_recursive(&piece, finer));
            }
        }
        if !pending.is_empty() {
            chunks.extend(self.merge(&pending));
        }
        chunks
    }

    /// Greedy merge of small pieces into windows, carrying `chunk_overlap` chars.
    fn merge(&self, pieces: &[String]) -> Vec<String> {
        let mut out = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                push_trimmed(&mut out, &window);
                while total > self.chunk_overlap
                    || (total + len > self.chunk_size && total > 0)
                {
                    match window.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }
            window.push_back(piece.as_str());
            total += len;
        }
        push_trimmed(&mut out, &window);
        out
    }

    /// Chunk one document. `base` metadata is copied onto every chunk.
    pub fn chunk_document(&self, source: &str, text: &str, base: &ChunkMetadata) -> Vec<Chunk> {
        let doc_chars = char_len(text);
        let pieces = self.split_text(text);
        let total = pieces.len();

        pieces
            .into_iter()
            .enumerate()
            .map(|(i, content)| {
                let section = Section::classify(i, &content, doc_chars);
                let mut meta = base.clone();
                meta.insert("source", source);
                meta.insert("chunk_index", i);
                meta.insert("total_chunks", total);
                meta.insert("char_count", char_len(&content));
                meta.insert("section", section.as_str());
                Chunk::derived(source, i, content, meta)
            })
            .collect()
    }

    /// Read and chunk a UTF-8 text file. The source is the file name.
    pub fn chunk_file(&self, path: &Path) -> Result<Vec<Chunk>, HukumError> {
        let text = fs::read_to_string(path)?;
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let chunks = self.chunk_document(&source, &text, &ChunkMetadata::new());
        debug!("Chunked {} into {} chunks", path.display(), chunks.len());
        Ok(chunks)
    }

    /// Chunk every text file under `paths`, in path order.
    pub fn chunk_paths(&self, paths: &[PathBuf]) -> Result<Vec<Chunk>, HukumError> {
        let files = collect_text_files(paths)?;
        let mut chunks = Vec::new();
        for file in &files {
            chunks.extend(self.chunk_file(file)?);
        }
        info!("Chunked {} files into {} chunks", files.len(), chunks.len());
        Ok(chunks)
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn push_trimmed(out: &mut Vec<String>, window: &VecDeque<&str>) {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

/// Split on `separator`, attaching it to the start of the following piece.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }
    let mut parts = text.split(separator);
    let mut out = Vec::new();
    if let Some(first) = parts.next() {
        if !first.is_empty() {
            out.push(first.to_string());
        }
    }
    out.extend(parts.map(|p| format!("{}{}", separator, p)));
    out
}

// ============================================================================
// File discovery
// ============================================================================

/// Expand files and directories into `.txt` files, sorted and deduplicated.
///
/// Directories are walked respecting ignore files; hidden entries are skipped.
pub fn collect_text_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>, HukumError> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_file() {
            files.push(path.clone());
            continue;
        }
        if !path.is_dir() {
            return Err(HukumError::InvalidArgument(format!(
                "Path not found: {}",
                path.display()
            )));
        }

        let walker = WalkBuilder::new(path)
            .hidden(true)
            .git_ignore(true)
            .follow_links(false)
            .build();
        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            let p = entry.path();
            if p.is_file() && has_text_extension(p) {
                files.push(p.to_path_buf());
            }
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn has_text_extension(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|ext| TEXT_EXTENSIONS.contains(&ext.as_str()))
}

// ============================================================================
// JSONL chunk records
// ============================================================================

/// One pre-chunked record. A missing id is derived from source and position.
#[derive(Debug, Deserialize)]
struct ChunkRecord {
    #[serde(default, alias = "chunk_id")]
    id: Option<String>,
    content: String,
    #[serde(default)]
    metadata: ChunkMetadata,
}

/// Read chunks from a JSON Lines file. Blank lines are skipped.
pub fn read_chunk_records(path: &Path) -> Result<Vec<Chunk>, HukumError> {
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);
    let fallback_source = path.display().to_string();

    let mut chunks = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: ChunkRecord =
            serde_json::from_str(&line).map_err(|e| HukumError::IndexStoreParse {
                path: path.to_path_buf(),
                message: format!("line {}: {}", line_no + 1, e),
            })?;
        if record.content.trim().is_empty() {
            warn!("Skipping empty chunk at {}:{}", path.display(), line_no + 1);
            continue;
        }
        let chunk = match record.id {
            Some(id) if !id.is_empty() => Chunk::new(ChunkId::new(id), record.content, record.metadata),
            _ => {
                let source = record
                    .metadata
                    .source()
                    .unwrap_or(&fallback_source)
                    .to_string();
                Chunk::derived(&source, chunks.len(), record.content, record.metadata)
            }
        };
        chunks.push(chunk);
    }
    info!("Read {} chunk records from {}", chunks.len(), path.display());
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunks = Chunker::default().split_text("  Pasal 1365 KUHPerdata.  ");
        assert_eq!(chunks, vec!["Pasal 1365 KUHPerdata.".to_string()]);
    }

    #[test]
    fn test_chunks_respect_size() {
        let paragraph = "Menimbang bahwa penggugat telah mengajukan gugatan. ".repeat(30);
        let text = format!("{p}\n\n{p}\n\n{p}", p = paragraph);
        let chunker = Chunker::new(200, 40);
        let chunks = chunker.split_text(&text);
        assert!(chunks.len() > 3);
        for c in &chunks {
            assert!(c.chars().count() <= 200, "chunk too long: {}", c.chars().count());
            assert!(!c.is_empty());
        }
    }

    #[test]
    fn test_overlap_carries_text() {
        let text = (0..60).map(|i| format!("kata{i}")).collect::<Vec<_>>().join(" ");
        let chunks = Chunker::new(100, 30).split_text(&text);
        assert!(chunks.len() > 1);
        let first_tail = chunks[0].split_whitespace().last().unwrap();
        assert!(chunks[1].contains(first_tail));
    }

    #[test]
    fn test_unbreakable_text_falls_back_to_characters() {
        let text = "x".repeat(250);
        let chunks = Chunker::new(100, 0).split_text(&text);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 100));
    }

    #[test]
    fn test_section_classification() {
        assert_eq!(Section::classify(0, "MENGADILI", 10_000), Section::Header);
        assert_eq!(Section::classify(10, "MENGADILI: menolak", 100), Section::Amar);
        assert_eq!(Section::classify(10, "AMAR PUTUSAN", 100), Section::Amar);
        assert_eq!(Section::classify(10, "TENTANG DUDUK PERKARA", 100), Section::DudukPerkara);
        assert_eq!(Section::classify(10, "pertimbangan hukum", 100), Section::Isi);
        // 4 * 100 chars < 15% of 10_000
        assert_eq!(Section::classify(4, &"a".repeat(100), 10_000), Section::Header);
    }

    #[test]
    fn test_chunk_document_metadata() {
        let text = "Paragraf. ".repeat(300);
        let chunks = Chunker::new(200, 20).chunk_document("putusan_1.txt", &text, &ChunkMetadata::new());
        let total = chunks.len();
        assert!(total > 3);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.metadata.source(), Some("putusan_1.txt"));
            assert_eq!(c.metadata.get("chunk_index"), Some(&serde_json::json!(i)));
            assert_eq!(c.metadata.get("total_chunks"), Some(&serde_json::json!(total)));
            assert!(c.metadata.section().is_some());
        }
        assert_eq!(chunks[0].metadata.section(), Some("header"));

        let again = Chunker::new(200, 20).chunk_document("putusan_1.txt", &text, &ChunkMetadata::new());
        assert_eq!(chunks[1].id, again[1].id);
    }

    #[test]
    fn test_collect_text_files() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("sub")).unwrap();
        fs::write(temp.path().join("a.txt"), "isi").unwrap();
        fs::write(temp.path().join("sub/b.TXT"), "isi").unwrap();
        fs::write(temp.path().join("c.pdf"), "bin").unwrap();

        let files = collect_text_files(&[temp.path().to_path_buf()]).unwrap();
        assert_eq!(files.len(), 2);
        assert!(collect_text_files(&[temp.path().join("missing")]).is_err());
    }

    #[test]
    fn test_read_chunk_records() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("chunks.jsonl");
        fs::write(
            &path,
            "{\"id\":\"c1\",\"content\":\"Pasal 1234\",\"metadata\":{\"source\":\"a.pdf\",\"page\":1}}\n\n\
             {\"content\":\"UU No. 40 Tahun 2007\",\"metadata\":{\"source\":\"b.pdf\"}}\n",
        )
        .unwrap();
        let chunks = read_chunk_records(&path).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].id.as_str(), "c1");
        assert_eq!(chunks[0].metadata.page(), Some("1".to_string()));
        assert_eq!(chunks[1].id, ChunkId::derive("b.pdf", 1, "UU No. 40 Tahun 2007"));

        fs::write(&path, "not json\n").unwrap();
        assert!(matches!(
            read_chunk_records(&path),
            Err(HukumError::IndexStoreParse { .. })
        ));
    }
}
