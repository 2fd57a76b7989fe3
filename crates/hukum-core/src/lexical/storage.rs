//! Lexical index snapshot storage.
//!
//! Uses bincode v2 for the snapshot itself. Storage layout:
//!
//! ```text
//! <index_dir>/
//! ├── lexical.bin         # chunks, tokenized corpus, BM25 constants
//! └── lexical.meta.json   # format version, chunk count, build time
//! ```
//!
//! Aggregate statistics are not stored; they are rebuilt from the corpus on
//! load so restored scores match a fresh build exactly.

use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use bincode::{config, Decode, Encode};
use serde::{Deserialize, Serialize};

use super::index::LexicalIndex;
use super::scorer::Bm25Params;
use crate::errors::HukumError;
use crate::types::{Chunk, ChunkMetadata};

/// Filename for the serialized snapshot.
pub const LEXICAL_SNAPSHOT_FILENAME: &str = "lexical.bin";

/// Filename for snapshot metadata.
pub const LEXICAL_META_FILENAME: &str = "lexical.meta.json";

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Encode, Decode)]
struct StoredChunk {
    id: String,
    content: String,
    /// JSON object; bincode cannot encode `serde_json::Value` directly.
    metadata_json: String,
}

#[derive(Debug, Encode, Decode)]
struct LexicalSnapshot {
    version: u32,
    params: Bm25Params,
    chunks: Vec<StoredChunk>,
    corpus: Vec<Vec<String>>,
}

/// Snapshot metadata written next to `lexical.bin`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LexicalIndexMeta {
    pub version: u32,
    pub chunk_count: usize,
    pub vocabulary_size: usize,
    /// RFC 3339 build timestamp.
    pub built_at: String,
}

impl LexicalIndexMeta {
    pub fn for_index(index: &LexicalIndex) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            chunk_count: index.len(),
            vocabulary_size: index.vocabulary_size(),
            built_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

pub fn snapshot_path(dir: &Path) -> PathBuf {
    dir.join(LEXICAL_SNAPSHOT_FILENAME)
}

pub fn meta_path(dir: &Path) -> PathBuf {
    dir.join(LEXICAL_META_FILENAME)
}

fn io_err(path: &Path, message: impl Into<String>) -> HukumError {
    HukumError::IndexStoreIo {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

fn parse_err(path: &Path, message: impl Into<String>) -> HukumError {
    HukumError::IndexStoreParse {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

/// Save a lexical index snapshot into `dir`, creating it if needed.
///
/// The snapshot is written to a temporary file and renamed into place.
pub fn save_lexical_index(index: &LexicalIndex, dir: &Path) -> Result<LexicalIndexMeta, HukumError> {
    fs::create_dir_all(dir)
        .map_err(|e| io_err(dir, format!("Failed to create index directory: {}", e)))?;

    let chunks = index
        .chunks()
        .iter()
        .map(|c| {
            Ok(StoredChunk {
                id: c.id.to_string(),
                content: c.content.clone(),
                metadata_json: serde_json::to_string(&c.metadata)?,
            })
        })
        .collect::<Result<Vec<_>, HukumError>>()?;

    let snapshot = LexicalSnapshot {
        version: SNAPSHOT_VERSION,
        params: index.params(),
        chunks,
        corpus: index.corpus().to_vec(),
    };

    let final_path = snapshot_path(dir);
    let tmp_path = dir.join(format!("{}.tmp", LEXICAL_SNAPSHOT_FILENAME));
    {
        let file = fs::File::create(&tmp_path)
            .map_err(|e| io_err(&tmp_path, format!("Failed to create snapshot file: {}", e)))?;
        let mut writer = BufWriter::new(file);
        bincode::encode_into_std_write(&snapshot, &mut writer, config::standard())
            .map_err(|e| parse_err(&tmp_path, format!("Failed to serialize snapshot: {}", e)))?;
        writer
            .flush()
            .map_err(|e| io_err(&tmp_path, format!("Failed to flush snapshot: {}", e)))?;
    }
    fs::rename(&tmp_path, &final_path)
        .map_err(|e| io_err(&final_path, format!("Failed to move snapshot into place: {}", e)))?;

    let meta = LexicalIndexMeta::for_index(index);
    let meta_file = meta_path(dir);
    let meta_json = serde_json::to_string_pretty(&meta)
        .map_err(|e| parse_err(&meta_file, format!("Failed to serialize metadata: {}", e)))?;
    fs::write(&meta_file, meta_json)
        .map_err(|e| io_err(&meta_file, format!("Failed to write metadata: {}", e)))?;

    tracing::debug!(
        "Saved lexical index to {}: {} docs, {} terms",
        dir.display(),
        meta.chunk_count,
        meta.vocabulary_size
    );

    Ok(meta)
}

/// Read snapshot metadata, or `None` if absent.
pub fn load_lexical_meta(dir: &Path) -> Result<Option<LexicalIndexMeta>, HukumError> {
    let meta_file = meta_path(dir);
    if !meta_file.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&meta_file)
        .map_err(|e| io_err(&meta_file, format!("Failed to read metadata: {}", e)))?;
    let meta = serde_json::from_str(&content)
        .map_err(|e| parse_err(&meta_file, format!("Failed to parse metadata: {}", e)))?;
    Ok(Some(meta))
}

/// Load a lexical index snapshot from `dir`.
///
/// Returns `Ok(None)` when no snapshot exists.
///
/// # Errors
///
/// Returns an error if the snapshot exists but cannot be read, or was written
/// by an incompatible format version.
pub fn load_lexical_index(dir: &Path) -> Result<Option<LexicalIndex>, HukumError> {
    let index_file = snapshot_path(dir);
    if !index_file.exists() {
        tracing::debug!("No lexical snapshot at {}", index_file.display());
        return Ok(None);
    }

    if let Some(meta) = load_lexical_meta(dir)? {
        if meta.version != SNAPSHOT_VERSION {
            return Err(parse_err(
                &meta_path(dir),
                format!(
                    "snapshot version {} is not supported (expected {}). Rebuild with `hukum index`",
                    meta.version, SNAPSHOT_VERSION
                ),
            ));
        }
    }

    let file = fs::File::open(&index_file)
        .map_err(|e| io_err(&index_file, format!("Failed to open snapshot: {}", e)))?;
    let mut reader = BufReader::new(file);
    let snapshot: LexicalSnapshot = bincode::decode_from_std_read(&mut reader, config::standard())
        .map_err(|e| parse_err(&index_file, format!("Failed to deserialize snapshot: {}", e)))?;

    if snapshot.version != SNAPSHOT_VERSION {
        return Err(parse_err(
            &index_file,
            format!(
                "snapshot version {} is not supported (expected {})",
                snapshot.version, SNAPSHOT_VERSION
            ),
        ));
    }

    let chunks = snapshot
        .chunks
        .into_iter()
        .map(|c| {
            let metadata: ChunkMetadata = serde_json::from_str(&c.metadata_json).map_err(|e| {
                HukumError::Serialization {
                    message: format!("metadata of chunk '{}': {}", c.id, e),
                }
            })?;
            Ok(Chunk::new(c.id, c.content, metadata))
        })
        .collect::<Result<Vec<_>, HukumError>>()?;

    let index = LexicalIndex::from_parts(snapshot.params, chunks, snapshot.corpus)?;

    tracing::debug!(
        "Loaded lexical index from {}: {} docs, {} terms",
        dir.display(),
        index.len(),
        index.vocabulary_size()
    );

    Ok(Some(index))
}

/// Delete snapshot files in `dir`. Returns whether anything was removed.
pub fn remove_lexical_index(dir: &Path) -> Result<bool, HukumError> {
    let mut removed = false;
    for path in [snapshot_path(dir), meta_path(dir)] {
        if path.exists() {
            fs::remove_file(&path)
                .map_err(|e| io_err(&path, format!("Failed to delete: {}", e)))?;
            removed = true;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn build() -> LexicalIndex {
        let chunks = vec![
            Chunk::new(
                "a",
                "Pasal 1365 KUHPerdata tentang perbuatan melawan hukum",
                ChunkMetadata::new().with("source", "kuhper.pdf").with("page", 12),
            ),
            Chunk::new(
                "b",
                "UU No. 40 Tahun 2007 tentang Perseroan Terbatas",
                ChunkMetadata::new().with("source", "uupt.pdf"),
            ),
        ];
        LexicalIndex::build(chunks, Bm25Params { k1: 1.2, b: 0.6 }).unwrap()
    }

    #[test]
    fn test_round_trip_preserves_scores() {
        let dir = TempDir::new().unwrap();
        let index = build();
        let meta = save_lexical_index(&index, dir.path()).unwrap();
        assert_eq!(meta.chunk_count, 2);

        let loaded = load_lexical_index(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.params(), index.params());
        assert_eq!(loaded.stats(), index.stats());
        assert_eq!(loaded.chunks(), index.chunks());

        for query in ["pasal 1365", "perseroan terbatas", "tentang", "uu no 40"] {
            assert_eq!(loaded.search(query, 5), index.search(query, 5), "query {query}");
        }
    }

    #[test]
    fn test_load_missing_returns_none() {
        let dir = TempDir::new().unwrap();
        assert!(load_lexical_index(dir.path()).unwrap().is_none());
        assert!(load_lexical_meta(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_version_mismatch_is_error() {
        let dir = TempDir::new().unwrap();
        save_lexical_index(&build(), dir.path()).unwrap();

        let mut meta = load_lexical_meta(dir.path()).unwrap().unwrap();
        meta.version = 99;
        fs::write(meta_path(dir.path()), serde_json::to_string(&meta).unwrap()).unwrap();

        let err = load_lexical_index(dir.path()).unwrap_err();
        assert!(matches!(err, HukumError::IndexStoreParse { .. }));
    }

    #[test]
    fn test_corrupt_snapshot_is_error() {
        let dir = TempDir::new().unwrap();
        fs::write(snapshot_path(dir.path()), b"not bincode").unwrap();
        assert!(load_lexical_index(dir.path()).is_err());
    }

    #[test]
    fn test_remove() {
        let dir = TempDir::new().unwrap();
        save_lexical_index(&build(), dir.path()).unwrap();
        assert!(remove_lexical_index(dir.path()).unwrap());
        assert!(!snapshot_path(dir.path()).exists());
        assert!(!remove_lexical_index(dir.path()).unwrap());
    }
}
