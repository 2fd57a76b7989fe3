//! Lexical (BM25) retrieval for Indonesian legal text.
//!
//! Complements semantic retrieval with exact-term matching, which matters
//! most for numbered references: a query for `pasal 1365` must find the
//! chunk citing Pasal 1365, not every chunk mentioning "pasal".
//!
//! ## Key Components
//!
//! - [`tokenizer`]: lowercase, legal-reference collapsing, word extraction
//! - [`scorer`]: BM25 scoring (k1=1.5, b=0.75)
//! - [`index`]: inverted index built from a chunk set
//! - [`storage`]: bincode snapshot persistence
//!
//! ## Usage
//!
//! ```ignore
//! use hukum_core::lexical::{LexicalIndex, Bm25Params};
//!
//! let index = LexicalIndex::build(chunks, Bm25Params::default())?;
//! let hits = index.search("pasal 1365", 10);
//! ```

mod index;
mod scorer;
mod storage;
mod tokenizer;

pub use index::{ChunkLookup, LexicalIndex, LexicalIndexStats};
pub use scorer::{bm25_term_score, idf, Bm25Params, DEFAULT_B, DEFAULT_K1};
pub use storage::{
    load_lexical_index, load_lexical_meta, meta_path, remove_lexical_index, save_lexical_index,
    snapshot_path, LexicalIndexMeta, LEXICAL_META_FILENAME, LEXICAL_SNAPSHOT_FILENAME,
    SNAPSHOT_VERSION,
};
pub use tokenizer::{normalize_references, tokenize};
