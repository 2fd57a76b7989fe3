//! # hukum-db
//!
//! Storage layer for Hukum: vector stores backing semantic legal retrieval.
//!
//! The core engine only knows a narrow semantic-search port. This crate
//! provides the concrete stores behind it, isolated so that `hukum-core`
//! builds without the Arrow/LanceDB stack.
//!
//! ```text
//! hukum-cli → hukum-core → (ports)
//!                 ↑
//!              hukum-db    (vector stores)
//!              hukum-model (embeddings, reranker, generation)
//! ```
//!
//! ## Features
//!
//! - `lancedb` (default): LanceDB vector storage with ANN search
//! - `simple` (default): JSONL file backend with linear scan
//!
//! ## Usage
//!
//! ```ignore
//! use hukum_db::vector::{open_vector_index, VectorIndexConfig};
//!
//! let config = VectorIndexConfig::new(1024, "/path/to/vectors");
//! let index = open_vector_index(&config)?;
//! index.upsert(&inserts)?;
//! let hits = index.query(&embedding, 10)?;
//! ```

pub mod error;
pub mod vector;

pub use error::{DbError, DbResult};
