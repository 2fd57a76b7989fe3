//! Vector stores for semantic chunk retrieval.
//!
//! ## Available Backends
//!
//! - `lancedb` (default): LanceDB with ANN search
//! - `simple`: JSONL file backend for tests and small corpora
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

mod backend;
mod config;
mod traits;

pub use config::{
    check_index_compatibility, load_index_meta, write_index_meta, VectorIndexCompatibility,
    VectorIndexConfig, VectorIndexMeta, DEFAULT_BACKEND, INDEX_META_FILENAME, LANCEDB_TABLE_NAME,
    SCHEMA_VERSION,
};
pub use traits::{VectorId, VectorIndexBackend, VectorInsert, VectorMetric, VectorSearchResult};

pub use backend::{available_backends, open_vector_index};

#[cfg(feature = "lancedb")]
pub use backend::LanceDbVectorIndex;

#[cfg(feature = "simple")]
pub use backend::SimpleFileVectorIndex;
