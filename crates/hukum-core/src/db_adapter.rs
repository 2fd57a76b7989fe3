//! Adapter layer for hukum-db infrastructure.
//!
//! Bridges hukum-db vector stores into the [`SemanticSearchPort`]:
//!
//! - Error conversion from `DbError` to `HukumError`
//! - Payload conversion between [`ChunkMetadata`] and flat JSON objects
//! - [`DbSemanticSearch`], the port implementation over any `VectorIndexBackend`
//!
//! ```text
//! hukum-core engine / semantic retriever
//!        ↓
//!   db_adapter (this module)
//!        ↓
//!     hukum-db (LanceDB or JSONL vector store)
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use hukum_db::vector::{
    open_vector_index, VectorIndexBackend, VectorIndexConfig, VectorInsert, VectorMetric,
    VectorSearchResult,
};
use hukum_db::{DbError, DbResult};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::VectorStoreConfig;
use crate::errors::{HukumError, IntoHukumResult};
use crate::ports::{SemanticHit, SemanticRecord, SemanticSearchPort};
use crate::types::{ChunkId, ChunkMetadata};

/// Records per upsert call.
pub const UPSERT_BATCH_SIZE: usize = 100;

/// Payload key holding the chunk id.
pub const CHUNK_ID_KEY: &str = "chunk_id";

// ============================================================================
// Error Conversion
// ============================================================================

/// Convert a hukum-db error to a hukum-core error.
pub fn from_db_error(err: DbError) -> HukumError {
    match err {
        DbError::Io(io_err) => HukumError::Io(io_err),

        DbError::Json(json_err) => HukumError::Json(json_err),

        DbError::VectorIo { path, message } => HukumError::SemanticSearch {
            backend: "vector-store".to_string(),
            reason: format!("I/O error at {}: {}", path.display(), message),
        },

        DbError::VectorParse { path, message } => HukumError::SemanticSearch {
            backend: "vector-store".to_string(),
            reason: format!("Corrupt data at {}: {}", path.display(), message),
        },

        DbError::DimensionMismatch { expected, actual } => HukumError::SemanticSearch {
            backend: "vector-store".to_string(),
            reason: format!("Dimension mismatch: expected {}, got {}", expected, actual),
        },

        DbError::StoreNotFound { path } => HukumError::BackendNotReady {
            backend: "vector-store".to_string(),
            reason: format!("No vector store at {}", path.display()),
        },

        DbError::StoreIncompatible { path, reason } => HukumError::invalid_config(
            format!("Vector store at {} is incompatible: {}", path.display(), reason),
            "Run `hukum clear --semantic` and re-index, or fix vectorStore settings",
        ),

        DbError::BackendUnavailable { backend, reason } => {
            HukumError::BackendNotReady { backend, reason }
        }

        #[cfg(feature = "lancedb")]
        DbError::LanceDb { message } => HukumError::SemanticSearch {
            backend: "lancedb".to_string(),
            reason: message,
        },

        DbError::Internal { message } => HukumError::SemanticSearch {
            backend: "vector-store".to_string(),
            reason: message,
        },
    }
}

impl<T> IntoHukumResult<T> for DbResult<T> {
    fn into_hukum_result(self) -> Result<T, HukumError> {
        self.map_err(from_db_error)
    }
}

// ============================================================================
// Payload Conversion
// ============================================================================

/// Flatten a record into a vector-store payload. Nested values are dropped.
pub fn to_payload(record: &SemanticRecord) -> Value {
    let mut map = Map::new();
    for (key, value) in record.metadata.iter() {
        match value {
            Value::Array(_) | Value::Object(_) => {
                debug!("Dropping nested metadata key '{}' from vector payload", key);
            }
            scalar => {
                map.insert(key.clone(), scalar.clone());
            }
        }
    }
    map.insert(
        CHUNK_ID_KEY.to_string(),
        Value::String(record.chunk_id.to_string()),
    );
    Value::Object(map)
}

/// Convert a store result into a [`SemanticHit`].
///
/// The payload `chunk_id` wins over the store id; an empty id becomes `None`.
pub fn to_semantic_hit(result: VectorSearchResult) -> SemanticHit {
    let metadata = match result.payload {
        Value::Object(map) => ChunkMetadata::from(map.into_iter().collect::<BTreeMap<_, _>>()),
        _ => ChunkMetadata::new(),
    };

    let chunk_id = metadata
        .get_str(CHUNK_ID_KEY)
        .map(str::to_string)
        .or_else(|| Some(result.id.as_str().to_string()))
        .filter(|id| !id.is_empty())
        .map(ChunkId::new);

    SemanticHit {
        chunk_id,
        score: result.score,
        metadata,
    }
}

pub fn to_db_vector_config(config: &VectorStoreConfig, path: PathBuf) -> VectorIndexConfig {
    let metric = VectorMetric::parse(&config.metric).unwrap_or_else(|| {
        warn!("Unknown vector metric '{}', using cosine", config.metric);
        VectorMetric::Cosine
    });
    VectorIndexConfig::new(config.dimension, path)
        .with_backend(config.backend.clone())
        .with_metric(metric)
}

// ============================================================================
// DbSemanticSearch
// ============================================================================

/// [`SemanticSearchPort`] over a hukum-db vector store.
pub struct DbSemanticSearch {
    inner: Arc<dyn VectorIndexBackend>,
}

impl std::fmt::Debug for DbSemanticSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbSemanticSearch")
            .field("backend", &self.inner.backend_name())
            .field("dimension", &self.inner.dimension())
            .finish()
    }
}

impl DbSemanticSearch {
    pub fn new(inner: Arc<dyn VectorIndexBackend>) -> Self {
        Self { inner }
    }

    /// Open the configured store, creating it when missing.
    pub fn open(config: &VectorStoreConfig, path: PathBuf) -> Result<Self, HukumError> {
        let db_config = to_db_vector_config(config, path);
        let inner = open_vector_index(&db_config).into_hukum_result()?;
        debug!(
            "Opened {} vector store at {}",
            inner.backend_name(),
            db_config.path.display()
        );
        Ok(Self::new(inner))
    }

    pub fn inner(&self) -> &Arc<dyn VectorIndexBackend> {
        &self.inner
    }
}

impl SemanticSearchPort for DbSemanticSearch {
    fn search(&self, vector: &[f32], top_k: usize) -> Result<Vec<SemanticHit>, HukumError> {
        let results = self.inner.query(vector, top_k).into_hukum_result()?;
        Ok(results.into_iter().map(to_semantic_hit).collect())
    }

    fn upsert(&self, records: &[SemanticRecord]) -> Result<(), HukumError> {
        for batch in records.chunks(UPSERT_BATCH_SIZE) {
            let inserts: Vec<VectorInsert> = batch
                .iter()
                .map(|r| VectorInsert::new(r.chunk_id.as_str(), r.vector.clone(), to_payload(r)))
                .collect();
            self.inner.upsert(&inserts).into_hukum_result()?;
        }
        self.inner.flush().into_hukum_result()
    }

    fn clear(&self) -> Result<(), HukumError> {
        self.inner.clear().into_hukum_result()?;
        self.inner.flush().into_hukum_result()
    }

    fn len(&self) -> Result<usize, HukumError> {
        self.inner.len().into_hukum_result()
    }

    fn is_connected(&self) -> bool {
        self.inner.len().is_ok()
    }

    fn backend_name(&self) -> &str {
        self.inner.backend_name()
    }
}
