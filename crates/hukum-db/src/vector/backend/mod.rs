//! Vector store backend implementations.
//!
//! - `lancedb` (default): LanceDB table with ANN search
//! - `simple`: JSONL file with linear scan, for tests and small corpora

#[cfg(feature = "lancedb")]
mod lancedb;

#[cfg(feature = "simple")]
mod simple;

#[cfg(feature = "lancedb")]
pub use self::lancedb::LanceDbVectorIndex;

#[cfg(feature = "simple")]
pub use simple::SimpleFileVectorIndex;

use super::config::{
    check_index_compatibility, write_index_meta, VectorIndexCompatibility, VectorIndexConfig,
    VectorIndexMeta,
};
use super::traits::VectorIndexBackend;
use crate::error::{DbError, DbResult};
use std::sync::Arc;
use tracing::{debug, info};

/// Open a vector store with the given configuration.
///
/// Checks the on-disk metadata first. A missing store is created when
/// `create_if_missing` is set; a store written with another dimension,
/// backend or metric is rejected with [`DbError::StoreIncompatible`].
pub fn open_vector_index(config: &VectorIndexConfig) -> DbResult<Arc<dyn VectorIndexBackend>> {
    debug!("Opening vector store at {:?}", config.path);

    if !available_backends().contains(&config.backend.as_str()) {
        return Err(DbError::BackendUnavailable {
            backend: config.backend.clone(),
            reason: format!(
                "available backends: {}",
                available_backends().join(", ")
            ),
        });
    }

    match check_index_compatibility(config) {
        VectorIndexCompatibility::NotFound => {
            if !config.create_if_missing {
                return Err(DbError::StoreNotFound {
                    path: config.path.clone(),
                });
            }
            info!("Creating vector store at {:?}", config.path);
            let meta = VectorIndexMeta::new(&config.backend, config.dimension, config.metric);
            write_index_meta(&config.path, &meta)?;
        }
        other => other.into_result(&config.path)?,
    }

    match config.backend.as_str() {
        #[cfg(feature = "lancedb")]
        "lancedb" => Ok(Arc::new(LanceDbVectorIndex::open(config)?)),

        #[cfg(feature = "simple")]
        "simple" => Ok(Arc::new(SimpleFileVectorIndex::open(config)?)),

        backend => Err(DbError::BackendUnavailable {
            backend: backend.to_string(),
            reason: "feature not enabled".to_string(),
        }),
    }
}

/// Backend names compiled into this build.
#[allow(clippy::vec_init_then_push)]
pub fn available_backends() -> Vec<&'static str> {
    let mut backends = Vec::new();

    #[cfg(feature = "lancedb")]
    backends.push("lancedb");

    #[cfg(feature = "simple")]
    backends.push("simple");

    backends
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_backend_rejected() {
        let config = VectorIndexConfig::new(4, "/tmp/hukum-unused").with_backend("faiss");
        let err = open_vector_index(&config).err().map(|e| e.to_string());
        assert!(err.unwrap_or_default().contains("faiss"));
    }

    #[cfg(feature = "simple")]
    #[test]
    fn test_open_simple_creates_meta() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = VectorIndexConfig::new(4, dir.path().join("vs")).with_backend("simple");
        let index = open_vector_index(&config).unwrap();
        assert_eq!(index.dimension(), 4);
        assert!(dir
            .path()
            .join("vs")
            .join(super::super::config::INDEX_META_FILENAME)
            .exists());

        // Reopening with a different dimension fails.
        let wrong = VectorIndexConfig::new(8, dir.path().join("vs")).with_backend("simple");
        assert!(matches!(
            open_vector_index(&wrong),
            Err(DbError::StoreIncompatible { .. })
        ));
    }

    #[cfg(feature = "simple")]
    #[test]
    fn test_missing_store_without_create() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = VectorIndexConfig::new(4, dir.path().join("absent"))
            .with_backend("simple")
            .with_create_if_missing(false);
        assert!(matches!(
            open_vector_index(&config),
            Err(DbError::StoreNotFound { .. })
        ));
    }
}
