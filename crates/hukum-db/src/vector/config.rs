//! Vector store configuration and on-disk metadata.

use super::traits::VectorMetric;
use crate::error::{DbError, DbResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default backend name.
pub const DEFAULT_BACKEND: &str = "lancedb";

/// Filename for store metadata, written next to the vector data.
pub const INDEX_META_FILENAME: &str = "index.meta.json";

/// LanceDB table holding chunk vectors.
pub const LANCEDB_TABLE_NAME: &str = "chunks";

/// Current on-disk schema version.
pub const SCHEMA_VERSION: u32 = 1;

// ============================================================================
// VectorIndexConfig
// ============================================================================

/// Configuration for creating or opening a vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorIndexConfig {
    /// Dimension of stored vectors.
    pub dimension: usize,

    /// Directory holding the store.
    pub path: PathBuf,

    /// Backend name ("lancedb" or "simple").
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Distance metric for similarity search.
    #[serde(default)]
    pub metric: VectorMetric,

    /// Whether to create the store if it does not exist.
    #[serde(default = "default_create_if_missing")]
    pub create_if_missing: bool,
}

fn default_backend() -> String {
    DEFAULT_BACKEND.to_string()
}

fn default_create_if_missing() -> bool {
    true
}

impl VectorIndexConfig {
    pub fn new(dimension: usize, path: impl Into<PathBuf>) -> Self {
        Self {
            dimension,
            path: path.into(),
            backend: DEFAULT_BACKEND.to_string(),
            metric: VectorMetric::Cosine,
            create_if_missing: true,
        }
    }

    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = backend.into();
        self
    }

    pub fn with_metric(mut self, metric: VectorMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }
}

// ============================================================================
// VectorIndexMeta
// ============================================================================

/// Metadata persisted in `index.meta.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorIndexMeta {
    pub backend: String,
    pub dimension: usize,
    pub metric: VectorMetric,

    /// Vector count at the last write. May be stale after a crash.
    #[serde(default)]
    pub count: usize,

    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Creation timestamp (RFC 3339).
    #[serde(default)]
    pub created_at: Option<String>,

    /// Last update timestamp (RFC 3339).
    #[serde(default)]
    pub updated_at: Option<String>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl VectorIndexMeta {
    pub fn new(backend: impl Into<String>, dimension: usize, metric: VectorMetric) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            backend: backend.into(),
            dimension,
            metric,
            count: 0,
            schema_version: SCHEMA_VERSION,
            created_at: Some(now.clone()),
            updated_at: Some(now),
        }
    }

    /// Record a new vector count and bump `updated_at`.
    pub fn update_count(&mut self, count: usize) {
        self.count = count;
        self.updated_at = Some(chrono::Utc::now().to_rfc3339());
    }
}

// ============================================================================
// VectorIndexCompatibility
// ============================================================================

/// Outcome of comparing a store on disk against a requested config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VectorIndexCompatibility {
    Compatible,
    NotFound,
    IncompatibleDimension { expected: usize, actual: usize },
    IncompatibleBackend { expected: String, actual: String },
    IncompatibleMetric {
        expected: VectorMetric,
        actual: VectorMetric,
    },
    Corrupted(String),
}

impl VectorIndexCompatibility {
    pub fn is_compatible(&self) -> bool {
        matches!(self, VectorIndexCompatibility::Compatible)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, VectorIndexCompatibility::NotFound)
    }

    /// Convert an incompatible outcome into an error for `path`.
    ///
    /// `Compatible` and `NotFound` are both `Ok`; the caller decides whether
    /// a missing store is acceptable.
    pub fn into_result(self, path: &Path) -> DbResult<()> {
        match self {
            VectorIndexCompatibility::Compatible | VectorIndexCompatibility::NotFound => Ok(()),
            VectorIndexCompatibility::IncompatibleDimension { expected, actual } => {
                Err(DbError::store_incompatible(
                    path,
                    format!(
                        "dimension {} on disk, {} configured; clear the index and rebuild",
                        actual, expected
                    ),
                ))
            }
            VectorIndexCompatibility::IncompatibleBackend { expected, actual } => {
                Err(DbError::store_incompatible(
                    path,
                    format!("backend '{}' on disk, '{}' configured", actual, expected),
                ))
            }
            VectorIndexCompatibility::IncompatibleMetric { expected, actual } => {
                Err(DbError::store_incompatible(
                    path,
                    format!("metric '{}' on disk, '{}' configured", actual, expected),
                ))
            }
            VectorIndexCompatibility::Corrupted(reason) => {
                Err(DbError::store_incompatible(path, reason))
            }
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Check whether an existing store matches the given config.
pub fn check_index_compatibility(config: &VectorIndexConfig) -> VectorIndexCompatibility {
    let meta_path = config.path.join(INDEX_META_FILENAME);

    if !meta_path.exists() {
        if config.path.is_dir() {
            let entries = config.path.read_dir().map(|rd| rd.count()).unwrap_or(0);
            if entries == 0 {
                return VectorIndexCompatibility::NotFound;
            }
            return VectorIndexCompatibility::Corrupted(
                "store directory has data but no index.meta.json".to_string(),
            );
        }
        return VectorIndexCompatibility::NotFound;
    }

    let meta = match load_index_meta(&config.path) {
        Ok(meta) => meta,
        Err(e) => return VectorIndexCompatibility::Corrupted(e.to_string()),
    };

    if meta.dimension != config.dimension {
        VectorIndexCompatibility::IncompatibleDimension {
            expected: config.dimension,
            actual: meta.dimension,
        }
    } else if meta.backend != config.backend {
        VectorIndexCompatibility::IncompatibleBackend {
            expected: config.backend.clone(),
            actual: meta.backend,
        }
    } else if meta.metric != config.metric {
        VectorIndexCompatibility::IncompatibleMetric {
            expected: config.metric,
            actual: meta.metric,
        }
    } else {
        VectorIndexCompatibility::Compatible
    }
}

/// Load store metadata from a directory.
pub fn load_index_meta(path: &Path) -> DbResult<VectorIndexMeta> {
    let meta_path = path.join(INDEX_META_FILENAME);
    debug!("Loading vector store metadata from {:?}", meta_path);

    let content = fs::read_to_string(&meta_path).map_err(|e| {
        DbError::vector_io(&meta_path, format!("failed to read metadata: {}", e))
    })?;

    serde_json::from_str(&content).map_err(|e| {
        DbError::vector_parse(&meta_path, format!("failed to parse metadata: {}", e))
    })
}

/// Write store metadata into a directory, creating it if needed.
pub fn write_index_meta(path: &Path, meta: &VectorIndexMeta) -> DbResult<()> {
    let meta_path = path.join(INDEX_META_FILENAME);
    debug!("Writing vector store metadata to {:?}", meta_path);

    fs::create_dir_all(path)?;
    let content = serde_json::to_string_pretty(meta)?;
    fs::write(&meta_path, content)?;

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
