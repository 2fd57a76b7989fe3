//! JSONL vector store with linear-scan search.
//!
//! Every write rewrites `vectors.jsonl`. Fine for test fixtures and a few
//! thousand chunks; use the LanceDB backend for real corpora.

use super::super::config::{load_index_meta, write_index_meta, VectorIndexConfig, VectorIndexMeta};
use super::super::traits::{
    VectorId, VectorIndexBackend, VectorInsert, VectorMetric, VectorSearchResult,
};
use crate::error::{DbError, DbResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, trace, warn};

const DATA_FILENAME: &str = "vectors.jsonl";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredVector {
    id: String,
    vector: Vec<f32>,
    payload: serde_json::Value,
}

impl From<&VectorInsert> for StoredVector {
    fn from(insert: &VectorInsert) -> Self {
        Self {
            id: insert.id.0.clone(),
            vector: insert.vector.clone(),
            payload: insert.payload.clone(),
        }
    }
}

/// File-backed vector store.
pub struct SimpleFileVectorIndex {
    path: PathBuf,
    dimension: usize,
    metric: VectorMetric,
    /// Keyed by chunk id; ordered so the data file is stable across rewrites.
    vectors: RwLock<BTreeMap<String, StoredVector>>,
}

impl SimpleFileVectorIndex {
    /// Open or create a store rooted at `config.path`.
    pub fn open(config: &VectorIndexConfig) -> DbResult<Self> {
        debug!("Opening SimpleFileVectorIndex at {:?}", config.path);

        let index = Self {
            path: config.path.clone(),
            dimension: config.dimension,
            metric: config.metric,
            vectors: RwLock::new(BTreeMap::new()),
        };

        let data_path = config.path.join(DATA_FILENAME);
        if data_path.exists() {
            index.load_from_file(&data_path)?;
        }

        Ok(index)
    }

    fn load_from_file(&self, path: &Path) -> DbResult<()> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let mut vectors = self
            .vectors
            .write()
            .map_err(|e| DbError::internal(format!("Failed to acquire write lock: {}", e)))?;

        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<StoredVector>(&line) {
                Ok(stored) if stored.vector.len() == self.dimension => {
                    vectors.insert(stored.id.clone(), stored);
                }
                Ok(stored) => {
                    warn!(
                        "Skipping vector {} on line {}: dimension {} != {}",
                        stored.id,
                        line_num + 1,
                        stored.vector.len(),
                        self.dimension
                    );
                }
                Err(e) => {
                    warn!("Skipping invalid line {}: {}", line_num + 1, e);
                }
            }
        }

        debug!("Loaded {} vectors from {:?}", vectors.len(), path);
        Ok(())
    }

    fn save_to_file(&self) -> DbResult<()> {
        let data_path = self.path.join(DATA_FILENAME);

        let vectors = self
            .vectors
            .read()
            .map_err(|e| DbError::internal(format!("Failed to acquire read lock: {}", e)))?;

        std::fs::create_dir_all(&self.path)?;
        let mut writer = BufWriter::new(File::create(&data_path)?);
        for stored in vectors.values() {
            serde_json::to_writer(&mut writer, stored)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;

        let mut meta = load_index_meta(&self.path)
            .unwrap_or_else(|_| VectorIndexMeta::new("simple", self.dimension, self.metric));
        meta.update_count(vectors.len());
        write_index_meta(&self.path, &meta)?;

        debug!("Saved {} vectors to {:?}", vectors.len(), data_path);
        Ok(())
    }

    fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        match self.metric {
            VectorMetric::Cosine => cosine_similarity(a, b),
            VectorMetric::Dot => dot_product(a, b),
            // Negated so that higher is better for every metric.
            VectorMetric::L2 => -euclidean_distance(a, b),
        }
    }
}

impl VectorIndexBackend for SimpleFileVectorIndex {
    fn query(&self, embedding: &[f32], limit: usize) -> DbResult<Vec<VectorSearchResult>> {
        trace!("Querying SimpleFileVectorIndex, limit={}", limit);

        if embedding.len() != self.dimension {
            return Err(DbError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        let vectors = self
            .vectors
            .read()
            .map_err(|e| DbError::internal(format!("Failed to acquire read lock: {}", e)))?;

        let mut scored: Vec<(f32, &StoredVector)> = vectors
            .values()
            .map(|v| (self.similarity(embedding, &v.vector), v))
            .collect();

        // BTreeMap iteration is id-ordered, so a stable sort keeps ties deterministic.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(score, stored)| {
                VectorSearchResult::new(stored.id.as_str(), score, stored.payload.clone())
            })
            .collect())
    }

    fn upsert(&self, vectors: &[VectorInsert]) -> DbResult<()> {
        debug!("Upserting {} vectors", vectors.len());

        {
            let mut stored = self
                .vectors
                .write()
                .map_err(|e| DbError::internal(format!("Failed to acquire write lock: {}", e)))?;

            for insert in vectors {
                if insert.vector.len() != self.dimension {
                    return Err(DbError::DimensionMismatch {
                        expected: self.dimension,
                        actual: insert.vector.len(),
                    });
                }
                let entry = StoredVector::from(insert);
                stored.insert(entry.id.clone(), entry);
            }
        }

        self.save_to_file()
    }

    fn delete(&self, ids: &[VectorId]) -> DbResult<()> {
        debug!("Deleting {} vectors", ids.len());

        {
            let mut stored = self
                .vectors
                .write()
                .map_err(|e| DbError::internal(format!("Failed to acquire write lock: {}", e)))?;
            for id in ids {
                stored.remove(id.as_str());
            }
        }

        self.save_to_file()
    }

    fn clear(&self) -> DbResult<()> {
        self.vectors
            .write()
            .map_err(|e| DbError::internal(format!("Failed to acquire write lock: {}", e)))?
            .clear();
        self.save_to_file()
    }

    fn flush(&self) -> DbResult<()> {
        self.save_to_file()
    }

    fn len(&self) -> DbResult<usize> {
        let stored = self
            .vectors
            .read()
            .map_err(|e| DbError::internal(format!("Failed to acquire read lock: {}", e)))?;
        Ok(stored.len())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn metric(&self) -> VectorMetric {
        self.metric
    }

    fn backend_name(&self) -> &'static str {
        "simple"
    }
}

// ============================================================================
// Similarity Functions
// ============================================================================

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}
