//! LanceDB vector store.
//!
//! One table (`chunks`) with the embedding plus the flat legal metadata
//! columns used by the retrieval layer. The full payload is kept as a JSON
//! string so unknown metadata keys survive a round trip.

use super::super::config::{
    load_index_meta, write_index_meta, VectorIndexConfig, VectorIndexMeta, LANCEDB_TABLE_NAME,
};
use super::super::traits::{
    VectorId, VectorIndexBackend, VectorInsert, VectorMetric, VectorSearchResult,
};
use crate::error::{DbError, DbResult};
use arrow_array::{
    Array, ArrayRef, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator,
    StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use futures::TryStreamExt;
use lance_arrow::FixedSizeListArrayExt;
use lancedb::{
    connect,
    query::{ExecutableQuery, QueryBase},
    Connection, DistanceType, Table,
};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tokio::runtime::Runtime;
use tracing::{debug, trace};

/// Metadata columns projected out of the payload, in schema order.
const METADATA_COLUMNS: [&str; 6] = ["content", "source", "page", "section", "doc_type", "case_type"];

/// LanceDB-backed vector store.
pub struct LanceDbVectorIndex {
    path: PathBuf,
    dimension: usize,
    metric: VectorMetric,
    connection: Connection,
    /// Lazily opened table handle.
    table: RwLock<Option<Table>>,
    runtime: Runtime,
}

impl LanceDbVectorIndex {
    /// Open or create a LanceDB store at `config.path`.
    pub fn open(config: &VectorIndexConfig) -> DbResult<Self> {
        debug!("Opening LanceDbVectorIndex at {:?}", config.path);

        let runtime = Runtime::new()
            .map_err(|e| DbError::internal(format!("Failed to create runtime: {}", e)))?;

        let connection = runtime
            .block_on(async {
                connect(config.path.to_string_lossy().as_ref())
                    .execute()
                    .await
            })
            .map_err(|e| DbError::LanceDb {
                message: format!("Failed to connect: {}", e),
            })?;

        let index = Self {
            path: config.path.clone(),
            dimension: config.dimension,
            metric: config.metric,
            connection,
            table: RwLock::new(None),
            runtime,
        };
        index.ensure_table()?;

        Ok(index)
    }

    fn ensure_table(&self) -> DbResult<()> {
        let mut table_guard = self
            .table
            .write()
            .map_err(|e| DbError::internal(format!("Failed to acquire table lock: {}", e)))?;

        if table_guard.is_some() {
            return Ok(());
        }

        let table_names = self
            .runtime
            .block_on(async { self.connection.table_names().execute().await })?;

        let table = if table_names.iter().any(|n| n == LANCEDB_TABLE_NAME) {
            debug!("Opening existing table '{}'", LANCEDB_TABLE_NAME);
            self.runtime.block_on(async {
                self.connection
                    .open_table(LANCEDB_TABLE_NAME)
                    .execute()
                    .await
            })?
        } else {
            debug!("Creating table '{}'", LANCEDB_TABLE_NAME);
            let batch = self.build_batch(&[])?;
            let schema = batch.schema();
            let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);
            self.runtime.block_on(async {
                self.connection
                    .create_table(LANCEDB_TABLE_NAME, Box::new(batches))
                    .execute()
                    .await
            })?
        };

        *table_guard = Some(table);
        Ok(())
    }

    fn get_table(&self) -> DbResult<Table> {
        self.ensure_table()?;

        let guard = self
            .table
            .read()
            .map_err(|e| DbError::internal(format!("Failed to acquire table lock: {}", e)))?;

        guard
            .clone()
            .ok_or_else(|| DbError::internal("Table not initialized"))
    }

    fn schema(&self) -> Schema {
        let mut fields = vec![
            Field::new("chunk_id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.dimension as i32,
                ),
                false,
            ),
        ];
        fields.extend(
            METADATA_COLUMNS
                .iter()
                .map(|name| Field::new(*name, DataType::Utf8, true)),
        );
        fields.push(Field::new("payload", DataType::Utf8, true));
        Schema::new(fields)
    }

    /// Build a record batch for `inserts`. An empty slice yields the empty
    /// batch used to create the table.
    fn build_batch(&self, inserts: &[VectorInsert]) -> DbResult<RecordBatch> {
        let ids: ArrayRef = Arc::new(StringArray::from(
            inserts.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(),
        ));

        let flat_vectors: Vec<f32> = inserts.iter().flat_map(|i| i.vector.iter().copied()).collect();
        let vector_array = FixedSizeListArray::try_new_from_values(
            Float32Array::from(flat_vectors),
            self.dimension as i32,
        )
        .map_err(|e| DbError::internal(format!("Failed to create vector array: {}", e)))?;

        let mut columns: Vec<ArrayRef> = vec![ids, Arc::new(vector_array)];
        for name in METADATA_COLUMNS {
            columns.push(Arc::new(StringArray::from(
                inserts
                    .iter()
                    .map(|i| payload_field(&i.payload, name))
                    .collect::<Vec<Option<String>>>(),
            )));
        }
        columns.push(Arc::new(StringArray::from(
            inserts
                .iter()
                .map(|i| serde_json::to_string(&i.payload).ok())
                .collect::<Vec<_>>(),
        )));

        RecordBatch::try_new(Arc::new(self.schema()), columns)
            .map_err(|e| DbError::internal(format!("Failed to create batch: {}", e)))
    }

    fn distance_type(&self) -> DistanceType {
        match self.metric {
            VectorMetric::Cosine => DistanceType::Cosine,
            VectorMetric::Dot => DistanceType::Dot,
            VectorMetric::L2 => DistanceType::L2,
        }
    }

    /// Map a LanceDB `_distance` to a higher-is-better score.
    fn distance_to_score(&self, distance: f32) -> f32 {
        match self.metric {
            VectorMetric::Cosine | VectorMetric::Dot => 1.0 - distance,
            VectorMetric::L2 => -distance,
        }
    }

    fn refresh_meta(&self) -> DbResult<()> {
        let count = self.len()?;
        let mut meta = load_index_meta(&self.path)
            .unwrap_or_else(|_| VectorIndexMeta::new("lancedb", self.dimension, self.metric));
        meta.update_count(count);
        write_index_meta(&self.path, &meta)
    }
}

/// Read a payload field as a string. Numbers (e.g. page) are stringified.
fn payload_field(payload: &serde_json::Value, key: &str) -> Option<String> {
    match payload.get(key)? {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Build a `chunk_id IN (...)` predicate with quotes escaped.
fn id_filter(ids: impl Iterator<Item = impl AsRef<str>>) -> String {
    let list = ids
        .map(|id| format!("'{}'", id.as_ref().replace('\'', "''")))
        .collect::<Vec<_>>()
        .join(", ");
    format!("chunk_id IN ({})", list)
}

impl VectorIndexBackend for LanceDbVectorIndex {
    fn query(&self, embedding: &[f32], limit: usize) -> DbResult<Vec<VectorSearchResult>> {
        trace!("Querying LanceDbVectorIndex, limit={}", limit);

        if embedding.len() != self.dimension {
            return Err(DbError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }

        let table = self.get_table()?;

        self.runtime.block_on(async {
            let results = table
                .vector_search(embedding.to_vec())?
                .distance_type(self.distance_type())
                .limit(limit)
                .execute()
                .await?;

            let batches: Vec<RecordBatch> = results.try_collect().await?;

            let mut hits = Vec::new();
            for batch in batches {
                let ids = batch
                    .column_by_name("chunk_id")
                    .and_then(|c| c.as_any().downcast_ref::<StringArray>());
                let payloads = batch
                    .column_by_name("payload")
                    .and_then(|c| c.as_any().downcast_ref::<StringArray>());
                let distances = batch
                    .column_by_name("_distance")
                    .and_then(|c| c.as_any().downcast_ref::<Float32Array>());

                let (Some(ids), Some(payloads), Some(distances)) = (ids, payloads, distances)
                else {
                    continue;
                };

                for row in 0..batch.num_rows() {
                    let payload = if payloads.is_null(row) {
                        serde_json::json!({})
                    } else {
                        serde_json::from_str(payloads.value(row))
                            .unwrap_or_else(|_| serde_json::json!({}))
                    };
                    hits.push(VectorSearchResult::new(
                        ids.value(row),
                        self.distance_to_score(distances.value(row)),
                        payload,
                    ));
                }
            }

            Ok(hits)
        })
    }

    fn upsert(&self, vectors: &[VectorInsert]) -> DbResult<()> {
        if vectors.is_empty() {
            return Ok(());
        }

        debug!("Upserting {} vectors", vectors.len());

        for insert in vectors {
            if insert.vector.len() != self.dimension {
                return Err(DbError::DimensionMismatch {
                    expected: self.dimension,
                    actual: insert.vector.len(),
                });
            }
        }

        let table = self.get_table()?;
        let delete_filter = id_filter(vectors.iter().map(|v| v.id.as_str()));
        let batch = self.build_batch(vectors)?;

        self.runtime.block_on(async {
            if let Err(e) = table.delete(&delete_filter).await {
                debug!("Delete before upsert returned error (may be ok): {}", e);
            }

            let schema = batch.schema();
            let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);
            table.add(Box::new(batches)).execute().await?;
            Ok::<_, DbError>(())
        })?;

        self.refresh_meta()
    }

    fn delete(&self, ids: &[VectorId]) -> DbResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        debug!("Deleting {} vectors", ids.len());

        let table = self.get_table()?;
        let filter = id_filter(ids.iter().map(|id| id.as_str()));
        self.runtime.block_on(async { table.delete(&filter).await })?;

        self.refresh_meta()
    }

    fn clear(&self) -> DbResult<()> {
        debug!("Clearing LanceDB table '{}'", LANCEDB_TABLE_NAME);

        let table = self.get_table()?;
        self.runtime
            .block_on(async { table.delete("chunk_id IS NOT NULL").await })?;

        self.refresh_meta()
    }

    fn flush(&self) -> DbResult<()> {
        // LanceDB commits each write.
        Ok(())
    }

    fn len(&self) -> DbResult<usize> {
        let table = self.get_table()?;
        Ok(self.runtime.block_on(async { table.count_rows(None).await })?)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn metric(&self) -> VectorMetric {
        self.metric
    }

    fn backend_name(&self) -> &'static str {
        "lancedb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_filter_escapes_quotes() {
        let filter = id_filter(["a1_0_ff", "o'neil"].iter());
        assert_eq!(filter, "chunk_id IN ('a1_0_ff', 'o''neil')");
    }

    #[test]
    fn test_payload_field_stringifies_numbers() {
        let payload = serde_json::json!({"page": 4, "source": "uu_8_1981.txt", "section": null});
        assert_eq!(payload_field(&payload, "page").as_deref(), Some("4"));
        assert_eq!(payload_field(&payload, "source").as_deref(), Some("uu_8_1981.txt"));
        assert_eq!(payload_field(&payload, "section"), None);
        assert_eq!(payload_field(&payload, "case_type"), None);
    }

    #[test]
    fn test_upsert_query_clear() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = VectorIndexConfig::new(3, dir.path()).with_backend("lancedb");
        let index = LanceDbVectorIndex::open(&config).unwrap();

        index
            .upsert(&[
                VectorInsert::new(
                    "c_near",
                    vec![1.0, 0.0, 0.0],
                    serde_json::json!({"source": "a.txt", "content": "pasal 1"}),
                ),
                VectorInsert::new("c_far", vec![0.0, 1.0, 0.0], serde_json::json!({"source": "b.txt"})),
            ])
            .unwrap();
        assert_eq!(index.len().unwrap(), 2);

        let hits = index.query(&[1.0, 0.0, 0.0], 1).unwrap();
        assert_eq!(hits[0].id.as_str(), "c_near");
        assert_eq!(hits[0].payload["source"], "a.txt");

        index.clear().unwrap();
        assert_eq!(index.len().unwrap(), 0);
    }
}
