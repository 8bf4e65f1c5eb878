use arrow_array::{RecordBatch, RecordBatchIterator};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use std::collections::HashSet;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use docqa_core::traits::VectorStore;
use docqa_core::types::{ChunkFilter, IndexEntry, ScoredEntry, UpsertMode};
use docqa_core::{Error, Result};

use crate::filter::{ids_in, to_predicate};
use crate::schema::{batch_distances, batch_to_entries, build_chunk_schema, entries_to_batch, vector_dim};
use crate::table::{ensure_table, get_meta, metric_key, open_db, set_meta};

pub const METRIC: &str = "cosine";
const WRITE_BATCH: usize = 1000;
const ID_PROBE_BATCH: usize = 500;

/// Chunk table in a local LanceDB directory, searched by cosine distance.
///
/// Writes through one store are serialized, so the duplicate-id check and the
/// insert it guards cannot interleave. Separate processes writing the same
/// directory get no such guarantee.
pub struct LanceVectorStore {
    conn: Connection,
    table: Table,
    dim: usize,
    width: i32,
    write_lock: Mutex<()>,
}

impl LanceVectorStore {
    /// Open or create `table_name` under `uri` for vectors of width `dim`.
    ///
    /// A table recorded under another metric (or none) is cleared before use.
    /// A table whose vector width differs from `dim` is refused.
    pub async fn open(uri: &str, table_name: &str, dim: usize) -> Result<Self> {
        let width = i32::try_from(dim)
            .ok()
            .filter(|d| *d > 0)
            .ok_or_else(|| Error::InvalidConfig(format!("unusable vector dimension {dim}")))?;
        let conn = open_db(uri).await.map_err(Error::index)?;
        let created = ensure_table(&conn, table_name, build_chunk_schema(width)).await.map_err(Error::index)?;
        let table = conn.open_table(table_name).execute().await.map_err(Error::index)?;

        if !created {
            let schema = table.schema().await.map_err(Error::index)?;
            match vector_dim(&schema) {
                Some(existing) if existing == dim => {}
                existing => {
                    return Err(Error::InvalidConfig(format!(
                        "table '{table_name}' holds vectors of width {existing:?}, embedder produces {dim}"
                    )))
                }
            }
        }

        let key = metric_key(table_name);
        let recorded = get_meta(&conn, &key).await.map_err(Error::index)?;
        if recorded.as_deref() != Some(METRIC) {
            let rows = table.count_rows(None).await.map_err(Error::index)?;
            if rows > 0 {
                warn!(table = table_name, recorded = ?recorded, rows, "distance metric mismatch, rebuilding table");
                table.delete("id IS NOT NULL").await.map_err(Error::index)?;
            }
            set_meta(&conn, &key, METRIC).await.map_err(Error::index)?;
        }

        info!(uri, table = table_name, dim, created, "vector store open");
        Ok(Self { conn, table, dim, width, write_lock: Mutex::new(()) })
    }

    /// Release the connection. LanceDB commits every write as it happens, so
    /// there is nothing to flush.
    pub async fn close(self) -> Result<()> {
        let tables = self.conn.table_names().execute().await.map_err(Error::index)?;
        debug!(table = self.table.name(), open_tables = tables.len(), "vector store closed");
        drop(self.table);
        Ok(())
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn table_name(&self) -> &str {
        self.table.name()
    }

    fn check_vector(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dim {
            return Err(Error::validation(format!(
                "vector has {} dimensions, index expects {}",
                vector.len(),
                self.dim
            )));
        }
        Ok(())
    }

    async fn reject_existing(&self, entries: &[IndexEntry]) -> Result<()> {
        let mut seen = HashSet::with_capacity(entries.len());
        for entry in entries {
            if !seen.insert(entry.id.as_str()) {
                return Err(Error::validation(format!("id '{}' appears twice in the batch", entry.id)));
            }
        }
        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        for probe in ids.chunks(ID_PROBE_BATCH) {
            let existing = self.table.count_rows(Some(ids_in(probe))).await.map_err(Error::index)?;
            if existing > 0 {
                return Err(Error::validation(format!("{existing} of the ids are already indexed")));
            }
        }
        Ok(())
    }

    async fn collect_entries(&self, predicate: Option<String>) -> Result<Vec<IndexEntry>> {
        let query = match predicate {
            Some(p) => self.table.query().only_if(p),
            None => self.table.query(),
        };
        let mut stream = query.execute().await.map_err(Error::index)?;
        let mut entries = Vec::new();
        while let Some(batch) = stream.try_next().await.map_err(Error::index)? {
            entries.extend(batch_to_entries(&batch)?);
        }
        Ok(entries)
    }
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    async fn upsert(&self, entries: &[IndexEntry], vectors: &[Vec<f32>], mode: UpsertMode) -> Result<()> {
        if entries.len() != vectors.len() {
            return Err(Error::validation(format!(
                "{} entries but {} vectors",
                entries.len(),
                vectors.len()
            )));
        }
        if entries.is_empty() {
            return Ok(());
        }
        for vector in vectors {
            self.check_vector(vector)?;
        }
        let _guard = self.write_lock.lock().await;
        if mode == UpsertMode::RejectDuplicates {
            self.reject_existing(entries).await?;
        }

        let width = self.width;
        let schema = build_chunk_schema(width);
        let batches: Vec<RecordBatch> = entries
            .chunks(WRITE_BATCH)
            .zip(vectors.chunks(WRITE_BATCH))
            .map(|(e, v)| entries_to_batch(e, v, schema.clone(), width))
            .collect::<std::result::Result<_, _>>()
            .map_err(Error::index)?;
        // one reader, one commit
        let reader = Box::new(RecordBatchIterator::new(batches.into_iter().map(Ok), schema));
        match mode {
            UpsertMode::RejectDuplicates => {
                self.table.add(reader).execute().await.map_err(Error::index)?;
            }
            UpsertMode::Overwrite => {
                let mut mi = self.table.merge_insert(&["id"]);
                mi.when_matched_update_all(None).when_not_matched_insert_all();
                let _ = mi.execute(reader).await.map_err(Error::index)?;
            }
        }
        debug!(table = self.table.name(), rows = entries.len(), ?mode, "upserted");
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredEntry>> {
        self.check_vector(vector)?;
        if k == 0 || self.count().await? == 0 {
            return Ok(Vec::new());
        }
        let mut stream = self
            .table
            .vector_search(vector.to_vec())
            .map_err(Error::index)?
            .distance_type(DistanceType::Cosine)
            .limit(k)
            .execute()
            .await
            .map_err(Error::index)?;
        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await.map_err(Error::index)? {
            let entries = batch_to_entries(&batch)?;
            let distances = batch_distances(&batch)?;
            hits.extend(entries.into_iter().zip(distances).map(|(entry, distance)| ScoredEntry { entry, distance }));
        }
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(k);
        Ok(hits)
    }

    async fn fetch_by_filter(&self, filter: &ChunkFilter) -> Result<Vec<IndexEntry>> {
        self.collect_entries(to_predicate(filter)).await
    }

    async fn delete_by_filter(&self, filter: &ChunkFilter) -> Result<usize> {
        let predicate = to_predicate(filter)
            .ok_or_else(|| Error::validation("refusing to delete with an empty filter"))?;
        let matching = self.table.count_rows(Some(predicate.clone())).await.map_err(Error::index)?;
        if matching == 0 {
            return Ok(0);
        }
        self.table.delete(&predicate).await.map_err(Error::index)?;
        debug!(table = self.table.name(), %predicate, removed = matching, "deleted");
        Ok(matching)
    }

    async fn count(&self) -> Result<usize> {
        self.table.count_rows(None).await.map_err(Error::index)
    }
}
