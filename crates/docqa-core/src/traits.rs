use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChunkFilter, DocumentRecord, IndexEntry, ScoredEntry, UpsertMode};

/// Maps text to dense vectors of a fixed dimension.
///
/// Implementations must be deterministic for a given model version and must
/// return vectors of `dim()` floats for every input.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed_one(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

/// Similarity-searchable chunk store, keyed by cosine distance.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert `entries[i]` with `vectors[i]`. One commit per call.
    ///
    /// In reject mode an id that is already stored, or repeated in the batch,
    /// fails the whole call. Implementations must make that check and the
    /// insert atomic with respect to other calls on the same store.
    async fn upsert(&self, entries: &[IndexEntry], vectors: &[Vec<f32>], mode: UpsertMode) -> Result<()>;

    /// Up to `k` entries ordered by ascending cosine distance.
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredEntry>>;

    /// Every entry whose metadata matches `filter`, in no particular order.
    async fn fetch_by_filter(&self, filter: &ChunkFilter) -> Result<Vec<IndexEntry>>;

    /// Returns the number of removed entries.
    async fn delete_by_filter(&self, filter: &ChunkFilter) -> Result<usize>;

    async fn count(&self) -> Result<usize>;
}

/// Keyed store of document records.
pub trait DocumentStore: Send + Sync {
    fn get(&self, id: &str) -> Result<Option<DocumentRecord>>;
    fn put(&self, record: DocumentRecord) -> Result<()>;
    /// Returns the removed record, if there was one.
    fn remove(&self, id: &str) -> Result<Option<DocumentRecord>>;
    /// Newest upload first.
    fn list(&self) -> Result<Vec<DocumentRecord>>;
}
