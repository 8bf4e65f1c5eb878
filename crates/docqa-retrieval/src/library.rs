//! Document lifecycle: index, look up, list and delete whole documents.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use docqa_core::chunker::Chunker;
use docqa_core::traits::{DocumentStore, Embedder, VectorStore};
use docqa_core::types::{Chunk, ChunkFilter, DocumentId, DocumentRecord, IndexEntry, PageText, UpsertMode};
use docqa_core::{Error, Result};

/// `doc_` followed by 12 hex chars.
pub fn new_document_id() -> DocumentId {
    let hex = Uuid::new_v4().simple().to_string();
    format!("doc_{}", &hex[..12])
}

pub struct DocumentLibrary<S: VectorStore + ?Sized, D: DocumentStore + ?Sized> {
    store: Arc<S>,
    registry: Arc<D>,
    embedder: Arc<dyn Embedder>,
    chunker: Chunker,
    batch_size: usize,
}

impl<S: VectorStore + ?Sized, D: DocumentStore + ?Sized> DocumentLibrary<S, D> {
    pub fn new(store: Arc<S>, registry: Arc<D>, embedder: Arc<dyn Embedder>, chunker: Chunker) -> Self {
        Self { store, registry, embedder, chunker, batch_size: 32 }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Write pre-embedded chunks and record the document.
    pub async fn index_document(
        &self,
        document_id: &str,
        filename: &str,
        page_count: usize,
        chunks: &[Chunk],
        vectors: &[Vec<f32>],
    ) -> Result<DocumentRecord> {
        if chunks.is_empty() {
            return Err(Error::validation(format!("document '{filename}' produced no chunks")));
        }
        let entries: Vec<IndexEntry> = chunks.iter().map(IndexEntry::from).collect();
        self.store.upsert(&entries, vectors, UpsertMode::RejectDuplicates).await?;

        let record = DocumentRecord {
            id: document_id.to_string(),
            filename: filename.to_string(),
            upload_timestamp: Utc::now(),
            page_count,
            chunk_count: chunks.len(),
        };
        if let Err(e) = self.registry.put(record.clone()) {
            // Without a record the chunks could never be deleted.
            match self.store.delete_by_filter(&ChunkFilter::document(document_id)).await {
                Ok(removed) => warn!(document_id, removed, error = %e, "registry write failed; chunks rolled back"),
                Err(rollback) => {
                    warn!(document_id, error = %e, rollback_error = %rollback, "registry write failed; rollback failed")
                }
            }
            return Err(e);
        }
        info!(document_id, filename, page_count, chunks = chunks.len(), "document indexed");
        Ok(record)
    }

    /// Chunk, embed and index extracted pages.
    pub async fn ingest(&self, document_id: &str, filename: &str, pages: &[PageText]) -> Result<DocumentRecord> {
        let chunks = self.chunker.chunk(document_id, filename, pages);
        if chunks.is_empty() {
            return Err(Error::validation(format!("document '{filename}' has no extractable text")));
        }
        let vectors = self.embed_chunks(&chunks).await?;
        self.index_document(document_id, filename, pages.len(), &chunks, &vectors).await
    }

    async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embedder = Arc::clone(&self.embedder);
            let embedded = tokio::task::spawn_blocking(move || embedder.embed_batch(&texts))
                .await
                .map_err(Error::embedding)?
                .map_err(Error::embedding)?;
            if embedded.len() != batch.len() {
                return Err(Error::embedding(format!("asked for {} vectors, got {}", batch.len(), embedded.len())));
            }
            vectors.extend(embedded);
            debug!(done = vectors.len(), total = chunks.len(), "embedded batch");
        }
        Ok(vectors)
    }

    /// Remove the document's chunks (matched by filename) and its record.
    /// `false` when the id is unknown; the index is then left alone.
    pub async fn delete_document(&self, document_id: &str) -> Result<bool> {
        let Some(record) = self.registry.get(document_id)? else {
            debug!(document_id, "delete of unknown document");
            return Ok(false);
        };
        let removed = self.store.delete_by_filter(&ChunkFilter::source(record.filename.as_str())).await?;
        self.registry.remove(document_id)?;
        info!(document_id, filename = %record.filename, chunks = removed, "document deleted");
        Ok(true)
    }

    pub fn document(&self, document_id: &str) -> Result<DocumentRecord> {
        self.registry
            .get(document_id)?
            .ok_or_else(|| Error::NotFound(format!("document '{document_id}'")))
    }

    pub fn list(&self) -> Result<Vec<DocumentRecord>> {
        self.registry.list()
    }

    pub async fn chunk_count(&self) -> Result<usize> {
        self.store.count().await
    }
}
