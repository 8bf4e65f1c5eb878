#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use docqa_core::config::RetrievalSettings;
use docqa_core::traits::{Embedder, VectorStore};
use docqa_core::types::{ChunkFilter, ChunkMetadata, IndexEntry, ScoredEntry, UpsertMode};
use docqa_core::{Error, Result};
use docqa_embed::FakeEmbedder;
use docqa_retrieval::Retriever;

pub const DIM: usize = 32;

/// In-memory `VectorStore` with failure injection and scriptable hits.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<(IndexEntry, Vec<f32>)>>,
    scripted: Mutex<Option<Vec<(String, f32)>>>,
    failing_pages: Mutex<HashSet<u32>>,
    fail_query: AtomicBool,
    fetched_pages: Mutex<Vec<u32>>,
}

impl MemoryStore {
    pub fn insert(&self, entry: IndexEntry) {
        self.rows.lock().unwrap().push((entry, vec![0.0; DIM]));
    }

    /// Make `query` return these ids at these distances, ignoring the vector.
    pub fn script_hits(&self, hits: &[(&str, f32)]) {
        *self.scripted.lock().unwrap() = Some(hits.iter().map(|(id, d)| (id.to_string(), *d)).collect());
    }

    pub fn fail_page(&self, page: u32) {
        self.failing_pages.lock().unwrap().insert(page);
    }

    pub fn fail_queries(&self) {
        self.fail_query.store(true, Ordering::SeqCst);
    }

    pub fn fetched_pages(&self) -> Vec<u32> {
        self.fetched_pages.lock().unwrap().clone()
    }
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 { 1.0 } else { 1.0 - dot / (na * nb) }
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn upsert(&self, entries: &[IndexEntry], vectors: &[Vec<f32>], mode: UpsertMode) -> Result<()> {
        if entries.len() != vectors.len() || vectors.iter().any(|v| v.len() != DIM) {
            return Err(Error::validation("shape mismatch"));
        }
        let mut rows = self.rows.lock().unwrap();
        if mode == UpsertMode::RejectDuplicates {
            let mut ids: HashSet<&str> = rows.iter().map(|(e, _)| e.id.as_str()).collect();
            for e in entries {
                if !ids.insert(e.id.as_str()) {
                    return Err(Error::validation(format!("duplicate id {}", e.id)));
                }
            }
        }
        for (e, v) in entries.iter().zip(vectors) {
            rows.retain(|(existing, _)| existing.id != e.id);
            rows.push((e.clone(), v.clone()));
        }
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredEntry>> {
        if self.fail_query.load(Ordering::SeqCst) {
            return Err(Error::index("store offline"));
        }
        let rows = self.rows.lock().unwrap();
        let mut hits: Vec<ScoredEntry> = match &*self.scripted.lock().unwrap() {
            Some(script) => script
                .iter()
                .filter_map(|(id, d)| {
                    rows.iter().find(|(e, _)| &e.id == id).map(|(e, _)| ScoredEntry { entry: e.clone(), distance: *d })
                })
                .collect(),
            None => {
                let mut all: Vec<ScoredEntry> = rows
                    .iter()
                    .map(|(e, v)| ScoredEntry { entry: e.clone(), distance: cosine_distance(vector, v) })
                    .collect();
                all.sort_by(|a, b| a.distance.total_cmp(&b.distance));
                all
            }
        };
        hits.truncate(k);
        Ok(hits)
    }

    async fn fetch_by_filter(&self, filter: &ChunkFilter) -> Result<Vec<IndexEntry>> {
        if let Some(page) = filter.page_number {
            self.fetched_pages.lock().unwrap().push(page);
            if self.failing_pages.lock().unwrap().contains(&page) {
                return Err(Error::index(format!("page {page} unreadable")));
            }
        }
        let rows = self.rows.lock().unwrap();
        Ok(rows.iter().filter(|(e, _)| filter.matches(&e.metadata)).map(|(e, _)| e.clone()).collect())
    }

    async fn delete_by_filter(&self, filter: &ChunkFilter) -> Result<usize> {
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|(e, _)| !filter.matches(&e.metadata));
        Ok(before - rows.len())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.rows.lock().unwrap().len())
    }
}

pub fn entry(doc: &str, source: &str, seq: usize, page: u32) -> IndexEntry {
    IndexEntry {
        id: format!("{doc}_chunk_{seq}"),
        text: format!("{source} page {page} chunk {seq}"),
        metadata: ChunkMetadata {
            document_id: doc.into(),
            source: source.into(),
            page_number: page,
            sequence_index: seq,
            page_local_index: 0,
        },
    }
}

/// One chunk per page `1..=pages` of `guide.pdf`, ids `doc_g_chunk_{page - 1}`.
pub fn paged_store(pages: u32) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::default());
    for page in 1..=pages {
        store.insert(entry("doc_g", "guide.pdf", (page - 1) as usize, page));
    }
    store
}

pub fn fake_embedder() -> Arc<dyn Embedder> {
    Arc::new(FakeEmbedder::new(DIM))
}

pub fn retriever(store: Arc<MemoryStore>) -> Retriever<MemoryStore> {
    Retriever::new(store, fake_embedder(), RetrievalSettings::default())
}
