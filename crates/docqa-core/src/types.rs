//! Domain types shared by the chunker, the vector index and the retriever.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type ChunkId = String;
pub type DocumentId = String;

/// Fixed relevance given to chunks pulled in only because their page
/// neighbors a direct hit. Below any confident direct match, above zero.
pub const ADJACENT_RELEVANCE: f32 = 0.5;

/// Raw text of one source page, as produced by the ingestion source.
/// `page_number` starts at 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageText {
    pub page_number: u32,
    pub text: String,
}

impl PageText {
    pub fn new(page_number: u32, text: impl Into<String>) -> Self {
        Self { page_number, text: text.into() }
    }
}

/// A window of text cut from exactly one page of a document.
///
/// - `chunk_id`: `{document_id}_chunk_{sequence_index}`
/// - `sequence_index`: position among all chunks of the document, 0-based
/// - `page_local_index`: position among the windows of `page_number`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: ChunkId,
    pub document_id: DocumentId,
    pub filename: String,
    pub sequence_index: usize,
    pub page_number: u32,
    pub page_local_index: usize,
    pub text: String,
}

impl Chunk {
    pub fn make_id(document_id: &str, sequence_index: usize) -> ChunkId {
        format!("{document_id}_chunk_{sequence_index}")
    }

    pub fn metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            document_id: self.document_id.clone(),
            source: self.filename.clone(),
            page_number: self.page_number,
            sequence_index: self.sequence_index,
            page_local_index: self.page_local_index,
        }
    }

    pub fn to_entry(&self) -> IndexEntry {
        IndexEntry { id: self.chunk_id.clone(), text: self.text.clone(), metadata: self.metadata() }
    }
}

/// Filterable fields stored next to every vector. `source` is the filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub document_id: DocumentId,
    pub source: String,
    pub page_number: u32,
    pub sequence_index: usize,
    pub page_local_index: usize,
}

/// The persisted form of a chunk inside the vector index (minus the vector).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: ChunkId,
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl From<&Chunk> for IndexEntry {
    fn from(chunk: &Chunk) -> Self {
        chunk.to_entry()
    }
}

/// A nearest-neighbor hit. `distance` is the cosine distance, lower is closer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredEntry {
    pub entry: IndexEntry,
    pub distance: f32,
}

/// Exact-match predicate over chunk metadata. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkFilter {
    pub document_id: Option<DocumentId>,
    pub source: Option<String>,
    pub page_number: Option<u32>,
}

impl ChunkFilter {
    pub fn page(page_number: u32) -> Self {
        Self { page_number: Some(page_number), ..Self::default() }
    }

    pub fn source(filename: impl Into<String>) -> Self {
        Self { source: Some(filename.into()), ..Self::default() }
    }

    pub fn document(document_id: impl Into<String>) -> Self {
        Self { document_id: Some(document_id.into()), ..Self::default() }
    }

    pub fn is_empty(&self) -> bool {
        self.document_id.is_none() && self.source.is_none() && self.page_number.is_none()
    }

    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        self.document_id.as_ref().map_or(true, |d| *d == metadata.document_id)
            && self.source.as_ref().map_or(true, |s| *s == metadata.source)
            && self.page_number.map_or(true, |p| p == metadata.page_number)
    }
}

/// How `upsert` treats ids that already exist in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpsertMode {
    /// Fail the whole call if any id is already present.
    #[default]
    RejectDuplicates,
    /// Last write wins.
    Overwrite,
}

/// Why a result is part of the answer context.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Direct,
    Adjacent,
}

impl Origin {
    /// Rank used for the final page ordering: direct before adjacent.
    pub fn rank(self) -> u8 {
        match self {
            Origin::Direct => 0,
            Origin::Adjacent => 1,
        }
    }
}

/// One retrieval result. Created per query, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub document_name: String,
    pub page_number: u32,
    pub text: String,
    pub relevance_score: f32,
    pub origin: Origin,
}

impl SearchResult {
    pub fn direct(hit: ScoredEntry) -> Self {
        Self {
            document_name: hit.entry.metadata.source,
            page_number: hit.entry.metadata.page_number,
            text: hit.entry.text,
            relevance_score: similarity_from_distance(hit.distance),
            origin: Origin::Direct,
        }
    }

    pub fn adjacent(entry: IndexEntry) -> Self {
        Self {
            document_name: entry.metadata.source,
            page_number: entry.metadata.page_number,
            text: entry.text,
            relevance_score: ADJACENT_RELEVANCE,
            origin: Origin::Adjacent,
        }
    }
}

/// `1 - d` clamped to [0, 1]. NaN distances count as no similarity.
pub fn similarity_from_distance(distance: f32) -> f32 {
    let similarity = 1.0 - distance;
    if similarity.is_nan() {
        return 0.0;
    }
    similarity.clamp(0.0, 1.0)
}

/// Registry entry for an indexed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: DocumentId,
    pub filename: String,
    pub upload_timestamp: DateTime<Utc>,
    pub page_count: usize,
    pub chunk_count: usize,
}
