//! Page-aware sliding-window chunking.
//!
//! Every page is normalized and windowed on its own, so a chunk never mixes
//! characters from two pages. Windows are measured in `char`s, not bytes.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{Chunk, PageText};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub window_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { window_size: 1000, overlap: 200 }
    }
}

impl ChunkingConfig {
    pub fn new(window_size: usize, overlap: usize) -> Result<Self> {
        let config = Self { window_size, overlap };
        config.validate()?;
        Ok(config)
    }

    /// `window_size > overlap` keeps the window advancing.
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 || self.window_size <= self.overlap {
            return Err(Error::InvalidConfig(format!(
                "window_size ({}) must be greater than overlap ({})",
                self.window_size, self.overlap
            )));
        }
        Ok(())
    }

    pub fn step(&self) -> usize {
        self.window_size - self.overlap
    }
}

#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> ChunkingConfig {
        self.config
    }

    /// Cut `pages` into chunks in page order. Pages that are blank after
    /// normalization produce nothing and do not consume sequence numbers.
    pub fn chunk(&self, document_id: &str, filename: &str, pages: &[PageText]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut sequence_index = 0usize;
        for page in pages {
            let normalized = normalize_whitespace(&page.text);
            if normalized.is_empty() {
                debug!(document_id, page = page.page_number, "skipping blank page");
                continue;
            }
            for (page_local_index, text) in sliding_windows(&normalized, self.config).into_iter().enumerate() {
                chunks.push(Chunk {
                    chunk_id: Chunk::make_id(document_id, sequence_index),
                    document_id: document_id.to_string(),
                    filename: filename.to_string(),
                    sequence_index,
                    page_number: page.page_number,
                    page_local_index,
                    text,
                });
                sequence_index += 1;
            }
        }
        debug!(document_id, pages = pages.len(), chunks = chunks.len(), "chunked document");
        chunks
    }
}

/// Validate the window parameters and chunk `pages` in one call.
pub fn chunk_pages(
    document_id: &str,
    filename: &str,
    pages: &[PageText],
    window_size: usize,
    overlap: usize,
) -> Result<Vec<Chunk>> {
    let chunker = Chunker::new(ChunkingConfig { window_size, overlap })?;
    Ok(chunker.chunk(document_id, filename, pages))
}

/// Collapse every whitespace run (including `\r\n` and `\n`) into a single
/// space and trim both ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Windows of `window_size` chars whose starts are `window_size - overlap`
/// apart. Stops at the first window that reaches the end of `text`.
pub fn sliding_windows(text: &str, config: ChunkingConfig) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut windows = Vec::new();
    let step = config.step();
    let mut start = 0usize;
    while start < chars.len() {
        let end = (start + config.window_size).min(chars.len());
        windows.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    windows
}

/// Number of windows `sliding_windows` yields for a text of `len` chars.
pub fn expected_window_count(len: usize, config: ChunkingConfig) -> usize {
    if len == 0 {
        return 0;
    }
    len.saturating_sub(config.overlap).div_ceil(config.step()).max(1)
}
