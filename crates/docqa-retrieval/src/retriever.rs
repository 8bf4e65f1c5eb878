//! Query-time retrieval: nearest neighbors widened to the pages around them.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use docqa_core::config::RetrievalSettings;
use docqa_core::traits::{Embedder, VectorStore};
use docqa_core::types::{ChunkFilter, SearchResult};
use docqa_core::{Error, Result};

/// An adjacency page whose fetch failed and was left out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedPage {
    pub page_number: u32,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchOutcome {
    pub results: Vec<SearchResult>,
    pub skipped_pages: Vec<SkippedPage>,
}

impl SearchOutcome {
    pub fn is_degraded(&self) -> bool {
        !self.skipped_pages.is_empty()
    }
}

pub struct Retriever<S: VectorStore + ?Sized> {
    store: Arc<S>,
    embedder: Arc<dyn Embedder>,
    settings: RetrievalSettings,
}

impl<S: VectorStore + ?Sized> Retriever<S> {
    pub fn new(store: Arc<S>, embedder: Arc<dyn Embedder>, settings: RetrievalSettings) -> Self {
        Self { store, embedder, settings }
    }

    pub fn settings(&self) -> &RetrievalSettings {
        &self.settings
    }

    /// `None` falls back to the configured default.
    pub fn resolve_top_k(&self, top_k: Option<usize>) -> Result<usize> {
        let k = top_k.unwrap_or(self.settings.default_top_k);
        if k == 0 || k > self.settings.max_top_k {
            return Err(Error::validation(format!("top_k must be within 1..={}, got {k}", self.settings.max_top_k)));
        }
        Ok(k)
    }

    /// Embed on the blocking pool; model inference is CPU bound.
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let embedder = Arc::clone(&self.embedder);
        let text = text.to_string();
        tokio::task::spawn_blocking(move || embedder.embed_one(&text))
            .await
            .map_err(Error::embedding)?
            .map_err(Error::embedding)
    }

    pub async fn search(&self, query: &str, top_k: Option<usize>, include_adjacent: bool) -> Result<Vec<SearchResult>> {
        Ok(self.search_detailed(query, top_k, include_adjacent).await?.results)
    }

    pub async fn search_detailed(&self, query: &str, top_k: Option<usize>, include_adjacent: bool) -> Result<SearchOutcome> {
        let top_k = self.resolve_top_k(top_k)?;
        let vector = self.embed_query(query).await?;
        let hits = self.store.query(&vector, top_k).await?;
        if hits.is_empty() {
            debug!("no direct hits");
            return Ok(SearchOutcome::default());
        }

        let mut results: Vec<SearchResult> = hits.into_iter().map(SearchResult::direct).collect();
        let direct_count = results.len();
        let mut skipped_pages = Vec::new();

        if include_adjacent {
            for page in adjacent_pages(&results) {
                match self.store.fetch_by_filter(&ChunkFilter::page(page)).await {
                    Ok(mut entries) => {
                        entries.sort_by(|a, b| {
                            (&a.metadata.source, a.metadata.sequence_index).cmp(&(&b.metadata.source, b.metadata.sequence_index))
                        });
                        results.extend(entries.into_iter().map(SearchResult::adjacent));
                    }
                    Err(e) => {
                        warn!(page, error = %e, "adjacent page fetch failed, skipping");
                        skipped_pages.push(SkippedPage { page_number: page, reason: e.to_string() });
                    }
                }
            }
            if results.len() > top_k {
                rank_and_truncate(&mut results, top_k);
            }
        }
        order_by_page(&mut results);

        debug!(direct = direct_count, total = results.len(), skipped = skipped_pages.len(), "search done");
        Ok(SearchOutcome { results, skipped_pages })
    }
}

/// Neighbors of every page with a direct result, excluding those pages
/// themselves and anything below page 1. Ascending.
pub fn adjacent_pages(direct: &[SearchResult]) -> Vec<u32> {
    let direct_pages: BTreeSet<u32> = direct.iter().map(|r| r.page_number).collect();
    direct_pages
        .iter()
        .flat_map(|&p| [p.checked_sub(1), p.checked_add(1)])
        .flatten()
        .filter(|p| *p >= 1 && !direct_pages.contains(p))
        .collect::<BTreeSet<u32>>()
        .into_iter()
        .collect()
}

/// Highest score first, ties in encounter order, then cut to `top_k`.
pub fn rank_and_truncate(results: &mut Vec<SearchResult>, top_k: usize) {
    results.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
    results.truncate(top_k);
}

/// Ascending page, direct before adjacent on the same page.
pub fn order_by_page(results: &mut [SearchResult]) {
    results.sort_by_key(|r| (r.page_number, r.origin.rank()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_core::types::Origin;

    fn result(page: u32, score: f32, origin: Origin) -> SearchResult {
        SearchResult {
            document_name: "doc.pdf".into(),
            page_number: page,
            text: format!("p{page}"),
            relevance_score: score,
            origin,
        }
    }

    #[test]
    fn neighbors_skip_direct_pages_and_page_zero() {
        let direct = vec![result(5, 0.9, Origin::Direct), result(8, 0.8, Origin::Direct), result(1, 0.7, Origin::Direct)];
        assert_eq!(adjacent_pages(&direct), vec![2, 4, 6, 7, 9]);
        let consecutive = vec![result(3, 0.9, Origin::Direct), result(4, 0.9, Origin::Direct)];
        assert_eq!(adjacent_pages(&consecutive), vec![2, 5]);
    }

    #[test]
    fn truncation_keeps_highest_scores_and_encounter_order_on_ties() {
        let mut rs = vec![
            result(5, 0.5, Origin::Direct),
            result(8, 0.9, Origin::Direct),
            result(4, 0.5, Origin::Adjacent),
            result(6, 0.5, Origin::Adjacent),
        ];
        rank_and_truncate(&mut rs, 3);
        let pages: Vec<u32> = rs.iter().map(|r| r.page_number).collect();
        assert_eq!(pages, vec![8, 5, 4]);
    }

    #[test]
    fn direct_sorts_before_adjacent_on_same_page() {
        let mut rs = vec![
            result(3, 0.5, Origin::Adjacent),
            result(2, 0.7, Origin::Direct),
            result(3, 0.6, Origin::Direct),
        ];
        order_by_page(&mut rs);
        let keys: Vec<(u32, Origin)> = rs.iter().map(|r| (r.page_number, r.origin)).collect();
        assert_eq!(keys, vec![(2, Origin::Direct), (3, Origin::Direct), (3, Origin::Adjacent)]);
    }
}
