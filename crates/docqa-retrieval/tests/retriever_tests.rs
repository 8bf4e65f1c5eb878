mod common;

use std::sync::Arc;

use common::{paged_store, retriever, MemoryStore};
use docqa_core::types::{Origin, ADJACENT_RELEVANCE};
use docqa_core::Error;

#[tokio::test]
async fn empty_index_returns_nothing() {
    let r = retriever(Arc::new(MemoryStore::default()));
    let outcome = r.search_detailed("anything", None, true).await.expect("search");
    assert!(outcome.results.is_empty());
    assert!(!outcome.is_degraded());
}

#[tokio::test]
async fn direct_hits_pull_in_neighboring_pages() {
    let store = paged_store(12);
    store.script_hits(&[("doc_g_chunk_4", 0.1), ("doc_g_chunk_7", 0.2)]);
    let r = retriever(store.clone());

    let results = r.search("sql injection", Some(10), true).await.expect("search");
    let summary: Vec<(u32, Origin)> = results.iter().map(|r| (r.page_number, r.origin)).collect();
    assert_eq!(
        summary,
        vec![
            (4, Origin::Adjacent),
            (5, Origin::Direct),
            (6, Origin::Adjacent),
            (7, Origin::Adjacent),
            (8, Origin::Direct),
            (9, Origin::Adjacent),
        ]
    );
    for r in results.iter().filter(|r| r.origin == Origin::Adjacent) {
        assert_eq!(r.relevance_score, ADJACENT_RELEVANCE);
    }
    assert!((results[1].relevance_score - 0.9).abs() < 1e-6);
    assert_eq!(store.fetched_pages(), vec![4, 6, 7, 9]);
}

#[tokio::test]
async fn combined_set_is_cut_to_top_k_by_score() {
    let store = paged_store(12);
    store.script_hits(&[("doc_g_chunk_4", 0.1), ("doc_g_chunk_7", 0.3)]);
    let r = retriever(store);

    let results = r.search("q", Some(3), true).await.expect("search");
    assert_eq!(results.len(), 3);
    let summary: Vec<(u32, Origin)> = results.iter().map(|r| (r.page_number, r.origin)).collect();
    // both directs outrank 0.5; the first adjacent encountered (page 4) wins the tie
    assert_eq!(summary, vec![(4, Origin::Adjacent), (5, Origin::Direct), (8, Origin::Direct)]);
}

#[tokio::test]
async fn weak_direct_hits_can_be_displaced_by_adjacency() {
    let store = paged_store(12);
    store.script_hits(&[("doc_g_chunk_4", 0.1), ("doc_g_chunk_9", 0.8)]);
    let r = retriever(store);

    let results = r.search("q", Some(2), true).await.expect("search");
    let summary: Vec<(u32, Origin)> = results.iter().map(|r| (r.page_number, r.origin)).collect();
    assert_eq!(summary, vec![(4, Origin::Adjacent), (5, Origin::Direct)]);
}

#[tokio::test]
async fn without_adjacency_only_direct_hits_return() {
    let store = paged_store(12);
    store.script_hits(&[("doc_g_chunk_7", 0.2), ("doc_g_chunk_4", 0.1)]);
    let r = retriever(store.clone());

    let results = r.search("q", Some(5), false).await.expect("search");
    assert!(results.iter().all(|r| r.origin == Origin::Direct));
    let pages: Vec<u32> = results.iter().map(|r| r.page_number).collect();
    assert_eq!(pages, vec![5, 8]);
    assert!(store.fetched_pages().is_empty());
}

#[tokio::test]
async fn first_page_has_no_page_zero_neighbor() {
    let store = paged_store(3);
    store.script_hits(&[("doc_g_chunk_0", 0.0)]);
    let r = retriever(store.clone());
    let results = r.search("q", Some(5), true).await.expect("search");
    let pages: Vec<u32> = results.iter().map(|r| r.page_number).collect();
    assert_eq!(pages, vec![1, 2]);
    assert_eq!(store.fetched_pages(), vec![2]);
}

#[tokio::test]
async fn failed_adjacent_fetch_is_skipped_and_reported() {
    let store = paged_store(12);
    store.script_hits(&[("doc_g_chunk_4", 0.1)]);
    store.fail_page(6);
    let r = retriever(store);

    let outcome = r.search_detailed("q", Some(10), true).await.expect("search");
    let pages: Vec<u32> = outcome.results.iter().map(|r| r.page_number).collect();
    assert_eq!(pages, vec![4, 5]);
    assert!(outcome.is_degraded());
    assert_eq!(outcome.skipped_pages.len(), 1);
    assert_eq!(outcome.skipped_pages[0].page_number, 6);
    assert!(outcome.skipped_pages[0].reason.contains("page 6"));
}

#[tokio::test]
async fn primary_query_failure_propagates() {
    let store = paged_store(3);
    store.fail_queries();
    let r = retriever(store);
    let err = r.search("q", None, true).await.unwrap_err();
    assert!(err.is_index_unavailable(), "got {err:?}");
}

#[tokio::test]
async fn top_k_is_bounded() {
    let r = retriever(paged_store(3));
    assert!(matches!(r.search("q", Some(0), true).await, Err(Error::Validation(_))));
    assert!(matches!(r.search("q", Some(21), true).await, Err(Error::Validation(_))));
    assert_eq!(r.resolve_top_k(None).expect("default"), 10);
    assert_eq!(r.resolve_top_k(Some(20)).expect("max"), 20);
}

#[tokio::test]
async fn adjacency_spans_documents_sharing_a_page_number() {
    let store = paged_store(6);
    store.insert(common::entry("doc_h", "handbook.pdf", 0, 3));
    store.script_hits(&[("doc_g_chunk_3", 0.1)]);
    let r = retriever(store);

    let results = r.search("q", Some(10), true).await.expect("search");
    let page_three: Vec<&str> = results
        .iter()
        .filter(|r| r.page_number == 3)
        .map(|r| r.document_name.as_str())
        .collect();
    assert_eq!(page_three, vec!["guide.pdf", "handbook.pdf"]);
}
