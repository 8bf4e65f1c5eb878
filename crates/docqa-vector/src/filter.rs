//! SQL predicates for LanceDB `only_if`, `delete` and `count_rows`.

use docqa_core::types::ChunkFilter;

use crate::schema::{COL_DOCUMENT_ID, COL_ID, COL_PAGE_NUMBER, COL_SOURCE};

/// Single-quoted string literal with embedded quotes doubled.
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// `None` for an empty filter, which matches every row.
pub fn to_predicate(filter: &ChunkFilter) -> Option<String> {
    let mut clauses = Vec::new();
    if let Some(document_id) = &filter.document_id {
        clauses.push(format!("{COL_DOCUMENT_ID} = {}", quote(document_id)));
    }
    if let Some(source) = &filter.source {
        clauses.push(format!("{COL_SOURCE} = {}", quote(source)));
    }
    if let Some(page) = filter.page_number {
        clauses.push(format!("{COL_PAGE_NUMBER} = {page}"));
    }
    if clauses.is_empty() { None } else { Some(clauses.join(" AND ")) }
}

pub fn ids_in<S: AsRef<str>>(ids: &[S]) -> String {
    let list: Vec<String> = ids.iter().map(|id| quote(id.as_ref())).collect();
    format!("{COL_ID} IN ({})", list.join(", "))
}
