use arrow_array::{
    types::Float32Type, Array, FixedSizeListArray, Float32Array, Int32Array, RecordBatch, StringArray,
};
use arrow_schema::{ArrowError, DataType, Field, Schema};
use std::sync::Arc;

use docqa_core::types::{ChunkMetadata, IndexEntry};
use docqa_core::{Error, Result};

pub const COL_ID: &str = "id";
pub const COL_DOCUMENT_ID: &str = "document_id";
pub const COL_SOURCE: &str = "source";
pub const COL_PAGE_NUMBER: &str = "page_number";
pub const COL_SEQUENCE_INDEX: &str = "sequence_index";
pub const COL_PAGE_LOCAL_INDEX: &str = "page_local_index";
pub const COL_TEXT: &str = "text";
pub const COL_VECTOR: &str = "vector";
/// Added by LanceDB to vector search results.
pub const COL_DISTANCE: &str = "_distance";

pub fn build_chunk_schema(dim: i32) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new(COL_ID, DataType::Utf8, false),
        Field::new(COL_DOCUMENT_ID, DataType::Utf8, false),
        Field::new(COL_SOURCE, DataType::Utf8, false),
        Field::new(COL_PAGE_NUMBER, DataType::Int32, false),
        Field::new(COL_SEQUENCE_INDEX, DataType::Int32, false),
        Field::new(COL_PAGE_LOCAL_INDEX, DataType::Int32, false),
        Field::new(COL_TEXT, DataType::Utf8, false),
        Field::new(COL_VECTOR, DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
    ]))
}

/// Width of the `vector` column, if the schema has one.
pub fn vector_dim(schema: &Schema) -> Option<usize> {
    match schema.field_with_name(COL_VECTOR).ok()?.data_type() {
        DataType::FixedSizeList(_, n) => usize::try_from(*n).ok(),
        _ => None,
    }
}

pub fn entries_to_batch(
    entries: &[IndexEntry],
    vectors: &[Vec<f32>],
    schema: Arc<Schema>,
    dim: i32,
) -> std::result::Result<RecordBatch, ArrowError> {
    let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
    let document_ids: Vec<&str> = entries.iter().map(|e| e.metadata.document_id.as_str()).collect();
    let sources: Vec<&str> = entries.iter().map(|e| e.metadata.source.as_str()).collect();
    let pages: Vec<i32> = entries.iter().map(|e| e.metadata.page_number as i32).collect();
    let sequence: Vec<i32> = entries.iter().map(|e| e.metadata.sequence_index as i32).collect();
    let page_local: Vec<i32> = entries.iter().map(|e| e.metadata.page_local_index as i32).collect();
    let texts: Vec<&str> = entries.iter().map(|e| e.text.as_str()).collect();
    let vectors = vectors.iter().map(|v| Some(v.iter().map(|&x| Some(x)).collect::<Vec<_>>()));
    RecordBatch::try_new(schema, vec![
        Arc::new(StringArray::from(ids)),
        Arc::new(StringArray::from(document_ids)),
        Arc::new(StringArray::from(sources)),
        Arc::new(Int32Array::from(pages)),
        Arc::new(Int32Array::from(sequence)),
        Arc::new(Int32Array::from(page_local)),
        Arc::new(StringArray::from(texts)),
        Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, dim)),
    ])
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| Error::index(format!("column '{name}' missing or mistyped")))
}

pub fn batch_to_entries(batch: &RecordBatch) -> Result<Vec<IndexEntry>> {
    let ids = column::<StringArray>(batch, COL_ID)?;
    let document_ids = column::<StringArray>(batch, COL_DOCUMENT_ID)?;
    let sources = column::<StringArray>(batch, COL_SOURCE)?;
    let pages = column::<Int32Array>(batch, COL_PAGE_NUMBER)?;
    let sequence = column::<Int32Array>(batch, COL_SEQUENCE_INDEX)?;
    let page_local = column::<Int32Array>(batch, COL_PAGE_LOCAL_INDEX)?;
    let texts = column::<StringArray>(batch, COL_TEXT)?;
    Ok((0..batch.num_rows())
        .map(|i| IndexEntry {
            id: ids.value(i).to_string(),
            text: texts.value(i).to_string(),
            metadata: ChunkMetadata {
                document_id: document_ids.value(i).to_string(),
                source: sources.value(i).to_string(),
                page_number: pages.value(i).max(0) as u32,
                sequence_index: sequence.value(i).max(0) as usize,
                page_local_index: page_local.value(i).max(0) as usize,
            },
        })
        .collect())
}

pub fn batch_distances(batch: &RecordBatch) -> Result<Vec<f32>> {
    let distances = column::<Float32Array>(batch, COL_DISTANCE)?;
    Ok((0..batch.num_rows()).map(|i| distances.value(i)).collect())
}
