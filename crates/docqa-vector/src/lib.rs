//! LanceDB-backed vector index for page-tagged chunks.

pub mod filter;
pub mod schema;
pub mod store;
pub mod table;

pub use store::{LanceVectorStore, METRIC};
