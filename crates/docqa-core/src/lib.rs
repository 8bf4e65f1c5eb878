//! Shared building blocks for page-aware document retrieval: the data model,
//! the chunker, the error taxonomy, configuration and the collaborator traits.

pub mod chunker;
pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
