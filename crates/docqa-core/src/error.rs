use std::fmt::Display;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed caller input. Rejected before anything is written.
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The vector store could not be read or written.
    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// The generation collaborator failed. Callers are expected to degrade
    /// rather than abort, since the retrieval result is still valid.
    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn index(err: impl Display) -> Self {
        Self::IndexUnavailable(err.to_string())
    }

    pub fn embedding(err: impl Display) -> Self {
        Self::Embedding(err.to_string())
    }

    pub fn is_index_unavailable(&self) -> bool {
        matches!(self, Self::IndexUnavailable(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Operation(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Operation(format!("malformed json: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
