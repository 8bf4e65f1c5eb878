//! Retrieval and document lifecycle on top of a `VectorStore`.
//!
//! `Retriever` turns a question into page-ordered results, `DocumentLibrary`
//! owns the write path, and `AnswerService` glues retrieval to a generator.

pub mod answer;
pub mod conversation;
pub mod generator;
pub mod library;
pub mod registry;
pub mod retriever;

pub use answer::{Answer, AnswerService, NO_CONTEXT_ANSWER};
pub use conversation::{ConversationStore, InMemoryConversationStore};
pub use generator::{GeminiGenerator, Generator};
pub use library::{new_document_id, DocumentLibrary};
pub use registry::JsonDocumentStore;
pub use retriever::{Retriever, SearchOutcome, SkippedPage};
