//! Grounded answers: retrieve, cite, generate, remember.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use docqa_core::traits::VectorStore;
use docqa_core::types::SearchResult;
use docqa_core::{Error, Result};

use crate::conversation::{new_conversation_id, Conversation, ConversationStore, Message};
use crate::generator::Generator;
use crate::retriever::{Retriever, SkippedPage};

pub const NO_CONTEXT_ANSWER: &str =
    "Sorry, no relevant information was found in the uploaded documents. Upload a document or ask a different question.";

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<SearchResult>,
    pub conversation_id: String,
    /// The generator failed and `answer` is an error notice.
    pub degraded: bool,
    pub skipped_pages: Vec<SkippedPage>,
}

/// One `[<document>, page <n>]` block per result, blank line between blocks.
pub fn build_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .map(|r| format!("[{}, page {}]\n{}\n", r.document_name, r.page_number, r.text))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_prompt(question: &str, context: &str) -> String {
    format!(
        "You are a document question-answering assistant. Answer the user's question accurately, in detail and completely, using only the document excerpts below.

[Document excerpts]
{context}

[Question]
{question}

[Instructions]
1. Answer only from the excerpts above.
2. Do not guess at anything the excerpts do not contain.
3. Structure the answer: definition or concept first, then details, then concrete methods or countermeasures and examples where the excerpts have them.
4. Cite the source of every key statement as \"(page N)\", e.g. \"SQL injection inserts malicious code into a query (page 6).\"
5. When combining several pages, cite all of them.
6. Be thorough, but include only what the excerpts support.

Answer:"
    )
}

pub struct AnswerService<S: VectorStore + ?Sized> {
    retriever: Arc<Retriever<S>>,
    generator: Arc<dyn Generator>,
    conversations: Arc<dyn ConversationStore>,
}

impl<S: VectorStore + ?Sized> AnswerService<S> {
    pub fn new(retriever: Arc<Retriever<S>>, generator: Arc<dyn Generator>, conversations: Arc<dyn ConversationStore>) -> Self {
        Self { retriever, generator, conversations }
    }

    /// Retrieval errors propagate. A generator failure does not: the answer
    /// carries the error text, `degraded` is set and the sources are kept.
    pub async fn ask(&self, question: &str, conversation_id: Option<&str>, top_k: Option<usize>) -> Result<Answer> {
        let conversation_id = conversation_id
            .filter(|id| !id.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(new_conversation_id);

        let include_adjacent = self.retriever.settings().include_adjacent;
        let outcome = self.retriever.search_detailed(question, top_k, include_adjacent).await?;
        if outcome.results.is_empty() {
            info!(%conversation_id, "no context found");
            return Ok(Answer {
                answer: NO_CONTEXT_ANSWER.to_string(),
                sources: Vec::new(),
                conversation_id,
                degraded: false,
                skipped_pages: outcome.skipped_pages,
            });
        }

        let prompt = build_prompt(question, &build_context(&outcome.results));
        let (answer, degraded) = match self.generator.generate(&prompt).await {
            Ok(text) => (text, false),
            Err(e) => {
                warn!(%conversation_id, error = %e, "generation failed");
                (format!("An error occurred while generating the answer: {e}"), true)
            }
        };

        if let Err(e) = self.conversations.append(
            &conversation_id,
            Message::user(question),
            Message::assistant(answer.clone(), outcome.results.clone()),
        ) {
            warn!(%conversation_id, error = %e, "conversation history not saved");
        }
        info!(%conversation_id, sources = outcome.results.len(), degraded, "answered");
        Ok(Answer { answer, sources: outcome.results, conversation_id, degraded, skipped_pages: outcome.skipped_pages })
    }

    pub fn conversation(&self, conversation_id: &str) -> Result<Conversation> {
        self.conversations
            .get(conversation_id)?
            .ok_or_else(|| Error::NotFound(format!("conversation '{conversation_id}'")))
    }

    pub fn clear_conversation(&self, conversation_id: &str) -> Result<bool> {
        self.conversations.clear(conversation_id)
    }
}
