use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use docqa_core::types::SearchResult;
use docqa_core::{Error, Result};

pub const DEFAULT_MAX_TURNS: usize = 50;

/// `conv_` followed by 12 hex chars.
pub fn new_conversation_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("conv_{}", &hex[..12])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SearchResult>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into(), timestamp: Utc::now(), sources: Vec::new() }
    }

    pub fn assistant(content: impl Into<String>, sources: Vec<SearchResult>) -> Self {
        Self { role: Role::Assistant, content: content.into(), timestamp: Utc::now(), sources }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub conversation_id: String,
    pub messages: Vec<Message>,
}

/// Keyed history of question/answer exchanges.
pub trait ConversationStore: Send + Sync {
    fn append(&self, conversation_id: &str, question: Message, answer: Message) -> Result<()>;
    fn get(&self, conversation_id: &str) -> Result<Option<Conversation>>;
    /// `true` when something was removed.
    fn clear(&self, conversation_id: &str) -> Result<bool>;
}

/// Process-local history. Each conversation keeps its last `max_turns`
/// exchanges.
pub struct InMemoryConversationStore {
    conversations: Mutex<HashMap<String, Conversation>>,
    max_turns: usize,
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TURNS)
    }
}

impl InMemoryConversationStore {
    pub fn new(max_turns: usize) -> Self {
        Self { conversations: Mutex::new(HashMap::new()), max_turns: max_turns.max(1) }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Conversation>>> {
        self.conversations
            .lock()
            .map_err(|_| Error::Operation("conversation store lock poisoned".into()))
    }
}

impl ConversationStore for InMemoryConversationStore {
    fn append(&self, conversation_id: &str, question: Message, answer: Message) -> Result<()> {
        let mut conversations = self.lock()?;
        let conversation = conversations
            .entry(conversation_id.to_string())
            .or_insert_with(|| Conversation { conversation_id: conversation_id.to_string(), messages: Vec::new() });
        conversation.messages.push(question);
        conversation.messages.push(answer);
        let cap = self.max_turns * 2;
        if conversation.messages.len() > cap {
            let excess = conversation.messages.len() - cap;
            conversation.messages.drain(..excess);
        }
        Ok(())
    }

    fn get(&self, conversation_id: &str) -> Result<Option<Conversation>> {
        Ok(self.lock()?.get(conversation_id).cloned())
    }

    fn clear(&self, conversation_id: &str) -> Result<bool> {
        Ok(self.lock()?.remove(conversation_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_prefixed_hex() {
        let id = new_conversation_id();
        assert!(id.starts_with("conv_"));
        assert_eq!(id.len(), 17);
        assert!(id[5..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn keeps_only_the_last_turns() {
        let store = InMemoryConversationStore::new(2);
        for i in 0..3 {
            store
                .append("c", Message::user(format!("q{i}")), Message::assistant(format!("a{i}"), Vec::new()))
                .expect("append");
        }
        let conv = store.get("c").expect("get").expect("present");
        let contents: Vec<&str> = conv.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["q1", "a1", "q2", "a2"]);
        assert_eq!(conv.messages[0].role, Role::User);
    }

    #[test]
    fn clear_reports_presence() {
        let store = InMemoryConversationStore::default();
        assert!(!store.clear("missing").expect("clear"));
        store.append("c", Message::user("q"), Message::assistant("a", Vec::new())).expect("append");
        assert!(store.clear("c").expect("clear"));
        assert!(store.get("c").expect("get").is_none());
    }
}
