//! Conversation continuation
//!
//! A conversation is addressed by an opaque id handed back to the client.
//! Tool handlers read a snapshot, append one user and one assistant message,
//! and write the whole conversation back.
//!
//! There is no per-id locking: two requests continuing the same id at the
//! same time both succeed and the later `set` wins.

pub mod memory;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::providers::Message;

pub use memory::{spawn_cleanup_task, InMemoryStore};

/// Prefix of ids minted by the store
pub const CONVERSATION_ID_PREFIX: &str = "conv_";

/// One model's final answer from a consensus turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelResponseRecord {
    pub model: String,
    pub response: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMetadata {
    pub provider: Option<String>,
    pub model: Option<String>,
    /// Tool that produced the latest turn
    pub tool: Option<String>,
    /// Answers from the most recent consensus turn, in request order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub consensus_responses: Vec<ModelResponseRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Empty until the store assigns one
    pub id: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub metadata: ConversationMetadata,
}

impl Conversation {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            messages: Vec::new(),
            created_at: now,
            last_accessed_at: now,
            metadata: ConversationMetadata::default(),
        }
    }

    /// Append one exchange
    pub fn push_turn(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.messages.push(Message::user(user));
        self.messages.push(Message::assistant(assistant));
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn is_new(&self) -> bool {
        self.id.is_empty()
    }

    /// Rough byte footprint used for store statistics
    pub fn estimated_size(&self) -> usize {
        let messages: usize = self
            .messages
            .iter()
            .map(|m| m.content.len() + std::mem::size_of::<Message>())
            .sum();
        let consensus: usize = self
            .metadata
            .consensus_responses
            .iter()
            .map(|r| r.model.len() + r.response.len())
            .sum();
        std::mem::size_of::<Self>() + self.id.len() + messages + consensus
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_conversations: usize,
    /// Approximate bytes held, not an exact allocation count
    pub memory_usage_estimate: usize,
}

/// Storage backend for conversations
///
/// `get` never fails: unknown, malformed or expired ids read as `None` and
/// callers start a fresh conversation.
#[async_trait]
pub trait ContinuationStore: Send + Sync {
    async fn get(&self, id: &str) -> Option<Conversation>;

    /// Store `conversation` under `id`, or under a freshly minted id when
    /// `id` is `None`. Returns the id used.
    async fn set(&self, conversation: Conversation, id: Option<&str>) -> String;

    async fn delete(&self, id: &str);

    async fn exists(&self, id: &str) -> bool;

    /// Drop conversations idle for longer than `max_age`; returns how many
    async fn cleanup(&self, max_age: Duration) -> usize;

    async fn get_stats(&self) -> StoreStats;
}

/// Shared reference to a continuation store
pub type SharedContinuationStore = Arc<dyn ContinuationStore>;

/// Mint a new opaque conversation id
pub fn new_conversation_id() -> String {
    format!("{}{}", CONVERSATION_ID_PREFIX, uuid::Uuid::new_v4().simple())
}
