//! In-memory continuation store with optional TTL.
//!
//! Conversations live for the lifetime of the process only.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use super::{new_conversation_id, ContinuationStore, Conversation, SharedContinuationStore, StoreStats};

struct Entry {
    conversation: Conversation,
    stored_at: Instant,
}

#[derive(Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
    ttl: Option<Duration>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries older than `ttl` read as absent
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: Some(ttl),
        }
    }

    pub fn shared(self) -> SharedContinuationStore {
        std::sync::Arc::new(self)
    }

    fn is_expired(&self, entry: &Entry, now: Instant) -> bool {
        self.ttl
            .is_some_and(|ttl| now.duration_since(entry.stored_at) > ttl)
    }
}

#[async_trait]
impl ContinuationStore for InMemoryStore {
    async fn get(&self, id: &str) -> Option<Conversation> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(id) {
                None => return None,
                Some(entry) if !self.is_expired(entry, now) => {
                    return Some(entry.conversation.clone());
                }
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().await;
        // Re-check: a concurrent set may have refreshed it
        if entries.get(id).is_some_and(|e| self.is_expired(e, now)) {
            entries.remove(id);
            debug!("Conversation {} expired and removed", id);
            return None;
        }
        entries.get(id).map(|e| e.conversation.clone())
    }

    async fn set(&self, mut conversation: Conversation, id: Option<&str>) -> String {
        let id = id
            .map(String::from)
            .unwrap_or_else(new_conversation_id);
        conversation.id = id.clone();
        self.entries.write().await.insert(
            id.clone(),
            Entry {
                conversation,
                stored_at: Instant::now(),
            },
        );
        debug!("Stored conversation {}", id);
        id
    }

    async fn delete(&self, id: &str) {
        self.entries.write().await.remove(id);
    }

    async fn exists(&self, id: &str) -> bool {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .get(id)
            .is_some_and(|e| !self.is_expired(e, now))
    }

    async fn cleanup(&self, max_age: Duration) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| now.duration_since(e.stored_at) <= max_age);
        let removed = before - entries.len();
        if removed > 0 {
            debug!("Cleaned up {} expired conversations", removed);
        }
        removed
    }

    async fn get_stats(&self) -> StoreStats {
        let entries = self.entries.read().await;
        StoreStats {
            total_conversations: entries.len(),
            memory_usage_estimate: entries
                .iter()
                .map(|(k, e)| k.len() + e.conversation.estimated_size())
                .sum(),
        }
    }
}

/// Periodically sweep conversations older than `max_age`
pub fn spawn_cleanup_task(
    store: SharedContinuationStore,
    max_age: Duration,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick fires immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            store.cleanup(max_age).await;
        }
    })
}
