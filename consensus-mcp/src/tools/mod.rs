//! Tool handlers
//!
//! `chat` and `consensus` share one envelope: validate the request, load the
//! conversation named by `continuation` (or start a new one), do the model
//! work, append one user and one assistant message, and store the whole
//! conversation back.

pub mod chat;
pub mod consensus;

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::consensus::{ConsensusOrchestrator, SharedConsensusOrchestrator};
use crate::context::{ContextAssembler, PromptContext};
use crate::continuation::{Conversation, SharedContinuationStore};
use crate::error::{ToolError, ToolResult};
use crate::invocation::Invoker;
use crate::providers::SharedProviderRegistry;

pub use chat::{chat, ChatArgs, DEFAULT_CHAT_TEMPERATURE};
pub use consensus::{consensus, ConsensusArgs};

/// Dependencies handed to every tool call
pub struct ToolContext {
    pub config: ServerConfig,
    pub registry: SharedProviderRegistry,
    pub invoker: Arc<Invoker>,
    pub orchestrator: SharedConsensusOrchestrator,
    pub store: SharedContinuationStore,
    pub files: ContextAssembler,
}

/// Shared reference to a ToolContext
pub type SharedToolContext = Arc<ToolContext>;

impl ToolContext {
    pub fn new(
        config: ServerConfig,
        registry: SharedProviderRegistry,
        store: SharedContinuationStore,
    ) -> Self {
        let invoker = Arc::new(Invoker::new(registry.clone(), config.consensus_model_timeout));
        let orchestrator = ConsensusOrchestrator::new(invoker.clone()).shared();
        Self {
            config,
            registry,
            invoker,
            orchestrator,
            store,
            files: ContextAssembler::new(),
        }
    }

    pub fn shared(self) -> SharedToolContext {
        Arc::new(self)
    }

    /// Conversation to continue, or a fresh one.
    ///
    /// Unknown or expired ids and conversations at the turn limit all start
    /// over rather than failing the call.
    pub async fn load_conversation(&self, continuation: Option<&str>) -> Conversation {
        let Some(id) = continuation.map(str::trim).filter(|id| !id.is_empty()) else {
            return Conversation::new();
        };

        match self.store.get(id).await {
            Some(conversation)
                if conversation.message_count() + 2 <= self.config.max_conversation_turns =>
            {
                info!(
                    "Continuing conversation {} ({} messages)",
                    id,
                    conversation.message_count()
                );
                conversation
            }
            Some(conversation) => {
                warn!(
                    "Conversation {} reached the turn limit ({} messages), starting a new one",
                    id,
                    conversation.message_count()
                );
                Conversation::new()
            }
            None => {
                warn!("Conversation {} not found or expired, starting a new one", id);
                Conversation::new()
            }
        }
    }

    /// Write the conversation back and describe it for the client
    pub async fn persist(&self, mut conversation: Conversation) -> ContinuationInfo {
        let existing = (!conversation.is_new()).then(|| conversation.id.clone());
        conversation.last_accessed_at = Utc::now();
        let message_count = conversation.message_count();
        let id = self.store.set(conversation, existing.as_deref()).await;
        ContinuationInfo {
            id,
            message_count,
            remaining_turns: self
                .config
                .max_conversation_turns
                .saturating_sub(message_count)
                / 2,
        }
    }

    /// Files and images rendered for the prompt
    pub async fn assemble_context(&self, files: &[String], images: &[String]) -> PromptContext {
        self.files.assemble(files, images).await
    }

    pub fn ensure_provider_available(&self) -> ToolResult<()> {
        if self.registry.has_available() {
            Ok(())
        } else {
            Err(crate::error::ResolveError::NoProviderAvailable.into())
        }
    }
}

/// Continuation handle returned with every successful tool call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuationInfo {
    pub id: String,
    pub message_count: usize,
    /// Exchanges left before the conversation is rolled over
    pub remaining_turns: usize,
}

/// What a tool hands back to the MCP layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResponse {
    pub content: String,
    pub continuation: ContinuationInfo,
}

impl ToolResponse {
    /// JSON text of the continuation envelope
    pub fn continuation_json(&self) -> String {
        serde_json::json!({ "continuation": self.continuation }).to_string()
    }
}

pub(crate) fn validate_prompt(prompt: &str) -> ToolResult<&str> {
    let trimmed = prompt.trim();
    if trimmed.is_empty() {
        return Err(ToolError::validation("prompt", "must not be empty"));
    }
    Ok(trimmed)
}

pub(crate) fn validate_temperature(value: Option<f32>, default: f32) -> ToolResult<f32> {
    match value {
        None => Ok(default),
        Some(t) if (0.0..=2.0).contains(&t) => Ok(t),
        Some(t) => Err(ToolError::validation(
            "temperature",
            format!("must be between 0.0 and 2.0, got {}", t),
        )),
    }
}
