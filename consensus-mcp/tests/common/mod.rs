//! Scripted provider shared by the integration tests (no network calls).

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use consensus_mcp::config::{ProviderConfig, ServerConfig};
use consensus_mcp::continuation::InMemoryStore;
use consensus_mcp::providers::{InvokeOptions, Usage};
use consensus_mcp::{
    Message, ModelInfo, ModelProvider, ProviderError, ProviderKind, ProviderRegistry,
    ProviderResponse, SharedToolContext, ToolContext,
};

/// Marker the refinement prompt starts with
pub const REFINEMENT_MARKER: &str = "You previously analyzed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    Initial,
    Refinement,
}

/// How a scripted model behaves
#[derive(Debug, Clone)]
pub struct Script {
    pub answer: &'static str,
    pub delay: Duration,
    pub fail: Option<&'static str>,
    pub fail_refinement: bool,
    pub hang: bool,
}

impl Script {
    pub fn answer(answer: &'static str) -> Self {
        Self {
            answer,
            delay: Duration::ZERO,
            fail: None,
            fail_refinement: false,
            hang: false,
        }
    }

    pub fn delayed(answer: &'static str, millis: u64) -> Self {
        Self {
            delay: Duration::from_millis(millis),
            ..Self::answer(answer)
        }
    }

    pub fn fail(message: &'static str) -> Self {
        Self {
            fail: Some(message),
            ..Self::answer("")
        }
    }

    pub fn fail_refinement(answer: &'static str) -> Self {
        Self {
            fail_refinement: true,
            ..Self::answer(answer)
        }
    }

    pub fn hang() -> Self {
        Self {
            hang: true,
            ..Self::answer("")
        }
    }
}

/// One completed call as the provider saw it
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub phase: CallPhase,
    /// Content of the last (user) message
    pub prompt: String,
    pub message_count: usize,
    pub started: Instant,
    pub finished: Instant,
}

pub struct ScriptedProvider {
    kind: ProviderKind,
    models: Vec<ModelInfo>,
    scripts: HashMap<String, Script>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedProvider {
    pub fn new(kind: ProviderKind, scripts: Vec<(&'static str, Script)>) -> Self {
        Self {
            kind,
            models: scripts.iter().map(|(name, _)| ModelInfo::new(*name)).collect(),
            scripts: scripts
                .into_iter()
                .map(|(name, script)| (name.to_string(), script))
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Provider with an explicit catalog whose every model answers with its name
    pub fn with_catalog(kind: ProviderKind, models: Vec<ModelInfo>) -> Self {
        Self {
            kind,
            models,
            scripts: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_in(&self, phase: CallPhase) -> Vec<RecordedCall> {
        self.calls().into_iter().filter(|c| c.phase == phase).collect()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn models(&self) -> &[ModelInfo] {
        &self.models
    }

    fn default_model(&self) -> String {
        self.models
            .first()
            .map(|m| m.name.to_string())
            .unwrap_or_else(|| "mock".to_string())
    }

    fn validate_config(&self, _config: &ProviderConfig) -> bool {
        true
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn invoke(
        &self,
        messages: &[Message],
        options: &InvokeOptions,
    ) -> Result<ProviderResponse, ProviderError> {
        let started = Instant::now();
        let prompt = messages.last().map(|m| m.content.clone()).unwrap_or_default();
        let phase = if prompt.starts_with(REFINEMENT_MARKER) {
            CallPhase::Refinement
        } else {
            CallPhase::Initial
        };
        let script = self
            .scripts
            .get(&options.model)
            .cloned()
            .unwrap_or_else(|| Script::answer("ok"));

        if script.hang {
            tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
        }
        if phase == CallPhase::Initial && !script.delay.is_zero() {
            tokio::time::sleep(script.delay).await;
        }

        self.calls.lock().unwrap().push(RecordedCall {
            model: options.model.clone(),
            phase,
            prompt,
            message_count: messages.len(),
            started,
            finished: Instant::now(),
        });

        if let Some(message) = script.fail {
            return Err(ProviderError::RequestFailed(message.to_string()));
        }
        let content = match phase {
            CallPhase::Initial if self.scripts.is_empty() => options.model.clone(),
            CallPhase::Initial => script.answer.to_string(),
            CallPhase::Refinement if script.fail_refinement => {
                return Err(ProviderError::RateLimited(self.kind))
            }
            CallPhase::Refinement => format!("{} (refined)", script.answer),
        };

        Ok(ProviderResponse {
            content,
            stop_reason: Some("stop".to_string()),
            usage: Usage {
                input_tokens: 10,
                output_tokens: 5,
            },
        })
    }
}

/// Tool context over the given providers and a fresh in-memory store
pub fn context_with(providers: Vec<Arc<ScriptedProvider>>, config: ServerConfig) -> SharedToolContext {
    let registry = providers
        .into_iter()
        .fold(ProviderRegistry::new(), |registry, p| registry.with_provider(p))
        .shared();
    let store = InMemoryStore::with_ttl(config.conversation_timeout).shared();
    ToolContext::new(config, registry, store).shared()
}

pub fn context(provider: &Arc<ScriptedProvider>) -> SharedToolContext {
    context_with(vec![provider.clone()], ServerConfig::default())
}

pub fn scripted(scripts: Vec<(&'static str, Script)>) -> Arc<ScriptedProvider> {
    Arc::new(ScriptedProvider::new(ProviderKind::Custom, scripts))
}
