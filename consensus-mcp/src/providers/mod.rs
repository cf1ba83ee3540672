//! Provider adapters
//!
//! Every supported vendor is one variant of [`ProviderKind`]. Adapters share a
//! single contract, [`ModelProvider`]: take a list of messages plus options and
//! return `{content, stop_reason, usage}` or a typed [`ProviderError`].
//!
//! ```text
//!   ProviderKind ──► catalog (models, aliases, timeouts)
//!        │
//!        └────────► adapter ── invoke(messages, options) ──► ProviderResponse
//! ```

pub mod anthropic;
pub mod catalog;
pub mod gemini;
pub mod openai;
pub mod registry;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ProviderConfig;
use crate::error::ProviderError;

pub use anthropic::AnthropicProvider;
pub use catalog::ModelInfo;
pub use gemini::GeminiProvider;
pub use openai::OpenAiCompatibleProvider;
pub use registry::{ProviderRegistry, SharedProviderRegistry};

/// Closed set of supported providers, in registry (and `auto`) priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    OpenAi,
    Anthropic,
    XAi,
    OpenRouter,
    Custom,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 6] = [
        Self::Gemini,
        Self::OpenAi,
        Self::Anthropic,
        Self::XAi,
        Self::OpenRouter,
        Self::Custom,
    ];

    /// Environment variable holding this provider's API key
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Self::Gemini => "GEMINI_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::XAi => "XAI_API_KEY",
            Self::OpenRouter => "OPENROUTER_API_KEY",
            Self::Custom => "CUSTOM_API_KEY",
        }
    }

    pub fn friendly_name(&self) -> &'static str {
        match self {
            Self::Gemini => "Google Gemini",
            Self::OpenAi => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::XAi => "X.AI",
            Self::OpenRouter => "OpenRouter",
            Self::Custom => "Custom API",
        }
    }

    /// Base URL used when the configuration does not override it
    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            Self::Gemini => Some("https://generativelanguage.googleapis.com/v1beta"),
            Self::OpenAi => Some("https://api.openai.com/v1"),
            Self::Anthropic => Some("https://api.anthropic.com/v1"),
            Self::XAi => Some("https://api.x.ai/v1"),
            Self::OpenRouter => Some("https://openrouter.ai/api/v1"),
            Self::Custom => None,
        }
    }

    /// Whether the provider forwards arbitrary model names to its backend
    pub fn accepts_any_model(&self) -> bool {
        matches!(self, Self::OpenRouter | Self::Custom)
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gemini => write!(f, "gemini"),
            Self::OpenAi => write!(f, "openai"),
            Self::Anthropic => write!(f, "anthropic"),
            Self::XAi => write!(f, "xai"),
            Self::OpenRouter => write!(f, "openrouter"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "xai" | "x.ai" | "grok" => Ok(Self::XAi),
            "openrouter" => Ok(Self::OpenRouter),
            "custom" => Ok(Self::Custom),
            other => Err(other.to_string()),
        }
    }
}

/// Role of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// One conversation message, oldest first when in a list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Joins all system messages into one instruction block.
///
/// Gemini and Anthropic take the system prompt outside the message list.
pub(crate) fn split_system(messages: &[Message]) -> (Option<String>, Vec<&Message>) {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect();
    let rest = messages.iter().filter(|m| m.role != Role::System).collect();
    let system = if system.is_empty() {
        None
    } else {
        Some(system.join("\n\n"))
    };
    (system, rest)
}

/// Per-call options passed to an adapter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvokeOptions {
    /// Canonical model name as resolved for this provider
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Reasoning effort hint (`low`, `medium`, `high`) for reasoning models
    pub reasoning_effort: Option<String>,
    /// Suffix from a `model:option` token. Pass-through providers send it
    /// back as part of the model name (`llama3.2:latest`); catalog
    /// providers ignore it.
    pub model_option: Option<String>,
}

/// Token usage reported by the provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Normalised provider reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub content: String,
    pub stop_reason: Option<String>,
    pub usage: Usage,
}

/// Contract every provider adapter satisfies
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Which provider this adapter talks to
    fn kind(&self) -> ProviderKind;

    /// Static model catalog; empty for providers that accept any model name
    fn models(&self) -> &[ModelInfo];

    /// Model chosen for `auto`
    fn default_model(&self) -> String;

    /// Whether unknown model names should be forwarded to this provider
    fn accepts_any_model(&self) -> bool {
        self.kind().accepts_any_model()
    }

    /// Checks that `config` carries what this adapter needs to make calls
    fn validate_config(&self, config: &ProviderConfig) -> bool;

    /// Whether this adapter can be used with its loaded configuration
    fn is_available(&self) -> bool;

    /// Send one request to the provider
    async fn invoke(
        &self,
        messages: &[Message],
        options: &InvokeOptions,
    ) -> Result<ProviderResponse, ProviderError>;

    /// Catalog entry for a canonical model name
    fn model_info(&self, model: &str) -> Option<&ModelInfo> {
        self.models().iter().find(|m| m.name == model)
    }
}

/// Build the adapter for `kind` from its configuration
pub fn build_provider(
    kind: ProviderKind,
    config: ProviderConfig,
    http: reqwest::Client,
) -> Arc<dyn ModelProvider> {
    match kind {
        ProviderKind::Gemini => Arc::new(GeminiProvider::new(config, http)),
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(config, http)),
        ProviderKind::OpenAi
        | ProviderKind::XAi
        | ProviderKind::OpenRouter
        | ProviderKind::Custom => Arc::new(OpenAiCompatibleProvider::new(kind, config, http)),
    }
}

/// Maps an HTTP failure to the matching [`ProviderError`]
pub(crate) async fn error_from_response(
    provider: ProviderKind,
    response: reqwest::Response,
) -> ProviderError {
    let status = response.status();
    if status.as_u16() == 429 {
        return ProviderError::RateLimited(provider);
    }
    let body = response.text().await.unwrap_or_default();
    ProviderError::Api {
        provider,
        status: status.as_u16(),
        body,
    }
}
