//! Error types shared across the server.
//!
//! Provider failures are data as far as the consensus engine is concerned:
//! they end up inside an `InvocationResult`. Only configuration and
//! validation problems reach the MCP client as tool errors.

use std::time::Duration;

use thiserror::Error;

use crate::providers::ProviderKind;

/// Errors raised by a provider adapter while talking to its API
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API key not configured for {0}")]
    MissingApiKey(ProviderKind),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("{provider} API error ({status}): {body}")]
    Api {
        provider: ProviderKind,
        status: u16,
        body: String,
    },

    #[error("Rate limited by {0}")]
    RateLimited(ProviderKind),

    #[error("Response parse error: {0}")]
    ParseError(String),

    #[error("{0} returned an empty response")]
    EmptyResponse(ProviderKind),

    #[error("Model call timed out after {0:?}")]
    Timeout(Duration),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        // URLs can carry credentials; keep them out of surfaced errors
        Self::RequestFailed(e.without_url().to_string())
    }
}

/// Errors from model resolution
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error(
        "No model provider is available. Configure at least one API key \
         (GEMINI_API_KEY, OPENAI_API_KEY, ANTHROPIC_API_KEY, XAI_API_KEY, \
         OPENROUTER_API_KEY) or CUSTOM_API_URL."
    )]
    NoProviderAvailable,
}

/// Errors that abort a whole tool call
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Invalid '{field}': {message}")]
    Validation { field: String, message: String },

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Model {model} failed: {message}")]
    Invocation { model: String, message: String },

    #[error("Failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ToolError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Field that failed validation, if any
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// Result type alias for tool handlers
pub type ToolResult<T> = Result<T, ToolError>;

/// Errors from loading configuration files
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Unknown provider '{0}' in config file")]
    UnknownProvider(String),
}
