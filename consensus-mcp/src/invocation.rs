//! Single-model invocation unit
//!
//! Resolves a model token, calls the matching adapter under a timeout and
//! normalises the outcome into an [`InvocationResult`]. This never fails:
//! resolution errors, provider errors and timeouts all come back as
//! `status: error` so callers can treat every model the same way.

use std::time::Duration;

use rmcp::schemars;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{ProviderError, ResolveError};
use crate::providers::{InvokeOptions, Message, ProviderKind, SharedProviderRegistry};
use crate::resolver::{ModelResolver, ResolvedModel};

/// One requested participant; duplicates are distinguished by position only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ModelSpec {
    #[schemars(description = "Model name, alias, or 'auto'")]
    pub model: String,
}

impl ModelSpec {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }
}

/// Request-level options merged into every adapter call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub reasoning_effort: Option<String>,
    /// Thinking mode (`minimal` .. `max`); stands in for `reasoning_effort`
    /// when that is not set
    pub thinking: Option<String>,
}

impl CallOptions {
    /// Reasoning effort to send: the explicit one, else the thinking mode's
    pub fn effective_reasoning_effort(&self) -> Option<String> {
        self.reasoning_effort
            .clone()
            .or_else(|| self.thinking.as_deref().and_then(thinking_effort).map(String::from))
    }

    /// Adapter options for one resolved model
    pub fn for_model(&self, resolved: &ResolvedModel) -> InvokeOptions {
        InvokeOptions {
            model: resolved.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            reasoning_effort: self.effective_reasoning_effort(),
            model_option: resolved.option.clone(),
        }
    }
}

fn thinking_effort(thinking: &str) -> Option<&'static str> {
    match thinking.trim().to_ascii_lowercase().as_str() {
        "minimal" | "low" => Some("low"),
        "medium" => Some("medium"),
        "high" | "max" => Some("high"),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvocationMetadata {
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Wall time including resolution, also recorded for failures
    pub response_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
}

/// Outcome of one model call; immutable once produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationResult {
    /// The token as requested, not the resolved name
    pub model: String,
    pub status: InvocationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub metadata: InvocationMetadata,
}

impl InvocationResult {
    pub fn is_success(&self) -> bool {
        self.status == InvocationStatus::Success
    }

    pub fn failure(model: impl Into<String>, error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            model: model.into(),
            status: InvocationStatus::Error,
            response: None,
            error: Some(error.into()),
            metadata: InvocationMetadata {
                response_time_ms: elapsed.as_millis() as u64,
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Error)]
enum InvocationError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Provider {0} is not registered")]
    NotRegistered(ProviderKind),
}

pub struct Invoker {
    registry: SharedProviderRegistry,
    resolver: ModelResolver,
    default_timeout: Duration,
}

impl Invoker {
    pub fn new(registry: SharedProviderRegistry, default_timeout: Duration) -> Self {
        Self {
            resolver: ModelResolver::new(registry.clone()),
            registry,
            default_timeout,
        }
    }

    /// Catalog context window of the model `spec` resolves to, if known
    pub fn context_window(&self, spec: &ModelSpec) -> Option<u64> {
        let resolved = self.resolver.resolve(&spec.model).ok()?;
        let provider = self.registry.get(resolved.provider)?;
        provider
            .model_info(&resolved.model)
            .and_then(|m| m.context_window)
    }

    /// Call one model; always returns a result, never an error
    pub async fn invoke(
        &self,
        spec: &ModelSpec,
        messages: &[Message],
        options: &CallOptions,
    ) -> InvocationResult {
        let start = Instant::now();
        match self.try_invoke(spec, messages, options).await {
            Ok((resolved, response)) => {
                let elapsed = start.elapsed();
                debug!(
                    "Model {} ({}/{}) answered in {}ms",
                    spec.model,
                    resolved.provider,
                    resolved.model,
                    elapsed.as_millis()
                );
                InvocationResult {
                    model: spec.model.clone(),
                    status: InvocationStatus::Success,
                    response: Some(response.content),
                    error: None,
                    metadata: InvocationMetadata {
                        input_tokens: response.usage.input_tokens,
                        output_tokens: response.usage.output_tokens,
                        response_time_ms: elapsed.as_millis() as u64,
                        provider: Some(resolved.provider),
                        resolved_model: Some(resolved.model),
                        stop_reason: response.stop_reason,
                    },
                }
            }
            Err(e) => {
                warn!("Model {} failed: {}", spec.model, e);
                InvocationResult::failure(spec.model.clone(), e.to_string(), start.elapsed())
            }
        }
    }

    async fn try_invoke(
        &self,
        spec: &ModelSpec,
        messages: &[Message],
        options: &CallOptions,
    ) -> Result<(ResolvedModel, crate::providers::ProviderResponse), InvocationError> {
        let resolved = self.resolver.resolve(&spec.model)?;
        let provider = self
            .registry
            .get(resolved.provider)
            .ok_or(InvocationError::NotRegistered(resolved.provider))?;

        let invoke_options = options.for_model(&resolved);

        let timeout = resolved.timeout.unwrap_or(self.default_timeout);
        let response = tokio::time::timeout(timeout, provider.invoke(messages, &invoke_options))
            .await
            .map_err(|_| ProviderError::Timeout(timeout))??;

        Ok((resolved, response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_result_shape() {
        let result = InvocationResult::failure("o3", "boom", Duration::from_millis(12));
        assert!(!result.is_success());
        assert_eq!(result.metadata.response_time_ms, 12);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"], "boom");
        assert!(json.get("response").is_none());
        assert!(json["metadata"].get("provider").is_none());
    }

    #[tokio::test]
    async fn test_no_provider_is_captured_as_error() {
        let registry = crate::providers::ProviderRegistry::new().shared();
        let invoker = Invoker::new(registry, Duration::from_secs(5));
        let result = invoker
            .invoke(&ModelSpec::new("auto"), &[Message::user("hi")], &CallOptions::default())
            .await;
        assert_eq!(result.status, InvocationStatus::Error);
        assert!(result
            .error
            .as_deref()
            .unwrap()
            .contains("No model provider is available"));
    }

    #[test]
    fn test_thinking_stands_in_for_reasoning_effort() {
        let resolved = ResolvedModel {
            provider: ProviderKind::OpenAi,
            model: "o3".into(),
            option: None,
            timeout: None,
        };
        let thinking = CallOptions {
            thinking: Some("max".into()),
            ..Default::default()
        };
        assert_eq!(thinking.for_model(&resolved).reasoning_effort.as_deref(), Some("high"));

        let both = CallOptions {
            reasoning_effort: Some("low".into()),
            thinking: Some("high".into()),
            ..Default::default()
        };
        assert_eq!(both.effective_reasoning_effort().as_deref(), Some("low"));

        let unknown = CallOptions {
            thinking: Some("sideways".into()),
            ..Default::default()
        };
        assert!(unknown.effective_reasoning_effort().is_none());
    }

    #[test]
    fn test_model_option_is_carried_to_the_adapter() {
        let resolved = ResolvedModel {
            provider: ProviderKind::Custom,
            model: "llama3.2".into(),
            option: Some("latest".into()),
            timeout: None,
        };
        let options = CallOptions::default().for_model(&resolved);
        assert_eq!(options.model, "llama3.2");
        assert_eq!(options.model_option.as_deref(), Some("latest"));
    }

    #[test]
    fn test_context_window_follows_resolution() {
        let mut config = crate::config::ServerConfig::default();
        config.providers.insert(
            ProviderKind::OpenAi,
            crate::config::ProviderConfig::with_api_key("k"),
        );
        let registry = crate::providers::ProviderRegistry::from_config(&config)
            .unwrap()
            .shared();
        let invoker = Invoker::new(registry, Duration::from_secs(5));
        assert_eq!(invoker.context_window(&ModelSpec::new("o3")), Some(200_000));
        assert_eq!(invoker.context_window(&ModelSpec::new("gpt4.1")), Some(1_000_000));
        // Pass-through names have no known budget
        assert_eq!(invoker.context_window(&ModelSpec::new("mystery-model")), None);
    }
}
