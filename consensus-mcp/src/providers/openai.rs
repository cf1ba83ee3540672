//! OpenAI-compatible chat completions adapter.
//!
//! Serves OpenAI itself plus X.AI, OpenRouter and any custom endpoint that
//! speaks the `/chat/completions` dialect (Ollama, vLLM, llama.cpp server).

use std::borrow::Cow;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{
    catalog, error_from_response, InvokeOptions, Message, ModelInfo, ModelProvider, ProviderKind,
    ProviderResponse, Usage,
};
use crate::config::ProviderConfig;
use crate::error::ProviderError;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: Cow<'a, str>,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<&'a str>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    reasoning_content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

pub struct OpenAiCompatibleProvider {
    kind: ProviderKind,
    config: ProviderConfig,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(kind: ProviderKind, config: ProviderConfig, client: reqwest::Client) -> Self {
        Self {
            kind,
            config,
            client,
        }
    }

    fn endpoint(&self) -> Option<String> {
        self.config
            .base_url
            .as_deref()
            .or(self.kind.default_base_url())
            .map(|base| format!("{}/chat/completions", base.trim_end_matches('/')))
    }

    fn build_request<'a>(&self, messages: &'a [Message], options: &'a InvokeOptions) -> ChatRequest<'a> {
        let info = self.model_info(&options.model);
        let supports_temperature = info.map_or(true, |m| m.supports_temperature);
        let supports_effort = info.map_or(false, |m| m.supports_reasoning_effort);

        // Local servers and OpenRouter take the tag as part of the name
        let model = match options.model_option.as_deref() {
            Some(option) if self.kind.accepts_any_model() => {
                Cow::Owned(format!("{}:{}", options.model, option))
            }
            _ => Cow::Borrowed(options.model.as_str()),
        };

        ChatRequest {
            model,
            messages,
            temperature: options.temperature.filter(|_| supports_temperature),
            max_tokens: options.max_tokens,
            reasoning_effort: options
                .reasoning_effort
                .as_deref()
                .filter(|_| supports_effort),
        }
    }
}

#[async_trait]
impl ModelProvider for OpenAiCompatibleProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn models(&self) -> &[ModelInfo] {
        catalog::models_for(self.kind)
    }

    fn default_model(&self) -> String {
        self.config
            .default_model
            .clone()
            .or_else(|| catalog::default_model_for(self.kind).map(String::from))
            .unwrap_or_else(|| crate::config::DEFAULT_CUSTOM_MODEL.to_string())
    }

    fn validate_config(&self, config: &ProviderConfig) -> bool {
        match self.kind {
            // Local endpoints usually run without a key
            ProviderKind::Custom => config
                .base_url
                .as_deref()
                .is_some_and(|u| !u.trim().is_empty()),
            _ => config.usable_api_key().is_some(),
        }
    }

    fn is_available(&self) -> bool {
        self.validate_config(&self.config)
    }

    async fn invoke(
        &self,
        messages: &[Message],
        options: &InvokeOptions,
    ) -> Result<ProviderResponse, ProviderError> {
        let url = self
            .endpoint()
            .ok_or(ProviderError::MissingApiKey(self.kind))?;

        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&self.build_request(messages, options));

        match self.config.usable_api_key() {
            Some(key) => request = request.bearer_auth(key),
            None if self.kind != ProviderKind::Custom => {
                return Err(ProviderError::MissingApiKey(self.kind));
            }
            None => {}
        }
        if self.kind == ProviderKind::OpenRouter {
            request = request.header("X-Title", "consensus-mcp");
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(error_from_response(self.kind, response).await);
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        into_provider_response(self.kind, chat)
    }
}

fn into_provider_response(
    kind: ProviderKind,
    chat: ChatResponse,
) -> Result<ProviderResponse, ProviderError> {
    let choice = chat
        .choices
        .into_iter()
        .next()
        .ok_or(ProviderError::EmptyResponse(kind))?;

    // Some reasoning servers put everything in reasoning_content
    let content = match choice.message.content {
        Some(c) if !c.trim().is_empty() => c,
        _ => choice
            .message
            .reasoning_content
            .filter(|c| !c.trim().is_empty())
            .ok_or(ProviderError::EmptyResponse(kind))?,
    };

    let usage = chat.usage.map_or_else(Usage::default, |u| Usage {
        input_tokens: u.prompt_tokens,
        output_tokens: u.completion_tokens,
    });

    Ok(ProviderResponse {
        content,
        stop_reason: choice.finish_reason,
        usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::CallOptions;
    use crate::resolver::ResolvedModel;

    fn provider(kind: ProviderKind, config: ProviderConfig) -> OpenAiCompatibleProvider {
        OpenAiCompatibleProvider::new(kind, config, reqwest::Client::new())
    }

    #[test]
    fn test_reasoning_model_drops_temperature() {
        let p = provider(ProviderKind::OpenAi, ProviderConfig::with_api_key("k"));
        let messages = vec![Message::user("hi")];
        let options = InvokeOptions {
            model: "o3".into(),
            temperature: Some(0.2),
            reasoning_effort: Some("high".into()),
            ..Default::default()
        };
        let body = serde_json::to_value(p.build_request(&messages, &options)).unwrap();
        assert!(body.get("temperature").is_none());
        assert_eq!(body["reasoning_effort"], "high");

        let options = InvokeOptions {
            model: "gpt-4.1-2025-04-14".into(),
            temperature: Some(0.2),
            reasoning_effort: Some("high".into()),
            ..Default::default()
        };
        let body = serde_json::to_value(p.build_request(&messages, &options)).unwrap();
        assert!((body["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
        assert!(body.get("reasoning_effort").is_none());
    }

    #[test]
    fn test_thinking_mode_sets_reasoning_effort() {
        let p = provider(ProviderKind::OpenAi, ProviderConfig::with_api_key("k"));
        let messages = vec![Message::user("hi")];
        let resolved = ResolvedModel {
            provider: ProviderKind::OpenAi,
            model: "o3".into(),
            option: None,
            timeout: None,
        };

        let plain = CallOptions::default().for_model(&resolved);
        let body = serde_json::to_value(p.build_request(&messages, &plain)).unwrap();
        assert!(body.get("reasoning_effort").is_none());

        let thinking = CallOptions {
            thinking: Some("high".into()),
            ..Default::default()
        }
        .for_model(&resolved);
        let body = serde_json::to_value(p.build_request(&messages, &thinking)).unwrap();
        assert_eq!(body["reasoning_effort"], "high");
    }

    #[test]
    fn test_model_option_rejoined_for_pass_through() {
        let messages = vec![Message::user("hi")];
        let options = InvokeOptions {
            model: "llama3.2".into(),
            model_option: Some("latest".into()),
            ..Default::default()
        };
        let custom = provider(
            ProviderKind::Custom,
            ProviderConfig {
                base_url: Some("http://localhost:11434/v1".into()),
                ..Default::default()
            },
        );
        let body = serde_json::to_value(custom.build_request(&messages, &options)).unwrap();
        assert_eq!(body["model"], "llama3.2:latest");

        let options = InvokeOptions {
            model: "o3".into(),
            model_option: Some("fast".into()),
            ..Default::default()
        };
        let openai = provider(ProviderKind::OpenAi, ProviderConfig::with_api_key("k"));
        let body = serde_json::to_value(openai.build_request(&messages, &options)).unwrap();
        assert_eq!(body["model"], "o3");
    }

    #[test]
    fn test_custom_available_without_key() {
        let config = ProviderConfig {
            base_url: Some("http://localhost:11434/v1/".into()),
            default_model: Some("llama3.2".into()),
            ..Default::default()
        };
        let p = provider(ProviderKind::Custom, config);
        assert!(p.is_available());
        assert_eq!(p.default_model(), "llama3.2");
        assert_eq!(
            p.endpoint().as_deref(),
            Some("http://localhost:11434/v1/chat/completions")
        );
    }

    #[test]
    fn test_xai_needs_key() {
        assert!(!provider(ProviderKind::XAi, ProviderConfig::default()).is_available());
        let p = provider(ProviderKind::XAi, ProviderConfig::with_api_key("xai-1"));
        assert_eq!(p.default_model(), "grok-3");
        assert_eq!(p.endpoint().as_deref(), Some("https://api.x.ai/v1/chat/completions"));
    }

    #[test]
    fn test_response_falls_back_to_reasoning_content() {
        let chat: ChatResponse = serde_json::from_value(serde_json::json!({
            "choices": [{
                "message": { "content": "", "reasoning_content": "thought it through" },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 5, "completion_tokens": 7 }
        }))
        .unwrap();
        let resp = into_provider_response(ProviderKind::Custom, chat).unwrap();
        assert_eq!(resp.content, "thought it through");
        assert_eq!(resp.usage.output_tokens, 7);
    }

    #[test]
    fn test_empty_choices_is_error() {
        let chat: ChatResponse = serde_json::from_value(serde_json::json!({ "choices": [] })).unwrap();
        assert!(matches!(
            into_provider_response(ProviderKind::OpenAi, chat),
            Err(ProviderError::EmptyResponse(ProviderKind::OpenAi))
        ));
    }
}
