//! Anthropic Messages API adapter.

use async_trait::async_trait;
use serde_json::json;

use super::{
    catalog, error_from_response, split_system, InvokeOptions, Message, ModelInfo, ModelProvider,
    ProviderKind, ProviderResponse, Usage,
};
use crate::config::ProviderConfig;
use crate::error::ProviderError;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 8192;

pub struct AnthropicProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(config: ProviderConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn request_body(messages: &[Message], options: &InvokeOptions) -> serde_json::Value {
        let (system, turns) = split_system(messages);
        let mut body = json!({
            "model": options.model,
            "max_tokens": options.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "messages": turns,
        });
        if let Some(system) = system {
            body["system"] = json!(system);
        }
        if let Some(t) = options.temperature {
            // Anthropic caps temperature at 1.0
            body["temperature"] = json!(t.min(1.0));
        }
        body
    }
}

#[async_trait]
impl ModelProvider for AnthropicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn models(&self) -> &[ModelInfo] {
        catalog::models_for(ProviderKind::Anthropic)
    }

    fn default_model(&self) -> String {
        self.config
            .default_model
            .clone()
            .or_else(|| catalog::default_model_for(ProviderKind::Anthropic).map(String::from))
            .unwrap_or_default()
    }

    fn validate_config(&self, config: &ProviderConfig) -> bool {
        config.usable_api_key().is_some()
    }

    fn is_available(&self) -> bool {
        self.validate_config(&self.config)
    }

    async fn invoke(
        &self,
        messages: &[Message],
        options: &InvokeOptions,
    ) -> Result<ProviderResponse, ProviderError> {
        let api_key = self
            .config
            .usable_api_key()
            .ok_or(ProviderError::MissingApiKey(ProviderKind::Anthropic))?;
        let base = self
            .config
            .base_url
            .as_deref()
            .or(ProviderKind::Anthropic.default_base_url())
            .unwrap_or_default();

        let response = self
            .client
            .post(format!("{}/messages", base.trim_end_matches('/')))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&Self::request_body(messages, options))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(ProviderKind::Anthropic, response).await);
        }

        let resp_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        parse_response(&resp_json)
    }
}

fn parse_response(resp_json: &serde_json::Value) -> Result<ProviderResponse, ProviderError> {
    let content: String = resp_json["content"]
        .as_array()
        .map(|blocks| {
            blocks
                .iter()
                .filter(|b| b["type"] == "text")
                .filter_map(|b| b["text"].as_str())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if content.is_empty() {
        return Err(ProviderError::EmptyResponse(ProviderKind::Anthropic));
    }

    Ok(ProviderResponse {
        content,
        stop_reason: resp_json["stop_reason"].as_str().map(String::from),
        usage: Usage {
            input_tokens: resp_json["usage"]["input_tokens"].as_u64().unwrap_or(0),
            output_tokens: resp_json["usage"]["output_tokens"].as_u64().unwrap_or(0),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_lifts_system_prompt() {
        let messages = vec![Message::system("rules"), Message::user("question")];
        let options = InvokeOptions {
            model: "claude-sonnet-4-20250514".into(),
            temperature: Some(1.5),
            ..Default::default()
        };
        let body = AnthropicProvider::request_body(&messages, &options);
        assert_eq!(body["system"], "rules");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["temperature"], 1.0);
        assert_eq!(body["max_tokens"], DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn test_parse_response_skips_non_text_blocks() {
        let json = json!({
            "content": [
                { "type": "thinking", "thinking": "hmm" },
                { "type": "text", "text": "answer" }
            ],
            "stop_reason": "end_turn",
            "usage": { "input_tokens": 10, "output_tokens": 2 }
        });
        let resp = parse_response(&json).unwrap();
        assert_eq!(resp.content, "answer");
        assert_eq!(resp.stop_reason.as_deref(), Some("end_turn"));
        assert_eq!(resp.usage.output_tokens, 2);
    }
}
