//! Google Gemini adapter (`generateContent`).

use async_trait::async_trait;
use serde_json::json;

use super::{
    catalog, error_from_response, split_system, InvokeOptions, Message, ModelInfo, ModelProvider,
    ProviderKind, ProviderResponse, Role, Usage,
};
use crate::config::ProviderConfig;
use crate::error::ProviderError;

pub struct GeminiProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(config: ProviderConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn request_body(messages: &[Message], options: &InvokeOptions) -> serde_json::Value {
        let (system, turns) = split_system(messages);

        // Gemini calls the assistant role "model"
        let contents: Vec<serde_json::Value> = turns
            .iter()
            .map(|m| {
                let role = if m.role == Role::Assistant { "model" } else { "user" };
                json!({ "role": role, "parts": [{ "text": m.content }] })
            })
            .collect();

        let mut generation = serde_json::Map::new();
        if let Some(t) = options.temperature {
            generation.insert("temperature".into(), json!(t));
        }
        if let Some(max) = options.max_tokens {
            generation.insert("maxOutputTokens".into(), json!(max));
        }

        let mut body = json!({
            "contents": contents,
            "generationConfig": generation,
        });
        if let Some(system) = system {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }
        body
    }
}

#[async_trait]
impl ModelProvider for GeminiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn models(&self) -> &[ModelInfo] {
        catalog::models_for(ProviderKind::Gemini)
    }

    fn default_model(&self) -> String {
        self.config
            .default_model
            .clone()
            .or_else(|| catalog::default_model_for(ProviderKind::Gemini).map(String::from))
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
            .ok_or(ProviderError::MissingApiKey(ProviderKind::Gemini))?;
        let base = self
            .config
            .base_url
            .as_deref()
            .or(ProviderKind::Gemini.default_base_url())
            .unwrap_or_default();
        let url = format!(
            "{}/models/{}:generateContent",
            base.trim_end_matches('/'),
            options.model
        );

        // Key goes in a header so it never shows up in a URL-bearing error
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&Self::request_body(messages, options))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(ProviderKind::Gemini, response).await);
        }

        let resp_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        parse_response(&resp_json)
    }
}

fn parse_response(resp_json: &serde_json::Value) -> Result<ProviderResponse, ProviderError> {
    let candidate = &resp_json["candidates"][0];
    let content: String = candidate["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p["text"].as_str())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    let stop_reason = candidate["finishReason"].as_str().map(String::from);
    if content.is_empty() {
        // Safety blocks come back as a candidate with no text
        return match stop_reason.as_deref() {
            Some(reason) if reason != "STOP" => Err(ProviderError::ParseError(format!(
                "Gemini returned no content (finish reason: {})",
                reason
            ))),
            _ => Err(ProviderError::EmptyResponse(ProviderKind::Gemini)),
        };
    }

    Ok(ProviderResponse {
        content,
        stop_reason,
        usage: Usage {
            input_tokens: resp_json["usageMetadata"]["promptTokenCount"]
                .as_u64()
                .unwrap_or(0),
            output_tokens: resp_json["usageMetadata"]["candidatesTokenCount"]
                .as_u64()
                .unwrap_or(0),
        },
    })
}
