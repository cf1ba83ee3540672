//! `chat`: one model, multi-turn.

use rmcp::schemars;
use serde::Deserialize;
use tracing::info;

use super::{validate_prompt, validate_temperature, ToolContext, ToolResponse};
use crate::error::{ToolError, ToolResult};
use crate::invocation::{CallOptions, ModelSpec};
use crate::prompts::CHAT_PROMPT;
use crate::providers::Message;

pub const DEFAULT_CHAT_TEMPERATURE: f32 = 0.5;

/// Request parameters for the chat tool
#[derive(Debug, Clone, Default, Deserialize, schemars::JsonSchema)]
pub struct ChatArgs {
    #[schemars(description = "Your question, idea or code to discuss")]
    pub prompt: String,
    #[schemars(description = "Model name, alias, or 'auto' (default: server DEFAULT_MODEL)")]
    pub model: Option<String>,
    #[serde(default)]
    #[schemars(description = "Absolute paths of files to include as context")]
    pub files: Vec<String>,
    #[serde(default)]
    #[schemars(description = "Absolute paths of images to reference")]
    pub images: Vec<String>,
    #[schemars(description = "Sampling temperature 0.0-2.0 (default: 0.5)")]
    pub temperature: Option<f32>,
    #[serde(default, alias = "continuation_id")]
    #[schemars(description = "Continuation id from a previous response to keep the conversation going")]
    pub continuation: Option<String>,
    #[serde(default, alias = "reasoningEffort")]
    #[schemars(description = "Reasoning effort for reasoning models: low, medium or high")]
    pub reasoning_effort: Option<String>,
    #[schemars(
        description = "Thinking mode: minimal, low, medium, high or max. Used as the reasoning effort when reasoning_effort is not set"
    )]
    pub thinking: Option<String>,
}

pub async fn chat(ctx: &ToolContext, args: ChatArgs) -> ToolResult<ToolResponse> {
    let prompt = validate_prompt(&args.prompt)?.to_string();
    let temperature = validate_temperature(args.temperature, DEFAULT_CHAT_TEMPERATURE)?;
    ctx.ensure_provider_available()?;

    let mut conversation = ctx.load_conversation(args.continuation.as_deref()).await;
    let context = ctx.assemble_context(&args.files, &args.images).await;

    let spec = ModelSpec::new(
        args.model
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| ctx.config.default_model.clone()),
    );

    let mut messages = Vec::with_capacity(conversation.message_count() + 2);
    messages.push(Message::system(CHAT_PROMPT));
    messages.extend(conversation.messages.iter().cloned());
    messages.push(Message::user(context.apply(&prompt)));

    let options = CallOptions {
        temperature: Some(temperature),
        max_tokens: None,
        reasoning_effort: args.reasoning_effort,
        thinking: args.thinking,
    };
    let result = ctx.invoker.invoke(&spec, &messages, &options).await;

    let response = match (result.is_success(), result.response) {
        (true, Some(response)) => response,
        _ => {
            return Err(ToolError::Invocation {
                model: spec.model,
                message: result.error.unwrap_or_else(|| "empty response".to_string()),
            })
        }
    };

    conversation.push_turn(prompt, response.clone());
    conversation.metadata.provider = result.metadata.provider.map(|p| p.to_string());
    conversation.metadata.model = result.metadata.resolved_model;
    conversation.metadata.tool = Some("chat".to_string());

    let continuation = ctx.persist(conversation).await;
    info!(
        "chat via {} complete, conversation {} now has {} messages",
        spec.model, continuation.id, continuation.message_count
    );

    Ok(ToolResponse {
        content: response,
        continuation,
    })
}
