//! `consensus`: many models, optional cross-feedback round.

use rmcp::schemars;
use serde::Deserialize;
use tracing::info;

use super::{validate_prompt, validate_temperature, ToolContext, ToolResponse};
use crate::consensus::{prompt::storage_summary, ConsensusRequest, DEFAULT_CONSENSUS_TEMPERATURE};
use crate::error::{ToolError, ToolResult};
use crate::invocation::{CallOptions, ModelSpec};

fn default_true() -> bool {
    true
}

/// Request parameters for the consensus tool
#[derive(Debug, Clone, Deserialize, schemars::JsonSchema)]
pub struct ConsensusArgs {
    #[schemars(description = "The question or proposal every model should analyze")]
    pub prompt: String,
    #[schemars(
        description = "Models to consult, e.g. [{\"model\": \"o3\"}, {\"model\": \"flash\"}]. The same model may appear more than once."
    )]
    pub models: Vec<ModelSpec>,
    #[serde(default, alias = "relevantFiles")]
    #[schemars(description = "Absolute paths of files to include as context")]
    pub relevant_files: Vec<String>,
    #[serde(default)]
    #[schemars(description = "Absolute paths of images to reference")]
    pub images: Vec<String>,
    #[serde(default = "default_true", alias = "enableCrossFeedback")]
    #[schemars(description = "Run a refinement round where each model sees the others' answers (default: true)")]
    pub enable_cross_feedback: bool,
    #[serde(default, alias = "crossFeedbackPrompt")]
    #[schemars(description = "Optional custom instructions for the refinement round")]
    pub cross_feedback_prompt: Option<String>,
    #[schemars(description = "Sampling temperature 0.0-2.0 (default: 0.2)")]
    pub temperature: Option<f32>,
    #[serde(default, alias = "reasoningEffort")]
    #[schemars(description = "Reasoning effort for reasoning models: low, medium or high")]
    pub reasoning_effort: Option<String>,
    #[serde(default, alias = "continuation_id")]
    #[schemars(description = "Continuation id from a previous response to keep the conversation going")]
    pub continuation: Option<String>,
}

impl ConsensusArgs {
    pub fn new(prompt: impl Into<String>, models: &[&str]) -> Self {
        Self {
            prompt: prompt.into(),
            models: models.iter().map(|m| ModelSpec::new(*m)).collect(),
            relevant_files: Vec::new(),
            images: Vec::new(),
            enable_cross_feedback: true,
            cross_feedback_prompt: None,
            temperature: None,
            reasoning_effort: None,
            continuation: None,
        }
    }

    fn validate_models(&self) -> ToolResult<()> {
        if self.models.is_empty() {
            return Err(ToolError::validation("models", "at least one model is required"));
        }
        if let Some(i) = self.models.iter().position(|m| m.model.trim().is_empty()) {
            return Err(ToolError::validation(
                format!("models[{}].model", i),
                "model name must not be empty",
            ));
        }
        Ok(())
    }
}

pub async fn consensus(ctx: &ToolContext, args: ConsensusArgs) -> ToolResult<ToolResponse> {
    let prompt = validate_prompt(&args.prompt)?.to_string();
    args.validate_models()?;
    let temperature = validate_temperature(args.temperature, DEFAULT_CONSENSUS_TEMPERATURE)?;
    ctx.ensure_provider_available()?;

    let mut conversation = ctx.load_conversation(args.continuation.as_deref()).await;
    let context = ctx
        .assemble_context(&args.relevant_files, &args.images)
        .await;

    let models: Vec<ModelSpec> = args
        .models
        .into_iter()
        .map(|m| ModelSpec::new(m.model.trim()))
        .collect();
    let request = ConsensusRequest::new(prompt.clone(), models)
        .with_cross_feedback(args.enable_cross_feedback)
        .with_cross_feedback_prompt(args.cross_feedback_prompt)
        .with_options(CallOptions {
            temperature: Some(temperature),
            max_tokens: None,
            reasoning_effort: args.reasoning_effort,
            thinking: None,
        })
        .with_context(context)
        .with_previous_responses(conversation.metadata.consensus_responses.clone());

    let result = ctx.orchestrator.run(&request).await;
    let content = serde_json::to_string_pretty(&result)?;

    // One summary turn regardless of how many models took part
    let finals = result.final_responses();
    conversation.push_turn(prompt, storage_summary(&result));
    conversation.metadata.provider = Some("multi-model-consensus".to_string());
    conversation.metadata.model = Some(if finals.is_empty() {
        "no successful models".to_string()
    } else {
        finals
            .iter()
            .map(|r| r.model.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    });
    conversation.metadata.tool = Some("consensus".to_string());
    conversation.metadata.consensus_responses = finals;

    let continuation = ctx.persist(conversation).await;
    info!(
        "consensus complete: {}/{} initial, {} refined, conversation {}",
        result.successful_initial_responses,
        result.models_consulted,
        result.refined_responses,
        continuation.id
    );

    Ok(ToolResponse {
        content,
        continuation,
    })
}
