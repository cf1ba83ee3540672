//! Consensus orchestration
//!
//! Two concurrent rounds over the requested models:
//!
//! ```text
//! Idle ─► Phase1Running ─► Phase1Complete ─┬─► Phase2Running ─► Phase2Complete ─┬─► Done
//!                                          └─► SkippedPhase2 ───────────────────┘
//! ```
//!
//! Phase 1 asks every model the same question. Phase 2 (cross-feedback) shows
//! each successful model the other models' answers and lets it revise its
//! own. Each phase is a barrier: every call settles, success or error, before
//! the next step. Results keep request order, not completion order.

pub mod prompt;

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::context::{estimate_tokens, PromptContext};
use crate::continuation::ModelResponseRecord;
use crate::invocation::{CallOptions, InvocationMetadata, InvocationResult, InvocationStatus, Invoker, ModelSpec};
use crate::prompts::{CONSENSUS_NEXT_STEPS, CONSENSUS_PROMPT};
use crate::providers::Message;

/// Default sampling temperature for consensus calls
pub const DEFAULT_CONSENSUS_TEMPERATURE: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusState {
    Idle,
    Phase1Running,
    Phase1Complete,
    Phase2Running,
    Phase2Complete,
    SkippedPhase2,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusStatus {
    ConsensusComplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Initial,
    Refinement,
}

/// Phase 2 outcome for one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinedResult {
    pub model: String,
    pub status: InvocationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refined_response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub metadata: InvocationMetadata,
    /// The Phase 1 answer this refinement started from
    #[serde(skip)]
    pub initial_response: String,
    /// Index of the originating ModelSpec
    #[serde(skip)]
    pub position: usize,
}

impl RefinedResult {
    pub fn is_success(&self) -> bool {
        self.status == InvocationStatus::Success
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedModel {
    pub model: String,
    pub error: String,
    pub phase: Phase,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phases {
    pub initial: Vec<InvocationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refined: Option<Vec<RefinedResult>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub status: ConsensusStatus,
    pub models_consulted: usize,
    pub successful_initial_responses: usize,
    pub refined_responses: usize,
    pub phases: Phases,
    pub failed_models: Vec<FailedModel>,
    pub next_steps: String,
    /// States the run passed through
    #[serde(skip)]
    pub transitions: Vec<ConsensusState>,
}

impl ConsensusResult {
    /// Aggregate phase outputs; every count is derived from the arrays
    pub fn from_phases(initial: Vec<InvocationResult>, refined: Option<Vec<RefinedResult>>) -> Self {
        let mut failed_models: Vec<FailedModel> = initial
            .iter()
            .filter(|r| !r.is_success())
            .map(|r| FailedModel {
                model: r.model.clone(),
                error: r.error.clone().unwrap_or_default(),
                phase: Phase::Initial,
            })
            .collect();
        if let Some(refined) = &refined {
            failed_models.extend(refined.iter().filter(|r| !r.is_success()).map(|r| {
                FailedModel {
                    model: r.model.clone(),
                    error: r.error.clone().unwrap_or_default(),
                    phase: Phase::Refinement,
                }
            }));
        }

        Self {
            status: ConsensusStatus::ConsensusComplete,
            models_consulted: initial.len(),
            successful_initial_responses: initial.iter().filter(|r| r.is_success()).count(),
            refined_responses: refined
                .as_ref()
                .map_or(0, |r| r.iter().filter(|r| r.is_success()).count()),
            phases: Phases { initial, refined },
            failed_models,
            next_steps: CONSENSUS_NEXT_STEPS.to_string(),
            transitions: Vec::new(),
        }
    }

    /// Final answer per successful model: the refined one when present
    pub fn final_responses(&self) -> Vec<ModelResponseRecord> {
        self.phases
            .initial
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_success())
            .filter_map(|(i, initial)| {
                let refined = self.phases.refined.as_ref().and_then(|refined| {
                    refined
                        .iter()
                        .find(|r| r.position == i && r.is_success())
                        .and_then(|r| r.refined_response.clone())
                });
                refined
                    .or_else(|| initial.response.clone())
                    .map(|response| ModelResponseRecord {
                        model: initial.model.clone(),
                        response,
                    })
            })
            .collect()
    }
}

/// Input to one consensus run
#[derive(Debug, Clone)]
pub struct ConsensusRequest {
    pub prompt: String,
    pub models: Vec<ModelSpec>,
    pub enable_cross_feedback: bool,
    /// Replaces the default refinement instructions
    pub cross_feedback_prompt: Option<String>,
    pub options: CallOptions,
    pub system_prompt: String,
    /// Rendered files and images, appended to the Phase 1 question
    pub context: PromptContext,
    /// Answers from the previous consensus turn of this conversation
    pub previous_responses: Vec<ModelResponseRecord>,
}

impl ConsensusRequest {
    pub fn new(prompt: impl Into<String>, models: Vec<ModelSpec>) -> Self {
        Self {
            prompt: prompt.into(),
            models,
            enable_cross_feedback: true,
            cross_feedback_prompt: None,
            options: CallOptions {
                temperature: Some(DEFAULT_CONSENSUS_TEMPERATURE),
                ..Default::default()
            },
            system_prompt: CONSENSUS_PROMPT.to_string(),
            context: PromptContext::default(),
            previous_responses: Vec::new(),
        }
    }

    pub fn with_cross_feedback(mut self, enabled: bool) -> Self {
        self.enable_cross_feedback = enabled;
        self
    }

    pub fn with_cross_feedback_prompt(mut self, prompt: Option<String>) -> Self {
        self.cross_feedback_prompt = prompt;
        self
    }

    pub fn with_options(mut self, options: CallOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_context(mut self, context: PromptContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_previous_responses(mut self, previous: Vec<ModelResponseRecord>) -> Self {
        self.previous_responses = previous;
        self
    }

    fn messages_for(&self, question: &str) -> Vec<Message> {
        vec![
            Message::system(&self.system_prompt),
            Message::user(self.context.apply(question)),
        ]
    }

    /// Phase 1 messages for the model at `position`, sized to its context
    /// window. History that does not fit is replaced by a truncation marker;
    /// if the prompt still does not fit, the error describes why.
    pub fn initial_messages(
        &self,
        position: usize,
        context_window: Option<u64>,
    ) -> Result<Vec<Message>, String> {
        let spec = &self.models[position];
        let occurrence = self.models[..position]
            .iter()
            .filter(|m| m.model == spec.model)
            .count();
        let history = prompt::model_history(&spec.model, occurrence, &self.previous_responses);
        let messages = self.messages_for(&prompt::with_history(&self.prompt, history.as_deref()));
        let estimate = estimate_tokens(&messages);
        debug!("Phase 1 prompt for {}: ~{} tokens", spec.model, estimate);

        let Some(limit) = context_window else {
            return Ok(messages);
        };
        if estimate <= limit {
            return Ok(messages);
        }

        if history.is_some() {
            let truncated = self.messages_for(&prompt::with_history(
                &self.prompt,
                Some(prompt::HISTORY_TRUNCATED),
            ));
            let estimate = estimate_tokens(&truncated);
            if estimate <= limit {
                warn!(
                    "History for {} exceeds its {}-token window, sending the question without it",
                    spec.model, limit
                );
                return Ok(truncated);
            }
        }

        Err(format!(
            "Prompt too large for {}: ~{} tokens exceeds its {}-token context window",
            spec.model, estimate, limit
        ))
    }
}

/// Shared reference to a ConsensusOrchestrator
pub type SharedConsensusOrchestrator = Arc<ConsensusOrchestrator>;

pub struct ConsensusOrchestrator {
    invoker: Arc<Invoker>,
}

impl ConsensusOrchestrator {
    pub fn new(invoker: Arc<Invoker>) -> Self {
        Self { invoker }
    }

    pub fn shared(self) -> SharedConsensusOrchestrator {
        Arc::new(self)
    }

    /// Run both phases. Never fails: per-model errors are in the result.
    pub async fn run(&self, request: &ConsensusRequest) -> ConsensusResult {
        let mut transitions = vec![ConsensusState::Idle];
        let mut enter = |state: ConsensusState| {
            debug!("Consensus state -> {:?}", state);
            transitions.push(state);
        };

        enter(ConsensusState::Phase1Running);
        info!("Phase 1: consulting {} models", request.models.len());
        let initial = self.run_initial(request).await;
        enter(ConsensusState::Phase1Complete);

        let successes = initial.iter().filter(|r| r.is_success()).count();
        info!(
            "Phase 1 complete: {}/{} models succeeded",
            successes,
            initial.len()
        );

        let refined = if request.enable_cross_feedback && successes > 0 {
            enter(ConsensusState::Phase2Running);
            info!("Phase 2: cross-feedback for {} models", successes);
            let refined = self.run_refinement(request, &initial).await;
            enter(ConsensusState::Phase2Complete);
            info!(
                "Phase 2 complete: {}/{} refinements succeeded",
                refined.iter().filter(|r| r.is_success()).count(),
                refined.len()
            );
            Some(refined)
        } else {
            enter(ConsensusState::SkippedPhase2);
            None
        };

        enter(ConsensusState::Done);
        let mut result = ConsensusResult::from_phases(initial, refined);
        result.transitions = transitions;
        result
    }

    async fn run_initial(&self, request: &ConsensusRequest) -> Vec<InvocationResult> {
        let calls = request.models.iter().enumerate().map(|(position, spec)| {
            let invoker = &self.invoker;
            let prepared = request.initial_messages(position, invoker.context_window(spec));
            async move {
                match prepared {
                    Ok(messages) => invoker.invoke(spec, &messages, &request.options).await,
                    Err(reason) => {
                        warn!("Model {} skipped: {}", spec.model, reason);
                        InvocationResult::failure(spec.model.clone(), reason, Duration::ZERO)
                    }
                }
            }
        });
        join_all(calls).await
    }

    async fn run_refinement(
        &self,
        request: &ConsensusRequest,
        initial: &[InvocationResult],
    ) -> Vec<RefinedResult> {
        let successes: Vec<(usize, &str, &str)> = initial
            .iter()
            .enumerate()
            .filter_map(|(i, r)| {
                r.response
                    .as_deref()
                    .filter(|_| r.is_success())
                    .map(|resp| (i, r.model.as_str(), resp))
            })
            .collect();

        let calls = successes.iter().map(|&(position, model, own)| {
            let peers: Vec<(&str, &str)> = successes
                .iter()
                .filter(|(j, _, _)| *j != position)
                .map(|&(_, m, resp)| (m, resp))
                .collect();
            let feedback = prompt::cross_feedback_prompt(
                &request.prompt,
                own,
                &peers,
                request.cross_feedback_prompt.as_deref(),
            );
            let messages = vec![Message::system(&request.system_prompt), Message::user(feedback)];
            let spec = &request.models[position];
            let invoker = &self.invoker;

            async move {
                let result = invoker.invoke(spec, &messages, &request.options).await;
                RefinedResult {
                    model: model.to_string(),
                    status: result.status,
                    refined_response: result.response,
                    error: result.error,
                    metadata: result.metadata,
                    initial_response: own.to_string(),
                    position,
                }
            }
        });
        join_all(calls).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success(model: &str, response: &str) -> InvocationResult {
        InvocationResult {
            model: model.to_string(),
            status: InvocationStatus::Success,
            response: Some(response.to_string()),
            error: None,
            metadata: InvocationMetadata::default(),
        }
    }

    fn refined(position: usize, model: &str, response: &str) -> RefinedResult {
        RefinedResult {
            model: model.to_string(),
            status: InvocationStatus::Success,
            refined_response: Some(response.to_string()),
            error: None,
            metadata: InvocationMetadata::default(),
            initial_response: String::new(),
            position,
        }
    }

    #[test]
    fn test_counts_are_derived_from_arrays() {
        let initial = vec![
            success("A", "4"),
            InvocationResult::failure("B", "rate limited", Duration::from_millis(5)),
            success("C", "four"),
        ];
        let result = ConsensusResult::from_phases(initial, None);
        assert_eq!(result.models_consulted, 3);
        assert_eq!(result.successful_initial_responses, 2);
        assert_eq!(result.refined_responses, 0);
        assert_eq!(result.failed_models.len(), 1);
        assert_eq!(result.failed_models[0].phase, Phase::Initial);
    }

    #[test]
    fn test_final_responses_prefer_refined_by_position() {
        // Same model twice: only the second instance was refined
        let initial = vec![success("A", "first"), success("A", "second")];
        let result = ConsensusResult::from_phases(initial, Some(vec![refined(1, "A", "second, refined")]));
        let finals = result.final_responses();
        assert_eq!(finals.len(), 2);
        assert_eq!(finals[0].response, "first");
        assert_eq!(finals[1].response, "second, refined");
    }

    #[test]
    fn test_serialized_shape() {
        let initial = vec![success("A", "4")];
        let mut r = refined(0, "A", "4, still");
        r.initial_response = "4".to_string();
        let result = ConsensusResult::from_phases(initial, Some(vec![r]));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "consensus_complete");
        assert_eq!(json["refined_responses"], 1);
        assert_eq!(json["phases"]["refined"][0]["refined_response"], "4, still");
        // The initial answer is not repeated inside the refined entry
        assert!(json["phases"]["refined"][0].get("initial_response").is_none());
        assert!(json.get("transitions").is_none());
    }

    #[test]
    fn test_refined_absent_when_skipped() {
        let result = ConsensusResult::from_phases(vec![success("A", "4")], None);
        let json = serde_json::to_value(&result).unwrap();
        assert!(json["phases"].get("refined").is_none());
    }

    #[test]
    fn test_storage_summary_lists_final_and_failed() {
        let initial = vec![
            success("A", "4"),
            InvocationResult::failure("B", "timeout", Duration::from_millis(1)),
        ];
        let result = ConsensusResult::from_phases(initial, None);
        let summary = prompt::storage_summary(&result);
        assert!(summary.starts_with("Consensus gathering complete - 1 models responded"));
        assert!(summary.contains("--- A ---\n4"));
        assert!(summary.contains("Failed models: 1\n- B: timeout"));
    }

    fn record(model: &str, response: &str) -> ModelResponseRecord {
        ModelResponseRecord {
            model: model.to_string(),
            response: response.to_string(),
        }
    }

    #[test]
    fn test_oversized_history_is_truncated() {
        let request = ConsensusRequest::new("What now?", vec![ModelSpec::new("o3")])
            .with_previous_responses(vec![record("o3", &"x".repeat(40_000))]);
        let budget = estimate_tokens(&request.messages_for("What now?")) + 100;

        let full = request.initial_messages(0, None).unwrap();
        assert!(full[1].content.contains("=== YOUR PREVIOUS RESPONSE ==="));

        let fitted = request.initial_messages(0, Some(budget)).unwrap();
        assert_eq!(
            fitted[1].content,
            format!("{}\n\nNEW QUESTION:\nWhat now?", prompt::HISTORY_TRUNCATED)
        );
    }

    #[test]
    fn test_prompt_that_never_fits_is_an_error() {
        let request = ConsensusRequest::new("y".repeat(10_000), vec![ModelSpec::new("o3")])
            .with_previous_responses(vec![record("o3", "short")]);
        let err = request.initial_messages(0, Some(100)).unwrap_err();
        assert!(err.contains("Prompt too large for o3"));
        assert!(err.contains("100-token context window"));
    }

    #[test]
    fn test_duplicate_models_take_history_by_occurrence() {
        let request = ConsensusRequest::new("again", vec![ModelSpec::new("A"), ModelSpec::new("A")])
            .with_previous_responses(vec![record("A", "first"), record("A", "second")]);
        let first = request.initial_messages(0, None).unwrap();
        let second = request.initial_messages(1, None).unwrap();
        assert!(first[1].content.contains("first") && !first[1].content.contains("second"));
        assert!(second[1].content.contains("second"));
    }
}
