//! Prompt text for the consensus phases and its stored summary.

use crate::continuation::ModelResponseRecord;

use super::ConsensusResult;

const REFINEMENT_INSTRUCTIONS: &str = "Review all solutions including yours. Focus on:

1. Is there a better approach here that you missed?
2. Does someone have a key insight that makes the problem simpler?
3. Can you improve on the best approach you see?

If you see a superior solution, adopt and enhance it.
If your approach remains best, explain why clearly.
Don't defend for the sake of defending - find what actually works best.

IMPORTANT: Your response will replace your initial one, so make it complete and self-contained.
Use the same format as before.";

/// Build the Phase 2 prompt for one model.
///
/// `peers` are the other successful Phase 1 answers, the model's own answer
/// already excluded. A custom prompt replaces the refinement instructions; the
/// original question and the answers are always included.
pub fn cross_feedback_prompt(
    original_prompt: &str,
    own_response: &str,
    peers: &[(&str, &str)],
    custom_instructions: Option<&str>,
) -> String {
    let mut prompt = format!(
        "You previously analyzed the following question/proposal:\n\n{}\n\n\
         Your initial response was:\n{}\n\n",
        original_prompt, own_response
    );

    if peers.is_empty() {
        prompt.push_str(
            "No other model produced a usable response to this question, \
             so there are no other perspectives to compare against.\n",
        );
    } else {
        prompt.push_str(
            "Other AI models have also provided their perspectives on this same question. \
             Here are their responses:\n",
        );
        for (i, (model, response)) in peers.iter().enumerate() {
            prompt.push_str(&format!("\n=== Response {} from {} ===\n{}\n", i + 1, model, response));
        }
    }

    prompt.push_str("\n=== OTHER APPROACHES ===\n\n");
    match custom_instructions.map(str::trim).filter(|c| !c.is_empty()) {
        Some(custom) => prompt.push_str(custom),
        None => prompt.push_str(REFINEMENT_INSTRUCTIONS),
    }
    prompt
}

/// Stands in for history that would not fit the model's context window
pub const HISTORY_TRUNCATED: &str = "[Previous conversation history truncated due to size limits]";

/// History shown to `model` when a consensus conversation continues.
///
/// A model that answered last time sees only its own answer; a newcomer sees
/// everyone's. `occurrence` counts earlier entries of the same model in this
/// request, so the n-th `o3` gets the n-th previous `o3` answer (or the last
/// one when there were fewer).
pub fn model_history(
    model: &str,
    occurrence: usize,
    previous: &[ModelResponseRecord],
) -> Option<String> {
    if previous.is_empty() {
        return None;
    }

    let own: Vec<&ModelResponseRecord> = previous.iter().filter(|r| r.model == model).collect();
    if let Some(own) = own.get(occurrence).or(own.last()) {
        return Some(format!("=== YOUR PREVIOUS RESPONSE ===\n\n{}\n", own.response));
    }

    let mut history = String::from("=== PREVIOUS MODEL RESPONSES ===\n");
    for record in previous {
        history.push_str(&format!(
            "\n--- {}'s response ---\n{}\n",
            record.model, record.response
        ));
    }
    Some(history)
}

/// Prefix a question with continuation history
pub fn with_history(prompt: &str, history: Option<&str>) -> String {
    match history {
        Some(h) => format!("{}\n\nNEW QUESTION:\n{}", h, prompt),
        None => prompt.to_string(),
    }
}

/// The single assistant turn stored for a consensus call
pub fn storage_summary(result: &ConsensusResult) -> String {
    let finals = result.final_responses();
    let mut summary = format!("Consensus gathering complete - {} models responded", finals.len());

    if !finals.is_empty() {
        summary.push_str("\n\nModel responses:");
        for record in &finals {
            summary.push_str(&format!("\n\n--- {} ---\n{}", record.model, record.response));
        }
    }

    if !result.failed_models.is_empty() {
        summary.push_str(&format!("\n\nFailed models: {}", result.failed_models.len()));
        for failed in &result.failed_models {
            summary.push_str(&format!("\n- {}: {}", failed.model, failed.error));
        }
    }
    summary
}
