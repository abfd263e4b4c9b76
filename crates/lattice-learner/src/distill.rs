//! Distillation: one LLM call that converts a terminal task's history into
//! a structured "what was learned" analysis.

use serde::Deserialize;
use serde_json::json;

use lattice_core::{LatticeError, Result};
use lattice_llm::{LlmResponse, ToolDefinition};
use lattice_store::types::{StoredMessage, Task};

pub const REPORT_SUCCESS_ANALYSIS: &str = "report_success_analysis";
pub const REPORT_FAILURE_ANALYSIS: &str = "report_failure_analysis";

pub const DISTILL_SYSTEM: &str = "\
You analyze one completed task from a conversational session and decide \
whether it holds a lesson worth keeping. Call report_success_analysis for a \
task that succeeded, report_failure_analysis for one that failed. If the \
exchange is trivial (greetings, small talk, nothing reusable), set \
is_worth_learning to false with a short skip_reason. Exactly one tool call, \
always.";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Analysis {
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub plan: String,
    #[serde(default)]
    pub outcome: String,
    #[serde(default)]
    pub key_lessons: Vec<String>,
}

/// Tagged outcome of the distillation call.
#[derive(Debug, Clone, PartialEq)]
pub enum DistillationOutcome {
    Success(Analysis),
    Failure(Analysis),
    Skip { reason: String },
}

#[derive(Debug, Deserialize)]
struct AnalysisArgs {
    is_worth_learning: bool,
    #[serde(default)]
    skip_reason: Option<String>,
    #[serde(flatten)]
    analysis: Analysis,
}

/// The distiller's two-tool palette.
pub fn tool_schemas() -> Vec<ToolDefinition> {
    let parameters = json!({
        "type": "object",
        "properties": {
            "is_worth_learning": {
                "type": "boolean",
                "description": "False when the task holds nothing reusable."
            },
            "skip_reason": {
                "type": ["string", "null"],
                "description": "Why the task was skipped; only when is_worth_learning is false."
            },
            "goal": {"type": "string", "description": "What the task set out to do."},
            "plan": {"type": "string", "description": "How it was approached."},
            "outcome": {"type": "string", "description": "What actually happened."},
            "key_lessons": {
                "type": "array",
                "items": {"type": "string"},
                "description": "Reusable lessons, most important first."
            }
        },
        "required": ["is_worth_learning", "goal", "plan", "outcome", "key_lessons"]
    });
    vec![
        ToolDefinition {
            name: REPORT_SUCCESS_ANALYSIS.to_string(),
            description: "Report the analysis of a task that succeeded.".to_string(),
            parameters: parameters.clone(),
        },
        ToolDefinition {
            name: REPORT_FAILURE_ANALYSIS.to_string(),
            description: "Report the analysis of a task that failed.".to_string(),
            parameters,
        },
    ]
}

/// Render the distillation input: task metadata plus the full transcript.
pub fn pack_distillation_input(task: &Task, messages: &[StoredMessage]) -> String {
    let mut out = String::new();
    out.push_str(&format!("Task status: {}\n", task.status));
    out.push_str(&format!("Task description: {}\n", task.data.task_description));
    if !task.data.progresses.is_empty() {
        out.push_str("Progresses:\n");
        for p in &task.data.progresses {
            out.push_str(&format!("- {p}\n"));
        }
    }
    if !task.data.user_preferences.is_empty() {
        out.push_str("User preferences:\n");
        for p in &task.data.user_preferences {
            out.push_str(&format!("- {p}\n"));
        }
    }
    out.push_str("\nTranscript:\n");
    for message in messages {
        out.push_str(&format!(
            "{}: {}\n",
            message.blob.role,
            message.blob.joined_text()
        ));
    }
    out
}

/// Parse the distiller's single tool call.
pub fn extract_distillation_result(response: &LlmResponse) -> Result<DistillationOutcome> {
    let [call] = response.tool_calls.as_slice() else {
        return Err(LatticeError::LlmProvider(format!(
            "distillation expected exactly one tool call, got {}",
            response.tool_calls.len()
        )));
    };

    let args: AnalysisArgs = serde_json::from_value(call.function.arguments.clone())
        .map_err(|e| LatticeError::LlmProvider(format!("bad distillation arguments: {e}")))?;

    if !args.is_worth_learning {
        return Ok(DistillationOutcome::Skip {
            reason: args
                .skip_reason
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| "no reason given".to_string()),
        });
    }
    match call.function.name.as_str() {
        REPORT_SUCCESS_ANALYSIS => Ok(DistillationOutcome::Success(args.analysis)),
        REPORT_FAILURE_ANALYSIS => Ok(DistillationOutcome::Failure(args.analysis)),
        other => Err(LatticeError::LlmProvider(format!(
            "unexpected distillation tool: {other}"
        ))),
    }
}

/// Format the distilled context handed to the skill agent.
pub fn format_distilled(outcome: &DistillationOutcome) -> Option<String> {
    let (label, analysis) = match outcome {
        DistillationOutcome::Success(a) => ("Success", a),
        DistillationOutcome::Failure(a) => ("Failure", a),
        DistillationOutcome::Skip { .. } => return None,
    };
    let mut out = format!("## Task Analysis ({label})\n");
    out.push_str(&format!("**Goal:** {}\n", analysis.goal));
    out.push_str(&format!("**Plan:** {}\n", analysis.plan));
    out.push_str(&format!("**Outcome:** {}\n", analysis.outcome));
    if !analysis.key_lessons.is_empty() {
        out.push_str("**Key Lessons:**\n");
        for lesson in &analysis.key_lessons {
            out.push_str(&format!("- {lesson}\n"));
        }
    }
    Some(out)
}
