//! The task agent's fixed tool palette.
//!
//! Handlers are synchronous: they only touch the open unit-of-work. A
//! handler that refuses a call returns `LatticeError::Rejected`, which
//! aborts and rolls back the whole iteration; no partial writes survive.

pub mod append;
pub mod control;
pub mod insert;
pub mod preference;
pub mod progress;
pub mod update;

use serde_json::{json, Value};

use lattice_core::{LatticeError, Result};
use lattice_llm::ToolDefinition;
use lattice_store::UnitOfWork;

use crate::ctx::TaskCtx;

/// Parse tool arguments, turning malformed input into a rejection.
pub(crate) fn parse_args<T: serde::de::DeserializeOwned>(name: &str, args: Value) -> Result<T> {
    serde_json::from_value(args)
        .map_err(|e| LatticeError::Rejected(format!("{name}: invalid arguments: {e}")))
}

/// Dispatch one tool call against the current context and transaction.
pub fn dispatch(name: &str, args: Value, ctx: &mut TaskCtx, uow: &UnitOfWork) -> Result<String> {
    match name {
        "insert_task" => insert::insert_task(ctx, uow, args),
        "append_messages_to_task" => append::append_messages_to_task(ctx, uow, args),
        "append_task_progress" => progress::append_task_progress(ctx, uow, args),
        "submit_user_preference" => preference::submit_user_preference(ctx, uow, args),
        "update_task" => update::update_task(ctx, uow, args),
        "report_thinking" => control::report_thinking(ctx, args),
        "finish" => control::finish(ctx),
        other => Err(LatticeError::Rejected(format!("unknown tool: {other}"))),
    }
}

/// Tool schemas in declaration order.
pub fn schemas() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "insert_task".to_string(),
            description: "Insert a new task immediately after the given task order. \
                          Use after_task_order=0 to insert at the front. Trailing tasks \
                          are renumbered."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "after_task_order": {
                        "type": "integer",
                        "description": "Existing task order to insert after; 0 inserts first."
                    },
                    "task_description": {
                        "type": "string",
                        "description": "What this task is about."
                    }
                },
                "required": ["after_task_order", "task_description"]
            }),
        },
        ToolDefinition {
            name: "append_messages_to_task".to_string(),
            description: "Bind pending messages to an existing task and mark them \
                          processed. message_ids are zero-based indexes into the \
                          Pending messages list."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "task_order": {"type": "integer"},
                    "message_ids": {
                        "type": ["array", "null"],
                        "items": {"type": "integer"},
                        "description": "Indexes of the pending messages to bind."
                    }
                },
                "required": ["task_order", "message_ids"]
            }),
        },
        ToolDefinition {
            name: "append_task_progress".to_string(),
            description: "Append a progress note to a task.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "task_order": {"type": "integer"},
                    "progress_text": {"type": "string"}
                },
                "required": ["task_order", "progress_text"]
            }),
        },
        ToolDefinition {
            name: "submit_user_preference".to_string(),
            description: "Record a durable user preference surfaced by this task."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "task_order": {"type": "integer"},
                    "preference_text": {"type": "string"}
                },
                "required": ["task_order", "preference_text"]
            }),
        },
        ToolDefinition {
            name: "update_task".to_string(),
            description: "Change a task's status (pending, running, success, failed) \
                          and optionally its description. Success and failed are \
                          terminal."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "task_order": {"type": "integer"},
                    "status": {
                        "type": "string",
                        "enum": ["pending", "running", "success", "failed"]
                    },
                    "task_description": {"type": ["string", "null"]}
                },
                "required": ["task_order", "status"]
            }),
        },
        ToolDefinition {
            name: "finish".to_string(),
            description: "Signal that the burst is fully absorbed; ends the loop."
                .to_string(),
            parameters: json!({"type": "object", "properties": {}}),
        },
        ToolDefinition {
            name: "report_thinking".to_string(),
            description: "Report a short thought about what you are doing. Call this \
                          at least once in any turn that makes other tool calls."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": {"text": {"type": "string"}},
                "required": ["text"]
            }),
        },
    ]
}
