//! Deterministic backend for development and end-to-end tests.
//!
//! Selected globally with `llm.backend = "mock"` or per project with the
//! `llm_backend` config override. Behavior is keyed off the tool palette of
//! the calling agent and trigger phrases in the input, so pipeline tests
//! run without a network dependency.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::json;

use lattice_core::types::{MessageBlob, MessagePart, Role};

use crate::provider::{
    CompletionRequest, LlmFunction, LlmProvider, LlmResponse, LlmToolCall, ProviderError,
};

/// Trigger for the canned assistant tool-call reply.
pub const TOOL_CALL_TRIGGER: &str = "CALL_TOOL_DISK_LIST";
/// Trigger marking an exchange not worth learning from.
pub const TRIVIAL_TRIGGER: &str = "TRIVIAL";

pub struct MockBackend {
    call_counter: AtomicU64,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            call_counter: AtomicU64::new(0),
        }
    }

    fn call_id(&self, name: &str) -> String {
        let n = self.call_counter.fetch_add(1, Ordering::Relaxed);
        format!("call_mock_{name}_{n}")
    }

    fn tool_call(&self, name: &str, arguments: serde_json::Value) -> LlmToolCall {
        LlmToolCall {
            id: self.call_id(name),
            function: LlmFunction {
                name: name.to_string(),
                arguments,
            },
        }
    }
}

#[async_trait]
impl LlmProvider for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, req: &CompletionRequest) -> Result<LlmResponse, ProviderError> {
        let tool_names: Vec<&str> = req.tools.iter().map(|t| t.name.as_str()).collect();
        let last_user_text = last_text(&req.messages, "user");
        let has_tool_results = req
            .messages
            .iter()
            .any(|m| m.get("role").and_then(|r| r.as_str()) == Some("tool"));

        if tool_names.contains(&"insert_task") {
            return Ok(self.task_agent_turn(&last_user_text, has_tool_results));
        }
        if tool_names.contains(&"report_success_analysis") {
            return Ok(self.distill_turn(&last_user_text));
        }
        if tool_names.contains(&"create_skill") {
            return Ok(self.skill_agent_turn(&last_user_text, has_tool_results));
        }
        Ok(text_response("Hello from the mock backend."))
    }

    fn canned_session_reply(&self, latest_user_text: &str) -> Option<MessageBlob> {
        if latest_user_text.contains(TOOL_CALL_TRIGGER) {
            return Some(MessageBlob {
                role: Role::Assistant,
                parts: vec![
                    MessagePart::Text {
                        text: "I'll list the files on the disk.".to_string(),
                    },
                    MessagePart::ToolCall {
                        id: "call_mock_disk_list".to_string(),
                        name: "disk.list".to_string(),
                        arguments: json!({}),
                    },
                ],
            });
        }
        if latest_user_text.contains("Simple Hello") {
            return Some(MessageBlob::text(
                Role::Assistant,
                "Hello! How can I help you today?",
            ));
        }
        None
    }
}

impl MockBackend {
    /// One full bookkeeping pass: create a task after the current tail,
    /// absorb every pending message, close it out, and finish.
    fn task_agent_turn(&self, input: &str, has_tool_results: bool) -> LlmResponse {
        if has_tool_results {
            return text_response("Task bookkeeping complete.");
        }
        let task_count = parenthesized_count(input, "Current tasks (").unwrap_or(0);
        let pending_count = parenthesized_count(input, "Pending messages (").unwrap_or(1).max(1);
        let new_order = task_count as i64 + 1;
        let message_indexes: Vec<usize> = (0..pending_count).collect();

        let tool_calls = vec![
            self.tool_call(
                "report_thinking",
                json!({"text": "Grouping the new messages into a task."}),
            ),
            self.tool_call(
                "insert_task",
                json!({
                    "after_task_order": task_count,
                    "task_description": format!("Handle: {}", first_line(input)),
                }),
            ),
            self.tool_call(
                "append_messages_to_task",
                json!({"task_order": new_order, "message_ids": message_indexes}),
            ),
            self.tool_call(
                "update_task",
                json!({"task_order": new_order, "status": "success"}),
            ),
            self.tool_call("finish", json!({})),
        ];
        tool_response(tool_calls)
    }

    fn distill_turn(&self, input: &str) -> LlmResponse {
        if input.contains(TRIVIAL_TRIGGER) {
            return tool_response(vec![self.tool_call(
                "report_success_analysis",
                json!({
                    "is_worth_learning": false,
                    "skip_reason": "trivial exchange with no reusable lesson",
                    "goal": "", "plan": "", "outcome": "", "key_lessons": [],
                }),
            )]);
        }
        let failed = input.contains("Task status: failed");
        let tool = if failed {
            "report_failure_analysis"
        } else {
            "report_success_analysis"
        };
        tool_response(vec![self.tool_call(
            tool,
            json!({
                "is_worth_learning": true,
                "goal": "Resolve the user's request captured by the task",
                "plan": "Follow the task progresses in order",
                "outcome": if failed { "The task failed before completion" } else { "The task completed successfully" },
                "key_lessons": ["Confirm requirements before acting"],
            }),
        )])
    }

    fn skill_agent_turn(&self, input: &str, has_tool_results: bool) -> LlmResponse {
        if has_tool_results {
            return text_response("Skill library updated.");
        }
        if input.contains("- **learned-patterns**") {
            // Skill already exists; nothing to change.
            return tool_response(vec![
                self.tool_call(
                    "report_thinking",
                    json!({"text": "Existing skill already covers this lesson."}),
                ),
                self.tool_call("finish", json!({})),
            ]);
        }
        tool_response(vec![
            self.tool_call(
                "report_thinking",
                json!({"text": "Capturing the distilled lesson as a new skill."}),
            ),
            self.tool_call(
                "create_skill",
                json!({
                    "skill_md_content": "---\nname: learned-patterns\ndescription: Lessons distilled from completed tasks\n---\n\n# Learned Patterns\n\n- Confirm requirements before acting\n",
                }),
            ),
            self.tool_call("finish", json!({})),
        ])
    }
}

fn text_response(text: &str) -> LlmResponse {
    LlmResponse {
        role: "assistant".to_string(),
        content: Some(text.to_string()),
        tool_calls: Vec::new(),
        raw_response: json!({"mock": true}),
    }
}

fn tool_response(tool_calls: Vec<LlmToolCall>) -> LlmResponse {
    LlmResponse {
        role: "assistant".to_string(),
        content: None,
        tool_calls,
        raw_response: json!({"mock": true}),
    }
}

fn last_text(messages: &[serde_json::Value], role: &str) -> String {
    messages
        .iter()
        .rev()
        .find(|m| m.get("role").and_then(|r| r.as_str()) == Some(role))
        .and_then(|m| m.get("content").and_then(|c| c.as_str()))
        .unwrap_or_default()
        .to_string()
}

/// Parse the integer inside e.g. `"Pending messages (3)"`.
fn parenthesized_count(text: &str, prefix: &str) -> Option<usize> {
    let start = text.find(prefix)? + prefix.len();
    let rest = &text[start..];
    let end = rest.find(')')?;
    rest[..end].parse().ok()
}

fn first_line(text: &str) -> &str {
    text.lines()
        .find(|l| l.starts_with("[0]"))
        .unwrap_or("incoming messages")
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ToolDefinition;

    fn tool(name: &str) -> ToolDefinition {
        ToolDefinition {
            name: name.to_string(),
            description: String::new(),
            parameters: json!({"type": "object"}),
        }
    }

    fn task_request(content: &str) -> CompletionRequest {
        CompletionRequest {
            model: "mock".to_string(),
            messages: vec![json!({"role": "user", "content": content})],
            tools: vec![tool("insert_task"), tool("finish"), tool("report_thinking")],
            max_tokens: 256,
        }
    }

    #[tokio::test]
    async fn task_turn_binds_every_pending_message() {
        let backend = MockBackend::new();
        let resp = backend
            .complete(&task_request(
                "Current tasks (2):\n...\nPending messages (3):\n[0] user: hi",
            ))
            .await
            .unwrap();
        let names: Vec<&str> = resp
            .tool_calls
            .iter()
            .map(|c| c.function.name.as_str())
            .collect();
        assert_eq!(
            names,
            ["report_thinking", "insert_task", "append_messages_to_task", "update_task", "finish"]
        );
        assert_eq!(resp.tool_calls[1].function.arguments["after_task_order"], 2);
        assert_eq!(
            resp.tool_calls[2].function.arguments["message_ids"],
            json!([0, 1, 2])
        );
        assert_eq!(resp.tool_calls[3].function.arguments["status"], "success");
    }

    #[tokio::test]
    async fn second_iteration_stops() {
        let backend = MockBackend::new();
        let mut req = task_request("Pending messages (1):");
        req.messages
            .push(json!({"role": "tool", "tool_call_id": "x", "content": "ok"}));
        let resp = backend.complete(&req).await.unwrap();
        assert!(!resp.has_tool_calls());
    }

    #[tokio::test]
    async fn distill_trivial_skips() {
        let backend = MockBackend::new();
        let req = CompletionRequest {
            model: "mock".to_string(),
            messages: vec![json!({"role": "user", "content": "user said TRIVIAL thing"})],
            tools: vec![tool("report_success_analysis"), tool("report_failure_analysis")],
            max_tokens: 256,
        };
        let resp = backend.complete(&req).await.unwrap();
        assert_eq!(resp.tool_calls.len(), 1);
        assert_eq!(
            resp.tool_calls[0].function.arguments["is_worth_learning"],
            json!(false)
        );
    }

    #[test]
    fn canned_replies() {
        let backend = MockBackend::new();
        let reply = backend
            .canned_session_reply("CALL_TOOL_DISK_LIST please list files")
            .unwrap();
        assert!(reply.parts.iter().any(|p| matches!(
            p,
            MessagePart::ToolCall { name, .. } if name == "disk.list"
        )));
        assert!(backend.canned_session_reply("Simple Hello").is_some());
        assert!(backend.canned_session_reply("unrelated").is_none());
    }
}
