use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Conversational role of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Tool => "tool",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = crate::error::LatticeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            "tool" | "function" => Ok(Role::Tool),
            other => Err(crate::error::LatticeError::Validation(format!(
                "unknown role: {other}"
            ))),
        }
    }
}

/// One typed segment of a message payload.
///
/// This is the vendor-neutral storage representation; the format codecs
/// convert to and from provider shapes at the API boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MessagePart {
    Text {
        text: String,
    },
    File {
        filename: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mime: Option<String>,
        /// Content address in the object store.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        s3_key: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        meta: Option<serde_json::Value>,
    },
    ToolCall {
        id: String,
        name: String,
        arguments: serde_json::Value,
    },
    ToolResult {
        tool_call_id: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
}

/// A full message payload: role plus ordered parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageBlob {
    pub role: Role,
    pub parts: Vec<MessagePart>,
}

impl MessageBlob {
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![MessagePart::Text { text: text.into() }],
        }
    }

    /// Concatenated text of all text parts.
    pub fn joined_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                MessagePart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Agent-pipeline processing state of a stored message.
///
/// Transitions pending → success | failed, never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    Pending,
    Success,
    Failed,
}

impl ProcessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessStatus::Pending => "pending",
            ProcessStatus::Success => "success",
            ProcessStatus::Failed => "failed",
        }
    }
}

impl FromStr for ProcessStatus {
    type Err = crate::error::LatticeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ProcessStatus::Pending),
            "success" => Ok(ProcessStatus::Success),
            "failed" => Ok(ProcessStatus::Failed),
            other => Err(crate::error::LatticeError::Validation(format!(
                "unknown process status: {other}"
            ))),
        }
    }
}

/// Task lifecycle state.
///
/// pending → running | success | failed; running → success | failed.
/// Success and failed are terminal and are the only transitions that
/// enqueue skill learning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Success,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Success => "success",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Failed)
    }

    /// Whether a task may move from `self` to `next`.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        match self {
            TaskStatus::Pending => next != TaskStatus::Pending,
            TaskStatus::Running => next.is_terminal(),
            TaskStatus::Success | TaskStatus::Failed => false,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = crate::error::LatticeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "running" => Ok(TaskStatus::Running),
            "success" => Ok(TaskStatus::Success),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(crate::error::LatticeError::Validation(format!(
                "unknown task status: {other}"
            ))),
        }
    }
}

/// Structured payload of a task's `data` column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskData {
    #[serde(default)]
    pub task_description: String,
    #[serde(default)]
    pub progresses: Vec<String>,
    #[serde(default)]
    pub user_preferences: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sop_thinking: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_serde_roundtrip() {
        let blob = MessageBlob {
            role: Role::Assistant,
            parts: vec![
                MessagePart::Text {
                    text: "hi".to_string(),
                },
                MessagePart::ToolCall {
                    id: "call_1".to_string(),
                    name: "disk.list".to_string(),
                    arguments: serde_json::json!({"path": "/"}),
                },
            ],
        };
        let json = serde_json::to_string(&blob).unwrap();
        assert!(json.contains(r#""type":"tool-call""#));
        let back: MessageBlob = serde_json::from_str(&json).unwrap();
        assert_eq!(back, blob);
    }

    #[test]
    fn status_transitions() {
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::Running));
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::Success));
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Failed));
        assert!(!TaskStatus::Running.can_transition_to(TaskStatus::Pending));
        assert!(!TaskStatus::Success.can_transition_to(TaskStatus::Running));
        assert!(!TaskStatus::Failed.can_transition_to(TaskStatus::Failed));
    }

    #[test]
    fn unknown_role_is_validation_error() {
        assert!("robot".parse::<Role>().is_err());
        assert!("function".parse::<Role>().is_ok());
    }
}
