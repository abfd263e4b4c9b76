//! MQ topic names and body schemas.
//!
//! Bodies are JSON with UUIDs serialized as strings. All topics are
//! at-least-once: consumers dedup by content and rely on the coordination
//! locks for singleton execution.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Published by the gateway for every accepted message.
pub const NEW_MESSAGE: &str = "new-message";
/// Published by the buffer controller (or its timer) when a session's
/// pending messages should be drained.
pub const BUFFERED_MESSAGE: &str = "buffered-message";
/// Published by the task agent when a task reaches a terminal state in a
/// learning-enabled session.
pub const SKILL_LEARN_TASK: &str = "skill-learn-task";
/// Published by the distiller once a terminal task has been summarized.
pub const SKILL_LEARN_DISTILLED: &str = "skill-learn-distilled";

/// Body for `new-message` and `buffered-message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertNewMessage {
    pub project_id: Uuid,
    pub session_id: Uuid,
    pub message_id: Uuid,
    /// True only on the timer-fired and retry paths: bypasses the
    /// latest-pending staleness check.
    #[serde(default)]
    pub skip_latest_check: bool,
}

/// Body for `skill-learn-task`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillLearnTask {
    pub project_id: Uuid,
    pub session_id: Uuid,
    pub task_id: Uuid,
}

/// Body for `skill-learn-distilled`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillLearnDistilled {
    pub project_id: Uuid,
    pub session_id: Uuid,
    pub task_id: Uuid,
    pub learning_space_id: Uuid,
    pub distilled_context: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_new_message_defaults_skip_to_false() {
        let body: InsertNewMessage = serde_json::from_value(serde_json::json!({
            "project_id": Uuid::new_v4(),
            "session_id": Uuid::new_v4(),
            "message_id": Uuid::new_v4(),
        }))
        .unwrap();
        assert!(!body.skip_latest_check);
    }

    #[test]
    fn distilled_roundtrip() {
        let body = SkillLearnDistilled {
            project_id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            task_id: Uuid::new_v4(),
            learning_space_id: Uuid::new_v4(),
            distilled_context: "## Task Analysis (Success)".to_string(),
        };
        let json = serde_json::to_string(&body).unwrap();
        let back: SkillLearnDistilled = serde_json::from_str(&json).unwrap();
        assert_eq!(back, body);
    }
}
