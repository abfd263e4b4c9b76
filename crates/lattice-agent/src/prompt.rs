//! Prompt assembly for the task agent.

use lattice_store::types::{StoredMessage, Task};

pub const TASK_AGENT_SYSTEM: &str = "\
You are the task bookkeeper for a conversational session. Incoming messages \
arrive in bursts; your job is to keep the session's task list correct:

- Group consecutive messages about one goal into a single task.
- Create a new task (insert_task) only when the conversation moves to a new \
goal; otherwise bind messages to the existing task (append_messages_to_task).
- Record meaningful milestones with append_task_progress and durable user \
preferences with submit_user_preference.
- Keep at most one task pending or running at any time. Close tasks with \
update_task(status=\"success\") or update_task(status=\"failed\") as soon as \
their outcome is clear.
- Call report_thinking before your other tool calls to explain, briefly, \
what you are doing.
- Reference pending messages by their zero-based index in the Pending \
messages list. Every index may be bound at most once.
- Call finish when the burst is fully absorbed.";

/// Render the agent's user message: current tasks plus the frozen pending
/// burst, both with explicit counts.
pub fn pack_task_input(tasks: &[Task], pending: &[StoredMessage]) -> String {
    let mut out = String::new();

    out.push_str(&format!("Current tasks ({}):\n", tasks.len()));
    if tasks.is_empty() {
        out.push_str("(none)\n");
    }
    for task in tasks {
        out.push_str(&render_task(task));
    }

    out.push_str(&format!("\nPending messages ({}):\n", pending.len()));
    for (idx, message) in pending.iter().enumerate() {
        let text = message.blob.joined_text();
        let text = if text.is_empty() {
            "(non-text parts)".to_string()
        } else {
            text
        };
        out.push_str(&format!("[{idx}] {}: {}\n", message.blob.role, text));
    }
    out
}

fn render_task(task: &Task) -> String {
    let mut out = format!(
        "#{} [{}] {}\n",
        task.order, task.status, task.data.task_description
    );
    for progress in &task.data.progresses {
        out.push_str(&format!("    progress: {progress}\n"));
    }
    for preference in &task.data.user_preferences {
        out.push_str(&format!("    preference: {preference}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_core::types::{MessageBlob, Role, TaskData, TaskStatus};
    use uuid::Uuid;

    #[test]
    fn packed_input_has_counts_and_indexes() {
        let task = Task {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            order: 1,
            status: TaskStatus::Running,
            data: TaskData {
                task_description: "ship the report".to_string(),
                progresses: vec!["gathered data".to_string()],
                ..Default::default()
            },
            raw_message_ids: vec![],
        };
        let message = StoredMessage {
            seq: 1,
            id: Uuid::new_v4(),
            session_id: task.session_id,
            blob: MessageBlob::text(Role::User, "please hurry"),
            process_status: lattice_core::types::ProcessStatus::Pending,
            created_at: String::new(),
        };
        let packed = pack_task_input(&[task], &[message]);
        assert!(packed.contains("Current tasks (1):"));
        assert!(packed.contains("#1 [running] ship the report"));
        assert!(packed.contains("progress: gathered data"));
        assert!(packed.contains("Pending messages (1):"));
        assert!(packed.contains("[0] user: please hurry"));
    }
}
