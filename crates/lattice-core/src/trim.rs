//! Message-list edit strategies applied by `GET /session/{id}/messages`.
//!
//! The only strategy today is `middle_out`: trim interior turns until the
//! estimated token count fits the budget, while keeping the head, the tail,
//! and tool-call/tool-result pairing intact.

use serde::{Deserialize, Serialize};

use crate::error::{LatticeError, Result};
use crate::types::{MessageBlob, MessagePart};

/// One entry of the ordered `edit_strategies` request parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EditStrategy {
    MiddleOut { params: MiddleOutParams },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiddleOutParams {
    pub token_reduce_to: i64,
}

/// Apply strategies in request order.
pub fn apply_strategies(
    messages: Vec<MessageBlob>,
    strategies: &[EditStrategy],
) -> Result<Vec<MessageBlob>> {
    let mut messages = messages;
    for strategy in strategies {
        match strategy {
            EditStrategy::MiddleOut { params } => {
                if params.token_reduce_to <= 0 {
                    return Err(LatticeError::Validation(
                        "middle_out: token_reduce_to must be a positive integer".to_string(),
                    ));
                }
                messages = middle_out(messages, params.token_reduce_to as usize);
            }
        }
    }
    Ok(messages)
}

/// Trim the middle of `messages` until the token estimate fits
/// `token_reduce_to`, or only two messages remain.
///
/// Removal picks index `len / 2` of the current list; for even counts the
/// right-middle goes first, which makes ties deterministic. While the list
/// holds five or more messages that index never touches the first two or
/// the last two. A removed message carrying tool-call parts takes its
/// paired tool-result message with it in the same step (and vice versa).
pub fn middle_out(messages: Vec<MessageBlob>, token_reduce_to: usize) -> Vec<MessageBlob> {
    let mut messages = messages;

    loop {
        if messages.len() <= 2 {
            return messages;
        }
        let total: usize = messages.iter().map(estimate_tokens).sum();
        if total <= token_reduce_to {
            return messages;
        }

        let pivot = messages.len() / 2;
        let mut doomed = partners_of(&messages, pivot);
        doomed.push(pivot);
        doomed.sort_unstable();
        doomed.dedup();
        // Remove back-to-front so earlier indexes stay valid.
        for idx in doomed.into_iter().rev() {
            messages.remove(idx);
        }
    }
}

/// Rough token estimate: four characters per token plus a small per-part
/// overhead for structure.
fn estimate_tokens(message: &MessageBlob) -> usize {
    message
        .parts
        .iter()
        .map(|part| {
            let chars = match part {
                MessagePart::Text { text } => text.len(),
                MessagePart::File { filename, .. } => filename.len(),
                MessagePart::ToolCall { name, arguments, .. } => {
                    name.len() + arguments.to_string().len()
                }
                MessagePart::ToolResult { content, .. } => content.len(),
            };
            chars / 4 + 3
        })
        .sum()
}

/// Indexes of messages paired with `idx` through tool-call ids.
fn partners_of(messages: &[MessageBlob], idx: usize) -> Vec<usize> {
    let mut call_ids: Vec<&str> = Vec::new();
    let mut result_ids: Vec<&str> = Vec::new();
    for part in &messages[idx].parts {
        match part {
            MessagePart::ToolCall { id, .. } => call_ids.push(id),
            MessagePart::ToolResult { tool_call_id, .. } => result_ids.push(tool_call_id),
            _ => {}
        }
    }
    if call_ids.is_empty() && result_ids.is_empty() {
        return Vec::new();
    }

    let mut partners = Vec::new();
    for (i, message) in messages.iter().enumerate() {
        if i == idx {
            continue;
        }
        let paired = message.parts.iter().any(|part| match part {
            MessagePart::ToolResult { tool_call_id, .. } => {
                call_ids.iter().any(|cid| *cid == tool_call_id.as_str())
            }
            MessagePart::ToolCall { id, .. } => {
                result_ids.iter().any(|rid| *rid == id.as_str())
            }
            _ => false,
        });
        if paired {
            partners.push(i);
        }
    }
    partners
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    fn text_msg(text: &str) -> MessageBlob {
        MessageBlob::text(Role::User, text)
    }

    fn long_msg(tag: &str) -> MessageBlob {
        text_msg(&format!("{tag} {}", "x".repeat(200)))
    }

    #[test]
    fn two_messages_never_reduced() {
        let msgs = vec![long_msg("old"), long_msg("new")];
        let out = middle_out(msgs.clone(), 10);
        assert_eq!(out, msgs);
    }

    #[test]
    fn head_and_tail_survive() {
        let msgs: Vec<_> = (0..30).map(|i| long_msg(&format!("msg-{i}"))).collect();
        let out = middle_out(msgs, 500);
        assert!(out.len() < 30);
        let texts: Vec<String> = out.iter().map(|m| m.joined_text()).collect();
        assert!(texts[0].starts_with("msg-0 "));
        assert!(texts[1].starts_with("msg-1 "));
        assert!(texts[out.len() - 2].starts_with("msg-28 "));
        assert!(texts[out.len() - 1].starts_with("msg-29 "));
    }

    #[test]
    fn even_count_removes_right_middle_first() {
        // Each tiny message estimates to 3 tokens; a budget of 10 forces
        // exactly one removal and it must be m2, the right-middle.
        let msgs = vec![text_msg("m0"), text_msg("m1"), text_msg("m2"), text_msg("m3")];
        let out = middle_out(msgs, 10);
        let texts: Vec<String> = out.iter().map(|m| m.joined_text()).collect();
        assert_eq!(texts, vec!["m0", "m1", "m3"]);
    }

    #[test]
    fn aggressive_budget_reduces_to_two() {
        let msgs = vec![text_msg("m0"), text_msg("m1"), text_msg("m2"), text_msg("m3")];
        let out = middle_out(msgs, 7);
        let texts: Vec<String> = out.iter().map(|m| m.joined_text()).collect();
        // m2 goes first (right-middle), then m1 (middle of three).
        assert_eq!(texts, vec!["m0", "m3"]);
    }

    #[test]
    fn tool_pair_removed_together() {
        let call = MessageBlob {
            role: Role::Assistant,
            parts: vec![MessagePart::ToolCall {
                id: "call_1".to_string(),
                name: "f".to_string(),
                arguments: serde_json::json!({}),
            }],
        };
        let result = MessageBlob {
            role: Role::Tool,
            parts: vec![MessagePart::ToolResult {
                tool_call_id: "call_1".to_string(),
                content: "ok ".repeat(100),
                is_error: false,
            }],
        };
        let noise = long_msg("noise");
        let out = middle_out(vec![call, result, noise], 50);

        let has_call = out.iter().any(|m| {
            m.parts
                .iter()
                .any(|p| matches!(p, MessagePart::ToolCall { .. }))
        });
        let has_result = out.iter().any(|m| {
            m.parts
                .iter()
                .any(|p| matches!(p, MessagePart::ToolResult { .. }))
        });
        assert_eq!(has_call, has_result, "pair must survive or vanish together");
        assert!(out.iter().any(|m| m.joined_text().starts_with("noise")));
    }

    #[test]
    fn under_budget_list_untouched() {
        let msgs: Vec<_> = (0..6).map(|i| text_msg(&format!("m{i}"))).collect();
        let out = middle_out(msgs.clone(), 10_000);
        assert_eq!(out, msgs);
    }

    #[test]
    fn strategy_validation_rejects_non_positive() {
        let err = apply_strategies(
            vec![],
            &[EditStrategy::MiddleOut {
                params: MiddleOutParams { token_reduce_to: 0 },
            }],
        )
        .unwrap_err();
        assert!(matches!(err, LatticeError::Validation(_)));
    }
}
