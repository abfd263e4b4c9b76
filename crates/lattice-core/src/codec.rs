//! Message format codecs.
//!
//! The store keeps the native parts representation; these codecs convert at
//! the API boundary. `acontext` is the native shape, `openai` is role +
//! content/tool_calls, `anthropic` is role + content blocks.

use std::str::FromStr;

use serde_json::{json, Value};

use crate::error::{LatticeError, Result};
use crate::types::{MessageBlob, MessagePart, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFormat {
    Acontext,
    Openai,
    Anthropic,
}

impl MessageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageFormat::Acontext => "acontext",
            MessageFormat::Openai => "openai",
            MessageFormat::Anthropic => "anthropic",
        }
    }
}

impl FromStr for MessageFormat {
    type Err = LatticeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "acontext" => Ok(MessageFormat::Acontext),
            "openai" => Ok(MessageFormat::Openai),
            "anthropic" => Ok(MessageFormat::Anthropic),
            other => Err(LatticeError::Validation(format!(
                "unknown message format: {other}"
            ))),
        }
    }
}

/// Decode a request blob in the given format into the native representation.
pub fn decode(format: MessageFormat, blob: &Value) -> Result<MessageBlob> {
    match format {
        MessageFormat::Acontext => decode_acontext(blob),
        MessageFormat::Openai => decode_openai(blob),
        MessageFormat::Anthropic => decode_anthropic(blob),
    }
}

/// Encode a native message into the given format.
pub fn encode(format: MessageFormat, blob: &MessageBlob) -> Value {
    match format {
        MessageFormat::Acontext => encode_acontext(blob),
        MessageFormat::Openai => encode_openai(blob),
        MessageFormat::Anthropic => encode_anthropic(blob),
    }
}

fn decode_acontext(blob: &Value) -> Result<MessageBlob> {
    serde_json::from_value(blob.clone()).map_err(|e| {
        LatticeError::Validation(format!("invalid acontext message blob: {e}"))
    })
}

fn encode_acontext(blob: &MessageBlob) -> Value {
    // Native representation serializes directly.
    serde_json::to_value(blob).unwrap_or(Value::Null)
}

fn role_of(blob: &Value) -> Result<Role> {
    blob.get("role")
        .and_then(|v| v.as_str())
        .ok_or_else(|| LatticeError::Validation("message blob missing 'role'".to_string()))?
        .parse()
}

fn decode_openai(blob: &Value) -> Result<MessageBlob> {
    let role = role_of(blob)?;
    let mut parts = Vec::new();

    if let Some(text) = blob.get("content").and_then(|v| v.as_str()) {
        if !text.is_empty() {
            if role == Role::Tool {
                let tool_call_id = blob
                    .get("tool_call_id")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| {
                        LatticeError::Validation(
                            "openai tool message missing 'tool_call_id'".to_string(),
                        )
                    })?;
                parts.push(MessagePart::ToolResult {
                    tool_call_id: tool_call_id.to_string(),
                    content: text.to_string(),
                    is_error: false,
                });
            } else {
                parts.push(MessagePart::Text {
                    text: text.to_string(),
                });
            }
        }
    }

    if let Some(calls) = blob.get("tool_calls").and_then(|v| v.as_array()) {
        for call in calls {
            let id = call
                .get("id")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let function = call.get("function").cloned().unwrap_or(Value::Null);
            let name = function
                .get("name")
                .and_then(|v| v.as_str())
                .ok_or_else(|| {
                    LatticeError::Validation("openai tool_call missing function.name".to_string())
                })?
                .to_string();
            let arguments = parse_arguments(function.get("arguments"));
            parts.push(MessagePart::ToolCall {
                id,
                name,
                arguments,
            });
        }
    }

    if parts.is_empty() {
        return Err(LatticeError::Validation(
            "openai message has neither content nor tool_calls".to_string(),
        ));
    }
    Ok(MessageBlob { role, parts })
}

fn encode_openai(blob: &MessageBlob) -> Value {
    // A tool-result part forces the `tool` role shape.
    if let Some(MessagePart::ToolResult {
        tool_call_id,
        content,
        ..
    }) = blob
        .parts
        .iter()
        .find(|p| matches!(p, MessagePart::ToolResult { .. }))
    {
        return json!({
            "role": "tool",
            "tool_call_id": tool_call_id,
            "content": content,
        });
    }

    let text = blob.joined_text();
    let tool_calls: Vec<Value> = blob
        .parts
        .iter()
        .filter_map(|p| match p {
            MessagePart::ToolCall {
                id,
                name,
                arguments,
            } => Some(json!({
                "id": id,
                "type": "function",
                "function": {"name": name, "arguments": arguments.to_string()},
            })),
            _ => None,
        })
        .collect();

    let mut out = json!({
        "role": blob.role.as_str(),
        "content": if text.is_empty() { Value::Null } else { Value::String(text) },
    });
    if !tool_calls.is_empty() {
        out["tool_calls"] = Value::Array(tool_calls);
    }
    out
}

fn decode_anthropic(blob: &Value) -> Result<MessageBlob> {
    let role = role_of(blob)?;
    let mut parts = Vec::new();

    match blob.get("content") {
        Some(Value::String(text)) => parts.push(MessagePart::Text { text: text.clone() }),
        Some(Value::Array(blocks)) => {
            for block in blocks {
                match block.get("type").and_then(|v| v.as_str()) {
                    Some("text") => parts.push(MessagePart::Text {
                        text: block
                            .get("text")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                    }),
                    Some("tool_use") => parts.push(MessagePart::ToolCall {
                        id: block
                            .get("id")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        name: block
                            .get("name")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        arguments: block.get("input").cloned().unwrap_or(json!({})),
                    }),
                    Some("tool_result") => parts.push(MessagePart::ToolResult {
                        tool_call_id: block
                            .get("tool_use_id")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        content: content_block_text(block.get("content")),
                        is_error: block
                            .get("is_error")
                            .and_then(|v| v.as_bool())
                            .unwrap_or(false),
                    }),
                    other => {
                        return Err(LatticeError::Validation(format!(
                            "unsupported anthropic content block: {other:?}"
                        )))
                    }
                }
            }
        }
        _ => {
            return Err(LatticeError::Validation(
                "anthropic message missing 'content'".to_string(),
            ))
        }
    }

    Ok(MessageBlob { role, parts })
}

/// Anthropic tool_result content can be a string or a list of text blocks.
fn content_block_text(content: Option<&Value>) -> String {
    match content {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(blocks)) => blocks
            .iter()
            .filter_map(|b| b.get("text").and_then(|v| v.as_str()))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

fn encode_anthropic(blob: &MessageBlob) -> Value {
    let blocks: Vec<Value> = blob
        .parts
        .iter()
        .filter_map(|p| match p {
            MessagePart::Text { text } => Some(json!({"type": "text", "text": text})),
            MessagePart::ToolCall {
                id,
                name,
                arguments,
            } => Some(json!({
                "type": "tool_use", "id": id, "name": name, "input": arguments,
            })),
            MessagePart::ToolResult {
                tool_call_id,
                content,
                is_error,
            } => Some(json!({
                "type": "tool_result", "tool_use_id": tool_call_id,
                "content": content, "is_error": is_error,
            })),
            MessagePart::File { .. } => None,
        })
        .collect();

    // Anthropic has no tool role; tool results ride in a user turn.
    let role = match blob.role {
        Role::Tool => "user",
        other => other.as_str(),
    };
    json!({"role": role, "content": blocks})
}

/// Parse an OpenAI `function.arguments` field; a JSON-encoded string, or
/// occasionally an already-decoded object.
pub fn parse_arguments(arguments: Option<&Value>) -> Value {
    match arguments {
        Some(Value::String(s)) => serde_json::from_str(s).unwrap_or(json!({})),
        Some(v @ Value::Object(_)) => v.clone(),
        _ => json!({}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acontext_roundtrip_preserves_parts() {
        let blob = MessageBlob {
            role: Role::User,
            parts: vec![
                MessagePart::Text {
                    text: "hello".to_string(),
                },
                MessagePart::ToolResult {
                    tool_call_id: "call_1".to_string(),
                    content: "ok".to_string(),
                    is_error: false,
                },
            ],
        };
        let encoded = encode(MessageFormat::Acontext, &blob);
        let decoded = decode(MessageFormat::Acontext, &encoded).unwrap();
        assert_eq!(decoded, blob);
    }

    #[test]
    fn openai_tool_call_decodes() {
        let blob = json!({
            "role": "assistant",
            "tool_calls": [{
                "id": "call_1",
                "type": "function",
                "function": {"name": "f", "arguments": "{\"x\": 1}"},
            }],
        });
        let decoded = decode(MessageFormat::Openai, &blob).unwrap();
        assert_eq!(decoded.role, Role::Assistant);
        assert_eq!(
            decoded.parts,
            vec![MessagePart::ToolCall {
                id: "call_1".to_string(),
                name: "f".to_string(),
                arguments: json!({"x": 1}),
            }]
        );
    }

    #[test]
    fn openai_tool_result_decodes() {
        let blob = json!({"role": "tool", "tool_call_id": "call_1", "content": "ok"});
        let decoded = decode(MessageFormat::Openai, &blob).unwrap();
        assert_eq!(decoded.role, Role::Tool);
        assert_eq!(
            decoded.parts,
            vec![MessagePart::ToolResult {
                tool_call_id: "call_1".to_string(),
                content: "ok".to_string(),
                is_error: false,
            }]
        );
    }

    #[test]
    fn openai_encode_tool_call_stringifies_arguments() {
        let blob = MessageBlob {
            role: Role::Assistant,
            parts: vec![MessagePart::ToolCall {
                id: "call_9".to_string(),
                name: "disk.list".to_string(),
                arguments: json!({"path": "/"}),
            }],
        };
        let out = encode(MessageFormat::Openai, &blob);
        let args = out["tool_calls"][0]["function"]["arguments"].as_str().unwrap();
        assert_eq!(serde_json::from_str::<Value>(args).unwrap(), json!({"path": "/"}));
    }

    #[test]
    fn anthropic_blocks_roundtrip() {
        let blob = json!({
            "role": "assistant",
            "content": [
                {"type": "text", "text": "let me check"},
                {"type": "tool_use", "id": "tc1", "name": "f", "input": {"a": 2}},
            ],
        });
        let decoded = decode(MessageFormat::Anthropic, &blob).unwrap();
        let encoded = encode(MessageFormat::Anthropic, &decoded);
        assert_eq!(encoded["content"][1]["input"], json!({"a": 2}));
    }

    #[test]
    fn unknown_format_rejected() {
        assert!("gemini".parse::<MessageFormat>().is_err());
    }
}
