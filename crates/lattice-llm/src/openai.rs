use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use lattice_core::codec::parse_arguments;

use crate::provider::{
    CompletionRequest, LlmFunction, LlmProvider, LlmResponse, LlmToolCall, ProviderError,
};
use crate::schema::flatten_tool_schemas;

/// Any OpenAI-compatible chat-completions endpoint.
pub struct OpenAiBackend {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    chat_path: String,
}

impl OpenAiBackend {
    /// `base_url` without trailing slash.
    pub fn new(api_key: String, base_url: String, request_timeout: std::time::Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(request_timeout)
                .build()
                .expect("reqwest client"),
            api_key,
            base_url,
            chat_path: "/v1/chat/completions".to_string(),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiBackend {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, req: &CompletionRequest) -> Result<LlmResponse, ProviderError> {
        let mut body = json!({
            "model": req.model,
            "messages": req.messages,
            "max_tokens": req.max_tokens,
        });
        if !req.tools.is_empty() {
            let tools: Vec<Value> = flatten_tool_schemas(&req.tools)
                .into_iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        },
                    })
                })
                .collect();
            body["tools"] = Value::Array(tools);
        }

        let url = format!("{}{}", self.base_url, self.chat_path);
        debug!(model = %req.model, tools = req.tools.len(), "completion request");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status == 429 {
            let retry = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|s| s * 1000)
                .unwrap_or(5000);
            return Err(ProviderError::RateLimited {
                retry_after_ms: retry,
            });
        }
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "completion API error");
            return Err(ProviderError::Api {
                status,
                message: text,
            });
        }

        let raw: Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;
        parse_response(raw)
    }
}

fn parse_response(raw: Value) -> Result<LlmResponse, ProviderError> {
    let message = raw
        .pointer("/choices/0/message")
        .ok_or_else(|| ProviderError::Parse("response missing choices[0].message".to_string()))?;

    let role = message
        .get("role")
        .and_then(|v| v.as_str())
        .unwrap_or("assistant")
        .to_string();
    let content = message
        .get("content")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(String::from);

    let tool_calls = message
        .get("tool_calls")
        .and_then(|v| v.as_array())
        .map(|calls| {
            calls
                .iter()
                .map(|call| LlmToolCall {
                    id: call
                        .get("id")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    function: LlmFunction {
                        name: call
                            .pointer("/function/name")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        arguments: parse_arguments(call.pointer("/function/arguments")),
                    },
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(LlmResponse {
        role,
        content,
        tool_calls,
        raw_response: raw,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_content() {
        let raw = json!({
            "choices": [{"message": {"role": "assistant", "content": "hello"}}],
        });
        let resp = parse_response(raw).unwrap();
        assert_eq!(resp.content.as_deref(), Some("hello"));
        assert!(!resp.has_tool_calls());
    }

    #[test]
    fn parse_tool_calls_decodes_arguments() {
        let raw = json!({
            "choices": [{"message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "insert_task", "arguments": "{\"after_task_order\": 0}"},
                }],
            }}],
        });
        let resp = parse_response(raw).unwrap();
        assert_eq!(resp.tool_calls.len(), 1);
        assert_eq!(resp.tool_calls[0].function.name, "insert_task");
        assert_eq!(resp.tool_calls[0].function.arguments["after_task_order"], 0);
    }

    #[test]
    fn missing_choices_is_parse_error() {
        assert!(parse_response(json!({"error": "x"})).is_err());
    }
}
