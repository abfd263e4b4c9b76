use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use lattice_core::types::MessageBlob;

/// Tool definition exposed to the model. `parameters` is a JSON Schema and
/// must already be flattened (see [`crate::schema`]) before dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmFunction {
    pub name: String,
    /// Decoded arguments object (never the raw JSON string).
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmToolCall {
    pub id: String,
    pub function: LlmFunction,
}

/// Uniform completion response.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub role: String,
    pub content: Option<String>,
    pub tool_calls: Vec<LlmToolCall>,
    /// The unmodified backend payload, for logging and debugging.
    pub raw_response: serde_json::Value,
}

impl LlmResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// One completion call.
///
/// `messages` are raw chat messages in OpenAI shape ({role, content, ...});
/// agents build structured turns (tool_calls, tool results) directly.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<serde_json::Value>,
    pub tools: Vec<ToolDefinition>,
    pub max_tokens: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

impl From<ProviderError> for lattice_core::LatticeError {
    fn from(e: ProviderError) -> Self {
        match &e {
            // Worth a redelivery; everything else fails the iteration for good.
            ProviderError::RateLimited { .. }
            | ProviderError::Http(_)
            | ProviderError::Unavailable(_) => {
                lattice_core::LatticeError::LlmUnavailable(e.to_string())
            }
            ProviderError::Api { status, .. } if *status >= 500 => {
                lattice_core::LatticeError::LlmUnavailable(e.to_string())
            }
            _ => lattice_core::LatticeError::LlmProvider(e.to_string()),
        }
    }
}

/// Common interface for all completion backends.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Backend name for logging and error messages.
    fn name(&self) -> &str;

    /// Send a completion request and wait for the full response.
    async fn complete(&self, req: &CompletionRequest) -> Result<LlmResponse, ProviderError>;

    /// Deterministic assistant reply for a stored user message, if this
    /// backend produces one. Only the mock backend does; real backends
    /// return `None` and the session pipeline stores nothing.
    fn canned_session_reply(&self, _latest_user_text: &str) -> Option<MessageBlob> {
        None
    }
}
