//! Uniform request/response surface over heterogeneous chat-completion
//! backends. Tool schemas are flattened (no `$ref`/`$defs`) before they
//! reach any backend.

pub mod mock;
pub mod openai;
pub mod provider;
pub mod registry;
pub mod schema;

pub use provider::{
    CompletionRequest, LlmFunction, LlmProvider, LlmResponse, LlmToolCall, ProviderError,
    ToolDefinition,
};
pub use registry::ProviderRegistry;
