use std::sync::Arc;

use tracing::info;

use lattice_core::config::LlmConfig;

use crate::mock::MockBackend;
use crate::openai::OpenAiBackend;
use crate::provider::LlmProvider;

/// Holds one instance of every backend; selection happens per call so a
/// project's `llm_backend` override can pick the mock while the rest of the
/// deployment uses the real endpoint.
pub struct ProviderRegistry {
    default_backend: String,
    openai: Arc<OpenAiBackend>,
    mock: Arc<MockBackend>,
    pub model: String,
    pub max_tokens: u32,
}

impl ProviderRegistry {
    pub fn from_config(config: &LlmConfig) -> Self {
        info!(backend = %config.backend, model = %config.model, "LLM registry ready");
        Self {
            default_backend: config.backend.clone(),
            openai: Arc::new(OpenAiBackend::new(
                config.api_key.clone(),
                config.base_url.clone(),
                std::time::Duration::from_secs(config.request_timeout_seconds),
            )),
            mock: Arc::new(MockBackend::new()),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        }
    }

    /// Resolve a backend by name; `None` falls back to the configured
    /// default. Unknown names fall back to the default too, loudly.
    pub fn select(&self, override_name: Option<&str>) -> Arc<dyn LlmProvider> {
        let name = override_name.unwrap_or(&self.default_backend);
        match name {
            "mock" => self.mock.clone(),
            "openai" => self.openai.clone(),
            other => {
                tracing::warn!(backend = other, "unknown LLM backend; using default");
                if self.default_backend == "mock" {
                    self.mock.clone()
                } else {
                    self.openai.clone()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn override_selects_mock() {
        let registry = ProviderRegistry::from_config(&LlmConfig::default());
        assert_eq!(registry.select(Some("mock")).name(), "mock");
        assert_eq!(registry.select(None).name(), "openai");
        assert_eq!(registry.select(Some("nonsense")).name(), "openai");
    }
}
