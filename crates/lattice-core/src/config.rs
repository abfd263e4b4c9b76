use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8029;
pub const DEFAULT_BIND: &str = "127.0.0.1";
/// Bearer tokens look like `sk-lt-{secret}`.
pub const TOKEN_PREFIX: &str = "sk-lt-";

/// Top-level config (lattice.toml + LATTICE_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LatticeConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub learner: LearnerConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Server-side pepper mixed into project-secret HMACs. Must be identical
    /// across all processes that share one database.
    #[serde(default = "default_pepper")]
    pub auth_pepper: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            auth_pepper: default_pepper(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Default backend when a project doesn't override `llm_backend`.
    /// `openai` (any OpenAI-compatible endpoint) or `mock`.
    #[serde(default = "default_llm_backend")]
    pub backend: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Per-iteration deadline for completion calls. On expiry the agent
    /// iteration fails fatally and its transaction rolls back.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: default_llm_backend(),
            model: default_model(),
            api_key: String::new(),
            base_url: default_llm_base_url(),
            max_tokens: default_max_tokens(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Hard cap on task-agent loop iterations.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// TTL on `lock:{session_id}`; a large multiple of expected agent
    /// runtime, so a dead worker's lock expires and processing resumes.
    #[serde(default = "default_session_lock_ttl")]
    pub session_lock_ttl_seconds: u64,
    #[serde(default = "default_flush_max_retries")]
    pub flush_max_retries: u32,
    #[serde(default = "default_flush_retry_wait_ms")]
    pub flush_retry_wait_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            session_lock_ttl_seconds: default_session_lock_ttl(),
            flush_max_retries: default_flush_max_retries(),
            flush_retry_wait_ms: default_flush_retry_wait_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerConfig {
    /// TTL on `learn-lock:{learning_space_id}`.
    #[serde(default = "default_learn_lock_ttl")]
    pub lock_ttl_seconds: u64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            lock_ttl_seconds: default_learn_lock_ttl(),
            max_iterations: default_max_iterations(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Delivery attempts before a message is dropped with an error log.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_redelivery_backoff_ms")]
    pub redelivery_backoff_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_attempts: default_max_attempts(),
            redelivery_backoff_ms: default_redelivery_backoff_ms(),
        }
    }
}

/// Per-project overrides stored as JSON in `projects.configs`.
///
/// Unknown keys are ignored so old rows survive config additions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectConfig {
    /// Pending-message count at which the buffer flushes immediately.
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    /// Extra headroom beyond `max_turns` before unconditional flush.
    #[serde(default = "default_max_overflow")]
    pub max_overflow: u32,
    /// Buffer-timer TTL: the backstop flush delay.
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
    #[serde(default = "bool_true")]
    pub enable_skill_learning: bool,
    /// Per-project LLM backend override (e.g. "mock" in test fixtures).
    #[serde(default)]
    pub llm_backend: Option<String>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            max_overflow: default_max_overflow(),
            ttl_seconds: default_ttl_seconds(),
            enable_skill_learning: true,
            llm_backend: None,
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_pepper() -> String {
    "change-me".to_string()
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.lattice/lattice.db", home)
}
fn default_llm_backend() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "gpt-4.1".to_string()
}
fn default_llm_base_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_request_timeout() -> u64 {
    120
}
fn default_max_iterations() -> usize {
    25
}
fn default_session_lock_ttl() -> u64 {
    600
}
fn default_flush_max_retries() -> u32 {
    10
}
fn default_flush_retry_wait_ms() -> u64 {
    1000
}
fn default_learn_lock_ttl() -> u64 {
    600
}
fn default_poll_interval_ms() -> u64 {
    200
}
fn default_max_attempts() -> u32 {
    5
}
fn default_redelivery_backoff_ms() -> u64 {
    1000
}
fn default_max_turns() -> u32 {
    16
}
fn default_max_overflow() -> u32 {
    16
}
fn default_ttl_seconds() -> u64 {
    8
}

impl LatticeConfig {
    /// Load config from a TOML file with LATTICE_* env var overrides.
    ///
    /// Checks in order: explicit path argument, then `~/.lattice/lattice.toml`.
    /// A missing file is not an error; defaults plus env vars apply.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("LATTICE_").split("__"))
            .extract()
            .map_err(|e| crate::error::LatticeError::Config(e.to_string()))
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.lattice/lattice.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_config_defaults() {
        let cfg: ProjectConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.max_turns, 16);
        assert_eq!(cfg.max_overflow, 16);
        assert_eq!(cfg.ttl_seconds, 8);
        assert!(cfg.enable_skill_learning);
        assert!(cfg.llm_backend.is_none());
    }

    #[test]
    fn project_config_ignores_unknown_keys() {
        let cfg: ProjectConfig =
            serde_json::from_str(r#"{"max_turns": 1, "ttl_seconds": 2, "legacy_field": true}"#)
                .unwrap();
        assert_eq!(cfg.max_turns, 1);
        assert_eq!(cfg.ttl_seconds, 2);
        assert_eq!(cfg.max_overflow, 16);
    }

    #[test]
    fn lattice_config_default_sections() {
        let cfg = LatticeConfig::default();
        assert_eq!(cfg.gateway.port, DEFAULT_PORT);
        assert_eq!(cfg.agent.max_iterations, 25);
        assert_eq!(cfg.broker.max_attempts, 5);
    }
}
