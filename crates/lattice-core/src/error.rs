use thiserror::Error;

#[derive(Debug, Error)]
pub enum LatticeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Coordination store error: {0}")]
    Coordination(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("LLM provider error: {0}")]
    LlmProvider(String),

    /// Rate limits, 5xx, network failures; worth a redelivery.
    #[error("LLM provider unavailable: {0}")]
    LlmUnavailable(String),

    /// A tool handler refused the call. Rolls back the surrounding agent
    /// iteration and is never redelivered.
    #[error("Rejected: {0}")]
    Rejected(String),

    #[error("Lock contended: {0}")]
    LockContended(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LatticeError {
    /// Integer code carried in the JSON error envelope `{code, msg, ...}`.
    pub fn code(&self) -> i32 {
        match self {
            LatticeError::Config(_) => 1001,
            LatticeError::AuthFailed(_) => 1401,
            LatticeError::Validation(_) => 1400,
            LatticeError::NotFound(_) => 1404,
            LatticeError::Database(_) => 1500,
            LatticeError::Coordination(_) => 1501,
            LatticeError::Queue(_) => 1502,
            LatticeError::LlmProvider(_) => 1503,
            LatticeError::LlmUnavailable(_) => 1523,
            LatticeError::Rejected(_) => 1409,
            LatticeError::LockContended(_) => 1423,
            LatticeError::Serialization(_) => 1422,
            LatticeError::Io(_) => 1504,
            LatticeError::Internal(_) => 1599,
        }
    }

    /// HTTP status the gateway maps this error to.
    pub fn http_status(&self) -> u16 {
        match self {
            LatticeError::AuthFailed(_) => 401,
            LatticeError::Validation(_) => 400,
            LatticeError::NotFound(_) => 404,
            LatticeError::Rejected(_) => 409,
            LatticeError::LockContended(_) => 423,
            LatticeError::Serialization(_) => 422,
            _ => 500,
        }
    }

    /// Whether a queue consumer should nack for redelivery (transient) or
    /// ack and drop (business rejection, validation, fatal).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LatticeError::Database(_)
                | LatticeError::Coordination(_)
                | LatticeError::Queue(_)
                | LatticeError::LlmUnavailable(_)
                | LatticeError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, LatticeError>;
