use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid stored data: {0}")]
    Invalid(String),
}

impl From<StoreError> for lattice_core::LatticeError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(msg) => lattice_core::LatticeError::NotFound(msg),
            StoreError::Conflict(msg) => lattice_core::LatticeError::Rejected(msg),
            other => lattice_core::LatticeError::Database(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
