use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid record: {0}")]
    InvalidRecord(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ModelError>;
