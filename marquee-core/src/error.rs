use thiserror::Error;

use crate::fetch::FetchError;

#[derive(Error, Debug)]
pub enum MarqueeError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid record: {0}")]
    Model(#[from] marquee_model::ModelError),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for MarqueeError {
    fn from(err: sqlx::Error) -> Self {
        MarqueeError::Store(err.to_string())
    }
}

#[cfg(feature = "database")]
impl From<sqlx::migrate::MigrateError> for MarqueeError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        MarqueeError::Store(format!("migration failed: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, MarqueeError>;
