use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file {path}: {source}")]
    ConfigFileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {message}")]
    ConfigFileParse { path: PathBuf, message: String },

    #[error("invalid value `{value}` for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid database URL: {source}")]
    InvalidDatabaseUrl {
        #[source]
        source: url::ParseError,
    },

    #[error("failed to read secret file {path}: {source}")]
    SecretFileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("the postgres store backend needs DATABASE_URL or store.database_url")]
    MissingDatabaseUrl,

    #[error("failed to load env file: {0}")]
    EnvFile(#[from] dotenvy::Error),
}

impl ConfigLoadError {
    pub(crate) fn invalid(key: &'static str, value: &str, reason: impl ToString) -> Self {
        ConfigLoadError::InvalidValue {
            key,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}
