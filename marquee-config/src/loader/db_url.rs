use std::{fs::read_to_string, path::Path};

use url::Url;

use crate::{
    ConfigLoadError,
    models::sources::{EnvConfig, FileStoreConfig},
};

/// Picks the store connection URL: `DATABASE_URL`, then the file named by
/// `DATABASE_URL_FILE`, then `store.database_url` from the config file.
pub fn resolve_database_url(
    env: &EnvConfig,
    file_store: &FileStoreConfig,
) -> Result<Option<String>, ConfigLoadError> {
    if let Some(url) = env
        .database_url
        .clone()
        .filter(|value| !value.trim().is_empty())
    {
        return validated(&url).map(Some);
    }

    if let Some(path) = env.database_url_file.as_ref()
        && let Some(url) = read_secret_file(path)?
    {
        return validated(&url).map(Some);
    }

    match file_store.database_url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => validated(url).map(Some),
        _ => Ok(None),
    }
}

fn validated(raw: &str) -> Result<String, ConfigLoadError> {
    let parsed = Url::parse(raw.trim())
        .map_err(|source| ConfigLoadError::InvalidDatabaseUrl { source })?;
    Ok(parsed.to_string())
}

pub fn read_secret_file(path: &Path) -> Result<Option<String>, ConfigLoadError> {
    let contents = read_to_string(path).map_err(|source| ConfigLoadError::SecretFileIo {
        path: path.to_path_buf(),
        source,
    })?;
    let trimmed = contents.trim();
    if trimmed.is_empty() {
        Ok(None)
    } else {
        Ok(Some(trimmed.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_url_wins_over_file() {
        let env = EnvConfig {
            database_url: Some("postgres://env@localhost/marquee".into()),
            ..EnvConfig::default()
        };
        let file = FileStoreConfig {
            database_url: Some("postgres://file@localhost/marquee".into()),
            ..FileStoreConfig::default()
        };
        let url = resolve_database_url(&env, &file).expect("resolve");
        assert_eq!(url.as_deref(), Some("postgres://env@localhost/marquee"));
    }

    #[test]
    fn url_file_is_read_and_trimmed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("db_url");
        std::fs::write(&path, "  postgres://secret@db/marquee\n").expect("write");
        let env = EnvConfig {
            database_url_file: Some(path),
            ..EnvConfig::default()
        };

        let url = resolve_database_url(&env, &FileStoreConfig::default()).expect("resolve");
        assert_eq!(url.as_deref(), Some("postgres://secret@db/marquee"));
    }

    #[test]
    fn malformed_url_is_rejected() {
        let file = FileStoreConfig {
            database_url: Some("not a url".into()),
            ..FileStoreConfig::default()
        };
        let err = resolve_database_url(&EnvConfig::default(), &file).expect_err("invalid");
        assert!(matches!(err, ConfigLoadError::InvalidDatabaseUrl { .. }));
    }
}
