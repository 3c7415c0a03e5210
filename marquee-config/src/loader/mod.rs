pub mod db_url;
pub mod error;

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::de::DeserializeOwned;

use crate::models::sources::{EnvConfig, FileConfig};
use crate::models::{Config, ConfigMetadata, ConfigSource, StoreBackend};
use crate::util::parse_duration;

use self::db_url::resolve_database_url;
use self::error::ConfigLoadError;

const CANDIDATES: &[&str] = &[
    "marquee.toml",
    "marquee.json",
    "config/marquee.toml",
    "config/marquee.json",
];

/// Result of a load: the effective configuration plus anything worth
/// telling the operator about it.
#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: Vec<String>,
}

/// Composes [`Config`] from defaults, an optional file and the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
    env_file: Option<PathBuf>,
    skip_env_file: bool,
    search_root: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads this file instead of searching for one. Takes precedence over
    /// `MARQUEE_CONFIG_PATH`.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    pub fn with_env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = Some(path.into());
        self
    }

    pub fn without_env_file(mut self) -> Self {
        self.skip_env_file = true;
        self
    }

    /// Directory the default config file names are looked up in. Defaults to
    /// the working directory.
    pub fn with_search_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.search_root = Some(root.into());
        self
    }

    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = self.load_env_file()?;
        self.load_with(EnvConfig::gather(), env_file_loaded)
    }

    /// Builds the configuration from an already gathered environment.
    pub fn load_with(
        &self,
        env: EnvConfig,
        env_file_loaded: bool,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let (file, source) = self.read_file_layer(&env)?;
        let mut warnings = Vec::new();
        let mut overrides = Vec::new();
        let mut config = Config::default();

        // File layer.
        if let Some(backend) = file.store.backend {
            config.store.backend = backend;
        }
        if let Some(max) = file.store.max_connections {
            config.store.max_connections = max;
        }
        if let Some(raw) = file.fetch.timeout.as_deref() {
            config.fetch.timeout = parse_duration(raw)
                .map_err(|err| ConfigLoadError::invalid("fetch.timeout", raw, err))?;
        }
        if let Some(agent) = file.fetch.user_agent.clone() {
            config.fetch.user_agent = agent;
        }
        if let Some(max) = file.fetch.max_redirects {
            config.fetch.max_redirects = max;
        }
        if let Some(base) = file.sources.catalog_base.clone() {
            config.sources.catalog_base = base;
        }
        if let Some(base) = file.sources.index_base.clone() {
            config.sources.index_base = base;
        }
        if let Some(letters) = file.sources.letters.clone() {
            config.sources.letters = letters;
        }
        if let Some(pipeline) = file.pipeline.clone() {
            config.pipeline = pipeline;
        }
        if let Some(aggregation) = file.aggregation.clone() {
            config.aggregation = aggregation;
        }

        // Environment layer.
        config.store.database_url = resolve_database_url(&env, &file.store)?;
        if env.database_url.is_some() || env.database_url_file.is_some() {
            overrides.push("DATABASE_URL");
        }
        if let Some(raw) = env.store_backend.as_deref() {
            config.store.backend = StoreBackend::from_str(raw)
                .map_err(|reason| ConfigLoadError::invalid("MARQUEE_STORE_BACKEND", raw, reason))?;
            overrides.push("MARQUEE_STORE_BACKEND");
        }
        if let Some(raw) = env.max_connections.as_deref() {
            config.store.max_connections = parse_number("MARQUEE_DB_MAX_CONNECTIONS", raw)?;
            overrides.push("MARQUEE_DB_MAX_CONNECTIONS");
        }
        if let Some(raw) = env.fetch_timeout.as_deref() {
            config.fetch.timeout = parse_duration(raw)
                .map_err(|err| ConfigLoadError::invalid("MARQUEE_FETCH_TIMEOUT", raw, err))?;
            overrides.push("MARQUEE_FETCH_TIMEOUT");
        }
        if let Some(agent) = env.user_agent.clone() {
            config.fetch.user_agent = agent;
            overrides.push("MARQUEE_USER_AGENT");
        }
        if let Some(raw) = env.max_redirects.as_deref() {
            config.fetch.max_redirects = parse_number("MARQUEE_MAX_REDIRECTS", raw)?;
            overrides.push("MARQUEE_MAX_REDIRECTS");
        }
        if let Some(base) = env.catalog_base.clone() {
            config.sources.catalog_base = base;
            overrides.push("MARQUEE_CATALOG_BASE");
        }
        if let Some(base) = env.index_base.clone() {
            config.sources.index_base = base;
            overrides.push("MARQUEE_INDEX_BASE");
        }
        if let Some(letters) = env.letters.clone() {
            config.sources.letters = letters;
            overrides.push("MARQUEE_LETTERS");
        }
        if let Some(raw) = env.year_tolerance.as_deref() {
            config.pipeline.year_tolerance = parse_number("MARQUEE_YEAR_TOLERANCE", raw)?;
            overrides.push("MARQUEE_YEAR_TOLERANCE");
        }
        if let Some(categories) = env.excluded_categories.clone() {
            config.pipeline.excluded_categories = categories;
            overrides.push("MARQUEE_EXCLUDED_CATEGORIES");
        }
        if let Some(raw) = env.exclusion_mode.as_deref() {
            config.pipeline.exclusion_mode = parse_enum("MARQUEE_EXCLUSION_MODE", raw)?;
            overrides.push("MARQUEE_EXCLUSION_MODE");
        }
        if let Some(raw) = env.revenue_priority.as_deref() {
            config.pipeline.revenue_priority = parse_enum("MARQUEE_REVENUE_PRIORITY", raw)?;
            overrides.push("MARQUEE_REVENUE_PRIORITY");
        }
        if let Some(raw) = env.progress_interval_ms.as_deref() {
            config.pipeline.progress_interval_ms =
                parse_number("MARQUEE_PROGRESS_INTERVAL_MS", raw)?;
            overrides.push("MARQUEE_PROGRESS_INTERVAL_MS");
        }
        if let Some(raw) = env.aggregation_threads.as_deref() {
            config.aggregation.threads = parse_number("MARQUEE_AGGREGATION_THREADS", raw)?;
            overrides.push("MARQUEE_AGGREGATION_THREADS");
        }
        if let Some(replace) = env.aggregation_replace {
            config.aggregation.replace_existing = replace;
            overrides.push("MARQUEE_AGGREGATION_REPLACE");
        }

        // Guard rails.
        config.sources.sites().map_err(|err| {
            ConfigLoadError::invalid("sources", &config.sources.catalog_base, err)
        })?;
        match config.store.backend {
            StoreBackend::Postgres if config.store.database_url.is_none() => {
                return Err(ConfigLoadError::MissingDatabaseUrl);
            }
            StoreBackend::Memory if config.store.database_url.is_some() => {
                warnings.push(
                    "a database URL is configured but the memory store backend is selected; \
                     nothing will be persisted"
                        .to_string(),
                );
            }
            _ => {}
        }
        if config.sources.letters.is_empty() {
            warnings.push(
                "no catalog letters configured; crawls will discover nothing".to_string(),
            );
        }
        if config.pipeline.excluded_categories.is_empty() {
            warnings.push("no excluded categories; search results are never filtered".to_string());
        }

        config.metadata = ConfigMetadata {
            source,
            env_file_loaded,
            env_overrides: overrides,
        };
        for warning in &warnings {
            tracing::warn!("{warning}");
        }
        Ok(ConfigLoad { config, warnings })
    }

    fn load_env_file(&self) -> Result<bool, ConfigLoadError> {
        if self.skip_env_file {
            return Ok(false);
        }
        let result = match &self.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| ()),
            None => dotenvy::dotenv().map(|_| ()),
        };
        match result {
            Ok(()) => Ok(true),
            Err(err) if err.not_found() && self.env_file.is_none() => Ok(false),
            Err(err) => Err(ConfigLoadError::EnvFile(err)),
        }
    }

    fn read_file_layer(
        &self,
        env: &EnvConfig,
    ) -> Result<(FileConfig, ConfigSource), ConfigLoadError> {
        if let Some(path) = &self.config_path {
            return Ok((load_file(path)?, ConfigSource::File(path.clone())));
        }
        if let Some(path) = &env.config_path {
            return Ok((load_file(path)?, ConfigSource::EnvPath(path.clone())));
        }
        if let Some(path) = self.find_default_file() {
            let config = load_file(&path)?;
            return Ok((config, ConfigSource::File(path)));
        }
        Ok((FileConfig::default(), ConfigSource::Default))
    }

    fn find_default_file(&self) -> Option<PathBuf> {
        let root = self.search_root.clone().unwrap_or_default();
        CANDIDATES
            .iter()
            .map(|candidate| root.join(candidate))
            .find(|path| path.exists())
    }
}

/// Reads a config file, choosing the format by extension and falling back
/// to TOML then JSON for anything else.
pub fn load_file(path: &Path) -> Result<FileConfig, ConfigLoadError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigLoadError::ConfigFileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let parse_error = |message: String| ConfigLoadError::ConfigFileParse {
        path: path.to_path_buf(),
        message,
    };

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(&contents).map_err(|err| parse_error(err.to_string())),
        Some("toml") | Some("tml") => {
            toml::from_str(&contents).map_err(|err| parse_error(err.to_string()))
        }
        _ => toml::from_str(&contents).or_else(|toml_err| {
            serde_json::from_str(&contents).map_err(|json_err| {
                parse_error(format!("toml error: {toml_err}; json error: {json_err}"))
            })
        }),
    }
}

fn parse_number<T>(key: &'static str, raw: &str) -> Result<T, ConfigLoadError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|err| ConfigLoadError::invalid(key, raw, err))
}

/// Parses a snake_case enum value the same way the config file does.
fn parse_enum<T: DeserializeOwned>(key: &'static str, raw: &str) -> Result<T, ConfigLoadError> {
    let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
    serde_json::from_value(serde_json::Value::String(normalized))
        .map_err(|err| ConfigLoadError::invalid(key, raw, err))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use marquee_core::{ExclusionMode, RevenuePriority};

    use super::*;

    fn loader(root: &Path) -> ConfigLoader {
        ConfigLoader::new().without_env_file().with_search_root(root)
    }

    #[test]
    fn defaults_without_file_or_env() {
        let dir = tempfile::tempdir().expect("tempdir");
        let load = loader(dir.path())
            .load_with(EnvConfig::default(), false)
            .expect("load");

        assert_eq!(load.config.metadata.source, ConfigSource::Default);
        assert_eq!(load.config.store.backend, StoreBackend::Memory);
        assert_eq!(load.config.pipeline.year_tolerance, 2);
        assert_eq!(load.config.sources.letters.first().map(String::as_str), Some("NUM"));
        assert!(load.warnings.is_empty());
    }

    #[test]
    fn toml_file_then_env_overrides() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("marquee.toml"),
            r#"
                [store]
                backend = "postgres"
                database_url = "postgres://file@localhost/marquee"

                [fetch]
                timeout = "45s"

                [sources]
                letters = ["A", "B"]

                [pipeline]
                year_tolerance = 1
                exclusion_mode = "all"
            "#,
        )
        .expect("write config");

        let env = EnvConfig {
            year_tolerance: Some("3".into()),
            revenue_priority: Some("domestic-only".into()),
            ..EnvConfig::default()
        };
        let load = loader(dir.path()).load_with(env, false).expect("load");
        let config = load.config;

        assert_eq!(
            config.metadata.source,
            ConfigSource::File(dir.path().join("marquee.toml"))
        );
        assert_eq!(config.store.backend, StoreBackend::Postgres);
        assert_eq!(
            config.store.database_url.as_deref(),
            Some("postgres://file@localhost/marquee")
        );
        assert_eq!(config.fetch.timeout, Duration::from_secs(45));
        assert_eq!(config.sources.letters, vec!["A", "B"]);
        assert_eq!(config.pipeline.exclusion_mode, ExclusionMode::All);
        assert_eq!(config.pipeline.year_tolerance, 3);
        assert_eq!(config.pipeline.revenue_priority, RevenuePriority::DomesticOnly);
        assert_eq!(
            config.metadata.env_overrides,
            vec!["MARQUEE_YEAR_TOLERANCE", "MARQUEE_REVENUE_PRIORITY"]
        );
    }

    #[test]
    fn json_file_without_extension_falls_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("marquee.conf");
        std::fs::write(&path, r#"{"aggregation": {"threads": 4}}"#).expect("write config");

        let load = loader(dir.path())
            .with_config_path(&path)
            .load_with(EnvConfig::default(), false)
            .expect("load");
        assert_eq!(load.config.aggregation.threads, 4);
        assert!(load.config.aggregation.replace_existing);
    }

    #[test]
    fn postgres_without_url_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let env = EnvConfig {
            store_backend: Some("postgres".into()),
            ..EnvConfig::default()
        };
        let err = loader(dir.path()).load_with(env, false).expect_err("missing url");
        assert!(matches!(err, ConfigLoadError::MissingDatabaseUrl));
    }

    #[test]
    fn bad_values_name_their_key() {
        let dir = tempfile::tempdir().expect("tempdir");
        let env = EnvConfig {
            fetch_timeout: Some("whenever".into()),
            ..EnvConfig::default()
        };
        let err = loader(dir.path()).load_with(env, false).expect_err("bad timeout");
        assert!(err.to_string().contains("MARQUEE_FETCH_TIMEOUT"));

        let env = EnvConfig {
            exclusion_mode: Some("some".into()),
            ..EnvConfig::default()
        };
        let err = loader(dir.path()).load_with(env, false).expect_err("bad mode");
        assert!(err.to_string().contains("MARQUEE_EXCLUSION_MODE"));
    }

    #[test]
    fn unknown_file_sections_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("marquee.toml"), "[server]\nport = 1\n").expect("write");
        let err = loader(dir.path())
            .load_with(EnvConfig::default(), false)
            .expect_err("unknown section");
        assert!(matches!(err, ConfigLoadError::ConfigFileParse { .. }));
    }

    #[test]
    fn memory_backend_with_url_warns() {
        let dir = tempfile::tempdir().expect("tempdir");
        let env = EnvConfig {
            database_url: Some("postgres://x@localhost/marquee".into()),
            ..EnvConfig::default()
        };
        let load = loader(dir.path()).load_with(env, false).expect("load");
        assert_eq!(load.warnings.len(), 1);
        assert_eq!(load.config.metadata.env_overrides, vec!["DATABASE_URL"]);
    }
}
