pub mod sources;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use marquee_core::extract::sites::{DEFAULT_CATALOG_BASE, DEFAULT_INDEX_BASE};
use marquee_core::extract::{SourceSites, default_catalog_letters};
use marquee_core::{AggregationConfig, HttpFetcherOptions, PipelineConfig};

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub store: StoreConfig,
    pub fetch: FetchConfig,
    pub pipeline: PipelineConfig,
    pub aggregation: AggregationConfig,
    pub sources: SourcesConfig,
    pub metadata: ConfigMetadata,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Process-local; nothing survives the run.
    #[default]
    Memory,
    Postgres,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" | "in_memory" => Ok(StoreBackend::Memory),
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            other => Err(format!("unknown store backend `{other}`")),
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Memory => f.write_str("memory"),
            StoreBackend::Postgres => f.write_str("postgres"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub database_url: Option<String>,
    pub max_connections: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            database_url: None,
            max_connections: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub user_agent: String,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        let defaults = HttpFetcherOptions::default();
        Self {
            timeout: defaults.timeout,
            user_agent: defaults.user_agent,
            max_redirects: defaults.max_redirects,
        }
    }
}

impl FetchConfig {
    pub fn http_options(&self) -> HttpFetcherOptions {
        HttpFetcherOptions {
            timeout: self.timeout,
            user_agent: self.user_agent.clone(),
            max_redirects: self.max_redirects,
        }
    }
}

/// Where the crawl reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcesConfig {
    pub catalog_base: String,
    pub index_base: String,
    /// Catalog letter pages to walk, in order.
    pub letters: Vec<String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            catalog_base: DEFAULT_CATALOG_BASE.to_string(),
            index_base: DEFAULT_INDEX_BASE.to_string(),
            letters: default_catalog_letters(),
        }
    }
}

impl SourcesConfig {
    pub fn sites(&self) -> anyhow::Result<SourceSites> {
        SourceSites::new(&self.catalog_base, &self.index_base).map_err(|err| {
            anyhow::anyhow!(
                "invalid source URLs ({}, {}): {err}",
                self.catalog_base,
                self.index_base
            )
        })
    }
}

/// Source that produced the file layer of the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConfigSource {
    #[default]
    Default,
    EnvPath(PathBuf),
    File(PathBuf),
}

#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub source: ConfigSource,
    pub env_file_loaded: bool,
    /// Environment variables that overrode a file or default value.
    pub env_overrides: Vec<&'static str>,
}

impl ConfigMetadata {
    pub fn config_path(&self) -> Option<&PathBuf> {
        match &self.source {
            ConfigSource::EnvPath(path) | ConfigSource::File(path) => Some(path),
            ConfigSource::Default => None,
        }
    }
}
