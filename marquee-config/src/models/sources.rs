use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use marquee_core::{AggregationConfig, PipelineConfig};

use crate::util::{parse_csv_var, parse_bool_var, string_var};

use super::StoreBackend;

/// Raw configuration as defined in a TOML or JSON file. Every field is
/// optional; missing ones keep their defaults.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub store: FileStoreConfig,
    #[serde(default)]
    pub fetch: FileFetchConfig,
    #[serde(default)]
    pub sources: FileSourcesConfig,
    pub pipeline: Option<PipelineConfig>,
    pub aggregation: Option<AggregationConfig>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileStoreConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<StoreBackend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileFetchConfig {
    /// Humantime string such as `30s` or `1m 30s`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_redirects: Option<usize>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileSourcesConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog_base: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_base: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub letters: Option<Vec<String>>,
}

/// Environment-derived configuration values.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub store_backend: Option<String>,
    pub database_url: Option<String>,
    pub database_url_file: Option<PathBuf>,
    pub max_connections: Option<String>,
    pub fetch_timeout: Option<String>,
    pub user_agent: Option<String>,
    pub max_redirects: Option<String>,
    pub catalog_base: Option<String>,
    pub index_base: Option<String>,
    pub letters: Option<Vec<String>>,
    pub year_tolerance: Option<String>,
    pub excluded_categories: Option<Vec<String>>,
    pub exclusion_mode: Option<String>,
    pub revenue_priority: Option<String>,
    pub progress_interval_ms: Option<String>,
    pub aggregation_threads: Option<String>,
    pub aggregation_replace: Option<bool>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self {
            config_path: string_var("MARQUEE_CONFIG_PATH").map(PathBuf::from),
            store_backend: string_var("MARQUEE_STORE_BACKEND"),
            database_url: string_var("DATABASE_URL"),
            database_url_file: string_var("DATABASE_URL_FILE").map(PathBuf::from),
            max_connections: string_var("MARQUEE_DB_MAX_CONNECTIONS"),
            fetch_timeout: string_var("MARQUEE_FETCH_TIMEOUT"),
            user_agent: string_var("MARQUEE_USER_AGENT"),
            max_redirects: string_var("MARQUEE_MAX_REDIRECTS"),
            catalog_base: string_var("MARQUEE_CATALOG_BASE"),
            index_base: string_var("MARQUEE_INDEX_BASE"),
            letters: parse_csv_var("MARQUEE_LETTERS"),
            year_tolerance: string_var("MARQUEE_YEAR_TOLERANCE"),
            excluded_categories: parse_csv_var("MARQUEE_EXCLUDED_CATEGORIES"),
            exclusion_mode: string_var("MARQUEE_EXCLUSION_MODE"),
            revenue_priority: string_var("MARQUEE_REVENUE_PRIORITY"),
            progress_interval_ms: string_var("MARQUEE_PROGRESS_INTERVAL_MS"),
            aggregation_threads: string_var("MARQUEE_AGGREGATION_THREADS"),
            aggregation_replace: parse_bool_var("MARQUEE_AGGREGATION_REPLACE"),
        }
    }
}
