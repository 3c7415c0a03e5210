use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How a search result's text is matched against the excluded categories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionMode {
    /// Drop a result that mentions any excluded category.
    #[default]
    Any,
    /// Drop a result only when it mentions every excluded category.
    All,
}

impl ExclusionMode {
    pub fn excludes(self, text: &str, categories: &[String]) -> bool {
        if categories.is_empty() {
            return false;
        }
        let mut hits = categories.iter().map(|category| text.contains(category.as_str()));
        match self {
            ExclusionMode::Any => hits.any(|hit| hit),
            ExclusionMode::All => hits.all(|hit| hit),
        }
    }
}

/// Which gross figure is taken as a film's revenue when the catalog lists
/// both.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevenuePriority {
    #[default]
    WorldwideThenDomestic,
    WorldwideOnly,
    DomesticOnly,
}

impl RevenuePriority {
    pub fn pick(self, worldwide: Option<i64>, domestic: Option<i64>) -> Option<i64> {
        match self {
            RevenuePriority::WorldwideThenDomestic => worldwide.or(domestic),
            RevenuePriority::WorldwideOnly => worldwide,
            RevenuePriority::DomesticOnly => domestic,
        }
    }
}

impl fmt::Display for RevenuePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RevenuePriority::WorldwideThenDomestic => "worldwide_then_domestic",
            RevenuePriority::WorldwideOnly => "worldwide_only",
            RevenuePriority::DomesticOnly => "domestic_only",
        };
        f.write_str(label)
    }
}

/// Concurrent workers spawned per stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerCounts {
    pub discovery: usize,
    pub identity: usize,
    pub film_detail: usize,
    pub person_detail: usize,
    pub persist_film: usize,
    pub persist_person: usize,
}

impl Default for WorkerCounts {
    fn default() -> Self {
        Self {
            discovery: 1,
            identity: 1,
            film_detail: 1,
            person_detail: 1,
            persist_film: 1,
            persist_person: 1,
        }
    }
}

/// Tunables for the crawl pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Years a search result may differ from the catalog year and still match.
    pub year_tolerance: i32,
    /// Content types that disqualify a search result.
    pub excluded_categories: Vec<String>,
    pub exclusion_mode: ExclusionMode,
    pub revenue_priority: RevenuePriority,
    pub workers: WorkerCounts,
    /// Interval between queue depth reports while crawling.
    pub progress_interval_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            year_tolerance: 2,
            excluded_categories: vec![
                "Video Game".to_string(),
                "TV Episode".to_string(),
                "TV Series".to_string(),
            ],
            exclusion_mode: ExclusionMode::default(),
            revenue_priority: RevenuePriority::default(),
            workers: WorkerCounts::default(),
            progress_interval_ms: 5_000,
        }
    }
}

impl PipelineConfig {
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.max(1))
    }

    pub fn is_excluded(&self, text: &str) -> bool {
        self.exclusion_mode.excludes(text, &self.excluded_categories)
    }
}

/// Tunables for the aggregation phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Drop previous aggregate output before writing a new run.
    pub replace_existing: bool,
    /// Worker threads for the per-film computation. 0 uses rayon's default.
    pub threads: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            replace_existing: true,
            threads: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_mode_drops_on_single_category() {
        let config = PipelineConfig::default();
        assert!(config.is_excluded("Halo (2001) (Video Game)"));
        assert!(config.is_excluded("Lost (2004) (TV Series)"));
        assert!(!config.is_excluded("Heat (1995)"));
    }

    #[test]
    fn all_mode_requires_every_category() {
        let config = PipelineConfig {
            exclusion_mode: ExclusionMode::All,
            excluded_categories: vec!["Video Game".into(), "TV Episode".into()],
            ..PipelineConfig::default()
        };
        assert!(!config.is_excluded("Halo (2001) (Video Game)"));
        assert!(config.is_excluded("Video Game tie-in TV Episode"));
    }

    #[test]
    fn empty_category_list_excludes_nothing() {
        assert!(!ExclusionMode::All.excludes("anything", &[]));
        assert!(!ExclusionMode::Any.excludes("anything", &[]));
    }

    #[test]
    fn revenue_priority_fallbacks() {
        let both = (Some(900), Some(300));
        assert_eq!(RevenuePriority::WorldwideThenDomestic.pick(both.0, both.1), Some(900));
        assert_eq!(RevenuePriority::WorldwideThenDomestic.pick(None, Some(300)), Some(300));
        assert_eq!(RevenuePriority::WorldwideOnly.pick(None, Some(300)), None);
        assert_eq!(RevenuePriority::DomesticOnly.pick(both.0, both.1), Some(300));
    }

    #[test]
    fn deserializes_snake_case_modes() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{ "exclusion_mode": "all", "revenue_priority": "domestic_only" }"#,
        )
        .expect("parse");
        assert_eq!(config.exclusion_mode, ExclusionMode::All);
        assert_eq!(config.revenue_priority, RevenuePriority::DomesticOnly);
        assert_eq!(config.year_tolerance, 2);
    }
}
