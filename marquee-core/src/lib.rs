//! # Marquee Core
//!
//! Deduplicating crawl pipeline for box-office statistics, and the
//! aggregation pass that turns the crawled films and people into
//! per-film features.
//!
//! A crawl runs as a chain of [`pipeline::Stage`]s connected by
//! [`queue::DedupQueue`]s: catalog discovery, identity resolution against the
//! film index, film detail, person detail and persistence. Every queue admits
//! a key at most once, so films sharing a cast fetch each person once. The
//! crawl ends when the shared [`queue::WorkTracker`] reports no outstanding
//! work.
//!
//! Extracted fields never abort an entity. A [`resolution::Resolver`]
//! replaces failures with the policy default and marks the entity FAILED
//! only when an important field was lost.
//!
//! [`aggregation::AggregationEngine`] then loads every persisted record,
//! sorts each filmography chronologically and computes, for every film, the
//! statistics of its cast and director over their earlier films.
//!
//! ## Feature Flags
//!
//! - `database`: Postgres document store (SQLx). Enabled by default.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

/// Per-film statistics over each participant's earlier films
pub mod aggregation;

/// Pipeline tuning knobs owned by the runtime
pub mod config;

/// Crawl driver and resumable queue seeding
pub mod crawl;

pub mod error;

/// Site-specific page extraction
pub mod extract;

pub mod fetch;

/// Revenue repair and store status
pub mod maintenance;

/// Stage trait, outlets, worker runtime and progress reporting
pub mod pipeline;

pub mod queue;

/// Concurrent registries and the frozen aggregation snapshot
pub mod registry;

pub mod resolution;

/// Concrete crawl stages
pub mod stages;

/// Document store abstraction with in-memory and Postgres backends
pub mod store;

#[cfg(feature = "database")]
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub use aggregation::{AggregationEngine, AggregationReport};
pub use config::{AggregationConfig, ExclusionMode, PipelineConfig, RevenuePriority, WorkerCounts};
pub use crawl::{CrawlOptions, CrawlReport, Crawler};
pub use error::{MarqueeError, Result};
pub use extract::SourceSites;
pub use fetch::{FetchError, Fetcher, HttpFetcher, HttpFetcherOptions, InMemoryFetcher};
pub use maintenance::{RevenueFixReport, StoreStatus, fix_revenues, status};
pub use queue::{DedupQueue, WorkItem, WorkTracker};
pub use registry::{Registry, Snapshot};
pub use stages::StageContext;
pub use store::{DocumentStore, InMemoryStore};
#[cfg(feature = "database")]
pub use store::PostgresStore;
