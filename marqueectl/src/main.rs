//! `marqueectl`: crawl the box office catalog, enrich it from the film
//! index, and compute per-film statistics over the stored records.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use marquee_config::{Config, ConfigLoad, ConfigLoader, StoreBackend};
use marquee_core::crawl::ensure_completed;
use marquee_core::{
    AggregationEngine, CrawlOptions, Crawler, DocumentStore, HttpFetcher, InMemoryStore,
    StageContext, fix_revenues, status,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "marqueectl", version, about = "Film box office crawler and statistics builder")]
struct Cli {
    /// Config file to read instead of searching for marquee.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Env file to load before reading the environment
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl the catalog and persist films and people, then aggregate
    Crawl {
        /// Drop all collections first instead of resuming
        #[arg(long)]
        fresh: bool,
        /// Stop after the crawl without computing aggregates
        #[arg(long)]
        skip_aggregate: bool,
        /// Catalog letters to walk (comma separated), overriding the config
        #[arg(long, value_delimiter = ',')]
        letters: Option<Vec<String>>,
        /// Seconds each worker gets to finish its item after Ctrl-C
        #[arg(long, default_value_t = 10)]
        grace_secs: u64,
    },
    /// Recompute the aggregate collection from stored films and people
    Aggregate,
    /// Re-fetch catalog pages of films stored with zero revenue
    FixRevenues,
    /// Print record counts per collection
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,marquee::policy=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let store = open_store(&config).await?;

    match cli.command {
        Command::Crawl {
            fresh,
            skip_aggregate,
            letters,
            grace_secs,
        } => {
            let options = CrawlOptions {
                fresh,
                letters: letters.unwrap_or_else(|| config.sources.letters.clone()),
                shutdown_grace: Duration::from_secs(grace_secs),
            };
            let crawler = Crawler::new(stage_context(&config)?, Arc::clone(&store), options);

            let shutdown = CancellationToken::new();
            spawn_ctrl_c(shutdown.clone());
            let (report, registry) = crawler.run(shutdown).await.context("crawl failed")?;
            info!(
                run_id = %report.run_id,
                catalog_entries = report.catalog_entries,
                films = report.films,
                persons = report.persons,
                failed = report.failed,
                resumed_films = report.resumed_films,
                resumed_persons = report.resumed_persons,
                elapsed = ?report.elapsed,
                "crawl finished"
            );
            ensure_completed(&report).context("crawl did not complete; rerun to resume")?;

            if skip_aggregate {
                return Ok(());
            }
            let report = AggregationEngine::new(config.aggregation.clone())
                .run_with(registry, store.as_ref())
                .await
                .context("aggregation failed")?;
            println!("{report}");
        }
        Command::Aggregate => {
            let report = AggregationEngine::new(config.aggregation.clone())
                .run(store.as_ref())
                .await
                .context("aggregation failed")?;
            println!("{report}");
        }
        Command::FixRevenues => {
            let context = stage_context(&config)?;
            let report = fix_revenues(store.as_ref(), &context)
                .await
                .context("revenue fix failed")?;
            println!(
                "{} candidates, {} fixed, {} unreachable",
                report.candidates, report.fixed, report.unreachable
            );
        }
        Command::Status => {
            let counts = status(store.as_ref()).await.context("failed to count records")?;
            println!("{counts}");
        }
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_config_path(path);
    }
    if let Some(path) = &cli.env_file {
        loader = loader.with_env_file(path);
    }
    let ConfigLoad { config, warnings } = loader.load().context("failed to load configuration")?;

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = config.metadata.config_path() {
        info!(path = %path.display(), "configuration file loaded");
    }
    if !config.metadata.env_overrides.is_empty() {
        info!(overrides = ?config.metadata.env_overrides, "environment overrides applied");
    }
    if !warnings.is_empty() {
        warn!(count = warnings.len(), "configuration loaded with warnings");
    }
    Ok(config)
}

async fn open_store(config: &Config) -> Result<Arc<dyn DocumentStore>> {
    match config.store.backend {
        StoreBackend::Memory => {
            info!(backend = %config.store.backend, "using process-local store");
            Ok(Arc::new(InMemoryStore::new()))
        }
        StoreBackend::Postgres => {
            let url = config
                .store
                .database_url
                .as_deref()
                .context("postgres backend selected without a database URL")?;
            let store = marquee_core::PostgresStore::connect(url, config.store.max_connections)
                .await
                .context("failed to open the postgres store")?;
            Ok(Arc::new(store))
        }
    }
}

fn stage_context(config: &Config) -> Result<StageContext> {
    let fetcher = HttpFetcher::new(&config.fetch.http_options())
        .context("failed to build the HTTP client")?;
    let sites = config.sources.sites()?;
    Ok(StageContext::new(Arc::new(fetcher), sites, config.pipeline.clone()))
}

fn spawn_ctrl_c(shutdown: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; finishing in-flight items");
            shutdown.cancel();
        }
    });
}
