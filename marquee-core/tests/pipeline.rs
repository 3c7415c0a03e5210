use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use marquee_core::fetch::FetchedPage;
use marquee_core::store::{all, insert_record};
use marquee_core::{
    AggregationEngine, CrawlOptions, Crawler, DocumentStore, FetchError, Fetcher,
    InMemoryFetcher, InMemoryStore, PipelineConfig, SourceSites, StageContext,
};
use marquee_model::{FILMS, FILMS_AGG, Film, FilmId, PERSONS, PersonId, SourceId};

/// Counts requests per URL on top of the canned pages.
#[derive(Debug)]
struct CountingFetcher {
    inner: InMemoryFetcher,
    hits: Mutex<HashMap<String, usize>>,
}

impl CountingFetcher {
    fn new(inner: InMemoryFetcher) -> Self {
        Self {
            inner,
            hits: Mutex::new(HashMap::new()),
        }
    }

    fn hits(&self, url: &str) -> usize {
        self.hits.lock().expect("hits lock").get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Fetcher for CountingFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        *self.hits.lock().expect("hits lock").entry(url.to_string()).or_default() += 1;
        self.inner.fetch(url).await
    }
}

fn listing_row(id: &str, title: &str, opened: &str) -> String {
    format!(
        r#"<tr><td><b><a href="/movies/?id={id}.htm">{title}</a></b></td><td>Studio</td>
           <td>$1,000</td><td>100</td><td>$500</td><td>100</td><td>{opened}</td></tr>"#
    )
}

fn search_page(results: &[(&str, &str)]) -> String {
    let rows: String = results
        .iter()
        .map(|(id, text)| {
            format!(r#"<tr><td class="result_text"><a href="/title/{id}/">{text}</a></td></tr>"#)
        })
        .collect();
    format!(
        r#"<div class="findSection"><h3 class="findSectionHeader">Titles</h3>
           <table class="findList">{rows}</table></div>"#
    )
}

fn title_page(released: &str, director: &str) -> String {
    format!(
        r#"<span itemprop="ratingValue">7.0</span>
           <span itemprop="ratingCount">1,000</span>
           <meta itemprop="datePublished" content="{released}">
           <span itemprop="director"><a href="/name/{director}/">Director</a></span>"#
    )
}

fn credits_page(actors: &[&str]) -> String {
    actors
        .iter()
        .map(|id| format!(r#"<tr><td itemprop="actor"><a href="/name/{id}/">Actor</a></td></tr>"#))
        .collect()
}

fn revenue_page(gross: &str) -> String {
    format!(
        r#"<div class="mp_box_content"><table>
           <tr><td>Worldwide:</td><td>{gross}</td></tr></table></div>"#
    )
}

/// `films` newest first, as person pages list them.
fn person_page(name: &str, born: &str, head: &str, films: &[&str]) -> String {
    let rows: String = films
        .iter()
        .map(|id| format!(r#"<div class="filmo-row" id="{head}-{id}">Film</div>"#))
        .collect();
    format!(
        r#"<span itemprop="name">{name}</span>
           <time itemprop="birthDate" datetime="{born}"></time>
           <div id="filmo-head-{head}">Credits</div>
           <div class="filmo-category-section">{rows}</div>"#
    )
}

/// Two resolvable films sharing an actor and a director, and one film the
/// index does not know.
fn catalog_fixture(sites: &SourceSites) -> InMemoryFetcher {
    let listing = format!(
        "<table>{}{}{}</table>",
        listing_row("alpha", "Alpha", "06/01/2000"),
        listing_row("beta", "Beta", "06/01/2005"),
        listing_row("ghost", "Ghost", "01/01/2003"),
    );
    let fetcher = InMemoryFetcher::new()
        .with_page(sites.catalog_listing("A", 1), listing)
        .with_page(sites.catalog_listing("A", 2), "<table></table>")
        .with_page(
            sites.index_search("Alpha"),
            search_page(&[("tt9", "Alpha (2000) (Video Game)"), ("tt1", "Alpha (2000)")]),
        )
        .with_page(sites.index_search("Beta"), search_page(&[("tt2", "Beta (2005)")]))
        .with_page(sites.index_search("Ghost"), search_page(&[("tt7", "Ghost (1950)")]));

    let tt1 = FilmId::new("tt1");
    let tt2 = FilmId::new("tt2");
    fetcher.insert(sites.index_title(&tt1), title_page("2000-06-01", "nm9"));
    fetcher.insert(sites.index_credits(&tt1), credits_page(&["nm1", "nm2"]));
    fetcher.insert(sites.catalog_film(&SourceId::new("alpha")), revenue_page("$100"));
    fetcher.insert(sites.index_title(&tt2), title_page("2005-06-01", "nm9"));
    fetcher.insert(sites.index_credits(&tt2), credits_page(&["nm1", "nm3"]));
    fetcher.insert(sites.catalog_film(&SourceId::new("beta")), revenue_page("$300"));

    let person = |id: &str| sites.index_person(&PersonId::new(id));
    fetcher.insert(person("nm1"), person_page("One", "1970-01-01", "actor", &["tt2", "tt1"]));
    fetcher.insert(person("nm2"), person_page("Two", "1980-01-01", "actress", &["tt1"]));
    fetcher.insert(person("nm3"), person_page("Three", "1990-01-01", "actor", &["tt2"]));
    fetcher.insert(person("nm9"), person_page("Nine", "1960-01-01", "director", &["tt2", "tt1"]));
    fetcher
}

fn crawler(fetcher: Arc<dyn Fetcher>, store: Arc<InMemoryStore>, letters: &[&str]) -> Crawler {
    let config = PipelineConfig {
        progress_interval_ms: 50,
        ..PipelineConfig::default()
    };
    let context = StageContext::new(fetcher, SourceSites::default(), config);
    Crawler::new(
        context,
        store,
        CrawlOptions {
            fresh: false,
            letters: letters.iter().map(|letter| letter.to_string()).collect(),
            shutdown_grace: Duration::from_secs(5),
        },
    )
}

async fn stored_film(store: &InMemoryStore, filter: serde_json::Value) -> serde_json::Value {
    let mut found = store.find(FILMS, &filter).await.expect("find film");
    assert_eq!(found.len(), 1, "expected exactly one film for {filter}");
    found.remove(0)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn crawl_persists_everything_once_and_aggregates() -> anyhow::Result<()> {
    let sites = SourceSites::default();
    let fetcher = Arc::new(CountingFetcher::new(catalog_fixture(&sites)));
    let store = Arc::new(InMemoryStore::new());

    let (report, registry) = crawler(fetcher.clone(), store.clone(), &["A"])
        .run(CancellationToken::new())
        .await?;

    assert!(!report.cancelled);
    assert_eq!(report.catalog_entries, 3);
    assert_eq!(report.films, 3);
    assert_eq!(report.persons, 4);
    assert_eq!(report.failed, 1);

    // nm1 acts in both films but is fetched once; the director keeps a
    // record of its own.
    assert_eq!(fetcher.hits(&sites.index_person(&PersonId::new("nm1"))), 1);
    assert_eq!(fetcher.hits(&sites.index_person(&PersonId::new("nm9"))), 1);
    assert_eq!(store.count(PERSONS, &json!({"id": "nm1"})).await?, 1);
    assert_eq!(store.count(PERSONS, &json!({"id": "nm9", "role": "director"})).await?, 1);
    assert_eq!(store.count(PERSONS, &json!({"id": "nm9", "role": "cast"})).await?, 0);

    let alpha = stored_film(&store, json!({"sourceId": "alpha"})).await;
    assert_eq!(alpha["id"], "tt1");
    assert_eq!(alpha["revenue"], 100);
    assert_eq!(alpha["FAILED"], false);

    // The index has no match for Ghost; it is still persisted, with defaults.
    let ghost = stored_film(&store, json!({"sourceId": "ghost"})).await;
    assert_eq!(ghost["FAILED"], true);
    assert_eq!(ghost["id"], "");
    assert_eq!(ghost["releaseDate"], "3000-01-01");

    let aggregation = AggregationEngine::default()
        .run_with(registry, store.as_ref())
        .await?;
    assert_eq!(aggregation.films, 3);
    assert_eq!(aggregation.failed_films, 1);
    assert_eq!(store.count(FILMS_AGG, &all()).await?, 3);

    let beta = store.find(FILMS_AGG, &json!({"id": "tt2"})).await?.remove(0);
    let beta: Film = serde_json::from_value(beta)?;
    assert_eq!(beta.aggregates.max_cast_revenue, 100.0);
    // nm1 has one earlier film, nm3 debuts in Beta.
    assert_eq!(beta.aggregates.avg_cast_appearances, 0.5);
    assert_eq!(beta.aggregates.max_cast_appearances, 1.0);
    assert_eq!(beta.aggregates.director_film_count, 1.0);
    assert_eq!(beta.aggregates.avg_director_revenue, 100.0);
    assert_eq!(beta.aggregates.director_age, 45.0);

    let alpha = store.find(FILMS_AGG, &json!({"id": "tt1"})).await?.remove(0);
    let alpha: Film = serde_json::from_value(alpha)?;
    assert_eq!(alpha.aggregates.director_film_count, 0.0);
    assert_eq!(alpha.aggregates.avg_cast_revenue, 0.0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn resumed_crawl_skips_persisted_work() -> anyhow::Result<()> {
    let sites = SourceSites::default();
    let store = Arc::new(InMemoryStore::new());

    let first = Arc::new(CountingFetcher::new(catalog_fixture(&sites)));
    crawler(first, store.clone(), &["A"])
        .run(CancellationToken::new())
        .await?;

    let second = Arc::new(CountingFetcher::new(catalog_fixture(&sites)));
    let (report, registry) = crawler(second.clone(), store.clone(), &["A"])
        .run(CancellationToken::new())
        .await?;

    assert_eq!(report.resumed_films, 3);
    assert_eq!(report.resumed_persons, 4);
    assert_eq!(report.catalog_entries, 0);
    assert_eq!(report.films, 0);
    assert_eq!(report.persons, 0);
    assert_eq!(second.hits(&sites.index_search("Alpha")), 0);
    assert_eq!(store.count(FILMS, &all()).await?, 3);
    assert_eq!(registry.film_count(), 3);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn people_of_persisted_films_are_picked_up_again() -> anyhow::Result<()> {
    let sites = SourceSites::default();
    let store = Arc::new(InMemoryStore::new());

    let mut film = Film::candidate(SourceId::new("alpha"), "Alpha", Some(2000));
    film.id = FilmId::new("tt1");
    film.actors = vec![PersonId::new("nm1")];
    film.director = Some(PersonId::new("nm9"));
    insert_record(store.as_ref(), FILMS, &film).await?;

    let fetcher = Arc::new(CountingFetcher::new(catalog_fixture(&sites)));
    let (report, _) = crawler(fetcher.clone(), store.clone(), &[])
        .run(CancellationToken::new())
        .await?;

    assert_eq!(report.films, 0);
    assert_eq!(report.persons, 2);
    assert_eq!(store.count(PERSONS, &json!({"id": "nm1", "role": "cast"})).await?, 1);
    assert_eq!(store.count(PERSONS, &json!({"id": "nm9", "role": "director"})).await?, 1);
    Ok(())
}

#[tokio::test]
async fn fresh_crawl_drops_previous_collections() -> anyhow::Result<()> {
    let store = Arc::new(InMemoryStore::new());
    store.insert(FILMS_AGG, json!({"id": "stale"})).await?;
    store.insert(FILMS, json!({"id": "stale", "sourceId": "stale"})).await?;

    let context = StageContext::new(
        Arc::new(InMemoryFetcher::new()),
        SourceSites::default(),
        PipelineConfig::default(),
    );
    let options = CrawlOptions {
        fresh: true,
        letters: Vec::new(),
        shutdown_grace: Duration::from_secs(1),
    };
    let (report, registry) = Crawler::new(context, store.clone(), options)
        .run(CancellationToken::new())
        .await?;

    assert_eq!(report.resumed_films, 0);
    assert_eq!(registry.film_count(), 0);
    assert_eq!(store.count(FILMS, &all()).await?, 0);
    assert_eq!(store.count(FILMS_AGG, &all()).await?, 0);
    Ok(())
}
