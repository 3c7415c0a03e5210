//! Store maintenance: revenue repair and status counts.

use std::fmt;

use serde_json::json;

use marquee_model::{FILMS, FILMS_AGG, Film, PERSONS, Record};

use crate::error::Result;
use crate::extract::catalog_revenue;
use crate::stages::StageContext;
use crate::store::{DocumentStore, all};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevenueFixReport {
    pub candidates: usize,
    pub fixed: usize,
    pub unreachable: usize,
}

/// Re-fetches the catalog page of every non-FAILED film stored with zero
/// revenue and writes back any positive gross found.
pub async fn fix_revenues(
    store: &dyn DocumentStore,
    context: &StageContext,
) -> Result<RevenueFixReport> {
    let documents = store.find(FILMS, &json!({"revenue": 0, "FAILED": false})).await?;
    let mut report = RevenueFixReport {
        candidates: documents.len(),
        ..RevenueFixReport::default()
    };
    tracing::info!(
        target: "marquee::store",
        candidates = report.candidates,
        "fixing zero revenues"
    );

    for document in documents {
        let film = match Film::from_record(document) {
            Ok(film) if !film.source_id.is_empty() => film,
            Ok(_) => continue,
            Err(err) => {
                tracing::warn!(target: "marquee::store", error = %err, "skipping undecodable film");
                continue;
            }
        };

        let url = context.sites.catalog_film(&film.source_id);
        let body = match context.fetcher.fetch_body(&url).await {
            Ok(body) => body,
            Err(err) => {
                report.unreachable += 1;
                tracing::warn!(
                    target: "marquee::store",
                    source_id = %film.source_id,
                    error = %err,
                    "catalog page unavailable"
                );
                continue;
            }
        };

        match catalog_revenue(&body, context.config.revenue_priority) {
            Ok(revenue) if revenue > 0 => {
                let matched = store
                    .update(
                        FILMS,
                        &json!({"sourceId": film.source_id}),
                        &json!({"revenue": revenue}),
                    )
                    .await?;
                report.fixed += 1;
                tracing::info!(
                    target: "marquee::store",
                    source_id = %film.source_id,
                    revenue,
                    matched,
                    "revenue fixed"
                );
            }
            _ => {
                tracing::debug!(
                    target: "marquee::store",
                    source_id = %film.source_id,
                    "still no revenue"
                );
            }
        }
    }
    Ok(report)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStatus {
    pub films: u64,
    pub failed_films: u64,
    pub persons: u64,
    pub failed_persons: u64,
    pub aggregated: u64,
}

impl fmt::Display for StoreStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "films:      {} ({} FAILED)", self.films, self.failed_films)?;
        writeln!(f, "persons:    {} ({} FAILED)", self.persons, self.failed_persons)?;
        write!(f, "aggregated: {}", self.aggregated)
    }
}

pub async fn status(store: &dyn DocumentStore) -> Result<StoreStatus> {
    let failed = json!({"FAILED": true});
    Ok(StoreStatus {
        films: store.count(FILMS, &all()).await?,
        failed_films: store.count(FILMS, &failed).await?,
        persons: store.count(PERSONS, &all()).await?,
        failed_persons: store.count(PERSONS, &failed).await?,
        aggregated: store.count(FILMS_AGG, &all()).await?,
    })
}
