//! Box-office catalog pages (site A).

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};

use marquee_model::SourceId;

use super::{ExtractError, parse_digits, text_of};
use crate::config::RevenuePriority;

/// One row of the alphabetical catalog listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub source_id: SourceId,
    pub title: String,
    pub year: i32,
}

/// Catalog film links look like `/movies/?id=avatar.htm`.
static SOURCE_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[?&]id=([^&#]+?)\.htm").expect("static catalog id pattern is valid")
});

/// Parses every usable film row of a listing page. An empty result means the
/// letter has no further pages.
pub fn catalog_rows(html: &str) -> Vec<CatalogEntry> {
    let document = Html::parse_document(html);
    document
        .select(selector!("tr"))
        .filter_map(|row| parse_row(row).ok())
        .collect()
}

fn parse_row(row: ElementRef<'_>) -> Result<CatalogEntry, ExtractError> {
    let cells: Vec<ElementRef<'_>> = row.select(selector!("td")).collect();
    if cells.len() < 7 {
        return Err(ExtractError::Missing("td"));
    }
    let gross = text_of(cells[2]);
    if gross == "n/a" {
        return Err(ExtractError::Malformed {
            what: "gross",
            value: gross,
        });
    }

    let href = cells[0]
        .select(selector!("a"))
        .next()
        .and_then(|link| link.value().attr("href"))
        .ok_or(ExtractError::Missing("td a[href]"))?;
    let source_id = SOURCE_ID
        .captures(href)
        .and_then(|captures| captures.get(1))
        .map(|id| id.as_str().to_string())
        .ok_or_else(|| ExtractError::Malformed {
            what: "catalog id",
            value: href.to_string(),
        })?;

    let opened = text_of(cells[6]);
    let year = NaiveDate::parse_from_str(&opened, "%m/%d/%Y")
        .map_err(|_| ExtractError::Malformed {
            what: "release date",
            value: opened.clone(),
        })?
        .year();

    Ok(CatalogEntry {
        source_id: SourceId::new(source_id),
        title: text_of(cells[0]),
        year,
    })
}

/// Reads the lifetime gross from a catalog film page, choosing between the
/// worldwide and domestic figures according to `priority`.
pub fn catalog_revenue(html: &str, priority: RevenuePriority) -> Result<i64, ExtractError> {
    let document = Html::parse_document(html);
    let mut worldwide = None;
    let mut domestic = None;

    for block in document.select(selector!("div.mp_box_content")) {
        let cells: Vec<ElementRef<'_>> = block.select(selector!("td")).collect();
        for pair in cells.windows(2) {
            let (label, value) = (text_of(pair[0]), text_of(pair[1]));
            if !value.contains('$') {
                continue;
            }
            if worldwide.is_none() && label.contains("Worldwide:") {
                worldwide = parse_digits("worldwide gross", &value).ok().filter(|v| *v > 0);
            } else if domestic.is_none() && label.contains("Domestic:") {
                domestic = parse_digits("domestic gross", &value).ok().filter(|v| *v > 0);
            }
        }
    }

    priority
        .pick(worldwide, domestic)
        .ok_or(ExtractError::Missing("div.mp_box_content gross"))
}
