//! Film index pages (site B): search results, title pages, full credits and
//! person pages.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};

use marquee_model::{FilmId, PersonId, Role};

use super::{ExtractError, id_from_href, parse_digits, text_of};
use crate::config::PipelineConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub id: FilmId,
    /// Visible text of the result, including year and content type.
    pub text: String,
}

/// Lists the results of the "Titles" section of a search page, in page order.
pub fn search_results(html: &str) -> Vec<SearchResult> {
    let document = Html::parse_document(html);
    document
        .select(selector!("div.findSection"))
        .filter(|section| {
            section
                .select(selector!("h3.findSectionHeader"))
                .next()
                .is_some_and(|header| text_of(header).contains("Titles"))
        })
        .flat_map(|section| {
            section
                .select(selector!("table.findList td.result_text"))
                .collect::<Vec<_>>()
        })
        .filter_map(|cell| {
            let href = cell.select(selector!("a")).next()?.value().attr("href")?;
            let id = id_from_href(href, "/title/")?;
            Some(SearchResult {
                id: FilmId::new(id),
                text: text_of(cell),
            })
        })
        .collect()
}

/// First result whose text carries a year within the configured tolerance of
/// `year` and which is not an excluded content type.
pub fn pick_match(
    results: &[SearchResult],
    year: Option<i32>,
    config: &PipelineConfig,
) -> Option<FilmId> {
    let tolerance = config.year_tolerance.max(0);
    results
        .iter()
        .filter(|result| !config.is_excluded(&result.text))
        .find(|result| match year {
            Some(year) => (year - tolerance..=year + tolerance)
                .any(|candidate| result.text.contains(&candidate.to_string())),
            None => true,
        })
        .map(|result| result.id.clone())
}

/// Every field read from a title page, each resolved independently.
#[derive(Debug, Clone, PartialEq)]
pub struct TitleDetails {
    pub audience_score: Result<f64, ExtractError>,
    pub critic_score: Result<i64, ExtractError>,
    pub vote_count: Result<i64, ExtractError>,
    pub runtime_minutes: Result<i64, ExtractError>,
    pub content_rating: Result<String, ExtractError>,
    pub budget: Result<i64, ExtractError>,
    pub release_date: Result<NaiveDate, ExtractError>,
    pub director: Result<PersonId, ExtractError>,
}

pub fn parse_title_page(html: &str) -> TitleDetails {
    let document = Html::parse_document(html);
    let root = document.root_element();

    TitleDetails {
        audience_score: first_text(root, selector!("span[itemprop=ratingValue]"), "ratingValue")
            .and_then(|text| {
                text.parse().map_err(|_| ExtractError::Malformed {
                    what: "audience score",
                    value: text,
                })
            }),
        critic_score: first_text(root, selector!("div.metacriticScore"), "metacriticScore")
            .and_then(|text| parse_digits("critic score", &text)),
        vote_count: first_text(root, selector!("span[itemprop=ratingCount]"), "ratingCount")
            .and_then(|text| parse_digits("vote count", &text)),
        runtime_minutes: first_attr(root, selector!("time[itemprop=duration]"), "datetime")
            .and_then(|value| parse_duration(&value)),
        content_rating: first_attr(root, selector!("meta[itemprop=contentRating]"), "content"),
        budget: budget(root),
        release_date: first_attr(root, selector!("meta[itemprop=datePublished]"), "content")
            .and_then(|value| {
                NaiveDate::parse_from_str(&value, "%Y-%m-%d").map_err(|_| {
                    ExtractError::Malformed {
                        what: "release date",
                        value,
                    }
                })
            }),
        director: root
            .select(selector!("span[itemprop=director] a"))
            .next()
            .and_then(|link| link.value().attr("href"))
            .and_then(|href| id_from_href(href, "/name/"))
            .map(PersonId::new)
            .ok_or(ExtractError::Missing("span[itemprop=director] a")),
    }
}

static DURATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^PT(?:(\d+)H)?(?:(\d+)M)?$").expect("static duration pattern is valid")
});

/// ISO 8601 durations as used for runtimes: `PT162M` or `PT2H42M`.
fn parse_duration(value: &str) -> Result<i64, ExtractError> {
    let malformed = || ExtractError::Malformed {
        what: "runtime",
        value: value.to_string(),
    };
    let captures = DURATION.captures(value.trim()).ok_or_else(malformed)?;
    let part = |index: usize| -> Result<i64, ExtractError> {
        captures
            .get(index)
            .map_or(Ok(0), |m| m.as_str().parse().map_err(|_| malformed()))
    };
    let minutes = part(1)? * 60 + part(2)?;
    if minutes == 0 {
        return Err(malformed());
    }
    Ok(minutes)
}

fn first_text(
    root: ElementRef<'_>,
    selector: &scraper::Selector,
    what: &'static str,
) -> Result<String, ExtractError> {
    root.select(selector)
        .next()
        .map(text_of)
        .filter(|text| !text.is_empty())
        .ok_or(ExtractError::Missing(what))
}

fn first_attr(
    root: ElementRef<'_>,
    selector: &scraper::Selector,
    attr: &'static str,
) -> Result<String, ExtractError> {
    root.select(selector)
        .next()
        .and_then(|element| element.value().attr(attr))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(ExtractError::Missing(attr))
}

fn budget(root: ElementRef<'_>) -> Result<i64, ExtractError> {
    root.select(selector!("#titleDetails div.txt-block"))
        .find(|block| {
            block
                .select(selector!("h4"))
                .next()
                .is_some_and(|heading| text_of(heading).contains("Budget"))
        })
        .ok_or(ExtractError::Missing("Budget"))
        .and_then(|block| parse_digits("budget", &text_of(block)))
}

/// Cast list from the full credits page, in billing order without repeats.
pub fn credited_actors(html: &str) -> Result<Vec<PersonId>, ExtractError> {
    let document = Html::parse_document(html);
    let mut actors: Vec<PersonId> = Vec::new();
    for link in document.select(selector!("td[itemprop=actor] a")) {
        let Some(id) = link
            .value()
            .attr("href")
            .and_then(|href| id_from_href(href, "/name/"))
        else {
            continue;
        };
        let id = PersonId::new(id);
        if !actors.contains(&id) {
            actors.push(id);
        }
    }
    if actors.is_empty() {
        return Err(ExtractError::Missing("td[itemprop=actor] a"));
    }
    Ok(actors)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersonDetails {
    pub name: Result<String, ExtractError>,
    pub birth_date: Result<NaiveDate, ExtractError>,
    /// Oldest first.
    pub films: Result<Vec<FilmId>, ExtractError>,
}

/// Reads a person page. `role` picks the filmography section: acting credits
/// for cast records, directing credits for director records.
pub fn parse_person_page(html: &str, role: Role) -> PersonDetails {
    let document = Html::parse_document(html);
    let root = document.root_element();

    PersonDetails {
        name: first_text(root, selector!("span[itemprop=name]"), "name"),
        birth_date: first_attr(root, selector!("time[itemprop=birthDate]"), "datetime")
            .and_then(|value| parse_birth_date(&value)),
        films: filmography(&document, role),
    }
}

/// Birth dates may carry zero month/day when only the year is known.
fn parse_birth_date(value: &str) -> Result<NaiveDate, ExtractError> {
    let malformed = || ExtractError::Malformed {
        what: "birth date",
        value: value.to_string(),
    };
    let mut parts = value.split('-').map(|part| part.trim().parse::<u32>());
    let year = parts.next().and_then(Result::ok).ok_or_else(malformed)?;
    let month = parts.next().and_then(Result::ok).unwrap_or(0).max(1);
    let day = parts.next().and_then(Result::ok).unwrap_or(0).max(1);
    let year = i32::try_from(year).map_err(|_| malformed())?;
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(malformed)
}

fn filmography(document: &Html, role: Role) -> Result<Vec<FilmId>, ExtractError> {
    let heads: Vec<(&scraper::Selector, &str)> = match role {
        Role::Cast => vec![
            (selector!("div#filmo-head-actor"), "actor-"),
            (selector!("div#filmo-head-actress"), "actress-"),
        ],
        Role::Director => vec![(selector!("div#filmo-head-director"), "director-")],
    };

    let (head, prefix) = heads
        .into_iter()
        .find_map(|(selector, prefix)| document.select(selector).next().map(|head| (head, prefix)))
        .ok_or(ExtractError::Missing("div#filmo-head"))?;

    let section = head
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|element| {
            element
                .value()
                .classes()
                .any(|class| class == "filmo-category-section")
        })
        .ok_or(ExtractError::Missing("div.filmo-category-section"))?;

    let mut films: Vec<FilmId> = section
        .select(selector!("div"))
        .filter_map(|row| row.value().id())
        .map(|id| FilmId::new(id.strip_prefix(prefix).unwrap_or(id)))
        .filter(|id| !id.is_empty())
        .collect();
    // Listed newest first.
    films.reverse();
    Ok(films)
}
