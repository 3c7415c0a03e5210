//! Site-specific document extraction.
//!
//! Everything here is synchronous and operates on a fetched body. Parsed
//! documents never cross an `.await`; stages fetch first, then hand the raw
//! text to these functions.

use scraper::ElementRef;
use thiserror::Error;

macro_rules! selector {
    ($css:literal) => {{
        static SELECTOR: once_cell::sync::Lazy<scraper::Selector> =
            once_cell::sync::Lazy::new(|| {
                scraper::Selector::parse($css)
                    .expect(concat!("static CSS selector `", $css, "` is valid"))
            });
        &*SELECTOR
    }};
}

pub mod catalog;
pub mod index;
pub mod sites;

pub use catalog::{CatalogEntry, catalog_rows, catalog_revenue};
pub use index::{
    PersonDetails, SearchResult, TitleDetails, credited_actors, parse_person_page,
    parse_title_page, pick_match, search_results,
};
pub use sites::{SourceSites, default_catalog_letters};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    #[error("no element matching `{0}`")]
    Missing(&'static str),

    #[error("could not parse {what} from `{value}`")]
    Malformed { what: &'static str, value: String },
}

pub(crate) fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

pub(crate) fn digits_of(text: &str) -> String {
    text.chars().filter(char::is_ascii_digit).collect()
}

/// Parses the digits embedded in `text`, e.g. `$1,234 (estimated)`.
pub(crate) fn parse_digits(what: &'static str, text: &str) -> Result<i64, ExtractError> {
    digits_of(text).parse().map_err(|_| ExtractError::Malformed {
        what,
        value: text.to_string(),
    })
}

/// Pulls the id segment out of a link such as `/title/tt0086190/?ref_=x`.
pub(crate) fn id_from_href(href: &str, prefix: &str) -> Option<String> {
    let rest = href.split_once(prefix).map(|(_, rest)| rest)?;
    let id = rest.split(['/', '?']).next()?.trim();
    (!id.is_empty()).then(|| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_from_href_strips_path_and_query() {
        assert_eq!(
            id_from_href("/title/tt0086190/?ref_=fn_al_tt_1", "/title/").as_deref(),
            Some("tt0086190")
        );
        assert_eq!(
            id_from_href("/name/nm0000116?ref_=tt_ov_dr", "/name/").as_deref(),
            Some("nm0000116")
        );
        assert_eq!(id_from_href("/title/", "/title/"), None);
        assert_eq!(id_from_href("/other/x", "/title/"), None);
    }

    #[test]
    fn parse_digits_ignores_decoration() {
        assert_eq!(parse_digits("budget", "Budget: $237,000,000 (estimated)"), Ok(237_000_000));
        assert!(parse_digits("budget", "n/a").is_err());
    }
}
