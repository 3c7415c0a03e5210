use url::Url;

use marquee_model::{FilmId, PersonId, SourceId};

/// Catalog letter pages crawled by default. `NUM` has a single page.
pub fn default_catalog_letters() -> Vec<String> {
    std::iter::once("NUM".to_string())
        .chain(('A'..='Z').map(String::from))
        .collect()
}

pub const DEFAULT_CATALOG_BASE: &str = "http://www.boxofficemojo.com";
pub const DEFAULT_INDEX_BASE: &str = "http://www.imdb.com";

/// URL layout of the box-office catalog (site A) and the film index
/// (site B).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSites {
    catalog_base: String,
    index_base: String,
}

impl Default for SourceSites {
    fn default() -> Self {
        Self {
            catalog_base: DEFAULT_CATALOG_BASE.to_string(),
            index_base: DEFAULT_INDEX_BASE.to_string(),
        }
    }
}

impl SourceSites {
    /// Validates both base URLs.
    pub fn new(catalog_base: &str, index_base: &str) -> Result<Self, url::ParseError> {
        let catalog = Url::parse(catalog_base)?;
        let index = Url::parse(index_base)?;
        Ok(Self {
            catalog_base: catalog.as_str().trim_end_matches('/').to_string(),
            index_base: index.as_str().trim_end_matches('/').to_string(),
        })
    }

    fn catalog(&self) -> &str {
        &self.catalog_base
    }

    fn index(&self) -> &str {
        &self.index_base
    }

    pub fn catalog_listing(&self, letter: &str, page: u32) -> String {
        format!(
            "{}/movies/alphabetical.htm?letter={letter}&page={page}&p=.htm",
            self.catalog()
        )
    }

    pub fn catalog_film(&self, source_id: &SourceId) -> String {
        format!("{}/movies/?id={source_id}.htm", self.catalog())
    }

    pub fn index_search(&self, title: &str) -> String {
        let query: String = url::form_urlencoded::byte_serialize(title.as_bytes()).collect();
        format!("{}/find?ref_=nv_sr_fn&q={query}&s=all", self.index())
    }

    pub fn index_title(&self, id: &FilmId) -> String {
        format!("{}/title/{id}/?ref_=fn_al_tt_1", self.index())
    }

    pub fn index_credits(&self, id: &FilmId) -> String {
        format!("{}/title/{id}/fullcredits", self.index())
    }

    pub fn index_person(&self, id: &PersonId) -> String {
        format!("{}/name/{id}/?ref_=fn_al_tt_1", self.index())
    }
}
