//! Page fetching collaborators.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("{url} timed out")]
    Timeout { url: String },

    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("could not read body of {url}: {reason}")]
    Body { url: String, reason: String },
}

/// A fetched document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
}

impl FetchedPage {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }
}

#[async_trait]
pub trait Fetcher: Send + Sync + fmt::Debug {
    /// Fetches `url`. Any status of 400 or above is an error.
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;

    async fn fetch_body(&self, url: &str) -> Result<String, FetchError> {
        self.fetch(url).await.map(|page| page.body)
    }
}

#[derive(Debug, Clone)]
pub struct HttpFetcherOptions {
    pub timeout: Duration,
    pub user_agent: String,
    pub max_redirects: usize,
}

impl Default for HttpFetcherOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: concat!("marquee/", env!("CARGO_PKG_VERSION")).to_string(),
            max_redirects: 10,
        }
    }
}

/// reqwest-backed fetcher with a bounded per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(options: &HttpFetcherOptions) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .user_agent(options.user_agent.clone())
            .redirect(reqwest::redirect::Policy::limited(options.max_redirects))
            .build()
            .map_err(|err| FetchError::Transport {
                url: String::new(),
                reason: err.to_string(),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| classify(url, err))?;

        let status = response.status().as_u16();
        if status >= 400 {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let body = response.text().await.map_err(|err| {
            if err.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                }
            } else {
                FetchError::Body {
                    url: url.to_string(),
                    reason: err.to_string(),
                }
            }
        })?;

        tracing::trace!(url, status, bytes = body.len(), "fetched page");
        Ok(FetchedPage { status, body })
    }
}

fn classify(url: &str, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if let Some(status) = err.status() {
        FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        }
    } else {
        FetchError::Transport {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}

/// Serves canned pages by exact URL. Unknown URLs answer 404.
#[derive(Debug, Default)]
pub struct InMemoryFetcher {
    pages: RwLock<HashMap<String, FetchedPage>>,
}

impl InMemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: impl Into<String>, body: impl Into<String>) {
        self.insert_page(url, FetchedPage::ok(body));
    }

    pub fn insert_page(&self, url: impl Into<String>, page: FetchedPage) {
        if let Ok(mut pages) = self.pages.write() {
            pages.insert(url.into(), page);
        }
    }

    pub fn with_page(self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.insert(url, body);
        self
    }
}

#[async_trait]
impl Fetcher for InMemoryFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let page = self
            .pages
            .read()
            .ok()
            .and_then(|pages| pages.get(url).cloned())
            .unwrap_or(FetchedPage {
                status: 404,
                body: String::new(),
            });
        if page.status >= 400 {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: page.status,
            });
        }
        Ok(page)
    }
}
