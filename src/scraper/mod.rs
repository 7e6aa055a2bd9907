pub mod detail;
pub mod discovery;
pub mod listing;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::config::CrawlerConfig;
use crate::error::{CrawlError, FetchError, FetchFailure};
use crate::traits::{Fetch, FetchedPage};

pub use detail::DetailParser;
pub use discovery::{CategoryDiscoverer, Discovery};
pub use listing::ListingParser;

/// HTTP fetcher backed by one connection-pooled `reqwest::Client`.
///
/// Cloning is cheap and clones share the same pool.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &CrawlerConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(config.workers)
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::new(url.as_str(), classify(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                url.as_str(),
                FetchFailure::Status(status.as_u16()),
            ));
        }

        let body = response.bytes().await.map_err(|e| {
            let cause = if e.is_timeout() {
                FetchFailure::Timeout
            } else {
                FetchFailure::Body(e.to_string())
            };
            FetchError::new(url.as_str(), cause)
        })?;

        Ok(FetchedPage {
            status: status.as_u16(),
            body: body.to_vec(),
        })
    }
}

fn classify(error: &reqwest::Error) -> FetchFailure {
    if error.is_timeout() {
        FetchFailure::Timeout
    } else {
        FetchFailure::Network(error.to_string())
    }
}

/// Resolves `href` against the URL of the page it appeared on.
///
/// Relative links on the catalog are relative to the containing page's
/// directory, so `base` must be that page's own URL, never the site root.
pub fn resolve(base: &Url, href: &str) -> Option<Url> {
    base.join(href.trim()).ok()
}

pub(crate) fn compile(selector: &str) -> Result<Selector, CrawlError> {
    Selector::parse(selector).map_err(|e| CrawlError::InvalidSelector {
        selector: selector.to_string(),
        reason: format!("{e:?}"),
    })
}

/// Trimmed text of an element, `None` when blank.
pub(crate) fn element_text(element: ElementRef<'_>) -> Option<String> {
    let text = element.text().collect::<String>();
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

pub(crate) fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document.select(selector).next().and_then(element_text)
}
