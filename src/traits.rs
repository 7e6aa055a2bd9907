//! The fetch seam shared by discovery and the detail workers

use async_trait::async_trait;
use url::Url;

use crate::error::FetchError;

/// A successful (2xx) response.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    pub body: Vec<u8>,
}

impl FetchedPage {
    /// Response body as text; invalid UTF-8 sequences are replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Something that can GET a page.
///
/// Implementations are shared by every concurrent worker of a crawl, so they
/// must be usable through `&self` without external locking.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Fetch `url` once. Non-2xx responses are errors; no retries happen here.
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError>;
}
