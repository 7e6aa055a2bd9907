//! Category discovery and pagination walking
//!
//! Each category is walked page by page: every page's "next" link is
//! resolved against that page's own URL. A failed page ends its category
//! but keeps the pages already collected.

use std::collections::HashSet;

use scraper::{Html, Selector};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::CrawlerConfig;
use crate::error::{CrawlError, PaginationError};
use crate::models::{CategoryPage, ListingDocument};
use crate::traits::Fetch;

use super::{compile, resolve};

/// Every listing page reached from the root, in category then page order.
#[derive(Debug, Default)]
pub struct Discovery {
    pub categories: usize,
    pub listings: Vec<ListingDocument>,
    pub truncated: Vec<PaginationError>,
}

impl Discovery {
    pub fn pages(&self) -> impl Iterator<Item = &CategoryPage> {
        self.listings.iter().map(|listing| &listing.page)
    }
}

pub struct CategoryDiscoverer {
    anchors: Selector,
    next_page: Selector,
    category_path: String,
    max_pages: usize,
}

impl CategoryDiscoverer {
    pub fn new(config: &CrawlerConfig) -> Result<Self, CrawlError> {
        Ok(Self {
            anchors: compile("a[href]")?,
            next_page: compile(&config.selectors.next_page)?,
            category_path: config.selectors.category_path.clone(),
            max_pages: config.max_pages_per_category.max(1),
        })
    }

    pub async fn discover<F>(
        &self,
        fetcher: &F,
        root: &Url,
        cancel: &CancellationToken,
    ) -> Result<Discovery, CrawlError>
    where
        F: Fetch + ?Sized,
    {
        let root_page = fetcher
            .fetch(root)
            .await
            .map_err(CrawlError::RootUnavailable)?;
        let starts = self.category_links(&root_page.text(), root);

        if starts.is_empty() {
            return Err(CrawlError::NoCategories {
                root: root.to_string(),
            });
        }

        info!("Found {} categories on {}", starts.len(), root);

        let mut discovery = Discovery {
            categories: starts.len(),
            ..Discovery::default()
        };
        let mut visited = HashSet::new();

        for start in starts {
            if cancel.is_cancelled() {
                return Err(CrawlError::Cancelled);
            }
            self.walk_category(fetcher, start, &mut visited, &mut discovery)
                .await;
        }

        Ok(discovery)
    }

    async fn walk_category<F>(
        &self,
        fetcher: &F,
        start: CategoryPage,
        visited: &mut HashSet<Url>,
        discovery: &mut Discovery,
    ) where
        F: Fetch + ?Sized,
    {
        let CategoryPage {
            url: mut current,
            category,
        } = start;
        let mut page_num = 0;

        loop {
            if !visited.insert(current.clone()) {
                debug!(url = %current, "listing page already visited, stopping pagination");
                break;
            }

            if page_num >= self.max_pages {
                warn!(
                    category = %category,
                    "Reached maximum page limit ({}), stopping pagination",
                    self.max_pages
                );
                break;
            }

            let page = match fetcher.fetch(&current).await {
                Ok(page) => page,
                Err(source) => {
                    warn!(url = %current, stage = "pagination", error = %source, "listing page fetch failed");
                    discovery.truncated.push(PaginationError {
                        category: category.clone(),
                        url: current.to_string(),
                        source,
                    });
                    break;
                }
            };

            page_num += 1;
            debug!(url = %current, status = page.status, page = page_num, "fetched listing page");
            let html = page.text();
            let next = self.next_page_url(&html, &current);

            discovery.listings.push(ListingDocument {
                page: CategoryPage {
                    url: current.clone(),
                    category: category.clone(),
                },
                html,
            });

            match next {
                Some(next) => current = next,
                None => {
                    debug!(category = %category, pages = page_num, "no more pages");
                    break;
                }
            }
        }
    }

    /// Distinct category listing links on the root page, in document order.
    ///
    /// Links whose path yields no category name are dropped.
    pub fn category_links(&self, html: &str, root: &Url) -> Vec<CategoryPage> {
        let document = Html::parse_document(html);
        let mut seen = HashSet::new();

        document
            .select(&self.anchors)
            .filter_map(|a| a.value().attr("href"))
            .filter(|href| href.contains(&self.category_path) && !href.starts_with("../"))
            .filter_map(|href| resolve(root, href))
            .filter(|url| seen.insert(url.clone()))
            .filter_map(|url| {
                let page = CategoryPage::from_url(url.clone());
                if page.is_none() {
                    debug!(url = %url, "skipping category link without a category name");
                }
                page
            })
            .collect()
    }

    /// The "next page" link of a listing page, resolved against that page.
    pub fn next_page_url(&self, html: &str, current: &Url) -> Option<Url> {
        let document = Html::parse_document(html);
        let href = document
            .select(&self.next_page)
            .next()?
            .value()
            .attr("href")?;
        resolve(current, href)
    }
}
