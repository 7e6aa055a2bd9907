//! Item cards on a listing page

use scraper::{Html, Selector};
use tracing::debug;

use crate::config::CatalogSelectors;
use crate::error::CrawlError;
use crate::models::{CategoryPage, DetailRef};

use super::{compile, resolve};

pub struct ListingParser {
    item_link: Selector,
}

impl ListingParser {
    pub fn new(selectors: &CatalogSelectors) -> Result<Self, CrawlError> {
        Ok(Self {
            item_link: compile(&selectors.item_link)?,
        })
    }

    /// One `DetailRef` per item card, with links resolved against the listing page.
    pub fn parse(&self, html: &str, page: &CategoryPage) -> Vec<DetailRef> {
        let document = Html::parse_document(html);

        document
            .select(&self.item_link)
            .filter_map(|link| {
                let href = link.value().attr("href")?;
                let url = resolve(&page.url, href);
                if url.is_none() {
                    debug!(page = %page.url, href, "skipping unresolvable item link");
                }
                url
            })
            .map(|url| DetailRef {
                url,
                category: page.category.clone(),
            })
            .collect()
    }
}
