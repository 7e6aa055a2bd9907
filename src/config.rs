//! Runtime configuration for the catalog crawler
//!
//! Values come from environment variables (a `.env` file is loaded by the
//! binary before this runs). Every setting has a default that targets
//! books.toscrape.com.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use url::Url;

pub const DEFAULT_ROOT_URL: &str = "https://books.toscrape.com/";
pub const DEFAULT_WORKERS: usize = 16;

/// Settings for one crawler instance.
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Catalog home page, the only entry point of a crawl
    pub root_url: Url,
    /// Where the dataset CSV is written
    pub output_path: PathBuf,
    /// Size of the detail fetch+parse worker pool
    pub workers: usize,
    /// Per-request timeout applied by the fetcher
    pub request_timeout: Duration,
    /// Extra attempts for a detail page after a transient fetch failure
    pub retries: u32,
    /// Stops a pagination chain that never ends
    pub max_pages_per_category: usize,
    /// Cron expression for periodic re-crawls; run once when unset
    pub schedule: Option<String>,
    pub user_agent: String,
    pub selectors: CatalogSelectors,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            root_url: Url::parse(DEFAULT_ROOT_URL).expect("default root url is valid"),
            output_path: PathBuf::from("books.csv"),
            workers: DEFAULT_WORKERS,
            request_timeout: Duration::from_secs(30),
            retries: 1,
            max_pages_per_category: 100,
            schedule: None,
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36"
                .to_string(),
            selectors: CatalogSelectors::default(),
        }
    }
}

impl CrawlerConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from any key lookup, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let root_url = match lookup("CATALOG_ROOT_URL") {
            Some(raw) => Url::parse(raw.trim()).context("parse CATALOG_ROOT_URL")?,
            None => defaults.root_url,
        };
        if root_url.scheme() != "http" && root_url.scheme() != "https" {
            bail!("CATALOG_ROOT_URL must be http/https: {root_url}");
        }

        let workers = parse_or(&lookup, "CRAWL_WORKERS", defaults.workers)?;
        if workers == 0 {
            bail!("CRAWL_WORKERS must be at least 1");
        }

        let timeout_secs = parse_or(&lookup, "CRAWL_TIMEOUT_SECS", defaults.request_timeout.as_secs())?;
        if timeout_secs == 0 {
            bail!("CRAWL_TIMEOUT_SECS must be at least 1");
        }

        Ok(Self {
            root_url,
            output_path: lookup("BOOKS_OUTPUT_PATH").map_or(defaults.output_path, PathBuf::from),
            workers,
            request_timeout: Duration::from_secs(timeout_secs),
            retries: parse_or(&lookup, "CRAWL_RETRIES", defaults.retries)?,
            max_pages_per_category: parse_or(
                &lookup,
                "CRAWL_MAX_PAGES_PER_CATEGORY",
                defaults.max_pages_per_category,
            )?,
            schedule: lookup("CRAWL_SCHEDULE").filter(|s| !s.trim().is_empty()),
            user_agent: defaults.user_agent,
            selectors: defaults.selectors,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse()
            .with_context(|| format!("parse {key}={raw:?}"))
    })
}

/// CSS selectors and patterns describing the catalog's markup.
#[derive(Debug, Clone)]
pub struct CatalogSelectors {
    /// Substring an anchor href must contain to be a category listing
    pub category_path: String,
    /// "Next page" link on a listing page
    pub next_page: String,
    /// Detail link inside each item card of a listing page
    pub item_link: String,
    /// First cell of the product information table
    pub identifier: String,
    pub title: String,
    pub price: String,
    /// Element whose second class is the star label ("One".."Five")
    pub rating: String,
    pub availability: String,
    /// Regex with one capture group for the stock count
    pub availability_pattern: String,
    /// Primary product image; the first `img` on the page is the fallback
    pub image: String,
}

impl Default for CatalogSelectors {
    fn default() -> Self {
        Self {
            category_path: "catalogue/category/books/".to_string(),
            next_page: "li.next a".to_string(),
            item_link: "article.product_pod h3 a".to_string(),
            identifier: "table.table-striped tr:first-child td".to_string(),
            title: "div.product_main h1".to_string(),
            price: "div.product_main p.price_color".to_string(),
            rating: "p.star-rating".to_string(),
            availability: "p.instock.availability".to_string(),
            availability_pattern: r"\((\d+)\s+available\)".to_string(),
            image: "#product_gallery img".to_string(),
        }
    }
}
