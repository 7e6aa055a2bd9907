//! Crawler for paginated book catalogs
//!
//! Discovers every category listing on the catalog, fetches each book's
//! detail page through a bounded worker pool, and writes the deduplicated
//! records to a CSV dataset.

pub mod config;
pub mod crawler;
pub mod dataset;
pub mod error;
pub mod models;
pub mod scraper;
pub mod traits;

#[cfg(test)]
mod test_support;

pub use config::{CatalogSelectors, CrawlerConfig};
pub use crawler::{CatalogCrawler, RunGate};
pub use error::{CrawlError, FetchError, ParseError, PaginationError};
pub use models::{BookRecord, CrawlSummary};
