//! Data models for catalog pages, pending work and scraped book records

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// One page of a category listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CategoryPage {
    pub url: Url,
    pub category: String,
}

impl CategoryPage {
    /// Builds a page whose category name comes from its URL path.
    ///
    /// Listing paths look like `catalogue/category/books/travel_2/page-2.html`;
    /// the directory segment minus its `_<n>` suffix is the category.
    /// Returns `None` when that segment yields no name (e.g. `books/_2/`).
    pub fn from_url(url: Url) -> Option<Self> {
        let category = category_from_path(&url)?;
        Some(Self { url, category })
    }
}

fn category_from_path(url: &Url) -> Option<String> {
    let segments: Vec<&str> = url.path_segments()?.collect();
    let dir = segments.len().checked_sub(2).map(|i| segments[i])?;
    let name = dir.split('_').next().unwrap_or(dir);
    (!name.is_empty()).then(|| name.to_string())
}

/// A listing page together with the HTML fetched while walking its pagination.
#[derive(Debug, Clone)]
pub struct ListingDocument {
    pub page: CategoryPage,
    pub html: String,
}

/// A detail page waiting to be fetched, with the category it was listed under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DetailRef {
    pub url: Url,
    pub category: String,
}

/// A book scraped from a detail page. Field order is the dataset column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    #[serde(rename = "id")]
    pub identifier: String,
    pub title: String,
    pub category: String,
    pub price: f64,
    pub rating: u8,
    pub availability: u32,
    #[serde(rename = "image_links")]
    pub image_url: String,
}

/// Dataset header, in column order.
pub const DATASET_COLUMNS: [&str; 7] = [
    "id",
    "title",
    "category",
    "price",
    "rating",
    "availability",
    "image_links",
];

/// Counters reported at the end of every run.
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub categories: usize,
    pub listing_pages: usize,
    pub truncated_categories: usize,
    pub detail_urls_attempted: usize,
    pub records_succeeded: usize,
    pub fetch_failures: usize,
    pub parse_failures: usize,
    /// Detail workers that panicked; their items are lost
    pub worker_panics: usize,
    pub duplicate_identifiers: usize,
    pub records_written: usize,
}

impl CrawlSummary {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            elapsed: Duration::ZERO,
            categories: 0,
            listing_pages: 0,
            truncated_categories: 0,
            detail_urls_attempted: 0,
            records_succeeded: 0,
            fetch_failures: 0,
            parse_failures: 0,
            worker_panics: 0,
            duplicate_identifiers: 0,
            records_written: 0,
        }
    }

    /// Items that were attempted but contributed no record.
    pub const fn records_dropped(&self) -> usize {
        self.fetch_failures + self.parse_failures + self.worker_panics
    }
}

/// The materialized result of one crawl: records unique by identifier, sorted by it.
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    pub records: Vec<BookRecord>,
    pub summary: CrawlSummary,
}
