//! Error types for the crawl pipeline
//!
//! Item-level failures (`FetchError`, `ParseError`) and pagination failures
//! are local: they are logged and counted by the orchestrator. Only
//! `CrawlError` aborts a run.

use std::fmt;

use thiserror::Error;

/// Why a single HTTP fetch failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    #[error("request timed out")]
    Timeout,

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("network error: {0}")]
    Network(String),

    #[error("failed to read response body: {0}")]
    Body(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("fetch {url} failed: {cause}")]
pub struct FetchError {
    pub url: String,
    pub cause: FetchFailure,
}

impl FetchError {
    pub fn new(url: impl Into<String>, cause: FetchFailure) -> Self {
        Self {
            url: url.into(),
            cause,
        }
    }

    /// Timeouts, connection failures, throttling and server errors may succeed on a retry.
    pub fn is_transient(&self) -> bool {
        match self.cause {
            FetchFailure::Timeout | FetchFailure::Network(_) => true,
            FetchFailure::Status(status) => status == 429 || (500..600).contains(&status),
            FetchFailure::Body(_) => false,
        }
    }
}

/// The fields of a `BookRecord` that the detail parser extracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordField {
    Identifier,
    Title,
    Price,
    ImageUrl,
}

impl fmt::Display for RecordField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Identifier => "identifier",
            Self::Title => "title",
            Self::Price => "price",
            Self::ImageUrl => "image_url",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("parse {url} failed on {field}: {cause}")]
pub struct ParseError {
    pub url: String,
    pub field: RecordField,
    pub cause: String,
}

impl ParseError {
    pub fn missing(url: impl Into<String>, field: RecordField) -> Self {
        Self {
            url: url.into(),
            field,
            cause: "element not found or empty".to_string(),
        }
    }

    pub fn malformed(url: impl Into<String>, field: RecordField, cause: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            field,
            cause: cause.into(),
        }
    }
}

/// A listing page in a category's chain could not be fetched; later pages are skipped.
#[derive(Error, Debug, Clone)]
#[error("pagination for category '{category}' stopped at {url}: {source}")]
pub struct PaginationError {
    pub category: String,
    pub url: String,
    #[source]
    pub source: FetchError,
}

/// Outcome of one detail work item that produced no record.
#[derive(Error, Debug, Clone)]
pub enum ItemError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl ItemError {
    pub const fn stage(&self) -> &'static str {
        match self {
            Self::Fetch(_) => "detail_fetch",
            Self::Parse(_) => "detail_parse",
        }
    }
}

/// Conditions that fail a whole run. None of them leave an output file behind.
#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("root page unavailable: {0}")]
    RootUnavailable(#[source] FetchError),

    #[error("no category listings found on {root}")]
    NoCategories { root: String },

    #[error("crawl produced no records ({attempted} detail pages attempted)")]
    NoRecords { attempted: usize },

    #[error("crawl cancelled")]
    Cancelled,

    #[error("invalid CSS selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to write dataset: {0}")]
    Dataset(#[source] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        let err = |cause| FetchError::new("http://x/", cause);

        assert!(err(FetchFailure::Timeout).is_transient());
        assert!(err(FetchFailure::Network("reset".into())).is_transient());
        assert!(err(FetchFailure::Status(503)).is_transient());
        assert!(err(FetchFailure::Status(429)).is_transient());
        assert!(!err(FetchFailure::Status(404)).is_transient());
        assert!(!err(FetchFailure::Body("eof".into())).is_transient());
    }

    #[test]
    fn parse_error_names_the_field() {
        let err = ParseError::missing("http://x/book", RecordField::Price);
        assert_eq!(
            err.to_string(),
            "parse http://x/book failed on price: element not found or empty"
        );
    }
}
