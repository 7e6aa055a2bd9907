use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::CrawlerConfig;
use crate::dataset::DatasetWriter;
use crate::error::{CrawlError, ItemError};
use crate::models::{BookRecord, CrawlOutcome, CrawlSummary, DetailRef};
use crate::scraper::{CategoryDiscoverer, DetailParser, HttpFetcher, ListingParser};
use crate::traits::Fetch;

type ItemOutcome = (DetailRef, Result<BookRecord, ItemError>);

/// Runs full crawls of the catalog: discovery, listing parsing, bounded
/// detail fan-out, merge, and dataset write.
///
/// Holds no state between runs; clones share the fetcher's connection pool.
#[derive(Clone)]
pub struct CatalogCrawler {
    config: Arc<CrawlerConfig>,
    fetcher: Arc<dyn Fetch>,
    discoverer: Arc<CategoryDiscoverer>,
    listing: Arc<ListingParser>,
    detail: Arc<DetailParser>,
    writer: DatasetWriter,
}

impl CatalogCrawler {
    pub fn new(config: CrawlerConfig) -> anyhow::Result<Self> {
        let fetcher = HttpFetcher::new(&config)?;
        Ok(Self::with_fetcher(config, Arc::new(fetcher))?)
    }

    pub fn with_fetcher(config: CrawlerConfig, fetcher: Arc<dyn Fetch>) -> Result<Self, CrawlError> {
        Ok(Self {
            discoverer: Arc::new(CategoryDiscoverer::new(&config)?),
            listing: Arc::new(ListingParser::new(&config.selectors)?),
            detail: Arc::new(DetailParser::new(&config.selectors)?),
            writer: DatasetWriter::new(config.output_path.clone()),
            config: Arc::new(config),
            fetcher,
        })
    }

    /// Crawls once and replaces the dataset file. Nothing is written on failure.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<CrawlSummary, CrawlError> {
        let CrawlOutcome {
            records,
            mut summary,
        } = self.crawl(cancel).await?;

        self.writer.write(&records).map_err(CrawlError::Dataset)?;
        summary.records_written = records.len();

        log_summary(&summary);
        Ok(summary)
    }

    /// Crawls the whole catalog and returns the deduplicated records.
    pub async fn crawl(&self, cancel: &CancellationToken) -> Result<CrawlOutcome, CrawlError> {
        let started = Instant::now();
        let mut summary = CrawlSummary::new(Utc::now());
        let root = &self.config.root_url;

        info!("Starting crawl of {}", root);

        let discovery = self
            .discoverer
            .discover(self.fetcher.as_ref(), root, cancel)
            .await?;
        summary.categories = discovery.categories;
        summary.listing_pages = discovery.listings.len();
        summary.truncated_categories = discovery.truncated.len();

        let refs = discovery
            .listings
            .iter()
            .flat_map(|listing| self.listing.parse(&listing.html, &listing.page));
        let work = dedup_detail_refs(refs);
        summary.detail_urls_attempted = work.len();

        info!(
            "Discovered {} listing pages, fetching {} detail pages with {} workers",
            summary.listing_pages,
            work.len(),
            self.config.workers
        );

        let (outcomes, cancelled) = self.fetch_details(work, cancel).await;
        if cancelled {
            warn!("Crawl cancelled after {} detail pages", outcomes.len());
            return Err(CrawlError::Cancelled);
        }

        summary.worker_panics = summary.detail_urls_attempted - outcomes.len();
        let records = merge(outcomes, &mut summary);
        summary.elapsed = started.elapsed();

        if records.is_empty() {
            log_summary(&summary);
            return Err(CrawlError::NoRecords {
                attempted: summary.detail_urls_attempted,
            });
        }

        Ok(CrawlOutcome { records, summary })
    }

    /// Fetches and parses every detail page with at most `workers` in flight.
    ///
    /// Once `cancel` fires no new work starts; in-flight workers still finish.
    async fn fetch_details(
        &self,
        work: Vec<DetailRef>,
        cancel: &CancellationToken,
    ) -> (Vec<ItemOutcome>, bool) {
        let semaphore = Arc::new(Semaphore::new(self.config.workers));
        let mut tasks = JoinSet::new();
        let mut cancelled = false;

        for detail in work {
            let permit = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                permit = Arc::clone(&semaphore).acquire_owned() => permit,
            };
            let Ok(permit) = permit else {
                break;
            };

            let fetcher = Arc::clone(&self.fetcher);
            let parser = Arc::clone(&self.detail);
            let retries = self.config.retries;

            tasks.spawn(async move {
                let _permit = permit;
                let result = fetch_and_parse(fetcher.as_ref(), &parser, &detail, retries).await;
                (detail, result)
            });
        }

        let mut outcomes = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => error!("detail worker failed: {}", e),
            }
        }

        (outcomes, cancelled)
    }
}

/// Serializes crawl runs for scheduled mode.
///
/// A trigger that fires while a run is active is skipped, and shutdown can
/// wait for the active run to drain its in-flight workers.
#[derive(Clone, Default)]
pub struct RunGate {
    active: Arc<Mutex<()>>,
}

impl RunGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs one crawl, or returns `None` if another run holds the gate.
    pub async fn run(
        &self,
        crawler: &CatalogCrawler,
        cancel: &CancellationToken,
    ) -> Option<Result<CrawlSummary, CrawlError>> {
        let Ok(_guard) = self.active.try_lock() else {
            return None;
        };
        Some(crawler.run(cancel).await)
    }

    /// Resolves once no run is active.
    pub async fn wait_idle(&self) {
        let _idle = self.active.lock().await;
    }
}

async fn fetch_and_parse(
    fetcher: &dyn Fetch,
    parser: &DetailParser,
    detail: &DetailRef,
    retries: u32,
) -> Result<BookRecord, ItemError> {
    let mut attempt = 0;
    let page = loop {
        match fetcher.fetch(&detail.url).await {
            Ok(page) => break page,
            Err(e) if e.is_transient() && attempt < retries => {
                attempt += 1;
                debug!(url = %detail.url, attempt, error = %e, "retrying detail fetch");
            }
            Err(e) => return Err(e.into()),
        }
    };

    Ok(parser.parse(&page.text(), detail)?)
}

/// One ref per detail URL, sorted by URL.
///
/// An item listed under several categories is attributed to the lexically
/// smallest category name.
pub fn dedup_detail_refs(refs: impl IntoIterator<Item = DetailRef>) -> Vec<DetailRef> {
    let mut by_url: BTreeMap<Url, String> = BTreeMap::new();
    for DetailRef { url, category } in refs {
        match by_url.entry(url) {
            Entry::Vacant(entry) => {
                entry.insert(category);
            }
            Entry::Occupied(mut entry) => {
                if category < *entry.get() {
                    entry.insert(category);
                }
            }
        }
    }

    by_url
        .into_iter()
        .map(|(url, category)| DetailRef { url, category })
        .collect()
}

/// Keeps one record per identifier (the last one to complete) and counts failures.
fn merge(outcomes: Vec<ItemOutcome>, summary: &mut CrawlSummary) -> Vec<BookRecord> {
    let mut by_id: HashMap<String, BookRecord> = HashMap::new();

    for (detail, result) in outcomes {
        match result {
            Ok(record) => {
                summary.records_succeeded += 1;
                if let Some(previous) = by_id.insert(record.identifier.clone(), record) {
                    summary.duplicate_identifiers += 1;
                    debug!(id = %previous.identifier, url = %detail.url, "duplicate identifier replaced");
                }
            }
            Err(err) => {
                match err {
                    ItemError::Fetch(_) => summary.fetch_failures += 1,
                    ItemError::Parse(_) => summary.parse_failures += 1,
                }
                warn!(url = %detail.url, stage = err.stage(), error = %err, "dropping item");
            }
        }
    }

    let mut records: Vec<BookRecord> = by_id.into_values().collect();
    records.sort_by(|a, b| a.identifier.cmp(&b.identifier));
    records
}

fn log_summary(summary: &CrawlSummary) {
    info!(
        categories = summary.categories,
        listing_pages = summary.listing_pages,
        truncated_categories = summary.truncated_categories,
        attempted = summary.detail_urls_attempted,
        succeeded = summary.records_succeeded,
        dropped = summary.records_dropped(),
        fetch_failures = summary.fetch_failures,
        parse_failures = summary.parse_failures,
        worker_panics = summary.worker_panics,
        duplicates = summary.duplicate_identifiers,
        written = summary.records_written,
        elapsed_ms = u64::try_from(summary.elapsed.as_millis()).unwrap_or(u64::MAX),
        "Crawl finished"
    );
}
