//! In-memory catalog used by unit tests

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::error::{FetchError, FetchFailure};
use crate::traits::{Fetch, FetchedPage};

#[derive(Default)]
pub struct StaticSite {
    pages: HashMap<String, String>,
    failures: HashMap<String, FetchFailure>,
    /// Fail this many times before serving the page
    flaky: Mutex<HashMap<String, usize>>,
    latency: Option<Duration>,
    fetched: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StaticSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    pub fn failing(mut self, url: &str, cause: FetchFailure) -> Self {
        self.failures.insert(url.to_string(), cause);
        self
    }

    pub fn flaky(self, url: &str, failures: usize) -> Self {
        self.flaky
            .lock()
            .unwrap()
            .insert(url.to_string(), failures);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetched.lock().unwrap().len()
    }

    pub fn fetches_of(&self, url: &str) -> usize {
        self.fetched
            .lock()
            .unwrap()
            .iter()
            .filter(|u| *u == url)
            .count()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetch for StaticSite {
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let key = url.as_str();
        self.fetched.lock().unwrap().push(key.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(cause) = self.failures.get(key) {
            return Err(FetchError::new(key, cause.clone()));
        }

        {
            let mut flaky = self.flaky.lock().unwrap();
            if let Some(remaining) = flaky.get_mut(key).filter(|n| **n > 0) {
                *remaining -= 1;
                return Err(FetchError::new(key, FetchFailure::Status(503)));
            }
        }

        match self.pages.get(key) {
            Some(html) => Ok(FetchedPage {
                status: 200,
                body: html.clone().into_bytes(),
            }),
            None => Err(FetchError::new(key, FetchFailure::Status(404))),
        }
    }
}

/// A listing page with one card per href and an optional "next" link.
pub fn listing_html(item_hrefs: &[&str], next: Option<&str>) -> String {
    let cards: String = item_hrefs
        .iter()
        .map(|href| {
            format!(r#"<li><article class="product_pod"><h3><a href="{href}">book</a></h3></article></li>"#)
        })
        .collect();
    let pager = next
        .map(|href| format!(r#"<ul class="pager"><li class="next"><a href="{href}">next</a></li></ul>"#))
        .unwrap_or_default();
    format!("<html><body><ol>{cards}</ol>{pager}</body></html>")
}

/// A detail page; `price: None` leaves the price element out.
pub fn detail_html(id: &str, title: &str, price: Option<&str>) -> String {
    let price = price
        .map(|p| format!(r#"<p class="price_color">{p}</p>"#))
        .unwrap_or_default();
    format!(
        r#"<html><body>
        <div id="product_gallery"><img src="../../media/{id}.jpg"></div>
        <div class="col-sm-6 product_main"><h1>{title}</h1>{price}
          <p class="instock availability">In stock (5 available)</p>
          <p class="star-rating Four"></p>
        </div>
        <table class="table table-striped"><tr><th>UPC</th><td>{id}</td></tr></table>
        </body></html>"#
    )
}
