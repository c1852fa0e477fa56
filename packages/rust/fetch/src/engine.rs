//! Concurrent page fetcher with per-url failure isolation.
//!
//! Every input url yields exactly one [`PageData`], either extracted from the
//! response or degraded to sentinels. Failures are classified into three
//! counters and never affect sibling requests.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use sieve_shared::{FetchConfig, Result, SieveError};

use crate::extract::{PageData, extract_page};

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Failure counts for one batch, split the way they are reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchCounters {
    /// Connection, request, status, body or decode failures.
    pub client: usize,
    /// Requests that exceeded the configured timeout.
    pub timeout: usize,
    /// Anything else (invalid url, task panic, closed limiter).
    pub other: usize,
}

impl FetchCounters {
    pub fn total(&self) -> usize {
        self.client + self.timeout + self.other
    }

    fn record(&mut self, failure: &FetchFailure) {
        match failure {
            FetchFailure::Client(_) => self.client += 1,
            FetchFailure::Timeout(_) => self.timeout += 1,
            FetchFailure::Other(_) => self.other += 1,
        }
    }
}

/// Summary of a completed fetch batch.
#[derive(Debug, Clone)]
pub struct FetchReport {
    /// One entry per input url, in input order.
    pub pages: Vec<PageData>,
    pub counters: FetchCounters,
    pub duration: Duration,
}

/// Why a single url could not be fetched.
#[derive(Debug, Clone)]
enum FetchFailure {
    Client(String),
    Timeout(String),
    Other(String),
}

impl From<reqwest::Error> for FetchFailure {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if e.is_builder() {
            Self::Other(e.to_string())
        } else {
            Self::Client(e.to_string())
        }
    }
}

impl std::fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Client(msg) => write!(f, "client error: {msg}"),
            Self::Timeout(msg) => write!(f, "timeout: {msg}"),
            Self::Other(msg) => write!(f, "unexpected error: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Fetcher
// ---------------------------------------------------------------------------

/// Bounded-concurrency page fetcher.
pub struct Fetcher {
    config: FetchConfig,
    client: Client,
}

impl Fetcher {
    /// Create a fetcher with the given configuration.
    ///
    /// TLS is verified against the bundled webpki root certificates.
    pub fn new(config: FetchConfig) -> Result<Self> {
        if config.concurrency == 0 {
            return Err(SieveError::config("fetch concurrency must be at least 1"));
        }

        let client = Client::builder()
            .default_headers(header_map(&config)?)
            .redirect(reqwest::redirect::Policy::limited(10))
            .timeout(config.timeout)
            .build()
            .map_err(|e| SieveError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Fetch every url concurrently and extract its metadata.
    ///
    /// The returned report always holds `urls.len()` pages, in input order.
    #[instrument(skip_all, fields(urls = urls.len(), concurrency = self.config.concurrency))]
    pub async fn fetch_all(&self, urls: &[String]) -> FetchReport {
        let start_time = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));

        let mut handles = Vec::with_capacity(urls.len());
        for url in urls {
            let client = self.client.clone();
            let sem = semaphore.clone();
            let task_url = url.clone();

            let handle = tokio::spawn(async move {
                let Ok(_permit) = sem.acquire().await else {
                    return Err(FetchFailure::Other("concurrency limiter closed".into()));
                };
                fetch_page(&client, &task_url).await
            });
            handles.push((url.clone(), handle));
        }

        let mut pages = Vec::with_capacity(handles.len());
        let mut counters = FetchCounters::default();

        for (url, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(FetchFailure::Other(format!("fetch task failed: {e}"))),
            };

            match outcome {
                Ok(page) => pages.push(page),
                Err(failure) => {
                    debug!(%url, error = %failure, "fetch failed, using sentinels");
                    counters.record(&failure);
                    pages.push(PageData::degraded(&url));
                }
            }
        }

        let report = FetchReport {
            pages,
            counters,
            duration: start_time.elapsed(),
        };

        if counters.total() > 0 {
            warn!(
                total = counters.total(),
                client = counters.client,
                timeout = counters.timeout,
                other = counters.other,
                "some pages could not be fetched"
            );
        }
        info!(
            pages = report.pages.len(),
            failed = counters.total(),
            duration_ms = report.duration.as_millis(),
            "fetch batch completed"
        );

        report
    }
}

/// Build the default header map from configuration.
fn header_map(config: &FetchConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (name, value) in &config.headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| SieveError::config(format!("invalid header name '{name}': {e}")))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|e| SieveError::config(format!("invalid value for header '{name}': {e}")))?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}

/// Fetch a single page and extract its metadata.
///
/// Non-success statuses are still parsed: error pages often carry a usable title.
async fn fetch_page(client: &Client, url: &str) -> std::result::Result<PageData, FetchFailure> {
    debug!(%url, "fetching page");

    let response = client.get(url).send().await?;

    let status = response.status();
    if !status.is_success() {
        debug!(%url, %status, "non-success status, extracting body anyway");
    }

    let body = response.text().await?;
    Ok(extract_page(url, &body))
}
