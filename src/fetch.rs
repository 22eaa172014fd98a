//! HTTP fetch layer with exponential backoff retry logic.
//!
//! # Architecture
//!
//! - [`Fetch`]: core trait for retrieving a page as text or bytes
//! - [`HttpFetcher`]: `reqwest` client with a fixed user agent and timeout
//! - [`RetryFetch`]: decorator that adds retry logic to any `Fetch` implementation
//! - [`fetch_all`]: bounded-concurrency driver for many independent page fetches
//!
//! # Retry Strategy
//!
//! - Transport errors and HTTP 429/500/502/503/504 are retried
//! - Exponential backoff from `base_delay`, capped at 30 seconds
//! - Random jitter (0-250ms) added to every delay
//! - Any other non-success status fails at once

use crate::config::HttpSettings;
use crate::error::{HarvestError, Result};
use crate::utils::truncate_for_log;
use futures::stream::{self, StreamExt};
use rand::{Rng, rng};
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, warn};

const RETRY_STATUSES: &[u16] = &[429, 500, 502, 503, 504];

/// Retrieve a remote resource.
pub trait Fetch {
    /// Body decoded as text, honouring the response charset.
    async fn get_text(&self, url: &str) -> Result<String>;

    /// Raw body bytes (spreadsheets, archives).
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>>;
}

/// `reqwest`-backed fetcher.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    request_delay: Duration,
}

impl HttpFetcher {
    pub fn new(settings: &HttpSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(settings.timeout())
            .build()?;
        Ok(Self {
            client,
            request_delay: settings.request_delay(),
        })
    }

    async fn send(&self, url: &str) -> Result<reqwest::Response> {
        let t0 = Instant::now();
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        debug!(%url, status = status.as_u16(), elapsed_ms = t0.elapsed().as_millis() as u64, "GET");
        if !self.request_delay.is_zero() {
            sleep(self.request_delay).await;
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            debug!(%url, preview = %truncate_for_log(&body, 200), "Non-success response body");
            return Err(HarvestError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(resp)
    }
}

impl Fetch for HttpFetcher {
    async fn get_text(&self, url: &str) -> Result<String> {
        Ok(self.send(url).await?.text().await?)
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        Ok(self.send(url).await?.bytes().await?.to_vec())
    }
}

/// Whether a failed attempt is worth repeating.
fn is_retryable(e: &HarvestError) -> bool {
    match e {
        HarvestError::Status { status, .. } => RETRY_STATUSES.contains(status),
        HarvestError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
        _ => false,
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`Fetch`] implementation.
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryFetch<T> {
    inner: T,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl<T: Fetch> RetryFetch<T> {
    pub fn new(inner: T, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
        }
    }

    /// Delay before retry number `attempt` (1-based), without jitter.
    fn backoff(&self, attempt: usize) -> Duration {
        let exp = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        let factor = 2u32.checked_pow(exp).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    async fn with_retries<R, F, Fut>(&self, url: &str, attempt_fn: F) -> Result<R>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;
        loop {
            match attempt_fn().await {
                Ok(r) => return Ok(r),
                Err(e) => {
                    attempt += 1;
                    if !is_retryable(&e) || attempt > self.max_retries {
                        if attempt > 1 {
                            error!(
                                %url,
                                attempt,
                                max = self.max_retries,
                                elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                                error = %e,
                                "fetch exhausted retries"
                            );
                        }
                        return Err(e);
                    }

                    let delay = self.backoff(attempt);
                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = delay + Duration::from_millis(jitter_ms);

                    warn!(
                        %url,
                        attempt,
                        max = self.max_retries,
                        ?delay,
                        error = %e,
                        "fetch attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T: Fetch> Fetch for RetryFetch<T> {
    async fn get_text(&self, url: &str) -> Result<String> {
        self.with_retries(url, || self.inner.get_text(url)).await
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        self.with_retries(url, || self.inner.get_bytes(url)).await
    }
}

/// The fetcher every collection uses: HTTP with the configured retry policy.
pub fn default_fetcher(settings: &HttpSettings) -> Result<RetryFetch<HttpFetcher>> {
    Ok(RetryFetch::new(
        HttpFetcher::new(settings)?,
        settings.max_retries,
        Duration::from_secs(2),
    ))
}

/// Run `task` over every item with at most `concurrency` in flight.
///
/// Results arrive in completion order. A failing item is logged with its
/// display form and left out; it never aborts the batch.
pub async fn fetch_all<I, T, F, Fut>(items: Vec<I>, concurrency: usize, task: F) -> Vec<T>
where
    I: fmt::Display,
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let total = items.len();
    let results: Vec<T> = stream::iter(items)
        .map(|item| {
            let label = item.to_string();
            let fut = task(item);
            async move {
                match fut.await {
                    Ok(v) => Some(v),
                    Err(e) => {
                        error!(item = %label, error = %e, "Fetch failed; skipping");
                        None
                    }
                }
            }
        })
        .buffer_unordered(concurrency.max(1))
        .filter_map(std::future::ready)
        .collect()
        .await;
    debug!(total, succeeded = results.len(), "fetch_all complete");
    results
}
