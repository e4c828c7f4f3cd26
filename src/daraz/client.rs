//! HTTP client for Daraz search pages using wreq for TLS fingerprint emulation.

use crate::config::Config;
use crate::error::{FetchCause, FetchError};
use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tracing::{debug, info, warn};
use wreq::Client;
use wreq_util::Emulation;

/// Upper bound for a single backoff sleep.
const MAX_BACKOFF: Duration = Duration::from_secs(8);

/// Fetches raw search result pages - the only I/O the pipeline performs.
///
/// The query is bound when the fetcher is built; callers only pick the page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Returns the raw content of a 1-based search result page.
    async fn fetch(&self, page: u32) -> Result<String, FetchError>;

    /// Waits before an attempt. Not counted against the page timeout.
    async fn pace(&self) {}
}

/// Daraz HTTP client with browser impersonation and anti-bot measures.
pub struct DarazClient {
    client: Client,
    base_url: String,
    query: String,
    delay_ms: u64,
    delay_jitter_ms: u64,
}

impl DarazClient {
    /// Creates a new Daraz client with the given configuration.
    pub async fn new(config: &Config) -> Result<Self> {
        let mut builder = Client::builder()
            .cookie_store(true)
            .gzip(true)
            .brotli(true)
            .timeout(config.page_timeout())
            .connect_timeout(Duration::from_secs(10));

        if let Some(proxy_url) = &config.proxy {
            debug!("Configuring proxy: {}", proxy_url);
            let proxy = wreq::Proxy::all(proxy_url).context("Failed to configure proxy")?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            query: config.query.clone(),
            delay_ms: config.delay_ms,
            delay_jitter_ms: config.delay_jitter_ms,
        })
    }

    /// Builds the catalog URL for a result page.
    fn page_url(&self, page: u32) -> String {
        format!(
            "{}/catalog/?ajax=true&page={}&q={}",
            self.base_url,
            page,
            urlencoding::encode(&self.query)
        )
    }

    /// Performs a GET request with all anti-bot measures.
    async fn get(&self, page: u32, url: &str) -> Result<String, FetchError> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .emulation(Emulation::Chrome131)
            .header("Accept", "application/json, text/html;q=0.9, */*;q=0.8")
            .header("Accept-Language", "en-US,en;q=0.9,bn;q=0.8")
            .header("Accept-Encoding", "gzip, deflate, br")
            .header("Cache-Control", "no-cache")
            .header("Pragma", "no-cache")
            .header("Sec-Ch-Ua", "\"Chromium\";v=\"131\", \"Not_A Brand\";v=\"24\"")
            .header("Sec-Ch-Ua-Mobile", "?0")
            .header("Sec-Ch-Ua-Platform", "\"macOS\"")
            .header("Sec-Fetch-Dest", "empty")
            .header("Sec-Fetch-Mode", "cors")
            .header("Sec-Fetch-Site", "same-origin")
            .header("X-Requested-With", "XMLHttpRequest")
            .send()
            .await
            .map_err(|e| FetchError::new(page, transport_cause(&e)))?;

        let status = response.status();
        debug!("Response status: {}", status);

        if status.as_u16() == 429 {
            warn!("Rate limited (429) on page {}. Consider increasing --delay.", page);
        }

        if !status.is_success() {
            return Err(FetchError::new(page, FetchCause::Status(status.as_u16())));
        }

        response.text().await.map_err(|e| FetchError::new(page, transport_cause(&e)))
    }

    /// Adds a random delay to mimic human behavior.
    async fn delay(&self) {
        if self.delay_ms == 0 {
            return;
        }

        let jitter = if self.delay_jitter_ms > 0 {
            rand::rng().random_range(0..=self.delay_jitter_ms)
        } else {
            0
        };

        let total_delay = self.delay_ms + jitter;
        debug!("Delaying {}ms", total_delay);
        tokio::time::sleep(Duration::from_millis(total_delay)).await;
    }
}

fn transport_cause(error: &wreq::Error) -> FetchCause {
    if error.is_timeout() {
        FetchCause::Timeout
    } else {
        FetchCause::Transport(error.to_string())
    }
}

#[async_trait]
impl PageFetcher for DarazClient {
    async fn fetch(&self, page: u32) -> Result<String, FetchError> {
        info!("Fetching \"{}\" (page {})", self.query, page);
        let url = self.page_url(page);
        self.get(page, &url).await
    }

    async fn pace(&self) {
        self.delay().await;
    }
}

/// Retry settings applied around any [`PageFetcher`].
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Extra attempts after the first one
    pub retry_budget: u32,
    /// Initial backoff, doubled per attempt
    pub backoff: Duration,
    /// Limit for each individual attempt
    pub page_timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            retry_budget: config.retry_budget,
            backoff: config.retry_backoff(),
            page_timeout: config.page_timeout(),
        }
    }

    /// Backoff before retry number `attempt` (0-based), with up to 50% jitter.
    fn backoff_for(&self, attempt: u32) -> Duration {
        let base = self.backoff.saturating_mul(2u32.saturating_pow(attempt)).min(MAX_BACKOFF);
        let base_ms = base.as_millis() as u64;
        if base_ms == 0 {
            return Duration::ZERO;
        }
        let jitter = rand::rng().random_range(0..=base_ms / 2);
        Duration::from_millis(base_ms + jitter)
    }
}

/// Fetches a page, retrying transient failures within the policy's budget.
pub async fn fetch_with_retry<F>(
    fetcher: &F,
    page: u32,
    policy: &RetryPolicy,
) -> Result<String, FetchError>
where
    F: PageFetcher + ?Sized,
{
    let mut attempt = 0;
    loop {
        fetcher.pace().await;
        let error = match tokio::time::timeout(policy.page_timeout, fetcher.fetch(page)).await {
            Ok(Ok(body)) => return Ok(body),
            Ok(Err(error)) => error,
            Err(_) => FetchError::new(page, FetchCause::Timeout),
        };

        if !error.is_transient() {
            debug!("Page {} failed permanently: {}", page, error);
            return Err(error);
        }
        if attempt >= policy.retry_budget {
            warn!("Page {} exhausted {} retries: {}", page, policy.retry_budget, error);
            return Err(error);
        }

        let wait = policy.backoff_for(attempt);
        attempt += 1;
        warn!(
            "{} - retrying in {}ms (attempt {}/{})",
            error,
            wait.as_millis(),
            attempt,
            policy.retry_budget
        );
        tokio::time::sleep(wait).await;
    }
}
