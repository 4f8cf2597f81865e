
use anyhow::{Context, Result, anyhow, bail};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use ureq::Agent;
use url::Url;

use crate::catalog::{Book, DEFAULT_ARCHIVE_BASE};

/// Configuration for downloading story collections
#[derive(Debug, Clone)]
pub struct AcquirerConfig {
    /// Base URL of the plain-text archive
    pub archive_base: String,
    /// User agent string to use for requests
    pub user_agent: String,
    /// Timeout for HTTP requests in seconds
    pub timeout_seconds: u64,
    /// Politeness delay between consecutive downloads in milliseconds
    pub rate_limit_ms: u64,
    /// Maximum number of retry attempts for retryable errors
    pub max_retries: u32,
    /// Delay between retry attempts in seconds
    pub retry_delay_seconds: u64,
    /// Skip books whose target file already exists on disk
    pub skip_existing: bool,
}

impl Default for AcquirerConfig {
    #[inline]
    fn default() -> Self {
        Self {
            archive_base: DEFAULT_ARCHIVE_BASE.to_string(),
            user_agent: "story-search/0.1.0 (Story Collector)".to_string(),
            timeout_seconds: 30,
            rate_limit_ms: 1000,
            max_retries: 3,
            retry_delay_seconds: 5,
            skip_existing: false,
        }
    }
}

/// Statistics from a collection run
#[derive(Debug, Clone, Copy, Default)]
pub struct AcquireStats {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub duration: Duration,
}

impl AcquireStats {
    /// Total number of books considered
    #[inline]
    pub fn total(&self) -> usize {
        self.downloaded + self.skipped + self.failed
    }
}

/// HTTP client wrapper with rate limiting and retry logic
#[derive(Debug)]
pub struct HttpClient {
    agent: Agent,
    config: AcquirerConfig,
    last_request_time: Option<Instant>,
}

impl HttpClient {
    /// Create a new HTTP client with the given configuration
    #[inline]
    pub fn new(config: AcquirerConfig) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .user_agent(&config.user_agent)
            .build()
            .into();

        Self {
            agent,
            config,
            last_request_time: None,
        }
    }

    /// Perform an HTTP GET request with rate limiting and retry logic
    #[inline]
    pub async fn get(&mut self, url: &str) -> Result<String> {
        self.apply_rate_limit().await;

        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                debug!("Retrying request to {} (attempt {})", url, attempt + 1);
                tokio::time::sleep(Duration::from_secs(self.config.retry_delay_seconds)).await;
            }

            match self.try_get(url) {
                Ok(response) => {
                    debug!("Successfully fetched {} (attempt {})", url, attempt + 1);
                    return Ok(response);
                }
                Err(e) if is_retryable_error(&e) && attempt < self.config.max_retries => {
                    warn!("Retryable error for {}: {}", url, e);
                    last_error = Some(e);
                }
                Err(e) => {
                    error!("Non-retryable error for {}: {}", url, e);
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("All retry attempts failed")))
    }

    /// Apply rate limiting by sleeping if necessary
    async fn apply_rate_limit(&mut self) {
        if let Some(last_time) = self.last_request_time {
            let elapsed = last_time.elapsed();
            let rate_limit_duration = Duration::from_millis(self.config.rate_limit_ms);

            if elapsed < rate_limit_duration {
                let sleep_duration = rate_limit_duration - elapsed;
                debug!("Rate limiting: sleeping for {:?}", sleep_duration);
                sleep(sleep_duration).await;
            }
        }

        self.last_request_time = Some(Instant::now());
    }

    /// Attempt a single HTTP GET request without retry logic
    fn try_get(&self, url: &str) -> Result<String> {
        debug!("Making HTTP GET request to: {}", url);

        match self.agent.get(url).call() {
            Ok(mut response) => {
                let text = response
                    .body_mut()
                    .read_to_string()
                    .with_context(|| format!("Failed to read response body from {}", url))?;
                debug!("Successfully read {} bytes from {}", text.len(), url);
                Ok(text)
            }
            Err(ureq::Error::StatusCode(status)) => {
                debug!("HTTP request failed with status {}: {}", status, url);
                Err(anyhow!("HTTP error {}", status))
            }
            Err(e) => {
                debug!("HTTP request failed with transport error: {}", e);
                Err(anyhow::Error::from(e))
                    .with_context(|| format!("Failed to make HTTP request to {}", url))
            }
        }
    }
}

impl Default for HttpClient {
    /// Create a new HTTP client with default configuration
    #[inline]
    fn default() -> Self {
        Self::new(AcquirerConfig::default())
    }
}

/// Downloads story collections from the archive into a local directory
#[derive(Debug)]
pub struct StoryAcquirer {
    config: AcquirerConfig,
    http_client: HttpClient,
}

impl StoryAcquirer {
    /// Create a new acquirer with the given configuration
    #[inline]
    pub fn new(config: AcquirerConfig) -> Self {
        let http_client = HttpClient::new(config.clone());
        Self {
            config,
            http_client,
        }
    }

    /// Download each book in the list into `books_dir`.
    ///
    /// Books are fetched one at a time with a politeness delay between
    /// requests. A failed download is logged and counted but never aborts
    /// the run, so one missing book does not cost the rest of the catalog.
    #[inline]
    pub async fn collect(&mut self, books: &[Book], books_dir: &Path) -> Result<AcquireStats> {
        validate_url(&self.config.archive_base)?;

        fs::create_dir_all(books_dir).with_context(|| {
            format!(
                "Failed to create books directory: {}",
                books_dir.display()
            )
        })?;

        let start_time = Instant::now();
        let mut stats = AcquireStats::default();

        let bar = if console::user_attended_stderr() {
            ProgressBar::new_spinner().with_style(
                ProgressStyle::with_template("{spinner} [{pos}/{len}] Downloading {msg}")
                    .expect("style template is valid"),
            )
        } else {
            ProgressBar::hidden()
        };
        bar.set_position(0);
        bar.set_length(books.len() as u64);

        for book in books {
            bar.set_message(book.title.to_string());

            let target = books_dir.join(book.file_name());
            if self.config.skip_existing && target.exists() {
                debug!("Skipping {} (already downloaded)", book.title);
                stats.skipped += 1;
                bar.inc(1);
                continue;
            }

            match self.download_book(book).await {
                Ok(text) => {
                    fs::write(&target, &text).with_context(|| {
                        format!("Failed to write book file: {}", target.display())
                    })?;
                    info!("Downloaded {} ({} bytes)", book.title, text.len());
                    stats.downloaded += 1;
                }
                Err(e) => {
                    warn!("Failed to download {}: {}", book.title, e);
                    stats.failed += 1;
                }
            }

            bar.inc(1);
        }

        stats.duration = start_time.elapsed();
        bar.finish_and_clear();

        if stats.downloaded == 0 && stats.failed > 0 {
            bail!("All {} download attempts failed", stats.failed);
        }

        Ok(stats)
    }

    /// Fetch the full text of a single book from the archive
    async fn download_book(&mut self, book: &Book) -> Result<String> {
        let url = book.download_url(&self.config.archive_base);
        let text = self.http_client.get(&url).await?;

        if text.trim().is_empty() {
            bail!("Archive returned an empty document for {}", book.title);
        }

        Ok(text)
    }
}

/// Check if an error is retryable (network timeouts, 5xx errors)
fn is_retryable_error(error: &anyhow::Error) -> bool {
    let error_str = error.to_string().to_lowercase();

    // Network timeouts and connection errors
    if error_str.contains("timeout")
        || error_str.contains("connection")
        || error_str.contains("network")
    {
        return true;
    }

    // HTTP 5xx server errors are retryable
    if error_str.contains("http error 5") {
        return true;
    }

    // HTTP 429 (rate limiting) is retryable
    if error_str.contains("http error 429") {
        return true;
    }

    false
}

/// Validate and normalize a URL
#[inline]
pub fn validate_url(url_str: &str) -> Result<Url> {
    let url = Url::parse(url_str).with_context(|| format!("Invalid URL format: {}", url_str))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(anyhow!("URL must use HTTP or HTTPS scheme: {}", url_str));
    }

    if url.host_str().is_none() {
        return Err(anyhow!("URL must have a valid host: {}", url_str));
    }

    Ok(url)
}
