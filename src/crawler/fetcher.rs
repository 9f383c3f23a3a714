//! HTTP page fetcher with pacing, retry and charset handling
//!
//! This module provides the fetcher used by the archive pipeline with
//! features including:
//! - Shared request pacing (one dispatch per interval)
//! - Bounded retry with exponential backoff on any failed exchange
//! - Charset detection from the Content-Type header

use chrono::Utc;
use encoding_rs::{Encoding, UTF_8};
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE},
    Client, Response,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::crawler::pacer::RequestPacer;
use crate::models::RawPage;
use crate::utils::error::{FetchError, NetworkError};
use crate::utils::retry::RetryConfig;

/// Page fetcher
///
/// Every attempt, retries included, waits on the pacer before it is sent.
pub struct PageFetcher {
    /// HTTP client with configured timeout and compression
    client: Client,

    /// Dispatch pacing shared with anything else using the same pacer
    pacer: Arc<RequestPacer>,

    /// Retry schedule
    retry: RetryConfig,

    /// Optional base URL override for testing with mock servers
    base_url: Option<String>,
}

impl PageFetcher {
    /// Create a fetcher with default timeout and retry settings
    ///
    /// # Errors
    ///
    /// Returns `FetchError::InvalidUrl` if the HTTP client cannot be created
    pub fn new(pacer: Arc<RequestPacer>) -> Result<Self, FetchError> {
        Self::with_config(
            pacer,
            RetryConfig::default(),
            Duration::from_secs(15),
            &format!("sitescribe/{}", env!("CARGO_PKG_VERSION")),
        )
    }

    /// Create a fetcher with custom configuration
    ///
    /// # Arguments
    ///
    /// * `pacer` - Shared dispatch pacing
    /// * `retry` - Retry schedule
    /// * `timeout` - Per-request timeout
    /// * `user_agent` - User-Agent header value
    pub fn with_config(
        pacer: Arc<RequestPacer>,
        retry: RetryConfig,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .default_headers(Self::default_headers())
            .gzip(true)
            .cookie_store(true)
            .build()
            .map_err(|e| FetchError::InvalidUrl(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            client,
            pacer,
            retry,
            base_url: None,
        })
    }

    /// Create a fetcher from application configuration
    pub fn from_config(config: &Config, pacer: Arc<RequestPacer>) -> Result<Self, FetchError> {
        let retry = RetryConfig::with_delays(
            config.scraper.max_retries,
            config.scraper.retry_base_delay_ms,
            30_000,
        );
        Self::with_config(
            pacer,
            retry,
            config.request_timeout(),
            &config.scraper.user_agent,
        )
    }

    /// Prepend `base_url` to every requested path (mock servers in tests)
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = Some(base_url.trim_end_matches('/').to_string());
        self
    }

    /// Shared HTTP client, reused by the sitemap parser
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Pacer this fetcher waits on
    pub fn pacer(&self) -> &Arc<RequestPacer> {
        &self.pacer
    }

    /// Fetch a page with pacing and retry logic
    ///
    /// Transport errors, timeouts and every non-success status are retried
    /// up to the configured bound. A 404 gets the same attempts as a 503.
    ///
    /// # Errors
    ///
    /// `FetchError::Exhausted` carrying the last cause once every attempt
    /// failed, `FetchError::Decode` when the body cannot be decoded.
    pub async fn fetch(&self, url: &str) -> Result<RawPage, FetchError> {
        let full_url = match &self.base_url {
            Some(base) => format!("{base}{url}"),
            None => url.to_string(),
        };

        if url::Url::parse(&full_url).is_err() {
            return Err(FetchError::InvalidUrl(full_url));
        }

        let mut last_error = None;
        let attempts = self.retry.max_attempts();

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.retry.delay_for(attempt);
                tracing::debug!(
                    url = %full_url,
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Backing off before retry"
                );
                tokio::time::sleep(delay).await;
            }

            self.pacer.wait().await;

            let started = Instant::now();
            match self.attempt(&full_url).await {
                Ok((status, body)) => {
                    if attempt > 0 {
                        tracing::debug!(url = %full_url, attempt = attempt, "Fetch succeeded after retry");
                    }
                    return Ok(RawPage {
                        url: full_url,
                        status,
                        body,
                        retrieved_at: Utc::now(),
                        latency: started.elapsed(),
                    });
                }
                Err(FetchAttemptError::Network(e)) => {
                    tracing::warn!(
                        url = %full_url,
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        error = %e,
                        "Fetch attempt failed"
                    );
                    last_error = Some(e);
                }
                Err(FetchAttemptError::Decode(msg)) => return Err(FetchError::Decode(msg)),
            }
        }

        let last = last_error.unwrap_or(NetworkError::Timeout {
            url: full_url.clone(),
        });
        Err(FetchError::Exhausted {
            url: full_url,
            attempts,
            last,
        })
    }

    /// One request without pacing or retry
    async fn attempt(&self, url: &str) -> Result<(u16, String), FetchAttemptError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| NetworkError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        let body = Self::decode_response(url, response).await?;
        Ok((status.as_u16(), body))
    }

    /// Read the response body and decode it as text
    async fn decode_response(url: &str, response: Response) -> Result<String, FetchAttemptError> {
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .unwrap_or_default();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| NetworkError::from_reqwest(url, e))?;

        decode_bytes(&bytes, &content_type).map_err(FetchAttemptError::Decode)
    }

    fn default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers
    }
}

enum FetchAttemptError {
    Network(NetworkError),
    Decode(String),
}

impl From<NetworkError> for FetchAttemptError {
    fn from(err: NetworkError) -> Self {
        Self::Network(err)
    }
}

/// Extract the charset label from a Content-Type value
fn charset_label(content_type: &str) -> Option<&str> {
    content_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("charset"))
        .map(|(_, value)| value.trim().trim_matches('"'))
}

/// Decode bytes to a UTF-8 string
///
/// Uses the charset named in `content_type` when `encoding_rs` knows it,
/// otherwise UTF-8. Malformed sequences are replaced rather than rejected;
/// only an unknown label combined with invalid UTF-8 is an error.
pub fn decode_bytes(bytes: &[u8], content_type: &str) -> Result<String, String> {
    let encoding = match charset_label(content_type) {
        Some(label) => match Encoding::for_label(label.as_bytes()) {
            Some(encoding) => encoding,
            None => {
                return std::str::from_utf8(bytes)
                    .map(str::to_string)
                    .map_err(|_| format!("unknown charset {label:?} and body is not UTF-8"));
            }
        },
        None => UTF_8,
    };

    let (text, _, _) = encoding.decode(bytes);
    Ok(text.into_owned())
}
