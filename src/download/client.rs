//! HTTP client wrapper for fetching pages.
//!
//! This module provides the `HttpClient` struct which performs one request,
//! checks the status, reads the whole body and decodes it to text.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use tracing::{debug, instrument};
use url::Url;

use super::constants::{self, CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use super::error::DownloadError;
use super::transport::PageSource;
use crate::encoding;
use crate::user_agent;

/// HTTP client for fetching HTML pages.
///
/// This client is designed to be created once and reused for every request of
/// a run, taking advantage of connection pooling. Its configuration (timeouts,
/// headers) is read-only after construction.
///
/// # Example
///
/// ```no_run
/// use noveldl_core::download::HttpClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new()?;
/// let html = client.fetch_page("https://example.com/book/42/").await?;
/// println!("{} characters", html.chars().count());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a new HTTP client with default timeouts.
    ///
    /// Default configuration:
    /// - Connect timeout: 10 seconds
    /// - Read timeout: 30 seconds
    /// - Gzip decompression: enabled
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the TLS backend cannot initialize.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::new_with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a new HTTP client with explicit timeout values.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the TLS backend cannot initialize.
    #[instrument(level = "debug")]
    pub fn new_with_timeouts(
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .user_agent(user_agent::default_page_user_agent())
            .default_headers(default_headers())
            .build()?;
        Ok(Self { client })
    }

    /// Fetches `url` once and returns the decoded body.
    ///
    /// The body is read to completion before decoding, so a failure part way
    /// through yields an error, never truncated text.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if:
    /// - The URL is invalid
    /// - The request fails (network error, timeout)
    /// - The server returns a non-2xx status
    /// - The body cannot be read to the end
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch_page(&self, url: &str) -> Result<String, DownloadError> {
        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                DownloadError::timeout(url)
            } else {
                DownloadError::network(url, e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                DownloadError::timeout(url)
            } else {
                DownloadError::body(url, e)
            }
        })?;

        let resolved = encoding::resolve(&bytes);
        debug!(bytes = bytes.len(), encoding = resolved.name(), "page fetched");
        let (text, _, _) = resolved.decode(&bytes);
        Ok(text.into_owned())
    }

    /// Returns a reference to the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl PageSource for HttpClient {
    async fn fetch_once(&self, url: &str) -> Result<String, DownloadError> {
        self.fetch_page(url).await
    }
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(constants::ACCEPT_HTML));
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static(constants::ACCEPT_LANGUAGE),
    );
    headers
}
