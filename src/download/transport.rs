//! The retrying transport: `fetch(url) -> text | FetchError`.
//!
//! [`PageSource`] is the single-attempt seam (implemented by
//! [`HttpClient`](super::HttpClient)); [`Transport`] wraps any source with a
//! [`RetryPolicy`] and sleeps between attempts.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use super::error::{DownloadError, FetchError};
use super::retry::{RetryDecision, RetryPolicy};

/// Something that can fetch one page, once.
///
/// Implementations must return either the full decoded body or an error;
/// never partial text.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Performs a single attempt at fetching `url`.
    async fn fetch_once(&self, url: &str) -> Result<String, DownloadError>;
}

/// Page fetcher with retry and exponential backoff.
///
/// Cheap to clone; clones share the underlying source.
#[derive(Clone)]
pub struct Transport {
    source: Arc<dyn PageSource>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Transport {
    /// Creates a transport over `source` using `policy` between attempts.
    #[must_use]
    pub fn new(source: Arc<dyn PageSource>, policy: RetryPolicy) -> Self {
        Self { source, policy }
    }

    /// Returns the retry policy in use.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetches `url`, retrying every failure until the policy gives up.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] carrying the last attempt's error once
    /// `max_attempts` attempts have failed.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            debug!(attempt, "attempting fetch");

            match self.source.fetch_once(url).await {
                Ok(body) => {
                    if attempt > 1 {
                        info!(attempt, "fetch succeeded after retry");
                    }
                    return Ok(body);
                }
                Err(e) => match self.policy.should_retry(attempt) {
                    RetryDecision::Retry {
                        delay,
                        attempt: next_attempt,
                    } => {
                        warn!(
                            attempt,
                            next_attempt,
                            max_attempts = self.policy.max_attempts(),
                            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            error = %e,
                            "fetch failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    RetryDecision::DoNotRetry { reason } => {
                        warn!(attempt, %reason, error = %e, "fetch failed, giving up");
                        return Err(FetchError::new(url, attempt, e));
                    }
                },
            }
        }
    }
}
