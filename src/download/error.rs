//! Error types for the download module.
//!
//! [`DownloadError`] describes why a single request failed. [`FetchError`] is
//! what callers of the transport see once every retry has been spent.

use thiserror::Error;

/// Errors that can occur during one page request.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (anything outside 2xx).
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The response body could not be read to the end.
    #[error("failed reading body of {url}: {source}")]
    Body {
        /// The URL whose body was cut short.
        url: String,
        /// The underlying read error.
        #[source]
        source: reqwest::Error,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates a body read error.
    pub fn body(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Body {
            url: url.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }
}

/// Transport failure surfaced after all retry attempts were exhausted.
#[derive(Debug, Error)]
#[error("giving up on {url} after {attempts} attempt(s): {last}")]
pub struct FetchError {
    /// The URL that could not be fetched.
    pub url: String,
    /// How many attempts were made.
    pub attempts: u32,
    /// The error from the final attempt.
    #[source]
    pub last: DownloadError,
}

impl FetchError {
    /// Creates a fetch error wrapping the final attempt's failure.
    pub fn new(url: impl Into<String>, attempts: u32, last: DownloadError) -> Self {
        Self {
            url: url.into(),
            attempts,
            last,
        }
    }

    /// HTTP status of the final attempt, when the server answered at all.
    #[must_use]
    pub fn http_status(&self) -> Option<u16> {
        match self.last {
            DownloadError::HttpStatus { status, .. } => Some(status),
            _ => None,
        }
    }
}

// Note on From trait implementations:
// No `From<reqwest::Error>` here; every variant needs the URL that the
// source error does not carry, so callers go through the helper constructors.
