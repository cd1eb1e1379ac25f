//! HTTP transport for fetching pages.
//!
//! # Features
//!
//! - Single-attempt page fetch with decoded text ([`HttpClient`])
//! - Retry with exponential backoff on every failure ([`Transport`], [`RetryPolicy`])
//! - Charset detection for pages without a reliable declaration
//! - Structured error types with full context
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use noveldl_core::download::{HttpClient, RetryPolicy, Transport};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new()?;
//! let transport = Transport::new(Arc::new(client), RetryPolicy::default());
//! let html = transport.fetch("https://example.com/book/42/").await?;
//! println!("{} bytes of markup", html.len());
//! # Ok(())
//! # }
//! ```

mod client;
pub(crate) mod constants;
mod error;
mod retry;
mod transport;

pub use client::HttpClient;
pub use constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
pub use error::{DownloadError, FetchError};
pub use retry::{
    DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY, DEFAULT_MAX_RETRIES, RetryDecision, RetryPolicy,
};
pub use transport::{PageSource, Transport};

// Note: we do NOT define module-local Result aliases.
// Use `Result<T, DownloadError>` / `Result<T, FetchError>` explicitly in signatures.
