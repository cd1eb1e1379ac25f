//! noveldl Core Library
//!
//! Resumable, concurrent download of serialized web novels: a work's landing
//! page is turned into an ordered list of chapters, each chapter is fetched
//! and extracted to its own text file, progress is recorded after every
//! chapter, and the chapter files are merged into one document.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`download`] - HTTP transport with retry and exponential backoff
//! - [`encoding`] - Charset resolution for pages without a reliable declaration
//! - [`scrape`] - Chapter-list discovery and chapter body extraction
//! - [`work`] - Work and chapter data model, file naming
//! - [`progress`] - Durable per-work completion record
//! - [`engine`] - Bounded-concurrency orchestration with cancellation
//! - [`merge`] - Merged document assembly
//! - [`library`] - Read-back of downloaded works
//! - [`downloader`] - `download_work(work_id, output_dir)` facade

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod download;
pub mod downloader;
pub mod encoding;
pub mod engine;
mod fsio;
pub mod library;
pub mod merge;
pub mod progress;
pub mod scrape;
#[cfg(test)]
pub mod test_support;
pub(crate) mod user_agent;
pub mod work;

// Re-export commonly used types
pub use config::{ConfigError, DownloaderConfig};
pub use download::{DownloadError, FetchError, HttpClient, PageSource, RetryPolicy, Transport};
pub use downloader::{Downloader, DownloaderError, WorkDownload};
pub use engine::{
    DEFAULT_CONCURRENCY, DownloadEngine, DownloadEvent, DownloadObserver, EngineError, FailedUnit,
    NoopObserver, RunReport, UnitError,
};
pub use library::{Book, Chapter, DownloadedWork, LibraryError, list_downloaded_works, load_book};
pub use merge::{MergeError, merge};
pub use progress::{ProgressError, ProgressStore, WorkProgress};
pub use scrape::{LocateError, Locator};
pub use work::{UnitPayload, WorkDescriptor, WorkUnitRef};
