//! Consumer-facing entry point: `download_work(work_id, output_dir)`.
//!
//! Wires the locator, orchestrator, progress store, and merger together.
//! Locator failures abort the work before any unit is fetched; unit failures
//! do not, and the merged document is always rebuilt from whatever succeeded.
//! Works downloaded through one [`Downloader`] share a single progress store
//! per progress file, so concurrent downloads never overwrite each other.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::{ConfigError, DownloaderConfig};
use crate::download::{HttpClient, PageSource, Transport};
use crate::engine::{
    DownloadEngine, DownloadEvent, DownloadObserver, EngineError, NoopObserver, RunReport,
};
use crate::merge::{MergeError, merge};
use crate::progress::{ProgressError, ProgressStore};
use crate::scrape::{LocateError, Locator};

/// Errors that stop a work download as a whole.
#[derive(Debug, Error)]
pub enum DownloaderError {
    /// Configuration rejected.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The work could not be located.
    #[error(transparent)]
    Locate(#[from] LocateError),

    /// The work directory could not be created.
    #[error("failed to create {path}: {source}")]
    Io {
        /// Directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The progress file could not be opened.
    #[error(transparent)]
    Progress(#[from] ProgressError),

    /// The orchestrator failed before any unit settled.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The merged document could not be written.
    #[error(transparent)]
    Merge(#[from] MergeError),

    /// Cancelled before the unit list was known.
    #[error("download cancelled")]
    Cancelled,
}

/// Result of [`Downloader::download_work`].
#[derive(Debug)]
pub struct WorkDownload {
    /// Work id.
    pub work_id: String,
    /// Sanitized title.
    pub title: String,
    /// Directory holding the unit files.
    pub work_dir: PathBuf,
    /// The merged document.
    pub merged_path: PathBuf,
    /// Per-unit outcome of the run.
    pub report: RunReport,
}

/// Downloads works from one site.
#[derive(Debug)]
pub struct Downloader {
    config: DownloaderConfig,
    transport: Transport,
    locator: Locator,
    engine: DownloadEngine,
    stores: Mutex<HashMap<PathBuf, Arc<ProgressStore>>>,
}

impl Downloader {
    /// Builds a downloader fetching over HTTP.
    ///
    /// # Errors
    ///
    /// Returns [`DownloaderError::Config`] for invalid settings and
    /// [`DownloaderError::Client`] if the HTTP client cannot be built.
    pub fn new(config: DownloaderConfig) -> Result<Self, DownloaderError> {
        config.validate()?;
        let client = HttpClient::new_with_timeouts(
            config.connect_timeout_secs,
            config.read_timeout_secs,
        )
        .map_err(DownloaderError::Client)?;
        Self::with_source(config, Arc::new(client))
    }

    /// Builds a downloader over any page source.
    ///
    /// # Errors
    ///
    /// Returns [`DownloaderError::Config`] for invalid settings.
    pub fn with_source(
        config: DownloaderConfig,
        source: Arc<dyn PageSource>,
    ) -> Result<Self, DownloaderError> {
        config.validate()?;
        let transport = Transport::new(source, config.retry_policy());
        let locator = Locator::new(transport.clone(), config.base_url.clone());
        let engine = DownloadEngine::new(config.concurrency)?;
        Ok(Self {
            config,
            transport,
            locator,
            engine,
            stores: Mutex::new(HashMap::new()),
        })
    }

    /// Settings in use.
    #[must_use]
    pub fn config(&self) -> &DownloaderConfig {
        &self.config
    }

    /// Downloads `work_id` into `output_dir` and returns the merged document.
    ///
    /// # Errors
    ///
    /// See [`Downloader::download_work_with`].
    pub async fn download_work(
        &self,
        work_id: &str,
        output_dir: &Path,
    ) -> Result<WorkDownload, DownloaderError> {
        self.download_work_with(work_id, output_dir, &NoopObserver, &CancellationToken::new())
            .await
    }

    /// Downloads `work_id` with progress notifications and cancellation.
    ///
    /// Cancelling after the unit list is known still merges what was
    /// written; the report then has `cancelled` set.
    ///
    /// # Errors
    ///
    /// - [`DownloaderError::Locate`] if the work cannot be located
    /// - [`DownloaderError::Cancelled`] if cancelled while locating
    /// - [`DownloaderError::Io`] if the work directory cannot be created
    /// - [`DownloaderError::Progress`] if the progress file cannot be opened
    /// - [`DownloaderError::Engine`] if the run cannot start
    /// - [`DownloaderError::Merge`] if the merged document cannot be written
    #[instrument(skip(self, observer, cancel), fields(output_dir = %output_dir.display()))]
    pub async fn download_work_with(
        &self,
        work_id: &str,
        output_dir: &Path,
        observer: &dyn DownloadObserver,
        cancel: &CancellationToken,
    ) -> Result<WorkDownload, DownloaderError> {
        let descriptor = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(DownloaderError::Cancelled),
            located = self.locator.locate(work_id) => located?,
        };

        let work_dir = descriptor.work_dir(output_dir);
        tokio::fs::create_dir_all(&work_dir)
            .await
            .map_err(|source| DownloaderError::Io {
                path: work_dir.clone(),
                source,
            })?;

        let progress = self.progress_store(output_dir).await?;
        let report = self
            .engine
            .run(
                &descriptor,
                &work_dir,
                &self.transport,
                &progress,
                observer,
                cancel,
            )
            .await?;

        let merged_path = merge(&work_dir, &descriptor.title).await?;
        observer.on_event(&DownloadEvent::Merged {
            path: merged_path.clone(),
        });

        if report.is_complete() {
            info!(path = %merged_path.display(), "work downloaded");
        } else {
            warn!(
                failed = report.failed.len(),
                not_started = report.not_started.len(),
                path = %merged_path.display(),
                "work downloaded with missing units"
            );
        }

        Ok(WorkDownload {
            work_id: descriptor.id,
            title: descriptor.title,
            work_dir,
            merged_path,
            report,
        })
    }

    /// The store for `output_dir`'s progress file, opened on first use.
    async fn progress_store(&self, output_dir: &Path) -> Result<Arc<ProgressStore>, DownloaderError> {
        let path = self.config.progress_path(output_dir);
        let key = std::path::absolute(&path).unwrap_or(path);

        let mut stores = self.stores.lock().await;
        if let Some(store) = stores.get(&key) {
            return Ok(Arc::clone(store));
        }
        let store = Arc::new(ProgressStore::load(&key).await?);
        debug!(path = %key.display(), "progress store opened");
        stores.insert(key, Arc::clone(&store));
        Ok(store)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;

    use async_trait::async_trait;

    use super::*;
    use crate::download::DownloadError;

    const BASE: &str = "https://novels.example";
    const CHAPTERS: u32 = 6;

    /// Serves works `A` and `B`, each with [`CHAPTERS`] chapters.
    struct TwoWorks;

    #[async_trait]
    impl PageSource for TwoWorks {
        async fn fetch_once(&self, url: &str) -> Result<String, DownloadError> {
            let path = url.strip_prefix(BASE).unwrap_or(url);
            let page = match path.trim_start_matches("/book/").split_once('/') {
                Some((work @ ("A" | "B"), "")) => {
                    let links: String = (1..=CHAPTERS)
                        .map(|i| format!("<dd><a href=\"/book/{work}/{i}.html\">Part {i}</a></dd>"))
                        .collect();
                    format!(
                        "<html><body><h1>Work {work}</h1>\
                         <div class=\"listmain\"><dl>{links}</dl></div></body></html>"
                    )
                }
                Some((work @ ("A" | "B"), chapter)) => {
                    // Stagger completions so both works persist interleaved.
                    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                    format!("<html><body><div id=\"content\">{work} {chapter}</div></body></html>")
                }
                _ => return Err(DownloadError::http_status(url, 404)),
            };
            Ok(page)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_works_share_one_progress_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = DownloaderConfig::new(BASE).unwrap();
        let downloader = Downloader::with_source(config, Arc::new(TwoWorks)).unwrap();

        let (a, b) = tokio::join!(
            downloader.download_work("A", dir.path()),
            downloader.download_work("B", dir.path())
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert!(a.report.is_complete());
        assert!(b.report.is_complete());

        let all: BTreeSet<u32> = (1..=CHAPTERS).collect();
        let reopened = ProgressStore::load(dir.path().join("download_progress.json"))
            .await
            .unwrap();
        assert_eq!(reopened.completed("A").await, all);
        assert_eq!(reopened.completed("B").await, all);
    }

    #[tokio::test]
    async fn test_progress_store_is_shared_per_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = DownloaderConfig::new(BASE).unwrap();
        let downloader = Downloader::with_source(config, Arc::new(TwoWorks)).unwrap();

        let first = downloader.progress_store(dir.path()).await.unwrap();
        let second = downloader.progress_store(dir.path()).await.unwrap();
        let other_dir = tempfile::tempdir().unwrap();
        let other = downloader.progress_store(other_dir.path()).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = DownloaderConfig::new("https://novels.example").unwrap();
        config.concurrency = 99;
        assert!(matches!(
            Downloader::new(config),
            Err(DownloaderError::Config(ConfigError::OutOfRange { field: "concurrency", .. }))
        ));
    }

    #[test]
    fn test_new_builds_with_defaults() {
        let config = DownloaderConfig::new("https://novels.example").unwrap();
        let downloader = Downloader::new(config).unwrap();
        assert_eq!(downloader.config().concurrency, 3);
    }
}
