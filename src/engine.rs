//! Fetch orchestrator: bounded-concurrency download of a work's units.
//!
//! # Overview
//!
//! [`DownloadEngine::run`] walks a [`WorkDescriptor`] in reading order. Units
//! already recorded in the [`ProgressStore`], or whose file is already on
//! disk, are skipped. Every other unit becomes a Tokio task gated by a
//! semaphore permit. Tasks report back over a channel to a single collector,
//! which builds the [`RunReport`] and emits [`DownloadEvent`]s.
//!
//! Per-unit failures never abort a run. Only progress bootstrap failure or a
//! closed semaphore make `run` return an error.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use noveldl_core::download::{HttpClient, RetryPolicy, Transport};
//! use noveldl_core::engine::{DownloadEngine, NoopObserver};
//! use noveldl_core::progress::ProgressStore;
//! use noveldl_core::work::WorkDescriptor;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(descriptor: WorkDescriptor) -> Result<(), Box<dyn std::error::Error>> {
//! let transport = Transport::new(Arc::new(HttpClient::new()?), RetryPolicy::default());
//! let progress = Arc::new(ProgressStore::load("novels/download_progress.json").await?);
//! let engine = DownloadEngine::new(3)?;
//! let report = engine
//!     .run(
//!         &descriptor,
//!         Path::new("novels/42_Title"),
//!         &transport,
//!         &progress,
//!         &NoopObserver,
//!         &CancellationToken::new(),
//!     )
//!     .await?;
//! println!("{} fetched, {} failed", report.succeeded.len(), report.failed.len());
//! # Ok(())
//! # }
//! ```

mod events;
mod unit;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

pub use events::{DownloadEvent, DownloadObserver, NoopObserver};
pub use unit::UnitError;

use crate::download::Transport;
use crate::progress::{ProgressError, ProgressStore};
use crate::work::{WorkDescriptor, WorkUnitRef};
use unit::{UnitContext, process_unit};

/// Minimum allowed concurrency value.
pub const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
pub const MAX_CONCURRENCY: usize = 32;

/// Default concurrency if not specified.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Error type for orchestrator runs.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,

    /// The work's progress record could not be initialized.
    #[error("progress error: {0}")]
    Progress(#[from] ProgressError),
}

/// A unit that did not complete in this run.
#[derive(Debug)]
pub struct FailedUnit {
    /// The unit as listed by the locator.
    pub unit: WorkUnitRef,
    /// Cause.
    pub error: UnitError,
}

impl FailedUnit {
    /// Unit index.
    #[must_use]
    pub fn index(&self) -> u32 {
        self.unit.index
    }

    /// Unit title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.unit.title
    }
}

/// Outcome of one [`DownloadEngine::run`].
///
/// Given the same network responses the sets are the same regardless of the
/// order in which tasks finished.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Units in the work.
    pub total_units: u32,
    /// Units fetched and written in this run.
    pub succeeded: BTreeSet<u32>,
    /// Units complete before this run (recorded or adopted from disk).
    pub skipped: BTreeSet<u32>,
    /// Units that failed, ordered by index.
    pub failed: Vec<FailedUnit>,
    /// Units never submitted because the run was cancelled.
    pub not_started: BTreeSet<u32>,
    /// Whether cancellation was requested during the run.
    pub cancelled: bool,
}

impl RunReport {
    /// True when every unit of the work is now complete.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.not_started.is_empty()
    }

    /// Indices of failed units.
    #[must_use]
    pub fn failed_indices(&self) -> BTreeSet<u32> {
        self.failed.iter().map(FailedUnit::index).collect()
    }
}

/// Result of one worker, sent to the collector.
type UnitOutcome = (WorkUnitRef, Result<PathBuf, UnitError>);

/// What the dispatcher did besides spawning.
#[derive(Debug, Default)]
struct Dispatch {
    handles: BTreeMap<u32, (WorkUnitRef, JoinHandle<()>)>,
    skipped: BTreeSet<u32>,
    adoption_failures: Vec<FailedUnit>,
    not_started: BTreeSet<u32>,
}

/// Bounded-concurrency orchestrator.
///
/// # Concurrency Model
///
/// - Each unit runs in its own Tokio task
/// - A semaphore permit is acquired before spawning each task
/// - Permits are released when tasks finish (RAII)
/// - Results flow over an unbounded channel to one collector
#[derive(Debug)]
pub struct DownloadEngine {
    semaphore: Arc<Semaphore>,
    concurrency: usize,
}

impl DownloadEngine {
    /// Creates an engine running at most `concurrency` units at once.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if the value is outside
    /// `MIN_CONCURRENCY..=MAX_CONCURRENCY`.
    #[instrument(level = "debug")]
    pub fn new(concurrency: usize) -> Result<Self, EngineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(EngineError::InvalidConcurrency { value: concurrency });
        }
        debug!(concurrency, "creating download engine");
        Ok(Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
        })
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Downloads every incomplete unit of `descriptor` into `work_dir`.
    ///
    /// `work_dir` must exist. Returns once every submitted task has settled.
    ///
    /// On cancellation no further units are submitted, in-flight fetches are
    /// abandoned, and units already past their fetch finish writing and are
    /// recorded.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Progress`] if the progress record cannot be
    /// initialized, or [`EngineError::SemaphoreClosed`] if the semaphore is
    /// closed. Individual unit failures are reported in [`RunReport::failed`].
    #[instrument(
        skip_all,
        fields(work_id = %descriptor.id, units = descriptor.units.len(), work_dir = %work_dir.display())
    )]
    pub async fn run(
        &self,
        descriptor: &WorkDescriptor,
        work_dir: &Path,
        transport: &Transport,
        progress: &Arc<ProgressStore>,
        observer: &dyn DownloadObserver,
        cancel: &CancellationToken,
    ) -> Result<RunReport, EngineError> {
        let total_units = descriptor.total_units();
        let already_complete = progress
            .begin_work(&descriptor.id, &descriptor.title, total_units)
            .await?;

        info!(
            already_complete = already_complete.len(),
            "starting unit downloads"
        );
        observer.on_event(&DownloadEvent::WorkStarted {
            work_id: descriptor.id.clone(),
            title: descriptor.title.clone(),
            total_units,
            already_complete: already_complete.len(),
        });

        let ctx = UnitContext {
            work_id: Arc::from(descriptor.id.as_str()),
            work_dir: Arc::from(work_dir),
            transport: transport.clone(),
            progress: Arc::clone(progress),
            cancel: cancel.clone(),
        };
        let (tx, rx) = mpsc::unbounded_channel::<UnitOutcome>();

        let (dispatched, mut collected) = tokio::join!(
            self.dispatch(descriptor, &ctx, observer, tx),
            collect(rx, observer)
        );
        let dispatch = dispatched?;

        // Tasks that died without reporting.
        let reported: BTreeSet<u32> = collected
            .succeeded
            .iter()
            .copied()
            .chain(collected.failed.iter().map(FailedUnit::index))
            .collect();
        for (index, (unit, handle)) in dispatch.handles {
            let joined = handle.await;
            if reported.contains(&index) {
                continue;
            }
            let message = match joined {
                Err(error) => error.to_string(),
                Ok(()) => "task ended without reporting".to_string(),
            };
            warn!(index, %message, "download task panicked");
            let failure = FailedUnit {
                unit,
                error: UnitError::TaskPanicked { message },
            };
            notify_failure(observer, &failure);
            collected.failed.push(failure);
        }

        let mut failed = collected.failed;
        failed.extend(dispatch.adoption_failures);
        failed.sort_by_key(FailedUnit::index);

        let report = RunReport {
            total_units,
            succeeded: collected.succeeded,
            skipped: dispatch.skipped,
            failed,
            not_started: dispatch.not_started,
            cancelled: cancel.is_cancelled(),
        };

        info!(
            succeeded = report.succeeded.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            not_started = report.not_started.len(),
            cancelled = report.cancelled,
            "unit downloads settled"
        );
        observer.on_event(&DownloadEvent::WorkFinished {
            succeeded: report.succeeded.len(),
            failed: report.failed.len(),
            skipped: report.skipped.len(),
            cancelled: report.cancelled,
        });
        Ok(report)
    }

    /// Submits incomplete units in order; returns when all are submitted,
    /// skipped, or left unstarted by cancellation.
    async fn dispatch(
        &self,
        descriptor: &WorkDescriptor,
        ctx: &UnitContext,
        observer: &dyn DownloadObserver,
        tx: mpsc::UnboundedSender<UnitOutcome>,
    ) -> Result<Dispatch, EngineError> {
        let mut dispatch = Dispatch::default();
        let mut units = descriptor.units.iter();
        let adopt_files = !ctx.progress.is_refetching(&ctx.work_id).await;
        if !adopt_files {
            info!("work was cleared, existing unit files will be replaced");
        }

        while let Some(unit) = units.next() {
            if ctx.cancel.is_cancelled() {
                dispatch.not_started.insert(unit.index);
                dispatch.not_started.extend(units.map(|u| u.index));
                info!("cancelled, remaining units not submitted");
                break;
            }

            if ctx.progress.is_complete(&ctx.work_id, unit.index).await {
                debug!(index = unit.index, "already complete, skipping");
                dispatch.skipped.insert(unit.index);
                observer.on_event(&DownloadEvent::UnitSkipped { index: unit.index });
                continue;
            }

            let path = ctx.work_dir.join(unit.file_name());
            if adopt_files && tokio::fs::try_exists(&path).await.unwrap_or(false) {
                match ctx.progress.mark_complete(&ctx.work_id, unit.index).await {
                    Ok(_) => {
                        debug!(index = unit.index, path = %path.display(), "adopted existing unit file");
                        dispatch.skipped.insert(unit.index);
                        observer.on_event(&DownloadEvent::UnitSkipped { index: unit.index });
                    }
                    Err(error) => {
                        warn!(index = unit.index, error = %error, "failed to record existing unit file");
                        let failure = FailedUnit {
                            unit: unit.clone(),
                            error: UnitError::Progress(error),
                        };
                        notify_failure(observer, &failure);
                        dispatch.adoption_failures.push(failure);
                    }
                }
                continue;
            }

            let permit = tokio::select! {
                biased;
                () = ctx.cancel.cancelled() => {
                    dispatch.not_started.insert(unit.index);
                    dispatch.not_started.extend(units.map(|u| u.index));
                    info!("cancelled while waiting for a worker slot");
                    break;
                }
                permit = Arc::clone(&self.semaphore).acquire_owned() => {
                    permit.map_err(|_| EngineError::SemaphoreClosed)?
                }
            };

            let task_ctx = ctx.clone();
            let task_unit = unit.clone();
            let task_tx = tx.clone();
            let handle = tokio::spawn(async move {
                let _permit = permit;
                let result = process_unit(&task_ctx, &task_unit).await;
                // Receiver outlives every sender.
                let _ = task_tx.send((task_unit, result));
            });
            dispatch
                .handles
                .insert(unit.index, (unit.clone(), handle));
        }

        debug!(
            task_count = dispatch.handles.len(),
            "all units submitted, waiting for workers"
        );
        Ok(dispatch)
    }
}

#[derive(Debug, Default)]
struct Collected {
    succeeded: BTreeSet<u32>,
    failed: Vec<FailedUnit>,
}

/// Single consumer of worker results; ends once every sender is dropped.
async fn collect(
    mut rx: mpsc::UnboundedReceiver<UnitOutcome>,
    observer: &dyn DownloadObserver,
) -> Collected {
    let mut collected = Collected::default();
    while let Some((unit, result)) = rx.recv().await {
        match result {
            Ok(path) => {
                info!(index = unit.index, path = %path.display(), "unit completed");
                observer.on_event(&DownloadEvent::UnitSucceeded {
                    index: unit.index,
                    title: unit.title.clone(),
                });
                collected.succeeded.insert(unit.index);
            }
            Err(error) => {
                warn!(
                    index = unit.index,
                    url = %unit.source_url,
                    error = %error,
                    "unit failed"
                );
                let failure = FailedUnit { unit, error };
                notify_failure(observer, &failure);
                collected.failed.push(failure);
            }
        }
    }
    collected
}

fn notify_failure(observer: &dyn DownloadObserver, failure: &FailedUnit) {
    observer.on_event(&DownloadEvent::UnitFailed {
        index: failure.index(),
        title: failure.unit.title.clone(),
        reason: failure.error.to_string(),
    });
}
