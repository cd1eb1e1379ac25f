use std::fmt;
use std::path::PathBuf;

/// Progress notification for a consumer such as a progress bar or a reader UI.
///
/// Delivered synchronously and fire-and-forget; observers must not block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadEvent {
    /// The unit list is known and fetching is about to start.
    WorkStarted {
        /// Work id.
        work_id: String,
        /// Sanitized title.
        title: String,
        /// Number of units in the work.
        total_units: u32,
        /// Units already complete before this run.
        already_complete: usize,
    },
    /// Unit was complete before this run and was not fetched.
    UnitSkipped {
        /// Unit index.
        index: u32,
    },
    /// Unit was fetched, extracted, written, and recorded.
    UnitSucceeded {
        /// Unit index.
        index: u32,
        /// Unit title.
        title: String,
    },
    /// Unit failed; it stays incomplete and is retried by the next run.
    UnitFailed {
        /// Unit index.
        index: u32,
        /// Unit title.
        title: String,
        /// Human readable cause.
        reason: String,
    },
    /// Every submitted unit has settled.
    WorkFinished {
        /// Units fetched in this run.
        succeeded: usize,
        /// Units that failed in this run.
        failed: usize,
        /// Units skipped as already complete.
        skipped: usize,
        /// Whether the run was cancelled.
        cancelled: bool,
    },
    /// The merged document was written.
    Merged {
        /// Merged document path.
        path: PathBuf,
    },
}

impl fmt::Display for DownloadEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WorkStarted {
                title,
                total_units,
                already_complete,
                ..
            } => write!(
                f,
                "Downloading {title}: {total_units} chapters, {already_complete} already done"
            ),
            Self::UnitSkipped { index } => write!(f, "Chapter {index} already downloaded"),
            Self::UnitSucceeded { index, title } => write!(f, "Chapter {index} {title} done"),
            Self::UnitFailed {
                index,
                title,
                reason,
            } => write!(f, "Chapter {index} {title} failed: {reason}"),
            Self::WorkFinished {
                succeeded,
                failed,
                skipped,
                cancelled,
            } => {
                write!(
                    f,
                    "Finished: {succeeded} downloaded, {skipped} skipped, {failed} failed"
                )?;
                if *cancelled {
                    f.write_str(" (cancelled)")?;
                }
                Ok(())
            }
            Self::Merged { path } => write!(f, "Merged into {}", path.display()),
        }
    }
}

/// Receives [`DownloadEvent`]s.
///
/// Implemented for any `Fn(&DownloadEvent) + Send + Sync`.
pub trait DownloadObserver: Send + Sync {
    /// Called once per event.
    fn on_event(&self, event: &DownloadEvent);
}

impl<F> DownloadObserver for F
where
    F: Fn(&DownloadEvent) + Send + Sync,
{
    fn on_event(&self, event: &DownloadEvent) {
        self(event);
    }
}

/// Observer that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl DownloadObserver for NoopObserver {
    fn on_event(&self, _event: &DownloadEvent) {}
}
