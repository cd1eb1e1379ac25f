use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::download::{FetchError, Transport};
use crate::fsio::write_atomic;
use crate::progress::{ProgressError, ProgressStore};
use crate::scrape::extract;
use crate::work::{UnitPayload, WorkUnitRef};

/// Why a single unit did not complete. Never fatal to the run.
#[derive(Debug, Error)]
pub enum UnitError {
    /// Transport gave up after retries.
    #[error("fetch failed: {0}")]
    Fetch(#[source] FetchError),

    /// The page held no extractable text.
    #[error("no extractable text at {url}")]
    Extraction {
        /// Unit page address.
        url: String,
    },

    /// The unit file could not be written.
    #[error("failed to write {path}: {source}")]
    Persistence {
        /// Target path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The unit file was written but completion could not be recorded.
    #[error("failed to record progress: {0}")]
    Progress(#[source] ProgressError),

    /// The run was cancelled while the unit was being fetched.
    #[error("cancelled")]
    Cancelled,

    /// The worker task panicked or was aborted.
    #[error("worker task failed: {message}")]
    TaskPanicked {
        /// Join error text.
        message: String,
    },
}

/// Everything a worker needs besides the unit itself.
#[derive(Debug, Clone)]
pub(super) struct UnitContext {
    pub work_id: Arc<str>,
    pub work_dir: Arc<Path>,
    pub transport: Transport,
    pub progress: Arc<ProgressStore>,
    pub cancel: CancellationToken,
}

/// Fetch → extract → write → record.
///
/// Cancellation only interrupts the fetch; once a body is in hand the write
/// and the progress update run to completion.
#[instrument(skip_all, fields(work_id = %ctx.work_id, index = unit.index))]
pub(super) async fn process_unit(
    ctx: &UnitContext,
    unit: &WorkUnitRef,
) -> Result<PathBuf, UnitError> {
    let markup = tokio::select! {
        biased;
        () = ctx.cancel.cancelled() => return Err(UnitError::Cancelled),
        fetched = ctx.transport.fetch(&unit.source_url) => fetched.map_err(UnitError::Fetch)?,
    };

    let body = extract(&markup).ok_or_else(|| UnitError::Extraction {
        url: unit.source_url.clone(),
    })?;
    let payload = UnitPayload {
        index: unit.index,
        title: unit.title.clone(),
        body,
    };

    let path = ctx.work_dir.join(unit.file_name());
    write_atomic(&path, payload.render().as_bytes())
        .await
        .map_err(|source| UnitError::Persistence {
            path: path.clone(),
            source,
        })?;
    debug!(path = %path.display(), "unit file written");

    ctx.progress
        .mark_complete(&ctx.work_id, unit.index)
        .await
        .map_err(UnitError::Progress)?;
    Ok(path)
}
