//! Assembles per-unit files into one merged document.
//!
//! The merged document is derived data: it can be regenerated at any time
//! from the unit files in a work directory and never consults progress state.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::fsio::write_atomic;
use crate::work::{UNIT_FILE_EXTENSION, parse_unit_index};

/// Suffix marking the merged document, placed between title and extension.
pub const MERGED_SUFFIX: &str = "_complete";

/// Width of the `=` line between units.
pub const BOUNDARY_WIDTH: usize = 50;

/// Errors from merging.
#[derive(Debug, Error)]
pub enum MergeError {
    /// Listing the directory or writing the merged file failed.
    #[error("merge I/O error at {path}: {source}")]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl MergeError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// `{title}_complete.txt`
#[must_use]
pub fn merged_file_name(title: &str) -> String {
    format!("{title}{MERGED_SUFFIX}.{UNIT_FILE_EXTENSION}")
}

/// A line of [`BOUNDARY_WIDTH`] `=` characters.
#[must_use]
pub fn boundary() -> String {
    "=".repeat(BOUNDARY_WIDTH)
}

/// Whether `name` is a merged document, whatever its title.
#[must_use]
pub fn is_merged_file_name(name: &str) -> bool {
    name.strip_suffix(UNIT_FILE_EXTENSION)
        .and_then(|stem| stem.strip_suffix('.'))
        .is_some_and(|stem| stem.ends_with(MERGED_SUFFIX))
}

/// Unit files in `work_dir` as `(index, path)`, ascending by numeric index.
///
/// Only regular `*.txt` files whose name starts with digits followed by `_`
/// are listed. Merged documents are never listed, including ones left by an
/// earlier title such as `1984_complete.txt`.
///
/// # Errors
///
/// Returns [`MergeError::Io`] if the directory cannot be read.
pub async fn list_unit_files(work_dir: &Path) -> Result<Vec<(u32, PathBuf)>, MergeError> {
    let mut entries = tokio::fs::read_dir(work_dir)
        .await
        .map_err(|source| MergeError::io(work_dir, source))?;

    let mut units = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|source| MergeError::io(work_dir, source))?
    {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if is_merged_file_name(name) {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some(UNIT_FILE_EXTENSION) {
            continue;
        }
        let Some(index) = parse_unit_index(name) else {
            continue;
        };
        if !entry.file_type().await.is_ok_and(|t| t.is_file()) {
            continue;
        }
        units.push((index, path));
    }

    units.sort();
    Ok(units)
}

/// Writes `{title}_complete.txt` in `work_dir` and returns its path.
///
/// Layout: `{title}\n\n`, then for each unit file in numeric order its
/// content followed by `\n\n`, a line of 50 `=`, and `\n\n`. Unreadable unit
/// files are logged and left out.
///
/// # Errors
///
/// Returns [`MergeError::Io`] if the directory cannot be listed or the merged
/// file cannot be written.
#[instrument(skip_all, fields(work_dir = %work_dir.display()))]
pub async fn merge(work_dir: &Path, title: &str) -> Result<PathBuf, MergeError> {
    let file_name = merged_file_name(title);
    let merged_path = work_dir.join(&file_name);
    let units = list_unit_files(work_dir).await?;

    let marker = boundary();
    let mut document = format!("{title}\n\n");
    let mut merged = 0usize;
    for (index, path) in &units {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => {
                document.push_str(&content);
                document.push_str("\n\n");
                document.push_str(&marker);
                document.push_str("\n\n");
                merged += 1;
            }
            Err(error) => {
                warn!(index, path = %path.display(), error = %error, "skipping unreadable unit file");
            }
        }
    }
    debug!(bytes = document.len(), "merged document assembled");

    write_atomic(&merged_path, document.as_bytes())
        .await
        .map_err(|source| MergeError::io(&merged_path, source))?;
    info!(units = merged, path = %merged_path.display(), "merged document written");
    Ok(merged_path)
}
