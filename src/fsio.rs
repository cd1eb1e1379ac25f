//! Crash-safe file writes.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::AsyncWriteExt;

/// Suffix of the staging file written next to the destination.
pub(crate) const STAGING_SUFFIX: &str = "part";

static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

/// Writes `contents` to a sibling staging file, syncs it, then renames it
/// over `path`. Readers see either the old file or the complete new one.
pub(crate) async fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let staging = staging_path(path);

    let result = async {
        let mut file = tokio::fs::File::create(&staging).await?;
        file.write_all(contents).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&staging, path).await
    }
    .await;

    if result.is_err() {
        // Best effort; the staging file is never read back.
        let _ = tokio::fs::remove_file(&staging).await;
    }
    result
}

/// `dir/name.ext` → `dir/name.ext.{pid}.{seq}.part`, unique per call so
/// concurrent writers of one destination never share a staging file.
pub(crate) fn staging_path(path: &Path) -> PathBuf {
    let seq = STAGING_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".{}.{seq}.{STAGING_SUFFIX}", std::process::id()));
    path.with_file_name(name)
}
