//! Durable record of which units have been written for each work.
//!
//! The record is one JSON document mapping work id to
//! `{title, total_chapters, completed_chapters}`. Every mutation is written
//! through to disk before the call returns, inside the same write lock that
//! guards the in-memory copy, so concurrent workers never lose updates.
//! Fields this crate does not know about are kept and written back unchanged,
//! as are top-level entries that are not work records.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::fsio::write_atomic;

/// Default progress file name inside the output directory.
pub const PROGRESS_FILE_NAME: &str = "download_progress.json";

/// Suffix appended to a progress file that could not be parsed.
pub const CORRUPT_SUFFIX: &str = "corrupt";

/// Errors from the progress store.
#[derive(Debug, Error)]
pub enum ProgressError {
    /// Reading, writing, or moving the progress file failed.
    #[error("progress file {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The record could not be serialized.
    #[error("failed to serialize progress: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The index lies outside `1..=total` for the work.
    #[error("unit {index} out of range for work {work_id} (1..={total})")]
    IndexOutOfRange {
        /// Work id.
        work_id: String,
        /// Rejected index.
        index: u32,
        /// Recorded unit count.
        total: u32,
    },

    /// No record exists for the work; call [`ProgressStore::begin_work`] first.
    #[error("no progress record for work {work_id}")]
    UnknownWork {
        /// Work id.
        work_id: String,
    },
}

impl ProgressError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Progress of a single work.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkProgress {
    /// Work title at the time of the last run.
    #[serde(default)]
    pub title: String,
    /// Unit count at the time of the last run.
    #[serde(rename = "total_chapters", default)]
    pub total_units: u32,
    /// Indices whose unit file has been written.
    #[serde(
        rename = "completed_chapters",
        default,
        deserialize_with = "deserialize_indices"
    )]
    pub completed_indices: BTreeSet<u32>,
    /// Set by [`ProgressStore::clear`]: unit files already on disk are not
    /// trusted until every unit has been fetched again.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub refetch: bool,
    /// Fields written by other tools, preserved on rewrite.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Keys that mark a top-level entry as a work record.
const WORK_KEYS: [&str; 3] = ["title", "total_chapters", "completed_chapters"];

/// In-memory form of the progress document.
#[derive(Debug, Default)]
struct ProgressRecord {
    works: BTreeMap<String, WorkProgress>,
    /// Top-level entries that are not work records, written back as read.
    foreign: Map<String, Value>,
}

impl ProgressRecord {
    fn from_document(document: Map<String, Value>) -> Self {
        let mut record = Self::default();
        for (key, value) in document {
            let looks_like_work = value
                .as_object()
                .is_some_and(|fields| WORK_KEYS.iter().any(|k| fields.contains_key(*k)));
            if looks_like_work {
                match serde_json::from_value::<WorkProgress>(value.clone()) {
                    Ok(work) => {
                        record.works.insert(key, work);
                        continue;
                    }
                    Err(error) => {
                        warn!(key = %key, error = %error, "keeping undecodable progress entry as is");
                    }
                }
            }
            record.foreign.insert(key, value);
        }
        record
    }

    fn to_document(&self) -> Result<Value, serde_json::Error> {
        let mut document = self.foreign.clone();
        for (work_id, work) in &self.works {
            document.insert(work_id.clone(), serde_json::to_value(work)?);
        }
        Ok(Value::Object(document))
    }
}

/// Older files store indices as strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredIndex {
    Number(u32),
    Text(String),
}

fn deserialize_indices<'de, D>(deserializer: D) -> Result<BTreeSet<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error as _;

    Vec::<StoredIndex>::deserialize(deserializer)?
        .into_iter()
        .map(|stored| match stored {
            StoredIndex::Number(index) => Ok(index),
            StoredIndex::Text(text) => text
                .trim()
                .parse()
                .map_err(|_| D::Error::custom(format!("invalid unit index `{text}`"))),
        })
        .collect()
}

/// Write-through progress store shared by all workers of a run.
#[derive(Debug)]
pub struct ProgressStore {
    path: PathBuf,
    record: RwLock<ProgressRecord>,
}

impl ProgressStore {
    /// Opens the store at `path`.
    ///
    /// A missing file starts an empty record. A file that is not a JSON
    /// object is moved to `<path>.corrupt` and the store starts empty.
    /// Entries that are not work records are kept and written back.
    ///
    /// # Errors
    ///
    /// Returns [`ProgressError::Io`] when the file exists but cannot be read,
    /// or when a corrupt file cannot be moved aside.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ProgressError> {
        let path = path.as_ref().to_path_buf();

        let record = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => ProgressRecord::default(),
            Ok(bytes) => match serde_json::from_slice::<Map<String, Value>>(&bytes) {
                Ok(document) => ProgressRecord::from_document(document),
                Err(error) => {
                    let aside = quarantine_path(&path);
                    warn!(
                        error = %error,
                        moved_to = %aside.display(),
                        "progress file unreadable, starting empty"
                    );
                    tokio::fs::rename(&path, &aside)
                        .await
                        .map_err(|source| ProgressError::io(&path, source))?;
                    ProgressRecord::default()
                }
            },
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => ProgressRecord::default(),
            Err(source) => return Err(ProgressError::io(&path, source)),
        };

        debug!(
            works = record.works.len(),
            other_entries = record.foreign.len(),
            "progress loaded"
        );
        Ok(Self {
            path,
            record: RwLock::new(record),
        })
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records `{title, total_units}` for a work and persists.
    ///
    /// Creates the record if absent. An existing record keeps its completed
    /// indices, minus any that no longer fall in `1..=total_units`.
    /// Returns the completed indices after pruning.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be persisted.
    #[instrument(skip(self, title))]
    pub async fn begin_work(
        &self,
        work_id: &str,
        title: &str,
        total_units: u32,
    ) -> Result<BTreeSet<u32>, ProgressError> {
        let mut record = self.record.write().await;
        // A work id now in use takes over a same-named foreign entry.
        record.foreign.remove(work_id);
        let entry = record.works.entry(work_id.to_string()).or_default();
        entry.title = title.to_string();
        entry.total_units = total_units;

        let before = entry.completed_indices.len();
        entry
            .completed_indices
            .retain(|index| (1..=total_units).contains(index));
        let pruned = before - entry.completed_indices.len();
        if pruned > 0 {
            info!(pruned, "dropped completed indices beyond the unit count");
        }

        let completed = entry.completed_indices.clone();
        self.write_record(&record).await?;
        Ok(completed)
    }

    /// Whether `index` has been marked complete for `work_id`.
    pub async fn is_complete(&self, work_id: &str, index: u32) -> bool {
        self.record
            .read()
            .await
            .works
            .get(work_id)
            .is_some_and(|work| work.completed_indices.contains(&index))
    }

    /// Whether the work was cleared and is still being fetched again.
    ///
    /// While true, unit files found on disk must not be adopted as complete.
    pub async fn is_refetching(&self, work_id: &str) -> bool {
        self.record
            .read()
            .await
            .works
            .get(work_id)
            .is_some_and(|work| work.refetch)
    }

    /// Adds `index` to the work's completed set and persists before returning.
    ///
    /// Returns `false` when the index was already complete (nothing written).
    /// If persisting fails the index is removed again, so memory and disk agree.
    /// Completing the last unit of a cleared work ends its refetch.
    ///
    /// # Errors
    ///
    /// - [`ProgressError::UnknownWork`] when the work has no record
    /// - [`ProgressError::IndexOutOfRange`] when `index` is not in `1..=total`
    /// - [`ProgressError::Io`] / [`ProgressError::Serialize`] when persisting fails
    pub async fn mark_complete(&self, work_id: &str, index: u32) -> Result<bool, ProgressError> {
        let mut record = self.record.write().await;
        let entry = record
            .works
            .get_mut(work_id)
            .ok_or_else(|| ProgressError::UnknownWork {
                work_id: work_id.to_string(),
            })?;

        if !(1..=entry.total_units).contains(&index) {
            return Err(ProgressError::IndexOutOfRange {
                work_id: work_id.to_string(),
                index,
                total: entry.total_units,
            });
        }
        if !entry.completed_indices.insert(index) {
            return Ok(false);
        }
        let was_refetching = entry.refetch;
        let all_done = usize::try_from(entry.total_units)
            .is_ok_and(|total| entry.completed_indices.len() >= total);
        if was_refetching && all_done {
            entry.refetch = false;
            info!(work_id, "every unit fetched again after clear");
        }

        if let Err(error) = self.write_record(&record).await {
            if let Some(entry) = record.works.get_mut(work_id) {
                entry.completed_indices.remove(&index);
                entry.refetch = was_refetching;
            }
            return Err(error);
        }
        debug!(work_id, index, "unit marked complete");
        Ok(true)
    }

    /// Completed indices of a work; empty when the work is unknown.
    pub async fn completed(&self, work_id: &str) -> BTreeSet<u32> {
        self.record
            .read()
            .await
            .works
            .get(work_id)
            .map(|work| work.completed_indices.clone())
            .unwrap_or_default()
    }

    /// Snapshot of one work's record.
    pub async fn work(&self, work_id: &str) -> Option<WorkProgress> {
        self.record.read().await.works.get(work_id).cloned()
    }

    /// Forgets a work's completed units and persists.
    ///
    /// This is the only way to un-complete units. The next run fetches every
    /// unit again, even those whose file is still on disk. Returns whether a
    /// record existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be persisted.
    #[instrument(skip(self))]
    pub async fn clear(&self, work_id: &str) -> Result<bool, ProgressError> {
        let mut record = self.record.write().await;
        let Some(entry) = record.works.get_mut(work_id) else {
            return Ok(false);
        };
        let previous = entry.clone();
        entry.completed_indices.clear();
        entry.refetch = true;

        if let Err(error) = self.write_record(&record).await {
            record.works.insert(work_id.to_string(), previous);
            return Err(error);
        }
        info!("progress cleared");
        Ok(true)
    }

    /// Writes the current record to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub async fn persist(&self) -> Result<(), ProgressError> {
        // Exclusive so an older snapshot never lands after a newer one.
        let record = self.record.write().await;
        self.write_record(&record).await
    }

    async fn write_record(&self, record: &ProgressRecord) -> Result<(), ProgressError> {
        let document = record.to_document().map_err(ProgressError::Serialize)?;
        let mut json = serde_json::to_vec_pretty(&document).map_err(ProgressError::Serialize)?;
        json.push(b'\n');

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ProgressError::io(parent, source))?;
        }
        write_atomic(&self.path, &json)
            .await
            .map_err(|source| ProgressError::io(&self.path, source))
    }
}

fn quarantine_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(CORRUPT_SUFFIX);
    path.with_file_name(name)
}
