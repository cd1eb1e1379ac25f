//! Read-back of downloaded works for a reading front end.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::merge::{BOUNDARY_WIDTH, MERGED_SUFFIX, list_unit_files};
use crate::work::UNIT_FILE_EXTENSION;

#[allow(clippy::expect_used)]
static BOUNDARY_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?m)^={{{BOUNDARY_WIDTH},}}[ \t\r]*$")).expect("boundary pattern is valid")
});

/// Errors from reading downloaded works.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// A file or directory could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl LibraryError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// One chapter as read back from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    /// First line of the chapter text.
    pub title: String,
    /// Remaining text, trimmed.
    pub content: String,
}

/// A downloaded work loaded for reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    /// Title from the merged header, or the directory name.
    pub title: String,
    /// Chapters in reading order.
    pub chapters: Vec<Chapter>,
}

/// A work directory that holds a merged document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedWork {
    /// Title taken from the merged file name.
    pub title: String,
    /// Work directory.
    pub dir: PathBuf,
    /// Merged document.
    pub merged_path: PathBuf,
}

/// Loads a merged document, or a work directory of unit files.
///
/// A merged file is split on lines of 50 or more `=`; its first line is the
/// book title. A directory is read as its unit files in numeric order.
/// In both cases a chapter's first line is its title and the rest its content.
///
/// # Errors
///
/// Returns [`LibraryError::Io`] if the path or any unit file cannot be read.
#[instrument(skip_all, fields(path = %path.display()))]
pub async fn load_book(path: &Path) -> Result<Book, LibraryError> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|source| LibraryError::io(path, source))?;

    if metadata.is_dir() {
        load_unit_dir(path).await
    } else {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| LibraryError::io(path, source))?;
        Ok(parse_merged(&text))
    }
}

/// Lists work directories under `output_dir` that contain a merged document,
/// sorted by title.
///
/// # Errors
///
/// Returns [`LibraryError::Io`] if `output_dir` cannot be read.
pub async fn list_downloaded_works(output_dir: &Path) -> Result<Vec<DownloadedWork>, LibraryError> {
    let mut entries = tokio::fs::read_dir(output_dir)
        .await
        .map_err(|source| LibraryError::io(output_dir, source))?;

    let mut works = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|source| LibraryError::io(output_dir, source))?
    {
        if !entry.file_type().await.is_ok_and(|t| t.is_dir()) {
            continue;
        }
        let dir = entry.path();
        match find_merged(&dir).await {
            Ok(Some((title, merged_path))) => works.push(DownloadedWork {
                title,
                dir,
                merged_path,
            }),
            Ok(None) => {}
            Err(error) => warn!(dir = %dir.display(), error = %error, "skipping unreadable directory"),
        }
    }

    works.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.dir.cmp(&b.dir)));
    debug!(works = works.len(), "downloaded works listed");
    Ok(works)
}

async fn find_merged(dir: &Path) -> Result<Option<(String, PathBuf)>, LibraryError> {
    let suffix = format!("{MERGED_SUFFIX}.{UNIT_FILE_EXTENSION}");
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|source| LibraryError::io(dir, source))?;

    let mut found: Option<(String, PathBuf)> = None;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|source| LibraryError::io(dir, source))?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(title) = name.strip_suffix(&suffix) else {
            continue;
        };
        if title.is_empty() || !entry.file_type().await.is_ok_and(|t| t.is_file()) {
            continue;
        }
        // Deterministic pick if a directory holds several.
        if found.as_ref().is_none_or(|(current, _)| title < current.as_str()) {
            found = Some((title.to_string(), entry.path()));
        }
    }
    Ok(found)
}

async fn load_unit_dir(dir: &Path) -> Result<Book, LibraryError> {
    let units = list_unit_files(dir).await.map_err(|error| match error {
        crate::merge::MergeError::Io { path, source } => LibraryError::Io { path, source },
    })?;

    let mut chapters = Vec::with_capacity(units.len());
    for (_, path) in units {
        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| LibraryError::io(&path, source))?;
        if let Some(chapter) = split_chapter(&text) {
            chapters.push(chapter);
        }
    }

    let title = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Book { title, chapters })
}

fn parse_merged(text: &str) -> Book {
    let (title, body) = match text.trim_start().split_once('\n') {
        Some((first, rest)) => (first.trim().to_string(), rest),
        None => (text.trim().to_string(), ""),
    };
    let chapters = BOUNDARY_LINE.split(body).filter_map(split_chapter).collect();
    Book { title, chapters }
}

/// First line is the title; a single-line part is its own content.
fn split_chapter(part: &str) -> Option<Chapter> {
    let part = part.trim();
    if part.is_empty() {
        return None;
    }
    Some(match part.split_once('\n') {
        Some((title, rest)) => Chapter {
            title: title.trim().to_string(),
            content: rest.trim().to_string(),
        },
        None => Chapter {
            title: part.to_string(),
            content: part.to_string(),
        },
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::merge::merge;

    async fn unit_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, text) in [
            ("0002_Two.txt", "Chapter 2 Two\n\nSecond body\nline two"),
            ("0001_One.txt", "Chapter 1 One\n\nFirst body"),
            ("0010_Ten.txt", "Chapter 10 Ten\n\nTenth body"),
        ] {
            tokio::fs::write(dir.path().join(name), text).await.unwrap();
        }
        dir
    }

    #[tokio::test]
    async fn test_load_merged_file() {
        let dir = unit_dir().await;
        let merged = merge(dir.path(), "Sword Song").await.unwrap();

        let book = load_book(&merged).await.unwrap();
        assert_eq!(book.title, "Sword Song");
        let titles: Vec<&str> = book.chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Chapter 1 One", "Chapter 2 Two", "Chapter 10 Ten"]);
        assert_eq!(book.chapters[1].content, "Second body\nline two");
    }

    #[tokio::test]
    async fn test_load_unit_directory_ignores_merged_file() {
        let dir = unit_dir().await;
        merge(dir.path(), "Sword Song").await.unwrap();

        let book = load_book(dir.path()).await.unwrap();
        assert_eq!(book.chapters.len(), 3);
        assert_eq!(book.chapters[2].title, "Chapter 10 Ten");
        assert_eq!(book.chapters[0].content, "First body");
    }

    #[test]
    fn test_longer_boundary_lines_also_split() {
        let text = format!("T\n\nA\nbody a\n{}\nB\nbody b\n{}\n", "=".repeat(60), "=".repeat(50));
        let book = parse_merged(&text);
        assert_eq!(book.title, "T");
        assert_eq!(
            book.chapters,
            vec![
                Chapter {
                    title: "A".to_string(),
                    content: "body a".to_string()
                },
                Chapter {
                    title: "B".to_string(),
                    content: "body b".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_equals_run_inside_a_line_is_body_text() {
        let inline = format!("before {} after", "=".repeat(50));
        let text = format!("T\n\nA\n{inline}\n{}\n", "=".repeat(50));
        let book = parse_merged(&text);
        assert_eq!(book.chapters.len(), 1);
        assert_eq!(book.chapters[0].content, inline);
    }

    #[tokio::test]
    async fn test_numeric_title_merged_file_is_not_a_chapter() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("0001_One.txt"), "Chapter 1 One\n\nFirst body")
            .await
            .unwrap();
        merge(dir.path(), "1984").await.unwrap();

        let book = load_book(dir.path()).await.unwrap();
        let titles: Vec<&str> = book.chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Chapter 1 One"]);
    }

    #[tokio::test]
    async fn test_list_downloaded_works_sorted_by_title() {
        let root = tempfile::tempdir().unwrap();
        for (dir, title) in [("7_Zeta", "Zeta"), ("3_Alpha", "Alpha")] {
            let path = root.path().join(dir);
            tokio::fs::create_dir(&path).await.unwrap();
            merge(&path, title).await.unwrap();
        }
        tokio::fs::create_dir(root.path().join("9_NoMerge")).await.unwrap();
        tokio::fs::write(root.path().join("download_progress.json"), "{}")
            .await
            .unwrap();

        let works = list_downloaded_works(root.path()).await.unwrap();
        let titles: Vec<&str> = works.iter().map(|w| w.title.as_str()).collect();
        assert_eq!(titles, vec!["Alpha", "Zeta"]);
        assert_eq!(works[0].merged_path, root.path().join("3_Alpha/Alpha_complete.txt"));
    }

    #[tokio::test]
    async fn test_missing_path_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_book(&root.path().join("absent")).await,
            Err(LibraryError::Io { .. })
        ));
    }
}
