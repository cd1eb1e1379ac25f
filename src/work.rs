//! Work and unit data model.
//!
//! A *work* (a novel) is an ordered list of *units* (chapters). The locator
//! produces a [`WorkDescriptor`] once per run; everything downstream treats it
//! as immutable.

use std::path::{Path, PathBuf};

/// Characters that cannot appear in a path segment on common filesystems.
const PATH_ILLEGAL_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Extension of per-unit files.
pub const UNIT_FILE_EXTENSION: &str = "txt";

/// Reference to one unit of a work, as discovered on the landing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkUnitRef {
    /// 1-based position in reading order.
    pub index: u32,
    /// Link text; never empty.
    pub title: String,
    /// Absolute URL of the unit page.
    pub source_url: String,
}

impl WorkUnitRef {
    /// File name of this unit inside the work directory.
    #[must_use]
    pub fn file_name(&self) -> String {
        unit_file_name(self.index, &self.title)
    }
}

/// A work and its units in canonical reading order.
///
/// Unit indices form the contiguous range `1..=units.len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkDescriptor {
    /// Opaque work identifier.
    pub id: String,
    /// Title, already safe to use as a path segment.
    pub title: String,
    /// Units, ordered by index.
    pub units: Vec<WorkUnitRef>,
}

impl WorkDescriptor {
    /// Number of units in the work.
    #[must_use]
    pub fn total_units(&self) -> u32 {
        u32::try_from(self.units.len()).unwrap_or(u32::MAX)
    }

    /// Directory holding this work's unit files and merged document.
    #[must_use]
    pub fn work_dir(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(format!("{}_{}", sanitize_title(&self.id), self.title))
    }

    /// Looks a unit up by index.
    #[must_use]
    pub fn unit(&self, index: u32) -> Option<&WorkUnitRef> {
        let position = usize::try_from(index.checked_sub(1)?).ok()?;
        self.units.get(position)
    }
}

/// Extracted text of one unit, held only until it is written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitPayload {
    /// Unit index.
    pub index: u32,
    /// Unit title as shown on the landing page.
    pub title: String,
    /// Normalized plain text.
    pub body: String,
}

impl UnitPayload {
    /// Renders the per-unit file: header line, blank line, body.
    #[must_use]
    pub fn render(&self) -> String {
        format!("Chapter {} {}\n\n{}", self.index, self.title, self.body)
    }
}

/// Replaces every path-illegal character with `_` and trims surrounding whitespace.
#[must_use]
pub fn sanitize_title(title: &str) -> String {
    title
        .trim()
        .chars()
        .map(|c| if PATH_ILLEGAL_CHARS.contains(&c) { '_' } else { c })
        .collect()
}

/// `{index:04}_{sanitized title}.txt`
#[must_use]
pub fn unit_file_name(index: u32, title: &str) -> String {
    format!("{index:04}_{}.{UNIT_FILE_EXTENSION}", sanitize_title(title))
}

/// Reads the numeric index prefix of a unit file name (`0012_title.txt` → 12).
#[must_use]
pub fn parse_unit_index(file_name: &str) -> Option<u32> {
    let (prefix, _) = file_name.split_once('_')?;
    if prefix.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    prefix.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(index: u32, title: &str) -> WorkUnitRef {
        WorkUnitRef {
            index,
            title: title.to_string(),
            source_url: format!("https://example.com/book/1/{index}.html"),
        }
    }

    #[test]
    fn test_sanitize_replaces_each_illegal_char() {
        assert_eq!(sanitize_title(r#"a<b>c:d"e/f\g|h?i*j"#), "a_b_c_d_e_f_g_h_i_j");
        assert_eq!(sanitize_title("  第一章 风起  "), "第一章 风起");
    }

    #[test]
    fn test_unit_file_name_is_zero_padded() {
        assert_eq!(unit_file_name(7, "Rain/Snow"), "0007_Rain_Snow.txt");
        assert_eq!(unit_file_name(12345, "Long"), "12345_Long.txt");
        assert_eq!(unit(3, "第三章").file_name(), "0003_第三章.txt");
    }

    #[test]
    fn test_parse_unit_index() {
        assert_eq!(parse_unit_index("0010_Ten.txt"), Some(10));
        assert_eq!(parse_unit_index("0002_Two_parts.txt"), Some(2));
        assert_eq!(parse_unit_index("Title_complete.txt"), None);
        assert_eq!(parse_unit_index("_x.txt"), None);
        assert_eq!(parse_unit_index("0003.txt"), None);
    }

    #[test]
    fn test_payload_render_header() {
        let payload = UnitPayload {
            index: 2,
            title: "The Road".to_string(),
            body: "It was cold.".to_string(),
        };
        assert_eq!(payload.render(), "Chapter 2 The Road\n\nIt was cold.");
    }

    #[test]
    fn test_descriptor_unit_lookup_and_dir() {
        let descriptor = WorkDescriptor {
            id: "42".to_string(),
            title: "Sword_Song".to_string(),
            units: vec![unit(1, "One"), unit(2, "Two")],
        };
        assert_eq!(descriptor.total_units(), 2);
        assert_eq!(descriptor.unit(2).map(|u| u.title.as_str()), Some("Two"));
        assert!(descriptor.unit(0).is_none());
        assert!(descriptor.unit(3).is_none());
        assert_eq!(
            descriptor.work_dir(Path::new("/out")),
            PathBuf::from("/out/42_Sword_Song")
        );
    }
}
