//! Documents, hints, and bookmarks.
//!
//! This module handles:
//! - The in-memory `Document` (buffer plus identity)
//! - Hint records captured during editing
//! - Transient bookmarks derived from marker lines
//! - Deriving a document name from a filesystem path

use std::path::{Path, PathBuf};

/// Line marker that turns a line into a bookmark.
pub const BOOKMARK_MARKER: &str = "/bookmark";

/// Store-assigned identifier of a document row.
pub type DocumentId = i64;

/// The named unit of content the editor manages.
///
/// Created in memory without an id; gains one the first time it is
/// persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: Option<DocumentId>,
    pub name: String,
    pub content: String,
    /// Set when the document was opened from a local file.
    pub source_path: Option<PathBuf>,
}

impl Document {
    /// A fresh, never persisted document.
    pub fn draft(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            content: content.into(),
            source_path: None,
        }
    }

    /// A document loaded from the store.
    pub fn stored(id: DocumentId, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            name: name.into(),
            content: content.into(),
            source_path: None,
        }
    }

    #[must_use]
    pub fn with_source_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    pub fn bookmarks(&self) -> Vec<Bookmark> {
        scan_bookmarks(&self.content)
    }

    /// Whether the document was opened from `path`'s namesake file.
    pub(crate) fn source_matches_name(&self) -> Option<&Path> {
        let path = self.source_path.as_deref()?;
        (name_from_path(path).as_deref() == Some(self.name.as_str())).then_some(path)
    }
}

/// A short annotation attached to a document.
///
/// Before the owning document has an id, hints live in the session's
/// pending list with a locally assigned id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hint {
    pub id: i64,
    pub text: String,
}

/// A marker line found by a bookmark scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bookmark {
    /// Zero-based index of the marker line itself.
    pub line_number: usize,
    /// Text of the line just above the marker.
    pub text: String,
}

/// Number of lines in `content`; a trailing newline does not start a new line.
pub fn line_count(content: &str) -> usize {
    content.lines().count()
}

/// Whether a line is a bookmark marker (case-insensitive, trimmed).
pub fn is_bookmark_marker(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case(BOOKMARK_MARKER)
}

/// Find every bookmark marker in `content`.
///
/// Each match reports its own zero-based index together with the text of the
/// preceding line. A marker on the first line has no preceding line and
/// reports empty text.
pub fn scan_bookmarks(content: &str) -> Vec<Bookmark> {
    let lines: Vec<&str> = content.lines().collect();
    lines
        .iter()
        .enumerate()
        .filter(|(_, line)| is_bookmark_marker(line))
        .map(|(idx, _)| Bookmark {
            line_number: idx,
            text: idx
                .checked_sub(1)
                .and_then(|prev| lines.get(prev))
                .map_or_else(String::new, |s| (*s).to_string()),
        })
        .collect()
}

/// Remove every bookmark marker occurrence from `content`.
///
/// Used for the stored snapshot; the buffer keeps its markers.
pub fn strip_bookmark_markers(content: &str) -> String {
    content.replace(BOOKMARK_MARKER, "")
}

/// Derive a document name from a path: the base name without extension.
pub fn name_from_path(path: &Path) -> Option<String> {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .filter(|name| !name.is_empty())
}
