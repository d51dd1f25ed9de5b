//! Error taxonomy shared by the session, the store, and the command surface.
//!
//! No variant is fatal: every failure is reported and control returns to
//! the command loop.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Result alias used across the library.
pub type Result<T, E = EditorError> = std::result::Result<T, E>;

/// Everything an editor operation can fail with.
#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    /// The gateway was used before a live connection existed.
    #[error("not connected to the document store")]
    NotConnected,

    /// A name has no corresponding row in the store.
    #[error("document '{name}' not found")]
    NotFound { name: String },

    /// An external file could not be read or written.
    #[error("cannot access {}: {source}", path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Go-to-line input was not a line of the current buffer.
    #[error("invalid line number: {input}")]
    InvalidLineNumber { input: String },

    #[error("no document is open, open or create one first")]
    NoDocumentOpen,

    /// Persistence requires a non-empty document name.
    #[error("document name must not be empty")]
    EmptyName,

    /// Any other persistence failure.
    #[error("store error: {0}")]
    Store(String),

    /// A bounded store round-trip did not finish in time.
    #[error("store error: timed out after {} ms", .0.as_millis())]
    Timeout(Duration),
}

impl EditorError {
    pub(crate) fn file_access(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::FileAccess {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Whether this error belongs to the store-failure category.
    pub const fn is_store_error(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Timeout(_))
    }
}

impl From<rusqlite::Error> for EditorError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Store(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_reported_as_store_error() {
        let err = EditorError::Timeout(Duration::from_millis(250));
        assert!(err.is_store_error());
        assert_eq!(err.to_string(), "store error: timed out after 250 ms");
    }

    #[test]
    fn test_file_access_message_names_path() {
        let err = EditorError::file_access(
            "/tmp/missing.txt",
            io::Error::new(io::ErrorKind::NotFound, "no such file"),
        );
        assert!(!err.is_store_error());
        assert!(err.to_string().contains("/tmp/missing.txt"));
    }

    #[test]
    fn test_sqlite_error_converts_to_store() {
        let err: EditorError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, EditorError::Store(_)));
    }
}
