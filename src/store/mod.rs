//! Persistence gateway: CRUD over the documents and hints tables.
//!
//! The session only talks to the [`PersistenceGateway`] trait. Connection is
//! lazy: the session calls [`PersistenceGateway::connect`] the first time it
//! needs the store and assumes the connection stays up afterwards.

mod sqlite;

pub use sqlite::SqliteGateway;

use std::fmt;
use std::path::PathBuf;

use crate::document::DocumentId;
use crate::error::{EditorError, Result};

/// Opaque bag of connection parameters handed to the gateway at connect time.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: String,
    /// Database file for file-backed stores; `:memory:` for a private
    /// in-memory database.
    pub database: PathBuf,
}

impl ConnectionParams {
    pub fn in_memory() -> Self {
        Self {
            database: PathBuf::from(":memory:"),
            ..Self::default()
        }
    }
}

impl Default for ConnectionParams {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "tabula".to_string(),
            user: "tabula".to_string(),
            password: String::new(),
            database: PathBuf::from("tabula.db"),
        }
    }
}

// Keep the password out of logs.
impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

/// A hint row as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredHint {
    pub id: i64,
    pub text: String,
}

/// Contract between the session and the relational store.
///
/// Every operation fails with [`EditorError::NotConnected`] before
/// [`connect`](Self::connect) succeeded.
pub trait PersistenceGateway: Send {
    fn connect(&mut self, params: &ConnectionParams) -> Result<()>;

    fn is_connected(&self) -> bool;

    fn resolve_id_by_name(&mut self, name: &str) -> Result<Option<DocumentId>>;

    fn fetch_content(&mut self, name: &str) -> Result<Option<String>>;

    /// All document names, ordered by name.
    fn list_names(&mut self) -> Result<Vec<String>>;

    fn insert_document(&mut self, name: &str, content: &str) -> Result<()>;

    /// Replace the content of an existing document.
    ///
    /// Fails with [`EditorError::NotFound`] if `name` does not resolve.
    fn update_document(&mut self, name: &str, content: &str) -> Result<()>;

    /// Attach a hint to an existing document.
    ///
    /// Fails with [`EditorError::NotFound`] if `document_name` does not resolve.
    fn insert_hint(&mut self, document_name: &str, text: &str) -> Result<()>;

    /// Hints of a document in insertion order.
    fn fetch_hints_by_document_id(&mut self, id: DocumentId) -> Result<Vec<StoredHint>>;

    /// Remove a document row and its hints.
    fn delete_document(&mut self, id: DocumentId) -> Result<()>;

    fn delete_all_documents(&mut self) -> Result<()>;

    /// Insert `name` if absent, otherwise update it.
    fn upsert_document(&mut self, name: &str, content: &str) -> Result<()> {
        if self.resolve_id_by_name(name)?.is_some() {
            self.update_document(name, content)
        } else {
            self.insert_document(name, content)
        }
    }
}

/// Resolve `name` or fail with `NotFound`.
pub(crate) fn require_id<G: PersistenceGateway + ?Sized>(
    gateway: &mut G,
    name: &str,
) -> Result<DocumentId> {
    gateway
        .resolve_id_by_name(name)?
        .ok_or_else(|| EditorError::not_found(name))
}
