use rusqlite::{Connection, OptionalExtension, params};

use super::{ConnectionParams, PersistenceGateway, StoredHint, require_id};
use crate::document::DocumentId;
use crate::error::{EditorError, Result};

const SCHEMA: &str = r"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS documents (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      name TEXT NOT NULL UNIQUE,
      content TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS hints (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      text TEXT NOT NULL,
      document_id INTEGER NOT NULL REFERENCES documents(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS hints_by_document ON hints(document_id);
";

/// Gateway backed by a SQLite database file.
///
/// The tables are created on connect if they do not exist yet; there is no
/// migration history.
#[derive(Debug, Default)]
pub struct SqliteGateway {
    conn: Option<Connection>,
}

impl SqliteGateway {
    pub const fn new() -> Self {
        Self { conn: None }
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(EditorError::NotConnected)
    }
}

impl PersistenceGateway for SqliteGateway {
    fn connect(&mut self, params: &ConnectionParams) -> Result<()> {
        let conn = Connection::open(&params.database)?;
        conn.execute_batch(SCHEMA)?;
        tracing::info!(
            database = %params.database.display(),
            host = %params.host,
            dbname = %params.dbname,
            user = %params.user,
            "connected to document store"
        );
        self.conn = Some(conn);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    fn resolve_id_by_name(&mut self, name: &str) -> Result<Option<DocumentId>> {
        let id = self
            .conn()?
            .query_row(
                "SELECT id FROM documents WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn fetch_content(&mut self, name: &str) -> Result<Option<String>> {
        let content = self
            .conn()?
            .query_row(
                "SELECT content FROM documents WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(content)
    }

    fn list_names(&mut self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT name FROM documents ORDER BY name ASC")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    fn insert_document(&mut self, name: &str, content: &str) -> Result<()> {
        self.conn()?.execute(
            "INSERT INTO documents (name, content) VALUES (?1, ?2)",
            params![name, content],
        )?;
        Ok(())
    }

    fn update_document(&mut self, name: &str, content: &str) -> Result<()> {
        let id = require_id(self, name)?;
        self.conn()?.execute(
            "UPDATE documents SET content = ?1 WHERE id = ?2",
            params![content, id],
        )?;
        Ok(())
    }

    fn insert_hint(&mut self, document_name: &str, text: &str) -> Result<()> {
        let id = require_id(self, document_name)?;
        self.conn()?.execute(
            "INSERT INTO hints (text, document_id) VALUES (?1, ?2)",
            params![text, id],
        )?;
        Ok(())
    }

    fn fetch_hints_by_document_id(&mut self, id: DocumentId) -> Result<Vec<StoredHint>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT id, text FROM hints WHERE document_id = ?1 ORDER BY id ASC")?;
        let hints = stmt
            .query_map(params![id], |row| {
                Ok(StoredHint {
                    id: row.get(0)?,
                    text: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(hints)
    }

    fn delete_document(&mut self, id: DocumentId) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM hints WHERE document_id = ?1", params![id])?;
        conn.execute("DELETE FROM documents WHERE id = ?1", params![id])?;
        Ok(())
    }

    fn delete_all_documents(&mut self) -> Result<()> {
        self.conn()?
            .execute_batch("DELETE FROM hints; DELETE FROM documents;")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected() -> SqliteGateway {
        let mut gateway = SqliteGateway::new();
        gateway.connect(&ConnectionParams::in_memory()).unwrap();
        gateway
    }

    #[test]
    fn test_operations_fail_before_connect() {
        let mut gateway = SqliteGateway::new();
        assert!(!gateway.is_connected());
        assert!(matches!(
            gateway.list_names(),
            Err(EditorError::NotConnected)
        ));
        assert!(matches!(
            gateway.resolve_id_by_name("notes"),
            Err(EditorError::NotConnected)
        ));
    }

    #[test]
    fn test_insert_then_fetch_content_and_id() {
        let mut gateway = connected();
        gateway.insert_document("notes", "hello\nworld").unwrap();

        assert_eq!(
            gateway.fetch_content("notes").unwrap(),
            Some("hello\nworld".to_string())
        );
        assert!(gateway.resolve_id_by_name("notes").unwrap().is_some());
        assert_eq!(gateway.fetch_content("missing").unwrap(), None);
        assert_eq!(gateway.resolve_id_by_name("missing").unwrap(), None);
    }

    #[test]
    fn test_duplicate_name_is_rejected() {
        let mut gateway = connected();
        gateway.insert_document("notes", "a").unwrap();
        let err = gateway.insert_document("notes", "b").unwrap_err();
        assert!(err.is_store_error());
    }

    #[test]
    fn test_update_requires_existing_row() {
        let mut gateway = connected();
        assert!(matches!(
            gateway.update_document("ghost", "x"),
            Err(EditorError::NotFound { .. })
        ));
    }

    #[test]
    fn test_update_twice_is_idempotent() {
        let mut gateway = connected();
        gateway.insert_document("notes", "old").unwrap();
        gateway.update_document("notes", "new").unwrap();
        let once = gateway.fetch_content("notes").unwrap();
        gateway.update_document("notes", "new").unwrap();
        assert_eq!(gateway.fetch_content("notes").unwrap(), once);
        assert_eq!(gateway.list_names().unwrap(), vec!["notes".to_string()]);
    }

    #[test]
    fn test_upsert_keeps_one_row_per_name() {
        let mut gateway = connected();
        gateway.upsert_document("notes", "first").unwrap();
        let id = gateway.resolve_id_by_name("notes").unwrap();
        gateway.upsert_document("notes", "second").unwrap();

        assert_eq!(gateway.resolve_id_by_name("notes").unwrap(), id);
        assert_eq!(
            gateway.fetch_content("notes").unwrap(),
            Some("second".to_string())
        );
        assert_eq!(gateway.list_names().unwrap().len(), 1);
    }

    #[test]
    fn test_list_names_is_ordered_by_name() {
        let mut gateway = connected();
        for name in ["zeta", "alpha", "mid"] {
            gateway.insert_document(name, "").unwrap();
        }
        assert_eq!(
            gateway.list_names().unwrap(),
            vec!["alpha".to_string(), "mid".to_string(), "zeta".to_string()]
        );
    }

    #[test]
    fn test_hints_come_back_in_insertion_order() {
        let mut gateway = connected();
        gateway.insert_document("notes", "").unwrap();
        for text in ["first", "second", "third"] {
            gateway.insert_hint("notes", text).unwrap();
        }
        let id = gateway.resolve_id_by_name("notes").unwrap().unwrap();
        let texts: Vec<_> = gateway
            .fetch_hints_by_document_id(id)
            .unwrap()
            .into_iter()
            .map(|h| h.text)
            .collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_hint_requires_resolvable_document() {
        let mut gateway = connected();
        assert!(matches!(
            gateway.insert_hint("ghost", "text"),
            Err(EditorError::NotFound { .. })
        ));
    }

    #[test]
    fn test_delete_document_removes_row_and_hints() {
        let mut gateway = connected();
        gateway.insert_document("notes", "body").unwrap();
        gateway.insert_hint("notes", "remember").unwrap();
        let id = gateway.resolve_id_by_name("notes").unwrap().unwrap();

        gateway.delete_document(id).unwrap();

        assert_eq!(gateway.resolve_id_by_name("notes").unwrap(), None);
        assert!(gateway.fetch_hints_by_document_id(id).unwrap().is_empty());
    }

    #[test]
    fn test_delete_all_documents_empties_store() {
        let mut gateway = connected();
        gateway.insert_document("a", "").unwrap();
        gateway.insert_document("b", "").unwrap();
        gateway.delete_all_documents().unwrap();
        assert!(gateway.list_names().unwrap().is_empty());
    }

    #[test]
    fn test_file_backed_store_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let params = ConnectionParams {
            database: dir.path().join("docs.db"),
            ..ConnectionParams::default()
        };

        let mut first = SqliteGateway::new();
        first.connect(&params).unwrap();
        first.insert_document("notes", "kept").unwrap();
        drop(first);

        let mut second = SqliteGateway::new();
        second.connect(&params).unwrap();
        assert_eq!(
            second.fetch_content("notes").unwrap(),
            Some("kept".to_string())
        );
    }
}
