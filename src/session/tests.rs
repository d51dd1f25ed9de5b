use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use tempfile::tempdir;

use super::*;
use crate::bus::{HintCaptureListener, ListenerError, PathOpenListener};
use crate::store::SqliteGateway;

fn test_session() -> Session {
    Session::new(SqliteGateway::new(), ConnectionParams::in_memory())
}

fn script(lines: &[&str]) -> ScriptedLines {
    ScriptedLines::new(lines.iter().copied())
}

/// Wraps a real gateway and fails writes on demand.
struct FlakyGateway {
    inner: SqliteGateway,
    fail_writes: Arc<AtomicBool>,
    fail_hints: Arc<AtomicBool>,
    connects: Arc<AtomicUsize>,
    /// Reads fail with `NotConnected` until the second connect.
    drop_after_connect: bool,
}

impl FlakyGateway {
    fn new() -> Self {
        Self {
            inner: SqliteGateway::new(),
            fail_writes: Arc::new(AtomicBool::new(false)),
            fail_hints: Arc::new(AtomicBool::new(false)),
            connects: Arc::new(AtomicUsize::new(0)),
            drop_after_connect: false,
        }
    }

    fn check_writes(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(EditorError::Store("disk full".to_string()));
        }
        Ok(())
    }
}

impl PersistenceGateway for FlakyGateway {
    fn connect(&mut self, params: &ConnectionParams) -> Result<()> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.inner.connect(params)
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    fn resolve_id_by_name(&mut self, name: &str) -> Result<Option<DocumentId>> {
        if self.drop_after_connect && self.connects.load(Ordering::SeqCst) < 2 {
            return Err(EditorError::NotConnected);
        }
        self.inner.resolve_id_by_name(name)
    }

    fn fetch_content(&mut self, name: &str) -> Result<Option<String>> {
        if self.drop_after_connect && self.connects.load(Ordering::SeqCst) < 2 {
            return Err(EditorError::NotConnected);
        }
        self.inner.fetch_content(name)
    }

    fn list_names(&mut self) -> Result<Vec<String>> {
        self.inner.list_names()
    }

    fn insert_document(&mut self, name: &str, content: &str) -> Result<()> {
        self.check_writes()?;
        self.inner.insert_document(name, content)
    }

    fn update_document(&mut self, name: &str, content: &str) -> Result<()> {
        self.check_writes()?;
        self.inner.update_document(name, content)
    }

    fn insert_hint(&mut self, document_name: &str, text: &str) -> Result<()> {
        if self.fail_hints.load(Ordering::SeqCst) {
            return Err(EditorError::Store("hint table locked".to_string()));
        }
        self.inner.insert_hint(document_name, text)
    }

    fn fetch_hints_by_document_id(&mut self, id: DocumentId) -> Result<Vec<StoredHint>> {
        self.inner.fetch_hints_by_document_id(id)
    }

    fn delete_document(&mut self, id: DocumentId) -> Result<()> {
        self.inner.delete_document(id)
    }

    fn delete_all_documents(&mut self) -> Result<()> {
        self.inner.delete_all_documents()
    }
}

// --- open by name ---

#[test]
fn test_open_by_name_missing_reports_not_found() {
    let session = test_session();
    let err = session.open_by_name("notes").unwrap_err();
    assert!(matches!(err, EditorError::NotFound { ref name } if name == "notes"));
    assert!(session.document().is_none());
}

#[test]
fn test_open_by_name_sets_identity_from_store() {
    let session = test_session();
    session
        .create_document("notes", &mut script(&["hello", "/finish"]))
        .unwrap();
    let created_id = session.current_file_id();

    let other = session
        .create_document("other", &mut script(&["x", "/finish"]))
        .unwrap();
    assert_ne!(other.id, created_id);

    let doc = session.open_by_name("notes").unwrap();
    assert_eq!(doc.id, created_id);
    assert_eq!(session.current_file_id(), created_id);
    assert_eq!(session.content(), "hello");
}

#[test]
fn test_open_by_name_failure_keeps_current_document() {
    let session = test_session();
    session
        .create_document("notes", &mut script(&["body", "/finish"]))
        .unwrap();
    assert!(session.open_by_name("ghost").is_err());
    assert_eq!(session.document().unwrap().name, "notes");
}

// --- creation ---

#[test]
fn test_create_then_open_round_trips_lines() {
    let session = test_session();
    assert!(matches!(
        session.open_by_name("notes"),
        Err(EditorError::NotFound { .. })
    ));

    let created = session
        .create_document("notes", &mut script(&["hello", "world", "/finish"]))
        .unwrap();
    assert_eq!(created.content, "hello\nworld");
    assert!(created.id.is_some());

    let reopened = session.open_by_name("notes").unwrap();
    assert_eq!(reopened.content, "hello\nworld");
}

#[test]
fn test_create_treats_end_of_input_as_finish() {
    let session = test_session();
    let doc = session
        .create_document("notes", &mut script(&["only line"]))
        .unwrap();
    assert_eq!(doc.content, "only line");
}

#[test]
fn test_input_ending_after_hint_token_records_no_hint() {
    let session = test_session();
    let doc = session
        .create_document("notes", &mut script(&["body", "/hint"]))
        .unwrap();

    assert_eq!(doc.content, "body");
    assert!(session.pending_hints().is_empty());
    assert!(session.hints().unwrap().is_empty());
}

#[test]
fn test_create_rejects_empty_name() {
    let session = test_session();
    let mut input = script(&["x", "/finish"]);
    assert!(matches!(
        session.create_document("  ", &mut input),
        Err(EditorError::EmptyName)
    ));
    assert_eq!(input.remaining(), 2, "no input should be consumed");
}

#[test]
fn test_create_with_existing_name_updates_single_row() {
    let session = test_session();
    session
        .create_document("notes", &mut script(&["v1", "/finish"]))
        .unwrap();
    session
        .create_document("notes", &mut script(&["v2", "/finish"]))
        .unwrap();
    assert_eq!(session.list_documents().unwrap(), vec!["notes".to_string()]);
    assert_eq!(session.open_by_name("notes").unwrap().content, "v2");
}

#[test]
fn test_hints_are_flushed_in_capture_order() {
    let session = test_session();
    session
        .create_document(
            "notes",
            &mut script(&[
                "line one",
                "/hint",
                "first hint",
                "/HINT",
                "second hint",
                "line two",
                "/finish",
            ]),
        )
        .unwrap();

    assert_eq!(session.content(), "line one\nline two");
    assert!(session.pending_hints().is_empty());
    let texts: Vec<_> = session
        .hints()
        .unwrap()
        .into_iter()
        .map(|h| h.text)
        .collect();
    assert_eq!(texts, vec!["first hint", "second hint"]);
}

#[test]
fn test_hint_capture_listener_sees_ingested_hints() {
    let session = test_session();
    let listener = HintCaptureListener::new();
    let captured = listener.captured();
    session.subscribe(Box::new(listener));

    session
        .create_document("notes", &mut script(&["/hint", "check totals", "/finish"]))
        .unwrap();

    assert_eq!(captured.texts(), vec!["check totals"]);
}

#[test]
fn test_store_failure_keeps_buffer_and_pending_hints() {
    let gateway = FlakyGateway::new();
    let fail_writes = Arc::clone(&gateway.fail_writes);
    let session = Session::new(gateway, ConnectionParams::in_memory());
    fail_writes.store(true, Ordering::SeqCst);

    let err = session
        .create_document("notes", &mut script(&["draft", "/hint", "todo", "/finish"]))
        .unwrap_err();

    assert!(err.is_store_error());
    assert_eq!(session.content(), "draft");
    assert_eq!(session.current_file_id(), None);
    assert_eq!(session.pending_hints().len(), 1);

    // Retry after the store recovers.
    fail_writes.store(false, Ordering::SeqCst);
    session
        .enter_edit_mode(EditMode::Append, &mut script(&["/finish"]))
        .unwrap();
    assert!(session.current_file_id().is_some());
    assert!(session.pending_hints().is_empty());
    assert_eq!(session.hints().unwrap().len(), 1);
}

#[test]
fn test_failed_hint_flush_leaves_hints_pending() {
    let gateway = FlakyGateway::new();
    let fail_hints = Arc::clone(&gateway.fail_hints);
    let session = Session::new(gateway, ConnectionParams::in_memory());
    fail_hints.store(true, Ordering::SeqCst);

    let err = session
        .create_document("notes", &mut script(&["/hint", "a", "/hint", "b", "/finish"]))
        .unwrap_err();
    assert!(err.is_store_error());
    assert!(session.current_file_id().is_some(), "document row was saved");
    assert_eq!(session.pending_hints().len(), 2);
}

#[test]
fn test_not_connected_triggers_reconnect_and_retry() {
    let mut gateway = FlakyGateway::new();
    gateway.drop_after_connect = true;
    let connects = Arc::clone(&gateway.connects);
    let session = Session::new(gateway, ConnectionParams::in_memory());

    let err = session.open_by_name("notes").unwrap_err();
    assert!(matches!(err, EditorError::NotFound { .. }));
    assert_eq!(connects.load(Ordering::SeqCst), 2);
}

// --- edit mode ---

#[test]
fn test_edit_mode_requires_open_document() {
    let session = test_session();
    let err = session
        .enter_edit_mode(EditMode::Append, &mut script(&["x", "/finish"]))
        .unwrap_err();
    assert!(matches!(err, EditorError::NoDocumentOpen));
}

#[test]
fn test_edit_mode_append_adds_lines() {
    let session = test_session();
    session
        .create_document("notes", &mut script(&["hello", "world", "/finish"]))
        .unwrap();

    let doc = session
        .enter_edit_mode(EditMode::Append, &mut script(&["more", "/finish"]))
        .unwrap();

    assert_eq!(doc.content, "hello\nworld\nmore\n");
    assert_eq!(
        session.open_by_name("notes").unwrap().content,
        "hello\nworld\nmore\n"
    );
}

#[test]
fn test_edit_mode_replace_discards_old_content() {
    let session = test_session();
    session
        .create_document("notes", &mut script(&["old", "/finish"]))
        .unwrap();

    let doc = session
        .enter_edit_mode(EditMode::Replace, &mut script(&["new", "lines", "/finish"]))
        .unwrap();
    assert_eq!(doc.content, "new\nlines\n");
}

#[test]
fn test_edit_mode_replace_without_lines_keeps_content() {
    let session = test_session();
    session
        .create_document("notes", &mut script(&["old", "/finish"]))
        .unwrap();
    let doc = session
        .enter_edit_mode(EditMode::Replace, &mut script(&["/finish"]))
        .unwrap();
    assert_eq!(doc.content, "old");
}

#[test]
fn test_edit_mode_strips_bookmarks_from_stored_copy_only() {
    let session = test_session();
    session
        .create_document("notes", &mut script(&["intro", "/finish"]))
        .unwrap();
    session
        .enter_edit_mode(EditMode::Append, &mut script(&["/bookmark", "tail", "/finish"]))
        .unwrap();

    assert_eq!(session.content(), "intro\n/bookmark\ntail\n");
    assert_eq!(session.process_bookmarks().unwrap().len(), 1);

    let stored = session.open_by_name("notes").unwrap();
    assert_eq!(stored.content, "intro\n\ntail\n");
}

#[test]
fn test_edit_mode_answer_parsing() {
    assert_eq!(EditMode::from_answer("r"), EditMode::Replace);
    assert_eq!(EditMode::from_answer(" R "), EditMode::Replace);
    assert_eq!(EditMode::from_answer("a"), EditMode::Append);
    assert_eq!(EditMode::from_answer(""), EditMode::Append);
}

// --- open by path ---

#[test]
fn test_open_by_path_creates_row_from_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("journal.txt");
    std::fs::write(&path, "day one\n").unwrap();

    let session = test_session();
    let doc = session.open_by_path(&path).unwrap();

    assert_eq!(doc.name, "journal");
    assert_eq!(doc.content, "day one\n");
    assert_eq!(doc.source_path.as_deref(), Some(path.as_path()));
    assert_eq!(session.list_documents().unwrap(), vec!["journal".to_string()]);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "day one\n");
}

#[test]
fn test_open_by_path_prefers_stored_copy_and_overwrites_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("journal.md");
    std::fs::write(&path, "local edits").unwrap();

    let session = test_session();
    session
        .create_document("journal", &mut script(&["stored", "/finish"]))
        .unwrap();

    let doc = session.open_by_path(&path).unwrap();
    assert_eq!(doc.content, "stored");
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "stored");
}

#[test]
fn test_open_by_path_missing_file_leaves_state_unchanged() {
    let dir = tempdir().unwrap();
    let session = test_session();
    session
        .create_document("notes", &mut script(&["keep", "/finish"]))
        .unwrap();

    let err = session
        .open_by_path(&dir.path().join("absent.txt"))
        .unwrap_err();
    assert!(matches!(err, EditorError::FileAccess { .. }));
    assert_eq!(session.document().unwrap().name, "notes");
    assert_eq!(session.content(), "keep");
}

#[test]
fn test_open_by_path_within_expired_deadline_changes_nothing() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("queued.txt");
    std::fs::write(&path, "queued").unwrap();
    let session = test_session();

    let err = session
        .open_by_path_within(&path, Deadline::after(Duration::ZERO))
        .unwrap_err();

    assert!(matches!(err, EditorError::Timeout(_)));
    assert!(session.document().is_none());
    assert!(session.list_documents().unwrap().is_empty());
}

#[test]
fn test_open_by_path_within_deadline_opens_normally() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("prompt.txt");
    std::fs::write(&path, "in time").unwrap();
    let session = test_session();

    let doc = session
        .open_by_path_within(&path, Deadline::after(Duration::from_secs(30)))
        .unwrap();

    assert_eq!(doc.name, "prompt");
    assert_eq!(session.content(), "in time");
}

#[test]
fn test_edit_mode_writes_back_to_source_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("todo.txt");
    std::fs::write(&path, "buy milk\n").unwrap();

    let session = test_session();
    session.open_by_path(&path).unwrap();
    session
        .enter_edit_mode(EditMode::Append, &mut script(&["/bookmark", "call bob", "/finish"]))
        .unwrap();

    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "buy milk\n/bookmark\ncall bob\n"
    );
    assert_eq!(
        session.open_by_name("todo").unwrap().content,
        "buy milk\n\ncall bob\n"
    );
}

#[test]
fn test_request_path_goes_through_path_open_listener() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ideas.txt");
    std::fs::write(&path, "spark").unwrap();

    let session = test_session();
    let missing = session.request_path(&path).unwrap_err();
    assert!(
        matches!(missing, EditorError::FileAccess { .. }),
        "nobody listens yet"
    );

    session.subscribe(Box::new(PathOpenListener));
    let doc = session.request_path(&path).unwrap();
    assert_eq!(doc.name, "ideas");

    let err = session
        .request_path(&dir.path().join("nope.txt"))
        .unwrap_err();
    assert!(matches!(err, EditorError::FileAccess { .. }));
    assert_eq!(session.document().unwrap().name, "ideas");
}

#[test]
fn test_concurrent_open_by_path_never_mixes_buffers() {
    let dir = tempdir().unwrap();
    let first = dir.path().join("first.txt");
    let second = dir.path().join("second.txt");
    let first_body = "first\n".repeat(500);
    let second_body = "second\n".repeat(500);
    std::fs::write(&first, &first_body).unwrap();
    std::fs::write(&second, &second_body).unwrap();

    let session = test_session().into_handle();
    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = [first, second]
        .into_iter()
        .map(|path| {
            let session = Arc::clone(&session);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                session.open_by_path(&path).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let content = session.content();
    assert!(content == first_body || content == second_body);
    let doc = session.document().unwrap();
    let expected = if doc.name == "first" {
        &first_body
    } else {
        &second_body
    };
    assert_eq!(&content, expected);
}

// --- go to line ---

#[test]
fn test_go_to_line_bounds() {
    let session = test_session();
    session
        .create_document("notes", &mut script(&["a", "b", "c", "/finish"]))
        .unwrap();

    for bad in [0, 4] {
        let err = session.go_to_line(bad).unwrap_err();
        assert!(matches!(err, EditorError::InvalidLineNumber { .. }));
    }
    assert_eq!(session.content(), "a\nb\nc");

    let rendered = session.go_to_line(3).unwrap();
    assert_eq!(rendered, "a\nb\n\x1b[93mc\x1b[0m");
}

#[test]
fn test_go_to_line_without_document_is_invalid() {
    let session = test_session();
    assert!(matches!(
        session.go_to_line(1),
        Err(EditorError::InvalidLineNumber { .. })
    ));
}

#[test]
fn test_parse_line_number_rejects_non_positive_input() {
    assert_eq!(parse_line_number(" 12 ").unwrap(), 12);
    for bad in ["0", "-1", "abc", "", "1.5"] {
        assert!(matches!(
            parse_line_number(bad),
            Err(EditorError::InvalidLineNumber { .. })
        ));
    }
}

// --- bookmarks, hints, delete ---

#[test]
fn test_process_bookmarks_requires_document() {
    let session = test_session();
    assert!(matches!(
        session.process_bookmarks(),
        Err(EditorError::NoDocumentOpen)
    ));
}

#[test]
fn test_process_bookmarks_reports_marker_lines() {
    let session = test_session();
    session
        .create_document(
            "notes",
            &mut script(&["a", "/bookmark", "c", "/bookmark", "/finish"]),
        )
        .unwrap();

    let marks = session.process_bookmarks().unwrap();
    let found: Vec<_> = marks
        .iter()
        .map(|m| (m.line_number, m.text.as_str()))
        .collect();
    assert_eq!(found, vec![(1, "a"), (3, "c")]);
}

#[test]
fn test_hints_require_persisted_document() {
    let session = test_session();
    assert!(matches!(session.hints(), Err(EditorError::NoDocumentOpen)));
}

#[test]
fn test_delete_current_document_keeps_buffer_as_draft() {
    let session = test_session();
    session
        .create_document("notes", &mut script(&["body", "/finish"]))
        .unwrap();

    session.delete_document("notes").unwrap();

    assert_eq!(session.current_file_id(), None);
    assert_eq!(session.content(), "body");
    assert!(session.list_documents().unwrap().is_empty());
    assert!(matches!(
        session.delete_document("notes"),
        Err(EditorError::NotFound { .. })
    ));
}

#[test]
fn test_delete_all_documents_clears_store_and_keeps_buffer() {
    let session = test_session();
    session
        .create_document("a", &mut script(&["/hint", "gone", "/finish"]))
        .unwrap();
    session
        .create_document("b", &mut script(&["kept", "/finish"]))
        .unwrap();

    session.delete_all_documents().unwrap();

    assert!(session.list_documents().unwrap().is_empty());
    assert_eq!(session.current_file_id(), None);
    assert_eq!(session.content(), "kept");
}

// --- notifications ---

struct Grumpy;

impl Listener for Grumpy {
    fn name(&self) -> &str {
        "grumpy"
    }

    fn handle(
        &mut self,
        _event: &SessionEvent,
    ) -> std::result::Result<Option<Reaction>, ListenerError> {
        Err(ListenerError("refused".to_string()))
    }
}

#[test]
fn test_listener_failure_does_not_fail_operation() {
    let session = test_session();
    session.subscribe(Box::new(Grumpy));
    let listener = HintCaptureListener::new();
    let captured = listener.captured();
    session.subscribe(Box::new(listener));

    session
        .create_document("notes", &mut script(&["/hint", "still captured", "/finish"]))
        .unwrap();

    assert_eq!(captured.texts(), vec!["still captured"]);
    let failures = session.take_listener_failures();
    assert!(!failures.is_empty());
    assert!(failures.iter().all(|f| f.listener == "grumpy"));
    assert!(session.take_listener_failures().is_empty());
}

#[test]
fn test_capabilities_expand_snippets_and_run_macros() {
    use crate::capability::{MacroRunner, SnippetExpander};

    struct Table;
    impl SnippetExpander for Table {
        fn expand(&self, line: &str) -> Option<String> {
            (line == "!table").then(|| "<table></table>".to_string())
        }
    }

    struct Upper;
    impl MacroRunner for Upper {
        fn run(&self, content: &str) -> Option<String> {
            Some(content.to_uppercase())
        }
    }

    let session = test_session().with_capabilities(
        Capabilities::default()
            .with_snippets(Box::new(Table))
            .with_macros(Box::new(Upper)),
    );
    let doc = session
        .create_document("page", &mut script(&["!table", "body", "/finish"]))
        .unwrap();
    assert_eq!(doc.content, "<TABLE></TABLE>\nBODY");
}
