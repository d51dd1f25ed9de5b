//! The editor session: single authority over which document is open and
//! what it contains.
//!
//! All state lives behind one exclusive lock. Every externally invocable
//! operation holds that lock for its whole duration, so the console loop and
//! the remote listener never interleave buffer, identity, pending-hint, or
//! store-connection changes.
//!
//! The buffer is the authoritative draft; the store holds the durable
//! snapshot written at save points (end of creation, end of edit mode). A
//! store failure never discards the buffer.

mod ingest;

pub use ingest::{
    FINISH_TOKEN, HINT_TOKEN, IngestLine, LinePrompt, LineSource, ScriptedLines, classify,
};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::bus::{Listener, ListenerFailure, ListenerId, NotificationBus, Reaction, SessionEvent};
use crate::capability::Capabilities;
use crate::document::{
    Bookmark, Document, DocumentId, Hint, name_from_path, strip_bookmark_markers,
};
use crate::error::{EditorError, Result};
use crate::highlight::render_with_focus;
use crate::store::{ConnectionParams, PersistenceGateway, StoredHint, require_id};

/// Shared handle to a session, given to the console loop and to any
/// concurrent caller.
pub type SessionHandle = Arc<Session>;

/// Point in time after which a queued call gives up instead of running.
///
/// Checked once the session lock is held and again before the first store
/// write, so a caller that already reported a timeout never sees the
/// operation happen later.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Option<Instant>,
    budget: Duration,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now().checked_add(budget),
            budget,
        }
    }

    pub const fn budget(&self) -> Duration {
        self.budget
    }

    fn check(&self) -> Result<()> {
        match self.at {
            Some(at) if Instant::now() >= at => Err(EditorError::Timeout(self.budget)),
            _ => Ok(()),
        }
    }
}

fn check_deadline(deadline: Option<&Deadline>) -> Result<()> {
    deadline.map_or(Ok(()), Deadline::check)
}

/// How edit mode combines ingested lines with the existing content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMode {
    Replace,
    Append,
}

impl EditMode {
    /// `r`/`R` selects replace; any other answer appends.
    pub fn from_answer(answer: &str) -> Self {
        if answer.trim().eq_ignore_ascii_case("r") {
            Self::Replace
        } else {
            Self::Append
        }
    }
}

pub struct Session {
    state: Mutex<SessionState>,
}

struct SessionState {
    document: Option<Document>,
    pending_hints: Vec<Hint>,
    next_hint_id: i64,
    gateway: Box<dyn PersistenceGateway>,
    params: ConnectionParams,
    bus: NotificationBus,
    capabilities: Capabilities,
    listener_failures: Vec<ListenerFailure>,
    reacting: bool,
}

impl Session {
    pub fn new(gateway: impl PersistenceGateway + 'static, params: ConnectionParams) -> Self {
        Self {
            state: Mutex::new(SessionState {
                document: None,
                pending_hints: Vec::new(),
                next_hint_id: 0,
                gateway: Box::new(gateway),
                params,
                bus: NotificationBus::new(),
                capabilities: Capabilities::default(),
                listener_failures: Vec::new(),
                reacting: false,
            }),
        }
    }

    #[must_use]
    pub fn with_capabilities(self, capabilities: Capabilities) -> Self {
        self.lock().capabilities = capabilities;
        self
    }

    pub fn into_handle(self) -> SessionHandle {
        Arc::new(self)
    }

    // Operations leave the state consistent before each fallible step, so a
    // panic in one caller does not make the state unusable for the next.
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self, listener: Box<dyn Listener>) -> ListenerId {
        self.lock().bus.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.lock().bus.unsubscribe(id)
    }

    /// Publish an event from outside the session.
    pub fn publish(&self, event: &SessionEvent) {
        self.lock().notify(event);
    }

    /// Listener failures recorded since the last call.
    pub fn take_listener_failures(&self) -> Vec<ListenerFailure> {
        std::mem::take(&mut self.lock().listener_failures)
    }

    /// Snapshot of the current document.
    pub fn document(&self) -> Option<Document> {
        self.lock().document.clone()
    }

    /// Mirrors the current document's id once it is known.
    pub fn current_file_id(&self) -> Option<DocumentId> {
        self.lock().document.as_ref().and_then(|doc| doc.id)
    }

    /// The buffer; empty when no document is open.
    pub fn content(&self) -> String {
        self.lock()
            .document
            .as_ref()
            .map(|doc| doc.content.clone())
            .unwrap_or_default()
    }

    /// Hints captured but not yet written to the store.
    pub fn pending_hints(&self) -> Vec<Hint> {
        self.lock().pending_hints.clone()
    }

    /// Load a stored document by name.
    ///
    /// # Errors
    /// `NotFound` when the store has no such document; the current document
    /// is left untouched in that case.
    pub fn open_by_name(&self, name: &str) -> Result<Document> {
        self.lock().open_by_name(name)
    }

    /// Open a local file, registering it in the store under its base name.
    ///
    /// If the store already has a document with that name, the stored copy
    /// wins and is written back over the local file.
    ///
    /// # Errors
    /// `FileAccess` if the file cannot be read or written; the session is
    /// unchanged in that case.
    pub fn open_by_path(&self, path: &Path) -> Result<Document> {
        self.lock().open_by_path(path, None)
    }

    /// [`open_by_path`](Self::open_by_path) for callers that stop waiting
    /// at `deadline`.
    ///
    /// # Errors
    /// `Timeout` if the deadline passes before anything was changed; the
    /// session and the store are then left as they were.
    pub fn open_by_path_within(&self, path: &Path, deadline: Deadline) -> Result<Document> {
        let mut state = self.lock();
        deadline.check()?;
        state.open_by_path(path, Some(&deadline))
    }

    /// Announce a path on the bus and open it if a listener claims it.
    ///
    /// # Errors
    /// `FileAccess` (not found) when no listener asked for the path to be
    /// opened, otherwise whatever opening the path failed with.
    pub fn request_path(&self, path: &Path) -> Result<Document> {
        self.lock().request_path(path)
    }

    /// Ingest a new document from `input` and persist it under `name`.
    pub fn create_document(&self, name: &str, input: &mut dyn LineSource) -> Result<Document> {
        self.lock().create_document(name, input)
    }

    /// Ingest lines into the current document and save it.
    ///
    /// # Errors
    /// `NoDocumentOpen` when nothing is open. Store and file failures are
    /// reported after the buffer has been updated.
    pub fn enter_edit_mode(&self, mode: EditMode, input: &mut dyn LineSource) -> Result<Document> {
        self.lock().enter_edit_mode(mode, input)
    }

    /// Render the buffer with 1-based line `number` set apart.
    ///
    /// # Errors
    /// `InvalidLineNumber` when `number` is outside `1..=line_count`.
    pub fn go_to_line(&self, number: usize) -> Result<String> {
        self.lock().go_to_line(number)
    }

    /// Scan the buffer for bookmark markers.
    pub fn process_bookmarks(&self) -> Result<Vec<Bookmark>> {
        let state = self.lock();
        let doc = state.document.as_ref().ok_or(EditorError::NoDocumentOpen)?;
        Ok(doc.bookmarks())
    }

    /// Stored document names, ordered by name.
    pub fn list_documents(&self) -> Result<Vec<String>> {
        self.lock().with_store(|gateway| gateway.list_names())
    }

    /// Stored hints of the current document.
    pub fn hints(&self) -> Result<Vec<StoredHint>> {
        let mut state = self.lock();
        let id = state
            .document
            .as_ref()
            .and_then(|doc| doc.id)
            .ok_or(EditorError::NoDocumentOpen)?;
        state.with_store(|gateway| gateway.fetch_hints_by_document_id(id))
    }

    /// The buffer rendered through the configured highlighter.
    pub fn display_content(&self) -> String {
        let state = self.lock();
        let content = state
            .document
            .as_ref()
            .map_or("", |doc| doc.content.as_str());
        state.capabilities.highlighter.highlight(content)
    }

    /// Delete a stored document and its hints.
    ///
    /// Deleting the current document keeps its buffer as an unsaved draft.
    pub fn delete_document(&self, name: &str) -> Result<()> {
        self.lock().delete_document(name)
    }

    /// Delete every stored document and hint. The buffer is kept as an
    /// unsaved draft.
    pub fn delete_all_documents(&self) -> Result<()> {
        let mut state = self.lock();
        state.with_store(|gateway| gateway.delete_all_documents())?;
        if let Some(doc) = state.document.as_mut() {
            doc.id = None;
        }
        tracing::info!("all documents deleted");
        Ok(())
    }
}

/// Parse user input for go-to-line.
///
/// # Errors
/// `InvalidLineNumber` when `input` is not a positive integer.
pub fn parse_line_number(input: &str) -> Result<usize> {
    input
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| EditorError::InvalidLineNumber {
            input: input.trim().to_string(),
        })
}

impl SessionState {
    /// Run `op` against a connected gateway, connecting lazily.
    ///
    /// A `NotConnected` answer triggers one reconnect and retry.
    fn with_store<T>(
        &mut self,
        mut op: impl FnMut(&mut dyn PersistenceGateway) -> Result<T>,
    ) -> Result<T> {
        if !self.gateway.is_connected() {
            self.gateway.connect(&self.params)?;
        }
        match op(self.gateway.as_mut()) {
            Err(EditorError::NotConnected) => {
                tracing::warn!("store reported not connected, reconnecting");
                self.gateway.connect(&self.params)?;
                op(self.gateway.as_mut())
            }
            other => other,
        }
    }

    fn notify(&mut self, event: &SessionEvent) {
        let report = self.bus.publish(event);
        self.listener_failures.extend(report.failures);
        if self.reacting {
            return;
        }
        self.reacting = true;
        for reaction in report.reactions {
            self.run_reaction(reaction);
        }
        self.reacting = false;
    }

    fn run_reaction(&mut self, reaction: Reaction) {
        match reaction {
            Reaction::OpenPath(path) => {
                if let Err(err) = self.open_by_path(&path, None) {
                    tracing::warn!(
                        path = %path.display(),
                        error = %err,
                        "open requested by listener failed"
                    );
                }
            }
        }
    }

    fn set_document(&mut self, document: Document) {
        let same = self
            .document
            .as_ref()
            .is_some_and(|current| current.name == document.name);
        if !same && !self.pending_hints.is_empty() {
            tracing::warn!(
                dropped = self.pending_hints.len(),
                "discarding unsaved hints of the previous document"
            );
            self.pending_hints.clear();
        }
        self.document = Some(document);
    }

    fn open_by_name(&mut self, name: &str) -> Result<Document> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EditorError::EmptyName);
        }
        let (id, content) = self.with_store(|gateway| {
            let content = gateway
                .fetch_content(name)?
                .ok_or_else(|| EditorError::not_found(name))?;
            Ok((require_id(gateway, name)?, content))
        })?;

        let document = Document::stored(id, name, content);
        self.set_document(document.clone());
        tracing::info!(name, id, "document opened");
        self.notify(&SessionEvent::DocumentOpened {
            name: name.to_string(),
            id: Some(id),
        });
        Ok(document)
    }

    fn open_by_path(&mut self, path: &Path, deadline: Option<&Deadline>) -> Result<Document> {
        let local = fs::read_to_string(path).map_err(|err| EditorError::file_access(path, err))?;
        let name = name_from_path(path).ok_or_else(|| {
            EditorError::file_access(
                path,
                io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
            )
        })?;

        let (id, content) = self.with_store(|gateway| match gateway.resolve_id_by_name(&name)? {
            None => {
                check_deadline(deadline)?;
                gateway.insert_document(&name, &local)?;
                Ok((require_id(gateway, &name)?, local.clone()))
            }
            Some(id) => {
                let stored = gateway
                    .fetch_content(&name)?
                    .ok_or_else(|| EditorError::not_found(&name))?;
                check_deadline(deadline)?;
                Ok((id, stored))
            }
        })?;

        // The stored copy replaces the local file when they differ.
        if content != local {
            tracing::warn!(
                path = %path.display(),
                name = %name,
                "overwriting local file with the stored copy"
            );
            fs::write(path, &content).map_err(|err| EditorError::file_access(path, err))?;
        }

        let document = Document::stored(id, &name, content).with_source_path(path);
        self.set_document(document.clone());
        tracing::info!(name = %name, id, path = %path.display(), "document opened from path");
        self.notify(&SessionEvent::DocumentOpened {
            name,
            id: Some(id),
        });
        Ok(document)
    }

    fn request_path(&mut self, path: &Path) -> Result<Document> {
        let report = self.bus.publish(&SessionEvent::PathRequested {
            path: path.to_path_buf(),
        });
        self.listener_failures.extend(report.failures);

        let mut opened = None;
        for reaction in report.reactions {
            match reaction {
                Reaction::OpenPath(target) => opened = Some(self.open_by_path(&target, None)?),
            }
        }
        opened.ok_or_else(|| {
            EditorError::file_access(
                path,
                io::Error::new(io::ErrorKind::NotFound, "no such file"),
            )
        })
    }

    /// Read lines until the finish token or the end of input. Input that
    /// ends right after a hint token records no hint.
    ///
    /// Hints go to the pending list and are announced on the bus; every
    /// other line is returned, after snippet expansion.
    fn ingest(&mut self, input: &mut dyn LineSource) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = input.next_line(LinePrompt::Content) {
            match classify(&line) {
                IngestLine::Finish => break,
                IngestLine::Hint => {
                    let Some(text) = input.next_line(LinePrompt::HintText) else {
                        break;
                    };
                    self.next_hint_id += 1;
                    self.pending_hints.push(Hint {
                        id: self.next_hint_id,
                        text: text.clone(),
                    });
                    self.notify(&SessionEvent::HintAdded { text });
                }
                IngestLine::Content(content) => {
                    lines.push(self.capabilities.expand_line(content));
                }
            }
        }
        lines
    }

    fn create_document(&mut self, name: &str, input: &mut dyn LineSource) -> Result<Document> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(EditorError::EmptyName);
        }
        // Hints captured before this point belonged to whatever was open.
        if self.document.as_ref().is_some_and(|doc| doc.name != name) {
            self.pending_hints.clear();
        }

        let lines = self.ingest(input);
        let content = self.capabilities.run_macros(lines.join("\n"));
        self.document = Some(Document::draft(&name, content));

        self.save_current(false)?;
        tracing::info!(name = %name, "document created");
        self.document.clone().ok_or(EditorError::NoDocumentOpen)
    }

    fn enter_edit_mode(&mut self, mode: EditMode, input: &mut dyn LineSource) -> Result<Document> {
        let name = self
            .document
            .as_ref()
            .map(|doc| doc.name.clone())
            .ok_or(EditorError::NoDocumentOpen)?;
        self.notify(&SessionEvent::EditModeEntered { name: name.clone() });

        let lines = self.ingest(input);
        let previous = self
            .document
            .as_ref()
            .map(|doc| doc.content.clone())
            .unwrap_or_default();
        let mut content = match mode {
            EditMode::Replace if !lines.is_empty() => String::new(),
            _ => previous,
        };
        if !lines.is_empty() && !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        for line in &lines {
            content.push_str(line);
            content.push('\n');
        }
        let content = self.capabilities.run_macros(content);
        if let Some(doc) = self.document.as_mut() {
            doc.content = content;
        }
        self.notify(&SessionEvent::EditModeExited { name });

        let saved = self.save_current(true);
        let written = self.write_back_source();
        saved?;
        written?;
        self.document.clone().ok_or(EditorError::NoDocumentOpen)
    }

    /// Persist the current document and flush pending hints in capture order.
    ///
    /// Hints that could not be written stay pending for the next save.
    fn save_current(&mut self, strip_markers: bool) -> Result<()> {
        let doc = self.document.clone().ok_or(EditorError::NoDocumentOpen)?;
        let snapshot = if strip_markers {
            strip_bookmark_markers(&doc.content)
        } else {
            doc.content.clone()
        };

        let id = self.with_store(|gateway| {
            gateway.upsert_document(&doc.name, &snapshot)?;
            require_id(gateway, &doc.name)
        });
        let id = match id {
            Ok(id) => id,
            Err(err) => {
                tracing::warn!(name = %doc.name, error = %err, "save failed, buffer kept");
                return Err(err);
            }
        };
        if let Some(current) = self.document.as_mut() {
            current.id = Some(id);
        }

        let pending = self.pending_hints.clone();
        let mut flushed = 0;
        let mut outcome = Ok(());
        for hint in &pending {
            let inserted = self.with_store(|gateway| gateway.insert_hint(&doc.name, &hint.text));
            if let Err(err) = inserted {
                tracing::warn!(name = %doc.name, error = %err, "hint flush failed");
                outcome = Err(err);
                break;
            }
            flushed += 1;
        }
        self.pending_hints.drain(..flushed);

        tracing::info!(name = %doc.name, id, hints = flushed, "document saved");
        self.notify(&SessionEvent::DocumentSaved {
            name: doc.name.clone(),
        });
        outcome
    }

    fn write_back_source(&self) -> Result<()> {
        let Some(doc) = self.document.as_ref() else {
            return Ok(());
        };
        let Some(path) = doc.source_matches_name() else {
            return Ok(());
        };
        let path: PathBuf = path.to_path_buf();
        fs::write(&path, &doc.content).map_err(|err| EditorError::file_access(path, err))
    }

    fn go_to_line(&self, number: usize) -> Result<String> {
        let content = self
            .document
            .as_ref()
            .map_or("", |doc| doc.content.as_str());
        if number == 0 || number > crate::document::line_count(content) {
            return Err(EditorError::InvalidLineNumber {
                input: number.to_string(),
            });
        }
        Ok(render_with_focus(
            content,
            number,
            self.capabilities.highlighter.as_ref(),
        ))
    }

    fn delete_document(&mut self, name: &str) -> Result<()> {
        let name = name.trim();
        let id = self.with_store(|gateway| {
            let id = require_id(gateway, name)?;
            gateway.delete_document(id)?;
            Ok(id)
        })?;
        if let Some(doc) = self.document.as_mut()
            && doc.id == Some(id)
        {
            doc.id = None;
        }
        tracing::info!(name, id, "document deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests;
