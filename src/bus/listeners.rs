use std::sync::{Arc, Mutex, PoisonError};

use super::{Listener, ListenerError, Reaction, SessionEvent};

/// Read side of a [`HintCaptureListener`], usable after the listener has
/// been handed to the bus.
#[derive(Debug, Clone, Default)]
pub struct CapturedHints(Arc<Mutex<Vec<String>>>);

impl CapturedHints {
    /// Hint texts in capture order.
    pub fn texts(&self) -> Vec<String> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drain everything captured so far.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn push(&self, text: String) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text);
    }
}

/// Buffers the text of every non-blank hint announced on the bus.
#[derive(Debug, Default)]
pub struct HintCaptureListener {
    captured: CapturedHints,
}

impl HintCaptureListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn captured(&self) -> CapturedHints {
        self.captured.clone()
    }
}

impl Listener for HintCaptureListener {
    fn name(&self) -> &str {
        "hint-capture"
    }

    fn handle(&mut self, event: &SessionEvent) -> Result<Option<Reaction>, ListenerError> {
        if let SessionEvent::HintAdded { text } = event
            && !text.trim().is_empty()
        {
            tracing::info!(hint = %text, "hint captured");
            self.captured.push(text.clone());
        }
        Ok(None)
    }
}

/// Asks the session to open a requested path when it exists on disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct PathOpenListener;

impl Listener for PathOpenListener {
    fn name(&self) -> &str {
        "path-open"
    }

    fn handle(&mut self, event: &SessionEvent) -> Result<Option<Reaction>, ListenerError> {
        match event {
            SessionEvent::PathRequested { path } if path.exists() => {
                Ok(Some(Reaction::OpenPath(path.clone())))
            }
            _ => Ok(None),
        }
    }
}

/// Logs every event at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogListener;

impl Listener for LogListener {
    fn name(&self) -> &str {
        "log"
    }

    fn handle(&mut self, event: &SessionEvent) -> Result<Option<Reaction>, ListenerError> {
        tracing::debug!(event = event.kind(), detail = ?event, "session event");
        Ok(None)
    }
}
