//! Notification bus between the session and the features that react to it.
//!
//! Events are a closed set of variants. Listeners are called synchronously
//! in subscription order; a listener never calls back into the session
//! directly. Instead it may answer with a [`Reaction`] that the session runs
//! once delivery has finished.

mod listeners;

pub use listeners::{CapturedHints, HintCaptureListener, LogListener, PathOpenListener};

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;

use crate::document::DocumentId;

/// Something that happened in the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A hint was captured during edit ingestion.
    HintAdded { text: String },
    /// Someone asked for a filesystem path to be opened.
    PathRequested { path: PathBuf },
    DocumentOpened {
        name: String,
        id: Option<DocumentId>,
    },
    EditModeEntered { name: String },
    EditModeExited { name: String },
    DocumentSaved { name: String },
}

impl SessionEvent {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::HintAdded { .. } => "hint_added",
            Self::PathRequested { .. } => "path_requested",
            Self::DocumentOpened { .. } => "document_opened",
            Self::EditModeEntered { .. } => "edit_mode_entered",
            Self::EditModeExited { .. } => "edit_mode_exited",
            Self::DocumentSaved { .. } => "document_saved",
        }
    }
}

/// Follow-up work a listener asks the session to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    OpenPath(PathBuf),
}

/// Error returned by a listener; reported, never propagated to the publisher.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ListenerError(pub String);

/// A feature that reacts to session events.
pub trait Listener: Send {
    /// Short name used in logs and failure reports.
    fn name(&self) -> &str;

    fn handle(&mut self, event: &SessionEvent) -> Result<Option<Reaction>, ListenerError>;
}

/// Handle returned by [`NotificationBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// A listener that failed while handling an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerFailure {
    pub listener: String,
    pub message: String,
}

/// Outcome of delivering one event to every listener.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub reactions: Vec<Reaction>,
    pub failures: Vec<ListenerFailure>,
}

/// Ordered registry of listeners.
#[derive(Default)]
pub struct NotificationBus {
    listeners: Vec<(ListenerId, Box<dyn Listener>)>,
    next_id: u64,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener; registration order is delivery order.
    pub fn subscribe(&mut self, listener: Box<dyn Listener>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        tracing::debug!(listener = listener.name(), "listener subscribed");
        self.listeners.push((id, listener));
        id
    }

    /// Remove a listener. Returns false if it was not subscribed.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(candidate, _)| *candidate != id);
        self.listeners.len() != before
    }

    /// Deliver `event` to every listener, in order, before returning.
    ///
    /// A listener that errors or panics is recorded in the report and the
    /// remaining listeners still receive the event.
    pub fn publish(&mut self, event: &SessionEvent) -> PublishReport {
        let mut report = PublishReport::default();
        for (_, listener) in &mut self.listeners {
            let outcome = catch_unwind(AssertUnwindSafe(|| listener.handle(event)));
            report.delivered += 1;
            let message = match outcome {
                Ok(Ok(Some(reaction))) => {
                    report.reactions.push(reaction);
                    continue;
                }
                Ok(Ok(None)) => continue,
                Ok(Err(err)) => err.0,
                Err(panic) => panic_message(panic.as_ref()),
            };
            tracing::warn!(
                listener = listener.name(),
                event = event.kind(),
                error = %message,
                "listener failed"
            );
            report.failures.push(ListenerFailure {
                listener: listener.name().to_string(),
                message,
            });
        }
        report
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "listener panicked".to_string())
}
