// Only allow lints that are either transitive-dependency noise or
// genuinely opinionated style choices that don't indicate real issues.
#![allow(
    // Transitive dependency version mismatches we can't control
    clippy::multiple_crate_versions,
    // module_name_repetitions is pure style preference (e.g. store::StoredHint)
    clippy::module_name_repetitions
)]

//! # Tabula
//!
//! A line-oriented text editor whose documents live in a relational store.
//!
//! Tabula keeps one editing session per process:
//! - Documents are created and edited line by line at the console
//! - Hints captured while typing are stored alongside the document
//! - `/bookmark` markers can be listed and lines jumped to
//! - Files on disk can be opened locally or through a small HTTP endpoint
//!
//! ## Architecture
//!
//! All session state sits behind one lock in [`session::Session`]. The
//! console loop and the remote endpoint both go through it, and side
//! effects (hint echo, logging, opening requested paths) are driven by
//! listeners on the [`bus::NotificationBus`].
//!
//! ## Modules
//!
//! - [`app`]: Console command loop and command table
//! - [`session`]: Session state and editor operations
//! - [`store`]: Persistence gateway and its SQLite implementation
//! - [`bus`]: Notification bus and built-in listeners
//! - [`document`]: Document model and line helpers
//! - [`capability`]: Highlighter, macro and snippet extension points
//! - [`highlight`]: Syntax highlighting
//! - [`server`]: Remote "open by path" endpoint
//! - [`config`]: Layered configuration

pub mod app;
pub mod bus;
pub mod capability;
pub mod config;
pub mod document;
pub mod error;
pub mod highlight;
pub mod server;
pub mod session;
pub mod store;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::app::{App, StdConsole};
    pub use crate::document::Document;
    pub use crate::error::EditorError;
    pub use crate::session::{Session, SessionHandle};
    pub use crate::store::{ConnectionParams, SqliteGateway};
}
