//! Command table: exact-match tokens bound to session operations.

use std::collections::HashMap;
use std::path::Path;

use super::App;
use super::console::{Console, ConsoleLines};
use crate::error::{EditorError, Result};
use crate::session::{EditMode, parse_line_number};

/// A command bound to the app; takes no arguments beyond the app itself and
/// prompts for anything else it needs.
pub type CommandFn<C> = fn(&mut App<C>) -> Result<()>;

/// Answer to the delete prompt that removes every stored file.
const DELETE_ALL: &str = "*";

pub struct CommandTable<C: Console> {
    entries: HashMap<String, CommandFn<C>>,
}

impl<C: Console> Default for CommandTable<C> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<C: Console> CommandTable<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The commands registered at session start.
    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        table.register("1", create_document);
        table.register("4", list_documents);
        table.register("5", open_by_name);
        table.register("bookmarks", process_bookmarks);
        table.register("goto", go_to_line);
        table.register("delete", delete_document);
        table
    }

    /// Bind `token`, replacing any previous binding.
    pub fn register(&mut self, token: impl Into<String>, command: CommandFn<C>) {
        self.entries.insert(token.into(), command);
    }

    /// Exact-match lookup.
    pub fn get(&self, token: &str) -> Option<CommandFn<C>> {
        self.entries.get(token).copied()
    }

    #[cfg(test)]
    fn contains(&self, token: &str) -> bool {
        self.entries.contains_key(token)
    }

    /// Registered tokens, sorted.
    #[cfg(test)]
    fn tokens(&self) -> Vec<&str> {
        let mut tokens: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        tokens.sort_unstable();
        tokens
    }
}

fn prompt<C: Console>(app: &mut App<C>, text: &str) -> String {
    app.console
        .read_line(text)
        .map(|line| line.trim().to_string())
        .unwrap_or_default()
}

pub(super) fn create_document<C: Console>(app: &mut App<C>) -> Result<()> {
    let name = prompt(app, "Enter the name of the new file: ");
    if name.is_empty() {
        return Err(EditorError::EmptyName);
    }
    app.console.print("Enter the content of the file. Enter '/finish' on a new line to finish:");
    let doc = app
        .session
        .create_document(&name, &mut ConsoleLines(&mut app.console))?;
    app.console.print(&format!(
        "File '{}' created and saved to the database successfully.",
        doc.name
    ));
    Ok(())
}

pub(super) fn list_documents<C: Console>(app: &mut App<C>) -> Result<()> {
    let names = app.session.list_documents()?;
    app.console.print("\nFile List:");
    if names.is_empty() {
        app.console.print("(no files)");
    }
    for name in names {
        app.console.print(&format!("File Name: {name}"));
    }
    Ok(())
}

pub(super) fn open_by_name<C: Console>(app: &mut App<C>) -> Result<()> {
    let name = prompt(app, "Enter the name of the file: ");
    let doc = app.session.open_by_name(&name)?;
    app.console.print(&format!("File '{}' opened successfully. Content:", doc.name));
    let rendered = app.session.display_content();
    app.console.print(&rendered);
    Ok(())
}

pub(super) fn process_bookmarks<C: Console>(app: &mut App<C>) -> Result<()> {
    let marks = app.session.process_bookmarks()?;
    app.console.print("Processing bookmarks...");
    if marks.is_empty() {
        app.console.print("No bookmarks found.");
        return Ok(());
    }
    app.console.print("\nBookmarks:");
    for mark in marks {
        app.console.print(&format!("Line Number: {}, Text: {}", mark.line_number, mark.text));
    }
    Ok(())
}

pub(super) fn go_to_line<C: Console>(app: &mut App<C>) -> Result<()> {
    let input = prompt(app, "Enter the line number to go to: ");
    let number = parse_line_number(&input)?;
    let rendered = app.session.go_to_line(number)?;
    app.console.print("\nHighlighted Content:");
    app.console.print(&rendered);
    Ok(())
}

pub(super) fn delete_document<C: Console>(app: &mut App<C>) -> Result<()> {
    let name = prompt(app, "Enter the name of the file to delete ('*' for all): ");
    if name != DELETE_ALL {
        app.session.delete_document(&name)?;
        app.console.print(&format!("File '{name}' deleted."));
        return Ok(());
    }
    let answer = prompt(app, "Delete every file in the database? (y/N) ");
    if answer.eq_ignore_ascii_case("y") {
        app.session.delete_all_documents()?;
        app.console.print("All files deleted.");
    } else {
        app.console.print("Nothing deleted.");
    }
    Ok(())
}

// Built-ins handled by the main loop rather than the table.

pub(super) fn open_by_path<C: Console>(app: &mut App<C>) -> Result<()> {
    let path = prompt(app, "Enter path to file: ");
    let doc = app.session.request_path(Path::new(&path))?;
    app.console.print(&format!("File '{}' opened from {}.", doc.name, path));
    Ok(())
}

pub(super) fn display_content<C: Console>(app: &mut App<C>) {
    app.console.print("Current text content:");
    let rendered = app.session.display_content();
    app.console.print(&rendered);
}

pub(super) fn edit<C: Console>(app: &mut App<C>) -> Result<()> {
    if app.session.document().is_none() {
        return Err(EditorError::NoDocumentOpen);
    }
    app.console.print("Entering edit mode. Type '/finish' to exit editing.");
    let answer = prompt(
        app,
        "Do you want to (R)eplace the entire content or (A)dd new text? ",
    );
    let mode = EditMode::from_answer(&answer);
    let doc = app
        .session
        .enter_edit_mode(mode, &mut ConsoleLines(&mut app.console))?;
    app.console.print("Exiting edit mode.");
    app.console.print(&format!(
        "File '{}' updated and saved to the database successfully.",
        doc.name
    ));
    Ok(())
}

pub(super) fn hints<C: Console>(app: &mut App<C>) -> Result<()> {
    let hints = match app.session.hints() {
        Err(EditorError::NoDocumentOpen) => {
            app.console.print("Choose a file first!");
            return Ok(());
        }
        other => other?,
    };
    if hints.is_empty() {
        app.console.print("No hints for this file.");
    }
    for hint in hints {
        app.console.print(&format!("Hint ID: {}, Hint Text: {}", hint.id, hint.text));
    }
    Ok(())
}
