//! Interactive command surface.
//!
//! The main loop reads one token per prompt and dispatches it:
//! - tokens registered in the [`CommandTable`] run their command
//! - built-ins (`menu`, `edit`, `exit`, `hints`, `2`, `3`) are handled inline
//! - anything else gets an "unknown command" message
//!
//! No error ends the loop; each failure is printed and the next prompt
//! follows.

mod commands;
mod console;

pub use commands::{CommandFn, CommandTable};
pub use console::{Console, ConsoleLines, ScriptedConsole, StdConsole};

use crate::bus::{CapturedHints, HintCaptureListener, LogListener, PathOpenListener};
use crate::error::EditorError;
use crate::session::SessionHandle;

const MENU: &[&str] = &[
    "\nMenu:",
    "1. Create a new file",
    "2. Open an existing file",
    "3. Display current content",
    "4. Display File List",
    "5. Open File from Database",
    "Type 'goto' to go to certain line",
    "Type 'bookmarks' to check bookmarks in the current file",
    "Type 'hints' to check hints for the current file",
    "Type 'edit' to edit current file",
    "Type 'delete' to delete a file from the database",
];

/// What the loop does after a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Owns the console and the command table and drives a session.
pub struct App<C: Console> {
    session: SessionHandle,
    console: C,
    commands: CommandTable<C>,
    captured: CapturedHints,
}

impl<C: Console> App<C> {
    /// Wire the default commands and listeners onto `session`.
    pub fn new(session: SessionHandle, console: C) -> Self {
        let capture = HintCaptureListener::new();
        let captured = capture.captured();
        session.subscribe(Box::new(LogListener));
        session.subscribe(Box::new(capture));
        session.subscribe(Box::new(PathOpenListener));

        Self {
            session,
            console,
            commands: CommandTable::with_defaults(),
            captured,
        }
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub const fn console(&self) -> &C {
        &self.console
    }

    pub fn into_console(self) -> C {
        self.console
    }

    /// Run until `exit` or end of input.
    pub fn run(&mut self) {
        self.console.print("\nWelcome to the Text Editor!");
        self.console.print("Type 'menu' to display the menu.");
        self.console.print("Type 'exit' to exit.");

        while let Some(input) = self.console.read_line("Enter a command: ") {
            if self.dispatch(&input) == Flow::Exit {
                return;
            }
        }
        tracing::debug!("console input closed");
    }

    /// Handle one command token.
    pub fn dispatch(&mut self, input: &str) -> Flow {
        let token = input.trim();
        tracing::debug!(token, "dispatch");

        let outcome = if token == "menu" {
            for line in MENU {
                self.console.print(line);
            }
            Ok(())
        } else if let Some(command) = self.commands.get(token) {
            command(self)
        } else {
            match token {
                "2" => commands::open_by_path(self),
                "3" => {
                    commands::display_content(self);
                    Ok(())
                }
                "edit" => commands::edit(self),
                "hints" => commands::hints(self),
                "exit" => {
                    self.console.print("Exiting the text editor.");
                    return Flow::Exit;
                }
                _ => {
                    self.console
                        .print("Unknown command. Type 'menu' for the menu or 'exit' to exit.");
                    Ok(())
                }
            }
        };

        if let Err(err) = outcome {
            self.report(&err);
        }
        self.drain_notifications();
        Flow::Continue
    }

    fn report(&mut self, err: &EditorError) {
        tracing::warn!(error = %err, "command failed");
        let message = if err.is_store_error() {
            format!("An error occurred while talking to the database: {err}. Unsaved text is kept.")
        } else {
            format!("Error: {err}")
        };
        self.console.print(&message);
    }

    fn drain_notifications(&mut self) {
        for text in self.captured.take() {
            self.console.print(&format!("Hint added: {text}"));
        }
        for failure in self.session.take_listener_failures() {
            self.console.print(&format!(
                "Warning: listener '{}' failed: {}",
                failure.listener, failure.message
            ));
        }
    }
}
