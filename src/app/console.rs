use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

use crate::session::{LinePrompt, LineSource};

/// Line-oriented terminal the command loop talks to.
pub trait Console {
    /// Show `prompt` and read one line without its line ending.
    /// `None` once input is exhausted.
    fn read_line(&mut self, prompt: &str) -> Option<String>;

    fn print(&mut self, text: &str);
}

/// Console over the process's stdin and stdout.
#[derive(Debug, Default)]
pub struct StdConsole;

impl Console for StdConsole {
    fn read_line(&mut self, prompt: &str) -> Option<String> {
        if !prompt.is_empty() {
            let mut out = io::stdout().lock();
            let _ = out.write_all(prompt.as_bytes());
            let _ = out.flush();
        }
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line.trim_end_matches(['\n', '\r']).to_string()),
            Err(err) => {
                tracing::warn!(error = %err, "failed to read console input");
                None
            }
        }
    }

    fn print(&mut self, text: &str) {
        println!("{text}");
    }
}

/// Console that replays scripted input and records everything printed.
#[derive(Debug, Default, Clone)]
pub struct ScriptedConsole {
    input: VecDeque<String>,
    output: Vec<String>,
}

impl ScriptedConsole {
    pub fn new<I, S>(input: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            input: input.into_iter().map(Into::into).collect(),
            output: Vec::new(),
        }
    }

    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// All printed text joined with newlines.
    pub fn transcript(&self) -> String {
        self.output.join("\n")
    }
}

impl Console for ScriptedConsole {
    fn read_line(&mut self, _prompt: &str) -> Option<String> {
        self.input.pop_front()
    }

    fn print(&mut self, text: &str) {
        self.output.push(text.to_string());
    }
}

/// Feeds edit ingestion from a console.
pub struct ConsoleLines<'a, C: Console + ?Sized>(pub &'a mut C);

impl<C: Console + ?Sized> LineSource for ConsoleLines<'_, C> {
    fn next_line(&mut self, prompt: LinePrompt) -> Option<String> {
        self.0.read_line(prompt.text())
    }
}
