//! Edit ingestion: the line-accumulation loop shared by document creation
//! and edit mode.
//!
//! Each input line is either the finish token, the hint token, or content.
//! Tokens are matched case-insensitively after trimming.

use std::collections::VecDeque;

pub const FINISH_TOKEN: &str = "/finish";
pub const HINT_TOKEN: &str = "/hint";

/// What the ingestion loop is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinePrompt {
    /// The next content line (or an inline token).
    Content,
    /// The text of a hint just announced with the hint token.
    HintText,
}

impl LinePrompt {
    pub const fn text(self) -> &'static str {
        match self {
            Self::Content => "",
            Self::HintText => "Enter hint text: ",
        }
    }
}

/// Where ingested lines come from. `None` means the input is exhausted and
/// is treated like the finish token.
pub trait LineSource {
    fn next_line(&mut self, prompt: LinePrompt) -> Option<String>;
}

/// Classification of one ingested line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestLine<'a> {
    Finish,
    Hint,
    Content(&'a str),
}

pub fn classify(line: &str) -> IngestLine<'_> {
    let token = line.trim();
    if token.eq_ignore_ascii_case(FINISH_TOKEN) {
        IngestLine::Finish
    } else if token.eq_ignore_ascii_case(HINT_TOKEN) {
        IngestLine::Hint
    } else {
        IngestLine::Content(line)
    }
}

/// A fixed script of input lines.
#[derive(Debug, Default, Clone)]
pub struct ScriptedLines {
    lines: VecDeque<String>,
}

impl ScriptedLines {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.lines.len()
    }
}

impl LineSource for ScriptedLines {
    fn next_line(&mut self, _prompt: LinePrompt) -> Option<String> {
        self.lines.pop_front()
    }
}
