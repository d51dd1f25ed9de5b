//! Syntax highlighting for buffer display.
//!
//! Uses syntect for highlighting with Sublime Text syntax definitions and
//! renders 24-bit terminal escapes.

use std::sync::OnceLock;

use syntect::easy::HighlightLines;
use syntect::highlighting::ThemeSet;
use syntect::parsing::SyntaxSet;
use syntect::util::{LinesWithEndings, as_24_bit_terminal_escaped};

use crate::capability::Highlighter;

const FOCUS_START: &str = "\x1b[93m";
const RESET: &str = "\x1b[0m";

const DEFAULT_LANGUAGE: &str = "py";
const DEFAULT_THEME: &str = "base16-ocean.dark";

fn syntax_set() -> &'static SyntaxSet {
    static SYNTAXES: OnceLock<SyntaxSet> = OnceLock::new();
    SYNTAXES.get_or_init(SyntaxSet::load_defaults_newlines)
}

fn theme_set() -> &'static ThemeSet {
    static THEMES: OnceLock<ThemeSet> = OnceLock::new();
    THEMES.get_or_init(ThemeSet::load_defaults)
}

/// Highlights text as one language using a bundled theme.
#[derive(Debug, Clone)]
pub struct SyntectHighlighter {
    language: String,
    theme: String,
}

impl Default for SyntectHighlighter {
    fn default() -> Self {
        Self::new(DEFAULT_LANGUAGE)
    }
}

impl SyntectHighlighter {
    /// `language` is a syntax token such as a file extension (`rs`, `py`)
    /// or a syntax name. Unknown languages render as plain text.
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            theme: DEFAULT_THEME.to_string(),
        }
    }
}

impl Highlighter for SyntectHighlighter {
    fn highlight(&self, text: &str) -> String {
        let syntaxes = syntax_set();
        let syntax = syntaxes
            .find_syntax_by_token(&self.language)
            .unwrap_or_else(|| syntaxes.find_syntax_plain_text());
        let Some(theme) = theme_set().themes.get(&self.theme) else {
            return text.to_string();
        };

        let mut highlighter = HighlightLines::new(syntax, theme);
        let mut out = String::with_capacity(text.len() * 2);
        for line in LinesWithEndings::from(text) {
            match highlighter.highlight_line(line, syntaxes) {
                Ok(ranges) => out.push_str(&as_24_bit_terminal_escaped(&ranges, false)),
                Err(err) => {
                    tracing::warn!(error = %err, "highlighting failed, showing plain text");
                    return text.to_string();
                }
            }
        }
        out.push_str(RESET);
        out
    }
}

/// Render `content` line by line with line `focus` (1-based) set apart.
///
/// Every other line goes through `highlighter`.
pub fn render_with_focus(content: &str, focus: usize, highlighter: &dyn Highlighter) -> String {
    content
        .lines()
        .enumerate()
        .map(|(idx, line)| {
            if idx + 1 == focus {
                format!("{FOCUS_START}{line}{RESET}")
            } else {
                highlighter.highlight(line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Remove terminal escape sequences.
pub fn strip_ansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            for next in chars.by_ref() {
                if next.is_ascii_alphabetic() {
                    break;
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}
