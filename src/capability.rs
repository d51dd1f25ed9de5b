//! Optional extension points the session calls when present.
//!
//! Each trait has a default implementation that leaves its input unchanged,
//! so an editor without highlighting, macros, or snippets behaves exactly
//! like one with the `Plain`/`NoMacros`/`NoSnippets` implementations below.

/// Renders buffer text for display.
pub trait Highlighter: Send + Sync {
    fn highlight(&self, text: &str) -> String {
        text.to_string()
    }
}

/// Rewrites ingested content before it is persisted.
pub trait MacroRunner: Send + Sync {
    /// Return `Some` to replace the content.
    fn run(&self, _content: &str) -> Option<String> {
        None
    }
}

/// Expands a single ingested line.
pub trait SnippetExpander: Send + Sync {
    /// Return `Some` to replace the line.
    fn expand(&self, _line: &str) -> Option<String> {
        None
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Plain;

impl Highlighter for Plain {}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoMacros;

impl MacroRunner for NoMacros {}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoSnippets;

impl SnippetExpander for NoSnippets {}

/// The set of extension points a session was built with.
pub struct Capabilities {
    pub highlighter: Box<dyn Highlighter>,
    pub macros: Box<dyn MacroRunner>,
    pub snippets: Box<dyn SnippetExpander>,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            highlighter: Box::new(Plain),
            macros: Box::new(NoMacros),
            snippets: Box::new(NoSnippets),
        }
    }
}

impl Capabilities {
    #[must_use]
    pub fn with_highlighter(mut self, highlighter: Box<dyn Highlighter>) -> Self {
        self.highlighter = highlighter;
        self
    }

    #[must_use]
    pub fn with_macros(mut self, macros: Box<dyn MacroRunner>) -> Self {
        self.macros = macros;
        self
    }

    #[must_use]
    pub fn with_snippets(mut self, snippets: Box<dyn SnippetExpander>) -> Self {
        self.snippets = snippets;
        self
    }

    pub(crate) fn expand_line(&self, line: &str) -> String {
        self.snippets
            .expand(line)
            .unwrap_or_else(|| line.to_string())
    }

    pub(crate) fn run_macros(&self, content: String) -> String {
        self.macros.run(&content).unwrap_or(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Shout;

    impl SnippetExpander for Shout {
        fn expand(&self, line: &str) -> Option<String> {
            line.strip_prefix("!").map(str::to_uppercase)
        }
    }

    #[test]
    fn test_defaults_leave_text_unchanged() {
        let caps = Capabilities::default();
        assert_eq!(caps.highlighter.highlight("fn x()"), "fn x()");
        assert_eq!(caps.expand_line("plain"), "plain");
        assert_eq!(caps.run_macros("body".to_string()), "body");
    }

    #[test]
    fn test_custom_snippet_expander_is_used() {
        let caps = Capabilities::default().with_snippets(Box::new(Shout));
        assert_eq!(caps.expand_line("!loud"), "LOUD");
        assert_eq!(caps.expand_line("quiet"), "quiet");
    }
}
