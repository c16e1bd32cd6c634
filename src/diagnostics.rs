//! Span-anchored diagnostics shared by every stage.
//!
//! A [`Diagnostic`] renders as
//!
//! ```text
//! error[E0201]: expected ';' after declaration, found 'int'
//!   --> plugin.sp:2:1
//!    |
//!  2 | int b = 2;
//!    | ^^^ here
//! ```
//!
//! The header is coloured when rendering with colour enabled. Source text for
//! the excerpt comes from a [`SourceMap`] filled in as files are read.
//!
//! # Codes
//!
//! - `E00xx`: lexer errors
//! - `E01xx`: preprocessor errors, `W01xx` preprocessor warnings
//! - `E02xx`: syntax errors
//! - `E03xx`: type errors, `W03xx` type warnings
//! - `E04xx`: runtime errors raised while folding constants

use std::fmt;
use std::sync::Arc;

use crossterm::style::{StyledContent, Stylize};
use rustc_hash::FxHashMap;

use crate::span::Span;

pub mod codes {
    pub const LEX: &str = "E0001";

    pub const PP_BAD_DEFINE: &str = "E0101";
    pub const PP_ARITY: &str = "E0102";
    pub const PP_STRAY: &str = "E0103";
    pub const PP_UNTERMINATED: &str = "E0104";
    pub const PP_INCLUDE: &str = "E0105";
    pub const PP_CONDITION: &str = "E0106";
    pub const PP_USER_ERROR: &str = "E0107";
    pub const PP_DEPTH: &str = "E0108";
    pub const PP_USER_WARNING: &str = "W0101";

    pub const SYNTAX: &str = "E0201";
    pub const TOO_MANY_ERRORS: &str = "E0202";

    pub const TYPE_MISMATCH: &str = "E0301";
    pub const NOT_ARITHMETIC: &str = "E0302";
    pub const UNDEFINED: &str = "E0303";
    pub const NOT_INDEXABLE: &str = "E0304";
    pub const STATIC_ASSERT: &str = "E0305";
    pub const NOT_CONSTANT: &str = "E0306";
    pub const ARRAY_TOO_LARGE: &str = "E0307";
    pub const SHIFT: &str = "W0301";
    pub const UNRESOLVED: &str = "W0302";

    pub const RUNTIME: &str = "E0401";
    pub const ITERATION_LIMIT: &str = "E0402";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Note,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Note => write!(f, "note"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A secondary span with an inline note.
#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub span: Span,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: &'static str,
    pub message: String,
    pub path: Arc<str>,
    pub span: Span,
    pub notes: Vec<Label>,
}

impl Diagnostic {
    pub fn new(
        severity: Severity,
        code: &'static str,
        message: impl Into<String>,
        path: Arc<str>,
        span: Span,
    ) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            path,
            span,
            notes: Vec::new(),
        }
    }

    pub fn error(code: &'static str, message: impl Into<String>, path: Arc<str>, span: Span) -> Self {
        Self::new(Severity::Error, code, message, path, span)
    }

    pub fn warning(code: &'static str, message: impl Into<String>, path: Arc<str>, span: Span) -> Self {
        Self::new(Severity::Warning, code, message, path, span)
    }

    pub fn with_note(mut self, span: Span, message: impl Into<String>) -> Self {
        self.notes.push(Label {
            span,
            message: message.into(),
        });
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Renders the diagnostic with a source excerpt for every affected span.
    pub fn render(&self, sources: &SourceMap, color: bool) -> String {
        let mut out = String::new();
        let header = format!("{}[{}]", self.severity, self.code);
        out.push_str(&paint(&header, self.severity, color));
        out.push_str(": ");
        out.push_str(&self.message);
        out.push('\n');

        let mut labels: Vec<(&Span, &str, bool)> = vec![(&self.span, "", true)];
        labels.extend(self.notes.iter().map(|n| (&n.span, n.message.as_str(), false)));

        let width = labels
            .iter()
            .map(|(span, _, _)| span.line_start.to_string().len())
            .max()
            .unwrap_or(1);

        out.push_str(&format!(
            "{:width$}--> {}:{}:{}\n",
            "",
            self.path,
            self.span.line_start,
            self.span.col_start,
            width = width + 1
        ));

        let Some(text) = sources.get(&self.path) else {
            return out;
        };

        out.push_str(&format!("{:width$} |\n", "", width = width));
        for (span, note, primary) in labels {
            let Some(line) = text.lines().nth(span.line_start.saturating_sub(1)) else {
                continue;
            };
            out.push_str(&format!("{:>width$} | {}\n", span.line_start, line, width = width));

            let start = span.col_start.saturating_sub(1);
            let len = if span.is_single_line() {
                span.col_end.saturating_sub(span.col_start).max(1)
            } else {
                line.chars().count().saturating_sub(start).max(1)
            };
            let marker = (if primary { "^" } else { "-" }).repeat(len);
            let marker = if primary {
                paint(&marker, self.severity, color)
            } else {
                paint_note(&marker, color)
            };
            out.push_str(&format!("{:width$} | {}{}", "", " ".repeat(start), marker, width = width));
            if !note.is_empty() {
                out.push(' ');
                out.push_str(&paint_note(note, color));
            }
            out.push('\n');
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}]: {} ({}:{})",
            self.severity, self.code, self.message, self.path, self.span
        )
    }
}

fn paint(text: &str, severity: Severity, color: bool) -> String {
    if !color {
        return text.to_string();
    }
    let styled: StyledContent<&str> = match severity {
        Severity::Error => text.red().bold(),
        Severity::Warning => text.yellow().bold(),
        Severity::Note => text.cyan().bold(),
    };
    styled.to_string()
}

fn paint_note(text: &str, color: bool) -> String {
    if color {
        text.cyan().to_string()
    } else {
        text.to_string()
    }
}

/// Source text of every file a run touched, keyed by path.
#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    files: FxHashMap<Arc<str>, String>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: Arc<str>, text: impl Into<String>) {
        self.files.insert(path, text.into());
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    pub fn merge(&mut self, other: SourceMap) {
        self.files.extend(other.files);
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Accumulates diagnostics for one stage.
///
/// Notes are buffered with [`Reporter::note`] and attached to the next
/// emitted message, after which the buffer is cleared.
#[derive(Debug, Default)]
pub struct Reporter {
    emitted: Vec<Diagnostic>,
    pending: Vec<Label>,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn note(&mut self, span: Span, message: impl Into<String>) -> &mut Self {
        self.pending.push(Label {
            span,
            message: message.into(),
        });
        self
    }

    pub fn emit(
        &mut self,
        severity: Severity,
        code: &'static str,
        message: impl Into<String>,
        path: &Arc<str>,
        span: Span,
    ) {
        let mut diagnostic = Diagnostic::new(severity, code, message, Arc::clone(path), span);
        diagnostic.notes = std::mem::take(&mut self.pending);
        self.emitted.push(diagnostic);
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.pending.clear();
        self.emitted.push(diagnostic);
    }

    pub fn error_count(&self) -> usize {
        self.emitted.iter().filter(|d| d.is_error()).count()
    }

    pub fn has_errors(&self) -> bool {
        self.emitted.iter().any(Diagnostic::is_error)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.emitted
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.emitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sources() -> SourceMap {
        let mut map = SourceMap::new();
        map.add(Arc::from("a.sp"), "int a = 1\nint b = 2;\n");
        map
    }

    #[test]
    fn test_render_plain() {
        let diag = Diagnostic::error(
            codes::SYNTAX,
            "expected ';'",
            Arc::from("a.sp"),
            Span::new(2, 1, 2, 4),
        );
        let text = diag.render(&sources(), false);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "error[E0201]: expected ';'");
        assert_eq!(lines[1], "  --> a.sp:2:1");
        assert_eq!(lines[2], "  |");
        assert_eq!(lines[3], "2 | int b = 2;");
        assert_eq!(lines[4], "  | ^^^");
    }

    #[test]
    fn test_render_note_inline() {
        let diag = Diagnostic::error(codes::SYNTAX, "bad", Arc::from("a.sp"), Span::new(2, 1, 2, 4))
            .with_note(Span::new(1, 9, 1, 10), "after this");
        let text = diag.render(&sources(), false);
        assert!(text.contains("1 | int a = 1"));
        assert!(text.contains("        - after this"));
    }

    #[test]
    fn test_render_colored_header() {
        let diag = Diagnostic::warning(codes::SHIFT, "no-op", Arc::from("x.sp"), Span::point(1, 1));
        let text = diag.render(&SourceMap::new(), true);
        assert!(text.contains('\u{1b}'));
        assert!(text.contains("warning[W0301]"));
    }

    #[test]
    fn test_reporter_flushes_notes() {
        let path: Arc<str> = Arc::from("a.sp");
        let mut reporter = Reporter::new();
        reporter.note(Span::point(1, 1), "first");
        reporter.emit(Severity::Error, codes::SYNTAX, "one", &path, Span::point(1, 1));
        reporter.emit(Severity::Warning, codes::SHIFT, "two", &path, Span::point(1, 1));
        let diags = reporter.into_diagnostics();
        assert_eq!(diags[0].notes.len(), 1);
        assert!(diags[1].notes.is_empty());
    }
}
