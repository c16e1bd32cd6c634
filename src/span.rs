//! Source spans.
//!
//! Every token and AST node carries a [`Span`]. Spans only feed diagnostics;
//! no stage makes a semantic decision based on one.

use std::fmt;

/// A 1-based, inclusive-start / exclusive-end region of a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub line_start: usize,
    pub col_start: usize,
    pub line_end: usize,
    pub col_end: usize,
}

impl Span {
    pub fn new(line_start: usize, col_start: usize, line_end: usize, col_end: usize) -> Self {
        Self {
            line_start,
            col_start,
            line_end,
            col_end,
        }
    }

    /// Zero-width span at a single position.
    pub fn point(line: usize, col: usize) -> Self {
        Self::new(line, col, line, col)
    }

    /// Smallest span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        let (line_start, col_start) = if (other.line_start, other.col_start) < (self.line_start, self.col_start) {
            (other.line_start, other.col_start)
        } else {
            (self.line_start, self.col_start)
        };
        let (line_end, col_end) = if (other.line_end, other.col_end) > (self.line_end, self.col_end) {
            (other.line_end, other.col_end)
        } else {
            (self.line_end, self.col_end)
        };
        Span::new(line_start, col_start, line_end, col_end)
    }

    pub fn is_single_line(&self) -> bool {
        self.line_start == self.line_end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line_start, self.col_start)
    }
}

/// Moves a macro-body token's span onto the macro call site.
///
/// The result starts where `origin` starts and keeps the body token's width
/// when that token sat on a single line; multi-line body tokens collapse to the
/// origin's own width.
pub fn adjust_span(origin: Span, body: Span) -> Span {
    let width = if body.is_single_line() {
        body.col_end.saturating_sub(body.col_start)
    } else {
        origin.col_end.saturating_sub(origin.col_start)
    };
    Span::new(
        origin.line_start,
        origin.col_start,
        origin.line_start,
        origin.col_start + width,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjust_span_moves_to_call_site() {
        let origin = Span::new(10, 5, 10, 8);
        let body = Span::new(1, 20, 1, 24);
        assert_eq!(adjust_span(origin, body), Span::new(10, 5, 10, 9));
    }

    #[test]
    fn adjust_span_multiline_body_uses_origin_width() {
        let origin = Span::new(3, 1, 3, 4);
        let body = Span::new(1, 1, 2, 7);
        assert_eq!(adjust_span(origin, body), Span::new(3, 1, 3, 4));
    }

    #[test]
    fn to_covers_both() {
        let a = Span::new(2, 4, 2, 6);
        let b = Span::new(1, 9, 1, 10);
        assert_eq!(a.to(b), Span::new(1, 9, 2, 6));
    }
}
