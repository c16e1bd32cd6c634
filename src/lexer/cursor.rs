//! Filtered cursor over a token buffer.

use super::token::{Token, TokenKind};
use crate::span::Span;

/// Which trivia kinds [`TokenCursor::peek`] and [`TokenCursor::next`] skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ignore {
    pub space: bool,
    pub tab: bool,
    pub newline: bool,
    pub comment: bool,
}

impl Ignore {
    /// Skip every trivia kind.
    pub const ALL: Ignore = Ignore {
        space: true,
        tab: true,
        newline: true,
        comment: true,
    };

    /// Skip nothing.
    pub const NONE: Ignore = Ignore {
        space: false,
        tab: false,
        newline: false,
        comment: false,
    };

    /// Skip blanks but stop at newlines (directive lines).
    pub const BLANKS: Ignore = Ignore {
        space: true,
        tab: true,
        newline: false,
        comment: true,
    };

    fn skips(self, kind: TokenKind) -> bool {
        match kind {
            TokenKind::Space => self.space,
            TokenKind::Tab => self.tab,
            TokenKind::Newline => self.newline,
            TokenKind::Comment => self.comment,
            _ => false,
        }
    }
}

/// Cursor over an owned token buffer.
///
/// The buffer always ends with an `EoF` token; reading past it keeps
/// returning that token.
pub struct TokenCursor {
    tokens: Vec<Token>,
    position: usize,
    ignore: Ignore,
}

impl TokenCursor {
    pub fn new(mut tokens: Vec<Token>, ignore: Ignore) -> Self {
        if tokens.last().map(|t| t.kind) != Some(TokenKind::EoF) {
            let (span, path) = match tokens.last() {
                Some(last) => (Span::point(last.span.line_end, last.span.col_end), last.path.clone()),
                None => (Span::point(1, 1), "<input>".into()),
            };
            tokens.push(Token::new(TokenKind::EoF, "", span, path));
        }
        Self {
            tokens,
            position: 0,
            ignore,
        }
    }

    pub fn set_ignore(&mut self, ignore: Ignore) {
        self.ignore = ignore;
    }

    pub fn ignore(&self) -> Ignore {
        self.ignore
    }

    fn skip_index(&self, mut index: usize) -> usize {
        while index < self.tokens.len() - 1 && self.ignore.skips(self.tokens[index].kind) {
            index += 1;
        }
        index.min(self.tokens.len() - 1)
    }

    /// Next significant token without consuming it.
    pub fn peek(&self) -> &Token {
        &self.tokens[self.skip_index(self.position)]
    }

    /// The `n`th significant token ahead (`peek_nth(0) == peek()`).
    pub fn peek_nth(&self, n: usize) -> &Token {
        let mut index = self.skip_index(self.position);
        for _ in 0..n {
            if index >= self.tokens.len() - 1 {
                break;
            }
            index = self.skip_index(index + 1);
        }
        &self.tokens[index]
    }

    /// Raw token at the position, ignoring the filter.
    pub fn peek_raw(&self) -> &Token {
        &self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    pub fn next(&mut self) -> Token {
        let index = self.skip_index(self.position);
        if index < self.tokens.len() - 1 {
            self.position = index + 1;
        } else {
            self.position = index;
        }
        self.tokens[index].clone()
    }

    /// Consume one raw token regardless of the filter.
    pub fn next_raw(&mut self) -> Token {
        let index = self.position.min(self.tokens.len() - 1);
        if index < self.tokens.len() - 1 {
            self.position = index + 1;
        }
        self.tokens[index].clone()
    }

    /// Step back over the most recently consumed significant token.
    pub fn back(&mut self) {
        while self.position > 0 {
            self.position -= 1;
            if !self.ignore.skips(self.tokens[self.position].kind) {
                break;
            }
        }
    }

    pub fn mark(&self) -> usize {
        self.position
    }

    pub fn reset(&mut self, mark: usize) {
        self.position = mark.min(self.tokens.len() - 1);
    }

    /// Significant token immediately before the position, if any.
    pub fn previous(&self) -> Option<&Token> {
        self.tokens[..self.position]
            .iter()
            .rev()
            .find(|t| !self.ignore.skips(t.kind))
    }

    pub fn at_end(&self) -> bool {
        self.peek().kind == TokenKind::EoF
    }

    pub fn into_tokens(self) -> Vec<Token> {
        self.tokens
    }
}
