//! Main parser coordinator
//!
//! This module provides the [`Parser`] struct and core parsing infrastructure,
//! including error types, helper methods, error recovery and the parse entry
//! points.
//!
//! # Parser Architecture
//!
//! The Parser uses a recursive descent approach with the following organization:
//! - This module: Parser struct, helper methods, recovery and coordination
//! - `declarations`: variables, functions and parameters
//! - `specs`: enums, structs, methodmaps, typedefs, typesets, `using`
//! - `statements`: statements inside function bodies
//! - `expressions`: the expression precedence ladder
//!
//! # Error recovery
//!
//! Productions return `Result<_, ParseError>`. At declaration and statement
//! boundaries an error is reported once, a `Bad` node takes the place of the
//! broken construct and the cursor is resynchronised at the next `;`, `}` or
//! declaration keyword. After `max_errors` detailed reports a single summary
//! is emitted and later errors are counted silently.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, trace};

use crate::diagnostics::{codes, Diagnostic, Reporter, Severity};
use crate::lexer::{Ignore, Keyword, Op, Token, TokenCursor, TokenKind};
use crate::parser::ast::*;
use crate::span::Span;

/// Parser error type
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("expected {expected}, found {found}")]
    Expected {
        expected: String,
        found: String,
        span: Span,
        path: Arc<str>,
    },

    #[error("{message}")]
    Invalid {
        message: String,
        span: Span,
        path: Arc<str>,
    },
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::Expected { span, .. } | ParseError::Invalid { span, .. } => *span,
        }
    }

    pub fn path(&self) -> &Arc<str> {
        match self {
            ParseError::Expected { path, .. } | ParseError::Invalid { path, .. } => path,
        }
    }

    pub fn code(&self) -> &'static str {
        codes::SYNTAX
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(self.code(), self.to_string(), Arc::clone(self.path()), self.span())
    }
}

/// Recursive descent parser for SourcePawn
pub struct Parser {
    pub(crate) cursor: TokenCursor,
    reporter: Reporter,
    max_errors: usize,
    error_count: usize,
    /// Set while a bare `:` ends the expression (ternary arm, case label),
    /// which disables old-style `Tag:` casts.
    pub(crate) colon_terminates: bool,
}

impl Parser {
    /// Parser over a token stream. Trivia tokens are skipped.
    pub fn new(tokens: Vec<Token>, max_errors: usize) -> Self {
        Self {
            cursor: TokenCursor::new(tokens, Ignore::ALL),
            reporter: Reporter::new(),
            max_errors,
            error_count: 0,
            colon_terminates: false,
        }
    }

    /// Parse the entire plugin (top-level declarations)
    pub fn parse_plugin(&mut self) -> Plugin {
        let mut plugin = Plugin::new();

        while !self.is_at_end() {
            let start = self.cursor.mark();
            let start_span = self.current_span();
            match self.parse_top_level_declaration() {
                Ok(decl) => plugin.decls.push(decl),
                Err(err) => {
                    self.report(&err);
                    self.recover(start, Self::synchronize_decl);
                    plugin.decls.push(Decl::Bad {
                        span: start_span.to(err.span()),
                    });
                }
            }
        }

        plugin
    }

    /// Parse one expression that must span the whole input.
    pub fn parse_single_expression(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_expression()?;
        if !self.is_at_end() {
            return Err(self.expected("end of expression"));
        }
        Ok(expr)
    }

    /// Parse one statement that must span the whole input.
    pub fn parse_single_statement(&mut self) -> Result<Stmt, ParseError> {
        let stmt = self.parse_statement()?;
        if !self.is_at_end() {
            return Err(self.expected("end of statement"));
        }
        Ok(stmt)
    }

    /// Syntax errors reported so far, including suppressed ones.
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.reporter.into_diagnostics()
    }

    // ===== Error reporting and recovery =====

    /// Report a syntax error, honouring the error cap.
    pub(crate) fn report(&mut self, err: &ParseError) {
        self.error_count += 1;
        if self.error_count <= self.max_errors {
            self.reporter.push(err.to_diagnostic());
        } else if self.error_count == self.max_errors + 1 {
            debug!(max = self.max_errors, "syntax error limit reached");
            self.reporter.emit(
                Severity::Error,
                codes::TOO_MANY_ERRORS,
                format!(
                    "too many syntax errors ({} reported); further errors are suppressed",
                    self.max_errors
                ),
                err.path(),
                err.span(),
            );
        }
    }

    /// Advance past the broken construct: one token if nothing was consumed,
    /// then skip to the next boundary.
    pub(crate) fn recover(&mut self, start: usize, synchronize: fn(&mut Parser)) {
        if self.cursor.mark() == start && !self.is_at_end() {
            self.advance();
        }
        synchronize(self);
        trace!(at = %self.current_span(), "resynchronised");
    }

    /// Stop after `;` or `}`, or before a token that starts a declaration.
    pub(crate) fn synchronize_decl(&mut self) {
        while !self.is_at_end() {
            if self.match_op(Op::Semicolon) || self.match_op(Op::RBrace) {
                return;
            }
            if self.starts_declaration() {
                return;
            }
            self.advance();
        }
    }

    /// Stop after `;`, or before `}` or a token that starts a statement.
    pub(crate) fn synchronize_stmt(&mut self) {
        while !self.is_at_end() {
            if self.match_op(Op::Semicolon) {
                return;
            }
            if self.check_op(Op::RBrace) || self.starts_statement_keyword() {
                return;
            }
            self.advance();
        }
    }

    pub(crate) fn starts_declaration(&self) -> bool {
        match self.peek().kind {
            TokenKind::Keyword(kw) => {
                kw.is_storage_class()
                    || kw.is_builtin_type()
                    || matches!(
                        kw,
                        Keyword::Enum
                            | Keyword::Struct
                            | Keyword::Methodmap
                            | Keyword::Typedef
                            | Keyword::Typeset
                            | Keyword::Using
                            | Keyword::StaticAssert
                    )
            }
            _ => false,
        }
    }

    fn starts_statement_keyword(&self) -> bool {
        match self.peek().kind {
            TokenKind::Keyword(kw) => {
                kw.is_builtin_type()
                    || matches!(
                        kw,
                        Keyword::If
                            | Keyword::While
                            | Keyword::Do
                            | Keyword::For
                            | Keyword::Switch
                            | Keyword::Return
                            | Keyword::Break
                            | Keyword::Continue
                            | Keyword::Delete
                            | Keyword::Assert
                            | Keyword::New
                            | Keyword::Decl
                            | Keyword::Static
                            | Keyword::Const
                            | Keyword::StaticAssert
                    )
            }
            _ => false,
        }
    }

    // ===== Helper methods =====

    pub(crate) fn peek(&self) -> &Token {
        self.cursor.peek()
    }

    pub(crate) fn peek_nth(&self, n: usize) -> &Token {
        self.cursor.peek_nth(n)
    }

    pub(crate) fn advance(&mut self) -> Token {
        self.cursor.next()
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.cursor.at_end()
    }

    pub(crate) fn check_op(&self, op: Op) -> bool {
        self.peek().is_op(op)
    }

    pub(crate) fn check_keyword(&self, kw: Keyword) -> bool {
        self.peek().is_keyword(kw)
    }

    pub(crate) fn match_op(&mut self, op: Op) -> bool {
        if self.check_op(op) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn match_keyword(&mut self, kw: Keyword) -> bool {
        if self.check_keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn current_span(&self) -> Span {
        self.peek().span
    }

    /// Span of the last consumed token.
    pub(crate) fn previous_span(&self) -> Span {
        self.cursor.previous().map_or_else(|| self.current_span(), |t| t.span)
    }

    /// Span from `start` through the last consumed token.
    pub(crate) fn span_from(&self, start: Span) -> Span {
        start.to(self.previous_span())
    }

    pub(crate) fn expected(&self, what: &str) -> ParseError {
        let found = self.peek();
        ParseError::Expected {
            expected: what.to_string(),
            found: found.to_string(),
            span: found.span,
            path: Arc::clone(&found.path),
        }
    }

    pub(crate) fn invalid(&self, message: impl Into<String>, span: Span) -> ParseError {
        ParseError::Invalid {
            message: message.into(),
            span,
            path: Arc::clone(&self.peek().path),
        }
    }

    pub(crate) fn expect_op(&mut self, op: Op, ctx: &str) -> Result<Token, ParseError> {
        if self.check_op(op) {
            Ok(self.advance())
        } else {
            Err(self.expected(&format!("'{}' {ctx}", op.as_str())))
        }
    }

    pub(crate) fn expect_keyword(&mut self, kw: Keyword, ctx: &str) -> Result<Token, ParseError> {
        if self.check_keyword(kw) {
            Ok(self.advance())
        } else {
            Err(self.expected(&format!("'{}' {ctx}", kw.as_str())))
        }
    }

    pub(crate) fn expect_lparen(&mut self, ctx: &str) -> Result<Token, ParseError> {
        self.expect_op(Op::LParen, ctx)
    }

    pub(crate) fn expect_rparen(&mut self, ctx: &str) -> Result<Token, ParseError> {
        self.expect_op(Op::RParen, ctx)
    }

    pub(crate) fn expect_lbrace(&mut self, ctx: &str) -> Result<Token, ParseError> {
        self.expect_op(Op::LBrace, ctx)
    }

    pub(crate) fn expect_rbrace(&mut self, ctx: &str) -> Result<Token, ParseError> {
        self.expect_op(Op::RBrace, ctx)
    }

    pub(crate) fn expect_semicolon(&mut self, ctx: &str) -> Result<Token, ParseError> {
        self.expect_op(Op::Semicolon, ctx)
    }

    pub(crate) fn expect_identifier(&mut self) -> Result<Token, ParseError> {
        if self.peek().kind == TokenKind::Ident {
            Ok(self.advance())
        } else {
            Err(self.expected("identifier"))
        }
    }

    /// Identifier or keyword used as a name (`get`, `set`, `Float`, ...).
    pub(crate) fn expect_name(&mut self) -> Result<Token, ParseError> {
        if self.peek().is_word() {
            Ok(self.advance())
        } else {
            Err(self.expected("name"))
        }
    }
}
