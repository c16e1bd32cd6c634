//! Textual preprocessor over token streams.
//!
//! Runs between the scanner and the parser: handles `#define`/`#undef`,
//! macro expansion with rescanning, conditional compilation and file
//! inclusion. Output is a token stream with every directive line removed
//! (its terminating newline is kept so line structure survives).
//!
//! - [`macros`]: macro table and body substitution
//! - [`conditional`]: `#if` frames and the condition evaluator
//! - [`include`]: include target parsing and path resolution

pub mod conditional;
pub mod include;
pub mod macros;

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustc_hash::FxHashSet;
use thiserror::Error;
use tracing::{debug, trace};

use crate::diagnostics::{codes, Diagnostic, Reporter, Severity, SourceMap};
use crate::lexer::{normalize_source, Directive, LexError, Op, Scanner, Token, TokenKind};
use crate::options::Options;
use crate::span::Span;

use conditional::{ConditionEval, ConditionStack, FrameState};
use include::{IncludeTarget, MAX_INCLUDE_DEPTH};
pub use macros::{Macro, MacroTable};

/// Nesting limit for macro expansions being rescanned at once.
pub const MAX_EXPANSION_DEPTH: usize = 200;

/// Hard preprocessor failures. Any of these aborts the pass.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PreprocessError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("{message}")]
    BadDefine { message: String, span: Span, path: Arc<str> },

    #[error("macro '{name}' expects {expected} argument(s), found {found}")]
    Arity {
        name: String,
        expected: usize,
        found: usize,
        span: Span,
        path: Arc<str>,
    },

    #[error("unterminated argument list for macro '{name}'")]
    UnterminatedCall { name: String, span: Span, path: Arc<str> },

    #[error("'#{directive}' without a matching '#if'")]
    Stray {
        directive: &'static str,
        span: Span,
        path: Arc<str>,
    },

    #[error("'#{directive}' after '#else'")]
    AfterElse {
        directive: &'static str,
        span: Span,
        path: Arc<str>,
    },

    #[error("unterminated '#if' block")]
    Unterminated { span: Span, path: Arc<str> },

    #[error("expected \"path\" or <path> after '#include'")]
    BadInclude { span: Span, path: Arc<str> },

    #[error("cannot find include file '{name}'")]
    IncludeNotFound { name: String, span: Span, path: Arc<str> },

    #[error("cannot read include file '{name}': {message}")]
    IncludeRead {
        name: String,
        message: String,
        span: Span,
        path: Arc<str>,
    },

    #[error("{message}")]
    Condition { message: String, span: Span, path: Arc<str> },

    #[error("#error {message}")]
    User { message: String, span: Span, path: Arc<str> },

    #[error("{what} nested too deeply")]
    Depth {
        what: &'static str,
        span: Span,
        path: Arc<str>,
    },
}

impl PreprocessError {
    pub fn span(&self) -> Span {
        match self {
            PreprocessError::Lex(err) => err.span,
            PreprocessError::BadDefine { span, .. }
            | PreprocessError::Arity { span, .. }
            | PreprocessError::UnterminatedCall { span, .. }
            | PreprocessError::Stray { span, .. }
            | PreprocessError::AfterElse { span, .. }
            | PreprocessError::Unterminated { span, .. }
            | PreprocessError::BadInclude { span, .. }
            | PreprocessError::IncludeNotFound { span, .. }
            | PreprocessError::IncludeRead { span, .. }
            | PreprocessError::Condition { span, .. }
            | PreprocessError::User { span, .. }
            | PreprocessError::Depth { span, .. } => *span,
        }
    }

    pub fn path(&self) -> &Arc<str> {
        match self {
            PreprocessError::Lex(err) => &err.path,
            PreprocessError::BadDefine { path, .. }
            | PreprocessError::Arity { path, .. }
            | PreprocessError::UnterminatedCall { path, .. }
            | PreprocessError::Stray { path, .. }
            | PreprocessError::AfterElse { path, .. }
            | PreprocessError::Unterminated { path, .. }
            | PreprocessError::BadInclude { path, .. }
            | PreprocessError::IncludeNotFound { path, .. }
            | PreprocessError::IncludeRead { path, .. }
            | PreprocessError::Condition { path, .. }
            | PreprocessError::User { path, .. }
            | PreprocessError::Depth { path, .. } => path,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            PreprocessError::Lex(_) => codes::LEX,
            PreprocessError::BadDefine { .. } => codes::PP_BAD_DEFINE,
            PreprocessError::Arity { .. } | PreprocessError::UnterminatedCall { .. } => codes::PP_ARITY,
            PreprocessError::Stray { .. } | PreprocessError::AfterElse { .. } => codes::PP_STRAY,
            PreprocessError::Unterminated { .. } => codes::PP_UNTERMINATED,
            PreprocessError::BadInclude { .. }
            | PreprocessError::IncludeNotFound { .. }
            | PreprocessError::IncludeRead { .. } => codes::PP_INCLUDE,
            PreprocessError::Condition { .. } => codes::PP_CONDITION,
            PreprocessError::User { .. } => codes::PP_USER_ERROR,
            PreprocessError::Depth { .. } => codes::PP_DEPTH,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(self.code(), self.to_string(), Arc::clone(self.path()), self.span())
    }
}

/// Work item in the rescan queue.
enum Item {
    Tok(Token),
    /// End of a macro's replacement: the macro may expand again.
    EndExpansion(String),
}

/// How processing of one file ended.
enum Flow {
    Done,
    EndInput,
}

/// One preprocessing run. Macro definitions persist in the borrowed table.
pub struct Preprocessor<'a> {
    macros: &'a mut MacroTable,
    options: &'a Options,
    reporter: Reporter,
    sources: SourceMap,
    /// Macros whose replacement is currently being rescanned.
    active: Vec<String>,
    conditions: ConditionStack,
    include_depth: usize,
    included: FxHashSet<PathBuf>,
}

impl<'a> Preprocessor<'a> {
    pub fn new(macros: &'a mut MacroTable, options: &'a Options) -> Self {
        Self {
            macros,
            options,
            reporter: Reporter::new(),
            sources: SourceMap::new(),
            active: Vec::new(),
            conditions: ConditionStack::new(),
            include_depth: 0,
            included: FxHashSet::default(),
        }
    }

    /// Preprocesses a scanned file. The result ends with the input's `EoF`.
    pub fn run(&mut self, tokens: Vec<Token>) -> Result<Vec<Token>, PreprocessError> {
        let eof = tokens
            .last()
            .filter(|t| t.kind == TokenKind::EoF)
            .cloned();
        let mut out = Vec::with_capacity(tokens.len());
        self.process_file(tokens, &mut out)?;
        if let Some(eof) = eof {
            out.push(eof);
        }
        Ok(out)
    }

    /// Warnings emitted so far and the text of every file read.
    pub fn finish(self) -> (Reporter, SourceMap) {
        (self.reporter, self.sources)
    }

    fn process_file(&mut self, tokens: Vec<Token>, out: &mut Vec<Token>) -> Result<(), PreprocessError> {
        let base_depth = self.conditions.depth();
        let mut queue: VecDeque<Item> = tokens
            .into_iter()
            .filter(|t| t.kind != TokenKind::EoF)
            .map(Item::Tok)
            .collect();

        let flow = self.expand(&mut queue, out, true)?;
        if let Flow::EndInput = flow {
            self.conditions.truncate(base_depth);
            return Ok(());
        }

        if let Some(frame) = self.conditions.truncate(base_depth) {
            return Err(PreprocessError::Unterminated {
                span: frame.opener.span,
                path: Arc::clone(&frame.opener.path),
            });
        }
        Ok(())
    }

    /// Drains `queue` into `out`, expanding macros. Directives are handled
    /// only when `directives` is set (file bodies, not macro arguments).
    fn expand(&mut self, queue: &mut VecDeque<Item>, out: &mut Vec<Token>, directives: bool) -> Result<Flow, PreprocessError> {
        while let Some(item) = queue.pop_front() {
            let tok = match item {
                Item::EndExpansion(name) => {
                    self.deactivate(&name);
                    continue;
                }
                Item::Tok(tok) => tok,
            };

            match tok.kind {
                TokenKind::Directive(directive) if directives => {
                    if let Flow::EndInput = self.directive(directive, tok, queue, out)? {
                        return Ok(Flow::EndInput);
                    }
                }
                TokenKind::Ident if self.is_expandable(&tok.lexeme) => {
                    self.expand_macro(tok, queue, out)?;
                }
                TokenKind::Ident if tok.lexeme == "__LINE__" => {
                    out.push(Token::new(
                        TokenKind::IntLit,
                        tok.span.line_start.to_string(),
                        tok.span,
                        tok.path,
                    ));
                }
                _ => out.push(tok),
            }
        }
        Ok(Flow::Done)
    }

    fn is_expandable(&self, name: &str) -> bool {
        self.macros.is_defined(name) && !self.active.iter().any(|a| a == name)
    }

    fn deactivate(&mut self, name: &str) {
        if let Some(pos) = self.active.iter().rposition(|a| a == name) {
            self.active.remove(pos);
        }
    }

    fn expand_macro(&mut self, call: Token, queue: &mut VecDeque<Item>, out: &mut Vec<Token>) -> Result<(), PreprocessError> {
        let Some(mac) = self.macros.get(&call.lexeme).cloned() else {
            out.push(call);
            return Ok(());
        };

        if self.active.len() >= MAX_EXPANSION_DEPTH {
            return Err(PreprocessError::Depth {
                what: "macro expansion",
                span: call.span,
                path: Arc::clone(&call.path),
            });
        }

        let replacement = if mac.is_function_like {
            let Some(raw_args) = self.collect_args(&mac, &call, queue)? else {
                // Not a call: the name stands for itself
                out.push(call);
                return Ok(());
            };
            let mut expanded_args = Vec::with_capacity(raw_args.len());
            for arg in &raw_args {
                let mut arg_queue: VecDeque<Item> = arg.iter().cloned().map(Item::Tok).collect();
                let mut expanded = Vec::new();
                self.expand(&mut arg_queue, &mut expanded, false)?;
                expanded_args.push(expanded);
            }
            mac.expand_function(&call, &raw_args, &expanded_args)
        } else {
            mac.expand_object(&call)
        };

        trace!(name = %call.lexeme, tokens = replacement.len(), "expanding macro");
        self.active.push(call.lexeme.clone());
        queue.push_front(Item::EndExpansion(call.lexeme));
        for tok in replacement.into_iter().rev() {
            queue.push_front(Item::Tok(tok));
        }
        Ok(())
    }

    /// Collects the argument groups of a function-like macro call.
    ///
    /// Returns `None` when the name is not followed by `(`, leaving the queue
    /// untouched.
    fn collect_args(&mut self, mac: &Macro, call: &Token, queue: &mut VecDeque<Item>) -> Result<Option<Vec<Vec<Token>>>, PreprocessError> {
        let open = queue.iter().position(|item| match item {
            Item::Tok(t) => !t.kind.is_blank(),
            Item::EndExpansion(_) => false,
        });
        let is_call = matches!(open.and_then(|i| queue.get(i)), Some(Item::Tok(t)) if t.is_op(Op::LParen));
        let Some(open) = open.filter(|_| is_call) else {
            return Ok(None);
        };

        // Markers before the paren end expansions the call reaches out of
        for item in queue.drain(..=open) {
            if let Item::EndExpansion(name) = item {
                self.deactivate(&name);
            }
        }

        let mut args: Vec<Vec<Token>> = vec![Vec::new()];
        let mut nesting = 0usize;
        loop {
            let tok = match queue.pop_front() {
                Some(Item::Tok(tok)) => tok,
                Some(Item::EndExpansion(name)) => {
                    self.deactivate(&name);
                    continue;
                }
                None => {
                    return Err(PreprocessError::UnterminatedCall {
                        name: call.lexeme.clone(),
                        span: call.span,
                        path: Arc::clone(&call.path),
                    })
                }
            };
            match tok.kind {
                TokenKind::Op(Op::LParen | Op::LBracket | Op::LBrace) => nesting += 1,
                TokenKind::Op(Op::RParen) if nesting == 0 => break,
                TokenKind::Op(Op::RParen | Op::RBracket | Op::RBrace) => nesting = nesting.saturating_sub(1),
                TokenKind::Op(Op::Comma) if nesting == 0 => {
                    args.push(Vec::new());
                    continue;
                }
                TokenKind::Comment => continue,
                _ => {}
            }
            let tok = if tok.kind == TokenKind::Newline {
                Token::new(TokenKind::Space, " ", tok.span, tok.path)
            } else {
                tok
            };
            if let Some(current) = args.last_mut() {
                current.push(tok);
            }
        }

        for arg in &mut args {
            while arg.first().is_some_and(|t| t.kind.is_trivia()) {
                arg.remove(0);
            }
            while arg.last().is_some_and(|t| t.kind.is_trivia()) {
                arg.pop();
            }
        }
        if args.len() == 1 && args[0].is_empty() {
            args.clear();
        }

        if args.len() != mac.params.len() {
            return Err(PreprocessError::Arity {
                name: call.lexeme.clone(),
                expected: mac.params.len(),
                found: args.len(),
                span: call.span,
                path: Arc::clone(&call.path),
            });
        }
        Ok(Some(args))
    }

    /// Raw tokens of the directive line after the directive token. The
    /// terminating newline stays in the queue.
    fn take_line(queue: &mut VecDeque<Item>) -> Vec<Token> {
        let mut line = Vec::new();
        while let Some(Item::Tok(tok)) = queue.front() {
            if tok.kind == TokenKind::Newline {
                break;
            }
            if let Some(Item::Tok(tok)) = queue.pop_front() {
                line.push(tok);
            }
        }
        line
    }

    fn directive(&mut self, directive: Directive, tok: Token, queue: &mut VecDeque<Item>, out: &mut Vec<Token>) -> Result<Flow, PreprocessError> {
        let line = Self::take_line(queue);
        match directive {
            Directive::Define => {
                let mac = macros::parse_define(&tok, &line)?;
                debug!(name = %mac.name(), function_like = mac.is_function_like, "define");
                self.macros.define(mac);
            }
            Directive::Undef => {
                match line.iter().find(|t| !t.kind.is_trivia()) {
                    Some(name) if name.is_word() => {
                        debug!(name = %name.lexeme, "undef");
                        self.macros.undefine(&name.lexeme);
                    }
                    _ => {
                        return Err(PreprocessError::BadDefine {
                            message: "expected macro name after '#undef'".to_string(),
                            span: tok.span,
                            path: Arc::clone(&tok.path),
                        })
                    }
                }
            }
            Directive::If => {
                let taken = ConditionEval::new(&line, self.macros, &tok).evaluate()?;
                self.conditions.push(tok.clone(), taken);
                if !taken {
                    self.skip_branch(&tok, queue, out)?;
                }
            }
            Directive::Elseif | Directive::Elif => {
                let Some(frame) = self.conditions.top_mut() else {
                    return Err(stray(directive, &tok));
                };
                if frame.state == FrameState::InElse {
                    return Err(PreprocessError::AfterElse {
                        directive: directive.as_str(),
                        span: tok.span,
                        path: Arc::clone(&tok.path),
                    });
                }
                frame.state = FrameState::InElif;
                let skip = if frame.taken {
                    true
                } else {
                    let taken = ConditionEval::new(&line, self.macros, &tok).evaluate()?;
                    if let Some(frame) = self.conditions.top_mut() {
                        frame.taken = taken;
                    }
                    !taken
                };
                if skip {
                    self.skip_branch(&tok, queue, out)?;
                }
            }
            Directive::Else => {
                let Some(frame) = self.conditions.top_mut() else {
                    return Err(stray(directive, &tok));
                };
                if frame.state == FrameState::InElse {
                    return Err(PreprocessError::AfterElse {
                        directive: directive.as_str(),
                        span: tok.span,
                        path: Arc::clone(&tok.path),
                    });
                }
                frame.state = FrameState::InElse;
                let skip = frame.taken;
                frame.taken = true;
                if skip {
                    self.skip_branch(&tok, queue, out)?;
                }
            }
            Directive::Endif => {
                if self.conditions.pop().is_none() {
                    return Err(stray(directive, &tok));
                }
            }
            Directive::Include | Directive::TryInclude => {
                let target = IncludeTarget::parse(&tok, &line)?;
                self.include(&target, directive == Directive::TryInclude, &tok, out)?;
            }
            Directive::Error => {
                return Err(PreprocessError::User {
                    message: line_text(&line),
                    span: tok.span,
                    path: Arc::clone(&tok.path),
                });
            }
            Directive::Warning => {
                self.reporter.emit(
                    Severity::Warning,
                    codes::PP_USER_WARNING,
                    format!("#warning {}", line_text(&line)),
                    &tok.path,
                    tok.span,
                );
            }
            Directive::Pragma | Directive::Line | Directive::File => {
                trace!(directive = directive.as_str(), "ignoring directive");
            }
            Directive::EndInput => {
                debug!(path = %tok.path, "endinput");
                return Ok(Flow::EndInput);
            }
        }
        Ok(Flow::Done)
    }

    /// Discards tokens up to the next `#elseif`/`#elif`/`#else`/`#endif` of
    /// the current block, which is left in the queue. Newlines are kept.
    fn skip_branch(&mut self, opener: &Token, queue: &mut VecDeque<Item>, out: &mut Vec<Token>) -> Result<(), PreprocessError> {
        let mut nesting = 0usize;
        let mut skipped = 0usize;
        loop {
            let Some(item) = queue.front() else {
                let frame = self.conditions.top_mut().map(|f| f.opener.clone());
                let opener = frame.unwrap_or_else(|| opener.clone());
                return Err(PreprocessError::Unterminated {
                    span: opener.span,
                    path: Arc::clone(&opener.path),
                });
            };
            if let Item::Tok(tok) = item {
                match tok.kind {
                    TokenKind::Directive(Directive::If) => nesting += 1,
                    TokenKind::Directive(Directive::Endif) if nesting > 0 => nesting -= 1,
                    TokenKind::Directive(Directive::Elseif | Directive::Elif | Directive::Else | Directive::Endif)
                        if nesting == 0 =>
                    {
                        trace!(skipped, line = opener.span.line_start, "skipped conditional branch");
                        return Ok(());
                    }
                    _ => {}
                }
            }
            match queue.pop_front() {
                Some(Item::Tok(tok)) if tok.kind == TokenKind::Newline => out.push(tok),
                Some(Item::EndExpansion(name)) => self.deactivate(&name),
                _ => skipped += 1,
            }
        }
    }

    fn include(&mut self, target: &IncludeTarget, optional: bool, tok: &Token, out: &mut Vec<Token>) -> Result<(), PreprocessError> {
        if self.include_depth >= MAX_INCLUDE_DEPTH {
            return Err(PreprocessError::Depth {
                what: "#include",
                span: tok.span,
                path: Arc::clone(&tok.path),
            });
        }

        let Some(file) = include::resolve(target, Path::new(&*tok.path), &self.options.include_dirs) else {
            if optional {
                debug!(name = target.name(), "tryinclude target not found, skipping");
                return Ok(());
            }
            return Err(PreprocessError::IncludeNotFound {
                name: target.name().to_string(),
                span: tok.span,
                path: Arc::clone(&tok.path),
            });
        };

        let key = file.canonicalize().unwrap_or_else(|_| file.clone());
        if !self.included.insert(key) {
            trace!(file = %file.display(), "already included");
            return Ok(());
        }

        let text = std::fs::read_to_string(&file).map_err(|err| PreprocessError::IncludeRead {
            name: target.name().to_string(),
            message: err.to_string(),
            span: tok.span,
            path: Arc::clone(&tok.path),
        })?;
        let text = normalize_source(&text);
        let path: Arc<str> = Arc::from(file.to_string_lossy().as_ref());
        debug!(file = %path, depth = self.include_depth + 1, "include");

        let tokens = Scanner::new(&text, Arc::clone(&path)).tokenize()?;
        self.sources.add(path, text);

        self.include_depth += 1;
        let result = self.process_file(tokens, out);
        self.include_depth -= 1;
        result
    }
}

fn stray(directive: Directive, tok: &Token) -> PreprocessError {
    PreprocessError::Stray {
        directive: directive.as_str(),
        span: tok.span,
        path: Arc::clone(&tok.path),
    }
}

fn line_text(line: &[Token]) -> String {
    line.iter()
        .map(|t| if t.kind.is_trivia() { " " } else { t.lexeme.as_str() })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Preprocesses `tokens` with a fresh run over `macros`.
///
/// Returns the output (when the pass succeeded), every diagnostic, and the
/// text of every included file.
pub fn preprocess(tokens: Vec<Token>, options: &Options, macros: &mut MacroTable) -> (Option<Vec<Token>>, Vec<Diagnostic>, SourceMap) {
    let mut pp = Preprocessor::new(macros, options);
    let result = pp.run(tokens);
    let (mut reporter, sources) = pp.finish();
    match result {
        Ok(tokens) => (Some(tokens), reporter.into_diagnostics(), sources),
        Err(err) => {
            debug!(code = err.code(), "preprocessing failed: {err}");
            reporter.push(err.to_diagnostic());
            (None, reporter.into_diagnostics(), sources)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn run(src: &str) -> Result<Vec<String>, PreprocessError> {
        let mut macros = MacroTable::new();
        let options = Options::default();
        let mut pp = Preprocessor::new(&mut macros, &options);
        let out = pp.run(tokenize(src, "t.sp").unwrap())?;
        Ok(out
            .into_iter()
            .filter(|t| !t.kind.is_trivia() && t.kind != TokenKind::EoF)
            .map(|t| t.lexeme)
            .collect())
    }

    #[test]
    fn test_object_macro() {
        assert_eq!(run("#define N 4\nint a[N];").unwrap(), vec!["int", "a", "[", "4", "]", ";"]);
    }

    #[test]
    fn test_function_macro_with_nested_args() {
        let out = run("#define ADD(%1, %2) (%1 + %2)\nx = ADD(f(1, 2), {3, 4}[0]);").unwrap();
        assert_eq!(
            out,
            vec!["x", "=", "(", "f", "(", "1", ",", "2", ")", "+", "{", "3", ",", "4", "}", "[", "0", "]", ")", ";"]
        );
    }

    #[test]
    fn test_name_without_call_is_plain() {
        assert_eq!(run("#define F(%1) %1\nint F;").unwrap(), vec!["int", "F", ";"]);
    }

    #[test]
    fn test_arity_mismatch() {
        let err = run("#define F(%1, %2) %1\nF(1);").unwrap_err();
        assert!(matches!(err, PreprocessError::Arity { expected: 2, found: 1, .. }));
        assert_eq!(err.code(), codes::PP_ARITY);
    }

    #[test]
    fn test_self_reference_not_expanded() {
        assert_eq!(run("#define foo foo + 1\nfoo").unwrap(), vec!["foo", "+", "1"]);
        assert_eq!(run("#define A B\n#define B A\nA").unwrap(), vec!["A"]);
    }

    #[test]
    fn test_rescan_reaches_following_tokens() {
        assert_eq!(
            run("#define CALL F\n#define F(%1) [%1]\nCALL(2)").unwrap(),
            vec!["[", "2", "]"]
        );
    }

    #[test]
    fn test_nested_call_in_argument() {
        assert_eq!(run("#define TWICE(%1) (%1*2)\nTWICE(TWICE(3))").unwrap(), vec!["(", "(", "3", "*", "2", ")", "*", "2", ")"]);
    }

    #[test]
    fn test_conditionals() {
        assert_eq!(run("#if 0\nA\n#else\nB\n#endif").unwrap(), vec!["B"]);
        assert_eq!(run("#if 0\nA\n#elseif 1\nB\n#else\nC\n#endif").unwrap(), vec!["B"]);
        assert_eq!(run("#if 1\nA\n#elif 1\nB\n#endif").unwrap(), vec!["A"]);
        assert_eq!(run("#if 0\n#if 1\nA\n#endif\nB\n#endif\nC").unwrap(), vec!["C"]);
    }

    #[test]
    fn test_conditional_errors() {
        assert!(matches!(run("#endif").unwrap_err(), PreprocessError::Stray { .. }));
        assert!(matches!(run("#else").unwrap_err(), PreprocessError::Stray { .. }));
        assert!(matches!(
            run("#if 1\n#else\n#elseif 1\n#endif").unwrap_err(),
            PreprocessError::AfterElse { .. }
        ));
        assert!(matches!(run("#if 1\nA").unwrap_err(), PreprocessError::Unterminated { .. }));
        assert!(matches!(run("#if 0\nA").unwrap_err(), PreprocessError::Unterminated { .. }));
    }

    #[test]
    fn test_undef_and_redefine() {
        assert_eq!(run("#define X 1\n#undef X\nX").unwrap(), vec!["X"]);
        assert_eq!(run("#define X 1\n#define X 2\nX").unwrap(), vec!["2"]);
    }

    #[test]
    fn test_error_and_warning() {
        let err = run("#error bad config").unwrap_err();
        assert_eq!(err.to_string(), "#error bad config");

        let mut macros = MacroTable::new();
        let (out, diags, _) = preprocess(tokenize("#warning careful\nx", "t.sp").unwrap(), &Options::default(), &mut macros);
        assert!(out.is_some());
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, codes::PP_USER_WARNING);
    }

    #[test]
    fn test_line_builtin_at_call_site() {
        assert_eq!(run("#define L __LINE__\n\n\nL").unwrap(), vec!["4"]);
    }

    #[test]
    fn test_endinput() {
        assert_eq!(run("A\n#if 1\n#endinput\n#endif\nB").unwrap(), vec!["A"]);
    }

    #[test]
    fn test_expansion_spans_at_call_site() {
        let mut macros = MacroTable::new();
        let options = Options::default();
        let mut pp = Preprocessor::new(&mut macros, &options);
        let out = pp.run(tokenize("#define N 42\n  N;", "t.sp").unwrap()).unwrap();
        let lit = out.iter().find(|t| t.lexeme == "42").unwrap();
        assert_eq!((lit.span.line_start, lit.span.col_start), (2, 3));
    }

    #[test]
    fn test_idempotent_without_macros() {
        let src = "int a = 1;\npublic void F() { a++; }";
        let first = run(src).unwrap();
        let second = run(&first.join(" ")).unwrap();
        assert_eq!(first, second);
    }
}
