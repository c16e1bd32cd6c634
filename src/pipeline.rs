//! Entry points that run the stages in order.
//!
//! Every entry point returns an [`Outcome`]: the (possibly partial) result,
//! an explicit success flag, every diagnostic produced on the way, and the
//! text of every file read so diagnostics can be rendered with excerpts.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::diagnostics::{codes, Diagnostic, SourceMap};
use crate::lexer::{normalize_source, Scanner, Token, TokenKind};
use crate::options::Options;
use crate::parser::ast::{Expr, Plugin, Stmt};
use crate::parser::{ParseError, Parser};
use crate::preprocess::{self, MacroTable};
use crate::span::Span;
use crate::types::{check_plugin, Checker, EvalError, Evaluator, TypeAndVal};

/// Path given to code passed in as a string.
pub const STRING_PATH: &str = "<string>";

const AUTO_INCLUDE: &str = "#tryinclude <sourcemod>\n";

/// Result of running one or more stages.
#[derive(Debug)]
pub struct Outcome<T> {
    /// `None` when a stage failed hard (lex error, preprocessor error).
    pub value: Option<T>,
    /// No error-severity diagnostic was produced.
    pub ok: bool,
    pub diagnostics: Vec<Diagnostic>,
    pub sources: SourceMap,
}

impl<T> Outcome<T> {
    fn new(value: Option<T>, diagnostics: Vec<Diagnostic>, sources: SourceMap) -> Self {
        let ok = value.is_some() && !diagnostics.iter().any(Diagnostic::is_error);
        Self {
            value,
            ok,
            diagnostics,
            sources,
        }
    }

    fn failed(diagnostics: Vec<Diagnostic>, sources: SourceMap) -> Self {
        Self::new(None, diagnostics, sources)
    }

    /// Every diagnostic rendered with source excerpts, one after another.
    pub fn render(&self, color: bool) -> String {
        self.diagnostics
            .iter()
            .map(|d| d.render(&self.sources, color))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn into_result(self) -> Result<T, Vec<Diagnostic>> {
        match self.value {
            Some(value) if self.ok => Ok(value),
            _ => Err(self.diagnostics),
        }
    }

    fn and_then<U>(self, f: impl FnOnce(T) -> Outcome<U>) -> Outcome<U> {
        let Some(value) = self.value else {
            return Outcome::failed(self.diagnostics, self.sources);
        };
        let next = f(value);
        let mut diagnostics = self.diagnostics;
        diagnostics.extend(next.diagnostics);
        let mut sources = self.sources;
        sources.merge(next.sources);
        Outcome::new(next.value, diagnostics, sources)
    }
}

/// Read, scan and (per `options`) preprocess the file at `path`.
pub fn lex_file(path: impl AsRef<Path>, options: &Options, macros: &mut MacroTable) -> Outcome<Vec<Token>> {
    let path = path.as_ref();
    let name: Arc<str> = Arc::from(path.to_string_lossy().as_ref());
    match fs::read_to_string(path) {
        Ok(text) => lex_source(&text, name, options, macros),
        Err(err) => {
            let diag = Diagnostic::error(
                codes::PP_INCLUDE,
                format!("cannot read '{name}': {err}"),
                Arc::clone(&name),
                Span::point(1, 1),
            );
            Outcome::failed(vec![diag], SourceMap::new())
        }
    }
}

/// Scan and (per `options`) preprocess `code`. Relative includes resolve
/// against the working directory.
pub fn lex_string(code: &str, options: &Options, macros: &mut MacroTable) -> Outcome<Vec<Token>> {
    lex_source(code, Arc::from(STRING_PATH), options, macros)
}

fn lex_source(text: &str, path: Arc<str>, options: &Options, macros: &mut MacroTable) -> Outcome<Vec<Token>> {
    let text = normalize_source(text);
    let mut sources = SourceMap::new();
    sources.add(Arc::clone(&path), text.clone());

    let mut tokens = match Scanner::new(&text, Arc::clone(&path)).tokenize() {
        Ok(tokens) => tokens,
        Err(err) => return Outcome::failed(vec![err.to_diagnostic()], sources),
    };
    debug!(file = %path, tokens = tokens.len(), "scanned");

    if !options.run_preprocessor {
        return Outcome::new(Some(strip_trivia(tokens, options)), Vec::new(), sources);
    }

    if options.auto_include {
        // Scanned on its own so the file's line numbers are unaffected
        match Scanner::new(AUTO_INCLUDE, Arc::clone(&path)).tokenize() {
            Ok(mut prelude) => {
                prelude.retain(|t| t.kind != TokenKind::EoF);
                prelude.append(&mut tokens);
                tokens = prelude;
            }
            Err(err) => return Outcome::failed(vec![err.to_diagnostic()], sources),
        }
    }

    Outcome::new(Some(tokens), Vec::new(), sources).and_then(|tokens| preprocess(tokens, options, macros))
}

/// Run the preprocessor over already scanned tokens, then strip trivia per
/// `options`.
pub fn preprocess(tokens: Vec<Token>, options: &Options, macros: &mut MacroTable) -> Outcome<Vec<Token>> {
    let (tokens, diagnostics, sources) = preprocess::preprocess(tokens, options, macros);
    debug!(macros = macros.len(), ok = tokens.is_some(), "preprocessed");
    Outcome::new(tokens.map(|t| strip_trivia(t, options)), diagnostics, sources)
}

/// Drop spaces and tabs, plus comments and newlines unless `options` keeps
/// them.
fn strip_trivia(tokens: Vec<Token>, options: &Options) -> Vec<Token> {
    tokens
        .into_iter()
        .filter(|t| match t.kind {
            TokenKind::Space | TokenKind::Tab => false,
            TokenKind::Comment => !options.strip_comments,
            TokenKind::Newline => options.preserve_newlines,
            _ => true,
        })
        .collect()
}

/// Parse a token stream with the default error cap.
pub fn parse(tokens: Vec<Token>) -> Outcome<Plugin> {
    parse_with(tokens, &Options::default())
}

/// Parse a token stream. The plugin is returned even when syntax errors
/// were recovered from.
pub fn parse_with(tokens: Vec<Token>, options: &Options) -> Outcome<Plugin> {
    let mut parser = Parser::new(tokens, options.max_errors);
    let plugin = parser.parse_plugin();
    debug!(decls = plugin.decls.len(), errors = parser.error_count(), "parsed");
    Outcome::new(Some(plugin), parser.into_diagnostics(), SourceMap::new())
}

fn fragment<T>(code: &str, production: impl FnOnce(&mut Parser) -> Result<T, ParseError>) -> Outcome<T> {
    let options = Options::default();
    let mut macros = MacroTable::new();
    lex_string(code, &options, &mut macros).and_then(|tokens| {
        let mut parser = Parser::new(tokens, options.max_errors);
        match production(&mut parser) {
            Ok(value) => Outcome::new(Some(value), parser.into_diagnostics(), SourceMap::new()),
            Err(err) => {
                let mut diagnostics = parser.into_diagnostics();
                diagnostics.push(err.to_diagnostic());
                Outcome::failed(diagnostics, SourceMap::new())
            }
        }
    })
}

/// Parse `code` as exactly one expression.
pub fn parse_expression(code: &str) -> Outcome<Expr> {
    fragment(code, Parser::parse_single_expression)
}

/// Parse `code` as exactly one statement.
pub fn parse_statement(code: &str) -> Outcome<Stmt> {
    fragment(code, Parser::parse_single_statement)
}

/// Scan, preprocess, parse and fold `code` as one constant expression.
/// Macros defined by `code` stay in `macros`.
pub fn eval_expression(code: &str, options: &Options, macros: &mut MacroTable) -> Outcome<TypeAndVal> {
    lex_string(code, options, macros).and_then(|tokens| {
        let mut parser = Parser::new(tokens, options.max_errors);
        let expr = match parser.parse_single_expression() {
            Ok(expr) => expr,
            Err(err) => {
                let mut diagnostics = parser.into_diagnostics();
                diagnostics.push(err.to_diagnostic());
                return Outcome::failed(diagnostics, SourceMap::new());
            }
        };
        let mut evaluator = Evaluator::new(STRING_PATH);
        let value = evaluator.eval_expr(&expr);
        Outcome::new(Some(value), evaluator.into_diagnostics(), SourceMap::new())
    })
}

/// Type-check `plugin` in place.
pub fn check(plugin: &mut Plugin, path: &str) -> Outcome<()> {
    let diagnostics = check_plugin(plugin, path);
    Outcome::new(Some(()), diagnostics, SourceMap::new())
}

/// Type-check `plugin`, then run the body of its parameterless function
/// `name` with the plugin's global constants in scope. The value the body
/// returns is the result.
pub fn eval_function(plugin: &mut Plugin, name: &str, path: &str, options: &Options) -> Outcome<TypeAndVal> {
    let path: Arc<str> = Arc::from(path);
    let mut checker = Checker::new(Arc::clone(&path));
    checker.check(plugin);
    let (evaluator, mut diagnostics) = checker.into_constants();

    let Some((func, body)) = plugin
        .functions()
        .find_map(|f| f.body.as_deref().filter(|_| f.name == name).map(|body| (f, body)))
    else {
        let err = EvalError::Undefined {
            name: name.to_string(),
            span: Span::point(1, 1),
        };
        diagnostics.push(err.to_diagnostic(&path));
        return Outcome::failed(diagnostics, SourceMap::new());
    };
    if let Some(param) = func.params.first() {
        let err = EvalError::NotConstant {
            what: "function parameter",
            span: param.span,
        };
        diagnostics.push(err.to_diagnostic(&path));
        return Outcome::failed(diagnostics, SourceMap::new());
    }

    let mut evaluator = evaluator.with_max_iterations(options.max_iterations);
    let value = evaluator.run(body);
    debug!(function = name, "evaluated");
    diagnostics.extend(evaluator.into_diagnostics());
    Outcome::new(Some(value), diagnostics, SourceMap::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConstValue;

    fn lexemes(tokens: &[Token]) -> Vec<&str> {
        tokens
            .iter()
            .filter(|t| t.kind != TokenKind::EoF)
            .map(|t| t.lexeme.as_str())
            .collect()
    }

    #[test]
    fn test_lex_string_preprocesses() {
        let mut macros = MacroTable::new();
        let out = lex_string("#define N 3\r\nint a[N]; // size\n", &Options::default(), &mut macros);
        assert!(out.ok);
        assert_eq!(lexemes(&out.value.unwrap()), vec!["int", "a", "[", "3", "]", ";"]);
        assert!(macros.is_defined("N"));
    }

    #[test]
    fn test_raw_options_keep_comments_and_newlines() {
        let mut macros = MacroTable::new();
        let out = lex_string("#define N 3\nN // c\n", &Options::raw(), &mut macros);
        let tokens = out.value.unwrap();
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Comment));
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Newline));
        assert!(tokens.iter().any(|t| t.lexeme == "N"));
        assert!(macros.is_empty());
    }

    #[test]
    fn test_lex_error_fails() {
        let out = lex_string("int a = 0x;", &Options::default(), &mut MacroTable::new());
        assert!(!out.ok);
        assert!(out.value.is_none());
        assert_eq!(out.diagnostics[0].code, codes::LEX);
    }

    #[test]
    fn test_auto_include_is_optional() {
        let options = Options::default().with_auto_include(true);
        let out = lex_string("int x;", &options, &mut MacroTable::new());
        assert!(out.ok, "{}", out.render(false));
        assert_eq!(lexemes(&out.value.unwrap()), vec!["int", "x", ";"]);
    }

    #[test]
    fn test_eval_expression_with_macros() {
        let mut macros = MacroTable::new();
        let out = eval_expression("#define TWICE(%1) ((%1) * 2)\nTWICE(4) + 1", &Options::default(), &mut macros);
        assert!(out.ok, "{}", out.render(false));
        assert_eq!(out.value.unwrap().value, Some(ConstValue::Int(9)));
    }

    #[test]
    fn test_parse_keeps_partial_plugin() {
        let tokens = lex_string("int a = 1\nint b = 2;", &Options::default(), &mut MacroTable::new())
            .value
            .unwrap();
        let out = parse(tokens);
        assert!(!out.ok);
        assert_eq!(out.diagnostics.len(), 1);
        assert!(out.value.is_some());
    }

    #[test]
    fn test_eval_function_sees_global_constants() {
        let src = "enum { Red, Green, Blue }\nconst int BASE = 100;\nint Pick() { int total = BASE; for (int i = Red; i <= Blue; i++) total += i; return total; }\nint Scaled(int by) { return BASE * by; }";
        let tokens = lex_string(src, &Options::default(), &mut MacroTable::new()).value.unwrap();
        let mut plugin = parse(tokens).value.unwrap();

        let out = eval_function(&mut plugin, "Pick", "t.sp", &Options::default());
        assert!(out.ok, "{:?}", out.diagnostics);
        assert_eq!(out.value.unwrap().value, Some(ConstValue::Int(103)));

        let out = eval_function(&mut plugin, "Scaled", "t.sp", &Options::default());
        assert!(!out.ok);
        assert_eq!(out.diagnostics[0].code, codes::NOT_CONSTANT);
    }

    #[test]
    fn test_fragments() {
        assert!(parse_expression("a[1] + f(2)").ok);
        assert!(parse_statement("if (x) { return; }").ok);
        let out = parse_expression("1 +");
        assert!(!out.ok);
        assert_eq!(out.diagnostics[0].code, codes::SYNTAX);
    }
}
