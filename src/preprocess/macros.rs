//! Macro definitions, the macro table and body substitution.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::PreprocessError;
use crate::lexer::{Op, Scanner, Token, TokenKind};
use crate::span::{adjust_span, Span};

/// One `#define`.
#[derive(Debug, Clone, PartialEq)]
pub struct Macro {
    pub name: Token,
    /// Placeholder lexemes (`%1`, `%2`, ...) in declaration order.
    pub params: Vec<String>,
    /// Replacement tokens, leading and trailing blanks removed.
    pub body: Vec<Token>,
    pub is_function_like: bool,
}

impl Macro {
    pub fn name(&self) -> &str {
        &self.name.lexeme
    }

    fn param_index(&self, lexeme: &str) -> Option<usize> {
        self.params.iter().position(|p| p == lexeme)
    }

    /// Body of an object-like macro moved onto the call site.
    pub fn expand_object(&self, call: &Token) -> Vec<Token> {
        self.body
            .iter()
            .map(|tok| substitute_line(tok, call).unwrap_or_else(|| relocate(tok, call)))
            .collect()
    }

    /// Body of a function-like macro with its placeholders replaced.
    ///
    /// `raw_args` are the argument token runs as written; `expanded_args` are
    /// the same runs after their own macro expansion. Pasting and
    /// stringification use the raw form.
    pub fn expand_function(&self, call: &Token, raw_args: &[Vec<Token>], expanded_args: &[Vec<Token>]) -> Vec<Token> {
        let mut out: Vec<Token> = Vec::new();
        // Whether the last emitted piece may be glued to the next one
        let mut glue_prev = false;
        let mut prev_is_param = false;

        for tok in &self.body {
            if tok.kind.is_blank() {
                glue_prev = false;
                out.push(relocate(tok, call));
                continue;
            }

            let (piece, is_param) = match tok.kind {
                TokenKind::MacroParam => match self.param_index(&tok.lexeme) {
                    Some(i) => {
                        let next_pastes = glue_prev && pasteable(out.last());
                        let arg = if next_pastes { &raw_args[i] } else { &expanded_args[i] };
                        (arg.clone(), true)
                    }
                    None => (vec![relocate(tok, call)], false),
                },
                TokenKind::MacroStringify => match self.param_index(&tok.lexeme[1..]) {
                    Some(i) => (vec![stringify(&raw_args[i], call)], false),
                    None => (vec![relocate(tok, call)], false),
                },
                _ => (
                    vec![substitute_line(tok, call).unwrap_or_else(|| relocate(tok, call))],
                    false,
                ),
            };

            let paste = glue_prev
                && (is_param || prev_is_param)
                && pasteable(out.last())
                && pasteable(piece.first());
            let mut rest = piece.into_iter();
            if paste {
                if let (Some(left), Some(right)) = (out.pop(), rest.next()) {
                    out.push(paste_tokens(&left, &right, call));
                }
            }
            let before = out.len();
            out.extend(rest);
            // An empty argument leaves nothing to glue to
            glue_prev = paste || out.len() > before || is_param;
            prev_is_param = is_param;
        }
        out
    }
}

fn pasteable(tok: Option<&Token>) -> bool {
    matches!(tok.map(|t| t.kind), Some(TokenKind::Ident | TokenKind::IntLit))
}

fn relocate(tok: &Token, call: &Token) -> Token {
    Token {
        span: adjust_span(call.span, tok.span),
        path: Arc::clone(&call.path),
        ..tok.clone()
    }
}

/// `__LINE__` inside a body becomes the call-site line.
fn substitute_line(tok: &Token, call: &Token) -> Option<Token> {
    (tok.kind == TokenKind::Ident && tok.lexeme == "__LINE__").then(|| {
        Token::new(
            TokenKind::IntLit,
            call.span.line_start.to_string(),
            adjust_span(call.span, tok.span),
            Arc::clone(&call.path),
        )
    })
}

/// Concatenates two lexemes and re-classifies the result by scanning it.
fn paste_tokens(left: &Token, right: &Token, call: &Token) -> Token {
    let text = format!("{}{}", left.lexeme, right.lexeme);
    let kind = match Scanner::new(&text, "<paste>").tokenize() {
        Ok(tokens) if tokens.len() == 2 => tokens[0].kind,
        _ => right.kind,
    };
    let span = Span::new(
        call.span.line_start,
        call.span.col_start,
        call.span.line_start,
        call.span.col_start + text.chars().count(),
    );
    Token::new(kind, text, span, Arc::clone(&call.path))
}

fn stringify(arg: &[Token], call: &Token) -> Token {
    let mut text = String::new();
    for tok in arg {
        if tok.kind.is_trivia() {
            if !text.is_empty() && !text.ends_with(' ') {
                text.push(' ');
            }
        } else {
            text.push_str(&tok.lexeme);
        }
    }
    let escaped = text.trim_end().replace('\\', "\\\\").replace('"', "\\\"");
    Token::new(
        TokenKind::StringLit,
        format!("\"{escaped}\""),
        call.span,
        Arc::clone(&call.path),
    )
}

/// Name → macro. `#define` overwrites, `#undef` removes.
#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    macros: FxHashMap<String, Macro>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, mac: Macro) -> Option<Macro> {
        self.macros.insert(mac.name.lexeme.clone(), mac)
    }

    pub fn undefine(&mut self, name: &str) -> Option<Macro> {
        self.macros.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Macro> {
        self.macros.get(name)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.macros.keys().map(String::as_str)
    }
}

/// Parses the tokens of a `#define` line following the directive token.
///
/// `line` holds every raw token up to (not including) the terminating
/// newline.
pub fn parse_define(directive: &Token, line: &[Token]) -> Result<Macro, PreprocessError> {
    let bad = |message: String, span: Span| PreprocessError::BadDefine {
        message,
        span,
        path: Arc::clone(&directive.path),
    };

    let mut i = 0;
    while i < line.len() && line[i].kind.is_blank() {
        i += 1;
    }
    let name = match line.get(i) {
        Some(tok) if tok.is_word() => tok.clone(),
        Some(tok) => return Err(bad(format!("expected macro name, found {tok}"), tok.span)),
        None => return Err(bad("expected macro name".to_string(), directive.span)),
    };
    i += 1;

    let mut params = Vec::new();
    let is_function_like = line.get(i).is_some_and(|t| t.is_op(Op::LParen));
    if is_function_like {
        let open = &line[i];
        i += 1;
        loop {
            while i < line.len() && line[i].kind.is_blank() {
                i += 1;
            }
            let Some(tok) = line.get(i) else {
                return Err(bad("unterminated macro parameter list".to_string(), open.span));
            };
            if tok.is_op(Op::RParen) && params.is_empty() {
                i += 1;
                break;
            }
            if tok.kind != TokenKind::MacroParam {
                return Err(bad(format!("expected macro parameter like '%1', found {tok}"), tok.span));
            }
            if params.contains(&tok.lexeme) {
                return Err(bad(format!("duplicate macro parameter '{}'", tok.lexeme), tok.span));
            }
            params.push(tok.lexeme.clone());
            i += 1;
            while i < line.len() && line[i].kind.is_blank() {
                i += 1;
            }
            match line.get(i) {
                Some(t) if t.is_op(Op::Comma) => i += 1,
                Some(t) if t.is_op(Op::RParen) => {
                    i += 1;
                    break;
                }
                Some(t) => return Err(bad(format!("expected ',' or ')' in parameter list, found {t}"), t.span)),
                None => return Err(bad("unterminated macro parameter list".to_string(), open.span)),
            }
        }
    }

    let mut body: Vec<Token> = line[i..]
        .iter()
        .filter(|t| t.kind != TokenKind::Comment)
        .cloned()
        .collect();
    while body.first().is_some_and(|t| t.kind.is_blank()) {
        body.remove(0);
    }
    while body.last().is_some_and(|t| t.kind.is_blank()) {
        body.pop();
    }

    Ok(Macro {
        name,
        params,
        body,
        is_function_like,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn define(src: &str) -> Macro {
        let tokens = tokenize(src, "m.sp").unwrap();
        let line: Vec<Token> = tokens[1..]
            .iter()
            .take_while(|t| t.kind != TokenKind::Newline && t.kind != TokenKind::EoF)
            .cloned()
            .collect();
        parse_define(&tokens[0], &line).unwrap()
    }

    fn lexemes(tokens: &[Token]) -> Vec<&str> {
        tokens
            .iter()
            .filter(|t| !t.kind.is_trivia())
            .map(|t| t.lexeme.as_str())
            .collect()
    }

    fn call_token() -> Token {
        Token::new(TokenKind::Ident, "M", Span::new(7, 3, 7, 4), Arc::from("main.sp"))
    }

    #[test]
    fn test_object_like() {
        let mac = define("#define MAX_PLAYERS 65");
        assert!(!mac.is_function_like);
        assert_eq!(lexemes(&mac.body), vec!["65"]);
    }

    #[test]
    fn test_function_like_needs_adjacent_paren() {
        let mac = define("#define F(%1, %2) %1 + %2");
        assert!(mac.is_function_like);
        assert_eq!(mac.params, vec!["%1", "%2"]);

        let obj = define("#define G (1)");
        assert!(!obj.is_function_like);
        assert_eq!(lexemes(&obj.body), vec!["(", "1", ")"]);
    }

    #[test]
    fn test_duplicate_params_rejected() {
        let tokens = tokenize("#define F(%1, %1) %1", "m.sp").unwrap();
        let line: Vec<Token> = tokens[1..tokens.len() - 1].to_vec();
        assert!(matches!(
            parse_define(&tokens[0], &line),
            Err(PreprocessError::BadDefine { .. })
        ));
    }

    #[test]
    fn test_object_expansion_moves_spans() {
        let mac = define("#define LINE __LINE__");
        let out = mac.expand_object(&call_token());
        assert_eq!(out[0].kind, TokenKind::IntLit);
        assert_eq!(out[0].lexeme, "7");
        assert_eq!(out[0].span.line_start, 7);
        assert_eq!(&*out[0].path, "main.sp");
    }

    #[test]
    fn test_pasting_and_stringify() {
        let mac = define("#define DECL(%1) int g_%1 = %1; char s[] = #%1");
        let arg = tokenize("Count", "a.sp").unwrap()[..1].to_vec();
        let out = mac.expand_function(&call_token(), &[arg.clone()], &[arg]);
        let words = lexemes(&out);
        assert_eq!(words, vec!["int", "g_Count", "=", "Count", ";", "char", "s", "[", "]", "=", "\"Count\""]);
        let pasted = out.iter().find(|t| t.lexeme == "g_Count").unwrap();
        assert_eq!(pasted.kind, TokenKind::Ident);
    }

    #[test]
    fn test_paste_reclassifies_as_number() {
        let mac = define("#define NUM(%1) 1%1");
        let arg = tokenize("0", "a.sp").unwrap()[..1].to_vec();
        let out = mac.expand_function(&call_token(), &[arg.clone()], &[arg]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].lexeme, "10");
        assert_eq!(out[0].kind, TokenKind::IntLit);
    }

    #[test]
    fn test_paste_name_with_number_stays_a_name() {
        let mac = define("#define SLOT(%1) Slot_%1");
        let arg = tokenize("3", "a.sp").unwrap()[..1].to_vec();
        let out = mac.expand_function(&call_token(), &[arg.clone()], &[arg]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].lexeme, "Slot_3");
        assert_eq!(out[0].kind, TokenKind::Ident);
    }
}
