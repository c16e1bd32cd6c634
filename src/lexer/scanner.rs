//! Scanner (tokenizer) for SourcePawn source.
//!
//! Converts raw source text into a flat [`Token`] sequence in a single
//! left-to-right pass with no backtracking. Trivia is kept as tokens (one per
//! run of spaces, tabs or newlines, one per comment) so the preprocessor can
//! see line structure; later stages filter it out.
//!
//! Inside a `#define` line the preprocessor sub-lexis is active: `%1` scans
//! as a [`TokenKind::MacroParam`] and `#%1` as a
//! [`TokenKind::MacroStringify`]. Other directive lines scan `%` as the
//! modulo operator. A newline that is not escaped by a trailing backslash
//! ends the directive line.

use std::sync::Arc;

use thiserror::Error;

use super::literal;
use super::token::{Directive, Keyword, Op, Token, TokenKind};
use crate::diagnostics::{codes, Diagnostic};
use crate::span::Span;

/// Malformed literal, unknown operator or unknown character.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct LexError {
    pub message: String,
    pub span: Span,
    pub path: Arc<str>,
}

impl LexError {
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(codes::LEX, self.message.clone(), Arc::clone(&self.path), self.span)
    }
}

/// Scanner over one source text.
pub struct Scanner {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
    path: Arc<str>,
    in_directive: bool,
    /// The directive line is a `#define`: `%N` placeholders are live.
    in_define: bool,
}

impl Scanner {
    pub fn new(input: &str, path: impl Into<Arc<str>>) -> Self {
        Self {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
            path: path.into(),
            in_directive: false,
            in_define: false,
        }
    }

    /// Tokenize the entire input. The result always ends with an `EoF` token.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        while let Some(ch) = self.peek() {
            let token = self.next_token(ch)?;
            tokens.push(token);
        }
        let end = Span::point(self.line, self.column);
        tokens.push(Token::new(TokenKind::EoF, "", end, Arc::clone(&self.path)));
        Ok(tokens)
    }

    fn next_token(&mut self, ch: char) -> Result<Token, LexError> {
        let start = (self.position, self.line, self.column);

        let kind = match ch {
            ' ' => {
                self.eat_while(|c| c == ' ');
                TokenKind::Space
            }
            '\t' => {
                self.eat_while(|c| c == '\t');
                TokenKind::Tab
            }
            '\r' | '\n' => {
                self.eat_while(|c| c == '\n' || c == '\r');
                self.in_directive = false;
                self.in_define = false;
                TokenKind::Newline
            }
            '\\' if self.in_directive && matches!(self.peek_ahead(1), Some('\n' | '\r')) => {
                // Line continuation inside a directive
                self.advance();
                if self.peek() == Some('\r') {
                    self.advance();
                }
                if self.peek() == Some('\n') {
                    self.advance();
                }
                TokenKind::Space
            }
            '/' if self.peek_ahead(1) == Some('/') => {
                self.eat_while(|c| c != '\n' && c != '\r');
                TokenKind::Comment
            }
            '/' if self.peek_ahead(1) == Some('*') => {
                self.block_comment()?;
                TokenKind::Comment
            }
            'a'..='z' | 'A'..='Z' | '_' => self.identifier_or_keyword(),
            '0'..='9' => self.number_literal()?,
            '\'' => {
                self.quoted('\'')?;
                TokenKind::CharLit
            }
            '"' => {
                if self.peek_ahead(1) == Some('"') && self.peek_ahead(2) == Some('"') {
                    self.raw_string()?;
                } else {
                    self.quoted('"')?;
                }
                TokenKind::StringLit
            }
            '#' => self.directive()?,
            '%' if self.in_define && self.peek_ahead(1).is_some_and(|c| c.is_ascii_digit()) => {
                self.advance();
                self.eat_while(|c| c.is_ascii_digit());
                TokenKind::MacroParam
            }
            _ => self.operator()?,
        };

        let lexeme: String = self.input[start.0..self.position].iter().collect();
        let span = Span::new(start.1, start.2, self.line, self.column);
        Ok(Token::new(kind, lexeme, span, Arc::clone(&self.path)))
    }

    fn identifier_or_keyword(&mut self) -> TokenKind {
        let start = self.position;
        self.eat_while(|c| c.is_ascii_alphanumeric() || c == '_');
        let word: String = self.input[start..self.position].iter().collect();
        match Keyword::lookup(&word) {
            Some(kw) => TokenKind::Keyword(kw),
            None => TokenKind::Ident,
        }
    }

    /// Numeric literal in one of four dialects: `0b`, `0x`, `0o` or decimal /
    /// float. `_` separates digits.
    fn number_literal(&mut self) -> Result<TokenKind, LexError> {
        let start = self.current_span();
        let prefix = match (self.peek(), self.peek_ahead(1)) {
            (Some('0'), Some('x' | 'X')) => Some(16),
            (Some('0'), Some('b' | 'B')) => Some(2),
            (Some('0'), Some('o' | 'O')) => Some(8),
            _ => None,
        };

        let kind = if let Some(radix) = prefix {
            self.advance();
            self.advance();
            let digits = self.digit_run(radix);
            if digits == 0 {
                return Err(self.error("missing digits after radix prefix", start));
            }
            TokenKind::IntLit
        } else {
            self.digit_run(10);
            // Decision point: `.` followed by a digit re-scans as a float
            if self.peek() == Some('.') && self.peek_ahead(1).is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
                self.digit_run(10);
                if matches!(self.peek(), Some('e' | 'E')) {
                    self.advance();
                    if matches!(self.peek(), Some('+' | '-')) {
                        self.advance();
                    }
                    if self.digit_run(10) == 0 {
                        return Err(self.error("missing exponent digits in float literal", start));
                    }
                }
                TokenKind::FloatLit
            } else {
                TokenKind::IntLit
            }
        };

        if self.input[self.position - 1] == '_' {
            return Err(self.error("numeric literal ends with a digit separator", start));
        }
        if let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                return Err(self.error(format!("invalid character '{c}' in numeric literal"), start));
            }
        }
        Ok(kind)
    }

    /// Consumes digits of `radix` and `_` separators; returns the digit count.
    /// Any other alphanumeric directly after stops the run and is rejected by
    /// the caller.
    fn digit_run(&mut self, radix: u32) -> usize {
        let mut count = 0;
        while let Some(c) = self.peek() {
            if c.is_digit(radix) {
                count += 1;
            } else if c != '_' || count == 0 {
                break;
            }
            self.advance();
        }
        count
    }

    fn quoted(&mut self, quote: char) -> Result<(), LexError> {
        let start = self.current_span();
        let begin = self.position;
        self.advance();
        loop {
            match self.peek() {
                None | Some('\n') | Some('\r') => {
                    let what = if quote == '"' { "string" } else { "character" };
                    return Err(self.error(format!("unterminated {what} literal"), start));
                }
                Some('\\') => {
                    self.advance();
                    self.advance();
                }
                Some(c) => {
                    self.advance();
                    if c == quote {
                        break;
                    }
                }
            }
        }

        let lexeme: String = self.input[begin..self.position].iter().collect();
        let checked = if quote == '\'' {
            literal::char_value(&lexeme).map(|_| ())
        } else {
            literal::unescape(&lexeme).map(|_| ())
        };
        checked.map_err(|message| self.error(message, start))
    }

    fn raw_string(&mut self) -> Result<(), LexError> {
        let start = self.current_span();
        for _ in 0..3 {
            self.advance();
        }
        loop {
            if self.peek().is_none() {
                return Err(self.error("unterminated raw string literal", start));
            }
            if self.peek() == Some('"') && self.peek_ahead(1) == Some('"') && self.peek_ahead(2) == Some('"') {
                for _ in 0..3 {
                    self.advance();
                }
                return Ok(());
            }
            self.advance();
        }
    }

    fn block_comment(&mut self) -> Result<(), LexError> {
        let start = self.current_span();
        self.advance();
        self.advance();
        while !self.is_at_end() {
            if self.peek() == Some('*') && self.peek_ahead(1) == Some('/') {
                self.advance();
                self.advance();
                return Ok(());
            }
            self.advance();
        }
        Err(self.error("unterminated block comment", start))
    }

    /// `#word` directive, or `#%N` stringification inside a `#define` line.
    fn directive(&mut self) -> Result<TokenKind, LexError> {
        let start = self.current_span();
        if self.in_define
            && self.peek_ahead(1) == Some('%')
            && self.peek_ahead(2).is_some_and(|c| c.is_ascii_digit())
        {
            self.advance();
            self.advance();
            self.eat_while(|c| c.is_ascii_digit());
            return Ok(TokenKind::MacroStringify);
        }

        self.advance();
        let begin = self.position;
        self.eat_while(|c| c.is_ascii_alphanumeric() || c == '_');
        let word: String = self.input[begin..self.position].iter().collect();
        match Directive::lookup(&word) {
            Some(directive) => {
                self.in_directive = true;
                self.in_define = directive == Directive::Define;
                Ok(TokenKind::Directive(directive))
            }
            None if word.is_empty() => Err(self.error("stray '#'", start)),
            None => Err(self.error(format!("unknown directive '#{word}'"), start)),
        }
    }

    fn operator(&mut self) -> Result<TokenKind, LexError> {
        let start = self.current_span();
        for &op in Op::ALL {
            let text = op.as_str();
            let matches = text
                .chars()
                .enumerate()
                .all(|(i, c)| self.peek_ahead(i) == Some(c));
            if matches {
                for _ in 0..text.len() {
                    self.advance();
                }
                return Ok(TokenKind::Op(op));
            }
        }
        let ch = self.peek().unwrap_or('\0');
        Err(self.error(format!("unexpected character '{ch}'"), start))
    }

    fn error(&self, message: impl Into<String>, start: Span) -> LexError {
        LexError {
            message: message.into(),
            span: Span::new(start.line_start, start.col_start, self.line, self.column.max(start.col_start + 1)),
            path: Arc::clone(&self.path),
        }
    }

    fn eat_while(&mut self, pred: impl Fn(char) -> bool) {
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.advance();
        }
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_ahead(&self, n: usize) -> Option<char> {
        self.input.get(self.position + n).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = *self.input.get(self.position)?;
        self.position += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn current_span(&self) -> Span {
        Span::point(self.line, self.column)
    }
}

/// Normalises line endings to `\n` and tabs to four spaces.
pub fn normalize_source(source: &str) -> String {
    source
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\t', "    ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Scanner::new(src, "test.sp")
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .filter(|k| !k.is_trivia())
            .collect()
    }

    #[test]
    fn test_simple_tokens() {
        let toks = kinds("int main() { return 0; }");
        assert_eq!(
            toks,
            vec![
                TokenKind::Keyword(Keyword::Int),
                TokenKind::Ident,
                TokenKind::Op(Op::LParen),
                TokenKind::Op(Op::RParen),
                TokenKind::Op(Op::LBrace),
                TokenKind::Keyword(Keyword::Return),
                TokenKind::IntLit,
                TokenKind::Op(Op::Semicolon),
                TokenKind::Op(Op::RBrace),
                TokenKind::EoF,
            ]
        );
    }

    #[test]
    fn test_whitespace_runs_are_single_tokens() {
        let toks = Scanner::new("a   b\n\n\nc", "t.sp").tokenize().unwrap();
        let k: Vec<TokenKind> = toks.iter().map(|t| t.kind).collect();
        assert_eq!(
            k,
            vec![
                TokenKind::Ident,
                TokenKind::Space,
                TokenKind::Ident,
                TokenKind::Newline,
                TokenKind::Ident,
                TokenKind::EoF
            ]
        );
        assert_eq!(toks[4].span.line_start, 4);
    }

    #[test]
    fn test_longest_match() {
        let toks = kinds(">>>= >>> >> > ... ::");
        assert_eq!(
            toks,
            vec![
                TokenKind::Op(Op::UshrAssign),
                TokenKind::Op(Op::Ushr),
                TokenKind::Op(Op::Shr),
                TokenKind::Op(Op::Gt),
                TokenKind::Op(Op::Ellipsis),
                TokenKind::Op(Op::ColonColon),
                TokenKind::EoF,
            ]
        );
    }

    #[test]
    fn test_float_decision_point() {
        assert_eq!(
            kinds("4.x"),
            vec![TokenKind::IntLit, TokenKind::Op(Op::Dot), TokenKind::Ident, TokenKind::EoF]
        );
        assert_eq!(
            kinds("1.5 2 3.14e2 a.b"),
            vec![
                TokenKind::FloatLit,
                TokenKind::IntLit,
                TokenKind::FloatLit,
                TokenKind::Ident,
                TokenKind::Op(Op::Dot),
                TokenKind::Ident,
                TokenKind::EoF,
            ]
        );
    }

    #[test]
    fn test_malformed_literals() {
        for bad in ["0b102", "0x", "12ab", "1_", "0o9", "1.5e", "'ab'", "\"open"] {
            assert!(Scanner::new(bad, "t.sp").tokenize().is_err(), "{bad} should fail");
        }
    }

    #[test]
    fn test_directive_sublexis() {
        let toks = kinds("#define STR(%1) #%1\n%1");
        assert_eq!(
            toks,
            vec![
                TokenKind::Directive(Directive::Define),
                TokenKind::Ident,
                TokenKind::Op(Op::LParen),
                TokenKind::MacroParam,
                TokenKind::Op(Op::RParen),
                TokenKind::MacroStringify,
                TokenKind::Op(Op::Percent),
                TokenKind::IntLit,
                TokenKind::EoF,
            ]
        );
    }

    #[test]
    fn test_percent_is_modulo_outside_define() {
        let toks = kinds("#if X%2\n#endif");
        assert_eq!(
            &toks[..4],
            &[
                TokenKind::Directive(Directive::If),
                TokenKind::Ident,
                TokenKind::Op(Op::Percent),
                TokenKind::IntLit,
            ]
        );
    }

    #[test]
    fn test_line_continuation_keeps_directive() {
        let toks = kinds("#define A \\\n%1\nx");
        assert_eq!(toks[2], TokenKind::MacroParam);
    }

    #[test]
    fn test_comments() {
        let toks = Scanner::new("x // c\n/* a\nb */ y", "t.sp").tokenize().unwrap();
        let comments: Vec<&str> = toks
            .iter()
            .filter(|t| t.kind == TokenKind::Comment)
            .map(|t| t.lexeme.as_str())
            .collect();
        assert_eq!(comments, vec!["// c", "/* a\nb */"]);
        assert!(Scanner::new("/* open", "t.sp").tokenize().is_err());
    }

    #[test]
    fn test_unknown_character() {
        let err = Scanner::new("int x = 1 @ 2;", "t.sp").tokenize().unwrap_err();
        assert_eq!(err.span.col_start, 11);
    }
}
