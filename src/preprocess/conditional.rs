//! Conditional compilation: the `#if` frame stack and the condition evaluator.

use std::sync::Arc;

use super::macros::MacroTable;
use super::PreprocessError;
use crate::lexer::{literal, Keyword, Op, Token, TokenKind};
use crate::span::Span;

/// Which branch of an `#if` block the preprocessor is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    InThen,
    InElif,
    InElse,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub state: FrameState,
    /// Some branch of this block has already been taken.
    pub taken: bool,
    /// The opening `#if`, for unterminated-block diagnostics.
    pub opener: Token,
}

#[derive(Debug, Default)]
pub struct ConditionStack {
    frames: Vec<Frame>,
}

impl ConditionStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, opener: Token, taken: bool) {
        self.frames.push(Frame {
            state: FrameState::InThen,
            taken,
            opener,
        });
    }

    pub fn top_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Drops frames opened past `depth`; returns the innermost dropped one.
    pub fn truncate(&mut self, depth: usize) -> Option<Frame> {
        let innermost = if self.frames.len() > depth { self.frames.pop() } else { None };
        self.frames.truncate(depth);
        innermost
    }
}

/// Guards recursive evaluation of object-like macros inside a condition.
const MAX_CONDITION_DEPTH: usize = 64;

/// Precedence-climbing integer evaluator over the tokens of one `#if` line.
pub struct ConditionEval<'a> {
    tokens: Vec<Token>,
    position: usize,
    macros: &'a MacroTable,
    directive: &'a Token,
    depth: usize,
}

impl<'a> ConditionEval<'a> {
    /// `tokens` is the rest of the directive line; trivia is ignored.
    pub fn new(tokens: &[Token], macros: &'a MacroTable, directive: &'a Token) -> Self {
        Self::nested(tokens, macros, directive, 0)
    }

    fn nested(tokens: &[Token], macros: &'a MacroTable, directive: &'a Token, depth: usize) -> Self {
        Self {
            tokens: tokens.iter().filter(|t| !t.kind.is_trivia()).cloned().collect(),
            position: 0,
            macros,
            directive,
            depth,
        }
    }

    pub fn evaluate(mut self) -> Result<bool, PreprocessError> {
        Ok(self.eval_to_end()? != 0)
    }

    fn eval_to_end(&mut self) -> Result<i32, PreprocessError> {
        if self.tokens.is_empty() {
            return Err(self.error("expected an expression after the directive", self.directive.span));
        }
        let value = self.logical_or()?;
        if let Some(tok) = self.peek() {
            let span = tok.span;
            return Err(self.error(format!("unexpected {tok} in condition"), span));
        }
        Ok(value)
    }

    fn logical_or(&mut self) -> Result<i32, PreprocessError> {
        let mut left = self.logical_and()?;
        while self.eat(Op::OrOr) {
            let right = self.logical_and()?;
            left = ((left != 0) || (right != 0)) as i32;
        }
        Ok(left)
    }

    fn logical_and(&mut self) -> Result<i32, PreprocessError> {
        let mut left = self.comparison()?;
        while self.eat(Op::AndAnd) {
            let right = self.comparison()?;
            left = ((left != 0) && (right != 0)) as i32;
        }
        Ok(left)
    }

    fn comparison(&mut self) -> Result<i32, PreprocessError> {
        let mut left = self.additive()?;
        loop {
            let op = match self.peek_op() {
                Some(op @ (Op::EqEq | Op::NotEq | Op::Lt | Op::LtEq | Op::Gt | Op::GtEq)) => op,
                _ => break,
            };
            self.position += 1;
            let right = self.additive()?;
            left = match op {
                Op::EqEq => left == right,
                Op::NotEq => left != right,
                Op::Lt => left < right,
                Op::LtEq => left <= right,
                Op::Gt => left > right,
                _ => left >= right,
            } as i32;
        }
        Ok(left)
    }

    fn additive(&mut self) -> Result<i32, PreprocessError> {
        let mut left = self.multiplicative()?;
        loop {
            if self.eat(Op::Plus) {
                left = left.wrapping_add(self.multiplicative()?);
            } else if self.eat(Op::Minus) {
                left = left.wrapping_sub(self.multiplicative()?);
            } else {
                return Ok(left);
            }
        }
    }

    fn multiplicative(&mut self) -> Result<i32, PreprocessError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek_op() {
                Some(op @ (Op::Star | Op::Slash | Op::Percent)) => op,
                _ => return Ok(left),
            };
            let span = self.tokens[self.position].span;
            self.position += 1;
            let right = self.unary()?;
            left = match op {
                Op::Star => left.wrapping_mul(right),
                _ if right == 0 => return Err(self.error("division by zero in condition", span)),
                Op::Slash => left.wrapping_div(right),
                _ => left.wrapping_rem(right),
            };
        }
    }

    fn unary(&mut self) -> Result<i32, PreprocessError> {
        if self.eat(Op::Bang) {
            return Ok((self.unary()? == 0) as i32);
        }
        if self.eat(Op::Tilde) {
            return Ok(!self.unary()?);
        }
        if self.eat(Op::Minus) {
            return Ok(self.unary()?.wrapping_neg());
        }
        self.term()
    }

    fn term(&mut self) -> Result<i32, PreprocessError> {
        let Some(tok) = self.tokens.get(self.position).cloned() else {
            let span = self.tokens.last().map_or(self.directive.span, |t| t.span);
            return Err(self.error("unexpected end of condition", span));
        };
        self.position += 1;

        match tok.kind {
            TokenKind::IntLit => literal::int_value(&tok.lexeme)
                .map(|v| v as i32)
                .ok_or_else(|| self.error(format!("invalid integer '{}'", tok.lexeme), tok.span)),
            TokenKind::CharLit => literal::char_value(&tok.lexeme)
                .map(|c| c as i32)
                .map_err(|message| self.error(message, tok.span)),
            TokenKind::Keyword(Keyword::True) => Ok(1),
            TokenKind::Keyword(Keyword::False) => Ok(0),
            TokenKind::Keyword(Keyword::Defined) => self.defined(&tok),
            TokenKind::Op(Op::LParen) => {
                let value = self.logical_or()?;
                if !self.eat(Op::RParen) {
                    let span = self.peek().map_or(tok.span, |t| t.span);
                    return Err(self.error("expected ')' in condition", span));
                }
                Ok(value)
            }
            TokenKind::Ident if tok.lexeme == "__LINE__" && !self.macros.is_defined("__LINE__") => {
                Ok(tok.span.line_start as i32)
            }
            TokenKind::Ident => self.macro_value(&tok),
            _ => Err(self.error(format!("unexpected {tok} in condition"), tok.span)),
        }
    }

    /// `defined NAME` or `defined(NAME)`.
    fn defined(&mut self, keyword: &Token) -> Result<i32, PreprocessError> {
        let parens = self.eat(Op::LParen);
        let name = match self.tokens.get(self.position) {
            Some(t) if t.is_word() => t.lexeme.clone(),
            _ => return Err(self.error("expected a name after 'defined'", keyword.span)),
        };
        self.position += 1;
        if parens && !self.eat(Op::RParen) {
            return Err(self.error("expected ')' after 'defined(NAME'", keyword.span));
        }
        Ok(self.macros.is_defined(&name) as i32)
    }

    fn macro_value(&mut self, tok: &Token) -> Result<i32, PreprocessError> {
        let Some(mac) = self.macros.get(&tok.lexeme) else {
            return Err(self.error(format!("'{}' is not defined in this condition", tok.lexeme), tok.span));
        };
        if mac.is_function_like {
            return Err(self.error(
                format!("function-like macro '{}' cannot be used in a condition", tok.lexeme),
                tok.span,
            ));
        }
        if self.depth >= MAX_CONDITION_DEPTH {
            return Err(PreprocessError::Depth {
                what: "macro expansion in condition",
                span: tok.span,
                path: Arc::clone(&tok.path),
            });
        }
        let body = mac.expand_object(tok);
        ConditionEval::nested(&body, self.macros, self.directive, self.depth + 1).eval_to_end()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn peek_op(&self) -> Option<Op> {
        match self.peek()?.kind {
            TokenKind::Op(op) => Some(op),
            _ => None,
        }
    }

    fn eat(&mut self, op: Op) -> bool {
        if self.peek_op() == Some(op) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>, span: Span) -> PreprocessError {
        PreprocessError::Condition {
            message: message.into(),
            span,
            path: Arc::clone(&self.directive.path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::preprocess::macros::parse_define;

    fn eval_with(src: &str, macros: &MacroTable) -> Result<bool, PreprocessError> {
        let tokens = tokenize(src, "c.sp").unwrap();
        let directive = tokens[0].clone();
        let line: Vec<Token> = tokens[1..tokens.len() - 1].to_vec();
        ConditionEval::new(&line, macros, &directive).evaluate()
    }

    fn eval(src: &str) -> bool {
        eval_with(src, &MacroTable::new()).unwrap()
    }

    fn table(defines: &[&str]) -> MacroTable {
        let mut table = MacroTable::new();
        for src in defines {
            let tokens = tokenize(src, "d.sp").unwrap();
            table.define(parse_define(&tokens[0], &tokens[1..tokens.len() - 1]).unwrap());
        }
        table
    }

    #[test]
    fn test_precedence() {
        assert!(eval("#if 1 + 2 * 3 == 7"));
        assert!(eval("#if (1 + 2) * 3 == 9"));
        assert!(!eval("#if 1 && 0 || 0"));
        assert!(eval("#if !0 && ~0 == -1"));
        assert!(eval("#if 'a' == 97"));
    }

    #[test]
    fn test_defined_forms() {
        let macros = table(&["#define _sourcemod_included", "#define VERSION 7"]);
        assert!(eval_with("#if defined _sourcemod_included", &macros).unwrap());
        assert!(eval_with("#if defined(VERSION) && VERSION >= 7", &macros).unwrap());
        assert!(!eval_with("#if defined MISSING", &macros).unwrap());
    }

    #[test]
    fn test_nested_object_macros() {
        let macros = table(&["#define A B + 1", "#define B 2"]);
        assert!(eval_with("#if A == 3", &macros).unwrap());
    }

    #[test]
    fn test_errors() {
        let macros = MacroTable::new();
        assert!(eval_with("#if UNKNOWN", &macros).is_err());
        assert!(eval_with("#if 1 / 0", &macros).is_err());
        assert!(eval_with("#if (1", &macros).is_err());
        assert!(eval_with("#if", &macros).is_err());
    }

    #[test]
    fn test_line_builtin() {
        assert!(eval("#if __LINE__ == 1"));
    }

    #[test]
    fn test_truncate_returns_innermost() {
        let opener = tokenize("#if", "c.sp").unwrap()[0].clone();
        let mut stack = ConditionStack::new();
        stack.push(opener.clone(), true);
        stack.push(opener, false);
        let dropped = stack.truncate(0).unwrap();
        assert!(!dropped.taken);
        assert_eq!(stack.depth(), 0);
    }
}
