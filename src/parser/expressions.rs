//! Expression parsing implementation
//!
//! This module handles parsing of SourcePawn expressions using one function
//! per precedence level, lowest first.
//!
//! # Supported Expressions
//!
//! - Literals: integers, floats, characters, strings, `true`/`false`, `null`
//! - Names, `this`, parenthesised expressions, `{ ... }` initialiser lists
//! - Binary operators: arithmetic, comparison, logical, bitwise, shifts
//! - Unary operators: `-`, `!`, `~`, `++`, `--`, `sizeof`, `new`
//! - Postfix: `[]`, `.`, `::`, `()`, `++`, `--`
//! - Ternary: `? :`
//! - Casts: `view_as<T>(expr)` and old-style `Tag:expr`
//! - `function T (params)` literals
//!
//! # Precedence
//!
//! ```text
//! comma → assignment → ternary → || → && → equality → relational chain
//!       → | → ^ → & → shift → additive → multiplicative → prefix → postfix → primary
//! ```
//!
//! Relational operators chain: `a < b <= c` is a single [`ExprKind::Chain`]
//! meaning `a < b && b <= c`.
//!
//! All parsing methods are implemented as `pub(crate)` methods on the [`Parser`] struct.

use crate::lexer::{Keyword, Op, TokenKind};
use crate::parser::ast::*;
use crate::parser::parse::{ParseError, Parser};
use crate::span::Span;

type Level = fn(&mut Parser) -> Result<Expr, ParseError>;

impl Parser {
    /// Parse expression (top-level entry point, includes the comma operator)
    pub(crate) fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        let first = self.parse_assignment()?;
        if !self.check_op(Op::Comma) {
            return Ok(first);
        }

        let start = first.span;
        let mut items = vec![first];
        while self.match_op(Op::Comma) {
            items.push(self.parse_assignment()?);
        }
        Ok(Expr::new(ExprKind::Comma(items), self.span_from(start)))
    }

    /// Parse assignment or ternary (right-associative)
    pub(crate) fn parse_assignment(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.parse_ternary()?;

        let op = match self.peek().kind {
            TokenKind::Op(Op::Assign) => BinOp::Assign,
            TokenKind::Op(Op::AddAssign) => BinOp::AddAssign,
            TokenKind::Op(Op::SubAssign) => BinOp::SubAssign,
            TokenKind::Op(Op::MulAssign) => BinOp::MulAssign,
            TokenKind::Op(Op::DivAssign) => BinOp::DivAssign,
            TokenKind::Op(Op::ModAssign) => BinOp::ModAssign,
            TokenKind::Op(Op::AndAssign) => BinOp::AndAssign,
            TokenKind::Op(Op::OrAssign) => BinOp::OrAssign,
            TokenKind::Op(Op::XorAssign) => BinOp::XorAssign,
            TokenKind::Op(Op::ShlAssign) => BinOp::ShlAssign,
            TokenKind::Op(Op::ShrAssign) => BinOp::ShrAssign,
            TokenKind::Op(Op::UshrAssign) => BinOp::UshrAssign,
            _ => return Ok(lhs),
        };
        self.advance();

        let rhs = self.parse_assignment()?;
        Ok(binary(op, lhs, rhs))
    }

    /// Parse ternary: condition ? then : otherwise
    fn parse_ternary(&mut self) -> Result<Expr, ParseError> {
        let cond = self.parse_logical_or()?;
        if !self.match_op(Op::Question) {
            return Ok(cond);
        }

        let then = self.nested(true, Self::parse_assignment)?;
        self.expect_op(Op::Colon, "in ternary expression")?;
        let otherwise = self.parse_assignment()?;

        let span = cond.span.to(otherwise.span);
        Ok(Expr::new(
            ExprKind::Ternary {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            },
            span,
        ))
    }

    /// Run `f` with the given `:` handling, restoring the previous one after.
    pub(crate) fn nested<T>(
        &mut self,
        colon_terminates: bool,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        let saved = std::mem::replace(&mut self.colon_terminates, colon_terminates);
        let result = f(self);
        self.colon_terminates = saved;
        result
    }

    /// Left-associative binary level over `ops`.
    fn parse_left_assoc(&mut self, next: Level, ops: &[(Op, BinOp)]) -> Result<Expr, ParseError> {
        let mut left = next(self)?;
        'outer: loop {
            for &(tok, op) in ops {
                if self.match_op(tok) {
                    let right = next(self)?;
                    left = binary(op, left, right);
                    continue 'outer;
                }
            }
            return Ok(left);
        }
    }

    /// Parse logical OR (||)
    fn parse_logical_or(&mut self) -> Result<Expr, ParseError> {
        self.parse_left_assoc(Self::parse_logical_and, &[(Op::OrOr, BinOp::Or)])
    }

    /// Parse logical AND (&&)
    fn parse_logical_and(&mut self) -> Result<Expr, ParseError> {
        self.parse_left_assoc(Self::parse_equality, &[(Op::AndAnd, BinOp::And)])
    }

    /// Parse equality (== !=)
    fn parse_equality(&mut self) -> Result<Expr, ParseError> {
        self.parse_left_assoc(
            Self::parse_relational,
            &[(Op::EqEq, BinOp::Eq), (Op::NotEq, BinOp::Ne)],
        )
    }

    /// Parse relational (< <= > >=), chaining adjacent comparisons
    fn parse_relational(&mut self) -> Result<Expr, ParseError> {
        let first = self.parse_bitwise_or()?;

        let mut links = Vec::new();
        loop {
            let op = match self.peek().kind {
                TokenKind::Op(Op::Lt) => BinOp::Lt,
                TokenKind::Op(Op::LtEq) => BinOp::Le,
                TokenKind::Op(Op::Gt) => BinOp::Gt,
                TokenKind::Op(Op::GtEq) => BinOp::Ge,
                _ => break,
            };
            self.advance();
            links.push((op, self.parse_bitwise_or()?));
        }

        match links.len() {
            0 => Ok(first),
            1 => {
                let (op, right) = links.remove(0);
                Ok(binary(op, first, right))
            }
            _ => {
                let span = first.span.to(self.previous_span());
                Ok(Expr::new(
                    ExprKind::Chain {
                        first: Box::new(first),
                        links,
                    },
                    span,
                ))
            }
        }
    }

    /// Parse bitwise OR (|)
    fn parse_bitwise_or(&mut self) -> Result<Expr, ParseError> {
        self.parse_left_assoc(Self::parse_bitwise_xor, &[(Op::Pipe, BinOp::BitOr)])
    }

    /// Parse bitwise XOR (^)
    fn parse_bitwise_xor(&mut self) -> Result<Expr, ParseError> {
        self.parse_left_assoc(Self::parse_bitwise_and, &[(Op::Caret, BinOp::BitXor)])
    }

    /// Parse bitwise AND (&)
    fn parse_bitwise_and(&mut self) -> Result<Expr, ParseError> {
        self.parse_left_assoc(Self::parse_shift, &[(Op::Amp, BinOp::BitAnd)])
    }

    /// Parse shifts (<< >> >>>)
    fn parse_shift(&mut self) -> Result<Expr, ParseError> {
        self.parse_left_assoc(
            Self::parse_additive,
            &[
                (Op::Shl, BinOp::Shl),
                (Op::Shr, BinOp::Shr),
                (Op::Ushr, BinOp::Ushr),
            ],
        )
    }

    /// Parse additive (+ -)
    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        self.parse_left_assoc(
            Self::parse_multiplicative,
            &[(Op::Plus, BinOp::Add), (Op::Minus, BinOp::Sub)],
        )
    }

    /// Parse multiplicative (* / %)
    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        self.parse_left_assoc(
            Self::parse_prefix,
            &[
                (Op::Star, BinOp::Mul),
                (Op::Slash, BinOp::Div),
                (Op::Percent, BinOp::Mod),
            ],
        )
    }

    /// Parse prefix operators, `sizeof`, `new` and old-style tag casts
    fn parse_prefix(&mut self) -> Result<Expr, ParseError> {
        let start = self.current_span();

        let op = match self.peek().kind {
            TokenKind::Op(Op::Minus) => Some(UnOp::Neg),
            TokenKind::Op(Op::Bang) => Some(UnOp::Not),
            TokenKind::Op(Op::Tilde) => Some(UnOp::BitNot),
            TokenKind::Op(Op::Increment) => Some(UnOp::PreInc),
            TokenKind::Op(Op::Decrement) => Some(UnOp::PreDec),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_prefix()?;
            return Ok(Expr::new(
                ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                self.span_from(start),
            ));
        }

        if self.match_keyword(Keyword::Sizeof) {
            return self.parse_sizeof(start);
        }
        if self.match_keyword(Keyword::New) {
            return self.parse_new(start);
        }

        // `Float:x`, `_:x`, `bool:x`
        if !self.colon_terminates && self.peek().is_word() && self.peek_nth(1).is_op(Op::Colon) {
            let tag = self.advance();
            self.advance();
            let mut ty = TypeExpr::named(tag.lexeme, tag.span);
            ty.old_style = true;
            let value = self.parse_prefix()?;
            return Ok(Expr::new(
                ExprKind::ViewAs {
                    ty,
                    value: Box::new(value),
                },
                self.span_from(start),
            ));
        }

        self.parse_postfix()
    }

    /// `sizeof x`, `sizeof(x)`, `sizeof x.field`, `sizeof x[]`
    fn parse_sizeof(&mut self, start: Span) -> Result<Expr, ParseError> {
        let parens = self.match_op(Op::LParen);

        let name = self.expect_name()?;
        let mut operand = Expr::new(ExprKind::Name(name.lexeme), name.span);
        loop {
            let kind = if self.match_op(Op::Dot) {
                ExprKind::Field {
                    base: Box::new(operand),
                    name: self.expect_name()?.lexeme,
                }
            } else if self.match_op(Op::ColonColon) {
                ExprKind::Scope {
                    base: Box::new(operand),
                    name: self.expect_name()?.lexeme,
                }
            } else {
                break;
            };
            operand = Expr::new(kind, self.span_from(name.span));
        }

        let mut inner_dims = 0;
        while self.check_op(Op::LBracket) && self.peek_nth(1).is_op(Op::RBracket) {
            self.advance();
            self.advance();
            inner_dims += 1;
        }

        if parens {
            self.expect_rparen("after sizeof operand")?;
        }
        Ok(Expr::new(
            ExprKind::Sizeof {
                operand: Box::new(operand),
                inner_dims,
            },
            self.span_from(start),
        ))
    }

    /// `new Class(args)` or `new T[n]...`
    fn parse_new(&mut self, start: Span) -> Result<Expr, ParseError> {
        let class = self.peek().clone();
        if !class.is_word() {
            return Err(self.expected("type name after 'new'"));
        }
        self.advance();

        if self.match_op(Op::LParen) {
            let args = self.parse_arguments()?;
            return Ok(Expr::new(
                ExprKind::New {
                    class: class.lexeme,
                    args,
                },
                self.span_from(start),
            ));
        }

        let mut dims = Vec::new();
        while self.match_op(Op::LBracket) {
            dims.push(self.nested(false, Self::parse_expression)?);
            self.expect_op(Op::RBracket, "after array size")?;
        }
        if dims.is_empty() {
            return Err(self.expected("'(' or '[' after 'new' type"));
        }
        Ok(Expr::new(
            ExprKind::NewArray {
                elem: TypeExpr::named(class.lexeme, class.span),
                dims,
            },
            self.span_from(start),
        ))
    }

    /// Parse postfix (. :: [] () ++ --)
    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;

        loop {
            let start = expr.span;
            let kind = match self.peek().kind {
                TokenKind::Op(Op::Dot) => {
                    self.advance();
                    ExprKind::Field {
                        base: Box::new(expr),
                        name: self.expect_name()?.lexeme,
                    }
                }
                TokenKind::Op(Op::ColonColon) => {
                    self.advance();
                    ExprKind::Scope {
                        base: Box::new(expr),
                        name: self.expect_name()?.lexeme,
                    }
                }
                TokenKind::Op(Op::LBracket) => {
                    self.advance();
                    let index = self.nested(false, Self::parse_expression)?;
                    self.expect_op(Op::RBracket, "after array index")?;
                    ExprKind::Index {
                        base: Box::new(expr),
                        index: Box::new(index),
                    }
                }
                TokenKind::Op(Op::LParen) => {
                    self.advance();
                    ExprKind::Call {
                        callee: Box::new(expr),
                        args: self.parse_arguments()?,
                    }
                }
                TokenKind::Op(Op::Increment) => {
                    self.advance();
                    ExprKind::Unary {
                        op: UnOp::PostInc,
                        operand: Box::new(expr),
                    }
                }
                TokenKind::Op(Op::Decrement) => {
                    self.advance();
                    ExprKind::Unary {
                        op: UnOp::PostDec,
                        operand: Box::new(expr),
                    }
                }
                _ => break,
            };
            expr = Expr::new(kind, self.span_from(start));
        }

        Ok(expr)
    }

    /// Arguments after `(`, through the closing `)`. Accepts named
    /// arguments `.name = value`.
    fn parse_arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if self.match_op(Op::RParen) {
            return Ok(args);
        }

        loop {
            let start = self.current_span();
            let arg = if self.check_op(Op::Dot) && self.peek_nth(1).is_word() && self.peek_nth(2).is_op(Op::Assign) {
                self.advance();
                let name = self.advance().lexeme;
                self.advance();
                let value = self.nested(false, Self::parse_assignment)?;
                Expr::new(
                    ExprKind::NamedArg {
                        name,
                        value: Box::new(value),
                    },
                    self.span_from(start),
                )
            } else {
                self.nested(false, Self::parse_assignment)?
            };
            args.push(arg);

            if !self.match_op(Op::Comma) {
                break;
            }
        }

        self.expect_rparen("after arguments")?;
        Ok(args)
    }

    /// Parse primary (literals, names, parenthesised expressions, ...)
    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let tok = self.peek().clone();
        let start = tok.span;

        let lit = match tok.kind {
            TokenKind::IntLit => Some(LitKind::Int),
            TokenKind::FloatLit => Some(LitKind::Float),
            TokenKind::CharLit => Some(LitKind::Char),
            TokenKind::StringLit => Some(LitKind::String),
            TokenKind::Keyword(Keyword::True | Keyword::False) => Some(LitKind::Bool),
            _ => None,
        };
        if let Some(kind) = lit {
            self.advance();
            return Ok(Expr::new(ExprKind::Lit { kind, raw: tok.lexeme }, start));
        }

        match tok.kind {
            TokenKind::Ident => {
                self.advance();
                Ok(Expr::new(ExprKind::Name(tok.lexeme), start))
            }
            TokenKind::Keyword(Keyword::Null) => {
                self.advance();
                Ok(Expr::new(ExprKind::Null, start))
            }
            TokenKind::Keyword(Keyword::This) => {
                self.advance();
                Ok(Expr::new(ExprKind::This, start))
            }
            TokenKind::Keyword(Keyword::ViewAs) => {
                self.advance();
                self.expect_op(Op::Lt, "after 'view_as'")?;
                let ty = self.parse_type()?;
                self.expect_op(Op::Gt, "after view_as type")?;
                self.expect_lparen("after view_as type")?;
                let value = self.nested(false, Self::parse_expression)?;
                self.expect_rparen("after view_as operand")?;
                Ok(Expr::new(
                    ExprKind::ViewAs {
                        ty,
                        value: Box::new(value),
                    },
                    self.span_from(start),
                ))
            }
            TokenKind::Keyword(Keyword::Function) => {
                let func = self.parse_function_type()?;
                Ok(Expr::new(ExprKind::FuncLit(func), self.span_from(start)))
            }
            TokenKind::Op(Op::Ellipsis) => {
                self.advance();
                Ok(Expr::new(ExprKind::Ellipsis, start))
            }
            TokenKind::Op(Op::LParen) => {
                self.advance();
                let expr = self.nested(false, Self::parse_expression)?;
                self.expect_rparen("after expression")?;
                Ok(expr)
            }
            TokenKind::Op(Op::LBrace) => {
                self.advance();
                let items = self.nested(false, Self::parse_brace_items)?;
                Ok(Expr::new(ExprKind::Brace(items), self.span_from(start)))
            }
            _ => Err(self.expected("expression")),
        }
    }

    /// Items of a `{ ... }` list after the `{`, through the `}`.
    fn parse_brace_items(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut items = Vec::new();
        while !self.check_op(Op::RBrace) {
            items.push(self.parse_assignment()?);
            if !self.match_op(Op::Comma) {
                break;
            }
        }
        self.expect_rbrace("after initialiser list")?;
        Ok(items)
    }
}

fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
    let span = left.span.to(right.span);
    Expr::new(
        ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        },
        span,
    )
}

#[cfg(test)]
mod tests {
    use crate::lexer::tokenize;
    use crate::parser::ast::*;
    use crate::parser::parse::Parser;

    fn expr(src: &str) -> Expr {
        let mut parser = Parser::new(tokenize(src, "t.sp").unwrap(), 5);
        parser.parse_single_expression().unwrap()
    }

    fn binop(e: &Expr) -> (BinOp, &Expr, &Expr) {
        match &e.kind {
            ExprKind::Binary { op, left, right } => (*op, left, right),
            other => panic!("Expected binary expression, got {other:?}"),
        }
    }

    #[test]
    fn test_precedence() {
        let e = expr("1 + 2 * 3");
        let (op, left, right) = binop(&e);
        assert_eq!(op, BinOp::Add);
        assert!(matches!(left.kind, ExprKind::Lit { kind: LitKind::Int, .. }));
        assert_eq!(binop(right).0, BinOp::Mul);
    }

    #[test]
    fn test_left_associativity() {
        let e = expr("10 - 4 - 3");
        let (op, left, _) = binop(&e);
        assert_eq!(op, BinOp::Sub);
        assert_eq!(binop(left).0, BinOp::Sub);
    }

    #[test]
    fn test_assignment_is_right_associative() {
        let e = expr("a = b >>>= 2");
        let (op, left, right) = binop(&e);
        assert_eq!(op, BinOp::Assign);
        assert_eq!(left.as_name(), Some("a"));
        assert_eq!(binop(right).0, BinOp::UshrAssign);
    }

    #[test]
    fn test_relational_chain() {
        match expr("a < b <= c").kind {
            ExprKind::Chain { first, links } => {
                assert_eq!(first.as_name(), Some("a"));
                assert_eq!(links.len(), 2);
                assert_eq!(links[1].0, BinOp::Le);
            }
            other => panic!("Expected chain, got {other:?}"),
        }
        // A single comparison stays a plain binary node
        assert_eq!(binop(&expr("a < b")).0, BinOp::Lt);
    }

    #[test]
    fn test_relational_binds_looser_than_bitwise() {
        let e = expr("a & 1 == b | 2");
        let (op, left, right) = binop(&e);
        assert_eq!(op, BinOp::Eq);
        assert_eq!(binop(left).0, BinOp::BitAnd);
        assert_eq!(binop(right).0, BinOp::BitOr);
    }

    #[test]
    fn test_ternary_and_tag_cast() {
        match expr("x ? y : _:z").kind {
            ExprKind::Ternary { then, otherwise, .. } => {
                // Inside the `then` arm the colon belongs to the ternary
                assert_eq!(then.as_name(), Some("y"));
                assert!(matches!(otherwise.kind, ExprKind::ViewAs { .. }));
            }
            other => panic!("Expected ternary, got {other:?}"),
        }
        match expr("Float:5").kind {
            ExprKind::ViewAs { ty, .. } => {
                assert_eq!(ty.name, "Float");
                assert!(ty.old_style);
            }
            other => panic!("Expected cast, got {other:?}"),
        }
    }

    #[test]
    fn test_view_as_and_calls() {
        match expr("view_as<Menu>(CreateMenu(Handler, .flags = 2))").kind {
            ExprKind::ViewAs { ty, value } => {
                assert_eq!(ty.name, "Menu");
                match value.kind {
                    ExprKind::Call { callee, args } => {
                        assert_eq!(callee.as_name(), Some("CreateMenu"));
                        assert!(matches!(&args[1].kind, ExprKind::NamedArg { name, .. } if name == "flags"));
                    }
                    other => panic!("Expected call, got {other:?}"),
                }
            }
            other => panic!("Expected view_as, got {other:?}"),
        }
    }

    #[test]
    fn test_postfix_chain() {
        match expr("players[i].Name::Length++").kind {
            ExprKind::Unary { op: UnOp::PostInc, operand } => match operand.kind {
                ExprKind::Scope { base, name } => {
                    assert_eq!(name, "Length");
                    assert!(matches!(base.kind, ExprKind::Field { .. }));
                }
                other => panic!("Expected scope access, got {other:?}"),
            },
            other => panic!("Expected post-increment, got {other:?}"),
        }
    }

    #[test]
    fn test_sizeof_and_new() {
        match expr("sizeof g_Names[]").kind {
            ExprKind::Sizeof { inner_dims, .. } => assert_eq!(inner_dims, 1),
            other => panic!("Expected sizeof, got {other:?}"),
        }
        match expr("new int[MaxClients + 1][4]").kind {
            ExprKind::NewArray { elem, dims } => {
                assert_eq!(elem.name, "int");
                assert_eq!(dims.len(), 2);
            }
            other => panic!("Expected new array, got {other:?}"),
        }
        match expr("new StringMap()").kind {
            ExprKind::New { class, args } => {
                assert_eq!(class, "StringMap");
                assert!(args.is_empty());
            }
            other => panic!("Expected new, got {other:?}"),
        }
    }

    #[test]
    fn test_brace_list_and_comma() {
        match expr("{1, 2, ...}").kind {
            ExprKind::Brace(items) => {
                assert_eq!(items.len(), 3);
                assert!(matches!(items[2].kind, ExprKind::Ellipsis));
            }
            other => panic!("Expected brace list, got {other:?}"),
        }
        match expr("a++, b--").kind {
            ExprKind::Comma(items) => assert_eq!(items.len(), 2),
            other => panic!("Expected comma expression, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_operand_is_error() {
        let mut parser = Parser::new(tokenize("1 +", "t.sp").unwrap(), 5);
        assert!(parser.parse_single_expression().is_err());
    }
}
