//! Statement parsing implementation
//!
//! This module handles parsing of all statements inside function bodies:
//!
//! - Local declarations: `int x = 42;`, `new Float:f;`, `decl String:s[64];`
//! - Control flow: `if`, `while`, `do-while`, `for`, `switch`
//! - Jump statements: `return`, `break`, `continue`
//! - `delete`, `assert`, `static_assert`
//! - Compound statements: `{ ... }`
//! - Expression statements: function calls, assignments
//!
//! # Grammar
//!
//! ```text
//! statement ::= local_decl | if_stmt | while_stmt | for_stmt
//!             | do_while_stmt | switch_stmt | return_stmt
//!             | break_stmt | continue_stmt | delete_stmt | assert_stmt
//!             | static_assert | block | expr_stmt
//! switch    ::= "switch" "(" expr ")" "{" ( "case" expr ("," expr)* ":" statement* )*
//!               [ "default" ":" statement* ] "}"
//! ```
//!
//! All parsing methods are implemented as `pub(crate)` methods on the [`Parser`] struct.

use crate::lexer::{Keyword, Op, TokenKind};
use crate::parser::ast::*;
use crate::parser::parse::{ParseError, Parser};
use crate::span::Span;

impl Parser {
    /// Parse `{ statements }`. A broken statement becomes `Stmt::Bad` and
    /// parsing continues after it.
    pub(crate) fn parse_block_body(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect_lbrace("to open block")?;
        let stmts = self.parse_statements_until(|p| p.check_op(Op::RBrace))?;
        self.expect_rbrace("to close block")?;
        Ok(stmts)
    }

    /// Statements until `stop` holds or input ends, recovering per statement.
    fn parse_statements_until(&mut self, stop: fn(&Parser) -> bool) -> Result<Vec<Stmt>, ParseError> {
        let mut stmts = Vec::new();
        while !stop(self) && !self.is_at_end() {
            let start = self.cursor.mark();
            let start_span = self.current_span();
            match self.parse_statement() {
                Ok(stmt) => stmts.push(stmt),
                Err(err) => {
                    self.report(&err);
                    self.recover(start, Self::synchronize_stmt);
                    stmts.push(Stmt::Bad {
                        span: start_span.to(err.span()),
                    });
                }
            }
        }
        Ok(stmts)
    }

    /// Parse a statement
    pub(crate) fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current_span();

        match self.peek().kind {
            TokenKind::Op(Op::LBrace) => {
                let stmts = self.parse_block_body()?;
                Ok(Stmt::Block {
                    stmts,
                    span: self.span_from(start),
                })
            }
            TokenKind::Op(Op::Semicolon) => {
                self.advance();
                Ok(Stmt::Block {
                    stmts: Vec::new(),
                    span: start,
                })
            }
            TokenKind::Keyword(Keyword::If) => self.parse_if_statement(),
            TokenKind::Keyword(Keyword::While) => self.parse_while_statement(),
            TokenKind::Keyword(Keyword::Do) => self.parse_do_while_statement(),
            TokenKind::Keyword(Keyword::For) => self.parse_for_statement(),
            TokenKind::Keyword(Keyword::Switch) => self.parse_switch_statement(),
            TokenKind::Keyword(Keyword::Return) => self.parse_return_statement(),
            TokenKind::Keyword(Keyword::Break) => {
                self.advance();
                self.expect_semicolon("after 'break'")?;
                Ok(Stmt::Break {
                    span: self.span_from(start),
                })
            }
            TokenKind::Keyword(Keyword::Continue) => {
                self.advance();
                self.expect_semicolon("after 'continue'")?;
                Ok(Stmt::Continue {
                    span: self.span_from(start),
                })
            }
            TokenKind::Keyword(Keyword::Delete) => {
                self.advance();
                let target = self.parse_expression()?;
                self.expect_semicolon("after 'delete' target")?;
                Ok(Stmt::Delete {
                    target,
                    span: self.span_from(start),
                })
            }
            TokenKind::Keyword(Keyword::Assert) => {
                self.advance();
                let cond = self.parse_expression()?;
                self.expect_semicolon("after assertion")?;
                Ok(Stmt::Assert {
                    cond,
                    span: self.span_from(start),
                })
            }
            TokenKind::Keyword(Keyword::StaticAssert) => {
                let (cond, message, span) = self.parse_static_assert()?;
                Ok(Stmt::StaticAssert { cond, message, span })
            }
            _ if self.starts_local_declaration() => {
                let decl = self.parse_local_declaration(true)?;
                Ok(Stmt::Decl(decl))
            }
            _ => {
                let expr = self.parse_expression()?;
                self.expect_semicolon("after expression")?;
                Ok(Stmt::Expr {
                    expr,
                    span: self.span_from(start),
                })
            }
        }
    }

    /// Whether a local variable declaration starts here.
    fn starts_local_declaration(&self) -> bool {
        match self.peek().kind {
            // `new Foo(...)` is an expression; `new x[4];` declares
            TokenKind::Keyword(Keyword::New) => !self.peek_nth(2).is_op(Op::LParen),
            TokenKind::Keyword(Keyword::Decl | Keyword::Static | Keyword::Const) => true,
            TokenKind::Keyword(kw) => kw.is_builtin_type(),
            TokenKind::Ident => self.is_new_style_head(false),
            _ => false,
        }
    }

    fn parse_local_declaration(&mut self, terminated: bool) -> Result<VarDecl, ParseError> {
        let start = self.current_span();
        let storage = self.parse_storage();
        let (ty, name) = self.parse_declaration_head(false)?;
        self.parse_var_rest(storage, ty, name, start, terminated)
    }

    /// Parse return statement: return [expr];
    fn parse_return_statement(&mut self) -> Result<Stmt, ParseError> {
        let start = self.advance().span;
        let value = if self.check_op(Op::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_semicolon("after return")?;
        Ok(Stmt::Return {
            value,
            span: self.span_from(start),
        })
    }

    /// `(expr)` after `if`, `while`, `switch`
    fn parse_condition(&mut self, ctx: &str) -> Result<Expr, ParseError> {
        self.expect_lparen(ctx)?;
        let cond = self.nested(false, Self::parse_expression)?;
        self.expect_rparen("after condition")?;
        Ok(cond)
    }

    /// Parse if statement: if (cond) stmt [else stmt]
    fn parse_if_statement(&mut self) -> Result<Stmt, ParseError> {
        let start = self.advance().span;
        let cond = self.parse_condition("after 'if'")?;
        let then = Box::new(self.parse_statement()?);
        let otherwise = if self.match_keyword(Keyword::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then,
            otherwise,
            span: self.span_from(start),
        })
    }

    /// Parse while loop: while (cond) body
    fn parse_while_statement(&mut self) -> Result<Stmt, ParseError> {
        let start = self.advance().span;
        let cond = self.parse_condition("after 'while'")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::While {
            cond,
            body,
            span: self.span_from(start),
        })
    }

    /// Parse do-while loop: do body while (cond);
    fn parse_do_while_statement(&mut self) -> Result<Stmt, ParseError> {
        let start = self.advance().span;
        let body = Box::new(self.parse_statement()?);
        self.expect_keyword(Keyword::While, "after do-while body")?;
        let cond = self.parse_condition("after 'while'")?;
        self.expect_semicolon("after do-while condition")?;
        Ok(Stmt::DoWhile {
            body,
            cond,
            span: self.span_from(start),
        })
    }

    /// Parse for loop: for ([init]; [cond]; [step]) body
    fn parse_for_statement(&mut self) -> Result<Stmt, ParseError> {
        let start = self.advance().span;
        self.expect_lparen("after 'for'")?;

        let init = if self.check_op(Op::Semicolon) {
            None
        } else if self.starts_local_declaration() {
            Some(Box::new(Stmt::Decl(self.parse_local_declaration(false)?)))
        } else {
            let init_start = self.current_span();
            let expr = self.parse_expression()?;
            Some(Box::new(Stmt::Expr {
                expr,
                span: self.span_from(init_start),
            }))
        };
        self.expect_semicolon("after for-loop initializer")?;

        let cond = self.parse_optional_expression(Op::Semicolon)?;
        self.expect_semicolon("after for-loop condition")?;
        let step = self.parse_optional_expression(Op::RParen)?;
        self.expect_rparen("after for-loop clauses")?;

        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::For {
            init,
            cond,
            step,
            body,
            span: self.span_from(start),
        })
    }

    fn parse_optional_expression(&mut self, end: Op) -> Result<Option<Expr>, ParseError> {
        if self.check_op(end) {
            Ok(None)
        } else {
            Ok(Some(self.parse_expression()?))
        }
    }

    /// Parse switch statement
    fn parse_switch_statement(&mut self) -> Result<Stmt, ParseError> {
        let start = self.advance().span;
        let subject = self.parse_condition("after 'switch'")?;
        self.expect_lbrace("to open switch body")?;

        let mut cases = Vec::new();
        let mut default = None;
        while !self.check_op(Op::RBrace) && !self.is_at_end() {
            let case_start = self.current_span();
            if self.match_keyword(Keyword::Default) {
                if default.is_some() {
                    return Err(self.invalid("multiple 'default' labels in switch", case_start));
                }
                self.expect_op(Op::Colon, "after 'default'")?;
                default = Some(Box::new(self.parse_case_body(case_start)?));
                continue;
            }

            self.expect_keyword(Keyword::Case, "or 'default' in switch")?;
            let mut values = vec![self.nested(true, Self::parse_assignment)?];
            while self.match_op(Op::Comma) {
                values.push(self.nested(true, Self::parse_assignment)?);
            }
            self.expect_op(Op::Colon, "after case values")?;
            let body = Box::new(self.parse_case_body(case_start)?);
            cases.push(SwitchCase {
                values,
                body,
                span: self.span_from(case_start),
            });
        }
        self.expect_rbrace("to close switch body")?;

        Ok(Stmt::Switch {
            subject,
            cases,
            default,
            span: self.span_from(start),
        })
    }

    /// Statements of one case arm; several become a block.
    fn parse_case_body(&mut self, start: Span) -> Result<Stmt, ParseError> {
        let mut stmts = self.parse_statements_until(|p| {
            p.check_op(Op::RBrace) || p.check_keyword(Keyword::Case) || p.check_keyword(Keyword::Default)
        })?;
        if stmts.len() == 1 {
            return Ok(stmts.remove(0));
        }
        Ok(Stmt::Block {
            stmts,
            span: self.span_from(start),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::lexer::tokenize;
    use crate::parser::ast::*;
    use crate::parser::parse::Parser;

    fn stmt(src: &str) -> Stmt {
        let mut parser = Parser::new(tokenize(src, "t.sp").unwrap(), 5);
        let stmt = parser.parse_single_statement().unwrap();
        assert_eq!(parser.error_count(), 0);
        stmt
    }

    #[test]
    fn test_local_declarations() {
        match stmt("int a = 1, b[4];") {
            Stmt::Decl(decl) => {
                assert_eq!(decl.declarators.len(), 2);
                assert_eq!(decl.declarators[1].dims.len(), 1);
            }
            other => panic!("Expected declaration, got {other:?}"),
        }
        assert!(matches!(stmt("decl String:name[64];"), Stmt::Decl(_)));
        assert!(matches!(stmt("Handle h = null;"), Stmt::Decl(_)));
        assert!(matches!(stmt("new x[4];"), Stmt::Decl(_)));
        // Constructor call, not a declaration
        assert!(matches!(stmt("new StringMap();"), Stmt::Expr { .. }));
    }

    #[test]
    fn test_if_else() {
        match stmt("if (a) b = 1; else { b = 2; }") {
            Stmt::If { otherwise, .. } => {
                assert!(matches!(otherwise.as_deref(), Some(Stmt::Block { .. })));
            }
            other => panic!("Expected if, got {other:?}"),
        }
    }

    #[test]
    fn test_for_loops() {
        match stmt("for (int i = 0, j = 9; i < j; i++, j--) {}") {
            Stmt::For { init, cond, step, .. } => {
                assert!(matches!(init.as_deref(), Some(Stmt::Decl(d)) if d.declarators.len() == 2));
                assert!(cond.is_some());
                assert!(matches!(step.map(|s| s.kind), Some(ExprKind::Comma(_))));
            }
            other => panic!("Expected for, got {other:?}"),
        }
        match stmt("for (;;) break;") {
            Stmt::For { init, cond, step, body, .. } => {
                assert!(init.is_none() && cond.is_none() && step.is_none());
                assert!(matches!(*body, Stmt::Break { .. }));
            }
            other => panic!("Expected for, got {other:?}"),
        }
    }

    #[test]
    fn test_do_while() {
        assert!(matches!(stmt("do { x++; } while (x < 10);"), Stmt::DoWhile { .. }));
    }

    #[test]
    fn test_switch() {
        let src = "switch (x) { case 1, 2: return 1; case Plugin_Stop: { y = 2; } default: y = 3; z = 4; }";
        match stmt(src) {
            Stmt::Switch { cases, default, .. } => {
                assert_eq!(cases.len(), 2);
                assert_eq!(cases[0].values.len(), 2);
                assert_eq!(cases[1].values[0].as_name(), Some("Plugin_Stop"));
                match default.as_deref() {
                    Some(Stmt::Block { stmts, .. }) => assert_eq!(stmts.len(), 2),
                    other => panic!("Expected default block, got {other:?}"),
                }
            }
            other => panic!("Expected switch, got {other:?}"),
        }
    }

    #[test]
    fn test_jumps_and_misc() {
        assert!(matches!(stmt("return;"), Stmt::Return { value: None, .. }));
        assert!(matches!(stmt("return a + 1;"), Stmt::Return { value: Some(_), .. }));
        assert!(matches!(stmt("delete g_Map;"), Stmt::Delete { .. }));
        assert!(matches!(stmt("assert x > 0;"), Stmt::Assert { .. }));
        assert!(matches!(stmt("continue;"), Stmt::Continue { .. }));
    }

    #[test]
    fn test_recovery_inside_block() {
        let src = "void F() { int a = ; a = 1; }";
        let mut parser = Parser::new(tokenize(src, "t.sp").unwrap(), 5);
        let plugin = parser.parse_plugin();
        assert_eq!(parser.error_count(), 1);
        let body = plugin.functions().next().and_then(|f| f.body.as_ref()).unwrap();
        assert!(matches!(body[0], Stmt::Bad { .. }));
        assert!(matches!(body[1], Stmt::Expr { .. }));
    }
}
