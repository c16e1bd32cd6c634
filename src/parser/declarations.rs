//! Declaration parsing implementation
//!
//! This module handles variable and function declarations, in both syntaxes
//! SourcePawn accepts:
//!
//! - New-style: `int x = 1;`, `float[] values`, `public void F(int &a) { ... }`
//! - Old-style: `new Float:x = 1.0;`, `decl String:s[64];`, `public F() { ... }`
//!
//! # Grammar
//!
//! ```text
//! declaration  ::= static_assert | spec | storage* head ( function | variable )
//! head         ::= type name | [tag ":"] name
//! type         ::= type_name ("[" "]")* ["&"]
//! function     ::= "(" params ")" ( block | ";" )
//! variable     ::= declarator ("," declarator)* ";"
//! declarator   ::= name ("[" [expr] "]")* ["=" expr]
//! ```
//!
//! All parsing methods are implemented as `pub(crate)` methods on the [`Parser`] struct.

use crate::lexer::{Keyword, Op, Token, TokenKind};
use crate::parser::ast::*;
use crate::parser::parse::{ParseError, Parser};
use crate::span::Span;

impl Parser {
    /// Parse a top-level declaration
    pub(crate) fn parse_top_level_declaration(&mut self) -> Result<Decl, ParseError> {
        match self.peek().kind {
            TokenKind::Keyword(Keyword::StaticAssert) => {
                let (cond, message, span) = self.parse_static_assert()?;
                Ok(Decl::StaticAssert { cond, message, span })
            }
            TokenKind::Keyword(
                Keyword::Enum
                | Keyword::Struct
                | Keyword::Methodmap
                | Keyword::Typedef
                | Keyword::Typeset
                | Keyword::Using,
            ) => Ok(Decl::Type(self.parse_spec()?)),
            _ => self.parse_var_or_function(),
        }
    }

    /// Storage classes in front of a declaration
    pub(crate) fn parse_storage(&mut self) -> Vec<Storage> {
        let mut storage = Vec::new();
        while let TokenKind::Keyword(kw) = self.peek().kind {
            let class = match kw {
                Keyword::Public => Storage::Public,
                Keyword::Stock => Storage::Stock,
                Keyword::Static => Storage::Static,
                Keyword::Const => Storage::Const,
                Keyword::Native => Storage::Native,
                Keyword::Forward => Storage::Forward,
                Keyword::New => Storage::New,
                Keyword::Decl => Storage::Decl,
                _ => break,
            };
            self.advance();
            storage.push(class);
        }
        storage
    }

    fn parse_var_or_function(&mut self) -> Result<Decl, ParseError> {
        let start = self.current_span();
        let storage = self.parse_storage();
        let (ty, name) = self.parse_declaration_head(false)?;

        if self.check_op(Op::LParen) {
            let func = self.parse_function_rest(storage, ty, name, start)?;
            return Ok(Decl::Func(func));
        }

        if storage.iter().any(|s| matches!(s, Storage::Native | Storage::Forward)) {
            return Err(self.expected("'(' after function name"));
        }
        let var = self.parse_var_rest(storage, ty, name, start, true)?;
        Ok(Decl::Var(var))
    }

    /// Whether the upcoming tokens are a new-style `type name` head.
    pub(crate) fn is_new_style_head(&self, allow_ref: bool) -> bool {
        let first = self.peek();
        if let TokenKind::Keyword(kw) = first.kind {
            return kw.is_builtin_type();
        }
        if first.kind != TokenKind::Ident {
            return false;
        }
        let mut n = 1;
        while self.peek_nth(n).is_op(Op::LBracket) && self.peek_nth(n + 1).is_op(Op::RBracket) {
            n += 2;
        }
        let next = self.peek_nth(n);
        next.kind == TokenKind::Ident || (allow_ref && next.is_op(Op::Amp))
    }

    /// `type name` or `[Tag:] name`
    pub(crate) fn parse_declaration_head(&mut self, allow_ref: bool) -> Result<(TypeExpr, Token), ParseError> {
        if self.is_new_style_head(allow_ref) {
            let ty = self.parse_type()?;
            let name = self.expect_identifier()?;
            return Ok((ty, name));
        }
        let ty = self.parse_old_tag()?;
        let name = self.expect_identifier()?;
        Ok((ty, name))
    }

    /// Optional old-style `Tag:` prefix; defaults to an untagged cell.
    pub(crate) fn parse_old_tag(&mut self) -> Result<TypeExpr, ParseError> {
        let start = self.current_span();
        if self.check_op(Op::LBrace) {
            // Tag list `{Float, _}:` accepts any of its members
            self.advance();
            while !self.check_op(Op::RBrace) && !self.is_at_end() {
                self.advance();
            }
            self.expect_rbrace("after tag list")?;
            self.expect_op(Op::Colon, "after tag list")?;
            let mut ty = TypeExpr::named("any", self.span_from(start));
            ty.old_style = true;
            return Ok(ty);
        }
        if self.peek().is_word() && self.peek_nth(1).is_op(Op::Colon) {
            let tag = self.advance();
            self.advance();
            let mut ty = TypeExpr::named(tag.lexeme, tag.span);
            ty.old_style = true;
            return Ok(ty);
        }
        Ok(TypeExpr::implicit_int(start))
    }

    /// Parse type: name, `[]` pairs, optional `&`
    pub(crate) fn parse_type(&mut self) -> Result<TypeExpr, ParseError> {
        let tok = self.peek().clone();
        let is_type_name = match tok.kind {
            TokenKind::Keyword(kw) => kw.is_builtin_type(),
            TokenKind::Ident => true,
            _ => false,
        };
        if !is_type_name {
            return Err(self.expected("type name"));
        }
        self.advance();

        let mut ty = TypeExpr::named(tok.lexeme, tok.span);
        while self.check_op(Op::LBracket) && self.peek_nth(1).is_op(Op::RBracket) {
            self.advance();
            self.advance();
            ty.dims += 1;
        }
        if self.match_op(Op::Amp) {
            ty.is_ref = true;
        }
        ty.span = self.span_from(tok.span);
        Ok(ty)
    }

    /// Dimensions after a declared name: `[expr]` or `[]`
    pub(crate) fn parse_dims(&mut self) -> Result<Vec<Option<Expr>>, ParseError> {
        let mut dims = Vec::new();
        while self.match_op(Op::LBracket) {
            if self.match_op(Op::RBracket) {
                dims.push(None);
                continue;
            }
            let size = self.parse_expression()?;
            self.expect_op(Op::RBracket, "after array size")?;
            dims.push(Some(size));
        }
        Ok(dims)
    }

    /// Declarators after the first name; consumes the `;` when `terminated`.
    pub(crate) fn parse_var_rest(
        &mut self,
        storage: Vec<Storage>,
        ty: TypeExpr,
        name: Token,
        start: Span,
        terminated: bool,
    ) -> Result<VarDecl, ParseError> {
        let old_style = ty.old_style;
        let base_ty = ty.clone();
        let mut declarators = Vec::new();
        let (mut ty, mut name) = (ty, name);

        loop {
            let dims = self.parse_dims()?;
            let init = if self.match_op(Op::Assign) {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            declarators.push(Declarator {
                span: self.span_from(name.span),
                name: name.lexeme,
                ty,
                dims,
                init,
            });

            if !self.match_op(Op::Comma) {
                break;
            }
            if old_style {
                ty = self.parse_old_tag()?;
            } else {
                ty = base_ty.clone();
            }
            name = self.expect_identifier()?;
        }

        if terminated {
            self.expect_semicolon("after declaration")?;
        }
        Ok(VarDecl {
            storage,
            declarators,
            span: self.span_from(start),
        })
    }

    /// Parameter list and body after the function name
    pub(crate) fn parse_function_rest(
        &mut self,
        storage: Vec<Storage>,
        ret: TypeExpr,
        name: Token,
        start: Span,
    ) -> Result<FuncDecl, ParseError> {
        let params = self.parse_params()?;

        let body = if self.check_op(Op::LBrace) {
            Some(self.parse_block_body()?)
        } else if self.match_op(Op::Semicolon) {
            None
        } else {
            return Err(self.expected("'{' or ';' after function signature"));
        };

        Ok(FuncDecl {
            storage,
            ret,
            name: name.lexeme,
            params,
            body,
            span: self.span_from(start),
        })
    }

    /// Parse `(params)`
    pub(crate) fn parse_params(&mut self) -> Result<Vec<Param>, ParseError> {
        self.expect_lparen("before parameters")?;
        let mut params = Vec::new();
        if self.match_op(Op::RParen) {
            return Ok(params);
        }
        loop {
            params.push(self.parse_param()?);
            if !self.match_op(Op::Comma) {
                break;
            }
        }
        self.expect_rparen("after parameters")?;
        Ok(params)
    }

    fn parse_param(&mut self) -> Result<Param, ParseError> {
        let start = self.current_span();
        let is_const = self.match_keyword(Keyword::Const);

        let (ty, variadic) = if self.check_op(Op::Ellipsis) {
            (TypeExpr::named("any", start), true)
        } else if self.is_new_style_head(true)
            || (self.peek().kind == TokenKind::Ident && self.peek_nth(1).is_op(Op::Ellipsis))
        {
            (self.parse_type()?, false)
        } else {
            let is_ref = self.match_op(Op::Amp);
            let mut ty = self.parse_old_tag()?;
            ty.is_ref = is_ref;
            (ty, false)
        };

        if variadic || self.check_op(Op::Ellipsis) {
            self.expect_op(Op::Ellipsis, "in variadic parameter")?;
            return Ok(Param {
                is_const,
                ty,
                name: String::new(),
                dims: Vec::new(),
                default: None,
                variadic: true,
                span: self.span_from(start),
            });
        }

        let name = self.expect_identifier()?;
        let dims = self.parse_dims()?;
        let default = if self.match_op(Op::Assign) {
            Some(self.parse_assignment()?)
        } else {
            None
        };

        Ok(Param {
            is_const,
            ty,
            name: name.lexeme,
            dims,
            default,
            variadic: false,
            span: self.span_from(start),
        })
    }

    /// `static_assert(cond[, "message"])`
    pub(crate) fn parse_static_assert(&mut self) -> Result<(Expr, Option<String>, Span), ParseError> {
        let start = self.expect_keyword(Keyword::StaticAssert, "")?.span;
        self.expect_lparen("after 'static_assert'")?;
        let cond = self.parse_assignment()?;
        let message = if self.match_op(Op::Comma) {
            let tok = self.peek().clone();
            if tok.kind != TokenKind::StringLit {
                return Err(self.expected("string literal message"));
            }
            self.advance();
            let text = crate::lexer::literal::unescape(&tok.lexeme).map_err(|msg| self.invalid(msg, tok.span))?;
            Some(text)
        } else {
            None
        };
        self.expect_rparen("after static_assert condition")?;
        self.expect_semicolon("after static_assert")?;
        Ok((cond, message, self.span_from(start)))
    }
}
