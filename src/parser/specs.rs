//! Type-introducing declarations
//!
//! - `enum [Name][:] { A, B = 1, ... }` and `enum struct Name { ... }`
//! - `struct Name { public [const] T field; ... }`
//! - `methodmap Name [< Parent] [__nullable__] { ... }`
//! - `typedef Name = function T (params);`
//! - `typeset Name { function T (params); ... }`
//! - `using a.b;`

use crate::lexer::{Keyword, Op, TokenKind};
use crate::parser::ast::*;
use crate::parser::parse::{ParseError, Parser};
use crate::span::Span;

impl Parser {
    pub(crate) fn parse_spec(&mut self) -> Result<Spec, ParseError> {
        match self.peek().kind {
            TokenKind::Keyword(Keyword::Enum) if self.peek_nth(1).is_keyword(Keyword::Struct) => {
                self.parse_enum_struct()
            }
            TokenKind::Keyword(Keyword::Enum) => self.parse_enum(),
            TokenKind::Keyword(Keyword::Struct) => self.parse_struct(),
            TokenKind::Keyword(Keyword::Methodmap) => self.parse_methodmap(),
            TokenKind::Keyword(Keyword::Typedef) => self.parse_typedef(),
            TokenKind::Keyword(Keyword::Typeset) => self.parse_typeset(),
            TokenKind::Keyword(Keyword::Using) => self.parse_using(),
            _ => Err(self.expected("type declaration")),
        }
    }

    fn parse_enum(&mut self) -> Result<Spec, ParseError> {
        let start = self.advance().span;

        let name = if self.peek().kind == TokenKind::Ident {
            Some(self.advance().lexeme)
        } else {
            None
        };
        // `enum Name:` marks the constants with the enum's tag
        self.match_op(Op::Colon);

        // Increment clause `(<<= 1)`
        if self.match_op(Op::LParen) {
            while !self.check_op(Op::RParen) && !self.is_at_end() {
                self.advance();
            }
            self.expect_rparen("after enum increment")?;
        }

        self.expect_lbrace("after enum name")?;
        let mut items = Vec::new();
        while !self.check_op(Op::RBrace) {
            let item_start = self.current_span();
            // Old-style tagged constants: `Float:Speed`
            if self.peek().is_word() && self.peek_nth(1).is_op(Op::Colon) {
                self.advance();
                self.advance();
            }
            let item = self.expect_identifier()?;
            // Old-style sized entries: `Name[32]`
            self.parse_dims()?;
            let value = if self.match_op(Op::Assign) {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            items.push(EnumItem {
                name: item.lexeme,
                value,
                span: self.span_from(item_start),
            });
            if !self.match_op(Op::Comma) {
                break;
            }
        }
        self.expect_rbrace("after enum constants")?;
        self.match_op(Op::Semicolon);

        Ok(Spec::Enum {
            name,
            items,
            span: self.span_from(start),
        })
    }

    fn parse_enum_struct(&mut self) -> Result<Spec, ParseError> {
        let start = self.advance().span;
        self.advance();
        let name = self.expect_identifier()?.lexeme;
        self.expect_lbrace("after enum struct name")?;

        let mut fields = Vec::new();
        let mut methods = Vec::new();
        while !self.check_op(Op::RBrace) && !self.is_at_end() {
            let member_start = self.current_span();
            let storage = self.parse_storage();
            let ty = self.parse_type()?;
            let member = self.expect_identifier()?;
            if self.check_op(Op::LParen) {
                methods.push(self.parse_function_rest(storage, ty, member, member_start)?);
            } else {
                let dims = self.parse_dims()?;
                self.expect_semicolon("after enum struct field")?;
                fields.push(Field {
                    is_public: true,
                    is_const: storage.contains(&Storage::Const),
                    ty,
                    name: member.lexeme,
                    dims,
                    span: self.span_from(member_start),
                });
            }
        }
        self.expect_rbrace("after enum struct body")?;
        self.match_op(Op::Semicolon);

        Ok(Spec::EnumStruct {
            name,
            fields,
            methods,
            span: self.span_from(start),
        })
    }

    /// Parse struct definition: struct Name { fields }
    fn parse_struct(&mut self) -> Result<Spec, ParseError> {
        let start = self.advance().span;
        let name = self.expect_identifier()?.lexeme;
        self.expect_lbrace("after struct name")?;

        let mut fields = Vec::new();
        while !self.check_op(Op::RBrace) && !self.is_at_end() {
            let field_start = self.current_span();
            let is_public = self.match_keyword(Keyword::Public);
            let is_const = self.match_keyword(Keyword::Const);
            let (ty, field) = self.parse_declaration_head(false)?;
            let dims = self.parse_dims()?;
            self.expect_semicolon("after struct field")?;
            fields.push(Field {
                is_public,
                is_const,
                ty,
                name: field.lexeme,
                dims,
                span: self.span_from(field_start),
            });
        }
        self.expect_rbrace("after struct fields")?;
        self.match_op(Op::Semicolon);

        Ok(Spec::Struct {
            name,
            fields,
            span: self.span_from(start),
        })
    }

    fn parse_methodmap(&mut self) -> Result<Spec, ParseError> {
        let start = self.advance().span;
        let name = self.expect_identifier()?.lexeme;

        let mut parent = None;
        let mut nullable = false;
        loop {
            if self.match_op(Op::Lt) {
                parent = Some(self.expect_identifier()?.lexeme);
            } else if self.match_keyword(Keyword::Nullable) {
                nullable = true;
            } else {
                break;
            }
        }

        self.expect_lbrace("after methodmap name")?;
        let mut members = Vec::new();
        while !self.check_op(Op::RBrace) && !self.is_at_end() {
            members.push(self.parse_methodmap_member(&name)?);
        }
        self.expect_rbrace("after methodmap body")?;
        self.match_op(Op::Semicolon);

        Ok(Spec::MethodMap {
            name,
            parent,
            nullable,
            members,
            span: self.span_from(start),
        })
    }

    fn parse_methodmap_member(&mut self, map_name: &str) -> Result<MethodMapMember, ParseError> {
        let start = self.current_span();

        if self.match_keyword(Keyword::Property) {
            return self.parse_property(start);
        }

        let storage = self.parse_storage();
        if !storage.contains(&Storage::Public) {
            return Err(self.invalid("methodmap members must be 'public'", start));
        }

        // Constructor: the map's own name followed by `(`
        if self.peek().lexeme == map_name && self.peek_nth(1).is_op(Op::LParen) {
            let name = self.advance();
            let ret = TypeExpr::named(map_name, name.span);
            let func = self.parse_function_rest(storage, ret, name, start)?;
            return Ok(MethodMapMember::Constructor(func));
        }

        // Destructor syntax from older methodmaps: `~Name()`
        if self.match_op(Op::Tilde) {
            let name = self.expect_identifier()?;
            let ret = TypeExpr::named("void", name.span);
            let func = self.parse_function_rest(storage, ret, name, start)?;
            return Ok(MethodMapMember::Method(func));
        }

        let ty = self.parse_type()?;
        let name = self.expect_identifier()?;
        let func = self.parse_function_rest(storage, ty, name, start)?;
        Ok(MethodMapMember::Method(func))
    }

    fn parse_property(&mut self, start: Span) -> Result<MethodMapMember, ParseError> {
        let ty = self.parse_type()?;
        let name = self.expect_identifier()?.lexeme;
        self.expect_lbrace("after property name")?;

        let mut getter = None;
        let mut setter = None;
        while !self.check_op(Op::RBrace) && !self.is_at_end() {
            let acc_start = self.current_span();
            let storage = self.parse_storage();
            if !storage.contains(&Storage::Public) {
                return Err(self.invalid("property accessors must be 'public'", acc_start));
            }
            let is_native = storage.contains(&Storage::Native);
            let which = self.expect_name()?;
            let params = self.parse_params()?;
            let body = if self.check_op(Op::LBrace) {
                Some(self.parse_block_body()?)
            } else {
                self.expect_semicolon("after native accessor")?;
                None
            };
            let accessor = Accessor {
                is_native,
                params,
                body,
                span: self.span_from(acc_start),
            };
            match which.lexeme.as_str() {
                "get" => getter = Some(accessor),
                "set" => setter = Some(accessor),
                other => {
                    return Err(self.invalid(
                        format!("expected 'get' or 'set' accessor, found '{other}'"),
                        which.span,
                    ))
                }
            }
        }
        self.expect_rbrace("after property accessors")?;

        Ok(MethodMapMember::Property {
            ty,
            name,
            getter,
            setter,
            span: self.span_from(start),
        })
    }

    /// `function T (params)`
    pub(crate) fn parse_function_type(&mut self) -> Result<FuncType, ParseError> {
        let start = self.expect_keyword(Keyword::Function, "in function type")?.span;
        let ret = self.parse_type()?;
        let params = self.parse_params()?;
        Ok(FuncType {
            ret,
            params,
            span: self.span_from(start),
        })
    }

    fn parse_typedef(&mut self) -> Result<Spec, ParseError> {
        let start = self.advance().span;
        let name = self.expect_identifier()?.lexeme;
        self.expect_op(Op::Assign, "after typedef name")?;
        let func = self.parse_function_type()?;
        self.expect_semicolon("after typedef")?;
        Ok(Spec::Typedef {
            name,
            func,
            span: self.span_from(start),
        })
    }

    fn parse_typeset(&mut self) -> Result<Spec, ParseError> {
        let start = self.advance().span;
        let name = self.expect_identifier()?.lexeme;
        self.expect_lbrace("after typeset name")?;
        let mut members = Vec::new();
        while !self.check_op(Op::RBrace) && !self.is_at_end() {
            members.push(self.parse_function_type()?);
            self.expect_semicolon("after typeset member")?;
        }
        self.expect_rbrace("after typeset members")?;
        self.match_op(Op::Semicolon);
        Ok(Spec::Typeset {
            name,
            members,
            span: self.span_from(start),
        })
    }

    fn parse_using(&mut self) -> Result<Spec, ParseError> {
        let start = self.advance().span;
        let mut path = vec![self.expect_name()?.lexeme];
        while self.match_op(Op::Dot) {
            path.push(self.expect_name()?.lexeme);
        }
        self.expect_semicolon("after 'using' path")?;
        Ok(Spec::Using {
            path,
            span: self.span_from(start),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::lexer::tokenize;
    use crate::parser::ast::*;
    use crate::parser::parse::Parser;

    fn spec(src: &str) -> Spec {
        let mut parser = Parser::new(tokenize(src, "t.sp").unwrap(), 5);
        let mut plugin = parser.parse_plugin();
        let diags = parser.into_diagnostics();
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        match plugin.decls.remove(0) {
            Decl::Type(spec) => spec,
            other => panic!("Expected type declaration, got {other:?}"),
        }
    }

    #[test]
    fn test_enum() {
        match spec("enum Team { Team_None, Team_Red = 2, Team_Blue, };") {
            Spec::Enum { name, items, .. } => {
                assert_eq!(name.as_deref(), Some("Team"));
                assert_eq!(items.len(), 3);
                assert!(items[1].value.is_some());
            }
            other => panic!("Expected enum, got {other:?}"),
        }
    }

    #[test]
    fn test_anonymous_enum() {
        match spec("enum { A, B }") {
            Spec::Enum { name, items, .. } => {
                assert!(name.is_none());
                assert_eq!(items.len(), 2);
            }
            other => panic!("Expected enum, got {other:?}"),
        }
    }

    #[test]
    fn test_enum_struct() {
        let src = "enum struct Player { int id; float pos[3]; int Score() { return this.id; } }";
        match spec(src) {
            Spec::EnumStruct { name, fields, methods, .. } => {
                assert_eq!(name, "Player");
                assert_eq!(fields.len(), 2);
                assert_eq!(fields[1].dims.len(), 1);
                assert_eq!(methods[0].name, "Score");
            }
            other => panic!("Expected enum struct, got {other:?}"),
        }
    }

    #[test]
    fn test_methodmap() {
        let src = "methodmap Stack < Handle {
            public Stack(int size) { return view_as<Stack>(CreateStack(size)); }
            public native void Push(any value);
            public static int Max() { return 8; }
            property int Length {
                public get() { return 0; }
                public native set(int value);
            }
        }";
        match spec(src) {
            Spec::MethodMap { name, parent, members, .. } => {
                assert_eq!(name, "Stack");
                assert_eq!(parent.as_deref(), Some("Handle"));
                assert_eq!(members.len(), 4);
                assert!(matches!(members[0], MethodMapMember::Constructor(_)));
                match &members[3] {
                    MethodMapMember::Property { getter, setter, .. } => {
                        assert!(getter.as_ref().is_some_and(|g| g.body.is_some()));
                        assert!(setter.as_ref().is_some_and(|s| s.is_native));
                    }
                    other => panic!("Expected property, got {other:?}"),
                }
            }
            other => panic!("Expected methodmap, got {other:?}"),
        }
    }

    #[test]
    fn test_nullable_methodmap() {
        match spec("methodmap Handle __nullable__ { }") {
            Spec::MethodMap { nullable, parent, .. } => {
                assert!(nullable);
                assert!(parent.is_none());
            }
            other => panic!("Expected methodmap, got {other:?}"),
        }
    }

    #[test]
    fn test_typedef_and_typeset() {
        match spec("typedef Callback = function void (int client, any data);") {
            Spec::Typedef { name, func, .. } => {
                assert_eq!(name, "Callback");
                assert_eq!(func.params.len(), 2);
            }
            other => panic!("Expected typedef, got {other:?}"),
        }
        match spec("typeset Handler { function void (); function Action (int id); };") {
            Spec::Typeset { members, .. } => assert_eq!(members.len(), 2),
            other => panic!("Expected typeset, got {other:?}"),
        }
    }

    #[test]
    fn test_struct_and_using() {
        match spec("struct Plugin { public const char[] name; public const char[] author; }") {
            Spec::Struct { fields, .. } => {
                assert_eq!(fields.len(), 2);
                assert!(fields[0].is_const && fields[0].is_public);
            }
            other => panic!("Expected struct, got {other:?}"),
        }
        match spec("using __intrinsics__.Handle;") {
            Spec::Using { path, .. } => assert_eq!(path, vec!["__intrinsics__", "Handle"]),
            other => panic!("Expected using, got {other:?}"),
        }
    }
}
