// AST (Abstract Syntax Tree) definitions for SourcePawn plugins

use crate::span::Span;
use crate::types::Type;

/// Storage classes and declaration modifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    Public,
    Stock,
    Static,
    Const,
    Native,
    Forward,
    /// Old-style `new`
    New,
    /// Old-style `decl`
    Decl,
}

/// A type as written in source: `int`, `float[]`, `Handle`, `char&`
#[derive(Debug, Clone, PartialEq)]
pub struct TypeExpr {
    pub name: String,
    /// `[]` pairs written after the type name (`int[] values`)
    pub dims: usize,
    pub is_ref: bool,
    /// Written as an old-style `Tag:` prefix, or implied by its absence
    pub old_style: bool,
    pub span: Span,
}

impl TypeExpr {
    pub fn named(name: impl Into<String>, span: Span) -> Self {
        TypeExpr {
            name: name.into(),
            dims: 0,
            is_ref: false,
            old_style: false,
            span,
        }
    }

    /// The untagged cell type of old-style declarations.
    pub fn implicit_int(span: Span) -> Self {
        TypeExpr {
            old_style: true,
            ..TypeExpr::named("int", span)
        }
    }
}

/// Binary operators, including every assignment form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    // Logical
    And,
    Or,
    // Bitwise
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Ushr,
    // Assignment
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    AndAssign,
    OrAssign,
    XorAssign,
    ShlAssign,
    ShrAssign,
    UshrAssign,
}

impl BinOp {
    pub fn is_assignment(self) -> bool {
        self.compound_base().is_some() || self == BinOp::Assign
    }

    /// `a op= b` performs `op`.
    pub fn compound_base(self) -> Option<BinOp> {
        Some(match self {
            BinOp::AddAssign => BinOp::Add,
            BinOp::SubAssign => BinOp::Sub,
            BinOp::MulAssign => BinOp::Mul,
            BinOp::DivAssign => BinOp::Div,
            BinOp::ModAssign => BinOp::Mod,
            BinOp::AndAssign => BinOp::BitAnd,
            BinOp::OrAssign => BinOp::BitOr,
            BinOp::XorAssign => BinOp::BitXor,
            BinOp::ShlAssign => BinOp::Shl,
            BinOp::ShrAssign => BinOp::Shr,
            BinOp::UshrAssign => BinOp::Ushr,
            _ => return None,
        })
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }

    pub fn is_shift(self) -> bool {
        matches!(self, BinOp::Shl | BinOp::Shr | BinOp::Ushr)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Ushr => ">>>",
            BinOp::Assign => "=",
            BinOp::AddAssign => "+=",
            BinOp::SubAssign => "-=",
            BinOp::MulAssign => "*=",
            BinOp::DivAssign => "/=",
            BinOp::ModAssign => "%=",
            BinOp::AndAssign => "&=",
            BinOp::OrAssign => "|=",
            BinOp::XorAssign => "^=",
            BinOp::ShlAssign => "<<=",
            BinOp::ShrAssign => ">>=",
            BinOp::UshrAssign => ">>>=",
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,     // -x
    Not,     // !x
    BitNot,  // ~x
    PreInc,  // ++x
    PreDec,  // --x
    PostInc, // x++
    PostDec, // x--
}

impl UnOp {
    pub fn is_increment(self) -> bool {
        matches!(self, UnOp::PreInc | UnOp::PreDec | UnOp::PostInc | UnOp::PostDec)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LitKind {
    Int,
    Float,
    Char,
    String,
    Bool,
}

/// Function signature used by `typedef`, `typeset` and `function` literals
#[derive(Debug, Clone, PartialEq)]
pub struct FuncType {
    pub ret: TypeExpr,
    pub params: Vec<Param>,
    pub span: Span,
}

/// An expression. `ty` is filled in by the checker.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    pub ty: Option<Type>,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Expr { kind, span, ty: None }
    }

    pub fn bad(span: Span) -> Self {
        Expr::new(ExprKind::Bad, span)
    }

    /// Name of a plain identifier expression
    pub fn as_name(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Name(name) => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Bad,
    Null,
    This,
    /// Literal with its source lexeme (quotes included for chars/strings)
    Lit {
        kind: LitKind,
        raw: String,
    },
    Name(String),
    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// `a < b <= c`: the conjunction of adjacent comparisons
    Chain {
        first: Box<Expr>,
        links: Vec<(BinOp, Expr)>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    /// `.name = value` inside a call's argument list
    NamedArg {
        name: String,
        value: Box<Expr>,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    Field {
        base: Box<Expr>,
        name: String,
    },
    /// `base::name`
    Scope {
        base: Box<Expr>,
        name: String,
    },
    Ternary {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    ViewAs {
        ty: TypeExpr,
        value: Box<Expr>,
    },
    FuncLit(FuncType),
    /// `{ a, b, ... }` initialiser list
    Brace(Vec<Expr>),
    Comma(Vec<Expr>),
    /// `sizeof x`, `sizeof x[]` (one inner dimension per `[]`)
    Sizeof {
        operand: Box<Expr>,
        inner_dims: usize,
    },
    /// `new Class(args)`
    New {
        class: String,
        args: Vec<Expr>,
    },
    /// `new int[a][b]`
    NewArray {
        elem: TypeExpr,
        dims: Vec<Expr>,
    },
    /// `...` in an initialiser list or argument position
    Ellipsis,
}

/// Function parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub is_const: bool,
    pub ty: TypeExpr,
    pub name: String,
    /// Dimensions written after the name; `None` for `[]`
    pub dims: Vec<Option<Expr>>,
    pub default: Option<Expr>,
    pub variadic: bool,
    pub span: Span,
}

/// One declared name in a variable declaration
#[derive(Debug, Clone, PartialEq)]
pub struct Declarator {
    pub name: String,
    /// Old-style per-declarator tag (`new Float:x, y`)
    pub ty: TypeExpr,
    pub dims: Vec<Option<Expr>>,
    pub init: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub storage: Vec<Storage>,
    pub declarators: Vec<Declarator>,
    pub span: Span,
}

impl VarDecl {
    pub fn is_const(&self) -> bool {
        self.storage.contains(&Storage::Const)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuncDecl {
    pub storage: Vec<Storage>,
    pub ret: TypeExpr,
    pub name: String,
    pub params: Vec<Param>,
    /// `None` for natives, forwards and bodiless methodmap members
    pub body: Option<Vec<Stmt>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumItem {
    pub name: String,
    pub value: Option<Expr>,
    pub span: Span,
}

/// Field of an `enum struct` or `struct`
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub is_public: bool,
    pub is_const: bool,
    pub ty: TypeExpr,
    pub name: String,
    pub dims: Vec<Option<Expr>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Accessor {
    pub is_native: bool,
    pub params: Vec<Param>,
    pub body: Option<Vec<Stmt>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MethodMapMember {
    Constructor(FuncDecl),
    Method(FuncDecl),
    Property {
        ty: TypeExpr,
        name: String,
        getter: Option<Accessor>,
        setter: Option<Accessor>,
        span: Span,
    },
}

/// Type-introducing declarations
#[derive(Debug, Clone, PartialEq)]
pub enum Spec {
    Bad {
        span: Span,
    },
    Enum {
        name: Option<String>,
        items: Vec<EnumItem>,
        span: Span,
    },
    EnumStruct {
        name: String,
        fields: Vec<Field>,
        methods: Vec<FuncDecl>,
        span: Span,
    },
    Struct {
        name: String,
        fields: Vec<Field>,
        span: Span,
    },
    MethodMap {
        name: String,
        parent: Option<String>,
        nullable: bool,
        members: Vec<MethodMapMember>,
        span: Span,
    },
    Typedef {
        name: String,
        func: FuncType,
        span: Span,
    },
    Typeset {
        name: String,
        members: Vec<FuncType>,
        span: Span,
    },
    /// `using a.b;`
    Using {
        path: Vec<String>,
        span: Span,
    },
}

impl Spec {
    pub fn span(&self) -> Span {
        match self {
            Spec::Bad { span }
            | Spec::Enum { span, .. }
            | Spec::EnumStruct { span, .. }
            | Spec::Struct { span, .. }
            | Spec::MethodMap { span, .. }
            | Spec::Typedef { span, .. }
            | Spec::Typeset { span, .. }
            | Spec::Using { span, .. } => *span,
        }
    }
}

/// A `case a, b:` arm of a switch
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    pub values: Vec<Expr>,
    pub body: Box<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Bad {
        span: Span,
    },
    Block {
        stmts: Vec<Stmt>,
        span: Span,
    },
    Expr {
        expr: Expr,
        span: Span,
    },
    Decl(VarDecl),
    If {
        cond: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
        span: Span,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
        span: Span,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
        span: Span,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        step: Option<Expr>,
        body: Box<Stmt>,
        span: Span,
    },
    Switch {
        subject: Expr,
        cases: Vec<SwitchCase>,
        default: Option<Box<Stmt>>,
        span: Span,
    },
    Return {
        value: Option<Expr>,
        span: Span,
    },
    Assert {
        cond: Expr,
        span: Span,
    },
    Delete {
        target: Expr,
        span: Span,
    },
    Break {
        span: Span,
    },
    Continue {
        span: Span,
    },
    StaticAssert {
        cond: Expr,
        message: Option<String>,
        span: Span,
    },
}

impl Stmt {
    /// Get the source span of this statement
    pub fn span(&self) -> Span {
        match self {
            Stmt::Decl(decl) => decl.span,
            Stmt::Bad { span }
            | Stmt::Block { span, .. }
            | Stmt::Expr { span, .. }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::DoWhile { span, .. }
            | Stmt::For { span, .. }
            | Stmt::Switch { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::Assert { span, .. }
            | Stmt::Delete { span, .. }
            | Stmt::Break { span }
            | Stmt::Continue { span }
            | Stmt::StaticAssert { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Bad {
        span: Span,
    },
    Var(VarDecl),
    Func(FuncDecl),
    Type(Spec),
    StaticAssert {
        cond: Expr,
        message: Option<String>,
        span: Span,
    },
}

impl Decl {
    pub fn span(&self) -> Span {
        match self {
            Decl::Bad { span } | Decl::StaticAssert { span, .. } => *span,
            Decl::Var(var) => var.span,
            Decl::Func(func) => func.span,
            Decl::Type(spec) => spec.span(),
        }
    }

    pub fn is_bad(&self) -> bool {
        matches!(self, Decl::Bad { .. } | Decl::Type(Spec::Bad { .. }))
    }
}

/// Root of a parsed source file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plugin {
    pub decls: Vec<Decl>, // Top-level declarations in source order
}

impl Plugin {
    pub fn new() -> Self {
        Plugin::default()
    }

    pub fn functions(&self) -> impl Iterator<Item = &FuncDecl> {
        self.decls.iter().filter_map(|d| match d {
            Decl::Func(func) => Some(func),
            _ => None,
        })
    }
}
