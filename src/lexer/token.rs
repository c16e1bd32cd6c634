//! Token kinds and the [`Token`] record produced by the scanner.

use std::fmt;
use std::sync::Arc;

use crate::span::Span;

macro_rules! keywords {
    ($($variant:ident => $text:literal),* $(,)?) => {
        /// Reserved words, resolved by a static lookup after an identifier is scanned.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Keyword {
            $($variant),*
        }

        impl Keyword {
            pub fn lookup(word: &str) -> Option<Keyword> {
                match word {
                    $($text => Some(Keyword::$variant),)*
                    _ => None,
                }
            }

            pub fn as_str(self) -> &'static str {
                match self {
                    $(Keyword::$variant => $text),*
                }
            }
        }
    };
}

keywords! {
    Acquire => "acquire",
    Any => "any",
    As => "as",
    Assert => "assert",
    Bool => "bool",
    Break => "break",
    Builtin => "builtin",
    Case => "case",
    CastTo => "cast_to",
    Catch => "catch",
    Cellsof => "cellsof",
    Char => "char",
    Const => "const",
    Continue => "continue",
    Decl => "decl",
    Default => "default",
    Defined => "defined",
    Delete => "delete",
    Do => "do",
    Double => "double",
    Else => "else",
    Enum => "enum",
    Exit => "exit",
    Explicit => "explicit",
    False => "false",
    Finally => "finally",
    Float => "float",
    For => "for",
    Foreach => "foreach",
    Forward => "forward",
    Funcenum => "funcenum",
    Functag => "functag",
    Function => "function",
    Goto => "goto",
    If => "if",
    Implicit => "implicit",
    Import => "import",
    In => "in",
    Int => "int",
    Int8 => "int8",
    Int16 => "int16",
    Int32 => "int32",
    Int64 => "int64",
    Interface => "interface",
    Intn => "intn",
    Intrinsics => "__intrinsics__",
    Let => "let",
    Methodmap => "methodmap",
    Namespace => "namespace",
    Native => "native",
    New => "new",
    Null => "null",
    Nullable => "__nullable__",
    Object => "object",
    Operator => "operator",
    Package => "package",
    Private => "private",
    Property => "property",
    Protected => "protected",
    Public => "public",
    Readonly => "readonly",
    Return => "return",
    Sealed => "sealed",
    Sizeof => "sizeof",
    Sleep => "sleep",
    Static => "static",
    StaticAssert => "static_assert",
    Stock => "stock",
    Struct => "struct",
    Switch => "switch",
    Tagof => "tagof",
    This => "this",
    Throw => "throw",
    True => "true",
    Try => "try",
    Typedef => "typedef",
    Typeof => "typeof",
    Typeset => "typeset",
    Uint8 => "uint8",
    Uint16 => "uint16",
    Uint32 => "uint32",
    Uint64 => "uint64",
    Uintn => "uintn",
    Union => "union",
    Using => "using",
    Var => "var",
    Variant => "variant",
    ViewAs => "view_as",
    Virtual => "virtual",
    Void => "void",
    Volatile => "volatile",
    While => "while",
    With => "with",
}

impl Keyword {
    /// Keywords naming a built-in type.
    pub fn is_builtin_type(self) -> bool {
        matches!(
            self,
            Keyword::Int
                | Keyword::Float
                | Keyword::Char
                | Keyword::Bool
                | Keyword::Void
                | Keyword::Any
        )
    }

    /// Keywords that may lead a declaration as a storage class.
    pub fn is_storage_class(self) -> bool {
        matches!(
            self,
            Keyword::Public
                | Keyword::Stock
                | Keyword::Static
                | Keyword::Const
                | Keyword::Native
                | Keyword::Forward
                | Keyword::New
                | Keyword::Decl
        )
    }
}

macro_rules! directives {
    ($($variant:ident => $text:literal),* $(,)?) => {
        /// Preprocessor directive kinds; the lexeme carries the leading `#`.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Directive {
            $($variant),*
        }

        impl Directive {
            pub fn lookup(word: &str) -> Option<Directive> {
                match word {
                    $($text => Some(Directive::$variant),)*
                    _ => None,
                }
            }

            pub fn as_str(self) -> &'static str {
                match self {
                    $(Directive::$variant => $text),*
                }
            }
        }
    };
}

directives! {
    Define => "define",
    Undef => "undef",
    If => "if",
    Elseif => "elseif",
    Elif => "elif",
    Else => "else",
    Endif => "endif",
    Include => "include",
    TryInclude => "tryinclude",
    Error => "error",
    Warning => "warning",
    Pragma => "pragma",
    Line => "line",
    File => "file",
    EndInput => "endinput",
}

macro_rules! operators {
    ($($variant:ident => $text:literal),* $(,)?) => {
        /// Operators and delimiters.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Op {
            $($variant),*
        }

        impl Op {
            /// Every operator, longest lexeme first, so a linear scan is a
            /// longest match.
            pub const ALL: &'static [Op] = &[$(Op::$variant),*];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(Op::$variant => $text),*
                }
            }
        }
    };
}

operators! {
    UshrAssign => ">>>=",
    Ushr => ">>>",
    ShlAssign => "<<=",
    ShrAssign => ">>=",
    Ellipsis => "...",
    ColonColon => "::",
    Increment => "++",
    Decrement => "--",
    AddAssign => "+=",
    SubAssign => "-=",
    MulAssign => "*=",
    DivAssign => "/=",
    ModAssign => "%=",
    AndAssign => "&=",
    OrAssign => "|=",
    XorAssign => "^=",
    EqEq => "==",
    NotEq => "!=",
    LtEq => "<=",
    GtEq => ">=",
    Shl => "<<",
    Shr => ">>",
    AndAnd => "&&",
    OrOr => "||",
    Plus => "+",
    Minus => "-",
    Star => "*",
    Slash => "/",
    Percent => "%",
    Amp => "&",
    Pipe => "|",
    Caret => "^",
    Tilde => "~",
    Bang => "!",
    Lt => "<",
    Gt => ">",
    Assign => "=",
    Question => "?",
    Colon => ":",
    Dot => ".",
    Comma => ",",
    Semicolon => ";",
    LParen => "(",
    RParen => ")",
    LBracket => "[",
    RBracket => "]",
    LBrace => "{",
    RBrace => "}",
}

/// Closed set of token kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Trivia
    Space,
    Tab,
    Newline,
    Comment,

    // Literals and names
    Ident,
    IntLit,
    FloatLit,
    CharLit,
    StringLit,

    // Directive-line sub-lexis: `%1` and `#%1`
    MacroParam,
    MacroStringify,

    Keyword(Keyword),
    Directive(Directive),
    Op(Op),

    EoF,
}

impl TokenKind {
    pub fn is_trivia(self) -> bool {
        matches!(
            self,
            TokenKind::Space | TokenKind::Tab | TokenKind::Newline | TokenKind::Comment
        )
    }

    /// Trivia that does not end a directive line.
    pub fn is_blank(self) -> bool {
        matches!(self, TokenKind::Space | TokenKind::Tab | TokenKind::Comment)
    }

    pub fn is_literal(self) -> bool {
        matches!(
            self,
            TokenKind::IntLit | TokenKind::FloatLit | TokenKind::CharLit | TokenKind::StringLit
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Space => write!(f, "space"),
            TokenKind::Tab => write!(f, "tab"),
            TokenKind::Newline => write!(f, "newline"),
            TokenKind::Comment => write!(f, "comment"),
            TokenKind::Ident => write!(f, "identifier"),
            TokenKind::IntLit => write!(f, "integer literal"),
            TokenKind::FloatLit => write!(f, "float literal"),
            TokenKind::CharLit => write!(f, "character literal"),
            TokenKind::StringLit => write!(f, "string literal"),
            TokenKind::MacroParam => write!(f, "macro parameter"),
            TokenKind::MacroStringify => write!(f, "macro stringification"),
            TokenKind::Keyword(kw) => write!(f, "'{}'", kw.as_str()),
            TokenKind::Directive(d) => write!(f, "'#{}'", d.as_str()),
            TokenKind::Op(op) => write!(f, "'{}'", op.as_str()),
            TokenKind::EoF => write!(f, "end of file"),
        }
    }
}

/// One scanned token. Never mutated once produced; the preprocessor copies
/// tokens when it needs different spans.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub span: Span,
    pub path: Arc<str>,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, span: Span, path: Arc<str>) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            span,
            path,
        }
    }

    pub fn is_op(&self, op: Op) -> bool {
        self.kind == TokenKind::Op(op)
    }

    pub fn is_keyword(&self, kw: Keyword) -> bool {
        self.kind == TokenKind::Keyword(kw)
    }

    /// Identifiers and keywords: anything spelled like a name.
    pub fn is_word(&self) -> bool {
        matches!(self.kind, TokenKind::Ident | TokenKind::Keyword(_))
    }

    /// Copy of this token anchored at a different span.
    pub fn respan(&self, span: Span) -> Token {
        Token {
            span,
            ..self.clone()
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Ident
            | TokenKind::IntLit
            | TokenKind::FloatLit
            | TokenKind::CharLit
            | TokenKind::StringLit
            | TokenKind::MacroParam
            | TokenKind::MacroStringify => write!(f, "{} '{}'", self.kind, self.lexeme),
            _ => write!(f, "{}", self.kind),
        }
    }
}
