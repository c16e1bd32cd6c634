//! SourcePawn tokenizer
//!
//! - [`token`]: token kinds, keyword / directive / operator tables
//! - [`scanner`]: source text → tokens
//! - [`cursor`]: filtered lookahead over a token buffer
//! - [`literal`]: decoding literal lexemes into values

pub mod cursor;
pub mod literal;
pub mod scanner;
pub mod token;

pub use cursor::{Ignore, TokenCursor};
pub use scanner::{normalize_source, LexError, Scanner};
pub use token::{Directive, Keyword, Op, Token, TokenKind};

/// Scan `source` as if it were the file at `path`.
pub fn tokenize(source: &str, path: &str) -> Result<Vec<Token>, LexError> {
    Scanner::new(source, path).tokenize()
}
