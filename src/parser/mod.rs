//! SourcePawn parser
//!
//! This module transforms a token stream into an Abstract Syntax Tree (AST):
//! - [`ast`]: AST node definitions
//! - [`parse`]: the [`Parser`] context, helpers and error recovery
//! - `declarations`, `specs`, `statements`, `expressions`: one production
//!   family each, all as methods on [`Parser`]
//!
//! # Supported language
//!
//! - New-style (`int x;`, `float[] v`) and old-style (`new Float:x;`) declarations
//! - Functions, natives, forwards, `static_assert`
//! - `enum`, `enum struct`, `struct`, `methodmap`, `typedef`, `typeset`, `using`
//! - The full statement set and expression ladder, including chained comparisons
//!
//! # Parser Implementation
//!
//! Hand-written recursive descent parser with one function per precedence level.
//! Syntax errors are recovered at statement and declaration boundaries.

pub mod ast;
mod declarations;
mod expressions;
pub mod parse;
mod specs;
mod statements;

pub use parse::{ParseError, Parser};
