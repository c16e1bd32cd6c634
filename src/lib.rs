//! # Introduction
//!
//! spfront reads SourcePawn plugins: it scans source text into tokens, runs
//! the textual preprocessor, parses the result into an AST and type-checks
//! it, folding compile-time constants along the way. Every stage reports
//! span-anchored [`diagnostics::Diagnostic`]s instead of stopping at the
//! first problem where it can.
//!
//! ## Pipeline
//!
//! ```text
//! Source → Scanner → Preprocessor → Parser → AST → Checker / Evaluator
//! ```
//!
//! 1. [`lexer`]: turns text into tokens, trivia included, and decodes
//!    literal lexemes.
//! 2. [`preprocess`]: `#define`, macro expansion with rescanning,
//!    `#if`/`#else` frames and `#include`.
//! 3. [`parser`]: recursive descent over the filtered token stream, with
//!    recovery at statement and declaration boundaries.
//! 4. [`types`]: the unified [`types::Type`], the constant
//!    [`types::Evaluator`] and the [`types::Checker`].
//! 5. [`pipeline`]: entry points running the stages in order and returning
//!    an [`pipeline::Outcome`].
//!
//! [`options::Options`] configures the lexing entry points and the parser's
//! error cap; [`span`] holds source positions shared by everything above.
//!
//! ## Example
//!
//! ```
//! use spfront::options::Options;
//! use spfront::pipeline;
//! use spfront::preprocess::MacroTable;
//!
//! let mut macros = MacroTable::new();
//! let out = pipeline::eval_expression("1 + 2 * 3", &Options::default(), &mut macros);
//! assert!(out.ok);
//! ```

pub mod diagnostics;
pub mod lexer;
pub mod options;
pub mod parser;
pub mod pipeline;
pub mod preprocess;
pub mod span;
pub mod types;
