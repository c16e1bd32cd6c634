//! Types, constant evaluation and static checking
//!
//! - [`ty`]: the unified [`Type`], [`ConstValue`] and [`TypeAndVal`]
//! - [`ops`]: operator typing and folding rules shared by both passes
//! - [`eval`]: the [`Evaluator`], which folds constants and runs constant
//!   control flow
//! - [`check`]: the [`Checker`], which types every expression of a plugin
//! - [`errors`]: [`EvalError`] and its diagnostic codes

pub mod check;
pub mod errors;
pub mod eval;
pub mod ops;
pub mod ty;

pub use check::{check_plugin, Checker, FnSig};
pub use errors::EvalError;
pub use eval::{Evaluator, MAX_ITERATIONS};
pub use ty::{ConstValue, Type, TypeAndVal};
