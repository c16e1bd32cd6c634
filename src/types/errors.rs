//! Errors raised while checking types or folding constants
//!
//! [`EvalError`] covers both static type errors (reported, the node becomes
//! `Void`) and runtime errors met while folding (division by zero, constant
//! out-of-bounds index, the loop iteration cap).

use std::sync::Arc;

use thiserror::Error;

use crate::diagnostics::{codes, Diagnostic};
use crate::span::Span;
use crate::types::Type;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("type mismatch: expected '{expected}', found '{found}'")]
    Mismatch {
        expected: Type,
        found: Type,
        span: Span,
    },

    #[error("operator '{op}' cannot be applied to '{ty}'")]
    NotArithmetic {
        op: &'static str,
        ty: Type,
        span: Span,
    },

    #[error("undefined symbol '{name}'")]
    Undefined { name: String, span: Span },

    #[error("'{ty}' cannot be indexed")]
    NotIndexable { ty: Type, span: Span },

    #[error("'{name}' expects {expected} argument(s), found {found}")]
    ArgCount {
        name: String,
        expected: usize,
        found: usize,
        span: Span,
    },

    #[error("expression cannot be assigned to")]
    NotAssignable { span: Span },

    #[error("{what} is not a constant expression")]
    NotConstant { what: &'static str, span: Span },

    #[error("array of {cells} cells exceeds the limit of {limit}")]
    ArrayTooLarge { cells: u64, limit: usize, span: Span },

    #[error("{message}")]
    StaticAssert { message: String, span: Span },

    #[error("index {index} is out of bounds for length {len}")]
    OutOfBounds { index: i64, len: usize, span: Span },

    #[error("division by zero")]
    DivisionByZero { span: Span },

    #[error("assertion failed")]
    AssertFailed { span: Span },

    #[error("evaluation exceeded {limit} loop iterations")]
    IterationLimit { limit: usize, span: Span },
}

impl EvalError {
    pub fn span(&self) -> Span {
        match self {
            EvalError::Mismatch { span, .. }
            | EvalError::NotArithmetic { span, .. }
            | EvalError::Undefined { span, .. }
            | EvalError::NotIndexable { span, .. }
            | EvalError::ArgCount { span, .. }
            | EvalError::NotAssignable { span }
            | EvalError::NotConstant { span, .. }
            | EvalError::ArrayTooLarge { span, .. }
            | EvalError::StaticAssert { span, .. }
            | EvalError::OutOfBounds { span, .. }
            | EvalError::DivisionByZero { span }
            | EvalError::AssertFailed { span }
            | EvalError::IterationLimit { span, .. } => *span,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            EvalError::Mismatch { .. } | EvalError::ArgCount { .. } | EvalError::NotAssignable { .. } => {
                codes::TYPE_MISMATCH
            }
            EvalError::NotArithmetic { .. } => codes::NOT_ARITHMETIC,
            EvalError::Undefined { .. } => codes::UNDEFINED,
            EvalError::NotIndexable { .. } => codes::NOT_INDEXABLE,
            EvalError::NotConstant { .. } => codes::NOT_CONSTANT,
            EvalError::ArrayTooLarge { .. } => codes::ARRAY_TOO_LARGE,
            EvalError::StaticAssert { .. } => codes::STATIC_ASSERT,
            EvalError::OutOfBounds { .. } | EvalError::DivisionByZero { .. } | EvalError::AssertFailed { .. } => {
                codes::RUNTIME
            }
            EvalError::IterationLimit { .. } => codes::ITERATION_LIMIT,
        }
    }

    pub fn to_diagnostic(&self, path: &Arc<str>) -> Diagnostic {
        Diagnostic::error(self.code(), self.to_string(), Arc::clone(path), self.span())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_and_codes() {
        let err = EvalError::Mismatch {
            expected: Type::Int,
            found: Type::array(Type::Char, 4),
            span: Span::point(1, 1),
        };
        assert_eq!(err.to_string(), "type mismatch: expected 'int', found 'char[4]'");
        assert_eq!(err.code(), codes::TYPE_MISMATCH);

        let err = EvalError::DivisionByZero { span: Span::point(2, 3) };
        let diag = err.to_diagnostic(&Arc::from("t.sp"));
        assert_eq!(diag.code, codes::RUNTIME);
        assert_eq!(diag.span, Span::point(2, 3));
    }
}
