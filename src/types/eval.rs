//! Constant folding with concrete values, plus a minimal statement
//! interpreter for constant control flow.
//!
//! [`Evaluator::eval_expr`] folds one expression. [`Evaluator::run`] executes
//! a statement list (blocks, `if`, the three loops, `switch`, `return`,
//! `break`, `continue`, local declarations) and yields the returned value.
//! Loops are bounded by an iteration cap; tripping it aborts evaluation.
//!
//! Errors are reported as diagnostics and the failing expression evaluates to
//! `Void`. Names that were never defined are errors here: nothing outside the
//! evaluated code is known.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::diagnostics::{codes, Diagnostic, Reporter, Severity};
use crate::parser::ast::*;
use crate::span::Span;
use crate::types::ops::{self, ShiftWarning};
use crate::types::{ConstValue, EvalError, Type, TypeAndVal};

/// Loop iterations allowed per [`Evaluator::run`].
pub const MAX_ITERATIONS: usize = 1_000_000;

#[derive(Debug, Clone)]
struct Binding {
    value: TypeAndVal,
    is_const: bool,
}

/// How a statement finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Normal,
    Break,
    Continue,
    Return,
}

/// How a loop body finished, from the loop driver's point of view.
enum LoopBodyResult {
    /// Ran to completion or hit `continue`: iterate again.
    Continue,
    /// `break`: leave the loop.
    Break,
    /// `return`: unwind past the loop.
    Exit,
}

pub struct Evaluator {
    path: Arc<str>,
    reporter: Reporter,
    /// Innermost scope last; index 0 holds predefined constants.
    scopes: Vec<FxHashMap<String, Binding>>,
    iterations: usize,
    max_iterations: usize,
    return_value: Option<TypeAndVal>,
}

impl Evaluator {
    pub fn new(path: impl Into<Arc<str>>) -> Self {
        Self {
            path: path.into(),
            reporter: Reporter::new(),
            scopes: vec![FxHashMap::default()],
            iterations: 0,
            max_iterations: MAX_ITERATIONS,
            return_value: None,
        }
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Predefine a read-only name. A `None` value marks a name that exists
    /// but is not a compile-time constant.
    pub fn define(&mut self, name: impl Into<String>, value: TypeAndVal) {
        self.scopes[0].insert(name.into(), Binding { value, is_const: true });
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Fold `expr`, reporting any error. Errors evaluate to `Void`.
    pub fn eval_expr(&mut self, expr: &Expr) -> TypeAndVal {
        match self.try_eval(expr) {
            Ok(value) => value,
            Err(err) => {
                self.report(&err);
                TypeAndVal::void()
            }
        }
    }

    /// Fold `expr`, returning the first error instead of reporting it.
    /// Warnings are still recorded.
    pub fn try_eval(&mut self, expr: &Expr) -> Result<TypeAndVal, EvalError> {
        self.eval(expr)
    }

    /// Fold `expr` without recording anything. `None` when it is not a
    /// compile-time constant.
    pub fn probe(&mut self, expr: &Expr) -> Option<ConstValue> {
        let saved = std::mem::take(&mut self.reporter);
        let result = self.eval(expr);
        self.reporter = saved;
        result.ok().and_then(|value| value.value)
    }

    /// Like [`probe`](Self::probe), with every name in `hidden` treated as
    /// undefined for the duration of the fold.
    pub fn probe_hiding(&mut self, expr: &Expr, hidden: &[&str]) -> Option<ConstValue> {
        let mut removed = Vec::new();
        for name in hidden {
            for (depth, scope) in self.scopes.iter_mut().enumerate() {
                if let Some(binding) = scope.remove(*name) {
                    removed.push((depth, name.to_string(), binding));
                }
            }
        }
        let result = self.probe(expr);
        for (depth, name, binding) in removed {
            self.scopes[depth].insert(name, binding);
        }
        result
    }

    /// Execute `body` in a fresh scope and return the value it returns
    /// (`Void` if it falls off the end or fails).
    pub fn run(&mut self, body: &[Stmt]) -> TypeAndVal {
        self.iterations = 0;
        self.return_value = None;

        let result = self.exec_scoped(body);
        match result {
            Ok(_) => {
                debug!(iterations = self.iterations, "evaluation finished");
                self.return_value.take().unwrap_or_else(TypeAndVal::void)
            }
            Err(err) => {
                self.report(&err);
                TypeAndVal::void()
            }
        }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.reporter.diagnostics()
    }

    pub fn has_errors(&self) -> bool {
        self.reporter.has_errors()
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.reporter.into_diagnostics()
    }

    // ===== Helpers =====

    fn report(&mut self, err: &EvalError) {
        self.reporter.push(err.to_diagnostic(&self.path));
    }

    fn warn_shift(&mut self, warning: ShiftWarning, op: BinOp, amount: i32, span: Span) {
        self.reporter
            .emit(Severity::Warning, codes::SHIFT, warning.message(op, amount), &self.path, span);
    }

    fn lookup(&self, name: &str) -> Option<&Binding> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    fn lookup_mut(&mut self, name: &str) -> Option<&mut Binding> {
        self.scopes.iter_mut().rev().find_map(|scope| scope.get_mut(name))
    }

    fn known(value: &TypeAndVal, span: Span) -> Result<&ConstValue, EvalError> {
        value.value.as_ref().ok_or(EvalError::NotConstant {
            what: "value",
            span,
        })
    }

    // ===== Expressions =====

    fn eval(&mut self, expr: &Expr) -> Result<TypeAndVal, EvalError> {
        let span = expr.span;
        match &expr.kind {
            ExprKind::Lit { kind, raw } => {
                let value = ops::literal_value(*kind, raw, span)?;
                Ok(TypeAndVal::new(ops::literal_type(*kind, raw), Some(value)))
            }
            ExprKind::Null => Ok(TypeAndVal::new(Type::Handle("null".into()), Some(ConstValue::Int(0)))),
            ExprKind::Name(name) => {
                let binding = self.lookup(name).ok_or_else(|| EvalError::Undefined {
                    name: name.clone(),
                    span,
                })?;
                if binding.value.value.is_none() {
                    return Err(EvalError::NotConstant {
                        what: "non-constant variable",
                        span,
                    });
                }
                Ok(binding.value.clone())
            }
            ExprKind::Unary { op, operand } if op.is_increment() => self.eval_increment(*op, operand, span),
            ExprKind::Unary { op, operand } => {
                let value = self.eval(operand)?;
                let ty = ops::unary_type(*op, &value.ty, span)?;
                let folded = ops::fold_unary(*op, Self::known(&value, operand.span)?, span)?;
                let folded = folded.convert_to(&ty);
                Ok(TypeAndVal::new(ty, Some(folded)))
            }
            ExprKind::Binary { op, left, right } if op.is_assignment() => {
                self.eval_assignment(*op, left, right, span)
            }
            ExprKind::Binary { op, left, right } if op.is_logical() => {
                let lhs = self.eval(left)?;
                let lhs_truth = Self::known(&lhs, left.span)?.truthy();
                let short = match (op, lhs_truth) {
                    (BinOp::And, Some(false)) => Some(false),
                    (BinOp::Or, Some(true)) => Some(true),
                    _ => None,
                };
                if let Some(result) = short {
                    ops::binary_type(*op, &lhs.ty, &Type::Bool, span)?;
                    return Ok(TypeAndVal::known(ConstValue::Bool(result)));
                }
                let rhs = self.eval(right)?;
                self.fold(*op, &lhs, &rhs, right.span, span)
            }
            ExprKind::Binary { op, left, right } => {
                let lhs = self.eval(left)?;
                let rhs = self.eval(right)?;
                self.fold(*op, &lhs, &rhs, right.span, span)
            }
            ExprKind::Chain { first, links } => {
                let mut prev = self.eval(first)?;
                for (op, operand) in links {
                    let next = self.eval(operand)?;
                    let link = self.fold(*op, &prev, &next, operand.span, span)?;
                    if link.value.as_ref().and_then(ConstValue::truthy) != Some(true) {
                        return Ok(TypeAndVal::known(ConstValue::Bool(false)));
                    }
                    prev = next;
                }
                Ok(TypeAndVal::known(ConstValue::Bool(true)))
            }
            ExprKind::Ternary { cond, then, otherwise } => {
                if self.condition(cond)? {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
            ExprKind::Index { base, index } => self.eval_index(base, index, span),
            ExprKind::ViewAs { ty, value } => {
                let target = Type::from_type_expr(ty);
                let value = self.eval(value)?;
                if !value.ty.coercible_to(&target) {
                    return Err(EvalError::Mismatch {
                        expected: target,
                        found: value.ty,
                        span,
                    });
                }
                let retagged = value.value.map(|v| ops::retag(v, &target));
                Ok(TypeAndVal::new(target, retagged))
            }
            ExprKind::Brace(items) => {
                let mut values = Vec::new();
                let mut elem = None;
                for item in items.iter().filter(|e| !matches!(e.kind, ExprKind::Ellipsis)) {
                    let value = self.eval(item)?;
                    values.push(Self::known(&value, item.span)?.clone());
                    elem.get_or_insert(value.ty);
                }
                let ty = Type::array(elem.unwrap_or(Type::Any), values.len());
                Ok(TypeAndVal::new(ty, Some(ConstValue::Array(values))))
            }
            ExprKind::Comma(items) => {
                let mut last = TypeAndVal::void();
                for item in items {
                    last = self.eval(item)?;
                }
                Ok(last)
            }
            ExprKind::Sizeof { operand, inner_dims } => self.eval_sizeof(operand, *inner_dims),
            ExprKind::Bad => Err(not_constant("malformed expression", span)),
            ExprKind::This => Err(not_constant("'this'", span)),
            ExprKind::Call { .. } => Err(not_constant("function call", span)),
            ExprKind::NamedArg { .. } => Err(not_constant("named argument", span)),
            ExprKind::Field { .. } => Err(not_constant("field access", span)),
            ExprKind::Scope { .. } => Err(not_constant("scope access", span)),
            ExprKind::FuncLit(_) => Err(not_constant("function literal", span)),
            ExprKind::New { .. } => Err(not_constant("'new'", span)),
            ExprKind::NewArray { .. } => Err(not_constant("array allocation", span)),
            ExprKind::Ellipsis => Err(not_constant("'...'", span)),
        }
    }

    /// Type-check and fold one binary operator, reporting shift warnings.
    fn fold(
        &mut self,
        op: BinOp,
        lhs: &TypeAndVal,
        rhs: &TypeAndVal,
        rhs_span: Span,
        span: Span,
    ) -> Result<TypeAndVal, EvalError> {
        let ty = ops::binary_type(op, &lhs.ty, &rhs.ty, span)?;
        let left = Self::known(lhs, span)?;
        let right = Self::known(rhs, rhs_span)?;
        let (value, warning) = ops::fold_binary(op, left, right, span)?;
        if let Some(warning) = warning {
            let amount = right.as_int().unwrap_or(0);
            self.warn_shift(warning, op, amount, span);
        }
        let value = value.convert_to(&ty);
        Ok(TypeAndVal::new(ty, Some(value)))
    }

    fn eval_index(&mut self, base: &Expr, index: &Expr, span: Span) -> Result<TypeAndVal, EvalError> {
        let array = self.eval(base)?;
        let idx = self.eval(index)?;
        let Some(elem) = array.ty.element().cloned() else {
            return Err(EvalError::NotIndexable { ty: array.ty, span });
        };
        if !idx.ty.is_arithmetic() {
            return Err(EvalError::NotArithmetic {
                op: "[]",
                ty: idx.ty,
                span: index.span,
            });
        }

        let i = Self::known(&idx, index.span)?.as_int().unwrap_or(0);
        let value = Self::known(&array, base.span)?;
        let len = match array.ty.deref() {
            Type::Array { len, dynamic: false, .. } => *len,
            _ => stored_len(value),
        };
        if i < 0 || i as usize >= len {
            return Err(EvalError::OutOfBounds {
                index: i64::from(i),
                len,
                span,
            });
        }

        let i = i as usize;
        let item = match value {
            ConstValue::Array(items) => items.get(i).cloned().unwrap_or_else(|| ops::zero_value(&elem)),
            ConstValue::Str(s) => ConstValue::Char(s.chars().nth(i).unwrap_or('\0')),
            other => other.clone(),
        };
        Ok(TypeAndVal::new(elem, Some(item)))
    }

    fn eval_sizeof(&mut self, operand: &Expr, inner_dims: usize) -> Result<TypeAndVal, EvalError> {
        let Some(name) = operand.as_name() else {
            return Err(not_constant("sizeof of a member", operand.span));
        };
        let binding = self.lookup(name).ok_or_else(|| EvalError::Undefined {
            name: name.to_string(),
            span: operand.span,
        })?;

        let mut ty = binding.value.ty.deref();
        let mut value = binding.value.value.as_ref();
        for _ in 0..inner_dims {
            let Some(elem) = ty.element() else {
                return Err(EvalError::NotIndexable {
                    ty: ty.clone(),
                    span: operand.span,
                });
            };
            ty = elem;
            value = match value {
                Some(ConstValue::Array(items)) => items.first(),
                _ => None,
            };
        }

        let size = match ty {
            Type::Array { len, dynamic: false, .. } => *len,
            Type::Array { .. } => value.map_or(0, stored_len),
            _ => 1,
        };
        Ok(TypeAndVal::known(ConstValue::Int(size as i32)))
    }

    fn eval_increment(&mut self, op: UnOp, operand: &Expr, span: Span) -> Result<TypeAndVal, EvalError> {
        let current = self.eval(operand)?;
        let ty = ops::unary_type(op, &current.ty, span)?;
        let old = Self::known(&current, operand.span)?.clone();

        let delta = if matches!(op, UnOp::PreInc | UnOp::PostInc) { 1 } else { -1 };
        let new = match &old {
            ConstValue::Float(v) => ConstValue::Float(v + delta as f32),
            other => ConstValue::Int(other.as_int().unwrap_or(0).wrapping_add(delta)),
        };
        let new = new.convert_to(&ty);
        self.store(operand, new.clone())?;

        let result = if matches!(op, UnOp::PreInc | UnOp::PreDec) { new } else { old };
        Ok(TypeAndVal::new(ty, Some(result)))
    }

    fn eval_assignment(&mut self, op: BinOp, target: &Expr, value: &Expr, span: Span) -> Result<TypeAndVal, EvalError> {
        let rhs = self.eval(value)?;
        let current = self.eval(target)?;

        let stored = match op.compound_base() {
            Some(base) => {
                let folded = self.fold(base, &current, &rhs, value.span, span)?;
                if !folded.ty.coercible_to(&current.ty) {
                    return Err(EvalError::Mismatch {
                        expected: current.ty,
                        found: folded.ty,
                        span,
                    });
                }
                Self::known(&folded, span)?.clone()
            }
            None => {
                if !rhs.ty.coercible_to(&current.ty) {
                    return Err(EvalError::Mismatch {
                        expected: current.ty,
                        found: rhs.ty,
                        span,
                    });
                }
                Self::known(&rhs, value.span)?.clone()
            }
        };

        let ty = current.ty.deref().clone();
        let stored = ops::convert_value(stored, &ty, false);
        self.store(target, stored.clone())?;
        Ok(TypeAndVal::new(ty, Some(stored)))
    }

    /// Write `value` into the storage `target` names: a variable or an
    /// indexed element of one.
    fn store(&mut self, target: &Expr, value: ConstValue) -> Result<(), EvalError> {
        let mut path = Vec::new();
        let mut node = target;
        let name = loop {
            match &node.kind {
                ExprKind::Index { base, index } => {
                    let idx = self.eval(index)?;
                    let i = Self::known(&idx, index.span)?.as_int().unwrap_or(0);
                    path.push(i.max(0) as usize);
                    node = base;
                }
                ExprKind::Name(name) => break name,
                _ => return Err(EvalError::NotAssignable { span: target.span }),
            }
        };
        path.reverse();

        let binding = self.lookup_mut(name).ok_or_else(|| EvalError::Undefined {
            name: name.clone(),
            span: node.span,
        })?;
        if binding.is_const {
            return Err(EvalError::NotAssignable { span: target.span });
        }
        let ty = binding.value.ty.clone();
        let slot = binding.value.value.get_or_insert_with(|| ops::zero_value(&ty));
        set_path(slot, &path, value);
        Ok(())
    }

    fn condition(&mut self, cond: &Expr) -> Result<bool, EvalError> {
        let value = self.eval(cond)?;
        let truth = Self::known(&value, cond.span)?.truthy();
        truth.ok_or(EvalError::Mismatch {
            expected: Type::Bool,
            found: value.ty,
            span: cond.span,
        })
    }

    // ===== Statements =====

    fn exec_scoped(&mut self, stmts: &[Stmt]) -> Result<Flow, EvalError> {
        self.scopes.push(FxHashMap::default());
        let result = self.exec_stmts(stmts);
        self.scopes.pop();
        result
    }

    fn exec_stmts(&mut self, stmts: &[Stmt]) -> Result<Flow, EvalError> {
        for stmt in stmts {
            let flow = self.exec_stmt(stmt)?;
            if flow != Flow::Normal {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> Result<Flow, EvalError> {
        match stmt {
            Stmt::Block { stmts, .. } => self.exec_scoped(stmts),
            Stmt::Expr { expr, .. } => {
                self.eval(expr)?;
                Ok(Flow::Normal)
            }
            Stmt::Decl(decl) => {
                self.declare(decl)?;
                Ok(Flow::Normal)
            }
            Stmt::If { cond, then, otherwise, .. } => {
                if self.condition(cond)? {
                    self.exec_scoped(std::slice::from_ref(then))
                } else if let Some(otherwise) = otherwise {
                    self.exec_scoped(std::slice::from_ref(otherwise))
                } else {
                    Ok(Flow::Normal)
                }
            }
            Stmt::While { cond, body, span } => self.exec_while(cond, body, *span),
            Stmt::DoWhile { body, cond, span } => self.exec_do_while(body, cond, *span),
            Stmt::For {
                init,
                cond,
                step,
                body,
                span,
            } => {
                self.scopes.push(FxHashMap::default());
                let result = self.exec_for(init.as_deref(), cond.as_ref(), step.as_ref(), body, *span);
                self.scopes.pop();
                result
            }
            Stmt::Switch {
                subject,
                cases,
                default,
                ..
            } => {
                let subject = self.eval(subject)?;
                let value = Self::known(&subject, stmt.span())?.clone();
                for case in cases {
                    for label in &case.values {
                        let label_value = self.eval(label)?;
                        if ops::values_equal(&value, Self::known(&label_value, label.span)?) {
                            return self.exec_scoped(std::slice::from_ref(&case.body));
                        }
                    }
                }
                match default {
                    Some(body) => self.exec_scoped(std::slice::from_ref(body)),
                    None => Ok(Flow::Normal),
                }
            }
            Stmt::Return { value, .. } => {
                self.return_value = match value {
                    Some(expr) => Some(self.eval(expr)?),
                    None => None,
                };
                Ok(Flow::Return)
            }
            Stmt::Assert { cond, span } => {
                if !self.condition(cond)? {
                    return Err(EvalError::AssertFailed { span: *span });
                }
                Ok(Flow::Normal)
            }
            Stmt::StaticAssert { cond, message, span } => {
                if !self.condition(cond)? {
                    return Err(EvalError::StaticAssert {
                        message: message.clone().unwrap_or_else(|| "static assertion failed".to_string()),
                        span: *span,
                    });
                }
                Ok(Flow::Normal)
            }
            Stmt::Break { .. } => Ok(Flow::Break),
            Stmt::Continue { .. } => Ok(Flow::Continue),
            Stmt::Delete { span, .. } => Err(not_constant("'delete'", *span)),
            Stmt::Bad { span } => Err(not_constant("malformed statement", *span)),
        }
    }

    fn declare(&mut self, decl: &VarDecl) -> Result<(), EvalError> {
        for declarator in &decl.declarators {
            let mut dims = Vec::with_capacity(declarator.dims.len());
            for dim in &declarator.dims {
                dims.push(match dim {
                    Some(size) => Some(self.array_size(size)?),
                    None => None,
                });
            }
            ops::check_cells(&dims, declarator.span)?;
            let declared = Type::from_type_expr(&declarator.ty).with_dims(&dims);

            let (ty, value) = match &declarator.init {
                Some(init) => {
                    let value = self.eval(init)?;
                    if !ops::init_compatible(&declared, &value.ty) {
                        return Err(EvalError::Mismatch {
                            expected: declared,
                            found: value.ty,
                            span: init.span,
                        });
                    }
                    let ty = ops::adopt_length(declared, &value.ty);
                    let fill = ends_with_ellipsis(init);
                    let stored = ops::convert_value(Self::known(&value, init.span)?.clone(), &ty, fill);
                    (ty, stored)
                }
                None => {
                    let zero = ops::zero_value(&declared);
                    (declared, zero)
                }
            };

            if let Some(scope) = self.scopes.last_mut() {
                scope.insert(
                    declarator.name.clone(),
                    Binding {
                        value: TypeAndVal::new(ty, Some(value)),
                        is_const: decl.is_const(),
                    },
                );
            }
        }
        Ok(())
    }

    fn array_size(&mut self, size: &Expr) -> Result<usize, EvalError> {
        let value = self.eval(size)?;
        match Self::known(&value, size.span)?.as_int() {
            Some(n) if n >= 0 => Ok(n as usize),
            _ => Err(EvalError::Mismatch {
                expected: Type::Int,
                found: value.ty,
                span: size.span,
            }),
        }
    }

    /// Count one loop iteration against the cap.
    fn tick(&mut self, span: Span) -> Result<(), EvalError> {
        self.iterations += 1;
        if self.iterations > self.max_iterations {
            warn!(limit = self.max_iterations, at = %span, "iteration limit reached");
            return Err(EvalError::IterationLimit {
                limit: self.max_iterations,
                span,
            });
        }
        Ok(())
    }

    fn exec_loop_body(&mut self, body: &Stmt) -> Result<LoopBodyResult, EvalError> {
        match self.exec_scoped(std::slice::from_ref(body))? {
            Flow::Break => Ok(LoopBodyResult::Break),
            Flow::Return => Ok(LoopBodyResult::Exit),
            Flow::Normal | Flow::Continue => Ok(LoopBodyResult::Continue),
        }
    }

    fn exec_while(&mut self, cond: &Expr, body: &Stmt, span: Span) -> Result<Flow, EvalError> {
        while self.condition(cond)? {
            self.tick(span)?;
            match self.exec_loop_body(body)? {
                LoopBodyResult::Exit => return Ok(Flow::Return),
                LoopBodyResult::Break => break,
                LoopBodyResult::Continue => {}
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_do_while(&mut self, body: &Stmt, cond: &Expr, span: Span) -> Result<Flow, EvalError> {
        loop {
            self.tick(span)?;
            match self.exec_loop_body(body)? {
                LoopBodyResult::Exit => return Ok(Flow::Return),
                LoopBodyResult::Break => break,
                LoopBodyResult::Continue => {}
            }
            if !self.condition(cond)? {
                break;
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_for(
        &mut self,
        init: Option<&Stmt>,
        cond: Option<&Expr>,
        step: Option<&Expr>,
        body: &Stmt,
        span: Span,
    ) -> Result<Flow, EvalError> {
        if let Some(init) = init {
            self.exec_stmt(init)?;
        }
        loop {
            if let Some(cond) = cond {
                if !self.condition(cond)? {
                    break;
                }
            }
            self.tick(span)?;
            match self.exec_loop_body(body)? {
                LoopBodyResult::Exit => return Ok(Flow::Return),
                LoopBodyResult::Break => break,
                LoopBodyResult::Continue => {}
            }
            if let Some(step) = step {
                self.eval(step)?;
            }
        }
        Ok(Flow::Normal)
    }
}

fn not_constant(what: &'static str, span: Span) -> EvalError {
    EvalError::NotConstant { what, span }
}

fn ends_with_ellipsis(init: &Expr) -> bool {
    match &init.kind {
        ExprKind::Brace(items) => matches!(items.last().map(|e| &e.kind), Some(ExprKind::Ellipsis)),
        _ => false,
    }
}

/// Cells a value occupies; strings count their terminator.
fn stored_len(value: &ConstValue) -> usize {
    match value {
        ConstValue::Array(items) => items.len(),
        ConstValue::Str(s) => s.chars().count() + 1,
        _ => 1,
    }
}

fn set_path(slot: &mut ConstValue, path: &[usize], value: ConstValue) {
    let Some((&i, rest)) = path.split_first() else {
        *slot = value;
        return;
    };
    match slot {
        ConstValue::Array(items) => {
            if items.len() <= i {
                items.resize(i + 1, ConstValue::Int(0));
            }
            set_path(&mut items[i], rest, value);
        }
        ConstValue::Str(s) if rest.is_empty() => {
            let mut chars: Vec<char> = s.chars().collect();
            if chars.len() <= i {
                chars.resize(i + 1, '\0');
            }
            chars[i] = value.as_int().and_then(|v| char::from_u32(v as u32)).unwrap_or('\0');
            // A string ends at its first terminator
            *s = chars.into_iter().take_while(|&c| c != '\0').collect();
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::Parser;

    fn parse_expr(src: &str) -> Expr {
        Parser::new(tokenize(src, "t.sp").unwrap(), 5)
            .parse_single_expression()
            .unwrap()
    }

    fn eval(src: &str) -> (TypeAndVal, Vec<Diagnostic>) {
        let mut evaluator = Evaluator::new("t.sp");
        let value = evaluator.eval_expr(&parse_expr(src));
        (value, evaluator.into_diagnostics())
    }

    fn run(src: &str) -> (TypeAndVal, Vec<Diagnostic>) {
        let block = Parser::new(tokenize(src, "t.sp").unwrap(), 5)
            .parse_single_statement()
            .unwrap();
        let mut evaluator = Evaluator::new("t.sp").with_max_iterations(10_000);
        let value = evaluator.run(std::slice::from_ref(&block));
        (value, evaluator.into_diagnostics())
    }

    #[test]
    fn test_arithmetic_precedence() {
        let (value, diags) = eval("1 + 2 * 3");
        assert!(diags.is_empty());
        assert_eq!(value, TypeAndVal::known(ConstValue::Int(7)));
    }

    #[test]
    fn test_float_promotion() {
        let (value, _) = eval("1 + 0.5");
        assert_eq!(value.ty, Type::Float);
        assert_eq!(value.value, Some(ConstValue::Float(1.5)));
    }

    #[test]
    fn test_chained_comparison() {
        assert_eq!(eval("1 < 2 < 3").0.value, Some(ConstValue::Bool(true)));
        assert_eq!(eval("1 < 3 < 2").0.value, Some(ConstValue::Bool(false)));
        assert_eq!(eval("1 < 3 < 2").0.ty, Type::Bool);
    }

    #[test]
    fn test_shift_warnings() {
        let (value, diags) = eval("1 << 33");
        assert_eq!(value.value, Some(ConstValue::Int(2)));
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, codes::SHIFT);

        let (value, diags) = eval("7 << 0");
        assert_eq!(value.value, Some(ConstValue::Int(7)));
        assert_eq!(diags[0].severity, Severity::Warning);
    }

    #[test]
    fn test_division_by_zero_is_reported() {
        let (value, diags) = eval("10 / (5 - 5)");
        assert_eq!(value, TypeAndVal::void());
        assert_eq!(diags[0].code, codes::RUNTIME);
    }

    #[test]
    fn test_undefined_name() {
        let (value, diags) = eval("MaxClients + 1");
        assert!(value.ty.is_void());
        assert_eq!(diags[0].code, codes::UNDEFINED);
    }

    #[test]
    fn test_predefined_constants() {
        let mut evaluator = Evaluator::new("t.sp");
        evaluator.define("MAXPLAYERS", TypeAndVal::known(ConstValue::Int(65)));
        let value = evaluator.eval_expr(&parse_expr("MAXPLAYERS + 1"));
        assert_eq!(value.value, Some(ConstValue::Int(66)));
        let value = evaluator.eval_expr(&parse_expr("MAXPLAYERS = 2"));
        assert!(value.ty.is_void());
        assert!(evaluator.has_errors());
    }

    #[test]
    fn test_probe_is_silent() {
        let mut evaluator = Evaluator::new("t.sp");
        assert_eq!(evaluator.probe(&parse_expr("1 << 40")), Some(ConstValue::Int(256)));
        assert_eq!(evaluator.probe(&parse_expr("unknown")), None);
        assert!(evaluator.diagnostics().is_empty());
    }

    #[test]
    fn test_hidden_names_are_unknown() {
        let mut evaluator = Evaluator::new("t.sp");
        evaluator.define("N", TypeAndVal::known(ConstValue::Int(9)));
        assert_eq!(evaluator.probe_hiding(&parse_expr("N + 1"), &["N"]), None);
        assert_eq!(evaluator.probe(&parse_expr("N + 1")), Some(ConstValue::Int(10)));
    }

    #[test]
    fn test_oversized_local_array() {
        let (value, diags) = run("{ int cells[2000000]; return 1; }");
        assert!(value.ty.is_void());
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, codes::ARRAY_TOO_LARGE);
    }

    #[test]
    fn test_logical_short_circuit() {
        // The right side would divide by zero if evaluated
        let (value, diags) = eval("false && 1 / 0");
        assert!(diags.is_empty());
        assert_eq!(value.value, Some(ConstValue::Bool(false)));
    }

    #[test]
    fn test_view_as_and_ternary() {
        let (value, _) = eval("view_as<int>(1.0)");
        assert_eq!(value.value, Some(ConstValue::Int(0x3f80_0000)));
        let (value, _) = eval("3 > 2 ? 10 : 20");
        assert_eq!(value.value, Some(ConstValue::Int(10)));
    }

    #[test]
    fn test_loop_with_return() {
        let src = "{ int sum = 0; for (int i = 1; i <= 10; i++) { if (i == 5) continue; sum += i; } return sum; }";
        let (value, diags) = run(src);
        assert!(diags.is_empty(), "{diags:?}");
        assert_eq!(value.value, Some(ConstValue::Int(50)));
    }

    #[test]
    fn test_arrays_and_strings() {
        let src = "{ int v[4] = {1, 2, ...}; char s[] = \"abc\"; v[0] = sizeof s; return v[0] + v[3]; }";
        let (value, diags) = run(src);
        assert!(diags.is_empty(), "{diags:?}");
        assert_eq!(value.value, Some(ConstValue::Int(8)));
    }

    #[test]
    fn test_out_of_bounds_index() {
        let (value, diags) = run("{ int v[2]; return v[2]; }");
        assert!(value.ty.is_void());
        assert_eq!(diags[0].code, codes::RUNTIME);
    }

    #[test]
    fn test_switch_and_while() {
        let src = "{ int n = 0; while (true) { n++; if (n >= 3) break; } switch (n) { case 1, 2: return 0; case 3: return 30; } return -1; }";
        let (value, _) = run(src);
        assert_eq!(value.value, Some(ConstValue::Int(30)));
    }

    #[test]
    fn test_iteration_limit() {
        let (value, diags) = run("{ while (true) {} }");
        assert!(value.ty.is_void());
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, codes::ITERATION_LIMIT);
    }
}
