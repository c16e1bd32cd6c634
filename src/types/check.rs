//! Static type checking of a parsed plugin.
//!
//! [`Checker::check_expr`] computes the type of an expression and writes it
//! into every node's `ty` slot. [`check_plugin`] walks a whole [`Plugin`] in
//! three passes:
//!
//! 1. type names (`enum`, `enum struct`, `struct`, `methodmap`, `typedef`)
//! 2. in source order: enum constants, global variables, member and function
//!    signatures, `static_assert`
//! 3. every function, method and accessor body
//!
//! Global constants are folded as they are declared so later array sizes and
//! static assertions can use them. Names that resolve nowhere are assumed to
//! come from an unseen include: they type as `Any` with a warning.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::diagnostics::{codes, Diagnostic, Reporter, Severity};
use crate::parser::ast::*;
use crate::span::Span;
use crate::types::eval::Evaluator;
use crate::types::ops;
use crate::types::{ConstValue, EvalError, Type, TypeAndVal};

/// Parent links followed before a methodmap chain is considered cyclic.
const MAX_PARENT_DEPTH: usize = 32;

/// A callable's shape as seen by call sites.
#[derive(Debug, Clone, PartialEq)]
pub struct FnSig {
    pub params: Vec<(String, Type)>,
    /// Leading parameters without a default value.
    pub required: usize,
    pub ret: Type,
    /// Trailing `...` parameter, if any.
    pub rest: Option<Type>,
}

impl FnSig {
    fn to_type(&self) -> Type {
        Type::Function {
            params: self.params.iter().map(|(_, ty)| ty.clone()).collect(),
            ret: Box::new(self.ret.clone()),
            variadic: self.rest.is_some(),
        }
    }

    fn from_type(ty: &Type) -> Option<FnSig> {
        match ty.deref() {
            Type::Function { params, ret, variadic } => Some(FnSig {
                params: params.iter().map(|p| (String::new(), p.clone())).collect(),
                required: params.len(),
                ret: (**ret).clone(),
                rest: variadic.then_some(Type::Any),
            }),
            _ => None,
        }
    }
}

/// Members of a user-defined type.
#[derive(Debug, Clone, Default)]
struct TypeInfo {
    parent: Option<String>,
    fields: FxHashMap<String, Type>,
    methods: FxHashMap<String, FnSig>,
}

enum Member {
    Field(Type),
    Method(FnSig),
}

pub struct Checker {
    path: Arc<str>,
    reporter: Reporter,
    globals: FxHashMap<String, Type>,
    /// Function-local scopes, innermost last.
    scopes: Vec<FxHashMap<String, Type>>,
    functions: FxHashMap<String, FnSig>,
    types: FxHashMap<String, TypeInfo>,
    enums: FxHashSet<String>,
    aliases: FxHashMap<String, Type>,
    consts: Evaluator,
    return_ty: Type,
    this_ty: Option<Type>,
}

/// Type-check `plugin` in place and return the diagnostics produced.
pub fn check_plugin(plugin: &mut Plugin, path: impl Into<Arc<str>>) -> Vec<Diagnostic> {
    let mut checker = Checker::new(path);
    checker.check(plugin);
    checker.into_diagnostics()
}

impl Checker {
    pub fn new(path: impl Into<Arc<str>>) -> Self {
        let path = path.into();
        Self {
            consts: Evaluator::new(Arc::clone(&path)),
            path,
            reporter: Reporter::new(),
            globals: FxHashMap::default(),
            scopes: Vec::new(),
            functions: FxHashMap::default(),
            types: FxHashMap::default(),
            enums: FxHashSet::default(),
            aliases: FxHashMap::default(),
            return_ty: Type::Void,
            this_ty: None,
        }
    }

    /// Make a global visible to later checks.
    pub fn declare_global(&mut self, name: impl Into<String>, ty: Type) {
        self.globals.insert(name.into(), ty);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        self.reporter.diagnostics()
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.reporter.into_diagnostics()
    }

    /// The evaluator holding every global and enum constant folded so far,
    /// plus the diagnostics.
    pub fn into_constants(self) -> (Evaluator, Vec<Diagnostic>) {
        (self.consts, self.reporter.into_diagnostics())
    }

    pub fn check(&mut self, plugin: &mut Plugin) {
        for decl in &plugin.decls {
            if let Decl::Type(spec) = decl {
                self.register_type_name(spec);
            }
        }
        for decl in &mut plugin.decls {
            self.check_declaration(decl);
        }
        for decl in &mut plugin.decls {
            self.check_bodies(decl);
        }
        debug!(
            functions = self.functions.len(),
            types = self.types.len(),
            diagnostics = self.reporter.diagnostics().len(),
            "checked plugin"
        );
    }

    // ===== Reporting =====

    fn error(&mut self, err: EvalError) {
        self.reporter.push(err.to_diagnostic(&self.path));
    }

    fn warn(&mut self, code: &'static str, message: String, span: Span) {
        self.reporter.emit(Severity::Warning, code, message, &self.path, span);
    }

    fn unresolved(&mut self, what: &str, span: Span) -> Type {
        self.warn(codes::UNRESOLVED, format!("unresolved symbol '{what}', assuming 'any'"), span);
        Type::Any
    }

    /// Report unless `found` is already the error sentinel.
    fn expect_coercible(&mut self, found: &Type, expected: &Type, span: Span) {
        if !found.is_void() && !found.coercible_to(expected) {
            self.error(EvalError::Mismatch {
                expected: expected.clone(),
                found: found.clone(),
                span,
            });
        }
    }

    // ===== Types =====

    /// Named enums are plain cells; typedefs stand for their function type.
    fn resolve(&self, ty: Type) -> Type {
        match ty {
            Type::Handle(name) if self.enums.contains(&name) => Type::Int,
            Type::Handle(name) => match self.aliases.get(&name) {
                Some(alias) => alias.clone(),
                None => Type::Handle(name),
            },
            Type::Ref(inner) => Type::Ref(Box::new(self.resolve(*inner))),
            Type::Array { elem, len, dynamic } => Type::Array {
                elem: Box::new(self.resolve(*elem)),
                len,
                dynamic,
            },
            other => other,
        }
    }

    fn declared_type(&mut self, ty: &TypeExpr, dims: &mut [Option<Expr>]) -> Type {
        let base = self.resolve(Type::from_type_expr(ty));
        let mut sizes = Vec::with_capacity(dims.len());
        for dim in dims.iter_mut() {
            sizes.push(match dim {
                Some(size) => self.array_size(size),
                None => None,
            });
        }
        let span = dims.iter().flatten().map(|d| d.span).reduce(|a, b| a.to(b));
        if let Some(Err(err)) = span.map(|span| ops::check_cells(&sizes, span)) {
            self.error(err);
            sizes.iter_mut().for_each(|size| *size = None);
        }
        base.with_dims(&sizes)
    }

    fn array_size(&mut self, size: &mut Expr) -> Option<usize> {
        self.check_expr(size);
        match self.fold(size).and_then(|v| v.as_int()) {
            Some(n) if n >= 0 => Some(n as usize),
            _ => {
                self.error(EvalError::NotConstant {
                    what: "array size",
                    span: size.span,
                });
                None
            }
        }
    }

    fn func_type(&mut self, func: &mut FuncType) -> Type {
        self.signature(&func.ret, &mut func.params).to_type()
    }

    fn signature(&mut self, ret: &TypeExpr, params: &mut [Param]) -> FnSig {
        let mut sig = FnSig {
            params: Vec::with_capacity(params.len()),
            required: 0,
            ret: self.resolve(Type::from_type_expr(ret)),
            rest: None,
        };
        for param in params.iter_mut() {
            let ty = self.declared_type(&param.ty, &mut param.dims);
            if param.variadic {
                sig.rest = Some(ty);
                continue;
            }
            match &mut param.default {
                Some(default) => {
                    let default_ty = self.check_expr(default);
                    if !ops::init_compatible(&ty, &default_ty) && !default_ty.is_void() {
                        self.error(EvalError::Mismatch {
                            expected: ty.clone(),
                            found: default_ty,
                            span: default.span,
                        });
                    }
                }
                None => sig.required = sig.params.len() + 1,
            }
            sig.params.push((param.name.clone(), ty));
        }
        sig
    }

    fn find_member(&self, type_name: &str, member: &str) -> Option<Member> {
        let mut current = type_name;
        for _ in 0..MAX_PARENT_DEPTH {
            let info = self.types.get(current)?;
            if let Some(ty) = info.fields.get(member) {
                return Some(Member::Field(ty.clone()));
            }
            if let Some(sig) = info.methods.get(member) {
                return Some(Member::Method(sig.clone()));
            }
            current = info.parent.as_deref()?;
        }
        None
    }

    /// Whether `type_name`'s chain ends in a type this plugin defines
    /// completely (as opposed to one from an unseen include).
    fn fully_known(&self, type_name: &str) -> bool {
        let mut current = type_name;
        for _ in 0..MAX_PARENT_DEPTH {
            match self.types.get(current) {
                Some(TypeInfo { parent: Some(parent), .. }) => current = parent,
                Some(_) => return true,
                None => return false,
            }
        }
        false
    }

    // ===== Pass 1: type names =====

    fn register_type_name(&mut self, spec: &Spec) {
        match spec {
            Spec::Enum { name: Some(name), .. } => {
                self.enums.insert(name.clone());
            }
            Spec::EnumStruct { name, .. } | Spec::Struct { name, .. } => {
                self.types.entry(name.clone()).or_default();
            }
            Spec::MethodMap { name, parent, .. } => {
                let info = self.types.entry(name.clone()).or_default();
                info.parent = parent.clone();
            }
            _ => {}
        }
    }

    // ===== Pass 2: declarations in source order =====

    fn check_declaration(&mut self, decl: &mut Decl) {
        match decl {
            Decl::Bad { .. } => {}
            Decl::Var(var) => self.declare_globals(var),
            Decl::Func(func) => {
                let sig = self.signature(&func.ret, &mut func.params);
                self.functions.insert(func.name.clone(), sig);
            }
            Decl::Type(spec) => self.declare_spec(spec),
            Decl::StaticAssert { cond, message, span } => self.static_assert(cond, message.as_deref(), *span),
        }
    }

    fn declare_globals(&mut self, var: &mut VarDecl) {
        let is_const = var.is_const();
        for declarator in &mut var.declarators {
            let ty = self.declare_variable(declarator);
            let value = match (&declarator.init, is_const) {
                (Some(init), true) => self
                    .fold(init)
                    .map(|v| ops::convert_value(v, &ty, ends_with_ellipsis(init))),
                _ => None,
            };
            self.consts.define(declarator.name.clone(), TypeAndVal::new(ty.clone(), value));
            self.globals.insert(declarator.name.clone(), ty);
        }
    }

    /// Type of one declared name, checking its initialiser.
    fn declare_variable(&mut self, declarator: &mut Declarator) -> Type {
        let declared = self.declared_type(&declarator.ty, &mut declarator.dims);
        let Some(init) = &mut declarator.init else {
            return declared;
        };
        let init_ty = self.check_expr(init);
        if init_ty.is_void() {
            return declared;
        }
        if !ops::init_compatible(&declared, &init_ty) {
            self.error(EvalError::Mismatch {
                expected: declared.clone(),
                found: init_ty,
                span: init.span,
            });
            return declared;
        }
        ops::adopt_length(declared, &init_ty)
    }

    fn declare_spec(&mut self, spec: &mut Spec) {
        match spec {
            Spec::Enum { name, items, .. } => {
                let ty = name.as_ref().map_or(Type::Int, |n| self.resolve(Type::Handle(n.clone())));
                let mut next = 0i32;
                for item in items {
                    if let Some(value) = &mut item.value {
                        self.check_expr(value);
                        match self.fold(value).and_then(|v| v.as_int()) {
                            Some(v) => next = v,
                            None => self.error(EvalError::NotConstant {
                                what: "enum value",
                                span: value.span,
                            }),
                        }
                    }
                    self.consts
                        .define(item.name.clone(), TypeAndVal::new(ty.clone(), Some(ConstValue::Int(next))));
                    self.globals.insert(item.name.clone(), ty.clone());
                    next = next.wrapping_add(1);
                }
            }
            Spec::EnumStruct { name, fields, methods, .. } => {
                let mut info = TypeInfo::default();
                for field in fields.iter_mut() {
                    let ty = self.declared_type(&field.ty, &mut field.dims);
                    info.fields.insert(field.name.clone(), ty);
                }
                for method in methods.iter_mut() {
                    let sig = self.signature(&method.ret, &mut method.params);
                    info.methods.insert(method.name.clone(), sig);
                }
                self.types.insert(name.clone(), info);
            }
            Spec::Struct { name, fields, .. } => {
                let mut info = TypeInfo::default();
                for field in fields.iter_mut() {
                    let ty = self.declared_type(&field.ty, &mut field.dims);
                    info.fields.insert(field.name.clone(), ty);
                }
                self.types.insert(name.clone(), info);
            }
            Spec::MethodMap {
                name, parent, members, ..
            } => {
                let mut info = TypeInfo {
                    parent: parent.clone(),
                    ..TypeInfo::default()
                };
                for member in members.iter_mut() {
                    match member {
                        MethodMapMember::Constructor(ctor) => {
                            let mut sig = self.signature(&ctor.ret, &mut ctor.params);
                            sig.ret = Type::Handle(name.clone());
                            info.methods.insert(name.clone(), sig);
                        }
                        MethodMapMember::Method(method) => {
                            let sig = self.signature(&method.ret, &mut method.params);
                            info.methods.insert(method.name.clone(), sig);
                        }
                        MethodMapMember::Property { ty, name: prop, .. } => {
                            let ty = self.resolve(Type::from_type_expr(ty));
                            info.fields.insert(prop.clone(), ty);
                        }
                    }
                }
                self.types.insert(name.clone(), info);
            }
            Spec::Typedef { name, func, .. } => {
                let ty = self.func_type(func);
                self.aliases.insert(name.clone(), ty);
            }
            Spec::Typeset { members, .. } => {
                for member in members {
                    self.func_type(member);
                }
            }
            Spec::Using { .. } | Spec::Bad { .. } => {}
        }
    }

    fn static_assert(&mut self, cond: &mut Expr, message: Option<&str>, span: Span) {
        self.check_expr(cond);
        match self.fold(cond).and_then(|v| v.truthy()) {
            Some(true) => {}
            Some(false) => self.error(EvalError::StaticAssert {
                message: message.unwrap_or("static assertion failed").to_string(),
                span,
            }),
            None => self.error(EvalError::NotConstant {
                what: "static_assert condition",
                span: cond.span,
            }),
        }
    }

    // ===== Pass 3: bodies =====

    fn check_bodies(&mut self, decl: &mut Decl) {
        match decl {
            Decl::Func(func) => {
                if let Some(sig) = self.functions.get(&func.name).cloned() {
                    self.check_function(&sig, func, None);
                }
            }
            Decl::Type(Spec::EnumStruct { name, methods, .. }) => {
                let this = Type::Handle(name.clone());
                for method in methods {
                    if let Some(Member::Method(sig)) = self.find_member(name, &method.name) {
                        self.check_function(&sig, method, Some(this.clone()));
                    }
                }
            }
            Decl::Type(Spec::MethodMap { name, members, .. }) => {
                let name = name.as_str();
                let this = Type::Handle(name.to_string());
                for member in members {
                    match member {
                        MethodMapMember::Constructor(ctor) => {
                            if let Some(Member::Method(sig)) = self.find_member(name, name) {
                                self.check_function(&sig, ctor, None);
                            }
                        }
                        MethodMapMember::Method(method) => {
                            if let Some(Member::Method(sig)) = self.find_member(name, &method.name) {
                                let is_static = method.storage.contains(&Storage::Static);
                                self.check_function(&sig, method, (!is_static).then(|| this.clone()));
                            }
                        }
                        MethodMapMember::Property { ty, getter, setter, .. } => {
                            let prop_ty = self.resolve(Type::from_type_expr(ty));
                            if let Some(getter) = getter {
                                self.check_accessor(getter, prop_ty.clone(), &this);
                            }
                            if let Some(setter) = setter {
                                self.check_accessor(setter, Type::Void, &this);
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn check_function(&mut self, sig: &FnSig, func: &mut FuncDecl, this: Option<Type>) {
        let Some(body) = &mut func.body else {
            return;
        };
        let mut scope: FxHashMap<String, Type> = sig.params.iter().cloned().collect();
        if let (Some(rest), Some(param)) = (&sig.rest, func.params.iter().find(|p| p.variadic)) {
            if !param.name.is_empty() {
                scope.insert(param.name.clone(), Type::dynamic_array(rest.clone()));
            }
        }
        self.check_body(scope, sig.ret.clone(), this, body);
    }

    fn check_accessor(&mut self, accessor: &mut Accessor, ret: Type, this: &Type) {
        let mut scope = FxHashMap::default();
        for param in accessor.params.iter_mut() {
            let ty = self.declared_type(&param.ty, &mut param.dims);
            scope.insert(param.name.clone(), ty);
        }
        if let Some(body) = &mut accessor.body {
            self.check_body(scope, ret, Some(this.clone()), body);
        }
    }

    fn check_body(&mut self, params: FxHashMap<String, Type>, ret: Type, this: Option<Type>, body: &mut [Stmt]) {
        self.scopes = vec![params];
        self.return_ty = ret;
        self.this_ty = this;
        for stmt in body {
            self.check_stmt(stmt);
        }
        self.scopes.clear();
        self.this_ty = None;
    }

    // ===== Statements =====

    fn check_scoped(&mut self, stmt: &mut Stmt) {
        self.scopes.push(FxHashMap::default());
        self.check_stmt(stmt);
        self.scopes.pop();
    }

    fn check_condition(&mut self, cond: &mut Expr) {
        let ty = self.check_expr(cond);
        if ty.is_array() {
            self.error(EvalError::NotArithmetic {
                op: "condition",
                ty,
                span: cond.span,
            });
        }
    }

    pub fn check_stmt(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::Bad { .. } | Stmt::Break { .. } | Stmt::Continue { .. } => {}
            Stmt::Block { stmts, .. } => {
                self.scopes.push(FxHashMap::default());
                for stmt in stmts {
                    self.check_stmt(stmt);
                }
                self.scopes.pop();
            }
            Stmt::Expr { expr, .. } => {
                self.check_expr(expr);
            }
            Stmt::Decl(var) => {
                for declarator in &mut var.declarators {
                    let ty = self.declare_variable(declarator);
                    if let Some(scope) = self.scopes.last_mut() {
                        scope.insert(declarator.name.clone(), ty);
                    }
                }
            }
            Stmt::If { cond, then, otherwise, .. } => {
                self.check_condition(cond);
                self.check_scoped(then);
                if let Some(otherwise) = otherwise {
                    self.check_scoped(otherwise);
                }
            }
            Stmt::While { cond, body, .. } | Stmt::DoWhile { body, cond, .. } => {
                self.check_condition(cond);
                self.check_scoped(body);
            }
            Stmt::For {
                init, cond, step, body, ..
            } => {
                self.scopes.push(FxHashMap::default());
                if let Some(init) = init {
                    self.check_stmt(init);
                }
                if let Some(cond) = cond {
                    self.check_condition(cond);
                }
                if let Some(step) = step {
                    self.check_expr(step);
                }
                self.check_scoped(body);
                self.scopes.pop();
            }
            Stmt::Switch {
                subject, cases, default, ..
            } => {
                let subject_ty = self.check_expr(subject);
                for case in cases {
                    for value in &mut case.values {
                        let ty = self.check_expr(value);
                        if !subject_ty.is_void() {
                            self.expect_coercible(&ty, &subject_ty, value.span);
                        }
                    }
                    self.check_scoped(&mut case.body);
                }
                if let Some(default) = default {
                    self.check_scoped(default);
                }
            }
            Stmt::Return { value, span } => {
                let ret = self.return_ty.clone();
                if let Some(value) = value {
                    let ty = self.check_expr(value);
                    if ret.is_void() && !ty.is_void() {
                        self.error(EvalError::Mismatch {
                            expected: Type::Void,
                            found: ty,
                            span: *span,
                        });
                    } else if !ret.is_void() {
                        self.expect_coercible(&ty, &ret, value.span);
                    }
                }
            }
            Stmt::Assert { cond, .. } => self.check_condition(cond),
            Stmt::Delete { target, .. } => {
                let ty = self.check_expr(target);
                if !matches!(ty.deref(), Type::Handle(_) | Type::Any | Type::Int | Type::Void) {
                    self.error(EvalError::Mismatch {
                        expected: Type::Handle("Handle".into()),
                        found: ty,
                        span: target.span,
                    });
                }
            }
            Stmt::StaticAssert { cond, message, span } => {
                let message = message.clone();
                self.static_assert(cond, message.as_deref(), *span);
            }
        }
    }

    // ===== Expressions =====

    /// Constant value of `expr` as seen from the current scope. Locals
    /// shadowing a global constant are not constants.
    fn fold(&mut self, expr: &Expr) -> Option<ConstValue> {
        let shadowed: Vec<String> = self
            .scopes
            .iter()
            .flat_map(|scope| scope.keys())
            .filter(|name| self.consts.is_defined(name))
            .cloned()
            .collect();
        let hidden: Vec<&str> = shadowed.iter().map(String::as_str).collect();
        self.consts.probe_hiding(expr, &hidden)
    }

    fn lookup(&self, name: &str) -> Option<Type> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .or_else(|| self.globals.get(name))
            .cloned()
            .or_else(|| self.functions.get(name).map(FnSig::to_type))
    }

    /// Type of `expr`, also stored in its `ty` slot and in every sub-node's.
    /// Errors are reported and type as `Void`.
    pub fn check_expr(&mut self, expr: &mut Expr) -> Type {
        let ty = match self.expr_type(expr) {
            Ok(ty) => ty,
            Err(err) => {
                self.error(err);
                Type::Void
            }
        };
        expr.ty = Some(ty.clone());
        ty
    }

    fn expr_type(&mut self, expr: &mut Expr) -> Result<Type, EvalError> {
        let span = expr.span;
        match &mut expr.kind {
            ExprKind::Bad => Ok(Type::Void),
            ExprKind::Null => Ok(Type::Handle("null".into())),
            ExprKind::Ellipsis => Ok(Type::Any),
            ExprKind::Lit { kind, raw } => Ok(ops::literal_type(*kind, raw)),
            ExprKind::This => self.this_ty.clone().ok_or(EvalError::Undefined {
                name: "this".to_string(),
                span,
            }),
            ExprKind::Name(name) => {
                if let Some(ty) = self.lookup(name) {
                    Ok(ty)
                } else if self.types.contains_key(name.as_str()) {
                    Ok(Type::Handle(name.clone()))
                } else {
                    let name = name.clone();
                    Ok(self.unresolved(&name, span))
                }
            }
            ExprKind::Unary { op, operand } => {
                let ty = self.check_expr(operand);
                if ty.is_void() {
                    return Ok(Type::Void);
                }
                if op.is_increment() {
                    self.expect_assignable(operand)?;
                }
                ops::unary_type(*op, &ty, span)
            }
            ExprKind::Binary { op, left, right } => {
                let op = *op;
                let left_ty = self.check_expr(left);
                let right_ty = self.check_expr(right);
                if left_ty.is_void() || right_ty.is_void() {
                    return Ok(Type::Void);
                }
                if op.is_assignment() {
                    self.expect_assignable(left)?;
                    return self.assignment_type(op, &left_ty, &right_ty, left, span);
                }
                if op.is_shift() {
                    self.check_shift(op, right, span);
                }
                ops::binary_type(op, &left_ty, &right_ty, span)
            }
            ExprKind::Chain { first, links } => {
                let mut prev = self.check_expr(first);
                for (op, operand) in links {
                    let next = self.check_expr(operand);
                    if !prev.is_void() && !next.is_void() {
                        ops::binary_type(*op, &prev, &next, operand.span)?;
                    }
                    prev = next;
                }
                Ok(Type::Bool)
            }
            ExprKind::Call { callee, args } => self.call_type(callee, args, span),
            ExprKind::NamedArg { value, .. } => Ok(self.check_expr(value)),
            ExprKind::Index { base, index } => {
                let base_ty = self.check_expr(base);
                let index_ty = self.check_expr(index);
                if base_ty.is_void() || index_ty.is_void() {
                    return Ok(Type::Void);
                }
                if matches!(base_ty.deref(), Type::Any) {
                    return Ok(Type::Any);
                }
                let Some(elem) = base_ty.element().cloned() else {
                    return Err(EvalError::NotIndexable { ty: base_ty, span });
                };
                if !index_ty.is_arithmetic() {
                    return Err(EvalError::NotArithmetic {
                        op: "[]",
                        ty: index_ty,
                        span: index.span,
                    });
                }
                if let Some(i) = self.fold(index).and_then(|v| v.as_int()) {
                    let len = match base_ty.deref() {
                        Type::Array { len, dynamic: false, .. } => Some(*len),
                        _ => None,
                    };
                    if i < 0 || len.is_some_and(|len| i as usize >= len) {
                        self.error(EvalError::OutOfBounds {
                            index: i64::from(i),
                            len: len.unwrap_or(0),
                            span,
                        });
                    }
                }
                Ok(elem)
            }
            ExprKind::Field { base, name } => {
                let base_ty = self.check_expr(base);
                let name = name.clone();
                self.member_type(&base_ty, &name, span)
            }
            ExprKind::Scope { base, name } => {
                let base_ty = self.check_expr(base);
                let name = name.clone();
                self.member_type(&base_ty, &name, span)
            }
            ExprKind::Ternary { cond, then, otherwise } => {
                self.check_condition(cond);
                let then_ty = self.check_expr(then);
                let else_ty = self.check_expr(otherwise);
                if then_ty.is_void() || else_ty.is_void() {
                    return Ok(Type::Void);
                }
                if then_ty.deref() == else_ty.deref() {
                    Ok(then_ty.deref().clone())
                } else if then_ty.is_arithmetic() && else_ty.is_arithmetic() {
                    Ok(then_ty.promote(&else_ty))
                } else if else_ty.coercible_to(&then_ty) {
                    Ok(then_ty.deref().clone())
                } else {
                    Err(EvalError::Mismatch {
                        expected: then_ty,
                        found: else_ty,
                        span: otherwise.span,
                    })
                }
            }
            ExprKind::ViewAs { ty, value } => {
                let target = self.resolve(Type::from_type_expr(ty));
                let value_ty = self.check_expr(value);
                if !value_ty.is_void() && !value_ty.coercible_to(&target) {
                    return Err(EvalError::Mismatch {
                        expected: target,
                        found: value_ty,
                        span,
                    });
                }
                Ok(target)
            }
            ExprKind::FuncLit(func) => Ok(self.func_type(func)),
            ExprKind::Brace(items) => {
                let mut elem = None;
                let mut count = 0;
                for item in items.iter_mut() {
                    let ty = self.check_expr(item);
                    if matches!(item.kind, ExprKind::Ellipsis) {
                        continue;
                    }
                    count += 1;
                    match &elem {
                        None => elem = Some(ty),
                        Some(first) => self.expect_coercible(&ty, first, item.span),
                    }
                }
                Ok(Type::array(elem.unwrap_or(Type::Any), count))
            }
            ExprKind::Comma(items) => {
                let mut last = Type::Void;
                for item in items.iter_mut() {
                    last = self.check_expr(item);
                }
                Ok(last)
            }
            ExprKind::Sizeof { operand, .. } => {
                self.check_expr(operand);
                Ok(Type::Int)
            }
            ExprKind::New { class, args } => {
                let class = class.clone();
                match self.find_member(&class, &class) {
                    Some(Member::Method(sig)) => {
                        self.check_args(&class, &sig, args, span);
                        Ok(Type::Handle(class))
                    }
                    _ => {
                        for arg in args.iter_mut() {
                            self.check_expr(arg);
                        }
                        if self.fully_known(&class) {
                            Err(EvalError::Undefined {
                                name: format!("{class}.{class}"),
                                span,
                            })
                        } else {
                            self.unresolved(&class, span);
                            Ok(Type::Handle(class))
                        }
                    }
                }
            }
            ExprKind::NewArray { elem, dims } => {
                let mut ty = self.resolve(Type::from_type_expr(elem));
                for dim in dims.iter_mut() {
                    let dim_ty = self.check_expr(dim);
                    if !dim_ty.is_void() && !dim_ty.is_arithmetic() {
                        self.error(EvalError::NotArithmetic {
                            op: "new[]",
                            ty: dim_ty,
                            span: dim.span,
                        });
                    }
                    ty = Type::dynamic_array(ty);
                }
                Ok(ty)
            }
        }
    }

    fn expect_assignable(&mut self, target: &Expr) -> Result<(), EvalError> {
        match &target.kind {
            ExprKind::Name(name) => {
                if self.types.contains_key(name.as_str()) && self.lookup(name).is_none() {
                    return Err(EvalError::NotAssignable { span: target.span });
                }
                Ok(())
            }
            ExprKind::Index { .. } | ExprKind::Field { .. } => Ok(()),
            _ => Err(EvalError::NotAssignable { span: target.span }),
        }
    }

    fn assignment_type(
        &mut self,
        op: BinOp,
        left_ty: &Type,
        right_ty: &Type,
        left: &Expr,
        span: Span,
    ) -> Result<Type, EvalError> {
        let stored = match op.compound_base() {
            Some(base) => ops::binary_type(base, left_ty, right_ty, span)?,
            None => right_ty.clone(),
        };
        if !stored.coercible_to(left_ty) {
            return Err(EvalError::Mismatch {
                expected: left_ty.clone(),
                found: stored,
                span: left.span.to(span),
            });
        }
        Ok(left_ty.deref().clone())
    }

    fn check_shift(&mut self, op: BinOp, amount: &Expr, span: Span) {
        let Some(amount) = self.fold(amount).and_then(|v| v.as_int()) else {
            return;
        };
        if let Some(warning) = ops::shift_warning(amount) {
            self.warn(codes::SHIFT, warning.message(op, amount), span);
        }
    }

    fn member_type(&mut self, base_ty: &Type, name: &str, span: Span) -> Result<Type, EvalError> {
        let type_name = match base_ty.deref() {
            Type::Void => return Ok(Type::Void),
            Type::Any => return Ok(Type::Any),
            Type::Handle(type_name) => type_name.clone(),
            other => {
                return Err(EvalError::NotIndexable {
                    ty: other.clone(),
                    span,
                })
            }
        };
        match self.find_member(&type_name, name) {
            Some(Member::Field(ty)) => Ok(ty),
            Some(Member::Method(sig)) => Ok(sig.to_type()),
            None if self.fully_known(&type_name) => Err(EvalError::Undefined {
                name: format!("{type_name}.{name}"),
                span,
            }),
            None => Ok(self.unresolved(&format!("{type_name}.{name}"), span)),
        }
    }

    fn call_type(&mut self, callee: &mut Expr, args: &mut [Expr], span: Span) -> Result<Type, EvalError> {
        let callee_ty = self.check_expr(callee);

        let named = match &callee.kind {
            ExprKind::Name(name) => self.functions.get(name).cloned().map(|sig| (name.clone(), sig)),
            ExprKind::Field { base, name } | ExprKind::Scope { base, name } => match base.ty.as_ref().map(Type::deref) {
                Some(Type::Handle(type_name)) => match self.find_member(type_name, name) {
                    Some(Member::Method(sig)) => Some((format!("{type_name}.{name}"), sig)),
                    _ => None,
                },
                _ => None,
            },
            _ => None,
        };
        let sig = named.or_else(|| FnSig::from_type(&callee_ty).map(|sig| ("function".to_string(), sig)));

        match sig {
            Some((label, sig)) => {
                self.check_args(&label, &sig, args, span);
                Ok(sig.ret)
            }
            None => {
                for arg in args.iter_mut() {
                    self.check_expr(arg);
                }
                match callee_ty.deref() {
                    Type::Void => Ok(Type::Void),
                    Type::Any => Ok(Type::Any),
                    // Legacy tag-style construction: `Handle(x)`
                    Type::Handle(_) => Ok(callee_ty.deref().clone()),
                    other => Err(EvalError::Mismatch {
                        expected: Type::Function {
                            params: Vec::new(),
                            ret: Box::new(Type::Any),
                            variadic: true,
                        },
                        found: other.clone(),
                        span: callee.span,
                    }),
                }
            }
        }
    }

    fn check_args(&mut self, label: &str, sig: &FnSig, args: &mut [Expr], span: Span) {
        let mut positional = 0;
        let mut named = 0;
        for arg in args.iter_mut() {
            let ty = self.check_expr(arg);
            match &arg.kind {
                ExprKind::NamedArg { name, .. } => {
                    named += 1;
                    match sig.params.iter().find(|(param, _)| param == name) {
                        Some((_, expected)) => self.expect_coercible(&ty, expected, arg.span),
                        None => self.error(EvalError::Undefined {
                            name: format!("{label}.{name}"),
                            span: arg.span,
                        }),
                    }
                }
                _ => {
                    match sig.params.get(positional) {
                        Some((_, expected)) => self.expect_coercible(&ty, expected, arg.span),
                        None => {
                            if let Some(rest) = &sig.rest {
                                self.expect_coercible(&ty, rest, arg.span);
                            }
                        }
                    }
                    positional += 1;
                }
            }
        }

        let too_few = positional + named < sig.required;
        let too_many = sig.rest.is_none() && positional > sig.params.len();
        if too_few || too_many {
            self.error(EvalError::ArgCount {
                name: label.to_string(),
                expected: if too_few { sig.required } else { sig.params.len() },
                found: args.len(),
                span,
            });
        }
    }
}

fn ends_with_ellipsis(init: &Expr) -> bool {
    match &init.kind {
        ExprKind::Brace(items) => matches!(items.last().map(|e| &e.kind), Some(ExprKind::Ellipsis)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::Parser;

    fn check(src: &str) -> (Plugin, Vec<Diagnostic>) {
        let mut parser = Parser::new(tokenize(src, "t.sp").unwrap(), 5);
        let mut plugin = parser.parse_plugin();
        assert_eq!(parser.error_count(), 0, "syntax errors in test source");
        let diags = check_plugin(&mut plugin, "t.sp");
        (plugin, diags)
    }

    fn codes_of(diags: &[Diagnostic]) -> Vec<&'static str> {
        diags.iter().map(|d| d.code).collect()
    }

    fn first_body(plugin: &Plugin) -> &[Stmt] {
        plugin.functions().find_map(|f| f.body.as_deref()).unwrap()
    }

    #[test]
    fn test_clean_plugin() {
        let src = "
            int g_Count = 0;
            float Scale(float v, float by = 2.0) { return v * by; }
            public void OnPluginStart() {
                int total = g_Count + 1;
                float scaled = Scale(1.5);
                char name[32] = \"abc\";
                total += name[0];
                scaled = Scale(scaled, .by = 3.0);
            }";
        let (_, diags) = check(src);
        assert!(diags.is_empty(), "{diags:?}");
    }

    #[test]
    fn test_every_node_is_typed() {
        let (plugin, _) = check("void f() { int x = 1 + 2 * 3; }");
        let Stmt::Decl(var) = &first_body(&plugin)[0] else {
            panic!("expected declaration");
        };
        let init = var.declarators[0].init.as_ref().unwrap();
        assert_eq!(init.ty, Some(Type::Int));
        let ExprKind::Binary { left, right, .. } = &init.kind else {
            panic!("expected binary");
        };
        assert_eq!(left.ty, Some(Type::Int));
        let ExprKind::Binary { left, right, .. } = &right.kind else {
            panic!("expected binary");
        };
        assert!(left.ty.is_some() && right.ty.is_some());
    }

    #[test]
    fn test_unresolved_native_warns() {
        let (plugin, diags) = check("void f() { PrintToServer(\"hi %d\", 1); }");
        assert_eq!(codes_of(&diags), vec![codes::UNRESOLVED]);
        let Stmt::Expr { expr, .. } = &first_body(&plugin)[0] else {
            panic!("expected expression statement");
        };
        assert_eq!(expr.ty, Some(Type::Any));
    }

    #[test]
    fn test_type_mismatches() {
        let (_, diags) = check("void f() { int x = \"abc\"; float y = view_as<float>(\"no\"); }");
        assert_eq!(codes_of(&diags), vec![codes::TYPE_MISMATCH, codes::TYPE_MISMATCH]);

        let (_, diags) = check("void f() { return 1; }");
        assert_eq!(codes_of(&diags), vec![codes::TYPE_MISMATCH]);
    }

    #[test]
    fn test_argument_counts() {
        let src = "
            void g(int a, int b = 2) {}
            void f() { g(); g(1); g(1, 2, 3); }";
        let (_, diags) = check(src);
        assert_eq!(codes_of(&diags), vec![codes::TYPE_MISMATCH, codes::TYPE_MISMATCH]);
        assert!(diags[0].message.contains("'g' expects 1"));
    }

    #[test]
    fn test_indexing() {
        let (_, diags) = check("void f() { int a[3]; int x; a[5] = 1; a[1] = x[0]; }");
        assert_eq!(codes_of(&diags), vec![codes::RUNTIME, codes::NOT_INDEXABLE]);
    }

    #[test]
    fn test_shift_warning_needs_constant_amount() {
        let (_, diags) = check("void f(int n) { int x = 1 << 40; x = x >> n; }");
        assert_eq!(codes_of(&diags), vec![codes::SHIFT]);
    }

    #[test]
    fn test_local_shadows_global_constant() {
        let src = "
            const int N = 9;
            const int S = 40;
            int arr[4];
            void f() {
                int N = 1;
                int S = 1;
                arr[N] = 0;
                int x = 1 << S;
                arr[S + 2] = x;
            }";
        let (_, diags) = check(src);
        assert!(diags.is_empty(), "{diags:?}");
    }

    #[test]
    fn test_global_constant_still_folds_in_bodies() {
        let (_, diags) = check("const int N = 9; int arr[4]; void f(int S) { arr[N] = 1 << S; }");
        assert_eq!(codes_of(&diags), vec![codes::RUNTIME]);
    }

    #[test]
    fn test_oversized_arrays_are_rejected() {
        let (_, diags) = check("const int big[400000000] = {1};");
        assert_eq!(codes_of(&diags), vec![codes::ARRAY_TOO_LARGE]);

        let (_, diags) = check("int grid[65536][65536]; int row[1024][1024];");
        assert_eq!(codes_of(&diags), vec![codes::ARRAY_TOO_LARGE]);
    }

    #[test]
    fn test_static_assert_with_constants() {
        let src = "
            enum { Slot_A, Slot_B, Slot_Count }
            const int MAX = 4;
            static_assert(Slot_Count == 2);
            static_assert(MAX < Slot_Count, \"too many slots\");
            int g_Slots[MAX * 2];
            static_assert(sizeof g_Slots == 8);";
        let (_, diags) = check(src);
        assert_eq!(codes_of(&diags), vec![codes::STATIC_ASSERT]);
        assert_eq!(diags[0].message, "too many slots");
    }

    #[test]
    fn test_enum_struct_members() {
        let src = "
            enum struct Player {
                int id;
                float pos[3];
                float X() { return this.pos[0]; }
            }
            void f() {
                Player p;
                p.id = 3;
                float x = p.X();
                p.missing = 1;
            }";
        let (_, diags) = check(src);
        assert_eq!(codes_of(&diags), vec![codes::UNDEFINED]);
        assert!(diags[0].message.contains("Player.missing"));
    }

    #[test]
    fn test_methodmap_chain() {
        let src = "
            methodmap Base { public native int Id(); }
            methodmap Stack < Base {
                public native Stack(int size);
                public native void Push(any value);
                property int Length {
                    public get() { return this.Id(); }
                }
            }
            void f() {
                Stack s = new Stack(4);
                s.Push(s.Length);
                int id = s.Id();
                s.Push();
            }";
        let (_, diags) = check(src);
        assert_eq!(codes_of(&diags), vec![codes::TYPE_MISMATCH]);
        assert!(diags[0].message.contains("Stack.Push"));
    }

    #[test]
    fn test_external_methodmap_parent() {
        let src = "
            methodmap Timer < Handle {}
            void f(Timer t) { t.Close(); }";
        let (_, diags) = check(src);
        assert_eq!(codes_of(&diags), vec![codes::UNRESOLVED]);
    }

    #[test]
    fn test_named_enum_is_int() {
        let src = "
            enum Team { Team_None, Team_Red = 2, Team_Blue }
            void f() { Team t = Team_Blue; int n = t + 1; static_assert(Team_Blue == 3); }";
        let (_, diags) = check(src);
        assert!(diags.is_empty(), "{diags:?}");
    }

    #[test]
    fn test_standalone_expression() {
        let mut checker = Checker::new("t.sp");
        checker.declare_global("count", Type::Int);
        let mut expr = Parser::new(tokenize("count < 2 < 3.0", "t.sp").unwrap(), 5)
            .parse_single_expression()
            .unwrap();
        assert_eq!(checker.check_expr(&mut expr), Type::Bool);
        assert!(checker.diagnostics().is_empty());
    }
}
