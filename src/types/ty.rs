//! The unified type representation and constant values.

use std::fmt;

use crate::parser::ast::TypeExpr;

/// Every type the checker and evaluator reason about.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Void,
    /// A named handle-like type: methodmaps, enum structs, enums with a
    /// name, typedefs. Compatible with other handles and `any`.
    Handle(String),
    Bool,
    Int,
    Char,
    Float,
    Any,
    Ref(Box<Type>),
    Array {
        elem: Box<Type>,
        len: usize,
        /// Size unknown at compile time (`int[] x`, `new int[n]`).
        dynamic: bool,
    },
    Function {
        params: Vec<Type>,
        ret: Box<Type>,
        variadic: bool,
    },
}

impl Type {
    /// Type named by a type keyword or tag in source.
    pub fn from_name(name: &str) -> Type {
        match name {
            "int" | "_" => Type::Int,
            "float" | "Float" => Type::Float,
            "char" | "String" => Type::Char,
            "bool" => Type::Bool,
            "void" => Type::Void,
            "any" => Type::Any,
            other => Type::Handle(other.to_string()),
        }
    }

    /// Type written in source, including `[]` pairs and `&`.
    pub fn from_type_expr(expr: &TypeExpr) -> Type {
        let mut ty = Type::from_name(&expr.name);
        for _ in 0..expr.dims {
            ty = Type::dynamic_array(ty);
        }
        if expr.is_ref {
            ty = Type::Ref(Box::new(ty));
        }
        ty
    }

    /// Wraps `self` in the dimensions written after a declared name,
    /// outermost first. `None` is an unsized `[]`.
    pub fn with_dims(self, dims: &[Option<usize>]) -> Type {
        dims.iter().rev().fold(self, |ty, dim| match dim {
            Some(len) => Type::array(ty, *len),
            None => Type::dynamic_array(ty),
        })
    }

    pub fn array(elem: Type, len: usize) -> Type {
        Type::Array {
            elem: Box::new(elem),
            len,
            dynamic: false,
        }
    }

    pub fn dynamic_array(elem: Type) -> Type {
        Type::Array {
            elem: Box::new(elem),
            len: 0,
            dynamic: true,
        }
    }

    /// Strips any number of `Ref` layers.
    pub fn deref(&self) -> &Type {
        match self {
            Type::Ref(inner) => inner.deref(),
            other => other,
        }
    }

    /// Kinds usable as operands of arithmetic.
    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self.deref(),
            Type::Bool | Type::Int | Type::Char | Type::Float | Type::Any
        )
    }

    pub fn is_array(&self) -> bool {
        matches!(self.deref(), Type::Array { .. })
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    /// Element type of an array, if this is one.
    pub fn element(&self) -> Option<&Type> {
        match self.deref() {
            Type::Array { elem, .. } => Some(elem),
            _ => None,
        }
    }

    /// Result kind of an arithmetic operation on `self` and `other`: `Float`
    /// wins, everything else behaves as `Int`.
    pub fn promote(&self, other: &Type) -> Type {
        if matches!(self.deref(), Type::Float) || matches!(other.deref(), Type::Float) {
            Type::Float
        } else {
            Type::Int
        }
    }

    /// Whether a value of type `self` may be stored into `target`.
    pub fn coercible_to(&self, target: &Type) -> bool {
        let (from, to) = (self.deref(), target.deref());
        if from == to {
            return true;
        }
        match (from, to) {
            (_, Type::Any) | (Type::Any, _) => !from.is_void() && !to.is_void(),
            (Type::Handle(_), Type::Handle(_)) => true,
            // Handles are cells: old-style code moves them through ints
            (Type::Handle(_), Type::Int) | (Type::Int, Type::Handle(_)) => true,
            (
                Type::Array {
                    elem: from_elem,
                    len: from_len,
                    dynamic: from_dyn,
                },
                Type::Array {
                    elem: to_elem,
                    len: to_len,
                    dynamic: to_dyn,
                },
            ) => (from_len == to_len || *from_dyn || *to_dyn) && from_elem.coercible_to(to_elem),
            (Type::Function { .. }, Type::Handle(_)) | (Type::Handle(_), Type::Function { .. }) => true,
            (Type::Function { params: p1, ret: r1, .. }, Type::Function { params: p2, ret: r2, .. }) => {
                p1.len() == p2.len() && r1.coercible_to(r2)
            }
            (a, b) => a.is_arithmetic() && b.is_arithmetic(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Handle(name) => write!(f, "{name}"),
            Type::Bool => write!(f, "bool"),
            Type::Int => write!(f, "int"),
            Type::Char => write!(f, "char"),
            Type::Float => write!(f, "float"),
            Type::Any => write!(f, "any"),
            Type::Ref(inner) => write!(f, "{inner}&"),
            Type::Array { elem, len, dynamic } => {
                if *dynamic {
                    write!(f, "{elem}[]")
                } else {
                    write!(f, "{elem}[{len}]")
                }
            }
            Type::Function { params, ret, variadic } => {
                write!(f, "function {ret}(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                if *variadic {
                    if !params.is_empty() {
                        write!(f, ", ")?;
                    }
                    write!(f, "...")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// A value known at compile time.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Int(i32),
    Float(f32),
    Bool(bool),
    Char(char),
    Str(String),
    Array(Vec<ConstValue>),
}

impl ConstValue {
    pub fn ty(&self) -> Type {
        match self {
            ConstValue::Int(_) => Type::Int,
            ConstValue::Float(_) => Type::Float,
            ConstValue::Bool(_) => Type::Bool,
            ConstValue::Char(_) => Type::Char,
            ConstValue::Str(s) => Type::array(Type::Char, s.chars().count() + 1),
            ConstValue::Array(items) => {
                let elem = items.first().map_or(Type::Any, ConstValue::ty);
                Type::array(elem, items.len())
            }
        }
    }

    /// Cell value for integer contexts. Floats truncate toward zero.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            ConstValue::Int(v) => Some(*v),
            ConstValue::Float(v) => Some(*v as i32),
            ConstValue::Bool(b) => Some(*b as i32),
            ConstValue::Char(c) => Some(*c as i32),
            ConstValue::Str(_) | ConstValue::Array(_) => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            ConstValue::Float(v) => Some(*v),
            other => other.as_int().map(|v| v as f32),
        }
    }

    pub fn truthy(&self) -> Option<bool> {
        match self {
            ConstValue::Float(v) => Some(*v != 0.0),
            other => other.as_int().map(|v| v != 0),
        }
    }

    /// Converts to the representation of `ty`, if that is a scalar kind.
    pub fn convert_to(&self, ty: &Type) -> ConstValue {
        match ty.deref() {
            Type::Float => self.as_float().map_or_else(|| self.clone(), ConstValue::Float),
            Type::Int => self.as_int().map_or_else(|| self.clone(), ConstValue::Int),
            Type::Bool => self.truthy().map_or_else(|| self.clone(), ConstValue::Bool),
            Type::Char => self
                .as_int()
                .and_then(|v| char::from_u32(v as u32))
                .map_or_else(|| self.clone(), ConstValue::Char),
            _ => self.clone(),
        }
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Int(v) => write!(f, "{v}"),
            ConstValue::Float(v) => write!(f, "{v:?}"),
            ConstValue::Bool(b) => write!(f, "{b}"),
            ConstValue::Char(c) => write!(f, "{c:?}"),
            ConstValue::Str(s) => write!(f, "{s:?}"),
            ConstValue::Array(items) => {
                write!(f, "{{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

/// A type plus, when known, its compile-time value.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeAndVal {
    pub ty: Type,
    pub value: Option<ConstValue>,
}

impl TypeAndVal {
    pub fn new(ty: Type, value: Option<ConstValue>) -> Self {
        Self { ty, value }
    }

    pub fn known(value: ConstValue) -> Self {
        Self {
            ty: value.ty(),
            value: Some(value),
        }
    }

    pub fn unknown(ty: Type) -> Self {
        Self { ty, value: None }
    }

    /// The error sentinel: `Void` with no value.
    pub fn void() -> Self {
        Self::unknown(Type::Void)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promotion() {
        assert_eq!(Type::Int.promote(&Type::Float), Type::Float);
        assert_eq!(Type::Char.promote(&Type::Bool), Type::Int);
        assert_eq!(Type::Any.promote(&Type::Int), Type::Int);
    }

    #[test]
    fn test_array_coercion() {
        let a3 = Type::array(Type::Int, 3);
        let a4 = Type::array(Type::Int, 4);
        assert!(a3.coercible_to(&Type::array(Type::Float, 3)));
        assert!(!a3.coercible_to(&a4));
        assert!(a3.coercible_to(&Type::dynamic_array(Type::Int)));
        assert!(!a3.coercible_to(&Type::Int));
    }

    #[test]
    fn test_handles_and_refs() {
        let menu = Type::Handle("Menu".into());
        assert!(menu.coercible_to(&Type::Handle("Handle".into())));
        assert!(menu.coercible_to(&Type::Any));
        assert!(!Type::Void.coercible_to(&Type::Any));
        assert!(Type::Ref(Box::new(Type::Int)).coercible_to(&Type::Float));
    }

    #[test]
    fn test_with_dims() {
        let ty = Type::Int.with_dims(&[Some(2), Some(3)]);
        assert!(matches!(ty, Type::Array { len: 2, dynamic: false, .. }));
        assert_eq!(ty.element(), Some(&Type::array(Type::Int, 3)));
    }

    #[test]
    fn test_display() {
        assert_eq!(Type::array(Type::Char, 32).to_string(), "char[32]");
        assert_eq!(Type::dynamic_array(Type::Int).to_string(), "int[]");
        assert_eq!(ConstValue::Float(2.0).to_string(), "2.0");
    }
}
