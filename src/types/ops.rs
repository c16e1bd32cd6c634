//! Operator rules shared by the checker and the evaluator.
//!
//! Typing rules (`*_type`) and folding rules (`fold_*`) live side by side so
//! that static checking and constant folding cannot disagree: `Char` widens
//! to `Int`, `Float` wins, `Bool`/`Any` behave as `Int`, comparisons and
//! logical operators produce `Bool`.
//!
//! Integer arithmetic wraps at 32 bits; floats are `f32`.

use crate::lexer::literal;
use crate::parser::ast::{BinOp, LitKind, UnOp};
use crate::span::Span;
use crate::types::{ConstValue, EvalError, Type};

/// Shift amounts outside the cell width, or a shift that does nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftWarning {
    NoOp,
    Overflow,
}

impl ShiftWarning {
    pub fn message(self, op: BinOp, amount: i32) -> String {
        match self {
            ShiftWarning::NoOp => format!("shift '{}' by 0 has no effect", op.as_str()),
            ShiftWarning::Overflow => format!(
                "shift '{}' by {amount} is outside 0..32 and overflows",
                op.as_str()
            ),
        }
    }
}

/// Warning a shift by `amount` carries, if any.
pub fn shift_warning(amount: i32) -> Option<ShiftWarning> {
    if amount == 0 {
        Some(ShiftWarning::NoOp)
    } else if !(0..32).contains(&amount) {
        Some(ShiftWarning::Overflow)
    } else {
        None
    }
}

/// Applies `<<`, `>>` or `>>>`.
///
/// Out-of-range amounts: `<<` reduces the amount mod 32, `>>` fills with the
/// sign bit, `>>>` yields 0.
pub fn shift(op: BinOp, value: i32, amount: i32) -> (i32, Option<ShiftWarning>) {
    let warning = shift_warning(amount);
    let in_range = (0..32).contains(&amount);
    let result = match op {
        BinOp::Shl if in_range => value << amount,
        BinOp::Shl => value << amount.rem_euclid(32),
        BinOp::Shr if in_range => value >> amount,
        BinOp::Shr => {
            if value < 0 {
                -1
            } else {
                0
            }
        }
        BinOp::Ushr if in_range => ((value as u32) >> amount) as i32,
        BinOp::Ushr => 0,
        _ => value,
    };
    (result, warning)
}

/// Value of a literal lexeme.
pub fn literal_value(kind: LitKind, raw: &str, span: Span) -> Result<ConstValue, EvalError> {
    let malformed = || EvalError::NotConstant {
        what: "malformed literal",
        span,
    };
    match kind {
        // Wider literals wrap into the cell
        LitKind::Int => literal::int_value(raw).map(|v| ConstValue::Int(v as i32)).ok_or_else(malformed),
        LitKind::Float => literal::float_value(raw)
            .map(|v| ConstValue::Float(v as f32))
            .ok_or_else(malformed),
        LitKind::Char => literal::char_value(raw).map(ConstValue::Char).map_err(|_| malformed()),
        LitKind::String => literal::unescape(raw).map(ConstValue::Str).map_err(|_| malformed()),
        LitKind::Bool => Ok(ConstValue::Bool(raw == "true")),
    }
}

pub fn literal_type(kind: LitKind, raw: &str) -> Type {
    match kind {
        LitKind::Int => Type::Int,
        LitKind::Float => Type::Float,
        LitKind::Char => Type::Char,
        LitKind::Bool => Type::Bool,
        LitKind::String => {
            let len = literal::unescape(raw).map_or(0, |s| s.chars().count());
            Type::array(Type::Char, len + 1)
        }
    }
}

fn require_arithmetic(op: &'static str, ty: &Type, span: Span) -> Result<(), EvalError> {
    if ty.is_arithmetic() {
        Ok(())
    } else {
        Err(EvalError::NotArithmetic {
            op,
            ty: ty.clone(),
            span,
        })
    }
}

fn unary_symbol(op: UnOp) -> &'static str {
    match op {
        UnOp::Neg => "-",
        UnOp::Not => "!",
        UnOp::BitNot => "~",
        UnOp::PreInc | UnOp::PostInc => "++",
        UnOp::PreDec | UnOp::PostDec => "--",
    }
}

/// Result type of a unary operator.
pub fn unary_type(op: UnOp, operand: &Type, span: Span) -> Result<Type, EvalError> {
    match op {
        UnOp::Not => {
            if operand.is_void() || operand.is_array() {
                return Err(EvalError::NotArithmetic {
                    op: "!",
                    ty: operand.clone(),
                    span,
                });
            }
            Ok(Type::Bool)
        }
        UnOp::Neg => {
            require_arithmetic("-", operand, span)?;
            Ok(operand.promote(operand))
        }
        UnOp::BitNot => {
            require_arithmetic("~", operand, span)?;
            Ok(Type::Int)
        }
        _ => {
            require_arithmetic(unary_symbol(op), operand, span)?;
            Ok(operand.deref().clone())
        }
    }
}

/// Result type of a non-assignment binary operator.
pub fn binary_type(op: BinOp, left: &Type, right: &Type, span: Span) -> Result<Type, EvalError> {
    match op {
        BinOp::Eq | BinOp::Ne => {
            if (left.is_arithmetic() && right.is_arithmetic())
                || right.coercible_to(left)
                || left.coercible_to(right)
            {
                Ok(Type::Bool)
            } else {
                Err(EvalError::Mismatch {
                    expected: left.clone(),
                    found: right.clone(),
                    span,
                })
            }
        }
        BinOp::And | BinOp::Or => {
            for ty in [left, right] {
                if ty.is_void() || ty.is_array() {
                    return Err(EvalError::NotArithmetic {
                        op: op.as_str(),
                        ty: ty.clone(),
                        span,
                    });
                }
            }
            Ok(Type::Bool)
        }
        _ => {
            require_arithmetic(op.as_str(), left, span)?;
            require_arithmetic(op.as_str(), right, span)?;
            if op.is_comparison() {
                Ok(Type::Bool)
            } else if matches!(op, BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod) {
                Ok(left.promote(right))
            } else {
                Ok(Type::Int)
            }
        }
    }
}

/// Folds `-`, `!` and `~`. Increments need storage and are left to the
/// evaluator.
pub fn fold_unary(op: UnOp, value: &ConstValue, span: Span) -> Result<ConstValue, EvalError> {
    let bad = || EvalError::NotArithmetic {
        op: unary_symbol(op),
        ty: value.ty(),
        span,
    };
    match op {
        UnOp::Not => value.truthy().map(|b| ConstValue::Bool(!b)).ok_or_else(bad),
        UnOp::Neg => match value {
            ConstValue::Float(v) => Ok(ConstValue::Float(-v)),
            other => other.as_int().map(|v| ConstValue::Int(v.wrapping_neg())).ok_or_else(bad),
        },
        UnOp::BitNot => value.as_int().map(|v| ConstValue::Int(!v)).ok_or_else(bad),
        _ => Err(bad()),
    }
}

/// Folds a non-assignment, non-short-circuit binary operator.
pub fn fold_binary(
    op: BinOp,
    left: &ConstValue,
    right: &ConstValue,
    span: Span,
) -> Result<(ConstValue, Option<ShiftWarning>), EvalError> {
    if matches!(op, BinOp::Eq | BinOp::Ne) {
        let equal = values_equal(left, right);
        return Ok((ConstValue::Bool(equal == (op == BinOp::Eq)), None));
    }
    if matches!(op, BinOp::And | BinOp::Or) {
        let (Some(a), Some(b)) = (left.truthy(), right.truthy()) else {
            return Err(EvalError::NotConstant {
                what: "logical operand",
                span,
            });
        };
        let result = if op == BinOp::And { a && b } else { a || b };
        return Ok((ConstValue::Bool(result), None));
    }

    let not_arith = |value: &ConstValue| EvalError::NotArithmetic {
        op: op.as_str(),
        ty: value.ty(),
        span,
    };
    let float = matches!(left, ConstValue::Float(_)) || matches!(right, ConstValue::Float(_));
    let is_float_op = matches!(op, BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod) || op.is_comparison();

    if float && is_float_op {
        let a = left.as_float().ok_or_else(|| not_arith(left))?;
        let b = right.as_float().ok_or_else(|| not_arith(right))?;
        let value = match op {
            BinOp::Add => ConstValue::Float(a + b),
            BinOp::Sub => ConstValue::Float(a - b),
            BinOp::Mul => ConstValue::Float(a * b),
            BinOp::Div => ConstValue::Float(a / b),
            BinOp::Mod => ConstValue::Float(a % b),
            BinOp::Lt => ConstValue::Bool(a < b),
            BinOp::Le => ConstValue::Bool(a <= b),
            BinOp::Gt => ConstValue::Bool(a > b),
            _ => ConstValue::Bool(a >= b),
        };
        return Ok((value, None));
    }

    let a = left.as_int().ok_or_else(|| not_arith(left))?;
    let b = right.as_int().ok_or_else(|| not_arith(right))?;
    let value = match op {
        BinOp::Add => a.wrapping_add(b),
        BinOp::Sub => a.wrapping_sub(b),
        BinOp::Mul => a.wrapping_mul(b),
        BinOp::Div | BinOp::Mod if b == 0 => return Err(EvalError::DivisionByZero { span }),
        BinOp::Div => a.wrapping_div(b),
        BinOp::Mod => a.wrapping_rem(b),
        BinOp::BitAnd => a & b,
        BinOp::BitOr => a | b,
        BinOp::BitXor => a ^ b,
        BinOp::Shl | BinOp::Shr | BinOp::Ushr => {
            let (value, warning) = shift(op, a, b);
            return Ok((ConstValue::Int(value), warning));
        }
        BinOp::Lt => return Ok((ConstValue::Bool(a < b), None)),
        BinOp::Le => return Ok((ConstValue::Bool(a <= b), None)),
        BinOp::Gt => return Ok((ConstValue::Bool(a > b), None)),
        BinOp::Ge => return Ok((ConstValue::Bool(a >= b), None)),
        _ => {
            return Err(EvalError::NotConstant {
                what: "assignment",
                span,
            })
        }
    };
    Ok((ConstValue::Int(value), None))
}

/// Equality across scalar kinds compares numerically.
pub fn values_equal(left: &ConstValue, right: &ConstValue) -> bool {
    match (left, right) {
        (ConstValue::Float(_), _) | (_, ConstValue::Float(_)) => left.as_float() == right.as_float(),
        _ => match (left.as_int(), right.as_int()) {
            (Some(a), Some(b)) => a == b,
            _ => left == right,
        },
    }
}

/// Whether an initialiser of type `source` may initialise storage of type
/// `target`. Unlike plain coercion, a shorter fixed-size array (or string)
/// fits into a longer one.
pub fn init_compatible(target: &Type, source: &Type) -> bool {
    match (target.deref(), source.deref()) {
        (
            Type::Array {
                elem: to_elem,
                len: to_len,
                dynamic: to_dyn,
            },
            Type::Array {
                elem: from_elem,
                len: from_len,
                dynamic: from_dyn,
            },
        ) => (*to_dyn || *from_dyn || from_len <= to_len) && init_compatible(to_elem, from_elem),
        (to, from) => from.coercible_to(to),
    }
}

/// Unsized array storage takes its length from the initialiser:
/// `char s[] = "abc"` is a `char[4]`.
pub fn adopt_length(target: Type, source: &Type) -> Type {
    match (target, source.deref()) {
        (
            Type::Array {
                elem, dynamic: true, ..
            },
            Type::Array {
                elem: from_elem,
                len,
                dynamic: false,
            },
        ) => Type::array(adopt_length(*elem, from_elem), *len),
        (target, _) => target,
    }
}

/// Cells a fixed-size array may span across all of its dimensions.
pub const MAX_ARRAY_CELLS: usize = 1 << 20;

/// Rejects fixed dimensions whose product exceeds [`MAX_ARRAY_CELLS`].
/// Dynamic dimensions hold no cells until allocated.
pub fn check_cells(dims: &[Option<usize>], span: Span) -> Result<(), EvalError> {
    let cells = dims
        .iter()
        .flatten()
        .try_fold(1u64, |acc, &len| acc.checked_mul(len as u64))
        .unwrap_or(u64::MAX);
    if cells > MAX_ARRAY_CELLS as u64 {
        return Err(EvalError::ArrayTooLarge {
            cells,
            limit: MAX_ARRAY_CELLS,
            span,
        });
    }
    Ok(())
}

/// Value storage of type `ty` holds before assignment.
pub fn zero_value(ty: &Type) -> ConstValue {
    match ty.deref() {
        Type::Float => ConstValue::Float(0.0),
        Type::Bool => ConstValue::Bool(false),
        Type::Char => ConstValue::Char('\0'),
        Type::Array { elem, .. } if matches!(**elem, Type::Char) => ConstValue::Str(String::new()),
        Type::Array { elem, len, .. } => ConstValue::Array(vec![zero_value(elem); *len]),
        _ => ConstValue::Int(0),
    }
}

/// Converts `value` to the representation of `ty`, padding fixed-size
/// arrays with zeros. With `fill`, padding continues the step between the
/// last two elements (`{1, 2, ...}`).
pub fn convert_value(value: ConstValue, ty: &Type, fill: bool) -> ConstValue {
    match (ty.deref(), value) {
        (Type::Array { elem, len, dynamic }, ConstValue::Array(items)) => {
            let mut items: Vec<ConstValue> = items.into_iter().map(|v| convert_value(v, elem, fill)).collect();
            if !*dynamic && items.len() < *len {
                let step = match (fill, items.as_slice()) {
                    (true, [.., a, b]) => b.as_int().zip(a.as_int()).map(|(b, a)| b.wrapping_sub(a)),
                    (true, [_]) => Some(0),
                    _ => None,
                };
                while items.len() < *len {
                    let next = match (step, items.last()) {
                        (Some(step), Some(last)) => match last {
                            ConstValue::Float(v) => ConstValue::Float(v + step as f32),
                            other => ConstValue::Int(other.as_int().unwrap_or(0).wrapping_add(step)),
                        },
                        _ => zero_value(elem),
                    };
                    items.push(convert_value(next, elem, false));
                }
            }
            ConstValue::Array(items)
        }
        (_, value) => value.convert_to(ty),
    }
}

/// `view_as<T>(v)` and `Tag:v` reinterpret the cell: the bits of an `int`
/// viewed as `float` are kept, not converted.
pub fn retag(value: ConstValue, ty: &Type) -> ConstValue {
    match (ty.deref(), value) {
        (Type::Float, ConstValue::Float(v)) => ConstValue::Float(v),
        (Type::Float, other) => match other.as_int() {
            Some(bits) => ConstValue::Float(f32::from_bits(bits as u32)),
            None => other,
        },
        (Type::Int | Type::Any | Type::Handle(_), ConstValue::Float(v)) => ConstValue::Int(v.to_bits() as i32),
        (Type::Int | Type::Any | Type::Handle(_), other) => match other.as_int() {
            Some(v) => ConstValue::Int(v),
            None => other,
        },
        (_, other) => other.convert_to(ty),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span() -> Span {
        Span::point(1, 1)
    }

    fn fold(op: BinOp, a: ConstValue, b: ConstValue) -> (ConstValue, Option<ShiftWarning>) {
        fold_binary(op, &a, &b, span()).unwrap()
    }

    #[test]
    fn test_shift_policy() {
        assert_eq!(shift(BinOp::Shl, 1, 33), (2, Some(ShiftWarning::Overflow)));
        assert_eq!(shift(BinOp::Shl, 5, 0), (5, Some(ShiftWarning::NoOp)));
        assert_eq!(shift(BinOp::Shr, -8, 40), (-1, Some(ShiftWarning::Overflow)));
        assert_eq!(shift(BinOp::Shr, 8, 40), (0, Some(ShiftWarning::Overflow)));
        assert_eq!(shift(BinOp::Ushr, -1, 32), (0, Some(ShiftWarning::Overflow)));
        assert_eq!(shift(BinOp::Ushr, -1, 28), (15, None));
        assert_eq!(shift(BinOp::Shr, -16, 2), (-4, None));
    }

    #[test]
    fn test_wrapping_arithmetic() {
        let (v, _) = fold(BinOp::Add, ConstValue::Int(i32::MAX), ConstValue::Int(1));
        assert_eq!(v, ConstValue::Int(i32::MIN));
        let (v, _) = fold(BinOp::Div, ConstValue::Int(i32::MIN), ConstValue::Int(-1));
        assert_eq!(v, ConstValue::Int(i32::MIN));
    }

    #[test]
    fn test_float_wins() {
        let (v, _) = fold(BinOp::Mul, ConstValue::Int(2), ConstValue::Float(1.5));
        assert_eq!(v, ConstValue::Float(3.0));
        assert_eq!(Type::Char.promote(&Type::Int), Type::Int);
        assert_eq!(
            binary_type(BinOp::Add, &Type::Char, &Type::Float, span()).unwrap(),
            Type::Float
        );
    }

    #[test]
    fn test_division_by_zero() {
        let err = fold_binary(BinOp::Mod, &ConstValue::Int(1), &ConstValue::Int(0), span()).unwrap_err();
        assert!(matches!(err, EvalError::DivisionByZero { .. }));
    }

    #[test]
    fn test_comparison_types() {
        assert_eq!(binary_type(BinOp::Lt, &Type::Int, &Type::Float, span()).unwrap(), Type::Bool);
        let menu = Type::Handle("Menu".into());
        assert_eq!(binary_type(BinOp::Eq, &menu, &Type::Handle("null".into()), span()).unwrap(), Type::Bool);
        assert!(binary_type(BinOp::Add, &menu, &Type::Int, span()).is_err());
    }

    #[test]
    fn test_string_fits_char_array() {
        let target = Type::array(Type::Char, 8);
        assert!(init_compatible(&target, &Type::array(Type::Char, 4)));
        assert!(!init_compatible(&target, &Type::array(Type::Char, 9)));
        assert!(init_compatible(&Type::dynamic_array(Type::Int), &Type::array(Type::Int, 3)));
    }

    #[test]
    fn test_adopt_length() {
        let ty = adopt_length(Type::dynamic_array(Type::Char), &Type::array(Type::Char, 4));
        assert_eq!(ty, Type::array(Type::Char, 4));
        let fixed = adopt_length(Type::array(Type::Int, 8), &Type::array(Type::Int, 2));
        assert_eq!(fixed, Type::array(Type::Int, 8));
    }

    #[test]
    fn test_fill_progression() {
        let ty = Type::array(Type::Int, 5);
        let value = convert_value(ConstValue::Array(vec![ConstValue::Int(1), ConstValue::Int(3)]), &ty, true);
        let expected: Vec<ConstValue> = [1, 3, 5, 7, 9].into_iter().map(ConstValue::Int).collect();
        assert_eq!(value, ConstValue::Array(expected));
        let padded = convert_value(ConstValue::Array(vec![ConstValue::Int(4)]), &ty, false);
        assert_eq!(padded.to_string(), "{4, 0, 0, 0, 0}");
    }

    #[test]
    fn test_retag_keeps_bits() {
        assert_eq!(retag(ConstValue::Float(1.0), &Type::Int), ConstValue::Int(0x3f80_0000));
        assert_eq!(retag(ConstValue::Int(0x3f80_0000), &Type::Float), ConstValue::Float(1.0));
    }
}
