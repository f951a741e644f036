//! Pure value-level operations shared by the compiled `Code` for
//! `CanExpr::PrimOp` and by the decision-tree matcher: arithmetic,
//! structural equality/ordering, and literal/occurrence projection.

use crate::error::EvalError;
use crate::value::{list_to_vec, Value};
use weft_canon::{CaseTest, Occurrence, PathStep};
use weft_ir::{Literal, Pos};
use weft_types::DataTypeRegistry;

pub fn eval_add(lhs: &Value, rhs: &Value, pos: Option<Pos>) -> Result<Value, EvalError> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => a.checked_add(*b).map(Value::Int).ok_or(EvalError::Overflow { pos }),
        (Value::Real(a), Value::Real(b)) => Ok(Value::Real(a + b)),
        _ => unreachable!("PrimOp::Add operand shape guaranteed by the type checker"),
    }
}

pub fn eval_sub(lhs: &Value, rhs: &Value, pos: Option<Pos>) -> Result<Value, EvalError> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => a.checked_sub(*b).map(Value::Int).ok_or(EvalError::Overflow { pos }),
        (Value::Real(a), Value::Real(b)) => Ok(Value::Real(a - b)),
        _ => unreachable!("PrimOp::Sub operand shape guaranteed by the type checker"),
    }
}

pub fn eval_mul(lhs: &Value, rhs: &Value, pos: Option<Pos>) -> Result<Value, EvalError> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => a.checked_mul(*b).map(Value::Int).ok_or(EvalError::Overflow { pos }),
        (Value::Real(a), Value::Real(b)) => Ok(Value::Real(a * b)),
        _ => unreachable!("PrimOp::Mul operand shape guaranteed by the type checker"),
    }
}

pub fn eval_div(lhs: &Value, rhs: &Value, pos: Option<Pos>) -> Result<Value, EvalError> {
    match (lhs, rhs) {
        (Value::Int(_), Value::Int(0)) => Err(EvalError::Div { pos }),
        (Value::Int(a), Value::Int(b)) => a.checked_div(*b).map(Value::Int).ok_or(EvalError::Overflow { pos }),
        (Value::Real(a), Value::Real(b)) => Ok(Value::Real(a / b)),
        _ => unreachable!("PrimOp::Div operand shape guaranteed by the type checker"),
    }
}

pub fn eval_concat(lhs: &Value, rhs: &Value) -> Value {
    match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => Value::str(format!("{a}{b}")),
        _ => unreachable!("PrimOp::Concat operand shape guaranteed by the type checker"),
    }
}

/// Structural equality (spec §3 Value invariants): scalars compare by
/// value, aggregates element-wise, `Ref` cells by identity (two refs are
/// `=` only when they are the same cell, matching ML reference semantics).
#[must_use]
pub fn value_eq(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Unit, Value::Unit) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Real(a), Value::Real(b)) => a == b,
        (Value::Char(a), Value::Char(b)) => a == b,
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Tuple(a), Value::Tuple(b)) => a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| value_eq(x, y)),
        (Value::Record(a), Value::Record(b)) | (Value::Row(a), Value::Row(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|((an, av), (bn, bv))| an == bn && value_eq(av, bv))
        }
        (Value::List(a), Value::List(b)) => {
            let (av, bv) = (list_to_vec(a), list_to_vec(b));
            av.len() == bv.len() && av.iter().zip(bv.iter()).all(|(x, y)| value_eq(x, y))
        }
        (Value::Ctor(an, aa), Value::Ctor(bn, ba)) => {
            an == bn && aa.len() == ba.len() && aa.iter().zip(ba.iter()).all(|(x, y)| value_eq(x, y))
        }
        (Value::Ref(a), Value::Ref(b)) => std::rc::Rc::ptr_eq(a, b),
        _ => false,
    }
}

#[must_use]
pub fn cmp_value(lhs: &Value, rhs: &Value) -> std::cmp::Ordering {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => a.cmp(b),
        (Value::Real(a), Value::Real(b)) => a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal),
        (Value::Char(a), Value::Char(b)) => a.cmp(b),
        (Value::Str(a), Value::Str(b)) => a.cmp(b),
        _ => unreachable!("comparison operand shape guaranteed by the type checker"),
    }
}

#[must_use]
pub fn literal_matches(value: &Value, lit: &Literal) -> bool {
    match (value, lit) {
        (Value::Int(a), Literal::Int(b)) => a == b,
        (Value::Real(a), Literal::Real(b)) => a == b,
        (Value::Str(a), Literal::String(b)) => a.as_ref() == b.as_str(),
        (Value::Char(a), Literal::Char(b)) => a == b,
        (Value::Bool(a), Literal::Bool(b)) => a == b,
        (Value::Unit, Literal::Unit) => true,
        _ => false,
    }
}

/// Follow one `Occurrence` path against a live `Value`, extracting the
/// sub-value the decision tree's `bindings`/`Switch` steps describe.
#[must_use]
pub fn project(root: &Value, occurrence: &Occurrence) -> Value {
    let mut current = root.clone();
    for step in occurrence {
        current = match (step, &current) {
            (PathStep::TupleIndex(i), Value::Tuple(items)) => items[*i].clone(),
            (PathStep::Field(name), Value::Record(fields) | Value::Row(fields)) => {
                fields.iter().find(|(n, _)| n == name).map(|(_, v)| v.clone()).unwrap_or_else(|| unreachable!("field occurrence guaranteed present by the type checker"))
            }
            (PathStep::CtorArg(i), Value::Ctor(_, args)) => args[*i].clone(),
            // `handle` arms are pattern-compiled as ordinary constructor
            // patterns (spec §4.2 "exceptions are constructors of `exn`"),
            // but the exception packet a `raise` actually produces is a
            // `Value::Exn`, not a `Value::Ctor` — so occurrence projection
            // has to accept both shapes at a `CtorArg` step.
            (PathStep::CtorArg(0), Value::Exn(_, Some(payload))) => (**payload).clone(),
            _ => unreachable!("occurrence step shape guaranteed by the match compiler"),
        };
    }
    current
}

/// Does `value` satisfy `test` at the head of `occurrence`'s projection?
/// Mirrors `weft_canon::decision_tree::case_test`'s production side.
#[must_use]
pub fn value_matches_test(value: &Value, test: &CaseTest, registry: &DataTypeRegistry) -> bool {
    match test {
        CaseTest::Ctor(name) => matches!(value, Value::Ctor(n, _) if n == name) || matches!(value, Value::Exn(n, _) if n == name),
        CaseTest::Literal(lit) => literal_matches(value, lit),
        CaseTest::Tuple(_) => matches!(value, Value::Tuple(_)),
        CaseTest::Record(_) => {
            let _ = registry;
            matches!(value, Value::Record(_) | Value::Row(_))
        }
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "tests use unwrap for brevity")]
mod tests {
    use super::*;
    use weft_ir::StringInterner;

    #[test]
    fn add_overflows_to_an_error_instead_of_wrapping() {
        let err = eval_add(&Value::Int(i64::MAX), &Value::Int(1), None);
        assert!(matches!(err, Err(EvalError::Overflow { .. })));
    }

    #[test]
    fn div_by_zero_is_an_error_not_a_panic() {
        let err = eval_div(&Value::Int(1), &Value::Int(0), None);
        assert!(matches!(err, Err(EvalError::Div { .. })));
    }

    #[test]
    fn real_division_by_zero_is_not_caught_here() {
        let result = eval_div(&Value::Real(1.0), &Value::Real(0.0), None).unwrap();
        assert!(matches!(result, Value::Real(r) if r.is_infinite()));
    }

    #[test]
    fn value_eq_is_structural_for_aggregates() {
        let a = Value::tuple(vec![Value::Int(1), Value::str("x")]);
        let b = Value::tuple(vec![Value::Int(1), Value::str("x")]);
        let c = Value::tuple(vec![Value::Int(1), Value::str("y")]);
        assert!(value_eq(&a, &b));
        assert!(!value_eq(&a, &c));
    }

    #[test]
    fn value_eq_on_refs_is_identity_not_contents() {
        let a = Value::Ref(std::rc::Rc::new(std::cell::RefCell::new(Value::Int(1))));
        let b = Value::Ref(std::rc::Rc::new(std::cell::RefCell::new(Value::Int(1))));
        let a_alias = a.clone();
        assert!(!value_eq(&a, &b));
        assert!(value_eq(&a, &a_alias));
    }

    #[test]
    fn cmp_value_orders_strings_lexically() {
        assert_eq!(cmp_value(&Value::str("a"), &Value::str("b")), std::cmp::Ordering::Less);
    }

    #[test]
    fn project_follows_tuple_and_field_steps() {
        let row = Value::record(vec![(Name::from_raw(0), Value::tuple(vec![Value::Int(1), Value::Int(2)]))]);
        let occurrence = vec![PathStep::Field(Name::from_raw(0)), PathStep::TupleIndex(1)];
        assert!(matches!(project(&row, &occurrence), Value::Int(2)));
    }

    #[test]
    fn project_accepts_an_exn_payload_at_ctor_arg_zero() {
        let exn = Value::Exn(Name::from_raw(0), Some(std::rc::Rc::new(Value::Int(7))));
        let occurrence = vec![PathStep::CtorArg(0)];
        assert!(matches!(project(&exn, &occurrence), Value::Int(7)));
    }

    #[test]
    fn value_matches_test_treats_exn_like_ctor() {
        let mut interner = StringInterner::new();
        let name = interner.intern("Overflow");
        let registry = DataTypeRegistry::new();
        let exn = Value::Exn(name, None);
        assert!(value_matches_test(&exn, &CaseTest::Ctor(name), &registry));
    }
}
