//! In-memory execution of a recognised relational plan (spec §4.5 "the
//! evaluator implements the relational operators over in-memory row
//! lists"), used whenever a `Session` has no [`crate::catalog::RelBuilder`]
//! configured.
//!
//! [`CompiledRel`] mirrors `weft_canon::RelExpr` one-for-one but with every
//! leaf `CanId` already lowered to a [`Code`]; [`compile_rel`] builds one
//! from a `RelExpr` plus whatever compiles a `CanId` in a given
//! [`Scope`] (supplied as a callback so this module doesn't need to depend
//! on `crate::compiler::Compiler` directly).

use crate::code::Code;
use crate::env::Environment;
use crate::error::EvalError;
use crate::ops::{cmp_value, value_eq};
use crate::scope::Scope;
use crate::session::Session;
use crate::value::{list_to_vec, Value};
use weft_canon::{AggregateOp, RelExpr};
use weft_ir::Name;

pub enum CompiledRel {
    Scan { row_var: Name, source: Code },
    Filter { input: Box<CompiledRel>, predicate: Code },
    Project { input: Box<CompiledRel>, expr: Code },
    Join { left: Box<CompiledRel>, right: Box<CompiledRel> },
    Union { left: Box<CompiledRel>, right: Box<CompiledRel> },
    GroupBy { input: Box<CompiledRel>, key_fn: Code, agg_fn: Code },
    Aggregate { input: Box<CompiledRel>, op: AggregateOp, field_fn: Code },
    Distinct { input: Box<CompiledRel> },
    OrderBy { input: Box<CompiledRel>, key_fn: Code },
}

/// Compile `rel` against `scope`, returning the compiled plan plus the
/// `Scope` its own continuation (whatever wraps it) should use to resolve
/// the row variables it introduces. Mirrors, in reverse, the nesting
/// `weft_canon::relationalize::recognize_core` unwound the pipeline from:
/// each `Scan` pushes its `row_var` one level deeper, and everything
/// syntactically nested inside it (predicates, `yield` expressions, a
/// second generator's source) was compiled against that deeper scope too.
pub fn compile_rel(rel: &RelExpr, scope: &Scope, compile_expr: &mut dyn FnMut(weft_canon::CanId, &Scope) -> Code) -> (CompiledRel, Scope) {
    match rel {
        RelExpr::Scan { row_var, source } => {
            let source_code = compile_expr(*source, scope);
            let inner = scope.push(*row_var);
            (CompiledRel::Scan { row_var: *row_var, source: source_code }, inner)
        }
        RelExpr::Filter { input, predicate } => {
            let (compiled_input, inner) = compile_rel(input, scope, compile_expr);
            let predicate_code = compile_expr(*predicate, &inner);
            (CompiledRel::Filter { input: Box::new(compiled_input), predicate: predicate_code }, inner)
        }
        RelExpr::Project { input, expr } => {
            let (compiled_input, inner) = compile_rel(input, scope, compile_expr);
            let expr_code = compile_expr(*expr, &inner);
            (CompiledRel::Project { input: Box::new(compiled_input), expr: expr_code }, inner)
        }
        RelExpr::Join { left, right } => {
            let (compiled_left, scope_left) = compile_rel(left, scope, compile_expr);
            let (compiled_right, scope_right) = compile_rel(right, &scope_left, compile_expr);
            (CompiledRel::Join { left: Box::new(compiled_left), right: Box::new(compiled_right) }, scope_right)
        }
        RelExpr::Union { left, right } => {
            let (compiled_left, scope_left) = compile_rel(left, scope, compile_expr);
            let (compiled_right, _) = compile_rel(right, scope, compile_expr);
            (CompiledRel::Union { left: Box::new(compiled_left), right: Box::new(compiled_right) }, scope_left)
        }
        RelExpr::GroupBy { input, key_fn, agg_fn } => {
            let (compiled_input, _) = compile_rel(input, scope, compile_expr);
            let key_code = compile_expr(*key_fn, scope);
            let agg_code = compile_expr(*agg_fn, scope);
            (CompiledRel::GroupBy { input: Box::new(compiled_input), key_fn: key_code, agg_fn: agg_code }, scope.clone())
        }
        RelExpr::Aggregate { input, op, field_fn } => {
            let (compiled_input, _) = compile_rel(input, scope, compile_expr);
            let field_code = compile_expr(*field_fn, scope);
            (CompiledRel::Aggregate { input: Box::new(compiled_input), op: *op, field_fn: field_code }, scope.clone())
        }
        RelExpr::Distinct { input } => {
            let (compiled_input, inner) = compile_rel(input, scope, compile_expr);
            (CompiledRel::Distinct { input: Box::new(compiled_input) }, inner)
        }
        RelExpr::OrderBy { input, key_fn } => {
            let (compiled_input, inner) = compile_rel(input, scope, compile_expr);
            let key_code = compile_expr(*key_fn, scope);
            (CompiledRel::OrderBy { input: Box::new(compiled_input), key_fn: key_code }, inner)
        }
    }
}

fn value_to_rows(value: Value) -> Vec<Value> {
    match value {
        Value::List(node) => list_to_vec(&node),
        Value::RelSeq(cell) => (*cell.force()).clone(),
        _ => unreachable!("relational source shape guaranteed by the type checker"),
    }
}

/// Evaluate a `Scan`/`Filter`/`Join`/`Union` chain into one `Environment`
/// per surviving row, each extending `base_env` with every row variable
/// bound so far.
fn eval_envs(session: &mut Session, base_env: &Environment, node: &CompiledRel) -> Result<Vec<Environment>, EvalError> {
    match node {
        CompiledRel::Scan { row_var, source } => {
            let rows = value_to_rows(source.run(session, base_env)?);
            Ok(rows.into_iter().map(|row| base_env.bind(*row_var, row)).collect())
        }
        CompiledRel::Filter { input, predicate } => {
            let envs = eval_envs(session, base_env, input)?;
            let mut out = Vec::new();
            for env in envs {
                if matches!(predicate.run(session, &env)?, Value::Bool(true)) {
                    out.push(env);
                }
            }
            Ok(out)
        }
        CompiledRel::Join { left, right } => {
            let left_envs = eval_envs(session, base_env, left)?;
            let mut out = Vec::new();
            for left_env in left_envs {
                out.extend(eval_envs(session, &left_env, right)?);
            }
            Ok(out)
        }
        CompiledRel::Union { left, right } => {
            let mut out = eval_envs(session, base_env, left)?;
            out.extend(eval_envs(session, base_env, right)?);
            Ok(out)
        }
        CompiledRel::Project { .. }
        | CompiledRel::GroupBy { .. }
        | CompiledRel::Aggregate { .. }
        | CompiledRel::Distinct { .. }
        | CompiledRel::OrderBy { .. } => Err(EvalError::Relational("relational sub-plan does not yield bindable rows".to_string())),
    }
}

fn reduce_aggregate(op: AggregateOp, values: &[Value]) -> Value {
    match op {
        AggregateOp::Count => Value::Int(values.len() as i64),
        AggregateOp::Sum => values.iter().fold(Value::Int(0), |acc, v| match (acc, v) {
            (Value::Int(a), Value::Int(b)) => Value::Int(a + b),
            (Value::Real(a), Value::Real(b)) => Value::Real(a + b),
            (Value::Int(a), Value::Real(b)) => Value::Real(a as f64 + b),
            _ => unreachable!("aggregate field shape guaranteed by the type checker"),
        }),
        AggregateOp::Min => values.iter().cloned().fold(None, |acc, v| match acc {
            None => Some(v),
            Some(best) => Some(if cmp_value(&v, &best) == std::cmp::Ordering::Less { v } else { best }),
        }).unwrap_or(Value::Unit),
        AggregateOp::Max => values.iter().cloned().fold(None, |acc, v| match acc {
            None => Some(v),
            Some(best) => Some(if cmp_value(&v, &best) == std::cmp::Ordering::Greater { v } else { best }),
        }).unwrap_or(Value::Unit),
        AggregateOp::Avg => {
            let sum = match reduce_aggregate(AggregateOp::Sum, values) {
                Value::Int(i) => i as f64,
                Value::Real(r) => r,
                _ => unreachable!("Sum always returns a numeric Value"),
            };
            Value::Real(sum / values.len().max(1) as f64)
        }
    }
}

/// Materialise a relational plan to its row sequence (spec §4.5 last
/// sentence). The plan always ends in `Project`/`GroupBy`/`Aggregate`/
/// `Distinct`/`OrderBy`: the Relationalizer only recognises pipelines that
/// end with a `yield`, so a bare `Scan`/`Filter`/`Join`/`Union` never
/// appears as the outermost node of a compiled `CanExpr::Rel`.
pub fn materialize(session: &mut Session, env: &Environment, node: &CompiledRel) -> Result<Vec<Value>, EvalError> {
    match node {
        CompiledRel::Project { input, expr } => {
            let envs = eval_envs(session, env, input)?;
            envs.iter().map(|row_env| expr.run(session, row_env)).collect()
        }
        CompiledRel::Distinct { input } => {
            let rows = materialize(session, env, input)?;
            let mut out: Vec<Value> = Vec::new();
            for row in rows {
                if !out.iter().any(|seen| value_eq(seen, &row)) {
                    out.push(row);
                }
            }
            Ok(out)
        }
        CompiledRel::OrderBy { input, key_fn } => {
            let rows = materialize(session, env, input)?;
            let mut keyed: Vec<(Value, Value)> = Vec::with_capacity(rows.len());
            for row in rows {
                let key = key_fn.run(session, env)?;
                keyed.push((key, row));
            }
            keyed.sort_by(|(a, _), (b, _)| cmp_value(a, b));
            Ok(keyed.into_iter().map(|(_, row)| row).collect())
        }
        CompiledRel::GroupBy { input, key_fn, agg_fn } => {
            let rows = materialize(session, env, input)?;
            let mut groups: Vec<(Value, Vec<Value>)> = Vec::new();
            for row in rows {
                let key = crate::compiler::apply_value(session, key_fn.run(session, env)?, row.clone())?;
                match groups.iter_mut().find(|(k, _)| value_eq(k, &key)) {
                    Some((_, members)) => members.push(row),
                    None => groups.push((key, vec![row])),
                }
            }
            let mut out = Vec::with_capacity(groups.len());
            for (key, members) in groups {
                let agg = crate::compiler::apply_value(session, agg_fn.run(session, env)?, Value::list(members))?;
                out.push(Value::tuple(vec![key, agg]));
            }
            Ok(out)
        }
        CompiledRel::Aggregate { input, op, field_fn } => {
            let rows = materialize(session, env, input)?;
            let mut fields = Vec::with_capacity(rows.len());
            for row in &rows {
                fields.push(crate::compiler::apply_value(session, field_fn.run(session, env)?, row.clone())?);
            }
            Ok(vec![reduce_aggregate(*op, &fields)])
        }
        CompiledRel::Scan { .. } | CompiledRel::Filter { .. } | CompiledRel::Join { .. } | CompiledRel::Union { .. } => {
            Err(EvalError::Relational("relational plan must end in a projection or aggregation".to_string()))
        }
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "tests use unwrap for brevity")]
mod tests {
    use super::*;
    use crate::compiler::Compiler;
    use weft_canon::{CanArena, CanExpr, PrimOp};
    use weft_ir::{Literal, StringInterner};

    fn as_ints(values: &[Value]) -> Vec<i64> {
        values
            .iter()
            .map(|v| match v {
                Value::Int(i) => *i,
                other => panic!("expected an int row, got {other:?}"),
            })
            .collect()
    }

    /// `from x in [1, 2, 3] where x <> 2 yield x * 10` — exercises the
    /// `Scan`/`Filter`/`Project` row-variable scoping `compile_rel`
    /// reconstructs to match how `recognize_core` originally nested them.
    #[test]
    fn scan_filter_project_materializes_surviving_rows() {
        let mut session = Session::new();
        let mut arena = CanArena::new();
        let ty = session.pool.int();
        let bool_ty = session.pool.bool();
        let mut interner = StringInterner::new();
        let x = interner.intern("x");

        let one = arena.push(CanExpr::Literal(Literal::Int(1)), ty);
        let two = arena.push(CanExpr::Literal(Literal::Int(2)), ty);
        let three = arena.push(CanExpr::Literal(Literal::Int(3)), ty);
        let source = arena.push(CanExpr::List(vec![one, two, three]), ty);

        let x_var = arena.push(CanExpr::Var(x), ty);
        let two_again = arena.push(CanExpr::Literal(Literal::Int(2)), ty);
        let predicate = arena.push(CanExpr::PrimOp(PrimOp::Neq, x_var, two_again), bool_ty);

        let x_var2 = arena.push(CanExpr::Var(x), ty);
        let ten = arena.push(CanExpr::Literal(Literal::Int(10)), ty);
        let expr = arena.push(CanExpr::PrimOp(PrimOp::Mul, x_var2, ten), ty);

        let plan = RelExpr::Project {
            input: Box::new(RelExpr::Filter { input: Box::new(RelExpr::Scan { row_var: x, source }), predicate }),
            expr,
        };

        let compiler = Compiler::new(&arena);
        let mut compile_cb = |cid: weft_canon::CanId, s: &Scope| compiler.compile_expr(cid, s);
        let (compiled, _) = compile_rel(&plan, &Scope::root(), &mut compile_cb);
        let env = session.env().clone();
        let rows = materialize(&mut session, &env, &compiled).unwrap();
        assert_eq!(as_ints(&rows), vec![10, 30]);
    }

    #[test]
    fn aggregate_sum_reduces_over_a_field_fn() {
        let mut session = Session::new();
        let mut arena = CanArena::new();
        let ty = session.pool.int();
        let mut interner = StringInterner::new();
        let x = interner.intern("x");

        let a = arena.push(CanExpr::Literal(Literal::Int(4)), ty);
        let b = arena.push(CanExpr::Literal(Literal::Int(5)), ty);
        let source = arena.push(CanExpr::List(vec![a, b]), ty);
        let x_var = arena.push(CanExpr::Var(x), ty);

        let plan = RelExpr::Aggregate { input: Box::new(RelExpr::Scan { row_var: x, source }), op: AggregateOp::Sum, field_fn: x_var };

        let compiler = Compiler::new(&arena);
        let mut compile_cb = |cid: weft_canon::CanId, s: &Scope| compiler.compile_expr(cid, s);
        let (compiled, _) = compile_rel(&plan, &Scope::root(), &mut compile_cb);
        let env = session.env().clone();
        let rows = materialize(&mut session, &env, &compiled).unwrap();
        assert_eq!(as_ints(&rows), vec![9]);
    }

    #[test]
    fn bare_scan_without_a_terminal_shape_is_a_relational_error() {
        let mut session = Session::new();
        let mut arena = CanArena::new();
        let ty = session.pool.int();
        let mut interner = StringInterner::new();
        let x = interner.intern("x");
        let one = arena.push(CanExpr::Literal(Literal::Int(1)), ty);
        let source = arena.push(CanExpr::List(vec![one]), ty);
        let plan = RelExpr::Scan { row_var: x, source };

        let compiler = Compiler::new(&arena);
        let mut compile_cb = |cid: weft_canon::CanId, s: &Scope| compiler.compile_expr(cid, s);
        let (compiled, _) = compile_rel(&plan, &Scope::root(), &mut compile_cb);
        let env = session.env().clone();
        assert!(matches!(materialize(&mut session, &env, &compiled), Err(EvalError::Relational(_))));
    }
}
