//! The `Builtins` table (spec §4.7 supplement, SPEC_FULL.md §4.7): every
//! name here is registered into the root [`crate::env::Environment`] once,
//! at [`crate::session::Session::new`], keyed by the exact pre-interned
//! [`crate::session::WellKnownNames`] so `weft_canon::Lowerer`'s
//! `List.concatMap`/`List.distinct`/`List.sortBy`/`List.groupBy` lowering
//! and the Relationalizer's `!`/`:=` purity check agree on identity with
//! what actually runs at call time.
//!
//! Every entry is a unary [`Value::Native`]; a surface function of several
//! parameters curries (spec §4.3 "a lambda of exactly one parameter"), so
//! library functions do too — `List.map f xs` is `Native("List.map")`
//! applied to `f`, which returns a fresh `Native` closure over `f` that is
//! then applied to `xs`.

use crate::compiler::apply_value;
use crate::error::EvalError;
use crate::ops::{cmp_value, value_eq};
use crate::session::{Session, WellKnownNames};
use crate::value::{list_to_vec, NativeFn, Value};
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;
use weft_ir::Name;

fn native(name: Name, f: impl Fn(&mut Session, Value) -> Result<Value, EvalError> + 'static) -> Value {
    Value::Native(Rc::new(NativeFn { name, func: Box::new(f) }))
}

/// Curry a two-argument builtin: the outer call captures its first
/// argument and returns a fresh `Native` closure for the second.
fn native2(name: Name, f: impl Fn(&mut Session, Value, Value) -> Result<Value, EvalError> + Clone + 'static) -> Value {
    native(name, move |_session, first| {
        let f = f.clone();
        Ok(native(name, move |session, second| f(session, first.clone(), second)))
    })
}

fn native3(
    name: Name,
    f: impl Fn(&mut Session, Value, Value, Value) -> Result<Value, EvalError> + Clone + 'static,
) -> Value {
    native(name, move |_session, first| {
        let f = f.clone();
        Ok(native(name, move |_session, second| {
            let f = f.clone();
            let first = first.clone();
            Ok(native(name, move |session, third| f(session, first.clone(), second.clone(), third)))
        }))
    })
}

fn expect_ref(value: Value) -> Rc<RefCell<Value>> {
    match value {
        Value::Ref(cell) => cell,
        _ => unreachable!("ref-typed argument shape guaranteed by the type checker"),
    }
}

fn expect_list(value: Value) -> Vec<Value> {
    match value {
        Value::List(node) => list_to_vec(&node),
        _ => unreachable!("list-typed argument shape guaranteed by the type checker"),
    }
}

fn expect_str(value: Value) -> Rc<str> {
    match value {
        Value::Str(s) => s,
        _ => unreachable!("string-typed argument shape guaranteed by the type checker"),
    }
}

fn expect_bool(value: Value) -> bool {
    match value {
        Value::Bool(b) => b,
        _ => unreachable!("bool-typed argument shape guaranteed by the type checker"),
    }
}

pub fn install_builtins(names: &WellKnownNames) -> FxHashMap<Name, Value> {
    let mut table = FxHashMap::default();

    table.insert(names.ref_ctor, native(names.ref_ctor, |_s, v| Ok(Value::Ref(Rc::new(RefCell::new(v))))));

    table.insert(names.deref, native(names.deref, |_s, v| Ok(expect_ref(v).borrow().clone())));

    table.insert(
        names.assign,
        native(names.assign, |_s, pair| {
            let Value::Tuple(items) = pair else { unreachable!(":= argument shape guaranteed by the type checker") };
            let cell = expect_ref(items[0].clone());
            *cell.borrow_mut() = items[1].clone();
            Ok(Value::Unit)
        }),
    );

    table.insert(
        names.list_map,
        native2(names.list_map, |session, f, xs| {
            let items = expect_list(xs);
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(apply_value(session, f.clone(), item)?);
            }
            Ok(Value::list(out))
        }),
    );

    table.insert(
        names.list_filter,
        native2(names.list_filter, |session, f, xs| {
            let items = expect_list(xs);
            let mut out = Vec::new();
            for item in items {
                if expect_bool(apply_value(session, f.clone(), item.clone())?) {
                    out.push(item);
                }
            }
            Ok(Value::list(out))
        }),
    );

    table.insert(names.list_length, native(names.list_length, |_s, xs| Ok(Value::Int(expect_list(xs).len() as i64))));

    table.insert(
        names.list_concat_map,
        native2(names.list_concat_map, |session, f, xs| {
            let items = expect_list(xs);
            let mut out = Vec::new();
            for item in items {
                out.extend(expect_list(apply_value(session, f.clone(), item)?));
            }
            Ok(Value::list(out))
        }),
    );

    table.insert(
        names.list_foldl,
        native3(names.list_foldl, |session, step, init, xs| {
            let items = expect_list(xs);
            let mut acc = init;
            for item in items {
                acc = apply_value(session, step.clone(), Value::tuple(vec![item, acc]))?;
            }
            Ok(acc)
        }),
    );

    table.insert(
        names.list_distinct,
        native(names.list_distinct, |_s, xs| {
            let items = expect_list(xs);
            let mut out: Vec<Value> = Vec::new();
            for item in items {
                if !out.iter().any(|seen| value_eq(seen, &item)) {
                    out.push(item);
                }
            }
            Ok(Value::list(out))
        }),
    );

    table.insert(
        names.list_sort_by,
        native2(names.list_sort_by, |session, key_fn, xs| {
            let items = expect_list(xs);
            let mut keyed: Vec<(Value, Value)> = Vec::with_capacity(items.len());
            for item in items {
                let key = apply_value(session, key_fn.clone(), item.clone())?;
                keyed.push((key, item));
            }
            keyed.sort_by(|(ka, _), (kb, _)| cmp_value(ka, kb));
            Ok(Value::list(keyed.into_iter().map(|(_, v)| v).collect()))
        }),
    );

    table.insert(
        names.list_group_by,
        native3(names.list_group_by, |session, key_fn, agg_fn, xs| {
            let items = expect_list(xs);
            let mut groups: Vec<(Value, Vec<Value>)> = Vec::new();
            for item in items {
                let key = apply_value(session, key_fn.clone(), item.clone())?;
                match groups.iter_mut().find(|(k, _)| value_eq(k, &key)) {
                    Some((_, members)) => members.push(item),
                    None => groups.push((key, vec![item])),
                }
            }
            let mut out = Vec::with_capacity(groups.len());
            for (key, members) in groups {
                let aggregated = apply_value(session, agg_fn.clone(), Value::list(members))?;
                out.push(Value::tuple(vec![key, aggregated]));
            }
            Ok(Value::list(out))
        }),
    );

    table.insert(
        names.string_concat,
        native2(names.string_concat, |_s, a, b| Ok(Value::str(format!("{}{}", expect_str(a), expect_str(b))))),
    );

    table.insert(names.string_length, native(names.string_length, |_s, s| Ok(Value::Int(expect_str(s).chars().count() as i64))));

    table
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "tests use unwrap for brevity")]
mod tests {
    use super::*;
    use crate::compiler::apply_value;
    use crate::session::Session;

    fn as_ints(v: Value) -> Vec<i64> {
        expect_list(v)
            .into_iter()
            .map(|item| match item {
                Value::Int(i) => i,
                other => panic!("expected Int, got {other:?}"),
            })
            .collect()
    }

    /// A double-apply through `apply_value` is exactly how `Code::Apply`
    /// drives a curried two-argument builtin at runtime.
    fn call2(session: &mut Session, f: Value, a: Value, b: Value) -> Value {
        let partial = apply_value(session, f, a).unwrap();
        apply_value(session, partial, b).unwrap()
    }

    fn call3(session: &mut Session, f: Value, a: Value, b: Value, c: Value) -> Value {
        let partial = apply_value(session, f, a).unwrap();
        let partial = apply_value(session, partial, b).unwrap();
        apply_value(session, partial, c).unwrap()
    }

    fn identity(names: &WellKnownNames) -> Value {
        native(names.list_map, |_s, v| Ok(v))
    }

    #[test]
    fn ref_deref_and_assign_round_trip_through_a_cell() {
        let mut session = Session::new();
        let ref_ctor = session.names.ref_ctor;
        let deref_name = session.names.deref;
        let assign_name = session.names.assign;

        let cell = apply_value(&mut session, session.env().lookup(ref_ctor).unwrap(), Value::Int(1)).unwrap();
        let deref = |s: &mut Session, v: Value| apply_value(s, s.env().lookup(deref_name).unwrap(), v).unwrap();
        assert!(matches!(deref(&mut session, cell.clone()), Value::Int(1)));

        let assign = session.env().lookup(assign_name).unwrap();
        apply_value(&mut session, assign, Value::tuple(vec![cell.clone(), Value::Int(9)])).unwrap();
        assert!(matches!(deref(&mut session, cell), Value::Int(9)));
    }

    #[test]
    fn list_map_applies_the_function_to_every_element() {
        let mut session = Session::new();
        let f = native(session.names.list_map, |_s, v| match v {
            Value::Int(i) => Ok(Value::Int(i * 2)),
            other => panic!("expected Int, got {other:?}"),
        });
        let xs = Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let names = session.names.list_map;
        let result = call2(&mut session, session.env().lookup(names).unwrap(), f, xs);
        assert_eq!(as_ints(result), vec![2, 4, 6]);
    }

    #[test]
    fn list_filter_keeps_only_elements_the_predicate_accepts() {
        let mut session = Session::new();
        let pred = native(session.names.list_filter, |_s, v| match v {
            Value::Int(i) => Ok(Value::Bool(i % 2 == 0)),
            other => panic!("expected Int, got {other:?}"),
        });
        let xs = Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4)]);
        let name = session.names.list_filter;
        let result = call2(&mut session, session.env().lookup(name).unwrap(), pred, xs);
        assert_eq!(as_ints(result), vec![2, 4]);
    }

    #[test]
    fn list_length_counts_elements() {
        let mut session = Session::new();
        let xs = Value::list(vec![Value::Int(1), Value::Int(2)]);
        let name = session.names.list_length;
        let result = apply_value(&mut session, session.env().lookup(name).unwrap(), xs).unwrap();
        assert!(matches!(result, Value::Int(2)));
    }

    #[test]
    fn list_concat_map_flattens_the_per_element_lists() {
        let mut session = Session::new();
        let f = native(session.names.list_concat_map, |_s, v| match v {
            Value::Int(i) => Ok(Value::list(vec![Value::Int(i), Value::Int(i)])),
            other => panic!("expected Int, got {other:?}"),
        });
        let xs = Value::list(vec![Value::Int(1), Value::Int(2)]);
        let name = session.names.list_concat_map;
        let result = call2(&mut session, session.env().lookup(name).unwrap(), f, xs);
        assert_eq!(as_ints(result), vec![1, 1, 2, 2]);
    }

    #[test]
    fn list_foldl_accumulates_left_to_right() {
        let mut session = Session::new();
        let step = native(session.names.list_foldl, |_s, pair| {
            let Value::Tuple(items) = pair else { panic!("expected Tuple") };
            let (Value::Int(item), Value::Int(acc)) = (items[0].clone(), items[1].clone()) else {
                panic!("expected Int pair")
            };
            Ok(Value::Int(acc - item))
        });
        let xs = Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let name = session.names.list_foldl;
        let result = call3(&mut session, session.env().lookup(name).unwrap(), step, Value::Int(0), xs);
        assert!(matches!(result, Value::Int(-6)));
    }

    #[test]
    fn list_distinct_drops_structurally_equal_duplicates() {
        let mut session = Session::new();
        let xs = Value::list(vec![Value::Int(1), Value::Int(1), Value::Int(2)]);
        let name = session.names.list_distinct;
        let result = apply_value(&mut session, session.env().lookup(name).unwrap(), xs).unwrap();
        assert_eq!(as_ints(result), vec![1, 2]);
    }

    #[test]
    fn list_sort_by_orders_by_the_projected_key() {
        let mut session = Session::new();
        let key_fn = identity(&session.names);
        let xs = Value::list(vec![Value::Int(3), Value::Int(1), Value::Int(2)]);
        let name = session.names.list_sort_by;
        let result = call2(&mut session, session.env().lookup(name).unwrap(), key_fn, xs);
        assert_eq!(as_ints(result), vec![1, 2, 3]);
    }

    #[test]
    fn list_group_by_groups_then_aggregates_each_bucket() {
        let mut session = Session::new();
        let key_fn = native(session.names.list_group_by, |_s, v| match v {
            Value::Int(i) => Ok(Value::Int(i % 2)),
            other => panic!("expected Int, got {other:?}"),
        });
        let agg_fn = native(session.names.list_group_by, |_s, members| Ok(Value::Int(expect_list(members).len() as i64)));
        let xs = Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4), Value::Int(5)]);
        let name = session.names.list_group_by;
        let result = call3(&mut session, session.env().lookup(name).unwrap(), key_fn, agg_fn, xs);
        let groups = expect_list(result);
        assert_eq!(groups.len(), 2);
        for group in groups {
            let Value::Tuple(items) = group else { panic!("expected Tuple") };
            match (&items[0], &items[1]) {
                (Value::Int(1), Value::Int(3)) => {}
                (Value::Int(0), Value::Int(2)) => {}
                other => panic!("unexpected group {other:?}"),
            }
        }
    }

    #[test]
    fn string_concat_joins_both_strings() {
        let mut session = Session::new();
        let name = session.names.string_concat;
        let result = call2(&mut session, session.env().lookup(name).unwrap(), Value::str("foo"), Value::str("bar"));
        assert!(matches!(result, Value::Str(s) if &*s == "foobar"));
    }

    #[test]
    fn string_length_counts_chars_not_bytes() {
        let mut session = Session::new();
        let name = session.names.string_length;
        let result = apply_value(&mut session, session.env().lookup(name).unwrap(), Value::str("héllo")).unwrap();
        assert!(matches!(result, Value::Int(5)));
    }
}
