//! Initial type environment: built-in values and the bundled standard
//! library's schemes (spec §3 "Builtins"; operators themselves are handled
//! directly in [`crate::infer::TypeResolver`] rather than through this
//! table, since they are syntax, not identifiers).

use crate::env::TypeEnv;
use weft_ir::StringInterner;
use weft_types::{Pool, TypeData, TypeScheme, UnifyEngine};

/// Populate `interner` with every built-in name and return the environment
/// binding each to its scheme. Called once when a `Session` starts.
pub fn prelude(pool: &mut Pool, interner: &mut StringInterner) -> TypeEnv {
    let mut engine = UnifyEngine::new(pool);
    let mut env = TypeEnv::empty();

    // `List.map : ('a -> 'b) -> 'a list -> 'b list`
    {
        engine.enter_scope();
        let a = engine.fresh_var(false);
        let b = engine.fresh_var(false);
        let list_a = engine.pool_mut().intern(TypeData::List(a));
        let list_b = engine.pool_mut().intern(TypeData::List(b));
        let fn_ty = engine.pool_mut().intern(TypeData::Fun(a, b));
        let inner = engine.pool_mut().intern(TypeData::Fun(list_a, list_b));
        let full = engine.pool_mut().intern(TypeData::Fun(fn_ty, inner));
        let scheme = engine.generalize(full, engine.current_rank());
        engine.exit_scope();
        let name = interner.intern("List.map");
        env = env.bind(name, scheme);
    }

    // `List.filter : ('a -> bool) -> 'a list -> 'a list`
    {
        engine.enter_scope();
        let a = engine.fresh_var(false);
        let list_a = engine.pool_mut().intern(TypeData::List(a));
        let bool_ty = engine.pool().bool();
        let pred_ty = engine.pool_mut().intern(TypeData::Fun(a, bool_ty));
        let inner = engine.pool_mut().intern(TypeData::Fun(list_a, list_a));
        let full = engine.pool_mut().intern(TypeData::Fun(pred_ty, inner));
        let scheme = engine.generalize(full, engine.current_rank());
        engine.exit_scope();
        let name = interner.intern("List.filter");
        env = env.bind(name, scheme);
    }

    // `List.length : 'a list -> int`
    {
        engine.enter_scope();
        let a = engine.fresh_var(false);
        let list_a = engine.pool_mut().intern(TypeData::List(a));
        let int_ty = engine.pool().int();
        let full = engine.pool_mut().intern(TypeData::Fun(list_a, int_ty));
        let scheme = engine.generalize(full, engine.current_rank());
        engine.exit_scope();
        let name = interner.intern("List.length");
        env = env.bind(name, scheme);
    }

    // `List.foldl : ('a * 'b -> 'b) -> 'b -> 'a list -> 'b`
    {
        engine.enter_scope();
        let a = engine.fresh_var(false);
        let b = engine.fresh_var(false);
        let pair = engine.pool_mut().intern(TypeData::Tuple(vec![a, b]));
        let step = engine.pool_mut().intern(TypeData::Fun(pair, b));
        let list_a = engine.pool_mut().intern(TypeData::List(a));
        let inner2 = engine.pool_mut().intern(TypeData::Fun(list_a, b));
        let inner1 = engine.pool_mut().intern(TypeData::Fun(b, inner2));
        let full = engine.pool_mut().intern(TypeData::Fun(step, inner1));
        let scheme = engine.generalize(full, engine.current_rank());
        engine.exit_scope();
        let name = interner.intern("List.foldl");
        env = env.bind(name, scheme);
    }

    // `List.concatMap : ('a -> 'b list) -> 'a list -> 'b list`
    {
        engine.enter_scope();
        let a = engine.fresh_var(false);
        let b = engine.fresh_var(false);
        let list_a = engine.pool_mut().intern(TypeData::List(a));
        let list_b = engine.pool_mut().intern(TypeData::List(b));
        let fn_ty = engine.pool_mut().intern(TypeData::Fun(a, list_b));
        let inner = engine.pool_mut().intern(TypeData::Fun(list_a, list_b));
        let full = engine.pool_mut().intern(TypeData::Fun(fn_ty, inner));
        let scheme = engine.generalize(full, engine.current_rank());
        engine.exit_scope();
        let name = interner.intern("List.concatMap");
        env = env.bind(name, scheme);
    }

    // `List.distinct : ''a list -> ''a list` — `''a` carries the equality
    // constraint `value_eq` enforces at runtime.
    {
        engine.enter_scope();
        let a = engine.fresh_var(true);
        let list_a = engine.pool_mut().intern(TypeData::List(a));
        let full = engine.pool_mut().intern(TypeData::Fun(list_a, list_a));
        let scheme = engine.generalize(full, engine.current_rank());
        engine.exit_scope();
        let name = interner.intern("List.distinct");
        env = env.bind(name, scheme);
    }

    // `List.sortBy : ('a -> 'b) -> 'a list -> 'a list`
    {
        engine.enter_scope();
        let a = engine.fresh_var(false);
        let b = engine.fresh_var(false);
        let list_a = engine.pool_mut().intern(TypeData::List(a));
        let key_ty = engine.pool_mut().intern(TypeData::Fun(a, b));
        let inner = engine.pool_mut().intern(TypeData::Fun(list_a, list_a));
        let full = engine.pool_mut().intern(TypeData::Fun(key_ty, inner));
        let scheme = engine.generalize(full, engine.current_rank());
        engine.exit_scope();
        let name = interner.intern("List.sortBy");
        env = env.bind(name, scheme);
    }

    // `List.groupBy : ('a -> ''b) -> ('a list -> 'c) -> 'a list -> (''b * 'c) list`
    {
        engine.enter_scope();
        let a = engine.fresh_var(false);
        let b = engine.fresh_var(true);
        let c = engine.fresh_var(false);
        let list_a = engine.pool_mut().intern(TypeData::List(a));
        let key_ty = engine.pool_mut().intern(TypeData::Fun(a, b));
        let agg_ty = engine.pool_mut().intern(TypeData::Fun(list_a, c));
        let pair = engine.pool_mut().intern(TypeData::Tuple(vec![b, c]));
        let result_list = engine.pool_mut().intern(TypeData::List(pair));
        let inner2 = engine.pool_mut().intern(TypeData::Fun(list_a, result_list));
        let inner1 = engine.pool_mut().intern(TypeData::Fun(agg_ty, inner2));
        let full = engine.pool_mut().intern(TypeData::Fun(key_ty, inner1));
        let scheme = engine.generalize(full, engine.current_rank());
        engine.exit_scope();
        let name = interner.intern("List.groupBy");
        env = env.bind(name, scheme);
    }

    // `String.concat : string -> string -> string`
    {
        let string_ty = engine.pool().string();
        let inner = engine.pool_mut().intern(TypeData::Fun(string_ty, string_ty));
        let full = engine.pool_mut().intern(TypeData::Fun(string_ty, inner));
        let name = interner.intern("String.concat");
        env = env.bind(name, TypeScheme::mono(full));
    }

    // `String.length : string -> int`
    {
        let string_ty = engine.pool().string();
        let int_ty = engine.pool().int();
        let full = engine.pool_mut().intern(TypeData::Fun(string_ty, int_ty));
        let name = interner.intern("String.length");
        env = env.bind(name, TypeScheme::mono(full));
    }

    // `ref : 'a -> 'a ref`, `! : 'a ref -> 'a`, `:= : 'a ref * 'a -> unit`.
    // `ref` is modelled as an ordinary parametric data constructor (spec
    // §4.2 "ref allocation is recognised structurally, not as a keyword") —
    // its constructor scheme is installed by the registry, not here.
    {
        engine.enter_scope();
        let a = engine.fresh_var(false);
        let ref_a = engine.pool_mut().intern(TypeData::Data(interner.intern("ref"), vec![a]));
        let deref_ty = engine.pool_mut().intern(TypeData::Fun(ref_a, a));
        let scheme = engine.generalize(deref_ty, engine.current_rank());
        let name = interner.intern("!");
        env = env.bind(name, scheme);
        engine.exit_scope();
    }
    {
        engine.enter_scope();
        let a = engine.fresh_var(false);
        let ref_a = engine.pool_mut().intern(TypeData::Data(interner.intern("ref"), vec![a]));
        let pair = engine.pool_mut().intern(TypeData::Tuple(vec![ref_a, a]));
        let unit_ty = engine.pool().unit();
        let assign_ty = engine.pool_mut().intern(TypeData::Fun(pair, unit_ty));
        let scheme = engine.generalize(assign_ty, engine.current_rank());
        let name = interner.intern(":=");
        env = env.bind(name, scheme);
        engine.exit_scope();
    }

    env
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "tests use unwrap for brevity")]
mod tests {
    use super::*;
    use crate::infer::TypeResolver;
    use weft_diagnostic::Warnings;
    use weft_ir::{Expr, ExprKind, Literal, Pattern, PatternKind, Pos};
    use weft_types::{moniker, DataTypeRegistry, Idx};

    fn ident(interner: &mut StringInterner, name: &str) -> Expr {
        Expr { kind: ExprKind::Ident(interner.intern(name)), pos: Pos::DUMMY }
    }

    fn apply(f: Expr, x: Expr) -> Expr {
        Expr { kind: ExprKind::Apply(Box::new(f), Box::new(x)), pos: Pos::DUMMY }
    }

    fn int_list(items: Vec<i64>) -> Expr {
        Expr { kind: ExprKind::List(items.into_iter().map(|n| Expr { kind: ExprKind::Literal(Literal::Int(n)), pos: Pos::DUMMY }).collect()), pos: Pos::DUMMY }
    }

    fn identity_fn(interner: &mut StringInterner) -> Expr {
        let x = interner.intern("x");
        Expr {
            kind: ExprKind::Fn(
                Box::new(Pattern { kind: PatternKind::Var(x), pos: Pos::DUMMY }),
                Box::new(Expr { kind: ExprKind::Ident(x), pos: Pos::DUMMY }),
            ),
            pos: Pos::DUMMY,
        }
    }

    fn infer(pool: &mut Pool, interner: &StringInterner, env: &TypeEnv, expr: &Expr) -> Idx {
        let mut registry = DataTypeRegistry::new();
        let mut warnings = Warnings::default();
        let mut resolver = TypeResolver { engine: UnifyEngine::new(pool), registry: &mut registry, interner, warnings: &mut warnings };
        resolver.infer_expr(expr, env).unwrap().ty
    }

    #[test]
    fn list_distinct_type_checks_against_a_list_literal() {
        let mut pool = Pool::new();
        let mut interner = StringInterner::new();
        let env = prelude(&mut pool, &mut interner);
        let expr = apply(ident(&mut interner, "List.distinct"), int_list(vec![1, 2, 2]));
        let ty = infer(&mut pool, &interner, &env, &expr);
        assert_eq!(moniker(&mut pool, ty, &interner), "int list");
    }

    #[test]
    fn list_sort_by_type_checks_with_a_key_function() {
        let mut pool = Pool::new();
        let mut interner = StringInterner::new();
        let env = prelude(&mut pool, &mut interner);
        let key_fn = identity_fn(&mut interner);
        let expr = apply(apply(ident(&mut interner, "List.sortBy"), key_fn), int_list(vec![3, 1, 2]));
        let ty = infer(&mut pool, &interner, &env, &expr);
        assert_eq!(moniker(&mut pool, ty, &interner), "int list");
    }

    #[test]
    fn list_group_by_type_checks_with_key_and_aggregate_functions() {
        let mut pool = Pool::new();
        let mut interner = StringInterner::new();
        let env = prelude(&mut pool, &mut interner);
        let key_fn = identity_fn(&mut interner);
        let agg_fn = ident(&mut interner, "List.length");
        let expr = apply(apply(apply(ident(&mut interner, "List.groupBy"), key_fn), agg_fn), int_list(vec![1, 2, 3]));
        let ty = infer(&mut pool, &interner, &env, &expr);
        assert_eq!(moniker(&mut pool, ty, &interner), "(int * int) list");
    }

    #[test]
    fn list_concat_map_type_checks_with_a_list_producing_function() {
        let mut pool = Pool::new();
        let mut interner = StringInterner::new();
        let env = prelude(&mut pool, &mut interner);
        let x = interner.intern("x");
        let doubler = Expr {
            kind: ExprKind::Fn(
                Box::new(Pattern { kind: PatternKind::Var(x), pos: Pos::DUMMY }),
                Box::new(Expr { kind: ExprKind::List(vec![Expr { kind: ExprKind::Ident(x), pos: Pos::DUMMY }]), pos: Pos::DUMMY }),
            ),
            pos: Pos::DUMMY,
        };
        let expr = apply(apply(ident(&mut interner, "List.concatMap"), doubler), int_list(vec![1, 2]));
        let ty = infer(&mut pool, &interner, &env, &expr);
        assert_eq!(moniker(&mut pool, ty, &interner), "int list");
    }
}
