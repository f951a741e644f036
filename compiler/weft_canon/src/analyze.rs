//! Usage analysis for Core declaration bindings (spec §4.4): for a bound
//! name, count its occurrences within scope and note whether any occurrence
//! is unconditionally evaluated (not nested under a lambda) — the Inliner
//! uses this, plus a size estimate of the RHS, to decide what to fold in.

use crate::decision_tree::DecisionTree;
use crate::ir::{CanArena, CanExpr, CanId};
use crate::relationalize::RelExpr;
use weft_ir::Name;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Usage {
    /// No occurrences; the binding can be dropped.
    Dead,
    /// Exactly one occurrence, evaluated unconditionally — always safe to
    /// substitute, since inlining changes neither the number nor the order
    /// of evaluations.
    Once,
    /// Exactly one occurrence, but only reachable through a lambda body —
    /// substituting duplicates no eager work, but may duplicate code.
    OnceSafe,
    /// More than one occurrence, with at least one reachable without going
    /// through a lambda — substituting would duplicate eager work.
    Multi,
    /// More than one occurrence, all reachable only through a lambda body.
    MultiSafe,
}

/// A rough size/purity estimate for an RHS (spec §4.4 "small": "constants,
/// variables, constructor of atoms, or a lambda referenced only in call
/// position"). Call-position-only is checked by the inliner itself, since
/// it requires knowing the use site; this only covers the RHS shape.
#[must_use]
pub fn is_small(arena: &CanArena, id: CanId) -> bool {
    match &arena.get(id).expr {
        CanExpr::Literal(_) | CanExpr::Var(_) => true,
        CanExpr::CtorApp(_, args) => args.iter().all(|a| is_atom(arena, *a)),
        CanExpr::Tuple(items) => items.iter().all(|a| is_atom(arena, *a)),
        CanExpr::Fn(_, _) => true,
        _ => false,
    }
}

fn is_atom(arena: &CanArena, id: CanId) -> bool {
    matches!(arena.get(id).expr, CanExpr::Literal(_) | CanExpr::Var(_))
}

struct Count {
    total: usize,
    any_eager: bool,
}

/// Classify how `name` (bound to `rhs`) is used within `scope`.
#[must_use]
pub fn classify(arena: &CanArena, scope: CanId, name: Name) -> Usage {
    let mut c = Count { total: 0, any_eager: false };
    walk(arena, scope, name, false, &mut c);
    match (c.total, c.any_eager) {
        (0, _) => Usage::Dead,
        (1, true) => Usage::Once,
        (1, false) => Usage::OnceSafe,
        (_, true) => Usage::Multi,
        (_, false) => Usage::MultiSafe,
    }
}

fn walk(arena: &CanArena, id: CanId, name: Name, under_lambda: bool, c: &mut Count) {
    match &arena.get(id).expr {
        CanExpr::Literal(_) => {}
        CanExpr::Var(n) => {
            if *n == name {
                c.total += 1;
                c.any_eager |= !under_lambda;
            }
        }
        CanExpr::Tuple(items) | CanExpr::List(items) => {
            for item in items {
                walk(arena, *item, name, under_lambda, c);
            }
        }
        CanExpr::Record(fields) => {
            for (_, v) in fields {
                walk(arena, *v, name, under_lambda, c);
            }
        }
        CanExpr::Apply(f, x) => {
            walk(arena, *f, name, under_lambda, c);
            walk(arena, *x, name, under_lambda, c);
        }
        CanExpr::PrimOp(_, l, r) => {
            walk(arena, *l, name, under_lambda, c);
            walk(arena, *r, name, under_lambda, c);
        }
        CanExpr::Let { name: bound, recursive, rhs, body } => {
            let shadows_rhs = *recursive && *bound == name;
            if !shadows_rhs {
                walk(arena, *rhs, name, under_lambda, c);
            }
            if *bound != name {
                walk(arena, *body, name, under_lambda, c);
            }
        }
        CanExpr::Fn(param, body) => {
            if *param != name {
                walk(arena, *body, name, true, c);
            }
        }
        CanExpr::Case(scrutinee, tree, bodies) | CanExpr::Handle(scrutinee, tree, bodies) => {
            walk(arena, *scrutinee, name, under_lambda, c);
            for (i, body) in bodies.iter().enumerate() {
                if !tree_binds(tree, i, name) {
                    walk(arena, *body, name, under_lambda, c);
                }
            }
            walk_tree_guards(arena, tree, name, under_lambda, c);
        }
        CanExpr::If(cond, t, f) => {
            walk(arena, *cond, name, under_lambda, c);
            walk(arena, *t, name, under_lambda, c);
            walk(arena, *f, name, under_lambda, c);
        }
        CanExpr::Raise(e) => walk(arena, *e, name, under_lambda, c),
        CanExpr::CtorApp(_, args) => {
            for arg in args {
                walk(arena, *arg, name, under_lambda, c);
            }
        }
        CanExpr::Project(inner, _) | CanExpr::TupleProject(inner, _) | CanExpr::CtorProject(inner, _) => {
            walk(arena, *inner, name, under_lambda, c);
        }
        CanExpr::Rel(plan) => walk_rel(arena, plan, name, under_lambda, c),
    }
}

/// A [`RelExpr`]'s fields are ordinary `CanId`s and nested plans, none of
/// which introduce new bindings, so this mirrors `walk` directly.
fn walk_rel(arena: &CanArena, plan: &RelExpr, name: Name, under_lambda: bool, c: &mut Count) {
    match plan {
        RelExpr::Scan { source, .. } => walk(arena, *source, name, under_lambda, c),
        RelExpr::Filter { input, predicate } => {
            walk_rel(arena, input, name, under_lambda, c);
            walk(arena, *predicate, name, under_lambda, c);
        }
        RelExpr::Project { input, expr } => {
            walk_rel(arena, input, name, under_lambda, c);
            walk(arena, *expr, name, under_lambda, c);
        }
        RelExpr::Join { left, right } | RelExpr::Union { left, right } => {
            walk_rel(arena, left, name, under_lambda, c);
            walk_rel(arena, right, name, under_lambda, c);
        }
        RelExpr::GroupBy { input, key_fn, agg_fn } => {
            walk_rel(arena, input, name, under_lambda, c);
            walk(arena, *key_fn, name, under_lambda, c);
            walk(arena, *agg_fn, name, under_lambda, c);
        }
        RelExpr::Aggregate { input, field_fn, .. } => {
            walk_rel(arena, input, name, under_lambda, c);
            walk(arena, *field_fn, name, under_lambda, c);
        }
        RelExpr::Distinct { input } => walk_rel(arena, input, name, under_lambda, c),
        RelExpr::OrderBy { input, key_fn } => {
            walk_rel(arena, input, name, under_lambda, c);
            walk(arena, *key_fn, name, under_lambda, c);
        }
    }
}

/// Whether any leaf belonging to match arm `arm_idx` binds `name`,
/// shadowing it for that arm's body.
pub(crate) fn tree_binds(tree: &DecisionTree, arm_idx: usize, name: Name) -> bool {
    match tree {
        DecisionTree::Fail => false,
        DecisionTree::Leaf { arm, bindings, fallback, .. } => {
            (*arm == arm_idx && bindings.iter().any(|(n, _)| *n == name))
                || fallback.as_deref().is_some_and(|f| tree_binds(f, arm_idx, name))
        }
        DecisionTree::Switch { cases, default, .. } => {
            cases.iter().any(|(_, t)| tree_binds(t, arm_idx, name))
                || default.as_deref().is_some_and(|d| tree_binds(d, arm_idx, name))
        }
    }
}

/// All names bound anywhere for match arm `arm_idx`, used by the inliner
/// to know which free variables a substituted arm body would shadow.
pub(crate) fn tree_bound_names(tree: &DecisionTree, arm_idx: usize, out: &mut Vec<Name>) {
    match tree {
        DecisionTree::Fail => {}
        DecisionTree::Leaf { arm, bindings, fallback, .. } => {
            if *arm == arm_idx {
                out.extend(bindings.iter().map(|(n, _)| *n));
            }
            if let Some(f) = fallback.as_deref() {
                tree_bound_names(f, arm_idx, out);
            }
        }
        DecisionTree::Switch { cases, default, .. } => {
            for (_, t) in cases {
                tree_bound_names(t, arm_idx, out);
            }
            if let Some(d) = default.as_deref() {
                tree_bound_names(d, arm_idx, out);
            }
        }
    }
}

fn walk_tree_guards(arena: &CanArena, tree: &DecisionTree, name: Name, under_lambda: bool, c: &mut Count) {
    match tree {
        DecisionTree::Fail => {}
        DecisionTree::Leaf { guard, fallback, bindings, .. } => {
            if let Some(g) = guard {
                if !bindings.iter().any(|(n, _)| *n == name) {
                    walk(arena, *g, name, under_lambda, c);
                }
            }
            if let Some(f) = fallback {
                walk_tree_guards(arena, f, name, under_lambda, c);
            }
        }
        DecisionTree::Switch { cases, default, .. } => {
            for (_, t) in cases {
                walk_tree_guards(arena, t, name, under_lambda, c);
            }
            if let Some(d) = default {
                walk_tree_guards(arena, d, name, under_lambda, c);
            }
        }
    }
}
