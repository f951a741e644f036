//! Capture-avoiding substitution and fixed-point inlining over Core IR
//! (spec §4.4), interleaved with a Core-level relationalizer retry (spec
//! §4.5) so a `from` pipeline that only became relational-shaped after a
//! `let` was inlined away still gets recognised.
//!
//! The Inliner never runs the evaluator and never consults types; it only
//! rewrites the arena in place, guided by [`crate::analyze::classify`] and
//! [`crate::analyze::is_small`].

use crate::analyze::{classify, is_small, tree_bound_names, Usage};
use crate::decision_tree::DecisionTree;
use crate::ir::{CanArena, CanDecl, CanExpr, CanId, CanonResult};
use crate::relationalize::try_recognize_core;
use rustc_hash::FxHashSet;
use weft_ir::{Name, StringInterner};

const MAX_PASSES: usize = 10;

struct Ctx<'a> {
    interner: &'a mut StringInterner,
    gensym_counter: u32,
}

impl<'a> Ctx<'a> {
    fn gensym(&mut self) -> Name {
        self.gensym_counter += 1;
        self.interner.intern(&format!("$inl{}", self.gensym_counter))
    }
}

/// Run inlining to a fixed point, bounded at [`MAX_PASSES`] in case two
/// bindings keep alternately exposing and hiding each other's use sites —
/// the bound is a safety net, not an expected outcome for well-formed
/// programs, which converge in a handful of passes.
pub fn optimize(result: &mut CanonResult, interner: &mut StringInterner) {
    let list_concat_map = interner.intern("List.concatMap");
    let mut ctx = Ctx { interner, gensym_counter: 0 };

    let mut passes = 0;
    for _ in 0..MAX_PASSES {
        passes += 1;
        let mut changed = false;

        if let Some(expr) = result.expr {
            result.expr = Some(inline_pass(&mut result.arena, expr, &mut ctx, &mut changed));
        }
        for decl in &mut result.decls {
            if let CanDecl::Value { rhs, .. } = decl {
                *rhs = inline_pass(&mut result.arena, *rhs, &mut ctx, &mut changed);
            }
        }

        if let Some(expr) = result.expr {
            if let Some(plan) = try_recognize_core(&result.arena, expr, list_concat_map) {
                let ty = result.arena.get(expr).ty;
                result.expr = Some(result.arena.push(CanExpr::Rel(plan), ty));
                changed = true;
            }
        }

        if !changed {
            break;
        }
    }

    tracing::debug!(passes, nodes = result.arena.len(), "inliner reached fixed point");
}

/// Rewrite `id`'s subtree bottom-up, inlining any `Let` whose bound name
/// qualifies (spec §4.4: `Once`/`OnceSafe`, or `Multi`/`MultiSafe` with a
/// small RHS) by substituting the RHS for every remaining occurrence and
/// dropping the `Let`.
fn inline_pass(arena: &mut CanArena, id: CanId, ctx: &mut Ctx, changed: &mut bool) -> CanId {
    let expr = arena.get(id).expr.clone();
    let new_expr = match expr {
        CanExpr::Literal(_) | CanExpr::Var(_) | CanExpr::Rel(_) => return id,
        CanExpr::Tuple(items) => CanExpr::Tuple(inline_each(arena, &items, ctx, changed)),
        CanExpr::List(items) => CanExpr::List(inline_each(arena, &items, ctx, changed)),
        CanExpr::Record(fields) => {
            let new_fields =
                fields.into_iter().map(|(n, v)| (n, inline_pass(arena, v, ctx, changed))).collect();
            CanExpr::Record(new_fields)
        }
        CanExpr::Apply(f, x) => {
            let f = inline_pass(arena, f, ctx, changed);
            let x = inline_pass(arena, x, ctx, changed);
            CanExpr::Apply(f, x)
        }
        CanExpr::PrimOp(op, l, r) => {
            let l = inline_pass(arena, l, ctx, changed);
            let r = inline_pass(arena, r, ctx, changed);
            CanExpr::PrimOp(op, l, r)
        }
        CanExpr::Fn(param, body) => {
            let body = inline_pass(arena, body, ctx, changed);
            CanExpr::Fn(param, body)
        }
        CanExpr::If(c, t, f) => {
            let c = inline_pass(arena, c, ctx, changed);
            let t = inline_pass(arena, t, ctx, changed);
            let f = inline_pass(arena, f, ctx, changed);
            CanExpr::If(c, t, f)
        }
        CanExpr::Raise(e) => CanExpr::Raise(inline_pass(arena, e, ctx, changed)),
        CanExpr::CtorApp(name, args) => CanExpr::CtorApp(name, inline_each(arena, &args, ctx, changed)),
        CanExpr::Project(inner, field) => CanExpr::Project(inline_pass(arena, inner, ctx, changed), field),
        CanExpr::TupleProject(inner, i) => CanExpr::TupleProject(inline_pass(arena, inner, ctx, changed), i),
        CanExpr::CtorProject(inner, i) => CanExpr::CtorProject(inline_pass(arena, inner, ctx, changed), i),
        CanExpr::Case(scrutinee, tree, bodies) => {
            let scrutinee = inline_pass(arena, scrutinee, ctx, changed);
            let bodies = inline_each(arena, &bodies, ctx, changed);
            CanExpr::Case(scrutinee, tree, bodies)
        }
        CanExpr::Handle(body, tree, bodies) => {
            let body = inline_pass(arena, body, ctx, changed);
            let bodies = inline_each(arena, &bodies, ctx, changed);
            CanExpr::Handle(body, tree, bodies)
        }
        CanExpr::Let { name, recursive, rhs, body } => {
            let rhs = inline_pass(arena, rhs, ctx, changed);
            let body = inline_pass(arena, body, ctx, changed);
            if recursive {
                // A self-recursive binding's own occurrences inside its RHS
                // would need to keep referring to the binding after
                // substitution, which plain substitution doesn't preserve —
                // leave recursive bindings in place.
                arena.set(id, CanExpr::Let { name, recursive, rhs, body });
                return id;
            }
            let usage = classify(arena, body, name);
            let eligible = match usage {
                Usage::Dead | Usage::Once | Usage::OnceSafe => true,
                Usage::Multi | Usage::MultiSafe => is_small(arena, rhs),
            };
            if !eligible {
                arena.set(id, CanExpr::Let { name, recursive, rhs, body });
                return id;
            }
            *changed = true;
            if matches!(usage, Usage::Dead) {
                return body;
            }
            let mut free = FxHashSet::default();
            free_vars(arena, rhs, &mut free);
            return subst(arena, body, name, rhs, &free, ctx);
        }
    };
    arena.set(id, new_expr);
    id
}

fn inline_each(arena: &mut CanArena, items: &[CanId], ctx: &mut Ctx, changed: &mut bool) -> Vec<CanId> {
    items.iter().map(|i| inline_pass(arena, *i, ctx, changed)).collect()
}

/// Free variables of `id`'s subtree, respecting shadowing. Guard
/// expressions in a `Case`/`Handle` arm are treated conservatively (not
/// pruned for that arm's own bindings) — over-approximating the free set
/// only causes extra alpha-renaming during substitution, never incorrect
/// capture.
fn free_vars(arena: &CanArena, id: CanId, out: &mut FxHashSet<Name>) {
    match &arena.get(id).expr {
        CanExpr::Literal(_) => {}
        CanExpr::Var(n) => {
            out.insert(*n);
        }
        CanExpr::Tuple(items) | CanExpr::List(items) => {
            for item in items {
                free_vars(arena, *item, out);
            }
        }
        CanExpr::Record(fields) => {
            for (_, v) in fields {
                free_vars(arena, *v, out);
            }
        }
        CanExpr::Apply(f, x) => {
            free_vars(arena, *f, out);
            free_vars(arena, *x, out);
        }
        CanExpr::PrimOp(_, l, r) => {
            free_vars(arena, *l, out);
            free_vars(arena, *r, out);
        }
        CanExpr::Let { name, recursive, rhs, body } => {
            let mut rhs_free = FxHashSet::default();
            free_vars(arena, *rhs, &mut rhs_free);
            if *recursive {
                rhs_free.remove(name);
            }
            out.extend(rhs_free);
            let mut body_free = FxHashSet::default();
            free_vars(arena, *body, &mut body_free);
            body_free.remove(name);
            out.extend(body_free);
        }
        CanExpr::Fn(param, body) => {
            let mut body_free = FxHashSet::default();
            free_vars(arena, *body, &mut body_free);
            body_free.remove(param);
            out.extend(body_free);
        }
        CanExpr::Case(scrutinee, tree, bodies) | CanExpr::Handle(scrutinee, tree, bodies) => {
            free_vars(arena, *scrutinee, out);
            for (i, body) in bodies.iter().enumerate() {
                let mut body_free = FxHashSet::default();
                free_vars(arena, *body, &mut body_free);
                let mut bound = Vec::new();
                tree_bound_names(tree, i, &mut bound);
                for b in bound {
                    body_free.remove(&b);
                }
                out.extend(body_free);
            }
            collect_guard_free_vars(arena, tree, out);
        }
        CanExpr::If(c, t, f) => {
            free_vars(arena, *c, out);
            free_vars(arena, *t, out);
            free_vars(arena, *f, out);
        }
        CanExpr::Raise(e) => free_vars(arena, *e, out),
        CanExpr::CtorApp(_, args) => {
            for a in args {
                free_vars(arena, *a, out);
            }
        }
        CanExpr::Project(inner, _) | CanExpr::TupleProject(inner, _) | CanExpr::CtorProject(inner, _) => {
            free_vars(arena, *inner, out);
        }
        CanExpr::Rel(_) => {}
    }
}

fn collect_guard_free_vars(arena: &CanArena, tree: &DecisionTree, out: &mut FxHashSet<Name>) {
    match tree {
        DecisionTree::Fail => {}
        DecisionTree::Leaf { guard, fallback, .. } => {
            if let Some(g) = guard {
                free_vars(arena, *g, out);
            }
            if let Some(f) = fallback {
                collect_guard_free_vars(arena, f, out);
            }
        }
        DecisionTree::Switch { cases, default, .. } => {
            for (_, t) in cases {
                collect_guard_free_vars(arena, t, out);
            }
            if let Some(d) = default {
                collect_guard_free_vars(arena, d, out);
            }
        }
    }
}

/// Substitute `replacement` for every free occurrence of `name` in `id`'s
/// subtree, alpha-renaming any binder along the way whose own name appears
/// in `repl_free` so it cannot capture a reference the substitution is
/// carrying in. Decision-tree-introduced pattern bindings are not
/// alpha-renamed even when they collide with `repl_free` — they are
/// positional projections out of the scrutinee, not closures that could
/// capture a free variable of `replacement`, so the only risk is a
/// shadowed name failing to see a substitution meant for some other
/// binding, which the shadow check below already prevents.
fn subst(arena: &mut CanArena, id: CanId, name: Name, replacement: CanId, repl_free: &FxHashSet<Name>, ctx: &mut Ctx) -> CanId {
    let ty = arena.get(id).ty;
    match arena.get(id).expr.clone() {
        CanExpr::Var(n) if n == name => replacement,
        CanExpr::Literal(_) | CanExpr::Var(_) | CanExpr::Rel(_) => id,
        CanExpr::Tuple(items) => {
            let items = items.into_iter().map(|i| subst(arena, i, name, replacement, repl_free, ctx)).collect();
            arena.push(CanExpr::Tuple(items), ty)
        }
        CanExpr::List(items) => {
            let items = items.into_iter().map(|i| subst(arena, i, name, replacement, repl_free, ctx)).collect();
            arena.push(CanExpr::List(items), ty)
        }
        CanExpr::Record(fields) => {
            let fields =
                fields.into_iter().map(|(n, v)| (n, subst(arena, v, name, replacement, repl_free, ctx))).collect();
            arena.push(CanExpr::Record(fields), ty)
        }
        CanExpr::Apply(f, x) => {
            let f = subst(arena, f, name, replacement, repl_free, ctx);
            let x = subst(arena, x, name, replacement, repl_free, ctx);
            arena.push(CanExpr::Apply(f, x), ty)
        }
        CanExpr::PrimOp(op, l, r) => {
            let l = subst(arena, l, name, replacement, repl_free, ctx);
            let r = subst(arena, r, name, replacement, repl_free, ctx);
            arena.push(CanExpr::PrimOp(op, l, r), ty)
        }
        CanExpr::If(c, t, f) => {
            let c = subst(arena, c, name, replacement, repl_free, ctx);
            let t = subst(arena, t, name, replacement, repl_free, ctx);
            let f = subst(arena, f, name, replacement, repl_free, ctx);
            arena.push(CanExpr::If(c, t, f), ty)
        }
        CanExpr::Raise(e) => {
            let e = subst(arena, e, name, replacement, repl_free, ctx);
            arena.push(CanExpr::Raise(e), ty)
        }
        CanExpr::CtorApp(ctor, args) => {
            let args = args.into_iter().map(|a| subst(arena, a, name, replacement, repl_free, ctx)).collect();
            arena.push(CanExpr::CtorApp(ctor, args), ty)
        }
        CanExpr::Project(inner, field) => {
            let inner = subst(arena, inner, name, replacement, repl_free, ctx);
            arena.push(CanExpr::Project(inner, field), ty)
        }
        CanExpr::TupleProject(inner, i) => {
            let inner = subst(arena, inner, name, replacement, repl_free, ctx);
            arena.push(CanExpr::TupleProject(inner, i), ty)
        }
        CanExpr::CtorProject(inner, i) => {
            let inner = subst(arena, inner, name, replacement, repl_free, ctx);
            arena.push(CanExpr::CtorProject(inner, i), ty)
        }
        CanExpr::Fn(param, body) => {
            if param == name {
                id
            } else if repl_free.contains(&param) {
                let fresh = ctx.gensym();
                let fresh_var = arena.push(CanExpr::Var(fresh), ty);
                let renamed = subst(arena, body, param, fresh_var, &FxHashSet::default(), ctx);
                let new_body = subst(arena, renamed, name, replacement, repl_free, ctx);
                arena.push(CanExpr::Fn(fresh, new_body), ty)
            } else {
                let new_body = subst(arena, body, name, replacement, repl_free, ctx);
                arena.push(CanExpr::Fn(param, new_body), ty)
            }
        }
        CanExpr::Let { name: bound, recursive, rhs, body } => {
            let new_rhs = if recursive && bound == name {
                rhs
            } else {
                subst(arena, rhs, name, replacement, repl_free, ctx)
            };
            if bound == name {
                arena.push(CanExpr::Let { name: bound, recursive, rhs: new_rhs, body }, ty)
            } else if repl_free.contains(&bound) {
                let fresh = ctx.gensym();
                let fresh_var = arena.push(CanExpr::Var(fresh), ty);
                let renamed_body = subst(arena, body, bound, fresh_var, &FxHashSet::default(), ctx);
                let new_body = subst(arena, renamed_body, name, replacement, repl_free, ctx);
                arena.push(CanExpr::Let { name: fresh, recursive, rhs: new_rhs, body: new_body }, ty)
            } else {
                let new_body = subst(arena, body, name, replacement, repl_free, ctx);
                arena.push(CanExpr::Let { name: bound, recursive, rhs: new_rhs, body: new_body }, ty)
            }
        }
        CanExpr::Case(scrutinee, tree, bodies) => {
            let scrutinee = subst(arena, scrutinee, name, replacement, repl_free, ctx);
            let new_tree = subst_tree(arena, tree, name, replacement, repl_free, ctx);
            let new_bodies = bodies
                .iter()
                .enumerate()
                .map(|(i, b)| {
                    if arm_binds(&new_tree, i, name) {
                        *b
                    } else {
                        subst(arena, *b, name, replacement, repl_free, ctx)
                    }
                })
                .collect();
            arena.push(CanExpr::Case(scrutinee, new_tree, new_bodies), ty)
        }
        CanExpr::Handle(body, tree, bodies) => {
            let body = subst(arena, body, name, replacement, repl_free, ctx);
            let new_tree = subst_tree(arena, tree, name, replacement, repl_free, ctx);
            let new_bodies = bodies
                .iter()
                .enumerate()
                .map(|(i, b)| {
                    if arm_binds(&new_tree, i, name) {
                        *b
                    } else {
                        subst(arena, *b, name, replacement, repl_free, ctx)
                    }
                })
                .collect();
            arena.push(CanExpr::Handle(body, new_tree, new_bodies), ty)
        }
    }
}

fn arm_binds(tree: &DecisionTree, arm_idx: usize, name: Name) -> bool {
    let mut bound = Vec::new();
    tree_bound_names(tree, arm_idx, &mut bound);
    bound.contains(&name)
}

/// Substitute into a decision tree's guard expressions, skipping a leaf's
/// guard when that leaf's own bindings shadow `name`.
fn subst_tree(
    arena: &mut CanArena,
    tree: DecisionTree,
    name: Name,
    replacement: CanId,
    repl_free: &FxHashSet<Name>,
    ctx: &mut Ctx,
) -> DecisionTree {
    match tree {
        DecisionTree::Fail => DecisionTree::Fail,
        DecisionTree::Leaf { arm, bindings, guard, fallback } => {
            let shadowed = bindings.iter().any(|(n, _)| *n == name);
            let guard = if shadowed { guard } else { guard.map(|g| subst(arena, g, name, replacement, repl_free, ctx)) };
            let fallback = fallback.map(|f| Box::new(subst_tree(arena, *f, name, replacement, repl_free, ctx)));
            DecisionTree::Leaf { arm, bindings, guard, fallback }
        }
        DecisionTree::Switch { occurrence, cases, default } => {
            let cases = cases
                .into_iter()
                .map(|(t, sub)| (t, subst_tree(arena, sub, name, replacement, repl_free, ctx)))
                .collect();
            let default = default.map(|d| Box::new(subst_tree(arena, *d, name, replacement, repl_free, ctx)));
            DecisionTree::Switch { occurrence, cases, default }
        }
    }
}
