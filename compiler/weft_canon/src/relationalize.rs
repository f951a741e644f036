//! Recognising `from`-comprehension pipelines as relational-algebra plans
//! (spec §4.5), so an external `RelBuilder` (or the evaluator's in-memory
//! fallback) can execute them without going through the tree-walking
//! interpreter a step at a time.
//!
//! This is a best-effort rewrite, not a total one: a pipeline only becomes
//! a [`RelExpr`] when every source is itself relational-shaped and every
//! predicate is pure — no `ref`/`!`/`:=`, no `raise` that could escape a
//! `where` clause. Anything that doesn't qualify is left as ordinary Core
//! and falls back to the tree-walking evaluator (spec §4.7) untouched.

use crate::ir::{CanArena, CanExpr, CanId};
use weft_infer::{TypedExpr, TypedExprKind};
use weft_ir::Name;

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum AggregateOp {
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

#[derive(Clone, Debug)]
pub enum RelExpr {
    /// One `from pat in source` generator, not yet filtered or projected.
    Scan { row_var: Name, source: CanId },
    Filter { input: Box<RelExpr>, predicate: CanId },
    /// `yield expr`, evaluated once per row of `input`.
    Project { input: Box<RelExpr>, expr: CanId },
    /// A second `from` generator in the same pipeline. Left as a bare
    /// cross product; an equi-join condition, when one exists, shows up
    /// as a `Filter` stacked on top, mirroring how the surface syntax
    /// itself never distinguishes the two.
    Join { left: Box<RelExpr>, right: Box<RelExpr> },
    Union { left: Box<RelExpr>, right: Box<RelExpr> },
    /// Recognised only when the Resolver already lowered a `List.groupBy`
    /// call wrapping this pipeline (SPEC_FULL.md §4.5 supplement).
    /// `key_fn`/`agg_fn` are ordinary closures evaluated over materialised
    /// rows; this pass does not decompose them further.
    GroupBy { input: Box<RelExpr>, key_fn: CanId, agg_fn: CanId },
    Aggregate { input: Box<RelExpr>, op: AggregateOp, field_fn: CanId },
    /// Recognised when a `List.distinct` call wraps the pipeline.
    Distinct { input: Box<RelExpr> },
    /// Recognised from a trailing `order` clause, or a wrapping
    /// `List.sortBy` call; ascending only, since the typed AST carries no
    /// per-key direction (see `weft_infer::TypedFromClause::OrderBy`).
    OrderBy { input: Box<RelExpr>, key_fn: CanId },
}

impl RelExpr {
    #[must_use]
    pub fn scan(row_var: Name, source: CanId) -> Self {
        RelExpr::Scan { row_var, source }
    }

    #[must_use]
    pub fn filter(self, predicate: CanId) -> Self {
        RelExpr::Filter { input: Box::new(self), predicate }
    }

    #[must_use]
    pub fn project(self, expr: CanId) -> Self {
        RelExpr::Project { input: Box::new(self), expr }
    }

    #[must_use]
    pub fn join(self, other: RelExpr) -> Self {
        RelExpr::Join { left: Box::new(self), right: Box::new(other) }
    }

    #[must_use]
    pub fn union(self, other: RelExpr) -> Self {
        RelExpr::Union { left: Box::new(self), right: Box::new(other) }
    }

    #[must_use]
    pub fn group_by(self, key_fn: CanId, agg_fn: CanId) -> Self {
        RelExpr::GroupBy { input: Box::new(self), key_fn, agg_fn }
    }

    #[must_use]
    pub fn aggregate(self, op: AggregateOp, field_fn: CanId) -> Self {
        RelExpr::Aggregate { input: Box::new(self), op, field_fn }
    }

    #[must_use]
    pub fn distinct(self) -> Self {
        RelExpr::Distinct { input: Box::new(self) }
    }

    #[must_use]
    pub fn order_by(self, key_fn: CanId) -> Self {
        RelExpr::OrderBy { input: Box::new(self), key_fn }
    }
}

/// Recognise a wrapping builtin call against one of the library names the
/// Relationalizer is allowed to fold into a relational node (spec
/// supplement: `List.distinct`, `List.sortBy`, `List.groupBy`).
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum BuiltinWrap {
    Distinct,
    SortBy,
    GroupBy,
}

#[must_use]
pub fn recognize_wrapper(name: Name, list_distinct: Name, list_sort_by: Name, list_group_by: Name) -> Option<BuiltinWrap> {
    if name == list_distinct {
        Some(BuiltinWrap::Distinct)
    } else if name == list_sort_by {
        Some(BuiltinWrap::SortBy)
    } else if name == list_group_by {
        Some(BuiltinWrap::GroupBy)
    } else {
        None
    }
}

/// Whether `expr` is pure enough to appear as a `where`/`yield` subterm in
/// a relational plan: no mutable-reference operations and no `raise` that
/// could otherwise escape to a `handle` outside the comprehension.
#[must_use]
pub fn is_pure(expr: &TypedExpr, impure_idents: &[Name]) -> bool {
    match &expr.kind {
        TypedExprKind::Raise(_) => false,
        TypedExprKind::Literal(_) | TypedExprKind::Ident(_) => {
            !matches!(&expr.kind, TypedExprKind::Ident(name) if impure_idents.contains(name))
        }
        TypedExprKind::Tuple(items) | TypedExprKind::List(items) => items.iter().all(|e| is_pure(e, impure_idents)),
        TypedExprKind::Record(fields) => fields.iter().all(|(_, e)| is_pure(e, impure_idents)),
        TypedExprKind::Apply(f, x) => is_pure(f, impure_idents) && is_pure(x, impure_idents),
        TypedExprKind::Infix(_, l, r) => is_pure(l, impure_idents) && is_pure(r, impure_idents),
        TypedExprKind::If(c, t, f) => is_pure(c, impure_idents) && is_pure(t, impure_idents) && is_pure(f, impure_idents),
        TypedExprKind::Project(inner, _) => is_pure(inner, impure_idents),
        TypedExprKind::Let(_, _)
        | TypedExprKind::Fn(_, _)
        | TypedExprKind::Case(_, _)
        | TypedExprKind::Handle(_, _)
        | TypedExprKind::From(_) => false,
    }
}

/// A second attempt at recognising a relational plan, run over Core IR
/// itself after inlining (spec §4.4 "interleaved with the relationalizer").
/// A `from` pipeline that wasn't relational-shaped at lowering time — e.g.
/// its source was a `let`-bound name, not yet visible as a list literal —
/// can become recognisable once the Inliner has substituted that binding
/// away. This mirrors `lower.rs`'s `lower_from_rest` fallback shape
/// structurally, in reverse: `List.concatMap (fn p => rest) source`
/// becomes a `Scan`, `if cond then rest else []` becomes a `Filter`, and a
/// trailing singleton list becomes the final `Project`.
#[must_use]
pub fn try_recognize_core(arena: &CanArena, id: CanId, list_concat_map: Name) -> Option<RelExpr> {
    recognize_core(arena, id, list_concat_map, None)
}

fn recognize_core(arena: &CanArena, id: CanId, concat_map: Name, current: Option<RelExpr>) -> Option<RelExpr> {
    match &arena.get(id).expr {
        CanExpr::List(items) if items.len() == 1 => Some(current?.project(items[0])),
        CanExpr::If(cond, then_id, else_id) => {
            if !matches!(&arena.get(*else_id).expr, CanExpr::List(items) if items.is_empty()) {
                return None;
            }
            let plan = current?.filter(*cond);
            recognize_core(arena, *then_id, concat_map, Some(plan))
        }
        CanExpr::Apply(applied_fn, source_id) => {
            let CanExpr::Apply(callee, lambda_id) = &arena.get(*applied_fn).expr else { return None };
            let CanExpr::Var(name) = &arena.get(*callee).expr else { return None };
            if *name != concat_map {
                return None;
            }
            let CanExpr::Fn(param, body_id) = &arena.get(*lambda_id).expr else { return None };
            let scan = RelExpr::scan(*param, *source_id);
            let next = Some(match current {
                None => scan,
                Some(prev) => prev.join(scan),
            });
            recognize_core(arena, *body_id, concat_map, next)
        }
        _ => None,
    }
}
