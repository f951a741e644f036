//! Lowering the typed surface tree (`weft_infer::Resolved`) into Core IR
//! (spec §4.3). Owns the target [`CanArena`] being built, pre-interned
//! names it needs to recognise while lowering, and a gensym counter for the
//! synthetic binders pattern-destructuring introduces — mirroring the
//! teacher's `Lowerer<'a>` (arena + pre-interned names + `push` helper).

use crate::decision_tree::{compile_match, DecisionTree, MatchOutcome};
use crate::error::{CompileError, CompileWarning};
use crate::ir::{CanArena, CanDecl, CanExpr, CanId, CanonResult, PrimOp};
use crate::pattern::flatten_arm;
use crate::relationalize::{is_pure, recognize_wrapper, BuiltinWrap, RelExpr};
use weft_diagnostic::Warnings;
use weft_infer::{Resolved, TypedArm, TypedDecl, TypedExpr, TypedExprKind, TypedFromClause, TypedPattern, TypedPatternKind};
use weft_ir::{Name, Pos, StringInterner};
use weft_types::{DataTypeRegistry, Idx};

pub struct Lowerer<'a> {
    pub arena: CanArena,
    registry: &'a DataTypeRegistry,
    warnings: &'a mut Warnings,
    interner: &'a mut StringInterner,
    gensym_counter: u32,

    list_concat_map: Name,
    list_distinct: Name,
    list_sort_by: Name,
    list_group_by: Name,
    deref: Name,
    assign: Name,

    op_add: Name,
    op_sub: Name,
    op_mul: Name,
    op_div: Name,
    op_eq: Name,
    op_neq: Name,
    op_lt: Name,
    op_le: Name,
    op_gt: Name,
    op_ge: Name,
    op_concat: Name,
}

impl<'a> Lowerer<'a> {
    pub fn new(registry: &'a DataTypeRegistry, warnings: &'a mut Warnings, interner: &'a mut StringInterner) -> Self {
        Lowerer {
            arena: CanArena::new(),
            registry,
            warnings,
            list_concat_map: interner.intern("List.concatMap"),
            list_distinct: interner.intern("List.distinct"),
            list_sort_by: interner.intern("List.sortBy"),
            list_group_by: interner.intern("List.groupBy"),
            deref: interner.intern("!"),
            assign: interner.intern(":="),
            op_add: interner.intern("+"),
            op_sub: interner.intern("-"),
            op_mul: interner.intern("*"),
            op_div: interner.intern("/"),
            op_eq: interner.intern("="),
            op_neq: interner.intern("<>"),
            op_lt: interner.intern("<"),
            op_le: interner.intern("<="),
            op_gt: interner.intern(">"),
            op_ge: interner.intern(">="),
            op_concat: interner.intern("^"),
            interner,
            gensym_counter: 0,
        }
    }

    fn push(&mut self, expr: CanExpr, ty: Idx) -> CanId {
        self.arena.push(expr, ty)
    }

    fn gensym(&mut self) -> Name {
        self.gensym_counter += 1;
        self.interner.intern(&format!("$gen{}", self.gensym_counter))
    }

    pub fn lower_resolved(&mut self, resolved: &Resolved) -> Result<CanonResult, CompileError> {
        let mut decls = Vec::new();
        for decl in &resolved.decls {
            decls.extend(self.lower_decl(decl)?);
        }
        let expr = match &resolved.expr {
            Some(e) => Some(self.lower_expr(e)?),
            None => None,
        };
        Ok(CanonResult { arena: std::mem::take(&mut self.arena), decls, expr })
    }

    fn lower_decl(&mut self, decl: &TypedDecl) -> Result<Vec<CanDecl>, CompileError> {
        match decl {
            TypedDecl::Value { pat, rhs, .. } => {
                let rhs_id = self.lower_expr(rhs)?;
                let mut out = Vec::new();
                self.lower_pattern_bindings(pat, rhs_id, &mut out);
                Ok(out)
            }
            TypedDecl::Function { name, params, body, ty, .. } => {
                let body_id = self.lower_expr(body)?;
                let mut rhs = body_id;
                for pat in params.iter().rev() {
                    rhs = self.lower_param_binder(pat, rhs, *ty)?;
                }
                Ok(vec![CanDecl::Value { name: *name, recursive: true, rhs }])
            }
            TypedDecl::Type { .. } | TypedDecl::Exception { .. } => Ok(vec![CanDecl::None]),
        }
    }

    /// A `val` binding's pattern is irrefutable; a bare variable binds
    /// directly, anything else binds a hidden temporary to `rhs_id` and
    /// projects every pattern variable out of it.
    fn lower_pattern_bindings(&mut self, pat: &TypedPattern, rhs_id: CanId, out: &mut Vec<CanDecl>) {
        if let TypedPatternKind::Var(name) = &pat.kind {
            out.push(CanDecl::Value { name: *name, recursive: false, rhs: rhs_id });
            return;
        }
        let temp = self.gensym();
        out.push(CanDecl::Value { name: temp, recursive: false, rhs: rhs_id });
        let temp_id = self.push(CanExpr::Var(temp), pat.ty);
        if let Some((_, bindings)) = flatten_arm(pat, &Vec::new()).into_iter().next() {
            for (name, occ) in bindings {
                let proj_id = self.project_occurrence(temp_id, pat.ty, &occ);
                out.push(CanDecl::Value { name, recursive: false, rhs: proj_id });
            }
        }
    }

    fn project_occurrence(&mut self, base: CanId, ty: Idx, occ: &[crate::pattern::PathStep]) -> CanId {
        use crate::pattern::PathStep;
        let mut cur = base;
        for step in occ {
            cur = match step {
                PathStep::Field(name) => self.push(CanExpr::Project(cur, *name), ty),
                PathStep::TupleIndex(i) => self.push(CanExpr::TupleProject(cur, *i), ty),
                PathStep::CtorArg(i) => self.push(CanExpr::CtorProject(cur, *i), ty),
            };
        }
        cur
    }

    /// Bind one function/lambda parameter or `from`-generator pattern.
    /// A bare variable binds with an ordinary `Fn`; anything refutable
    /// compiles to a single-arm `Case` whose `Fail` leaf raises `Match` at
    /// evaluation time (spec §4.6 "the default leaf raises `Match`").
    fn lower_param_binder(&mut self, pat: &TypedPattern, body_id: CanId, body_ty: Idx) -> Result<CanId, CompileError> {
        if let TypedPatternKind::Var(name) = &pat.kind {
            return Ok(self.push(CanExpr::Fn(*name, body_id), body_ty));
        }
        let temp = self.gensym();
        let arms = [(pat, None)];
        let (tree, outcome) = compile_match(&arms, self.registry);
        self.check_outcome(outcome, |_| pat.pos, pat.pos)?;
        let scrutinee = self.push(CanExpr::Var(temp), pat.ty);
        let case_id = self.push(CanExpr::Case(scrutinee, tree, vec![body_id]), body_ty);
        Ok(self.push(CanExpr::Fn(temp, case_id), body_ty))
    }

    fn lower_match_arms(&mut self, arms: &[TypedArm], pos: Pos) -> Result<(DecisionTree, Vec<CanId>), CompileError> {
        let mut guard_ids = Vec::with_capacity(arms.len());
        for arm in arms {
            guard_ids.push(match &arm.guard {
                Some(g) => Some(self.lower_expr(g)?),
                None => None,
            });
        }
        let pats: Vec<(&TypedPattern, Option<CanId>)> =
            arms.iter().zip(guard_ids.iter()).map(|(a, g)| (&a.pattern, *g)).collect();
        let (tree, outcome) = compile_match(&pats, self.registry);
        self.check_outcome(outcome, |idx| arms[idx].pattern.pos, pos)?;
        let mut bodies = Vec::with_capacity(arms.len());
        for arm in arms {
            bodies.push(self.lower_expr(&arm.body)?);
        }
        Ok((tree, bodies))
    }

    /// Enforce spec §4.3/§8: a redundant arm fails compilation outright; a
    /// non-exhaustive match only warns and is left to raise `Match` at
    /// runtime via the compiled `Fail` leaf.
    fn check_outcome(&mut self, outcome: MatchOutcome, arm_pos: impl Fn(usize) -> Pos, pos: Pos) -> Result<(), CompileError> {
        match outcome {
            MatchOutcome::Ok => Ok(()),
            MatchOutcome::Redundant { redundant_arms } | MatchOutcome::NonExhaustiveAndRedundant { redundant_arms } => {
                let idx = redundant_arms[0];
                Err(CompileError::RedundantMatch { pos: arm_pos(idx), arm_index: idx })
            }
            MatchOutcome::NonExhaustive => {
                self.warnings.push(CompileWarning { pos }.into());
                Ok(())
            }
        }
    }

    fn prim_op_for(&self, name: Name) -> Option<PrimOp> {
        Some(if name == self.op_add {
            PrimOp::Add
        } else if name == self.op_sub {
            PrimOp::Sub
        } else if name == self.op_mul {
            PrimOp::Mul
        } else if name == self.op_div {
            PrimOp::Div
        } else if name == self.op_eq {
            PrimOp::Eq
        } else if name == self.op_neq {
            PrimOp::Neq
        } else if name == self.op_lt {
            PrimOp::Lt
        } else if name == self.op_le {
            PrimOp::Le
        } else if name == self.op_gt {
            PrimOp::Gt
        } else if name == self.op_ge {
            PrimOp::Ge
        } else if name == self.op_concat {
            PrimOp::Concat
        } else {
            return None;
        })
    }

    fn lower_expr(&mut self, expr: &TypedExpr) -> Result<CanId, CompileError> {
        match &expr.kind {
            TypedExprKind::Literal(lit) => Ok(self.push(CanExpr::Literal(lit.clone()), expr.ty)),
            TypedExprKind::Ident(name) => {
                if let Some(ctor) = self.registry.ctor(*name) {
                    if ctor.fields.is_empty() {
                        return Ok(self.push(CanExpr::CtorApp(*name, Vec::new()), expr.ty));
                    }
                }
                Ok(self.push(CanExpr::Var(*name), expr.ty))
            }
            TypedExprKind::Tuple(items) => {
                let ids = items.iter().map(|e| self.lower_expr(e)).collect::<Result<Vec<_>, _>>()?;
                Ok(self.push(CanExpr::Tuple(ids), expr.ty))
            }
            TypedExprKind::Record(fields) => {
                let ids =
                    fields.iter().map(|(n, e)| Ok((*n, self.lower_expr(e)?))).collect::<Result<Vec<_>, _>>()?;
                Ok(self.push(CanExpr::Record(ids), expr.ty))
            }
            TypedExprKind::List(items) => {
                let ids = items.iter().map(|e| self.lower_expr(e)).collect::<Result<Vec<_>, _>>()?;
                Ok(self.push(CanExpr::List(ids), expr.ty))
            }
            TypedExprKind::Apply(f, x) => {
                if let Some(id) = self.try_lower_ctor_app(f, x, expr.ty)? {
                    return Ok(id);
                }
                if let Some(id) = self.try_lower_wrapped_from(expr)? {
                    return Ok(id);
                }
                let f_id = self.lower_expr(f)?;
                let x_id = self.lower_expr(x)?;
                Ok(self.push(CanExpr::Apply(f_id, x_id), expr.ty))
            }
            TypedExprKind::Infix(name, l, r) => {
                let l_id = self.lower_expr(l)?;
                let r_id = self.lower_expr(r)?;
                if let Some(op) = self.prim_op_for(*name) {
                    Ok(self.push(CanExpr::PrimOp(op, l_id, r_id), expr.ty))
                } else {
                    let callee = self.push(CanExpr::Var(*name), expr.ty);
                    let applied = self.push(CanExpr::Apply(callee, l_id), expr.ty);
                    Ok(self.push(CanExpr::Apply(applied, r_id), expr.ty))
                }
            }
            TypedExprKind::Let(decls, body) => {
                let body_id = self.lower_expr(body)?;
                let mut result = body_id;
                for decl in decls.iter().rev() {
                    let can_decls = self.lower_decl(decl)?;
                    for can_decl in can_decls.into_iter().rev() {
                        if let CanDecl::Value { name, recursive, rhs } = can_decl {
                            result = self.push(CanExpr::Let { name, recursive, rhs, body: result }, expr.ty);
                        }
                    }
                }
                Ok(result)
            }
            TypedExprKind::Fn(pat, body) => {
                let body_id = self.lower_expr(body)?;
                self.lower_param_binder(pat, body_id, expr.ty)
            }
            TypedExprKind::Case(scrutinee, arms) => {
                let scrut_id = self.lower_expr(scrutinee)?;
                let (tree, bodies) = self.lower_match_arms(arms, expr.pos)?;
                Ok(self.push(CanExpr::Case(scrut_id, tree, bodies), expr.ty))
            }
            TypedExprKind::If(c, t, f) => {
                let c_id = self.lower_expr(c)?;
                let t_id = self.lower_expr(t)?;
                let f_id = self.lower_expr(f)?;
                Ok(self.push(CanExpr::If(c_id, t_id, f_id), expr.ty))
            }
            TypedExprKind::Handle(body, arms) => {
                let body_id = self.lower_expr(body)?;
                let (tree, bodies) = self.lower_match_arms(arms, expr.pos)?;
                Ok(self.push(CanExpr::Handle(body_id, tree, bodies), expr.ty))
            }
            TypedExprKind::Raise(e) => {
                let e_id = self.lower_expr(e)?;
                Ok(self.push(CanExpr::Raise(e_id), expr.ty))
            }
            TypedExprKind::From(clauses) => self.lower_from(clauses, expr.ty),
            TypedExprKind::Project(inner, name) => {
                let inner_id = self.lower_expr(inner)?;
                Ok(self.push(CanExpr::Project(inner_id, *name), expr.ty))
            }
        }
    }

    /// `Ctor arg` applications lower to `CtorApp` directly rather than
    /// `Apply`, so the evaluator and match compiler can dispatch on the tag
    /// without a runtime environment lookup (spec §4.3).
    fn try_lower_ctor_app(&mut self, f: &TypedExpr, x: &TypedExpr, ty: Idx) -> Result<Option<CanId>, CompileError> {
        let TypedExprKind::Ident(name) = &f.kind else { return Ok(None) };
        let Some(ctor) = self.registry.ctor(*name) else { return Ok(None) };
        let arity = ctor.fields.len();
        let args = if arity > 1 {
            if let TypedExprKind::Tuple(items) = &x.kind {
                items.iter().map(|e| self.lower_expr(e)).collect::<Result<Vec<_>, _>>()?
            } else {
                vec![self.lower_expr(x)?]
            }
        } else {
            vec![self.lower_expr(x)?]
        };
        Ok(Some(self.push(CanExpr::CtorApp(*name, args), ty)))
    }

    /// Recognise `List.distinct`/`List.sortBy`/`List.groupBy` applied
    /// directly to a `from` pipeline and fold the wrapper into the
    /// relational plan instead of lowering it as an ordinary call
    /// (SPEC_FULL.md §4.5 supplement). Peels the application spine looking
    /// for `name arg1 .. from(...)`; anything else returns `None` and falls
    /// through to ordinary `Apply` lowering.
    fn try_lower_wrapped_from(&mut self, expr: &TypedExpr) -> Result<Option<CanId>, CompileError> {
        let mut spine: Vec<&TypedExpr> = Vec::new();
        let mut cur = expr;
        while let TypedExprKind::Apply(f, x) = &cur.kind {
            spine.push(x);
            cur = f;
        }
        spine.reverse();
        let TypedExprKind::Ident(name) = &cur.kind else { return Ok(None) };
        let Some(wrap) = recognize_wrapper(*name, self.list_distinct, self.list_sort_by, self.list_group_by) else {
            return Ok(None);
        };
        let Some(&last) = spine.last() else { return Ok(None) };
        let TypedExprKind::From(clauses) = &last.kind else { return Ok(None) };
        let Some(plan) = self.try_relational_plan(clauses) else { return Ok(None) };
        let wrapped = match (wrap, spine.len()) {
            (BuiltinWrap::Distinct, 1) => plan.distinct(),
            (BuiltinWrap::SortBy, 2) => {
                let key_fn = self.lower_expr(spine[0])?;
                plan.order_by(key_fn)
            }
            (BuiltinWrap::GroupBy, 3) => {
                let key_fn = self.lower_expr(spine[0])?;
                let agg_fn = self.lower_expr(spine[1])?;
                plan.group_by(key_fn, agg_fn)
            }
            _ => return Ok(None),
        };
        Ok(Some(self.push(CanExpr::Rel(wrapped), expr.ty)))
    }

    /// Attempt the relational rewrite (spec §4.5): every generator's
    /// pattern must be a bare variable and every `where`/`yield` subterm
    /// must be pure. Structural mismatches return `None` rather than an
    /// error — the caller falls back to ordinary tree-walkable Core.
    fn try_relational_plan(&mut self, clauses: &[TypedFromClause]) -> Option<RelExpr> {
        let mut current: Option<RelExpr> = None;
        let impure = [self.deref, self.assign];
        for clause in clauses {
            match clause {
                TypedFromClause::Source { pat, source } => {
                    let TypedPatternKind::Var(row_var) = &pat.kind else { return None };
                    let source_id = self.lower_expr(source).ok()?;
                    let scan = RelExpr::scan(*row_var, source_id);
                    current = Some(match current.take() {
                        None => scan,
                        Some(prev) => prev.join(scan),
                    });
                }
                TypedFromClause::Where(pred) => {
                    if !is_pure(pred, &impure) {
                        return None;
                    }
                    let pred_id = self.lower_expr(pred).ok()?;
                    current = Some(current.take()?.filter(pred_id));
                }
                TypedFromClause::Yield(proj) => {
                    if !is_pure(proj, &impure) {
                        return None;
                    }
                    let proj_id = self.lower_expr(proj).ok()?;
                    current = Some(current.take()?.project(proj_id));
                }
                TypedFromClause::OrderBy(key) => {
                    let key_id = self.lower_expr(key).ok()?;
                    current = Some(current.take()?.order_by(key_id));
                }
            }
        }
        current
    }

    fn lower_from(&mut self, clauses: &[TypedFromClause], result_ty: Idx) -> Result<CanId, CompileError> {
        if let Some(plan) = self.try_relational_plan(clauses) {
            return Ok(self.push(CanExpr::Rel(plan), result_ty));
        }
        self.lower_from_rest(clauses, result_ty)
    }

    /// Fallback desugaring into nested `List.concatMap`/`if`/singleton-list
    /// closures, used whenever a pipeline doesn't qualify as relational
    /// (spec §4.5 "the node is left alone; later evaluation will handle it
    /// in the tree-walk interpreter").
    fn lower_from_rest(&mut self, clauses: &[TypedFromClause], result_ty: Idx) -> Result<CanId, CompileError> {
        let Some((head, tail)) = clauses.split_first() else {
            return Ok(self.push(CanExpr::List(Vec::new()), result_ty));
        };
        match head {
            TypedFromClause::Yield(expr) => {
                let expr_id = self.lower_expr(expr)?;
                Ok(self.push(CanExpr::List(vec![expr_id]), result_ty))
            }
            TypedFromClause::Where(cond) => {
                let cond_id = self.lower_expr(cond)?;
                let rest_id = self.lower_from_rest(tail, result_ty)?;
                let empty_id = self.push(CanExpr::List(Vec::new()), result_ty);
                Ok(self.push(CanExpr::If(cond_id, rest_id, empty_id), result_ty))
            }
            TypedFromClause::OrderBy(_) => self.lower_from_rest(tail, result_ty),
            TypedFromClause::Source { pat, source } => {
                let source_id = self.lower_expr(source)?;
                let rest_id = self.lower_from_rest(tail, result_ty)?;
                let lambda_id = self.lower_param_binder(pat, rest_id, result_ty)?;
                let concat_map = self.push(CanExpr::Var(self.list_concat_map), result_ty);
                let applied_fn = self.push(CanExpr::Apply(concat_map, lambda_id), result_ty);
                Ok(self.push(CanExpr::Apply(applied_fn, source_id), result_ty))
            }
        }
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "tests use unwrap for brevity")]
mod tests {
    use super::*;

    fn bool_lit(b: bool) -> TypedExpr {
        TypedExpr { kind: TypedExprKind::Literal(weft_ir::Literal::Bool(b)), ty: Idx::new(0), pos: Pos::DUMMY }
    }

    fn int_lit(n: i64) -> TypedExpr {
        TypedExpr { kind: TypedExprKind::Literal(weft_ir::Literal::Int(n)), ty: Idx::new(0), pos: Pos::DUMMY }
    }

    fn bool_pat(b: bool) -> TypedPattern {
        TypedPattern { kind: TypedPatternKind::Literal(weft_ir::Literal::Bool(b)), ty: Idx::new(0), pos: Pos::DUMMY }
    }

    /// `case true of true => 1 | true => 2` — the second arm is unreachable
    /// and compilation must fail outright (spec §4.3/§8 property 5).
    #[test]
    fn a_redundant_arm_fails_compilation() {
        let registry = DataTypeRegistry::new();
        let mut warnings = Warnings::default();
        let mut interner = StringInterner::new();
        let mut lowerer = Lowerer::new(&registry, &mut warnings, &mut interner);

        let case_expr = TypedExpr {
            kind: TypedExprKind::Case(
                Box::new(bool_lit(true)),
                vec![
                    TypedArm { pattern: bool_pat(true), guard: None, body: int_lit(1) },
                    TypedArm { pattern: bool_pat(true), guard: None, body: int_lit(2) },
                ],
            ),
            ty: Idx::new(0),
            pos: Pos::DUMMY,
        };
        let resolved = Resolved { decls: Vec::new(), expr: Some(case_expr) };

        let err = lowerer.lower_resolved(&resolved).unwrap_err();
        assert!(matches!(err, CompileError::RedundantMatch { arm_index: 1, .. }));
    }

    /// `case true of true => 1` — `false` is never covered, but that's a
    /// warning, not a compile failure; the `Fail` leaf raises `Match` only
    /// if the uncovered case is ever reached at runtime.
    #[test]
    fn a_non_exhaustive_match_only_warns_and_still_compiles() {
        let registry = DataTypeRegistry::new();
        let mut warnings = Warnings::default();
        let mut interner = StringInterner::new();
        let mut lowerer = Lowerer::new(&registry, &mut warnings, &mut interner);

        let case_expr = TypedExpr {
            kind: TypedExprKind::Case(
                Box::new(bool_lit(true)),
                vec![TypedArm { pattern: bool_pat(true), guard: None, body: int_lit(1) }],
            ),
            ty: Idx::new(0),
            pos: Pos::DUMMY,
        };
        let resolved = Resolved { decls: Vec::new(), expr: Some(case_expr) };

        let result = lowerer.lower_resolved(&resolved);
        assert!(result.is_ok());
        assert_eq!(warnings.as_slice().len(), 1);
        assert_eq!(warnings.as_slice()[0].kind, "CompileWarning::NonExhaustiveMatch");
    }
}
