//! Bidirectional Hindley-Milner inference over the surface AST (spec §4.2).

use crate::env::TypeEnv;
use crate::typed::{
    Resolved, TypedArm, TypedDecl, TypedExpr, TypedExprKind, TypedFromClause, TypedPattern,
    TypedPatternKind,
};
use weft_diagnostic::Warnings;
use weft_ir::{Decl, Expr, ExprKind, FromClause, Literal, MatchArm, Name, Pattern, PatternKind, Pos, Stmt, StringLookup};
use weft_types::{DataTypeRegistry, Idx, TypeData, TypeError, TypeScheme, UnifyEngine};

/// Bundles the pieces a single inference pass over a statement needs.
/// Lives only for the duration of that pass — `weft_eval::Session` owns
/// the `Pool`, `DataTypeRegistry`, interner, and `Warnings` it borrows
/// from.
pub struct TypeResolver<'a> {
    pub engine: UnifyEngine<'a>,
    pub registry: &'a mut DataTypeRegistry,
    pub interner: &'a dyn StringLookup,
    pub warnings: &'a mut Warnings,
}

impl<'a> TypeResolver<'a> {
    /// Infer and elaborate one top-level statement.
    pub fn resolve_stmt(&mut self, stmt: &Stmt, env: &TypeEnv) -> Result<(Resolved, Idx), TypeError> {
        let _span = tracing::debug_span!("resolve_stmt").entered();
        let result = match stmt {
            Stmt::Expr(e) => {
                let typed = self.infer_expr(e, env)?;
                let ty = typed.ty;
                Ok((Resolved { expr: Some(typed), decls: Vec::new(), env: env.clone() }, ty))
            }
            Stmt::Decl(d) => {
                let (decls, new_env) = self.infer_decl(d, env)?;
                let ty = decls.last().map(Self::decl_ty).unwrap_or_else(|| self.engine.pool().unit());
                Ok((Resolved { expr: None, decls, env: new_env }, ty))
            }
        };
        if let Err(err) = &result {
            tracing::warn!(error = %err, "type resolution failed");
        }
        result
    }

    fn decl_ty(decl: &TypedDecl) -> Idx {
        match decl {
            TypedDecl::Value { rhs, .. } => rhs.ty,
            TypedDecl::Function { ty, .. } => *ty,
            TypedDecl::Type { .. } | TypedDecl::Exception { .. } => {
                unreachable!("type/exception decls never sit last in a print-worthy statement")
            }
        }
    }

    /// Infer one or more declarations in sequence, threading the extended
    /// environment through (spec §4.2 "let d in e end: infer declarations
    /// left-to-right").
    pub fn infer_decl(&mut self, decl: &Decl, env: &TypeEnv) -> Result<(Vec<TypedDecl>, TypeEnv), TypeError> {
        match decl {
            Decl::Value { pat, rhs, pos } => {
                self.engine.enter_scope();
                let rhs_typed = self.infer_expr(rhs, env)?;
                self.engine.exit_scope();

                let scheme = if is_syntactic_value(rhs) {
                    self.engine.generalize(rhs_typed.ty, self.engine.current_rank().next())
                } else {
                    // Weak polymorphism (spec §9 Open Question b, resolved
                    // in SPEC_FULL.md §4.2): non-values, and anything that
                    // allocates a `ref`, generalise over nothing.
                    TypeScheme::mono(rhs_typed.ty)
                };

                let (pat_typed, bound_env) = self.infer_pattern_scheme(pat, &scheme, env)?;
                Ok((vec![TypedDecl::Value { pat: pat_typed, rhs: rhs_typed, pos: *pos }], bound_env))
            }
            Decl::Function { name, params, body, pos } => {
                self.engine.enter_scope();
                let mut fn_env = env.clone();
                let mut typed_params = Vec::new();
                let mut param_tys = Vec::new();
                for p in params {
                    let var = self.engine.fresh_var(false);
                    let (tp, e2) = self.infer_pattern(p, var, &fn_env)?;
                    fn_env = e2;
                    typed_params.push(tp);
                    param_tys.push(var);
                }
                let body_typed = self.infer_expr(body, &fn_env)?;
                let fn_ty = param_tys
                    .iter()
                    .rev()
                    .fold(body_typed.ty, |acc, &p| self.engine.pool_mut().intern(TypeData::Fun(p, acc)));
                self.engine.exit_scope();

                let scheme = self.engine.generalize(fn_ty, self.engine.current_rank().next());
                let new_env = env.bind(*name, scheme);
                Ok((
                    vec![TypedDecl::Function { name: *name, params: typed_params, body: body_typed, pos: *pos, ty: fn_ty }],
                    new_env,
                ))
            }
            Decl::Type { name, params, ctors, pos } => {
                self.registry.declare_type(*name, params.len());
                for c in ctors {
                    let field_schemes = c
                        .args
                        .iter()
                        .map(|t| TypeScheme::mono(self.resolve_type_expr(t)))
                        .collect();
                    self.registry.declare_ctor(c.name, *name, field_schemes);
                }
                Ok((vec![TypedDecl::Type { name: *name, pos: *pos }], env.clone()))
            }
            Decl::Exception { name, arg, pos } => {
                let field = arg.as_ref().map(|t| TypeScheme::mono(self.resolve_type_expr(t)));
                self.registry.declare_exception(*name, field);
                Ok((vec![TypedDecl::Exception { name: *name, pos: *pos }], env.clone()))
            }
        }
    }

    fn resolve_type_expr(&mut self, _t: &weft_ir::TypeExpr) -> Idx {
        // Surface type annotations are advisory; a full implementation
        // would unify them against inferred structure. Out of scope here
        // (spec does not require checking user annotations beyond the
        // value/function bodies themselves) — treat each as a fresh slot
        // that later unifies against its use sites.
        self.engine.fresh_var(false)
    }

    pub fn infer_expr(&mut self, expr: &Expr, env: &TypeEnv) -> Result<TypedExpr, TypeError> {
        let pos = expr.pos;
        let (kind, ty) = match &expr.kind {
            ExprKind::Literal(lit) => (TypedExprKind::Literal(lit.clone()), self.literal_ty(lit)),
            ExprKind::Ident(name) => {
                let scheme = env.lookup(*name).cloned().ok_or_else(|| TypeError::UnboundIdentifier {
                    name: self.interner.resolve(*name).to_string(),
                    pos,
                })?;
                let ty = self.engine.instantiate(&scheme);
                (TypedExprKind::Ident(*name), ty)
            }
            ExprKind::Tuple(items) => {
                let mut typed = Vec::with_capacity(items.len());
                for i in items {
                    typed.push(self.infer_expr(i, env)?);
                }
                let ty = self.engine.pool_mut().intern(TypeData::Tuple(typed.iter().map(|t| t.ty).collect()));
                (TypedExprKind::Tuple(typed), ty)
            }
            ExprKind::Record(fields) => {
                let mut typed = Vec::with_capacity(fields.len());
                for (name, e) in fields {
                    typed.push((*name, self.infer_expr(e, env)?));
                }
                let mut field_tys: Vec<_> = typed.iter().map(|(n, e)| (*n, e.ty)).collect();
                field_tys.sort_by_key(|(n, _)| n.raw());
                let ty = self.engine.pool_mut().intern(TypeData::Record(field_tys));
                (TypedExprKind::Record(typed), ty)
            }
            ExprKind::List(items) => {
                let elem_ty = self.engine.fresh_var(false);
                let mut typed = Vec::with_capacity(items.len());
                for i in items {
                    let t = self.infer_expr(i, env)?;
                    self.engine.unify(elem_ty, t.ty, i.pos, self.interner)?;
                    typed.push(t);
                }
                let ty = self.engine.pool_mut().intern(TypeData::List(elem_ty));
                (TypedExprKind::List(typed), ty)
            }
            ExprKind::Apply(f, x) => {
                let f_typed = self.infer_expr(f, env)?;
                let x_typed = self.infer_expr(x, env)?;
                let result = self.engine.fresh_var(false);
                let want = self.engine.pool_mut().intern(TypeData::Fun(x_typed.ty, result));
                self.engine.unify(f_typed.ty, want, pos, self.interner)?;
                (TypedExprKind::Apply(Box::new(f_typed), Box::new(x_typed)), result)
            }
            ExprKind::Infix(op, l, r) => return self.infer_infix(*op, l, r, pos, env),
            ExprKind::Let(decls, body) => {
                let mut cur_env = env.clone();
                let mut typed_decls = Vec::new();
                for d in decls {
                    let (td, e2) = self.infer_decl(d, &cur_env)?;
                    typed_decls.extend(td);
                    cur_env = e2;
                }
                let body_typed = self.infer_expr(body, &cur_env)?;
                let ty = body_typed.ty;
                (TypedExprKind::Let(typed_decls, Box::new(body_typed)), ty)
            }
            ExprKind::Fn(pat, body) => {
                let var = self.engine.fresh_var(false);
                let (pat_typed, fn_env) = self.infer_pattern(pat, var, env)?;
                let body_typed = self.infer_expr(body, &fn_env)?;
                let ty = self.engine.pool_mut().intern(TypeData::Fun(var, body_typed.ty));
                (TypedExprKind::Fn(Box::new(pat_typed), Box::new(body_typed)), ty)
            }
            ExprKind::Case(scrutinee, arms) => {
                let scrut_typed = self.infer_expr(scrutinee, env)?;
                let (typed_arms, result_ty) = self.infer_arms(arms, scrut_typed.ty, env)?;
                (TypedExprKind::Case(Box::new(scrut_typed), typed_arms), result_ty)
            }
            ExprKind::If(c, t, f) => {
                let c_typed = self.infer_expr(c, env)?;
                let bool_ty = self.engine.pool().bool();
                self.engine.unify(c_typed.ty, bool_ty, c.pos, self.interner)?;
                let t_typed = self.infer_expr(t, env)?;
                let f_typed = self.infer_expr(f, env)?;
                self.engine.unify(t_typed.ty, f_typed.ty, pos, self.interner)?;
                let ty = t_typed.ty;
                (TypedExprKind::If(Box::new(c_typed), Box::new(t_typed), Box::new(f_typed)), ty)
            }
            ExprKind::Handle(body, arms) => {
                let body_typed = self.infer_expr(body, env)?;
                let exn_ty = self.engine.fresh_var(false); // exception payload type per arm
                let (typed_arms, result_ty) = self.infer_arms(arms, exn_ty, env)?;
                self.engine.unify(body_typed.ty, result_ty, pos, self.interner)?;
                (TypedExprKind::Handle(Box::new(body_typed), typed_arms), result_ty)
            }
            ExprKind::Raise(e) => {
                let e_typed = self.infer_expr(e, env)?;
                let result = self.engine.fresh_var(false);
                (TypedExprKind::Raise(Box::new(e_typed)), result)
            }
            ExprKind::Project(e, field) => {
                let e_typed = self.infer_expr(e, env)?;
                let result = self.engine.fresh_var(false);
                self.unify_has_field(e_typed.ty, *field, result, pos)?;
                (TypedExprKind::Project(Box::new(e_typed), *field), result)
            }
            ExprKind::From(clauses) => return self.infer_from(clauses, pos, env),
        };
        Ok(TypedExpr { kind, ty, pos })
    }

    fn unify_has_field(&mut self, record_ty: Idx, field: Name, field_ty: Idx, pos: Pos) -> Result<(), TypeError> {
        let resolved = self.engine.pool_mut().resolve(record_ty);
        match self.engine.pool().get(resolved).clone() {
            TypeData::Record(fields) => {
                for (n, t) in fields {
                    if n == field {
                        return self.engine.unify(t, field_ty, pos, self.interner);
                    }
                }
                Err(TypeError::Mismatch {
                    expected: format!("record with field `{}`", self.interner.resolve(field)),
                    actual: weft_types::moniker(self.engine.pool_mut(), resolved, self.interner),
                    pos,
                })
            }
            _ => Err(TypeError::Mismatch {
                expected: "record".to_string(),
                actual: weft_types::moniker(self.engine.pool_mut(), resolved, self.interner),
                pos,
            }),
        }
    }

    fn infer_arms(&mut self, arms: &[MatchArm], scrut_ty: Idx, env: &TypeEnv) -> Result<(Vec<TypedArm>, Idx), TypeError> {
        let result_ty = self.engine.fresh_var(false);
        let mut typed_arms = Vec::with_capacity(arms.len());
        for arm in arms {
            let (pat_typed, arm_env) = self.infer_pattern(&arm.pattern, scrut_ty, env)?;
            let guard_typed = match &arm.guard {
                Some(g) => {
                    let gt = self.infer_expr(g, &arm_env)?;
                    let bool_ty = self.engine.pool().bool();
                    self.engine.unify(gt.ty, bool_ty, g.pos, self.interner)?;
                    Some(gt)
                }
                None => None,
            };
            let body_typed = self.infer_expr(&arm.body, &arm_env)?;
            self.engine.unify(result_ty, body_typed.ty, arm.body.pos, self.interner)?;
            typed_arms.push(TypedArm { pattern: pat_typed, guard: guard_typed, body: body_typed });
        }
        Ok((typed_arms, result_ty))
    }

    fn infer_infix(&mut self, op: Name, l: &Expr, r: &Expr, pos: Pos, env: &TypeEnv) -> Result<TypedExpr, TypeError> {
        let op_name = self.interner.resolve(op).to_string();
        let l_typed = self.infer_expr(l, env)?;
        let r_typed = self.infer_expr(r, env)?;
        let ty = match op_name.as_str() {
            "+" | "-" | "*" | "/" => {
                // Literals are monomorphically `int` or `real` (spec §3
                // `Literal`), so no numeric defaulting is needed here —
                // unifying the two operands is enough to catch `1 + 1.0`.
                self.engine.unify(l_typed.ty, r_typed.ty, pos, self.interner)?;
                l_typed.ty
            }
            "=" | "<>" => {
                let eq_ty = self.engine.fresh_var(true);
                self.engine.unify(eq_ty, l_typed.ty, pos, self.interner)?;
                self.engine.unify(eq_ty, r_typed.ty, pos, self.interner)?;
                self.engine.pool().bool()
            }
            "<" | "<=" | ">" | ">=" => {
                self.engine.unify(l_typed.ty, r_typed.ty, pos, self.interner)?;
                self.engine.pool().bool()
            }
            "^" => {
                let string_ty = self.engine.pool().string();
                self.engine.unify(l_typed.ty, string_ty, l.pos, self.interner)?;
                self.engine.unify(r_typed.ty, string_ty, r.pos, self.interner)?;
                string_ty
            }
            _ => {
                // User-defined infix identifier: treat as an ordinary
                // two-argument application against its environment scheme.
                let scheme = env.lookup(op).cloned().ok_or_else(|| TypeError::UnboundIdentifier {
                    name: op_name.clone(),
                    pos,
                })?;
                let fn_ty = self.engine.instantiate(&scheme);
                let result = self.engine.fresh_var(false);
                let partial = self.engine.pool_mut().intern(TypeData::Fun(r_typed.ty, result));
                let want = self.engine.pool_mut().intern(TypeData::Fun(l_typed.ty, partial));
                self.engine.unify(fn_ty, want, pos, self.interner)?;
                result
            }
        };
        Ok(TypedExpr { kind: TypedExprKind::Infix(op, Box::new(l_typed), Box::new(r_typed)), ty, pos })
    }

    fn infer_from(&mut self, clauses: &[FromClause], pos: Pos, env: &TypeEnv) -> Result<TypedExpr, TypeError> {
        let mut cur_env = env.clone();
        let mut typed = Vec::with_capacity(clauses.len());
        let mut yield_ty = None;
        let mut last_source_elem = None;
        for clause in clauses {
            match clause {
                FromClause::Source { pat, source } => {
                    let src_typed = self.infer_expr(source, &cur_env)?;
                    let elem_ty = self.engine.fresh_var(false);
                    let list_ty = self.engine.pool_mut().intern(TypeData::List(elem_ty));
                    self.engine.unify(src_typed.ty, list_ty, source.pos, self.interner)?;
                    let (pat_typed, e2) = self.infer_pattern(pat, elem_ty, &cur_env)?;
                    cur_env = e2;
                    last_source_elem = Some(elem_ty);
                    typed.push(TypedFromClause::Source { pat: pat_typed, source: src_typed });
                }
                FromClause::Where(pred) => {
                    let p_typed = self.infer_expr(pred, &cur_env)?;
                    let bool_ty = self.engine.pool().bool();
                    self.engine.unify(p_typed.ty, bool_ty, pred.pos, self.interner)?;
                    typed.push(TypedFromClause::Where(p_typed));
                }
                FromClause::Yield(e) => {
                    let e_typed = self.infer_expr(e, &cur_env)?;
                    yield_ty = Some(e_typed.ty);
                    typed.push(TypedFromClause::Yield(e_typed));
                }
                FromClause::OrderBy(e) => {
                    let e_typed = self.infer_expr(e, &cur_env)?;
                    typed.push(TypedFromClause::OrderBy(e_typed));
                }
            }
        }
        let elem_ty = yield_ty.or(last_source_elem).unwrap_or_else(|| self.engine.fresh_var(false));
        let ty = self.engine.pool_mut().intern(TypeData::List(elem_ty));
        Ok(TypedExpr { kind: TypedExprKind::From(typed), ty, pos })
    }

    fn literal_ty(&self, lit: &Literal) -> Idx {
        match lit {
            Literal::Int(_) => self.engine.pool().int(),
            Literal::Real(_) => self.engine.pool().real(),
            Literal::String(_) => self.engine.pool().string(),
            Literal::Char(_) => self.engine.pool().char(),
            Literal::Bool(_) => self.engine.pool().bool(),
            Literal::Unit => self.engine.pool().unit(),
        }
    }

    /// Infer a pattern against an expected type, extending `env` with its
    /// bindings (monomorphic — pattern variables never generalise, only
    /// the outermost `let` scheme does, via [`Self::infer_pattern_scheme`]).
    fn infer_pattern(&mut self, pat: &Pattern, expected: Idx, env: &TypeEnv) -> Result<(TypedPattern, TypeEnv), TypeError> {
        self.infer_pattern_inner(pat, expected, env)
    }

    /// Infer a `let`-bound pattern where a single `Var` at the top gets the
    /// generalised scheme directly (spec §4.2 let-generalisation); nested
    /// variables inside a tuple/record pattern remain monomorphic.
    fn infer_pattern_scheme(&mut self, pat: &Pattern, scheme: &TypeScheme, env: &TypeEnv) -> Result<(TypedPattern, TypeEnv), TypeError> {
        if let PatternKind::Var(name) = &pat.kind {
            let ty = self.engine.instantiate(scheme);
            let typed = TypedPattern { kind: TypedPatternKind::Var(*name), ty, pos: pat.pos };
            return Ok((typed, env.bind(*name, scheme.clone())));
        }
        let ty = self.engine.instantiate(scheme);
        self.infer_pattern(pat, ty, env)
    }

    fn infer_pattern_inner(
        &mut self,
        pat: &Pattern,
        expected: Idx,
        env: &TypeEnv,
    ) -> Result<(TypedPattern, TypeEnv), TypeError> {
        let pos = pat.pos;
        let (kind, env2) = match &pat.kind {
            PatternKind::Wildcard => (TypedPatternKind::Wildcard, env.clone()),
            PatternKind::Var(name) => {
                (TypedPatternKind::Var(*name), env.bind(*name, TypeScheme::mono(expected)))
            }
            PatternKind::Literal(lit) => {
                let lit_ty = self.literal_ty(lit);
                self.engine.unify(expected, lit_ty, pos, self.interner)?;
                (TypedPatternKind::Literal(lit.clone()), env.clone())
            }
            PatternKind::Ctor(name, args) => {
                let info = self.registry.ctor(*name).cloned().ok_or_else(|| TypeError::UnboundIdentifier {
                    name: self.interner.resolve(*name).to_string(),
                    pos,
                })?;
                if info.fields.len() != args.len() {
                    return Err(TypeError::ArityMismatch { expected: info.fields.len(), found: args.len(), pos });
                }
                let data_ty = self.engine.pool_mut().intern(TypeData::Data(info.data_name, Vec::new()));
                self.engine.unify(expected, data_ty, pos, self.interner)?;
                let mut cur_env = env.clone();
                let mut typed_args = Vec::with_capacity(args.len());
                for (arg_pat, field_scheme) in args.iter().zip(info.fields.iter()) {
                    let field_ty = self.engine.instantiate(field_scheme);
                    let (tp, e2) = self.infer_pattern(arg_pat, field_ty, &cur_env)?;
                    cur_env = e2;
                    typed_args.push(tp);
                }
                (TypedPatternKind::Ctor(*name, typed_args), cur_env)
            }
            PatternKind::Tuple(items) => {
                let mut elem_tys = Vec::with_capacity(items.len());
                for _ in items {
                    elem_tys.push(self.engine.fresh_var(false));
                }
                let want = self.engine.pool_mut().intern(TypeData::Tuple(elem_tys.clone()));
                self.engine.unify(expected, want, pos, self.interner)?;
                let mut cur_env = env.clone();
                let mut typed_items = Vec::with_capacity(items.len());
                for (item, ty) in items.iter().zip(elem_tys) {
                    let (tp, e2) = self.infer_pattern(item, ty, &cur_env)?;
                    cur_env = e2;
                    typed_items.push(tp);
                }
                (TypedPatternKind::Tuple(typed_items), cur_env)
            }
            PatternKind::Record { fields, has_rest } => {
                let mut cur_env = env.clone();
                let mut typed_fields = Vec::with_capacity(fields.len());
                let mut field_tys = Vec::with_capacity(fields.len());
                for (name, p) in fields {
                    let ty = self.engine.fresh_var(false);
                    let (tp, e2) = self.infer_pattern(p, ty, &cur_env)?;
                    cur_env = e2;
                    typed_fields.push((*name, tp));
                    field_tys.push((*name, ty));
                }
                if !*has_rest {
                    field_tys.sort_by_key(|(n, _)| n.raw());
                    let want = self.engine.pool_mut().intern(TypeData::Record(field_tys));
                    self.engine.unify(expected, want, pos, self.interner)?;
                } else {
                    for (name, ty) in &field_tys {
                        self.unify_has_field(expected, *name, *ty, pos)?;
                    }
                }
                (TypedPatternKind::Record { fields: typed_fields, has_rest: *has_rest }, cur_env)
            }
            PatternKind::As(name, inner) => {
                let (tp, e2) = self.infer_pattern(inner, expected, env)?;
                let e3 = e2.bind(*name, TypeScheme::mono(expected));
                (TypedPatternKind::As(*name, Box::new(tp)), e3)
            }
            PatternKind::Layered(alts) => {
                let mut cur_env = env.clone();
                let mut typed_alts = Vec::with_capacity(alts.len());
                for a in alts {
                    let (tp, e2) = self.infer_pattern(a, expected, &cur_env)?;
                    cur_env = e2;
                    typed_alts.push(tp);
                }
                (TypedPatternKind::Layered(typed_alts), cur_env)
            }
            PatternKind::Annotated(inner, type_expr) => {
                let annotated_ty = self.resolve_type_expr(type_expr);
                self.engine.unify(expected, annotated_ty, pos, self.interner)?;
                return self.infer_pattern(inner, expected, env);
            }
        };
        Ok((TypedPattern { kind, ty: expected, pos }, env2))
    }
}

/// Mini-ML value restriction (spec §4.2): only syntactic values generalise.
fn is_syntactic_value(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Literal(_) | ExprKind::Ident(_) | ExprKind::Fn(_, _) => true,
        ExprKind::Tuple(items) | ExprKind::List(items) => items.iter().all(is_syntactic_value),
        ExprKind::Record(fields) => fields.iter().all(|(_, e)| is_syntactic_value(e)),
        _ => false,
    }
}
