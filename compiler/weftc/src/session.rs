//! The `weftc` driver session (spec §4.7's state diagram, non-Salsa):
//! owns a [`weft_eval::Session`] (types, registry, interner, runtime
//! environment) plus the compile-time [`weft_infer::TypeEnv`] it doesn't
//! carry, and drives one top-level statement through every pipeline stage
//! named in SPEC_FULL.md §1 — `TypeResolver` → `Lowerer` →
//! `inline::optimize` → `weft_eval::run_program`.

use crate::diagnostic::StatementError;
use crate::render::render_value;
use rustc_hash::FxHashMap;
use weft_canon::{optimize, Lowerer};
use weft_infer::{prelude, TypeEnv, TypeResolver};
use weft_ir::{Name, Stmt};
use weft_types::{moniker, Idx, TypeScheme, UnifyEngine};

/// One statement's wire-format output (spec §6), plus any warnings
/// accumulated while compiling it (spec §7 "surfaced after successful
/// compilation").
pub struct StmtOutcome {
    pub lines: Vec<String>,
    pub warnings: Vec<weft_diagnostic::Diagnostic>,
}

pub struct Session {
    eval: weft_eval::Session,
    type_env: TypeEnv,
    it_name: Name,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        let mut eval = weft_eval::Session::new();
        let type_env = prelude(&mut eval.pool, &mut eval.interner);
        let it_name = eval.interner.intern("it");
        Session { eval, type_env, it_name }
    }

    #[must_use]
    pub fn eval(&self) -> &weft_eval::Session {
        &self.eval
    }

    pub fn eval_mut(&mut self) -> &mut weft_eval::Session {
        &mut self.eval
    }

    /// Run one top-level statement (spec §4.7): type-resolve, lower to
    /// Core, optimise to a fixed point, then compile and evaluate.
    /// `Failed` is a clean terminal — bindings already installed by
    /// earlier statements in this session stay installed (spec §4.7).
    pub fn run_stmt(&mut self, stmt: &Stmt) -> Result<StmtOutcome, StatementError> {
        let (resolved, _stmt_ty) = {
            let mut resolver = TypeResolver {
                engine: UnifyEngine::new(&mut self.eval.pool),
                registry: &mut self.eval.registry,
                interner: &self.eval.interner,
                warnings: &mut self.eval.warnings,
            };
            resolver.resolve_stmt(stmt, &self.type_env)?
        };

        let binding_types = collect_binding_types(&resolved.decls);
        let expr_ty = resolved.expr.as_ref().map(|e| e.ty);

        self.type_env = resolved.env.clone();
        if let Some(ty) = expr_ty {
            self.type_env = self.type_env.bind(self.it_name, TypeScheme::mono(ty));
        }

        let mut canon = {
            let mut lowerer = Lowerer::new(&self.eval.registry, &mut self.eval.warnings, &mut self.eval.interner);
            lowerer.lower_resolved(&resolved)?
        };
        optimize(&mut canon, &mut self.eval.interner);

        let (bindings, trailing) = weft_eval::run_program(&mut self.eval, &canon)?;

        let mut lines = Vec::with_capacity(bindings.len() + 1);
        for binding in &bindings {
            let ty = binding_types.get(&binding.name).copied().unwrap_or_else(|| self.eval.pool.unit());
            lines.push(self.wire_line(binding.name, &binding.value, ty));
        }
        if let Some(value) = trailing {
            let ty = expr_ty.unwrap_or_else(|| self.eval.pool.unit());
            self.eval.bind_top_level(self.it_name, value.clone());
            lines.push(self.wire_line(self.it_name, &value, ty));
        }

        Ok(StmtOutcome { lines, warnings: self.eval.warnings.take() })
    }

    fn wire_line(&mut self, name: Name, value: &weft_eval::Value, ty: Idx) -> String {
        let rendered_value = render_value(value, &self.eval.interner);
        let rendered_type = moniker(&mut self.eval.pool, ty, &self.eval.interner);
        format!("val {} = {} : {}\n", self.eval.interner.resolve(name), rendered_value, rendered_type)
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::new()
    }
}

/// Flatten the bound-name → type map for one statement's declarations
/// (spec §4.2's `TypeMap`, specialised to just the names a pattern binds):
/// `weft_canon::Lowerer` splits a multi-variable `val` pattern into one
/// `CanDecl::Value` per bound name, so the wire-format printer needs each
/// one's type keyed by name rather than by declaration position.
fn collect_binding_types(decls: &[weft_infer::TypedDecl]) -> FxHashMap<Name, Idx> {
    use weft_infer::TypedDecl;

    let mut map = FxHashMap::default();
    for decl in decls {
        match decl {
            TypedDecl::Value { pat, .. } => collect_pattern_types(pat, &mut map),
            TypedDecl::Function { name, ty, .. } => {
                map.insert(*name, *ty);
            }
            TypedDecl::Type { .. } | TypedDecl::Exception { .. } => {}
        }
    }
    map
}

fn collect_pattern_types(pat: &weft_infer::TypedPattern, map: &mut FxHashMap<Name, Idx>) {
    use weft_infer::TypedPatternKind;

    match &pat.kind {
        TypedPatternKind::Wildcard | TypedPatternKind::Literal(_) => {}
        TypedPatternKind::Var(name) => {
            map.insert(*name, pat.ty);
        }
        TypedPatternKind::As(name, inner) => {
            map.insert(*name, pat.ty);
            collect_pattern_types(inner, map);
        }
        TypedPatternKind::Ctor(_, args) | TypedPatternKind::Tuple(args) => {
            for p in args {
                collect_pattern_types(p, map);
            }
        }
        TypedPatternKind::Record { fields, .. } => {
            for (_, p) in fields {
                collect_pattern_types(p, map);
            }
        }
        TypedPatternKind::Layered(alts) => {
            if let Some(first) = alts.first() {
                collect_pattern_types(first, map);
            }
        }
    }
}
