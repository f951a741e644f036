//! Compiling `weft_canon::CanExpr` into runnable [`crate::code::Code`]
//! (spec §4.6 "the Compiler turns Core IR into a tree of closures once,
//! ahead of evaluation, rather than re-walking the IR on every call").
//!
//! [`Scope`] stands in for `weft_infer`'s static environment at this stage:
//! every `Var` is resolved to a fixed depth (a local slot) or falls through
//! to a name-keyed lookup in the session's root `Environment` (globals,
//! builtins). `Case`/`Handle` interpret the `DecisionTree` `weft_canon`
//! already built during lowering; this module never runs the Maranget
//! algorithm itself, only walks its output against a live `Value`.

use crate::code::Code;
use crate::env::Environment;
use crate::error::EvalError;
use crate::ops::{eval_add, eval_concat, eval_div, eval_mul, eval_sub, project, value_eq, value_matches_test};
use crate::rel;
use crate::scope::Scope;
use crate::session::Session;
use crate::value::{Closure, Value};
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;
use weft_canon::{CanArena, CanExpr, CanId, DecisionTree, PrimOp};
use weft_ir::Name;

/// The single dispatch point for function application (spec §3 "`Apply`
/// invokes a closure or a native"). Every builtin and every compiled
/// `Apply` node goes through here so currying, closures, and natives behave
/// identically regardless of call site.
pub(crate) fn apply_value(session: &mut Session, f: Value, arg: Value) -> Result<Value, EvalError> {
    match f {
        Value::Closure(closure) => {
            let env = closure.env.bind(closure.param, arg);
            closure.body.run(session, &env)
        }
        Value::Native(native) => (native.func)(session, arg),
        _ => unreachable!("application head shape guaranteed by the type checker"),
    }
}

/// Result of evaluating a self-recursive function body compiled for the
/// tail-call loop (spec §4.6): either the body is done, or it reached a
/// fully-saturated self-call in tail position and the loop should continue
/// with fresh argument values instead of growing the call stack.
enum Flow {
    Done(Value),
    Tail(Vec<Value>),
}

pub struct Compiler<'a> {
    arena: &'a CanArena,
}

impl<'a> Compiler<'a> {
    #[must_use]
    pub fn new(arena: &'a CanArena) -> Self {
        Compiler { arena }
    }

    /// Compile one top-level `CanDecl::Value`, returning its binding name
    /// and the `Code` that produces the value to bind it to (spec §4.7 "a
    /// `weftc` top-level statement compiles to zero or more bindings").
    #[must_use]
    pub fn compile_value_decl(&self, name: Name, recursive: bool, rhs: CanId, scope: &Scope) -> Code {
        if !recursive {
            return self.compile_expr(rhs, scope);
        }
        self.compile_recursive(name, rhs, scope)
    }

    /// Peel a curried `Fn` chain into its parameter list and innermost body.
    fn peel_fn_chain(&self, mut id: CanId) -> (Vec<Name>, CanId) {
        let mut params = Vec::new();
        loop {
            match &self.arena.get(id).expr {
                CanExpr::Fn(param, body) => {
                    params.push(*param);
                    id = *body;
                }
                _ => break,
            }
        }
        (params, id)
    }

    /// Compile a recursive `let`/top-level binding, tying the knot through
    /// `Environment::bind_cell` (spec §3 doc comment on `Sub`'s cell: "the
    /// standard letrec back-patch"). When the right-hand side is a curried
    /// function, its innermost body is compiled with tail-call-loop
    /// recognition (spec §4.6): a fully-saturated self-call in tail
    /// position through `if`/`let` nesting reuses the current call frame
    /// instead of recursing.
    fn compile_recursive(&self, name: Name, rhs: CanId, scope: &Scope) -> Code {
        let (params, body_id) = self.peel_fn_chain(rhs);
        if params.is_empty() {
            let rec_scope = scope.push(name);
            let rhs_code = self.compile_expr(rhs, &rec_scope);
            return Code::new("letrec", move |session, env| {
                let cell = Rc::new(RefCell::new(Value::Unit));
                let rec_env = env.bind_cell(name, Rc::clone(&cell));
                let value = rhs_code.run(session, &rec_env)?;
                *cell.borrow_mut() = value.clone();
                Ok(value)
            });
        }

        let rec_scope = scope.push(name);
        let mut inner_scope = rec_scope.clone();
        for param in &params {
            inner_scope = inner_scope.push(*param);
        }
        let arity = params.len();
        let body_flow = self.compile_tail(body_id, &inner_scope, arity, arity);
        let params_for_loop = params.clone();
        let innermost = Code::new("tail-loop-body", move |session, env| {
            let mut current = env.clone();
            loop {
                match body_flow.run(session, &current)? {
                    Flow::Done(v) => return Ok(v),
                    Flow::Tail(args) => {
                        let mut next = current.ancestor(params_for_loop.len());
                        for (p, a) in params_for_loop.iter().zip(args) {
                            next = next.bind(*p, a);
                        }
                        current = next;
                    }
                }
            }
        });

        // Build the curried closure chain outside-in: the outermost
        // closure binds `params[0]`, returning a closure binding
        // `params[1]`, and so on until the innermost layer runs the
        // tail-call loop body.
        let mut body_code = innermost;
        for param in params.iter().rev().take(params.len() - 1) {
            let param = *param;
            let next = body_code;
            body_code = Code::new("curry", move |_session, env| {
                Ok(Value::Closure(Rc::new(Closure { param, body: next.clone(), env: env.clone(), self_name: None })))
            });
        }
        let first_param = params[0];
        let self_name = name;
        Code::new("letrec-fn", move |session, env| {
            let cell = Rc::new(RefCell::new(Value::Unit));
            let rec_env = env.bind_cell(self_name, Rc::clone(&cell));
            let closure = Value::Closure(Rc::new(Closure {
                param: first_param,
                body: body_code.clone(),
                env: rec_env.clone(),
                self_name: Some(self_name),
            }));
            *cell.borrow_mut() = closure.clone();
            let _ = session;
            Ok(closure)
        })
    }

    /// Compile `id` in tail position relative to a self-recursive function
    /// of arity `arity`, whose own name sits `self_depth` `Scope` slots
    /// below wherever `id` is compiled (fixed at `arity` for the function's
    /// immediate body; each further nested `Let` pushes one more slot, so
    /// `self_depth` grows alongside `scope` as this recurses). Comparing
    /// depths rather than names means a local that happens to shadow the
    /// function's own name is never mistaken for a self-call.
    ///
    /// Tail position is recognised through `If` (both branches) and
    /// non-recursive `Let` (the body); everywhere else falls back to
    /// ordinary compilation wrapped in `Flow::Done`. A fully-saturated
    /// `Apply` chain applying the function's own name to exactly `arity`
    /// arguments compiles to `Flow::Tail`.
    fn compile_tail(&self, id: CanId, scope: &Scope, self_depth: usize, arity: usize) -> TailCode {
        match &self.arena.get(id).expr {
            CanExpr::If(cond, then_id, else_id) => {
                let cond_code = self.compile_expr(*cond, scope);
                let then_flow = self.compile_tail(*then_id, scope, self_depth, arity);
                let else_flow = self.compile_tail(*else_id, scope, self_depth, arity);
                TailCode::new(move |session, env| match cond_code.run(session, env)? {
                    Value::Bool(true) => then_flow.run(session, env),
                    Value::Bool(false) => else_flow.run(session, env),
                    _ => unreachable!("if-condition shape guaranteed by the type checker"),
                })
            }
            CanExpr::Let { name, recursive: false, rhs, body } => {
                let rhs_code = self.compile_expr(*rhs, scope);
                let body_scope = scope.push(*name);
                let body_flow = self.compile_tail(*body, &body_scope, self_depth + 1, arity);
                let name = *name;
                TailCode::new(move |session, env| {
                    let value = rhs_code.run(session, env)?;
                    let env2 = env.bind(name, value);
                    body_flow.run(session, &env2)
                })
            }
            _ => {
                if let Some(args) = self.match_saturated_self_call(id, scope, self_depth, arity) {
                    return TailCode::new(move |session, env| {
                        let mut values = Vec::with_capacity(args.len());
                        for arg in &args {
                            values.push(arg.run(session, env)?);
                        }
                        Ok(Flow::Tail(values))
                    });
                }
                let code = self.compile_expr(id, scope);
                TailCode::new(move |session, env| Ok(Flow::Done(code.run(session, env)?)))
            }
        }
    }

    /// Recognise `Apply(Apply(...Apply(Var(_), a1)..., a_{n-1}), an)` with
    /// exactly `arity` arguments, where the applied `Var` resolves to
    /// exactly `self_depth` slots down, returning the compiled argument
    /// expressions in call order.
    fn match_saturated_self_call(&self, id: CanId, scope: &Scope, self_depth: usize, arity: usize) -> Option<Vec<Code>> {
        let mut args_rev = Vec::new();
        let mut current = id;
        loop {
            match &self.arena.get(current).expr {
                CanExpr::Apply(f, x) => {
                    args_rev.push(*x);
                    current = *f;
                }
                CanExpr::Var(name) if scope.depth_of(*name) == Some(self_depth) => break,
                _ => return None,
            }
        }
        if args_rev.len() != arity {
            return None;
        }
        args_rev.reverse();
        Some(args_rev.into_iter().map(|a| self.compile_expr(a, scope)).collect())
    }

    #[must_use]
    pub fn compile_expr(&self, id: CanId, scope: &Scope) -> Code {
        match self.arena.get(id).expr.clone() {
            CanExpr::Literal(lit) => {
                let value = literal_to_value(&lit);
                Code::new("literal", move |_s, _e| Ok(value.clone()))
            }
            CanExpr::Var(name) => self.compile_var(name, scope),
            CanExpr::Tuple(items) => {
                let codes: Vec<Code> = items.iter().map(|i| self.compile_expr(*i, scope)).collect();
                Code::new("tuple", move |session, env| {
                    let mut values = Vec::with_capacity(codes.len());
                    for c in &codes {
                        values.push(c.run(session, env)?);
                    }
                    Ok(Value::tuple(values))
                })
            }
            CanExpr::Record(fields) => {
                let codes: Vec<(Name, Code)> = fields.iter().map(|(n, i)| (*n, self.compile_expr(*i, scope))).collect();
                Code::new("record", move |session, env| {
                    let mut values = Vec::with_capacity(codes.len());
                    for (name, c) in &codes {
                        values.push((*name, c.run(session, env)?));
                    }
                    Ok(Value::record(values))
                })
            }
            CanExpr::List(items) => {
                let codes: Vec<Code> = items.iter().map(|i| self.compile_expr(*i, scope)).collect();
                Code::new("list", move |session, env| {
                    let mut values = Vec::with_capacity(codes.len());
                    for c in &codes {
                        values.push(c.run(session, env)?);
                    }
                    Ok(Value::list(values))
                })
            }
            CanExpr::Apply(f, x) => {
                let f_code = self.compile_expr(f, scope);
                let x_code = self.compile_expr(x, scope);
                Code::new("apply", move |session, env| {
                    let f_val = f_code.run(session, env)?;
                    let x_val = x_code.run(session, env)?;
                    apply_value(session, f_val, x_val)
                })
            }
            CanExpr::PrimOp(op, l, r) => self.compile_primop(op, l, r, scope),
            CanExpr::Let { name, recursive, rhs, body } => self.compile_let(name, recursive, rhs, body, scope),
            CanExpr::Fn(param, body) => self.compile_fn(param, body, scope),
            CanExpr::Case(scrutinee, tree, bodies) => self.compile_case(scrutinee, &tree, &bodies, scope),
            CanExpr::If(c, t, f) => {
                let c_code = self.compile_expr(c, scope);
                let t_code = self.compile_expr(t, scope);
                let f_code = self.compile_expr(f, scope);
                Code::new("if", move |session, env| match c_code.run(session, env)? {
                    Value::Bool(true) => t_code.run(session, env),
                    Value::Bool(false) => f_code.run(session, env),
                    _ => unreachable!("if-condition shape guaranteed by the type checker"),
                })
            }
            CanExpr::Handle(body, tree, bodies) => self.compile_handle(body, &tree, &bodies, scope),
            CanExpr::Raise(inner) => {
                let inner_code = self.compile_expr(inner, scope);
                Code::new("raise", move |session, env| {
                    let exn = inner_code.run(session, env)?;
                    Err(EvalError::Exn { exn, pos: None })
                })
            }
            CanExpr::CtorApp(name, args) => {
                let codes: Vec<Code> = args.iter().map(|a| self.compile_expr(*a, scope)).collect();
                Code::new("ctor", move |session, env| {
                    let mut values = Vec::with_capacity(codes.len());
                    for c in &codes {
                        values.push(c.run(session, env)?);
                    }
                    if session.registry.is_exception(name) {
                        Ok(Value::Exn(name, values.into_iter().next().map(Rc::new)))
                    } else {
                        Ok(Value::ctor(name, values))
                    }
                })
            }
            CanExpr::Project(inner, field) => {
                let inner_code = self.compile_expr(inner, scope);
                Code::new("project", move |session, env| {
                    let value = inner_code.run(session, env)?;
                    match value.field(field) {
                        Some(v) => Ok(v.clone()),
                        None => Err(EvalError::Bind { pos: None }),
                    }
                })
            }
            CanExpr::TupleProject(inner, idx) => {
                let inner_code = self.compile_expr(inner, scope);
                Code::new("tuple-project", move |session, env| match inner_code.run(session, env)? {
                    Value::Tuple(items) if idx < items.len() => Ok(items[idx].clone()),
                    _ => Err(EvalError::Bind { pos: None }),
                })
            }
            CanExpr::CtorProject(inner, idx) => {
                let inner_code = self.compile_expr(inner, scope);
                Code::new("ctor-project", move |session, env| match inner_code.run(session, env)? {
                    Value::Ctor(_, args) if idx < args.len() => Ok(args[idx].clone()),
                    Value::Exn(_, Some(payload)) if idx == 0 => Ok((*payload).clone()),
                    _ => Err(EvalError::Bind { pos: None }),
                })
            }
            CanExpr::Rel(rel_expr) => self.compile_rel_expr(id, rel_expr, scope),
        }
    }

    fn compile_var(&self, name: Name, scope: &Scope) -> Code {
        match scope.depth_of(name) {
            Some(depth) => Code::new("var-local", move |_s, env| Ok(env.at_depth(depth))),
            None => Code::new("var-global", move |_s, env| match env.lookup(name) {
                Some(v) => Ok(v),
                None => unreachable!("unbound name survived the Resolver"),
            }),
        }
    }

    fn compile_primop(&self, op: PrimOp, l: CanId, r: CanId, scope: &Scope) -> Code {
        let l_code = self.compile_expr(l, scope);
        let r_code = self.compile_expr(r, scope);
        Code::new("primop", move |session, env| {
            let lv = l_code.run(session, env)?;
            let rv = r_code.run(session, env)?;
            match op {
                PrimOp::Add => eval_add(&lv, &rv, None),
                PrimOp::Sub => eval_sub(&lv, &rv, None),
                PrimOp::Mul => eval_mul(&lv, &rv, None),
                PrimOp::Div => eval_div(&lv, &rv, None),
                PrimOp::Concat => Ok(eval_concat(&lv, &rv)),
                PrimOp::Eq => Ok(Value::Bool(value_eq(&lv, &rv))),
                PrimOp::Neq => Ok(Value::Bool(!value_eq(&lv, &rv))),
                PrimOp::Lt => Ok(Value::Bool(crate::ops::cmp_value(&lv, &rv) == std::cmp::Ordering::Less)),
                PrimOp::Le => Ok(Value::Bool(crate::ops::cmp_value(&lv, &rv) != std::cmp::Ordering::Greater)),
                PrimOp::Gt => Ok(Value::Bool(crate::ops::cmp_value(&lv, &rv) == std::cmp::Ordering::Greater)),
                PrimOp::Ge => Ok(Value::Bool(crate::ops::cmp_value(&lv, &rv) != std::cmp::Ordering::Less)),
            }
        })
    }

    fn compile_let(&self, name: Name, recursive: bool, rhs: CanId, body: CanId, scope: &Scope) -> Code {
        if recursive {
            let rhs_code_inner_scope = scope.push(name);
            let rhs_code = self.compile_expr(rhs, &rhs_code_inner_scope);
            let body_code = self.compile_expr(body, &rhs_code_inner_scope);
            return Code::new("let-rec", move |session, env| {
                let cell = Rc::new(RefCell::new(Value::Unit));
                let rec_env = env.bind_cell(name, Rc::clone(&cell));
                let value = rhs_code.run(session, &rec_env)?;
                *cell.borrow_mut() = value;
                body_code.run(session, &rec_env)
            });
        }
        let rhs_code = self.compile_expr(rhs, scope);
        let body_scope = scope.push(name);
        let body_code = self.compile_expr(body, &body_scope);
        Code::new("let", move |session, env| {
            let value = rhs_code.run(session, env)?;
            let env2 = env.bind(name, value);
            body_code.run(session, &env2)
        })
    }

    fn compile_fn(&self, param: Name, body: CanId, scope: &Scope) -> Code {
        let body_scope = scope.push(param);
        let body_code = self.compile_expr(body, &body_scope);
        Code::new("fn", move |_session, env| {
            Ok(Value::Closure(Rc::new(Closure { param, body: body_code.clone(), env: env.clone(), self_name: None })))
        })
    }

    fn compile_case(&self, scrutinee: CanId, tree: &DecisionTree, bodies: &[CanId], scope: &Scope) -> Code {
        let scrutinee_code = self.compile_expr(scrutinee, scope);
        let compiled_tree = self.compile_tree(tree, bodies, scope);
        Code::new("case", move |session, env| {
            let value = scrutinee_code.run(session, env)?;
            match run_tree(session, env, &compiled_tree, &value)? {
                Some(v) => Ok(v),
                None => Err(EvalError::Match { pos: None }),
            }
        })
    }

    /// `handle body | pat1 => arm1 | ...`: the body is evaluated first; a
    /// normal result short-circuits straight through with no matching
    /// attempted at all (spec §4.2 "a `handle` whose body returns normally
    /// never touches its arms"). Only an `EvalError::Exn` raised by the
    /// body is matched against the decision tree; an unmatched packet is
    /// re-raised unchanged, never turned into a fresh `Match` failure.
    fn compile_handle(&self, body: CanId, tree: &DecisionTree, bodies: &[CanId], scope: &Scope) -> Code {
        let body_code = self.compile_expr(body, scope);
        let compiled_tree = self.compile_tree(tree, bodies, scope);
        Code::new("handle", move |session, env| match body_code.run(session, env) {
            Ok(v) => Ok(v),
            Err(EvalError::Exn { exn, pos }) => match run_tree(session, env, &compiled_tree, &exn)? {
                Some(v) => Ok(v),
                None => Err(EvalError::Exn { exn, pos }),
            },
            Err(other) => Err(other),
        })
    }

    /// Compile a `DecisionTree` into a [`CompiledTree`], compiling each
    /// arm's body exactly once against a canonical binding order (the
    /// first `Leaf` encountered targeting that arm), and each leaf's guard
    /// against that leaf's own binding order (spec §4.3: or-pattern rows
    /// can reorder bindings relative to their arm's other rows).
    fn compile_tree(&self, tree: &DecisionTree, bodies: &[CanId], scope: &Scope) -> CompiledTree {
        let mut arm_order: FxHashMap<usize, Vec<Name>> = FxHashMap::default();
        collect_arm_order(tree, &mut arm_order);
        let mut arm_bodies: FxHashMap<usize, Code> = FxHashMap::default();
        for (arm, order) in &arm_order {
            let arm_scope = scope.push_all(order);
            arm_bodies.insert(*arm, self.compile_expr(bodies[*arm], &arm_scope));
        }
        self.compile_tree_node(tree, scope, &arm_order, &arm_bodies)
    }

    fn compile_tree_node(
        &self,
        tree: &DecisionTree,
        scope: &Scope,
        arm_order: &FxHashMap<usize, Vec<Name>>,
        arm_bodies: &FxHashMap<usize, Code>,
    ) -> CompiledTree {
        match tree {
            DecisionTree::Fail => CompiledTree::Fail,
            DecisionTree::Leaf { arm, bindings, guard, fallback } => {
                let guard_scope = scope.push_all(&bindings.iter().map(|(n, _)| *n).collect::<Vec<_>>());
                let guard_code = guard.map(|g| self.compile_expr(g, &guard_scope));
                let fallback_tree = fallback.as_ref().map(|f| Box::new(self.compile_tree_node(f, scope, arm_order, arm_bodies)));
                CompiledTree::Leaf {
                    bindings: bindings.clone(),
                    canonical_order: arm_order.get(arm).cloned().unwrap_or_default(),
                    guard: guard_code,
                    body: arm_bodies.get(arm).cloned().unwrap_or_else(|| unreachable!("arm body compiled for every leaf's arm index")),
                    fallback: fallback_tree,
                }
            }
            DecisionTree::Switch { occurrence, cases, default } => {
                let compiled_cases = cases.iter().map(|(test, sub)| (test.clone(), self.compile_tree_node(sub, scope, arm_order, arm_bodies))).collect();
                let compiled_default = default.as_ref().map(|d| Box::new(self.compile_tree_node(d, scope, arm_order, arm_bodies)));
                CompiledTree::Switch { occurrence: occurrence.clone(), cases: compiled_cases, default: compiled_default }
            }
        }
    }

    fn compile_rel_expr(&self, id: CanId, rel_expr: weft_canon::RelExpr, scope: &Scope) -> Code {
        let target_schema = self.arena.get(id).ty;
        let mut compile_cb = |cid: CanId, s: &Scope| self.compile_expr(cid, s);
        let (compiled, _) = rel::compile_rel(&rel_expr, scope, &mut compile_cb);
        Code::new("rel", move |session, env| {
            if let Some(builder) = session.rel_builder().cloned() {
                return builder.build(&rel_expr, target_schema);
            }
            let rows = rel::materialize(session, env, &compiled)?;
            Ok(Value::RelSeq(Rc::new(crate::value::RelSeqCell::from_rows(rows))))
        })
    }
}

fn collect_arm_order(tree: &DecisionTree, arm_order: &mut FxHashMap<usize, Vec<Name>>) {
    match tree {
        DecisionTree::Fail => {}
        DecisionTree::Leaf { arm, bindings, fallback, .. } => {
            arm_order.entry(*arm).or_insert_with(|| bindings.iter().map(|(n, _)| *n).collect());
            if let Some(fb) = fallback {
                collect_arm_order(fb, arm_order);
            }
        }
        DecisionTree::Switch { cases, default, .. } => {
            for (_, sub) in cases {
                collect_arm_order(sub, arm_order);
            }
            if let Some(d) = default {
                collect_arm_order(d, arm_order);
            }
        }
    }
}

/// Mirrors `DecisionTree` with every leaf's guard and body already
/// compiled to `Code`.
enum CompiledTree {
    Leaf {
        bindings: Vec<(Name, weft_canon::Occurrence)>,
        canonical_order: Vec<Name>,
        guard: Option<Code>,
        body: Code,
        fallback: Option<Box<CompiledTree>>,
    },
    Fail,
    Switch {
        occurrence: weft_canon::Occurrence,
        cases: Vec<(weft_canon::CaseTest, CompiledTree)>,
        default: Option<Box<CompiledTree>>,
    },
}

/// Walk `tree` against `scrutinee`, returning `Ok(None)` when no leaf
/// matches (the caller turns this into `Match` for `case` or a re-raise
/// for `handle`).
fn run_tree(session: &mut Session, env: &Environment, tree: &CompiledTree, scrutinee: &Value) -> Result<Option<Value>, EvalError> {
    match tree {
        CompiledTree::Fail => Ok(None),
        CompiledTree::Leaf { bindings, canonical_order, guard, body, fallback, .. } => {
            let mut projected: FxHashMap<Name, Value> = FxHashMap::default();
            for (name, occ) in bindings {
                projected.insert(*name, project(scrutinee, occ));
            }
            if let Some(guard_code) = guard {
                let mut guard_env = env.clone();
                for (name, _) in bindings {
                    guard_env = guard_env.bind(*name, projected[name].clone());
                }
                match guard_code.run(session, &guard_env)? {
                    Value::Bool(true) => {}
                    Value::Bool(false) => {
                        return match fallback {
                            Some(fb) => run_tree(session, env, fb, scrutinee),
                            None => Ok(None),
                        };
                    }
                    _ => unreachable!("guard expression shape guaranteed by the type checker"),
                }
            }
            let mut body_env = env.clone();
            for name in canonical_order {
                body_env = body_env.bind(*name, projected[name].clone());
            }
            Ok(Some(body.run(session, &body_env)?))
        }
        CompiledTree::Switch { occurrence, cases, default } => {
            let at_occ = project(scrutinee, occurrence);
            for (test, subtree) in cases {
                if value_matches_test(&at_occ, test, &session.registry) {
                    return run_tree(session, env, subtree, scrutinee);
                }
            }
            match default {
                Some(d) => run_tree(session, env, d, scrutinee),
                None => Ok(None),
            }
        }
    }
}

fn literal_to_value(lit: &weft_ir::Literal) -> Value {
    match lit {
        weft_ir::Literal::Int(i) => Value::Int(*i),
        weft_ir::Literal::Real(r) => Value::Real(*r),
        weft_ir::Literal::String(s) => Value::str(s.clone()),
        weft_ir::Literal::Char(c) => Value::Char(*c),
        weft_ir::Literal::Bool(b) => Value::Bool(*b),
        weft_ir::Literal::Unit => Value::Unit,
    }
}

/// A tail-position compilation: like `Code`, but produces a [`Flow`]
/// instead of a bare `Value` so the tail-call loop can tell a finished
/// result from a saturated self-call that should continue the loop.
struct TailCode {
    run: Rc<dyn Fn(&mut Session, &Environment) -> Result<Flow, EvalError>>,
}

impl TailCode {
    fn new(f: impl Fn(&mut Session, &Environment) -> Result<Flow, EvalError> + 'static) -> Self {
        TailCode { run: Rc::new(f) }
    }

    fn run(&self, session: &mut Session, env: &Environment) -> Result<Flow, EvalError> {
        (self.run)(session, env)
    }
}

impl Clone for TailCode {
    fn clone(&self) -> Self {
        TailCode { run: Rc::clone(&self.run) }
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "tests use unwrap for brevity")]
mod tests {
    use super::*;
    use crate::session::Session;
    use weft_canon::{CaseTest, DecisionTree, Occurrence, PathStep};
    use weft_ir::{Literal, StringInterner};
    use weft_types::Idx;

    fn lit(arena: &mut CanArena, ty: Idx, n: i64) -> CanId {
        arena.push(CanExpr::Literal(Literal::Int(n)), ty)
    }

    fn run(arena: &CanArena, id: CanId, session: &mut Session) -> Value {
        let code = Compiler::new(arena).compile_expr(id, &Scope::root());
        let env = session.env().clone();
        code.run(session, &env).unwrap()
    }

    fn as_int(v: &Value) -> i64 {
        match v {
            Value::Int(i) => *i,
            other => panic!("expected an int, got {other:?}"),
        }
    }

    #[test]
    fn literal_evaluates_to_itself() {
        let mut session = Session::new();
        let mut arena = CanArena::new();
        let ty = session.pool.int();
        let id = lit(&mut arena, ty, 41);
        assert_eq!(as_int(&run(&arena, id, &mut session)), 41);
    }

    #[test]
    fn primop_add_evaluates_both_sides() {
        let mut session = Session::new();
        let mut arena = CanArena::new();
        let ty = session.pool.int();
        let a = lit(&mut arena, ty, 2);
        let b = lit(&mut arena, ty, 3);
        let id = arena.push(CanExpr::PrimOp(PrimOp::Add, a, b), ty);
        assert_eq!(as_int(&run(&arena, id, &mut session)), 5);
    }

    #[test]
    fn if_selects_the_matching_branch() {
        let mut session = Session::new();
        let mut arena = CanArena::new();
        let ty = session.pool.int();
        let bool_ty = session.pool.bool();
        let cond = arena.push(CanExpr::Literal(Literal::Bool(false)), bool_ty);
        let then_branch = lit(&mut arena, ty, 1);
        let else_branch = lit(&mut arena, ty, 2);
        let id = arena.push(CanExpr::If(cond, then_branch, else_branch), ty);
        assert_eq!(as_int(&run(&arena, id, &mut session)), 2);
    }

    #[test]
    fn let_binds_its_rhs_in_the_body() {
        let mut session = Session::new();
        let mut arena = CanArena::new();
        let ty = session.pool.int();
        let mut interner = StringInterner::new();
        let x = interner.intern("x");
        let rhs = lit(&mut arena, ty, 10);
        let var = arena.push(CanExpr::Var(x), ty);
        let one = lit(&mut arena, ty, 1);
        let body = arena.push(CanExpr::PrimOp(PrimOp::Add, var, one), ty);
        let id = arena.push(CanExpr::Let { name: x, recursive: false, rhs, body }, ty);
        assert_eq!(as_int(&run(&arena, id, &mut session)), 11);
    }

    #[test]
    fn tuple_project_extracts_the_given_component() {
        let mut session = Session::new();
        let mut arena = CanArena::new();
        let ty = session.pool.int();
        let a = lit(&mut arena, ty, 7);
        let b = lit(&mut arena, ty, 9);
        let tuple = arena.push(CanExpr::Tuple(vec![a, b]), ty);
        let id = arena.push(CanExpr::TupleProject(tuple, 1), ty);
        assert_eq!(as_int(&run(&arena, id, &mut session)), 9);
    }

    #[test]
    fn record_project_looks_up_by_field_name() {
        let mut session = Session::new();
        let mut arena = CanArena::new();
        let ty = session.pool.int();
        let mut interner = StringInterner::new();
        let field = interner.intern("count");
        let value = lit(&mut arena, ty, 3);
        let record = arena.push(CanExpr::Record(vec![(field, value)]), ty);
        let id = arena.push(CanExpr::Project(record, field), ty);
        assert_eq!(as_int(&run(&arena, id, &mut session)), 3);
    }

    #[test]
    fn fn_and_apply_round_trip_through_a_closure() {
        let mut session = Session::new();
        let mut arena = CanArena::new();
        let ty = session.pool.int();
        let mut interner = StringInterner::new();
        let x = interner.intern("x");
        let var = arena.push(CanExpr::Var(x), ty);
        let one = lit(&mut arena, ty, 1);
        let body = arena.push(CanExpr::PrimOp(PrimOp::Add, var, one), ty);
        let f = arena.push(CanExpr::Fn(x, body), ty);
        let arg = lit(&mut arena, ty, 4);
        let id = arena.push(CanExpr::Apply(f, arg), ty);
        assert_eq!(as_int(&run(&arena, id, &mut session)), 5);
    }

    /// `let rec go n acc = if n = 0 then acc else go (n - 1) (acc + n)` applied
    /// to a large `n`: the tail-call loop (spec §4.6) must not grow the Rust
    /// call stack, so this would overflow it if the loop recognition in
    /// `compile_recursive`/`compile_tail` silently failed to fire.
    #[test]
    fn saturated_self_tail_call_loops_instead_of_recursing() {
        let mut session = Session::new();
        let mut arena = CanArena::new();
        let ty = session.pool.int();
        let bool_ty = session.pool.bool();
        let mut interner = StringInterner::new();
        let go = interner.intern("go");
        let n = interner.intern("n");
        let acc = interner.intern("acc");

        let n_var = arena.push(CanExpr::Var(n), ty);
        let acc_var = arena.push(CanExpr::Var(acc), ty);
        let zero = lit(&mut arena, ty, 0);
        let cond = arena.push(CanExpr::PrimOp(PrimOp::Eq, n_var, zero), bool_ty);

        let one = lit(&mut arena, ty, 1);
        let n_minus_1 = arena.push(CanExpr::PrimOp(PrimOp::Sub, n_var, one), ty);
        let acc_plus_n = arena.push(CanExpr::PrimOp(PrimOp::Add, acc_var, n_var), ty);
        let go_ref1 = arena.push(CanExpr::Var(go), ty);
        let partial = arena.push(CanExpr::Apply(go_ref1, n_minus_1), ty);
        let recurse = arena.push(CanExpr::Apply(partial, acc_plus_n), ty);

        let acc_var2 = arena.push(CanExpr::Var(acc), ty);
        let if_node = arena.push(CanExpr::If(cond, acc_var2, recurse), ty);
        let inner_fn = arena.push(CanExpr::Fn(acc, if_node), ty);
        let outer_fn = arena.push(CanExpr::Fn(n, inner_fn), ty);

        let scope = Scope::root();
        let code = Compiler::new(&arena).compile_value_decl(go, true, outer_fn, &scope);
        let env = session.env().clone();
        let go_val = code.run(&mut session, &env).unwrap();

        let big_n = Value::Int(200_000);
        let with_n = apply_value(&mut session, go_val, big_n).unwrap();
        let result = apply_value(&mut session, with_n, Value::Int(0)).unwrap();
        assert_eq!(as_int(&result), (1..=200_000i64).sum::<i64>());
    }

    #[test]
    fn raise_unwinds_with_the_exception_value() {
        let mut session = Session::new();
        let mut arena = CanArena::new();
        let ty = session.pool.unit();
        let mut interner = StringInterner::new();
        let boom = interner.intern("Boom");
        session.registry.declare_exception(boom, None);
        let ctor = arena.push(CanExpr::CtorApp(boom, vec![]), ty);
        let id = arena.push(CanExpr::Raise(ctor), ty);
        let code = Compiler::new(&arena).compile_expr(id, &Scope::root());
        let env = session.env().clone();
        match code.run(&mut session, &env) {
            Err(EvalError::Exn { exn: Value::Exn(name, payload), .. }) => {
                assert_eq!(name, boom);
                assert!(payload.is_none());
            }
            other => panic!("expected an EvalError::Exn, got {other:?}"),
        }
    }

    /// `handle (raise Boom) | Boom => 99`: the handler's decision tree
    /// matches the `Value::Exn` packet the same way a `case` matches a
    /// `Value::Ctor` (spec §4.2).
    #[test]
    fn handle_catches_a_matching_raise() {
        let mut session = Session::new();
        let mut arena = CanArena::new();
        let ty = session.pool.int();
        let unit_ty = session.pool.unit();
        let mut interner = StringInterner::new();
        let boom = interner.intern("Boom");
        session.registry.declare_exception(boom, None);

        let ctor = arena.push(CanExpr::CtorApp(boom, vec![]), unit_ty);
        let body = arena.push(CanExpr::Raise(ctor), ty);
        let arm_body = lit(&mut arena, ty, 99);

        let tree = DecisionTree::Switch {
            occurrence: Occurrence::new(),
            cases: vec![(CaseTest::Ctor(boom), DecisionTree::Leaf { arm: 0, bindings: vec![], guard: None, fallback: None })],
            default: None,
        };
        let id = arena.push(CanExpr::Handle(body, tree, vec![arm_body]), ty);
        assert_eq!(as_int(&run(&arena, id, &mut session)), 99);
    }

    /// A `handle` whose body returns normally never consults its arms at
    /// all (spec §4.2) — a `Fail` tree would turn any attempted match into
    /// an `EvalError::Match`, so this would fail if that short-circuit
    /// wasn't wired up.
    #[test]
    fn handle_short_circuits_a_normal_result() {
        let mut session = Session::new();
        let mut arena = CanArena::new();
        let ty = session.pool.int();
        let body = lit(&mut arena, ty, 5);
        let tree = DecisionTree::Fail;
        let id = arena.push(CanExpr::Handle(body, tree, vec![]), ty);
        assert_eq!(as_int(&run(&arena, id, &mut session)), 5);
    }

    /// `case (1, 2) of (a, _) => a`: a two-row `Switch`/`Leaf` tree over a
    /// tuple occurrence, binding `a` from `PathStep::TupleIndex(0)`.
    #[test]
    fn case_over_a_tuple_binds_from_the_decision_tree() {
        let mut session = Session::new();
        let mut arena = CanArena::new();
        let ty = session.pool.int();
        let mut interner = StringInterner::new();
        let a = interner.intern("a");

        let first = lit(&mut arena, ty, 1);
        let second = lit(&mut arena, ty, 2);
        let scrutinee = arena.push(CanExpr::Tuple(vec![first, second]), ty);
        let a_var = arena.push(CanExpr::Var(a), ty);

        let tree = DecisionTree::Leaf { arm: 0, bindings: vec![(a, vec![PathStep::TupleIndex(0)])], guard: None, fallback: None };
        let id = arena.push(CanExpr::Case(scrutinee, tree, vec![a_var]), ty);
        assert_eq!(as_int(&run(&arena, id, &mut session)), 1);
    }

    #[test]
    fn case_with_no_matching_leaf_raises_match_error() {
        let mut session = Session::new();
        let mut arena = CanArena::new();
        let ty = session.pool.int();
        let scrutinee = lit(&mut arena, ty, 1);
        let tree = DecisionTree::Fail;
        let id = arena.push(CanExpr::Case(scrutinee, tree, vec![]), ty);
        let code = Compiler::new(&arena).compile_expr(id, &Scope::root());
        let env = session.env().clone();
        assert!(matches!(code.run(&mut session, &env), Err(EvalError::Match { .. })));
    }
}

