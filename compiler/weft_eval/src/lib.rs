//! Compilation to runnable code and tree-walking evaluation for the Weft
//! interpreter (spec §4.6-4.7, §5).
//!
//! `weft_canon::CanonResult` — a flat arena of already-inferred, already
//! match-compiled Core IR — is the only thing this crate consumes; it has
//! no dependency on `weft_infer`'s inference machinery or `weft_canon`'s
//! lowering/optimisation passes beyond their output types. [`run_program`]
//! is the single entry point `weftc` drives per top-level statement.

mod builtins;
mod catalog;
mod code;
mod compiler;
mod env;
mod error;
mod ops;
mod rel;
mod scope;
mod session;
mod value;

pub use catalog::{Dataset, ExternalCatalog, RelBuilder};
pub use code::Code;
pub use env::Environment;
pub use error::EvalError;
pub use scope::Scope;
pub use session::{Properties, Session, WellKnownNames};
pub use value::{list_from_vec, list_to_vec, Closure, ListNode, NativeFn, RelSeqCell, Value};

use compiler::Compiler;
use weft_canon::{CanDecl, CanonResult};
use weft_ir::Name;

/// One top-level declaration's outcome (spec §4.7 "a `weftc` top-level
/// statement compiles to zero or more bindings"): `None`-shaped decls
/// (datatype/exception declarations) bind nothing.
pub struct Binding {
    pub name: Name,
    pub value: Value,
}

/// Compile and run every declaration in `result.decls` against `session`,
/// binding each successful `Value` decl at the top level as it completes
/// (so a later declaration in the same batch can already see an earlier
/// one, matching a REPL's statement-by-statement visibility), then — if
/// `result.expr` is present — compile and run it without binding anything,
/// returning its value as the batch's trailing expression result (spec §6
/// REPL example: `x;` alone produces an `it` binding one layer up, in
/// `weftc`, not here).
///
/// Stops at the first `EvalError`, leaving every binding compiled before
/// the failure already installed in `session` — matching a REPL's
/// "partial bindings already produced by earlier statements are
/// preserved" behaviour (spec §4.7).
pub fn run_program(session: &mut Session, result: &CanonResult) -> Result<(Vec<Binding>, Option<Value>), EvalError> {
    let compiler = Compiler::new(&result.arena);
    let mut bindings = Vec::new();
    for decl in &result.decls {
        let CanDecl::Value { name, recursive, rhs } = decl else { continue };
        let code = compiler.compile_value_decl(*name, *recursive, *rhs, &Scope::root());
        let env = session.env().clone();
        session.begin_evaluation();
        let value = code.run(session, &env);
        session.end_evaluation();
        let value = value?;
        session.bind_top_level(*name, value.clone());
        bindings.push(Binding { name: *name, value });
    }
    let trailing = match result.expr {
        Some(expr_id) => {
            let code = compiler.compile_expr(expr_id, &Scope::root());
            let env = session.env().clone();
            session.begin_evaluation();
            let value = code.run(session, &env);
            session.end_evaluation();
            Some(value?)
        }
        None => None,
    };
    Ok((bindings, trailing))
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "tests use unwrap for brevity")]
mod tests {
    use super::*;
    use weft_canon::{CanArena, CanExpr, PrimOp};
    use weft_ir::Literal;

    /// A REPL batch of `val x = 5; x + 1;` (spec §6): the `Value` decl binds
    /// `x` at the top level, then the trailing expression sees it.
    #[test]
    fn run_program_binds_decls_before_the_trailing_expression_sees_them() {
        let mut session = Session::new();
        let mut arena = CanArena::new();
        let ty = session.pool.int();
        let x = session.interner.intern("x");

        let five = arena.push(CanExpr::Literal(Literal::Int(5)), ty);
        let x_var = arena.push(CanExpr::Var(x), ty);
        let one = arena.push(CanExpr::Literal(Literal::Int(1)), ty);
        let x_plus_1 = arena.push(CanExpr::PrimOp(PrimOp::Add, x_var, one), ty);

        let result = CanonResult { arena, decls: vec![CanDecl::Value { name: x, recursive: false, rhs: five }], expr: Some(x_plus_1) };

        let (bindings, trailing) = run_program(&mut session, &result).unwrap();
        assert_eq!(bindings.len(), 1);
        assert!(matches!(bindings[0].value, Value::Int(5)));
        assert!(matches!(trailing, Some(Value::Int(6))));
        assert!(matches!(session.env().lookup(x), Some(Value::Int(5))));
    }

    /// A `CanDecl::None` (a bare `datatype`/`exception` declaration) binds
    /// nothing, but doesn't stop later decls in the same batch from running.
    #[test]
    fn run_program_skips_none_decls_without_breaking_the_batch() {
        let mut session = Session::new();
        let mut arena = CanArena::new();
        let ty = session.pool.int();
        let y = session.interner.intern("y");
        let seven = arena.push(CanExpr::Literal(Literal::Int(7)), ty);

        let result =
            CanonResult { arena, decls: vec![CanDecl::None, CanDecl::Value { name: y, recursive: false, rhs: seven }], expr: None };

        let (bindings, trailing) = run_program(&mut session, &result).unwrap();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].name, y);
        assert!(trailing.is_none());
    }

    /// A failing decl still leaves every earlier decl's binding installed
    /// (spec §4.7 "partial bindings already produced by earlier statements
    /// are preserved").
    #[test]
    fn run_program_preserves_earlier_bindings_after_a_later_decl_fails() {
        let mut session = Session::new();
        let mut arena = CanArena::new();
        let ty = session.pool.int();
        let good = session.interner.intern("good");
        let bad = session.interner.intern("bad");

        let value = arena.push(CanExpr::Literal(Literal::Int(1)), ty);
        let zero = arena.push(CanExpr::Literal(Literal::Int(0)), ty);
        let one = arena.push(CanExpr::Literal(Literal::Int(1)), ty);
        let div_by_zero = arena.push(CanExpr::PrimOp(PrimOp::Div, one, zero), ty);

        let result = CanonResult {
            arena,
            decls: vec![
                CanDecl::Value { name: good, recursive: false, rhs: value },
                CanDecl::Value { name: bad, recursive: false, rhs: div_by_zero },
            ],
            expr: None,
        };

        let outcome = run_program(&mut session, &result);
        assert!(matches!(outcome, Err(EvalError::Div { .. })));
        assert!(matches!(session.env().lookup(good), Some(Value::Int(1))));
        assert!(session.env().lookup(bad).is_none());
    }
}
