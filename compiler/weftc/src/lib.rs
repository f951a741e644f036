//! Driver crate: wires the type resolver, lowerer, inliner and evaluator
//! into one per-statement pipeline, and renders results the way the host
//! REPL wire format expects (spec §6, §7).

pub mod diagnostic;
pub mod render;
pub mod session;

pub use diagnostic::StatementError;
pub use render::render_value;
pub use session::{Session, StmtOutcome};

/// Run a batch of statements in a fresh session and collect their wire
/// output (spec §6: "a sequence of top-level statements... each produces
/// zero or more output lines"). On the first statement that fails,
/// stops and returns the failure alongside whatever output the
/// successful statements before it produced.
pub fn run_batch(stmts: &[weft_ir::Stmt]) -> (String, Result<(), StatementError>) {
    let mut session = Session::new();
    let mut output = String::new();
    for stmt in stmts {
        match session.run_stmt(stmt) {
            Ok(outcome) => {
                for line in &outcome.lines {
                    output.push_str(line);
                }
            }
            Err(err) => return (output, Err(err)),
        }
    }
    (output, Ok(()))
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "tests use unwrap for brevity")]
mod tests {
    use super::*;
    use weft_ir::{Decl, Expr, ExprKind, Literal, Name, Pattern, PatternKind, Pos, Stmt};

    fn ident(name: Name) -> Expr {
        Expr { kind: ExprKind::Ident(name), pos: Pos::DUMMY }
    }

    fn int_lit(n: i64) -> Expr {
        Expr { kind: ExprKind::Literal(Literal::Int(n)), pos: Pos::DUMMY }
    }

    fn var_pat(name: Name) -> Pattern {
        Pattern { kind: PatternKind::Var(name), pos: Pos::DUMMY }
    }

    #[test]
    fn empty_input_produces_empty_output() {
        let (output, outcome) = run_batch(&[]);
        assert_eq!(output, "");
        assert!(outcome.is_ok());
    }

    #[test]
    fn the_repl_wire_format_example_reproduces_exactly() {
        let mut session = Session::new();
        let x = session.eval_mut().interner.intern("x");
        let plus = session.eval_mut().interner.intern("+");
        let it = session.eval_mut().interner.intern("it");

        let val_x = Stmt::Decl(Decl::Value { pat: var_pat(x), rhs: int_lit(5), pos: Pos::DUMMY });
        let expr_x = Stmt::Expr(ident(x));
        let it_plus_1 =
            Stmt::Expr(Expr { kind: ExprKind::Infix(plus, Box::new(ident(it)), Box::new(int_lit(1))), pos: Pos::DUMMY });

        let mut output = String::new();
        for stmt in [&val_x, &expr_x, &it_plus_1] {
            let outcome = session.run_stmt(stmt).unwrap();
            for line in &outcome.lines {
                output.push_str(line);
            }
        }

        assert_eq!(output, "val x = 5 : int\nval it = 5 : int\nval it = 6 : int\n");
    }
}
