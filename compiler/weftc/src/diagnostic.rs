//! Unifies the three per-crate error types a statement can fail with into
//! one `weft_diagnostic::Diagnostic` for host display (spec §7), and maps
//! each to the host REPL's exit code (spec §6: `0` success, `1` unhandled
//! evaluator exception, `2` parse or type error — a failed compile, like a
//! parse failure, is bucketed with type errors since both abort before
//! evaluation ever starts).

use thiserror::Error;
use weft_canon::CompileError;
use weft_diagnostic::Diagnostic;
use weft_eval::EvalError;
use weft_types::TypeError;

#[derive(Error, Debug, Clone)]
pub enum StatementError {
    #[error(transparent)]
    Type(#[from] TypeError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

impl StatementError {
    #[must_use]
    pub fn into_diagnostic(self) -> Diagnostic {
        match self {
            StatementError::Type(e) => e.into(),
            StatementError::Compile(e) => e.into(),
            StatementError::Eval(e) => e.into(),
        }
    }

    /// The host REPL exit code this failure maps to (spec §6).
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            StatementError::Type(_) | StatementError::Compile(_) => 2,
            StatementError::Eval(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_ir::Pos;

    #[test]
    fn type_and_compile_errors_exit_2_eval_errors_exit_1() {
        let type_err = StatementError::from(TypeError::UnboundIdentifier { name: "x".to_string(), pos: Pos::DUMMY });
        assert_eq!(type_err.exit_code(), 2);

        let compile_err = StatementError::from(CompileError::RedundantMatch { pos: Pos::DUMMY, arm_index: 0 });
        assert_eq!(compile_err.exit_code(), 2);

        let eval_err = StatementError::from(EvalError::Div { pos: None });
        assert_eq!(eval_err.exit_code(), 1);
    }

    #[test]
    fn every_variant_converts_to_a_diagnostic() {
        let err = StatementError::from(EvalError::Div { pos: None });
        let diag = err.into_diagnostic();
        assert_eq!(diag.kind, "EvalError::Div");
    }
}
