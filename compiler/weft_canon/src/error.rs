//! Failures and warnings produced while lowering typed trees into Core IR
//! (spec §4.3, §7).

use thiserror::Error;
use weft_ir::Pos;

#[derive(Error, Debug, Clone)]
pub enum CompileError {
    /// A `case`/`handle` arm can never be selected (spec §4.3 "fail
    /// compilation with `match redundant`"; §8 property 5 "redundant rows
    /// are rejected"). Fatal, unlike non-exhaustiveness.
    #[error("match arm {arm_index} is unreachable")]
    RedundantMatch { pos: Pos, arm_index: usize },

    #[error("unbound constructor `{name}`")]
    UnboundCtor { name: String, pos: Pos },

    #[error("unbound identifier `{name}`")]
    UnboundIdentifier { name: String, pos: Pos },
}

impl CompileError {
    #[must_use]
    pub fn pos(&self) -> Pos {
        match self {
            CompileError::RedundantMatch { pos, .. }
            | CompileError::UnboundCtor { pos, .. }
            | CompileError::UnboundIdentifier { pos, .. } => *pos,
        }
    }

    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            CompileError::RedundantMatch { .. } => "CompileError::RedundantMatch",
            CompileError::UnboundCtor { .. } => "CompileError::UnboundCtor",
            CompileError::UnboundIdentifier { .. } => "CompileError::UnboundIdentifier",
        }
    }
}

impl From<CompileError> for weft_diagnostic::Diagnostic {
    fn from(err: CompileError) -> Self {
        weft_diagnostic::Diagnostic::error(err.kind_name(), err.to_string(), err.pos())
    }
}

/// A non-exhaustive `case`/`handle` (spec §4.3, §8 property 5) — compilation
/// still succeeds; the compiled `Fail` leaf raises `EvalError::Match` at
/// runtime if the uncovered case is ever reached.
#[derive(Clone, Debug)]
pub struct CompileWarning {
    pub pos: Pos,
}

impl From<CompileWarning> for weft_diagnostic::Diagnostic {
    fn from(w: CompileWarning) -> Self {
        weft_diagnostic::Diagnostic::warning("CompileWarning::NonExhaustiveMatch", "match is not exhaustive".to_string(), w.pos)
    }
}
