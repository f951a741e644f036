//! Type-checking failures (spec §7 `TypeError`).

use thiserror::Error;
use weft_ir::Pos;

#[derive(Error, Debug, Clone)]
pub enum TypeError {
    #[error("cannot unify `{expected}` with `{actual}`")]
    Mismatch { expected: String, actual: String, pos: Pos },

    #[error("occurs check failed: `{var}` occurs in `{ty}`")]
    OccursCheck { var: String, ty: String, pos: Pos },

    #[error("unbound identifier `{name}`")]
    UnboundIdentifier { name: String, pos: Pos },

    #[error("`{ty}` does not admit equality")]
    EqualityRequired { ty: String, pos: Pos },

    #[error("expected {expected} argument(s), found {found}")]
    ArityMismatch { expected: usize, found: usize, pos: Pos },
}

impl TypeError {
    #[must_use]
    pub fn pos(&self) -> Pos {
        match self {
            TypeError::Mismatch { pos, .. }
            | TypeError::OccursCheck { pos, .. }
            | TypeError::UnboundIdentifier { pos, .. }
            | TypeError::EqualityRequired { pos, .. }
            | TypeError::ArityMismatch { pos, .. } => *pos,
        }
    }

    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            TypeError::Mismatch { .. } => "TypeError::Mismatch",
            TypeError::OccursCheck { .. } => "TypeError::OccursCheck",
            TypeError::UnboundIdentifier { .. } => "TypeError::UnboundIdentifier",
            TypeError::EqualityRequired { .. } => "TypeError::EqualityRequired",
            TypeError::ArityMismatch { .. } => "TypeError::ArityMismatch",
        }
    }
}

impl From<TypeError> for weft_diagnostic::Diagnostic {
    fn from(err: TypeError) -> Self {
        weft_diagnostic::Diagnostic::error(err.kind_name(), err.to_string(), err.pos())
    }
}
