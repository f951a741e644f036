//! Evaluator failures (spec §7 `EvalError(kind, pos?)`).

use crate::value::Value;
use thiserror::Error;
use weft_ir::Pos;

#[derive(Error, Debug, Clone)]
pub enum EvalError {
    /// No `case`/`handle` arm (including the decision tree's synthesised
    /// default) matched the scrutinee.
    #[error("match failed")]
    Match { pos: Option<Pos> },

    /// An irrefutable `let`/`fn`-parameter pattern didn't match its value
    /// at runtime — only reachable when a value's runtime shape disagrees
    /// with the type it was checked against, which spec §8's soundness
    /// property says should never happen for a well-typed program.
    #[error("bind failed")]
    Bind { pos: Option<Pos> },

    #[error("division by zero")]
    Div { pos: Option<Pos> },

    #[error("arithmetic overflow")]
    Overflow { pos: Option<Pos> },

    /// A user `raise` that is unwinding the call stack looking for a
    /// matching `handle` arm. `exn` is always a `Value::Exn`; kept as a
    /// `Value` rather than a pre-rendered name/payload pair so a `handle`
    /// that catches it can hand the packet straight to its match compiler
    /// without reconstructing it.
    #[error("uncaught exception")]
    Exn { exn: Value, pos: Option<Pos> },

    /// `Session::set_property` with a name outside `HYBRID`,
    /// `TRACE_INLINER`, `MAX_INLINE_PASSES` (SPEC_FULL.md §2).
    #[error("unknown session property `{0}`")]
    UnknownProperty(String),

    /// `RelBuilder::build` or the in-memory fallback was asked to execute a
    /// relational node whose shape it doesn't support (e.g. a `RelSeq`
    /// feeding a plan that expects a materialised `Row` schema mismatch).
    #[error("relational evaluation failed: {0}")]
    Relational(String),
}

impl EvalError {
    #[must_use]
    pub fn pos(&self) -> Option<Pos> {
        match self {
            EvalError::Match { pos } | EvalError::Bind { pos } | EvalError::Div { pos } | EvalError::Overflow { pos } | EvalError::Exn { pos, .. } => *pos,
            EvalError::UnknownProperty(_) | EvalError::Relational(_) => None,
        }
    }

    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            EvalError::Match { .. } => "EvalError::Match",
            EvalError::Bind { .. } => "EvalError::Bind",
            EvalError::Div { .. } => "EvalError::Div",
            EvalError::Overflow { .. } => "EvalError::Overflow",
            EvalError::Exn { .. } => "EvalError::Exn",
            EvalError::UnknownProperty(_) => "EvalError::ConfigError::UnknownProperty",
            EvalError::Relational(_) => "EvalError::Relational",
        }
    }
}

impl From<EvalError> for weft_diagnostic::Diagnostic {
    fn from(err: EvalError) -> Self {
        let pos = err.pos().unwrap_or(Pos::DUMMY);
        weft_diagnostic::Diagnostic::error(err.kind_name(), err.to_string(), pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pos_is_carried_for_positioned_variants_and_absent_for_the_rest() {
        assert_eq!(EvalError::Div { pos: None }.pos(), None);
        assert_eq!(EvalError::Overflow { pos: Some(Pos::DUMMY) }.pos(), Some(Pos::DUMMY));
        assert_eq!(EvalError::UnknownProperty("X".to_string()).pos(), None);
        assert_eq!(EvalError::Relational("bad plan".to_string()).pos(), None);
    }

    #[test]
    fn kind_name_distinguishes_every_variant() {
        assert_eq!(EvalError::Match { pos: None }.kind_name(), "EvalError::Match");
        assert_eq!(EvalError::Exn { exn: Value::Unit, pos: None }.kind_name(), "EvalError::Exn");
        assert_eq!(EvalError::Relational("x".to_string()).kind_name(), "EvalError::Relational");
    }

    #[test]
    fn converting_to_a_diagnostic_falls_back_to_a_dummy_position_when_unpositioned() {
        let diagnostic: weft_diagnostic::Diagnostic = EvalError::Div { pos: None }.into();
        assert_eq!(diagnostic.pos, Pos::DUMMY);
    }
}
