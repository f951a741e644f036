//! Bidirectional Hindley-Milner type inference over the surface AST
//! (spec §4.2 `TypeResolver`).
//!
//! [`TypeResolver`] borrows the session's [`weft_types::UnifyEngine`],
//! [`weft_types::DataTypeRegistry`], interner, and diagnostic
//! [`weft_diagnostic::Warnings`] queue for the duration of one
//! `resolve_stmt` call; none of those are owned here — `weft_eval::Session`
//! is the single place they live together.

mod builtins;
mod env;
mod infer;
mod typed;

pub use builtins::prelude;
pub use env::TypeEnv;
pub use infer::TypeResolver;
pub use typed::{
    Resolved, TypedArm, TypedDecl, TypedExpr, TypedExprKind, TypedFromClause, TypedPattern,
    TypedPatternKind,
};
