//! Surface AST types for the Weft compiler.
//!
//! This crate is the leaf of the workspace: it defines the position-tagged,
//! untyped tree a parser hands to [`weft_infer`](../weft_infer/index.html),
//! plus the interned [`Name`] and [`Pos`] types everything downstream keys
//! off. Lexing and parsing themselves are out of scope (spec §1) — callers
//! (including tests) build `Expr`/`Decl` trees directly.
//!
//! The canonical core IR (`CanExpr`/`CanArena`) is *not* defined here: it
//! carries a resolved [`weft_types::Idx`] on every node, so it lives in
//! `weft_canon` next to the passes that build and rewrite it. Keeping it
//! out of this crate avoids the extra `TypeId` indirection the teacher
//! codebase uses to keep its IR crate decoupled from its type crate for
//! incremental-compilation (Salsa) purposes — this interpreter has no
//! persistent compilation cache (spec §1 Non-goals), so the indirection
//! would buy nothing.

mod ast;
mod name;
mod span;

pub use ast::{
    CtorDecl, Decl, Expr, ExprKind, FromClause, Literal, MatchArm, Pattern, PatternKind, Stmt,
    TypeExpr,
};
pub use name::{Name, StringInterner, StringLookup};
pub use span::{Pos, PosDisplay};
