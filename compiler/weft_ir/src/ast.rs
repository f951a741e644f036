//! Surface AST — the untyped, position-tagged tree a parser hands to the
//! `TypeResolver`. This crate only defines the shape; lexing/parsing is an
//! external collaborator (spec §1).

use crate::{Name, Pos};

/// A literal constant.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Int(i64),
    Real(f64),
    String(String),
    Char(char),
    Bool(bool),
    Unit,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos: Pos,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Ident(Name),
    Tuple(Vec<Expr>),
    Record(Vec<(Name, Expr)>),
    List(Vec<Expr>),
    Apply(Box<Expr>, Box<Expr>),
    Infix(Name, Box<Expr>, Box<Expr>),
    Let(Vec<Decl>, Box<Expr>),
    Fn(Box<Pattern>, Box<Expr>),
    Case(Box<Expr>, Vec<MatchArm>),
    If(Box<Expr>, Box<Expr>, Box<Expr>),
    Handle(Box<Expr>, Vec<MatchArm>),
    Raise(Box<Expr>),
    /// `from p in e [where pred]* [yield e]` — a set-builder pipeline the
    /// Relationalizer may later recognise (spec §4.5).
    From(Vec<FromClause>),
    /// `field`-qualified projection, `e.field`.
    Project(Box<Expr>, Name),
}

#[derive(Clone, Debug, PartialEq)]
pub enum FromClause {
    Source { pat: Pattern, source: Expr },
    Where(Expr),
    Yield(Expr),
    OrderBy(Expr),
}

#[derive(Clone, Debug, PartialEq)]
pub struct MatchArm {
    pub pattern: Pattern,
    pub guard: Option<Expr>,
    pub body: Expr,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Pattern {
    pub kind: PatternKind,
    pub pos: Pos,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PatternKind {
    Wildcard,
    Var(Name),
    Literal(Literal),
    /// Constructor application, e.g. `Some x` or nullary `None`.
    Ctor(Name, Vec<Pattern>),
    Tuple(Vec<Pattern>),
    /// Record pattern; `has_rest` marks a trailing `...`.
    Record { fields: Vec<(Name, Pattern)>, has_rest: bool },
    As(Name, Box<Pattern>),
    /// Layered pattern `p1 | p2` combining alternatives under one arm.
    Layered(Vec<Pattern>),
    Annotated(Box<Pattern>, TypeExpr),
}

/// A surface type annotation, resolved against the `TypeSystem` during
/// inference. Kept separate from the inferred `weft_types::Idx` so the
/// surface tree stays untyped until the `TypeResolver` runs.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeExpr {
    Named(Name, Vec<TypeExpr>),
    Var(Name),
    Fun(Box<TypeExpr>, Box<TypeExpr>),
    Tuple(Vec<TypeExpr>),
    Record(Vec<(Name, TypeExpr)>),
    List(Box<TypeExpr>),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Decl {
    Value { pat: Pattern, rhs: Expr, pos: Pos },
    Function { name: Name, params: Vec<Pattern>, body: Expr, pos: Pos },
    Type { name: Name, params: Vec<Name>, ctors: Vec<CtorDecl>, pos: Pos },
    Exception { name: Name, arg: Option<TypeExpr>, pos: Pos },
}

#[derive(Clone, Debug, PartialEq)]
pub struct CtorDecl {
    pub name: Name,
    pub args: Vec<TypeExpr>,
}

/// A top-level statement: either a declaration or a bare expression (which
/// binds to `it`, per spec §6).
#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Decl(Decl),
    Expr(Expr),
}
