//! The typed surface tree the `TypeResolver` produces: a `weft_ir::Expr`
//! rewritten with a resolved [`weft_types::Idx`] attached to every node.
//! This plays the role of spec §4.2's "TypeMap (AST-node identity → Type)"
//! without a separate identity-keyed side table — each node already knows
//! its own type, which is simpler to keep consistent under rewriting.

use weft_ir::{Name, Pos};
use weft_types::Idx;

#[derive(Clone, Debug)]
pub struct TypedExpr {
    pub kind: TypedExprKind,
    pub ty: Idx,
    pub pos: Pos,
}

#[derive(Clone, Debug)]
pub enum TypedExprKind {
    Literal(weft_ir::Literal),
    Ident(Name),
    Tuple(Vec<TypedExpr>),
    Record(Vec<(Name, TypedExpr)>),
    List(Vec<TypedExpr>),
    Apply(Box<TypedExpr>, Box<TypedExpr>),
    Infix(Name, Box<TypedExpr>, Box<TypedExpr>),
    Let(Vec<TypedDecl>, Box<TypedExpr>),
    Fn(Box<TypedPattern>, Box<TypedExpr>),
    Case(Box<TypedExpr>, Vec<TypedArm>),
    If(Box<TypedExpr>, Box<TypedExpr>, Box<TypedExpr>),
    Handle(Box<TypedExpr>, Vec<TypedArm>),
    Raise(Box<TypedExpr>),
    From(Vec<TypedFromClause>),
    Project(Box<TypedExpr>, Name),
}

#[derive(Clone, Debug)]
pub enum TypedFromClause {
    Source { pat: TypedPattern, source: TypedExpr },
    Where(TypedExpr),
    Yield(TypedExpr),
    OrderBy(TypedExpr),
}

#[derive(Clone, Debug)]
pub struct TypedArm {
    pub pattern: TypedPattern,
    pub guard: Option<TypedExpr>,
    pub body: TypedExpr,
}

#[derive(Clone, Debug)]
pub struct TypedPattern {
    pub kind: TypedPatternKind,
    pub ty: Idx,
    pub pos: Pos,
}

#[derive(Clone, Debug)]
pub enum TypedPatternKind {
    Wildcard,
    Var(Name),
    Literal(weft_ir::Literal),
    Ctor(Name, Vec<TypedPattern>),
    Tuple(Vec<TypedPattern>),
    Record { fields: Vec<(Name, TypedPattern)>, has_rest: bool },
    As(Name, Box<TypedPattern>),
    Layered(Vec<TypedPattern>),
}

#[derive(Clone, Debug)]
pub enum TypedDecl {
    Value { pat: TypedPattern, rhs: TypedExpr, pos: Pos },
    Function { name: Name, params: Vec<TypedPattern>, body: TypedExpr, pos: Pos, ty: Idx },
    /// Type/exception declarations carry no runtime-evaluable body; they
    /// only extend the environment with constructor schemes (spec §4.2).
    Type { name: Name, pos: Pos },
    Exception { name: Name, pos: Pos },
}

/// Output of a successful `TypeResolver` pass over one top-level statement.
pub struct Resolved {
    pub expr: Option<TypedExpr>,
    pub decls: Vec<TypedDecl>,
    pub env: crate::TypeEnv,
}
