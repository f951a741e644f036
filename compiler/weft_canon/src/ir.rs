//! The canonical, sugar-free Core IR (spec §4.3) — one arena of [`CanExpr`]
//! nodes addressed by [`CanId`], mirroring the `CanArena`/`CanId` split the
//! teacher uses to keep the IR cheap to rewrite in place during inlining.

use weft_ir::{Literal, Name};
use weft_types::Idx;

/// Index into a [`CanArena`].
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct CanId(u32);

impl CanId {
    #[must_use]
    pub fn new(raw: u32) -> Self {
        CanId(raw)
    }

    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Debug for CanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CanId({})", self.0)
    }
}

/// Built-in binary operators recognised structurally during lowering (spec
/// §4.3); everything else that looked like an operator in the surface tree
/// was an ordinary identifier application and lowers to `Apply`.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum PrimOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    Concat,
}

#[derive(Clone, Debug)]
pub struct CanNode {
    pub expr: CanExpr,
    /// The node's inferred type, carried through from the typed surface
    /// tree. Synthetic nodes `lower.rs` introduces for pattern
    /// destructuring (projections, generator binders) reuse an enclosing
    /// node's `Idx` rather than a freshly solved one — evaluation dispatches
    /// on the runtime `Value`'s own tag, not on this field, so the
    /// approximation is harmless; it exists for diagnostics only.
    pub ty: Idx,
}

#[derive(Clone, Debug)]
pub enum CanExpr {
    Literal(Literal),
    /// A variable reference, resolved to a stable environment slot later by
    /// `weft_eval::Compiler` (spec §4.6) — Core IR itself only needs the
    /// name.
    Var(Name),
    Tuple(Vec<CanId>),
    Record(Vec<(Name, CanId)>),
    List(Vec<CanId>),
    Apply(CanId, CanId),
    PrimOp(PrimOp, CanId, CanId),
    /// `name = rhs; body` (single binding — multi-binding `let` blocks are
    /// lowered into a chain of nested `Let`s during canonicalization).
    Let { name: Name, recursive: bool, rhs: CanId, body: CanId },
    /// A lambda of exactly one parameter; surface patterns more complex
    /// than a bare variable are elaborated into a `Case` inside the body
    /// during lowering (spec §4.3 "pattern elaboration").
    Fn(Name, CanId),
    Case(CanId, crate::decision_tree::DecisionTree, Vec<CanId>),
    If(CanId, CanId, CanId),
    Handle(CanId, crate::decision_tree::DecisionTree, Vec<CanId>),
    Raise(CanId),
    /// Constructor application, e.g. `Some x`; nullary constructors apply
    /// to zero arguments.
    CtorApp(Name, Vec<CanId>),
    Project(CanId, Name),
    /// Extract tuple component `i`, used to destructure irrefutable tuple
    /// patterns (`let (a, b) = ...`, function parameters) without routing
    /// every projection through a full `Case`.
    TupleProject(CanId, usize),
    /// Extract constructor argument `i`. The tag carried by the runtime
    /// value already identifies the constructor, so no name is needed here
    /// — used only where a pattern is irrefutable by construction
    /// (single-constructor datatypes).
    CtorProject(CanId, usize),
    /// A `from` pipeline the Relationalizer recognised (spec §4.5); not
    /// every pipeline qualifies, see [`crate::relationalize`].
    Rel(crate::relationalize::RelExpr),
}

#[derive(Clone, Debug)]
pub enum CanDecl {
    Value { name: Name, recursive: bool, rhs: CanId },
    /// Type/exception declarations carry no runtime code — they only
    /// extended `weft_types::DataTypeRegistry` during inference.
    None,
}

#[derive(Default)]
pub struct CanArena {
    nodes: Vec<CanNode>,
}

impl CanArena {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, expr: CanExpr, ty: Idx) -> CanId {
        let id = CanId::new(self.nodes.len() as u32);
        self.nodes.push(CanNode { expr, ty });
        id
    }

    #[must_use]
    pub fn get(&self, id: CanId) -> &CanNode {
        &self.nodes[id.index()]
    }

    pub fn get_mut(&mut self, id: CanId) -> &mut CanNode {
        &mut self.nodes[id.index()]
    }

    pub fn set(&mut self, id: CanId, expr: CanExpr) {
        self.nodes[id.index()].expr = expr;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Output of lowering one top-level statement: zero or more declarations
/// plus, for a bare expression statement, its root [`CanId`] (spec §6 `it`).
pub struct CanonResult {
    pub arena: CanArena,
    pub decls: Vec<CanDecl>,
    pub expr: Option<CanId>,
}
