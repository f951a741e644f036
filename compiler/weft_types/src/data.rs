//! The structural shapes a [`crate::Idx`] can resolve to (spec §3 "Type").

use crate::{Idx, Rank, TypeFlags};
use weft_ir::Name;

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Prim {
    Int,
    Real,
    String,
    Char,
    Bool,
    Unit,
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum TypeData {
    Primitive(Prim),
    /// An unbound or resolved type variable; see [`VarState`].
    Var(VarId),
    Fun(Idx, Idx),
    /// `n >= 2` per spec §3.
    Tuple(Vec<Idx>),
    /// Fields sorted by label for moniker/equality purposes.
    Record(Vec<(Name, Idx)>),
    List(Idx),
    /// `(T1, ..., Tk) name` — an algebraic type instance.
    Data(Name, Vec<Idx>),
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[repr(transparent)]
pub struct VarId(pub(crate) u32);

/// The union-find slot for a type variable: either still unbound (tracked
/// with its creation rank and flags) or linked to a resolved type.
#[derive(Clone, Debug)]
pub enum VarState {
    Unbound { rank: Rank, flags: TypeFlags },
    Linked(Idx),
}
