//! Index into the type [`Pool`](crate::Pool).

use std::fmt;

/// A handle to an interned type. Two `Idx` values are equal iff the types
/// they name are structurally equal (spec §3 invariant: "the `TypeSystem`
/// interns composite types so reference equality implies structural
/// equality").
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct Idx(u32);

impl Idx {
    #[inline]
    pub const fn new(index: u32) -> Self {
        Idx(index)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for Idx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Idx({})", self.0)
    }
}
