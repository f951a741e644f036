//! Per-type-variable flags.

use bitflags::bitflags;

bitflags! {
    /// Flags tracked on a type variable. Only `EQ` is named by spec §4.1
    /// ("equality-admitting"); the others are bookkeeping the unifier uses
    /// to skip work cheaply (mirrors the teacher's `HAS_VAR` fast path).
    #[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
    pub struct TypeFlags: u8 {
        /// Variable may only unify with equality-admitting types.
        const EQ = 0b0000_0001;
        /// Subtree contains at least one unresolved variable (skips the
        /// occurs-check walk when unset).
        const HAS_VAR = 0b0000_0010;
    }
}
