//! Interned identifiers.
//!
//! Every surface and core identifier is interned to a 32-bit `Name` so that
//! equality and hashing are O(1) integer operations instead of string
//! comparisons. The interner lives on the `Session` (see `weft_eval`); this
//! crate only defines the handle and a standalone `StringInterner` a caller
//! can embed wherever one is needed (tests build their own).

use rustc_hash::FxHashMap;
use std::fmt;

/// An interned string identifier.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct Name(u32);

impl Name {
    /// Pre-interned empty string, always index 0.
    pub const EMPTY: Name = Name(0);

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Name(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self.0)
    }
}

/// A simple string interner. Strings are never removed, so `Name` values
/// remain valid for the lifetime of the interner.
#[derive(Default)]
pub struct StringInterner {
    strings: Vec<Box<str>>,
    lookup: FxHashMap<Box<str>, Name>,
}

impl StringInterner {
    pub fn new() -> Self {
        let mut interner = Self::default();
        interner.intern("");
        interner
    }

    pub fn intern(&mut self, s: &str) -> Name {
        if let Some(&name) = self.lookup.get(s) {
            return name;
        }
        let name = Name(self.strings.len() as u32);
        self.strings.push(s.into());
        self.lookup.insert(s.into(), name);
        name
    }

    #[must_use]
    pub fn resolve(&self, name: Name) -> &str {
        &self.strings[name.raw() as usize]
    }
}

pub trait StringLookup {
    fn resolve(&self, name: Name) -> &str;
}

impl StringLookup for StringInterner {
    fn resolve(&self, name: Name) -> &str {
        StringInterner::resolve(self, name)
    }
}
