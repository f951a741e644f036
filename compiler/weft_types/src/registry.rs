//! Registry of user- and builtin-declared algebraic data types and their
//! constructors (spec §4.2 "Datatype declarations introduce a named
//! `ParameterizedType` plus its constructors as schemes").
//!
//! Kept in `weft_types` rather than `weft_infer`/`weft_canon` because both
//! type inference (constructor pattern/application typing) and Core IR
//! lowering (constructor tag numbering for decision trees, spec §4.3) need
//! the same constructor table.

use crate::TypeScheme;
use rustc_hash::FxHashMap;
use weft_ir::Name;

/// One constructor of a data type: its argument schemes (quantified over
/// the owning type's parameters) and its integer tag, used by the match
/// compiler to build decision-tree switches (spec §4.3, §4.6).
#[derive(Clone, Debug)]
pub struct CtorInfo {
    pub data_name: Name,
    pub tag: u32,
    /// Field types; empty for a nullary constructor.
    pub fields: Vec<TypeScheme>,
    /// Whether this constructor was declared with `exception` rather than
    /// `datatype` (spec §4.2) — all exception constructors inhabit one
    /// flat `exn` type, so `weft_eval::Compiler` needs to tell them apart
    /// from ordinary data constructors at `raise`/`handle` time.
    pub is_exception: bool,
}

#[derive(Clone, Debug)]
pub struct DataTypeInfo {
    pub arity: usize,
    pub ctors: Vec<Name>,
}

#[derive(Default)]
pub struct DataTypeRegistry {
    types: FxHashMap<Name, DataTypeInfo>,
    ctors: FxHashMap<Name, CtorInfo>,
}

impl DataTypeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_type(&mut self, name: Name, arity: usize) {
        self.types.entry(name).or_insert_with(|| DataTypeInfo { arity, ctors: Vec::new() });
    }

    pub fn declare_ctor(&mut self, name: Name, data_name: Name, fields: Vec<TypeScheme>) {
        let tag = self.types.get(&data_name).map_or(0, |d| d.ctors.len() as u32);
        self.ctors.insert(name, CtorInfo { data_name, tag, fields, is_exception: false });
        if let Some(info) = self.types.get_mut(&data_name) {
            info.ctors.push(name);
        }
    }

    /// Register a nullary exception constructor as its own one-constructor
    /// data type named after the exception (spec §4.2 "a nullary or unary
    /// constructor of type `exn`").
    pub fn declare_exception(&mut self, name: Name, field: Option<TypeScheme>) {
        self.declare_type(name, 0);
        self.ctors.insert(
            name,
            CtorInfo { data_name: name, tag: 0, fields: field.into_iter().collect(), is_exception: true },
        );
    }

    #[must_use]
    pub fn ctor(&self, name: Name) -> Option<&CtorInfo> {
        self.ctors.get(&name)
    }

    #[must_use]
    pub fn is_exception(&self, name: Name) -> bool {
        self.ctors.get(&name).is_some_and(|c| c.is_exception)
    }

    #[must_use]
    pub fn data_type(&self, name: Name) -> Option<&DataTypeInfo> {
        self.types.get(&name)
    }

    /// All constructors of the data type that owns `ctor_name`, in
    /// declaration order — used by the match compiler for exhaustiveness
    /// (spec §4.3).
    #[must_use]
    pub fn siblings(&self, ctor_name: Name) -> &[Name] {
        self.ctors
            .get(&ctor_name)
            .and_then(|c| self.types.get(&c.data_name))
            .map_or(&[], |d| &d.ctors)
    }
}
