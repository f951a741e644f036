//! Type system for the Weft compiler (spec §3, §4.1).
//!
//! Two pieces: the [`Pool`] (an interning arena for composite types plus
//! the union-find slots for type variables) and the [`UnifyEngine`] (a
//! mutable, session-scoped unifier operating on a `&mut Pool`). Splitting
//! storage from algorithm mirrors the teacher's `Pool`/`UnifyEngine` split
//! so tests can construct a type, outside of any unification pass, just by
//! calling `Pool` methods directly.

mod data;
mod error;
mod flags;
mod idx;
mod moniker;
mod pool;
mod rank;
mod registry;
mod scheme;
mod unify;

pub use data::{Prim, TypeData};
pub use error::TypeError;
pub use flags::TypeFlags;
pub use idx::Idx;
pub use moniker::moniker;
pub use pool::Pool;
pub use rank::Rank;
pub use registry::{CtorInfo, DataTypeInfo, DataTypeRegistry};
pub use scheme::TypeScheme;
pub use unify::UnifyEngine;
