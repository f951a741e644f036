//! `Session`: the per-evaluation context (spec §5 "A `Session` owns the
//! type system instance, current environment, warnings sink, and an
//! 'in-flight evaluation' flag").
//!
//! Multiple `Session`s may exist in the same process as long as they share
//! no mutable state (spec §5) — every field here is owned, not shared,
//! except through the caller's own `Rc`-wrapped `ExternalCatalog`/
//! `RelBuilder`, which are documented as read-only during evaluation.

use crate::builtins::install_builtins;
use crate::catalog::{ExternalCatalog, RelBuilder};
use crate::env::Environment;
use crate::error::EvalError;
use std::rc::Rc;
use weft_diagnostic::Warnings;
use weft_ir::{Name, StringInterner};
use weft_types::{DataTypeRegistry, Pool};

/// Pre-interned names every builtin-touching pass (`weft_canon::Lowerer`,
/// the Relationalizer, `Session::builtins`) needs to agree on, so every
/// crate intern the same string once rather than risk the table and the
/// lowering pass drifting out of sync.
pub struct WellKnownNames {
    pub deref: Name,
    pub assign: Name,
    pub list_map: Name,
    pub list_filter: Name,
    pub list_length: Name,
    pub list_foldl: Name,
    pub list_concat_map: Name,
    pub list_distinct: Name,
    pub list_sort_by: Name,
    pub list_group_by: Name,
    pub string_concat: Name,
    pub string_length: Name,
    pub ref_ctor: Name,
}

impl WellKnownNames {
    fn intern(interner: &mut StringInterner) -> Self {
        WellKnownNames {
            deref: interner.intern("!"),
            assign: interner.intern(":="),
            list_map: interner.intern("List.map"),
            list_filter: interner.intern("List.filter"),
            list_length: interner.intern("List.length"),
            list_foldl: interner.intern("List.foldl"),
            list_concat_map: interner.intern("List.concatMap"),
            list_distinct: interner.intern("List.distinct"),
            list_sort_by: interner.intern("List.sortBy"),
            list_group_by: interner.intern("List.groupBy"),
            string_concat: interner.intern("String.concat"),
            string_length: interner.intern("String.length"),
            ref_ctor: interner.intern("ref"),
        }
    }
}

/// Session-scoped configuration (spec §6 "Configuration" plus
/// SPEC_FULL.md §2's host-level tuning knobs).
pub struct Properties {
    pub hybrid: bool,
    pub trace_inliner: bool,
    pub max_inline_passes: u32,
}

impl Default for Properties {
    fn default() -> Self {
        Properties { hybrid: false, trace_inliner: false, max_inline_passes: 10 }
    }
}

pub struct Session {
    pub pool: Pool,
    pub registry: DataTypeRegistry,
    pub interner: StringInterner,
    pub warnings: Warnings,
    pub names: WellKnownNames,
    env: Environment,
    properties: Properties,
    catalog: Option<Rc<dyn ExternalCatalog>>,
    rel_builder: Option<Rc<dyn RelBuilder>>,
    in_flight: bool,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        let mut interner = StringInterner::new();
        let names = WellKnownNames::intern(&mut interner);
        let mut session = Session {
            pool: Pool::new(),
            registry: DataTypeRegistry::new(),
            interner,
            warnings: Warnings::default(),
            names,
            env: Environment::empty(),
            properties: Properties::default(),
            catalog: None,
            rel_builder: None,
            in_flight: false,
        };
        let builtins = install_builtins(&session.names);
        session.env = Environment::from_map(builtins).bind_all();
        session
    }

    #[must_use]
    pub fn with_catalog(mut self, catalog: Rc<dyn ExternalCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    #[must_use]
    pub fn with_rel_builder(mut self, builder: Rc<dyn RelBuilder>) -> Self {
        self.rel_builder = Some(builder);
        self
    }

    #[must_use]
    pub fn catalog(&self) -> Option<&Rc<dyn ExternalCatalog>> {
        self.catalog.as_ref()
    }

    #[must_use]
    pub fn rel_builder(&self) -> Option<&Rc<dyn RelBuilder>> {
        self.rel_builder.as_ref()
    }

    /// The root environment: builtins plus every top-level binding
    /// accumulated so far in this session (spec §4.7 "partial bindings
    /// already produced by earlier statements in a REPL session are
    /// preserved").
    #[must_use]
    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Extend the root environment with one freshly evaluated top-level
    /// binding. Flattened back to a `Map` immediately: the root frame is
    /// by far the longest-lived and most frequently extended environment
    /// in a REPL session, so it is kept in its cheap-to-search shape
    /// rather than growing an ever-longer `Sub` chain (spec §3 "flattening
    /// ... is an optimisation triggered when the caller asks for all
    /// values").
    pub fn bind_top_level(&mut self, name: Name, value: crate::value::Value) {
        self.env = self.env.bind(name, value).bind_all();
    }

    #[must_use]
    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn get_property(&self, name: &str) -> Result<String, EvalError> {
        match name {
            "HYBRID" => Ok(self.properties.hybrid.to_string()),
            "TRACE_INLINER" => Ok(self.properties.trace_inliner.to_string()),
            "MAX_INLINE_PASSES" => Ok(self.properties.max_inline_passes.to_string()),
            other => Err(EvalError::UnknownProperty(other.to_string())),
        }
    }

    pub fn set_property(&mut self, name: &str, value: &str) -> Result<(), EvalError> {
        match name {
            "HYBRID" => {
                self.properties.hybrid = value.eq_ignore_ascii_case("true");
                Ok(())
            }
            "TRACE_INLINER" => {
                self.properties.trace_inliner = value.eq_ignore_ascii_case("true");
                Ok(())
            }
            "MAX_INLINE_PASSES" => {
                self.properties.max_inline_passes = value.parse().unwrap_or(10);
                Ok(())
            }
            other => Err(EvalError::UnknownProperty(other.to_string())),
        }
    }

    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Held for the duration of one top-level statement's evaluation
    /// (spec §5 "in-flight evaluation flag"). `weftc`'s statement runner
    /// wraps `Code::run` with this so a future host-level watchdog can
    /// tell a session is mid-evaluation without inspecting the call stack.
    pub fn begin_evaluation(&mut self) {
        self.in_flight = true;
    }

    pub fn end_evaluation(&mut self) {
        self.in_flight = false;
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::new()
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "tests use unwrap for brevity")]
mod tests {
    use super::*;

    #[test]
    fn new_session_has_every_builtin_bound_at_the_root() {
        let session = Session::new();
        assert!(session.env().lookup(session.names.list_map).is_some());
        assert!(session.env().lookup(session.names.ref_ctor).is_some());
    }

    #[test]
    fn bind_top_level_is_visible_to_later_lookups() {
        let mut session = Session::new();
        let x = session.interner.intern("x");
        session.bind_top_level(x, crate::value::Value::Int(42));
        match session.env().lookup(x) {
            Some(crate::value::Value::Int(42)) => {}
            other => panic!("expected Some(Int(42)), got {other:?}"),
        }
    }

    #[test]
    fn unknown_property_names_are_rejected() {
        let session = Session::new();
        assert!(matches!(session.get_property("NOT_A_PROPERTY"), Err(EvalError::UnknownProperty(_))));
    }

    #[test]
    fn max_inline_passes_round_trips_through_set_and_get() {
        let mut session = Session::new();
        session.set_property("MAX_INLINE_PASSES", "4").unwrap();
        assert_eq!(session.get_property("MAX_INLINE_PASSES").unwrap(), "4");
        assert_eq!(session.properties().max_inline_passes, 4);
    }

    #[test]
    fn in_flight_flag_tracks_begin_and_end() {
        let mut session = Session::new();
        assert!(!session.is_in_flight());
        session.begin_evaluation();
        assert!(session.is_in_flight());
        session.end_evaluation();
        assert!(!session.is_in_flight());
    }
}
