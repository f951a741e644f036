//! The boundary to foreign data (spec §6 `ExternalCatalog`, `RelBuilder`):
//! both are consumed through trait objects only — the implementations
//! themselves are out of scope (spec §1).

use crate::error::EvalError;
use crate::value::Value;
use rustc_hash::FxHashMap;
use weft_canon::RelExpr;
use weft_ir::Name;
use weft_types::Idx;

/// One foreign table: its record schema (for `TypeResolver`) and its rows
/// (for `Evaluator`), as spelled out in SPEC_FULL.md §6.
pub struct Dataset {
    pub schema: Idx,
    pub rows: Box<dyn Iterator<Item = Value>>,
}

pub trait ExternalCatalog {
    fn datasets(&self) -> &FxHashMap<Name, Dataset>;
}

/// An optional relational-execution backend (spec §4.5, §6). When a
/// `Session` has none configured, `crate::rel::eval_rel` runs the plan
/// in-memory instead.
pub trait RelBuilder {
    fn build(&self, plan: &RelExpr, target_schema: Idx) -> Result<Value, EvalError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use std::rc::Rc;

    struct OneTableCatalog(FxHashMap<Name, Dataset>);

    impl ExternalCatalog for OneTableCatalog {
        fn datasets(&self) -> &FxHashMap<Name, Dataset> {
            &self.0
        }
    }

    struct ConstantRelBuilder;

    impl RelBuilder for ConstantRelBuilder {
        fn build(&self, _plan: &RelExpr, _target_schema: Idx) -> Result<Value, EvalError> {
            Ok(Value::list(vec![]))
        }
    }

    #[test]
    fn session_with_no_catalog_or_rel_builder_configured_reports_none() {
        let session = Session::new();
        assert!(session.catalog().is_none());
        assert!(session.rel_builder().is_none());
    }

    #[test]
    fn with_catalog_makes_its_datasets_reachable_through_the_session() {
        let mut session = Session::new();
        let schema = session.pool.int();
        let table = session.interner.intern("people");
        let mut datasets = FxHashMap::default();
        datasets.insert(table, Dataset { schema, rows: Box::new(std::iter::empty()) });
        let session = session.with_catalog(Rc::new(OneTableCatalog(datasets)));

        let catalog = session.catalog();
        assert!(catalog.is_some_and(|c| c.datasets().contains_key(&table)));
    }

    #[test]
    fn with_rel_builder_is_reachable_through_the_session() {
        let session = Session::new().with_rel_builder(Rc::new(ConstantRelBuilder));
        assert!(session.rel_builder().is_some());
    }
}
