//! The runtime `Environment` (spec §3): a persistent, layered map from
//! identifiers to values. `Node::Map` is the flat-dictionary shape;
//! `Node::Sub` is the parent-plus-one-binding shape. Both live behind one
//! `Rc` so cloning an `Environment` — taken on every closure capture — is
//! a refcount bump, never a deep copy.
//!
//! Lookup walks from the innermost binding outward, so a later `bind` of
//! an already-bound name shadows without disturbing the earlier binding
//! still reachable further down the chain (spec §9 Open Question (a),
//! resolved in SPEC_FULL.md §9(a): the chain is never shortened).
//!
//! Each `Sub` binding is stored behind its own `Rc<RefCell<Value>>` rather
//! than a bare `Value`. The language itself has no variable reassignment
//! (only explicit `ref`/`!`/`:=` on a `Value::Ref` cell), so this cell is
//! never mutated by ordinary evaluation — except once, by `Compiler`'s
//! recursive-`let` compilation, which needs to close a function's captured
//! environment over its own not-yet-computed binding (the standard letrec
//! back-patch).

use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;
use weft_ir::Name;

use crate::value::Value;

enum Node {
    Empty,
    Map(FxHashMap<Name, Value>),
    Sub { parent: Environment, name: Name, cell: Rc<RefCell<Value>> },
}

#[derive(Clone)]
pub struct Environment(Rc<Node>);

impl Environment {
    #[must_use]
    pub fn empty() -> Self {
        Environment(Rc::new(Node::Empty))
    }

    #[must_use]
    pub fn from_map(bindings: FxHashMap<Name, Value>) -> Self {
        Environment(Rc::new(Node::Map(bindings)))
    }

    /// Push one binding, shadowing any earlier binding of the same name.
    #[must_use]
    pub fn bind(&self, name: Name, value: Value) -> Environment {
        self.bind_cell(name, Rc::new(RefCell::new(value)))
    }

    #[must_use]
    pub(crate) fn bind_cell(&self, name: Name, cell: Rc<RefCell<Value>>) -> Environment {
        Environment(Rc::new(Node::Sub { parent: self.clone(), name, cell }))
    }

    /// Look up the most recently bound value for `name` (spec §3
    /// invariant). `None` means unbound — the Resolver (spec §4.3) is
    /// responsible for catching this at compile time; reaching it during
    /// evaluation of an already-Compiled `Code` would be an evaluator bug.
    #[must_use]
    pub fn lookup(&self, name: Name) -> Option<Value> {
        match self.0.as_ref() {
            Node::Empty => None,
            Node::Map(bindings) => bindings.get(&name).cloned(),
            Node::Sub { parent, name: bound, cell } => {
                if *bound == name {
                    Some(cell.borrow().clone())
                } else {
                    parent.lookup(name)
                }
            }
        }
    }

    /// Walk the binding depth from `self` down to `name`'s nearest binder,
    /// if it is reachable through a `Sub` chain rather than a root `Map`.
    /// `weft_eval::Compiler` calls this once per free variable at compile
    /// time (never per lookup at runtime) to resolve a stable slot (spec
    /// §4.6 "looked up by stable slot ... not by name at runtime").
    #[must_use]
    pub fn depth_of(&self, name: Name) -> Option<usize> {
        let mut depth = 0;
        let mut node = self;
        loop {
            match node.0.as_ref() {
                // A name resolved in the root `Map` has no fixed depth (the
                // map can be rebuilt by `bind_all` without changing which
                // names it holds) — the Compiler falls back to a name-keyed
                // global lookup for these instead of a slot.
                Node::Empty | Node::Map(_) => return None,
                Node::Sub { parent, name: bound, .. } => {
                    if *bound == name {
                        return Some(depth);
                    }
                    depth += 1;
                    node = parent;
                }
            }
        }
    }

    /// Fetch the value `depth` `Sub` links up from `self`. Used by compiled
    /// `Code` for a variable the `Compiler` resolved to a local slot.
    #[must_use]
    pub fn at_depth(&self, depth: usize) -> Value {
        let mut node = self;
        let mut remaining = depth;
        loop {
            match node.0.as_ref() {
                Node::Sub { parent, cell, .. } => {
                    if remaining == 0 {
                        return cell.borrow().clone();
                    }
                    remaining -= 1;
                    node = parent;
                }
                Node::Empty | Node::Map(_) => unreachable!("Compiler-resolved slot depth exceeds the actual chain"),
            }
        }
    }

    /// Walk `n` `Sub` links up from `self`. Used by the tail-call loop a
    /// self-recursive `Code` compiles to (spec §4.6): each iteration
    /// rebuilds its parameter frame from the same starting point instead
    /// of layering onto the previous iteration's environment, which would
    /// otherwise grow the chain once per loop turn.
    #[must_use]
    pub fn ancestor(&self, n: usize) -> Environment {
        let mut node = self.clone();
        for _ in 0..n {
            match node.0.as_ref() {
                Node::Sub { parent, .. } => node = parent.clone(),
                Node::Empty | Node::Map(_) => unreachable!("ancestor count exceeds the actual chain"),
            }
        }
        node
    }

    /// Every binding visible from `self`, innermost first, with later
    /// (shallower) occurrences of a name suppressing earlier ones — the
    /// "visit-all" operation spec §3 requires.
    #[must_use]
    pub fn visit_all(&self) -> Vec<(Name, Value)> {
        let mut seen = rustc_hash::FxHashSet::default();
        let mut out = Vec::new();
        let mut node = self;
        loop {
            match node.0.as_ref() {
                Node::Empty => break,
                Node::Map(bindings) => {
                    for (name, value) in bindings {
                        if seen.insert(*name) {
                            out.push((*name, value.clone()));
                        }
                    }
                    break;
                }
                Node::Sub { parent, name, cell } => {
                    if seen.insert(*name) {
                        out.push((*name, cell.borrow().clone()));
                    }
                    node = parent;
                }
            }
        }
        out
    }

    /// Flatten to a single `Map` shape (spec §3 "an optimisation triggered
    /// when the caller asks for all values, e.g. entering a closure
    /// capture"). The shape change is not observable: `lookup` returns
    /// identical results before and after.
    #[must_use]
    pub fn bind_all(&self) -> Environment {
        let flat: FxHashMap<Name, Value> = self.visit_all().into_iter().collect();
        Environment::from_map(flat)
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "tests use unwrap for brevity")]
mod tests {
    use super::*;
    use weft_ir::StringInterner;

    fn names(n: usize) -> (StringInterner, Vec<Name>) {
        let mut interner = StringInterner::new();
        let names = (0..n).map(|i| interner.intern(&format!("v{i}"))).collect();
        (interner, names)
    }

    fn as_int(v: Option<Value>) -> Option<i64> {
        match v {
            Some(Value::Int(i)) => Some(i),
            _ => None,
        }
    }

    #[test]
    fn lookup_walks_sub_chain_innermost_first() {
        let (_interner, vars) = names(2);
        let env = Environment::empty().bind(vars[0], Value::Int(1)).bind(vars[1], Value::Int(2));
        assert_eq!(as_int(env.lookup(vars[0])), Some(1));
        assert_eq!(as_int(env.lookup(vars[1])), Some(2));
    }

    #[test]
    fn rebinding_shadows_without_losing_the_earlier_binding() {
        let (_interner, vars) = names(1);
        let env = Environment::empty().bind(vars[0], Value::Int(1)).bind(vars[0], Value::Int(2));
        assert_eq!(as_int(env.lookup(vars[0])), Some(2));
        assert_eq!(env.depth_of(vars[0]), Some(0));
    }

    #[test]
    fn depth_of_counts_sub_links_and_stops_at_map() {
        let (_interner, vars) = names(3);
        let env = Environment::empty().bind(vars[0], Value::Int(0)).bind(vars[1], Value::Int(1)).bind(vars[2], Value::Int(2));
        assert_eq!(env.depth_of(vars[2]), Some(0));
        assert_eq!(env.depth_of(vars[1]), Some(1));
        assert_eq!(env.depth_of(vars[0]), Some(2));

        let mut map = FxHashMap::default();
        map.insert(vars[0], Value::Int(9));
        let root = Environment::from_map(map);
        assert_eq!(root.depth_of(vars[0]), None);
        assert_eq!(as_int(root.lookup(vars[0])), Some(9));
    }

    #[test]
    fn at_depth_fetches_the_binding_that_depth_of_reports() {
        let (_interner, vars) = names(2);
        let env = Environment::empty().bind(vars[0], Value::Int(10)).bind(vars[1], Value::Int(20));
        let depth = env.depth_of(vars[0]).unwrap();
        assert_eq!(as_int(Some(env.at_depth(depth))), Some(10));
    }

    #[test]
    fn ancestor_walks_back_up_n_sub_links() {
        let (_interner, vars) = names(2);
        let base = Environment::empty().bind(vars[0], Value::Int(1));
        let extended = base.bind(vars[1], Value::Int(2));
        let back = extended.ancestor(1);
        assert!(back.lookup(vars[1]).is_none());
        assert_eq!(as_int(back.lookup(vars[0])), Some(1));
    }

    /// spec §8 "Environment depth test": starting from `{a=0,b=1,c=2}` and
    /// successively binding `true, true, foo, true`. Distinct-value count is
    /// `visit_all().len()`; the binding chain length is the number of `Sub`
    /// layers since the root map, observable here through `depth_of`.
    #[test]
    fn environment_depth_test_reproduces_the_spec_scenario() {
        let mut interner = StringInterner::new();
        let a = interner.intern("a");
        let b = interner.intern("b");
        let c = interner.intern("c");
        let t = interner.intern("true");
        let foo = interner.intern("foo");

        let mut map = FxHashMap::default();
        map.insert(a, Value::Int(0));
        map.insert(b, Value::Int(1));
        map.insert(c, Value::Int(2));
        let root = Environment::from_map(map);
        assert_eq!(root.visit_all().len(), 3);

        let step1 = root.bind(t, Value::Bool(true));
        assert_eq!(step1.visit_all().len(), 4);

        // Rebinding the still-innermost `true` does not add a new distinct
        // value (spec §8 property 7), but the chain still grows — there is
        // no shortcut collapsing the two `true` layers into one.
        let step2 = step1.bind(t, Value::Bool(true));
        assert_eq!(step2.visit_all().len(), 4);
        assert_eq!(step2.depth_of(t), Some(0));

        let step3 = step2.bind(foo, Value::Bool(false));
        assert_eq!(step3.visit_all().len(), 5);

        // Rebinding `true` again, now after the newer `foo` binding — the
        // documented non-optimisation (spec §3/§9 open question (a)): the
        // chain is not collapsed even though the older `true` layer beneath
        // `foo` is now dead weight.
        let step4 = step3.bind(t, Value::Bool(true));
        assert_eq!(step4.visit_all().len(), 5);
        assert_eq!(step4.depth_of(t), Some(0));
        assert_eq!(step4.depth_of(foo), Some(1));
        assert_eq!(step4.depth_of(a), None);
    }

    #[test]
    fn bind_all_flattens_without_changing_lookups() {
        let (_interner, vars) = names(2);
        let env = Environment::empty().bind(vars[0], Value::Int(1)).bind(vars[1], Value::Int(2)).bind(vars[0], Value::Int(3));
        let flat = env.bind_all();
        assert_eq!(as_int(flat.lookup(vars[0])), Some(3));
        assert_eq!(as_int(flat.lookup(vars[1])), Some(2));
        assert_eq!(flat.depth_of(vars[0]), None);
    }
}
