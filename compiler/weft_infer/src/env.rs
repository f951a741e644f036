//! The compile-time type environment: a persistent map from identifier to
//! type scheme, extended once per `let`/`fn` binding (spec §4.2).
//!
//! This mirrors the layering idea behind the runtime `Environment` in spec
//! §3 (cheap `SubEnvironment`-style extension instead of cloning a map) but
//! is its own type: type environments never need the flattening or
//! visit-all operations the runtime environment uses for closure capture.

use std::rc::Rc;
use weft_ir::Name;
use weft_types::TypeScheme;

enum Node {
    Empty,
    Bind { name: Name, scheme: TypeScheme, parent: TypeEnv },
}

#[derive(Clone)]
pub struct TypeEnv(Rc<Node>);

impl TypeEnv {
    #[must_use]
    pub fn empty() -> Self {
        TypeEnv(Rc::new(Node::Empty))
    }

    #[must_use]
    pub fn bind(&self, name: Name, scheme: TypeScheme) -> Self {
        TypeEnv(Rc::new(Node::Bind { name, scheme, parent: self.clone() }))
    }

    /// Innermost-first lookup; shadowing means the first match wins.
    #[must_use]
    pub fn lookup(&self, name: Name) -> Option<&TypeScheme> {
        let mut node = &self.0;
        loop {
            match &**node {
                Node::Empty => return None,
                Node::Bind { name: n, scheme, parent } => {
                    if *n == name {
                        return Some(scheme);
                    }
                    node = &parent.0;
                }
            }
        }
    }
}

impl Default for TypeEnv {
    fn default() -> Self {
        Self::empty()
    }
}
