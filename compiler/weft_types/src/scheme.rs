//! Let-polymorphism: generalisation and instantiation (spec §4.1).

use crate::data::{TypeData, VarId, VarState};
use crate::{Idx, Rank, TypeFlags, UnifyEngine};
use rustc_hash::FxHashMap;

/// A universally-quantified type, `forall a1 .. an. T` (spec §3).
#[derive(Clone, Debug)]
pub struct TypeScheme {
    pub vars: Vec<VarId>,
    pub body: Idx,
}

impl TypeScheme {
    /// A scheme with no quantified variables — a monomorphic type lifted
    /// into scheme position.
    #[must_use]
    pub fn mono(body: Idx) -> Self {
        TypeScheme { vars: Vec::new(), body }
    }
}

impl<'pool> UnifyEngine<'pool> {
    /// Quantify exactly the free variables of `ty` whose rank is at or
    /// above `min_rank` — i.e. variables not free in the enclosing
    /// environment (spec §4.1 `generalize(E, T)`).
    pub fn generalize(&mut self, ty: Idx, min_rank: Rank) -> TypeScheme {
        let mut vars = Vec::new();
        self.collect_free_vars(ty, min_rank, &mut vars);
        TypeScheme { vars, body: ty }
    }

    fn collect_free_vars(&mut self, idx: Idx, min_rank: Rank, out: &mut Vec<VarId>) {
        let idx = self.pool_mut().resolve(idx);
        match self.pool().get(idx).clone() {
            TypeData::Var(v) => {
                if let VarState::Unbound { rank, .. } = self.pool().var_state(v) {
                    if *rank >= min_rank && !out.contains(&v) {
                        out.push(v);
                    }
                }
            }
            TypeData::Primitive(_) => {}
            TypeData::Fun(a, b) => {
                self.collect_free_vars(a, min_rank, out);
                self.collect_free_vars(b, min_rank, out);
            }
            TypeData::List(a) => self.collect_free_vars(a, min_rank, out),
            TypeData::Tuple(xs) => {
                for x in xs {
                    self.collect_free_vars(x, min_rank, out);
                }
            }
            TypeData::Record(fs) => {
                for (_, x) in fs {
                    self.collect_free_vars(x, min_rank, out);
                }
            }
            TypeData::Data(_, xs) => {
                for x in xs {
                    self.collect_free_vars(x, min_rank, out);
                }
            }
        }
    }

    /// Replace each quantified variable with a fresh one; new variables
    /// inherit the original's equality flag (spec §4.1).
    pub fn instantiate(&mut self, scheme: &TypeScheme) -> Idx {
        let mut mapping = FxHashMap::default();
        for &v in &scheme.vars {
            let flags = match self.pool().var_state(v) {
                VarState::Unbound { flags, .. } => *flags,
                VarState::Linked(_) => TypeFlags::empty(),
            };
            mapping.insert(v, self.fresh_var(flags.contains(TypeFlags::EQ)));
        }
        self.substitute_vars(scheme.body, &mapping)
    }

    fn substitute_vars(&mut self, idx: Idx, mapping: &FxHashMap<VarId, Idx>) -> Idx {
        let idx = self.pool_mut().resolve(idx);
        let data = self.pool().get(idx).clone();
        match data {
            TypeData::Var(v) => mapping.get(&v).copied().unwrap_or(idx),
            TypeData::Primitive(_) => idx,
            TypeData::Fun(a, b) => {
                let a = self.substitute_vars(a, mapping);
                let b = self.substitute_vars(b, mapping);
                self.pool_mut().intern(TypeData::Fun(a, b))
            }
            TypeData::List(a) => {
                let a = self.substitute_vars(a, mapping);
                self.pool_mut().intern(TypeData::List(a))
            }
            TypeData::Tuple(xs) => {
                let xs = xs.into_iter().map(|x| self.substitute_vars(x, mapping)).collect();
                self.pool_mut().intern(TypeData::Tuple(xs))
            }
            TypeData::Record(fs) => {
                let fs = fs
                    .into_iter()
                    .map(|(n, x)| (n, self.substitute_vars(x, mapping)))
                    .collect();
                self.pool_mut().intern(TypeData::Record(fs))
            }
            TypeData::Data(name, xs) => {
                let xs = xs.into_iter().map(|x| self.substitute_vars(x, mapping)).collect();
                self.pool_mut().intern(TypeData::Data(name, xs))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Pool;

    #[test]
    fn generalize_quantifies_fresh_rank_variables() {
        let mut pool = Pool::new();
        let mut engine = UnifyEngine::new(&mut pool);
        engine.enter_scope();
        let var = engine.fresh_var(false);
        let fun = engine.pool_mut().intern(TypeData::Fun(var, var));
        let scheme = engine.generalize(fun, Rank::FIRST.next());
        assert_eq!(scheme.vars.len(), 1);
    }

    #[test]
    fn generalize_does_not_quantify_outer_rank_variables() {
        let mut pool = Pool::new();
        let mut engine = UnifyEngine::new(&mut pool);
        let outer_var = engine.fresh_var(false);
        engine.enter_scope();
        let scheme = engine.generalize(outer_var, engine.current_rank());
        assert!(scheme.vars.is_empty());
    }

    #[test]
    fn instantiate_produces_fresh_variables_each_time() {
        let mut pool = Pool::new();
        let mut engine = UnifyEngine::new(&mut pool);
        engine.enter_scope();
        let var = engine.fresh_var(false);
        let fun = engine.pool_mut().intern(TypeData::Fun(var, var));
        let scheme = engine.generalize(fun, Rank::FIRST.next());

        let i1 = engine.instantiate(&scheme);
        let i2 = engine.instantiate(&scheme);
        assert_ne!(i1, i2, "each instantiation should allocate fresh variables");
    }
}
