//! First-order unification with occurs-check (spec §4.1).

use crate::data::{TypeData, VarState};
use crate::error::TypeError;
use crate::moniker::moniker;
use crate::{Idx, Pool, Rank, TypeFlags};
use weft_ir::{Pos, StringLookup};

/// Mutable type-variable store. Holds the [`Pool`] plus the current rank
/// used to scope fresh variables (see [`crate::Rank`]).
pub struct UnifyEngine<'pool> {
    pool: &'pool mut Pool,
    current_rank: Rank,
}

impl<'pool> UnifyEngine<'pool> {
    pub fn new(pool: &'pool mut Pool) -> Self {
        UnifyEngine { pool, current_rank: Rank::FIRST }
    }

    #[must_use]
    pub fn pool(&self) -> &Pool {
        self.pool
    }

    pub fn pool_mut(&mut self) -> &mut Pool {
        self.pool
    }

    pub fn enter_scope(&mut self) {
        self.current_rank = self.current_rank.next();
    }

    pub fn exit_scope(&mut self) {
        self.current_rank = self.current_rank.prev();
    }

    #[must_use]
    pub fn current_rank(&self) -> Rank {
        self.current_rank
    }

    pub fn fresh_var(&mut self, eq: bool) -> Idx {
        let flags = if eq { TypeFlags::EQ } else { TypeFlags::empty() };
        self.pool.fresh_var(self.current_rank, flags)
    }

    /// Unify two types, failing with the first structural incompatibility,
    /// cyclic binding, or equality-constraint violation encountered.
    pub fn unify(&mut self, a: Idx, b: Idx, pos: Pos, interner: &dyn StringLookup) -> Result<(), TypeError> {
        let a = self.pool.resolve(a);
        let b = self.pool.resolve(b);
        if a == b {
            return Ok(());
        }

        let a_data = self.pool.get(a).clone();
        let b_data = self.pool.get(b).clone();

        match (&a_data, &b_data) {
            (TypeData::Var(va), TypeData::Var(_)) => self.bind(*va, b, pos, interner),
            (TypeData::Var(va), _) => self.bind(*va, b, pos, interner),
            (_, TypeData::Var(vb)) => self.bind(*vb, a, pos, interner),
            (TypeData::Primitive(pa), TypeData::Primitive(pb)) if pa == pb => Ok(()),
            (TypeData::Fun(a1, a2), TypeData::Fun(b1, b2)) => {
                self.unify(*a1, *b1, pos, interner)?;
                self.unify(*a2, *b2, pos, interner)
            }
            (TypeData::List(a1), TypeData::List(b1)) => self.unify(*a1, *b1, pos, interner),
            (TypeData::Tuple(xs), TypeData::Tuple(ys)) if xs.len() == ys.len() => {
                for (&x, &y) in xs.iter().zip(ys.iter()) {
                    self.unify(x, y, pos, interner)?;
                }
                Ok(())
            }
            (TypeData::Record(fs1), TypeData::Record(fs2)) if fs1.len() == fs2.len() => {
                let mut fs1 = fs1.clone();
                let mut fs2 = fs2.clone();
                fs1.sort_by_key(|(n, _)| n.raw());
                fs2.sort_by_key(|(n, _)| n.raw());
                for ((n1, t1), (n2, t2)) in fs1.iter().zip(fs2.iter()) {
                    if n1 != n2 {
                        return Err(self.mismatch(a, b, pos, interner));
                    }
                    self.unify(*t1, *t2, pos, interner)?;
                }
                Ok(())
            }
            (TypeData::Data(n1, args1), TypeData::Data(n2, args2))
                if n1 == n2 && args1.len() == args2.len() =>
            {
                let (args1, args2) = (args1.clone(), args2.clone());
                for (x, y) in args1.into_iter().zip(args2) {
                    self.unify(x, y, pos, interner)?;
                }
                Ok(())
            }
            _ => Err(self.mismatch(a, b, pos, interner)),
        }
    }

    fn mismatch(&mut self, a: Idx, b: Idx, pos: Pos, interner: &dyn StringLookup) -> TypeError {
        TypeError::Mismatch { expected: moniker(self.pool, a, interner), actual: moniker(self.pool, b, interner), pos }
    }

    fn bind(
        &mut self,
        var: crate::data::VarId,
        to: Idx,
        pos: Pos,
        interner: &dyn StringLookup,
    ) -> Result<(), TypeError> {
        let VarState::Unbound { flags, .. } = self.pool.var_state(var).clone() else {
            unreachable!("bind called on already-linked variable")
        };
        if self.occurs(var, to) {
            return Err(TypeError::OccursCheck {
                var: format!("'_t{}", var.0),
                ty: moniker(self.pool, to, interner),
                pos,
            });
        }
        if flags.contains(TypeFlags::EQ) && !self.admits_equality(to) {
            return Err(TypeError::EqualityRequired { ty: moniker(self.pool, to, interner), pos });
        }
        self.pool.link(var, to);
        Ok(())
    }

    fn occurs(&mut self, var: crate::data::VarId, idx: Idx) -> bool {
        let idx = self.pool.resolve(idx);
        match self.pool.get(idx).clone() {
            TypeData::Var(v) => v == var,
            TypeData::Primitive(_) => false,
            TypeData::Fun(a, b) => self.occurs(var, a) || self.occurs(var, b),
            TypeData::List(a) => self.occurs(var, a),
            TypeData::Tuple(xs) => xs.into_iter().any(|x| self.occurs(var, x)),
            TypeData::Record(fs) => fs.into_iter().any(|(_, x)| self.occurs(var, x)),
            TypeData::Data(_, xs) => xs.into_iter().any(|x| self.occurs(var, x)),
        }
    }

    /// No function types (or anything closing over one) admit equality.
    fn admits_equality(&mut self, idx: Idx) -> bool {
        let idx = self.pool.resolve(idx);
        match self.pool.get(idx).clone() {
            TypeData::Fun(_, _) => false,
            TypeData::Var(v) => match self.pool.var_state(v).clone() {
                // An unbound variable is still flexible — it can always be
                // narrowed to an equality-admitting type later.
                VarState::Unbound { .. } => true,
                VarState::Linked(to) => self.admits_equality(to),
            },
            TypeData::Primitive(_) => true,
            TypeData::List(a) => self.admits_equality(a),
            TypeData::Tuple(xs) => xs.into_iter().all(|x| self.admits_equality(x)),
            TypeData::Record(fs) => fs.into_iter().all(|(_, x)| self.admits_equality(x)),
            TypeData::Data(_, xs) => xs.into_iter().all(|x| self.admits_equality(x)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_ir::StringInterner;

    fn dummy_interner() -> StringInterner {
        StringInterner::new()
    }

    #[test]
    fn unifies_equal_primitives() {
        let mut pool = Pool::new();
        let mut engine = UnifyEngine::new(&mut pool);
        let interner = dummy_interner();
        let int = engine.pool().int();
        assert!(engine.unify(int, int, Pos::DUMMY, &interner).is_ok());
    }

    #[test]
    fn rejects_mismatched_primitives() {
        let mut pool = Pool::new();
        let mut engine = UnifyEngine::new(&mut pool);
        let interner = dummy_interner();
        let int = engine.pool().int();
        let real = engine.pool().real();
        let err = engine.unify(int, real, Pos::DUMMY, &interner).unwrap_err();
        assert!(matches!(err, TypeError::Mismatch { .. }));
    }

    #[test]
    fn binds_variable_to_concrete_type() {
        let mut pool = Pool::new();
        let mut engine = UnifyEngine::new(&mut pool);
        let interner = dummy_interner();
        let var = engine.fresh_var(false);
        let int = engine.pool().int();
        engine.unify(var, int, Pos::DUMMY, &interner).unwrap();
        assert_eq!(engine.pool_mut().resolve(var), int);
    }

    #[test]
    fn occurs_check_rejects_cyclic_binding() {
        let mut pool = Pool::new();
        let mut engine = UnifyEngine::new(&mut pool);
        let interner = dummy_interner();
        let var = engine.fresh_var(false);
        let list = engine.pool_mut().intern(TypeData::List(var));
        let err = engine.unify(var, list, Pos::DUMMY, &interner).unwrap_err();
        assert!(matches!(err, TypeError::OccursCheck { .. }));
    }

    #[test]
    fn equality_flagged_var_rejects_function_type() {
        let mut pool = Pool::new();
        let mut engine = UnifyEngine::new(&mut pool);
        let interner = dummy_interner();
        let var = engine.fresh_var(true);
        let int = engine.pool().int();
        let fun = engine.pool_mut().intern(TypeData::Fun(int, int));
        let err = engine.unify(var, fun, Pos::DUMMY, &interner).unwrap_err();
        assert!(matches!(err, TypeError::EqualityRequired { .. }));
    }
}
