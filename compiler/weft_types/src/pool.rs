//! The session-scoped type arena: interns composite types and owns the
//! variable union-find slots (spec §4.1 "TypeSystem").

use crate::data::{Prim, TypeData, VarId, VarState};
use crate::{Idx, Rank, TypeFlags};
use rustc_hash::FxHashMap;
use weft_ir::Name;

pub struct Pool {
    slots: Vec<TypeData>,
    vars: Vec<VarState>,
    /// Dedup map for ground (variable-free) composite types, so that
    /// structurally-equal ground types share one `Idx` (spec §3 invariant).
    interned: FxHashMap<TypeData, Idx>,
    primitives: [Idx; 6],
}

impl Pool {
    #[must_use]
    pub fn new() -> Self {
        let mut slots = Vec::new();
        let mut interned = FxHashMap::default();
        let prim_order = [Prim::Int, Prim::Real, Prim::String, Prim::Char, Prim::Bool, Prim::Unit];
        let mut primitives = [Idx::new(0); 6];
        for (i, p) in prim_order.into_iter().enumerate() {
            let idx = Idx::new(slots.len() as u32);
            slots.push(TypeData::Primitive(p));
            interned.insert(TypeData::Primitive(p), idx);
            primitives[i] = idx;
        }
        Pool { slots, vars: Vec::new(), interned, primitives }
    }

    #[must_use]
    pub fn int(&self) -> Idx {
        self.primitives[0]
    }
    #[must_use]
    pub fn real(&self) -> Idx {
        self.primitives[1]
    }
    #[must_use]
    pub fn string(&self) -> Idx {
        self.primitives[2]
    }
    #[must_use]
    pub fn char(&self) -> Idx {
        self.primitives[3]
    }
    #[must_use]
    pub fn bool(&self) -> Idx {
        self.primitives[4]
    }
    #[must_use]
    pub fn unit(&self) -> Idx {
        self.primitives[5]
    }

    fn alloc(&mut self, data: TypeData) -> Idx {
        let idx = Idx::new(self.slots.len() as u32);
        self.slots.push(data);
        idx
    }

    /// Intern a composite/ground type, sharing storage with a structurally
    /// equal one already in the pool. Types that still contain live
    /// variables are allocated fresh each time, since their structure can
    /// still change as those variables resolve (see SPEC_FULL.md §3).
    pub fn intern(&mut self, data: TypeData) -> Idx {
        if self.contains_var(&data) {
            return self.alloc(data);
        }
        if let Some(&idx) = self.interned.get(&data) {
            return idx;
        }
        let idx = self.alloc(data.clone());
        self.interned.insert(data, idx);
        idx
    }

    fn contains_var(&self, data: &TypeData) -> bool {
        match data {
            TypeData::Var(_) => true,
            TypeData::Primitive(_) => false,
            TypeData::Fun(a, b) => self.idx_has_var(*a) || self.idx_has_var(*b),
            TypeData::List(a) => self.idx_has_var(*a),
            TypeData::Tuple(xs) => xs.iter().any(|x| self.idx_has_var(*x)),
            TypeData::Record(fs) => fs.iter().any(|(_, x)| self.idx_has_var(*x)),
            TypeData::Data(_, xs) => xs.iter().any(|x| self.idx_has_var(*x)),
        }
    }

    fn idx_has_var(&self, idx: Idx) -> bool {
        match self.get(idx) {
            TypeData::Var(v) => !matches!(self.var_state(*v), VarState::Linked(_)),
            other => self.contains_var(other),
        }
    }

    #[must_use]
    pub fn get(&self, idx: Idx) -> &TypeData {
        &self.slots[idx.index()]
    }

    pub fn fresh_var(&mut self, rank: Rank, flags: TypeFlags) -> Idx {
        let vid = VarId(self.vars.len() as u32);
        self.vars.push(VarState::Unbound { rank, flags });
        self.alloc(TypeData::Var(vid))
    }

    #[must_use]
    pub fn var_state(&self, vid: VarId) -> &VarState {
        &self.vars[vid.0 as usize]
    }

    pub fn link(&mut self, vid: VarId, to: Idx) {
        self.vars[vid.0 as usize] = VarState::Linked(to);
    }

    /// Follow a variable's link chain to its current resolution, applying
    /// path compression. Returns the variable's own `Idx` if still unbound.
    pub fn resolve(&mut self, mut idx: Idx) -> Idx {
        let mut chain = Vec::new();
        loop {
            let TypeData::Var(vid) = self.get(idx) else { break };
            let vid = *vid;
            match self.var_state(vid).clone() {
                VarState::Linked(next) => {
                    chain.push(idx);
                    idx = next;
                }
                VarState::Unbound { .. } => break,
            }
        }
        for stale in chain {
            if let TypeData::Var(vid) = self.get(stale) {
                self.link(*vid, idx);
            }
        }
        idx
    }
}

impl Default for Pool {
    fn default() -> Self {
        Self::new()
    }
}
