//! Canonical textual form of a type (spec §3 "moniker"), used in error
//! messages and wherever types are compared in serialised contexts.

use crate::data::{Prim, TypeData, VarState};
use crate::Pool;
use weft_ir::StringLookup;

#[must_use]
pub fn moniker(pool: &mut Pool, idx: crate::Idx, interner: &dyn StringLookup) -> String {
    let idx = pool.resolve(idx);
    match pool.get(idx).clone() {
        TypeData::Primitive(p) => prim_name(p).to_string(),
        TypeData::Var(vid) => match pool.var_state(vid).clone() {
            VarState::Unbound { .. } => format!("'_t{}", vid.0),
            VarState::Linked(to) => moniker(pool, to, interner),
        },
        TypeData::Fun(a, b) => {
            format!("({} -> {})", moniker(pool, a, interner), moniker(pool, b, interner))
        }
        TypeData::Tuple(items) => items
            .into_iter()
            .map(|t| moniker(pool, t, interner))
            .collect::<Vec<_>>()
            .join(" * "),
        TypeData::Record(mut fields) => {
            fields.sort_by_key(|(name, _)| interner.resolve(*name).to_string());
            let rendered: Vec<String> = fields
                .into_iter()
                .map(|(name, t)| format!("{}: {}", interner.resolve(name), moniker(pool, t, interner)))
                .collect();
            format!("{{ {} }}", rendered.join(", "))
        }
        TypeData::List(elem) => format!("{} list", moniker(pool, elem, interner)),
        TypeData::Data(name, args) => {
            if args.is_empty() {
                interner.resolve(name).to_string()
            } else {
                let rendered: Vec<String> =
                    args.into_iter().map(|t| moniker(pool, t, interner)).collect();
                format!("({}) {}", rendered.join(", "), interner.resolve(name))
            }
        }
    }
}

fn prim_name(p: Prim) -> &'static str {
    match p {
        Prim::Int => "int",
        Prim::Real => "real",
        Prim::String => "string",
        Prim::Char => "char",
        Prim::Bool => "bool",
        Prim::Unit => "unit",
    }
}
