//! Flattening typed surface patterns into the column representation the
//! decision-tree compiler operates on (spec §4.3).

use weft_infer::{TypedPattern, TypedPatternKind};
use weft_ir::{Literal, Name};

/// One step of a path from the match scrutinee down to a sub-value.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum PathStep {
    TupleIndex(usize),
    Field(Name),
    CtorArg(usize),
}

pub type Occurrence = Vec<PathStep>;

/// A pattern with `Var`/`As`/`Layered` already stripped out into bindings;
/// what remains is exactly what the decision-tree compiler needs to test.
#[derive(Clone, Debug)]
pub enum CorePattern {
    Wildcard,
    Literal(Literal),
    Ctor(Name, Vec<CorePattern>),
    Tuple(Vec<CorePattern>),
    Record(Vec<(Name, CorePattern)>),
}

impl CorePattern {
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        matches!(self, CorePattern::Wildcard)
    }
}

/// Lower one arm's pattern into `CorePattern`s, possibly more than one row
/// when the pattern contains an or-pattern (`Layered`) — each alternative
/// becomes its own row sharing the arm index.
pub fn flatten_arm(pat: &TypedPattern, occ: &Occurrence) -> Vec<(CorePattern, Vec<(Name, Occurrence)>)> {
    let mut out = Vec::new();
    flatten_into(pat, occ, Vec::new(), &mut out);
    out
}

fn flatten_into(
    pat: &TypedPattern,
    occ: &Occurrence,
    bindings: Vec<(Name, Occurrence)>,
    out: &mut Vec<(CorePattern, Vec<(Name, Occurrence)>)>,
) {
    match &pat.kind {
        TypedPatternKind::Wildcard => out.push((CorePattern::Wildcard, bindings)),
        TypedPatternKind::Var(name) => {
            let mut b = bindings;
            b.push((*name, occ.clone()));
            out.push((CorePattern::Wildcard, b));
        }
        TypedPatternKind::Literal(lit) => out.push((CorePattern::Literal(lit.clone()), bindings)),
        TypedPatternKind::Ctor(name, args) => {
            let mut combos = vec![(Vec::new(), bindings)];
            for (i, arg) in args.iter().enumerate() {
                let mut arg_occ = occ.clone();
                arg_occ.push(PathStep::CtorArg(i));
                let mut arg_rows = Vec::new();
                flatten_into(arg, &arg_occ, Vec::new(), &mut arg_rows);
                combos = cross(combos, arg_rows);
            }
            for (arg_pats, b) in combos {
                out.push((CorePattern::Ctor(*name, arg_pats), b));
            }
        }
        TypedPatternKind::Tuple(items) => {
            let mut combos = vec![(Vec::new(), bindings)];
            for (i, item) in items.iter().enumerate() {
                let mut item_occ = occ.clone();
                item_occ.push(PathStep::TupleIndex(i));
                let mut item_rows = Vec::new();
                flatten_into(item, &item_occ, Vec::new(), &mut item_rows);
                combos = cross(combos, item_rows);
            }
            for (item_pats, b) in combos {
                out.push((CorePattern::Tuple(item_pats), b));
            }
        }
        TypedPatternKind::Record { fields, .. } => {
            let mut combos = vec![(Vec::new(), bindings)];
            for (name, field_pat) in fields {
                let mut field_occ = occ.clone();
                field_occ.push(PathStep::Field(*name));
                let mut field_rows = Vec::new();
                flatten_into(field_pat, &field_occ, Vec::new(), &mut field_rows);
                combos = cross_named(combos, *name, field_rows);
            }
            for (field_pats, b) in combos {
                out.push((CorePattern::Record(field_pats), b));
            }
        }
        TypedPatternKind::As(name, inner) => {
            let mut b = bindings;
            b.push((*name, occ.clone()));
            flatten_into(inner, occ, b, out);
        }
        TypedPatternKind::Layered(alts) => {
            for alt in alts {
                flatten_into(alt, occ, bindings.clone(), out);
            }
        }
    }
}

/// Cartesian product of already-built combinations against one more
/// sub-pattern's (possibly or-pattern-expanded) rows.
fn cross(
    combos: Vec<(Vec<CorePattern>, Vec<(Name, Occurrence)>)>,
    next: Vec<(CorePattern, Vec<(Name, Occurrence)>)>,
) -> Vec<(Vec<CorePattern>, Vec<(Name, Occurrence)>)> {
    let mut out = Vec::with_capacity(combos.len() * next.len().max(1));
    for (pats, b) in &combos {
        for (p, nb) in &next {
            let mut pats = pats.clone();
            pats.push(p.clone());
            let mut b = b.clone();
            b.extend(nb.iter().cloned());
            out.push((pats, b));
        }
    }
    out
}

fn cross_named(
    combos: Vec<(Vec<(Name, CorePattern)>, Vec<(Name, Occurrence)>)>,
    field: Name,
    next: Vec<(CorePattern, Vec<(Name, Occurrence)>)>,
) -> Vec<(Vec<(Name, CorePattern)>, Vec<(Name, Occurrence)>)> {
    let mut out = Vec::with_capacity(combos.len() * next.len().max(1));
    for (pats, b) in &combos {
        for (p, nb) in &next {
            let mut pats = pats.clone();
            pats.push((field, p.clone()));
            let mut b = b.clone();
            b.extend(nb.iter().cloned());
            out.push((pats, b));
        }
    }
    out
}
