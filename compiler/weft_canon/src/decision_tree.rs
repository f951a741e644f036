//! Maranget-style compilation of a pattern matrix into a decision tree
//! (spec §4.3), with exhaustiveness and redundancy determined as a
//! byproduct: an arm is redundant exactly when it is never selected as the
//! decisive row during compilation, and the match is non-exhaustive exactly
//! when compilation ever needs a row that isn't there.

use crate::ir::CanId;
use crate::pattern::{flatten_arm, CorePattern, Occurrence, PathStep};
use rustc_hash::FxHashSet;
use weft_infer::TypedPattern;
use weft_ir::{Literal, Name};
use weft_types::DataTypeRegistry;

#[derive(Clone, Debug)]
pub enum DecisionTree {
    Leaf {
        arm: usize,
        bindings: Vec<(Name, Occurrence)>,
        /// `Some(guard)` when the arm carries a guard expression; the
        /// compiled `Code` must evaluate it against the leaf's bindings and
        /// fall through to `fallback` when it is false.
        guard: Option<CanId>,
        fallback: Option<Box<DecisionTree>>,
    },
    Fail,
    Switch {
        occurrence: Occurrence,
        cases: Vec<(CaseTest, DecisionTree)>,
        default: Option<Box<DecisionTree>>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum CaseTest {
    Ctor(Name),
    Literal(Literal),
    Tuple(usize),
    Record(Vec<Name>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MatchOutcome {
    Ok,
    Redundant { redundant_arms: Vec<usize> },
    NonExhaustive,
    NonExhaustiveAndRedundant { redundant_arms: Vec<usize> },
}

struct Row {
    cols: Vec<CorePattern>,
    arm: usize,
    bindings: Vec<(Name, Occurrence)>,
    guard: Option<CanId>,
}

/// Compile one `case`/`handle`'s arms. `arms` pairs each arm's pattern with
/// its already-lowered guard expression, if any.
pub fn compile_match(arms: &[(&TypedPattern, Option<CanId>)], registry: &DataTypeRegistry) -> (DecisionTree, MatchOutcome) {
    let mut rows = Vec::new();
    for (i, (pat, guard)) in arms.iter().enumerate() {
        for (core, bindings) in flatten_arm(pat, &Vec::new()) {
            rows.push(Row { cols: vec![core], arm: i, bindings, guard: *guard });
        }
    }
    let occurrences = vec![Vec::new()];
    let mut reachable = FxHashSet::default();
    let mut non_exhaustive = false;
    let tree = compile_rows(&occurrences, rows, registry, &mut reachable, &mut non_exhaustive);
    let redundant: Vec<usize> = (0..arms.len()).filter(|i| !reachable.contains(i)).collect();
    let outcome = match (non_exhaustive, redundant.is_empty()) {
        (false, true) => MatchOutcome::Ok,
        (false, false) => MatchOutcome::Redundant { redundant_arms: redundant },
        (true, true) => MatchOutcome::NonExhaustive,
        (true, false) => MatchOutcome::NonExhaustiveAndRedundant { redundant_arms: redundant },
    };
    (tree, outcome)
}

fn compile_rows(
    occurrences: &[Occurrence],
    mut rows: Vec<Row>,
    registry: &DataTypeRegistry,
    reachable: &mut FxHashSet<usize>,
    non_exhaustive: &mut bool,
) -> DecisionTree {
    if rows.is_empty() {
        *non_exhaustive = true;
        return DecisionTree::Fail;
    }

    if rows[0].cols.iter().all(CorePattern::is_wildcard) {
        reachable.insert(rows[0].arm);
        let leaf_row = rows.remove(0);
        let fallback = if leaf_row.guard.is_some() {
            Some(Box::new(compile_rows(occurrences, rows, registry, reachable, non_exhaustive)))
        } else {
            None
        };
        return DecisionTree::Leaf { arm: leaf_row.arm, bindings: leaf_row.bindings, guard: leaf_row.guard, fallback };
    }

    let Some(c) = rows[0].cols.iter().position(|p| !p.is_wildcard()) else {
        unreachable!("a non-leaf row always has some non-wildcard column")
    };
    let occ_c = occurrences[c].clone();

    let mut tests: Vec<CaseTest> = Vec::new();
    for row in &rows {
        if let Some(t) = case_test(&row.cols[c]) {
            if !tests.contains(&t) {
                tests.push(t);
            }
        }
    }
    let complete = is_complete(&tests, registry);

    let mut cases = Vec::with_capacity(tests.len());
    for test in &tests {
        let mut sub_occurrences: Vec<Occurrence> = occurrences[..c].to_vec();
        sub_occurrences.extend(sub_occ_for(test, &occ_c, registry));
        sub_occurrences.extend(occurrences[c + 1..].to_vec());

        let sub_rows: Vec<Row> = rows.iter().filter_map(|row| specialize(row, c, test, registry)).collect();
        let subtree = compile_rows(&sub_occurrences, sub_rows, registry, reachable, non_exhaustive);
        cases.push((test.clone(), subtree));
    }

    let default = if complete {
        None
    } else {
        let mut default_occurrences: Vec<Occurrence> = occurrences[..c].to_vec();
        default_occurrences.extend(occurrences[c + 1..].to_vec());
        let default_rows: Vec<Row> = rows
            .iter()
            .filter(|row| row.cols[c].is_wildcard())
            .map(|row| {
                let mut cols = row.cols[..c].to_vec();
                cols.extend(row.cols[c + 1..].to_vec());
                Row { cols, arm: row.arm, bindings: row.bindings.clone(), guard: row.guard }
            })
            .collect();
        Some(Box::new(compile_rows(&default_occurrences, default_rows, registry, reachable, non_exhaustive)))
    };

    DecisionTree::Switch { occurrence: occ_c, cases, default }
}

fn case_test(pat: &CorePattern) -> Option<CaseTest> {
    match pat {
        CorePattern::Wildcard => None,
        CorePattern::Literal(l) => Some(CaseTest::Literal(l.clone())),
        CorePattern::Ctor(name, _) => Some(CaseTest::Ctor(*name)),
        CorePattern::Tuple(items) => Some(CaseTest::Tuple(items.len())),
        CorePattern::Record(fields) => {
            let mut names: Vec<Name> = fields.iter().map(|(n, _)| *n).collect();
            names.sort_by_key(Name::raw);
            Some(CaseTest::Record(names))
        }
    }
}

fn test_arity(test: &CaseTest, registry: &DataTypeRegistry) -> usize {
    match test {
        CaseTest::Ctor(name) => registry.ctor(*name).map_or(0, |c| c.fields.len()),
        CaseTest::Literal(_) => 0,
        CaseTest::Tuple(n) => *n,
        CaseTest::Record(names) => names.len(),
    }
}

fn sub_occ_for(test: &CaseTest, occ_c: &Occurrence, registry: &DataTypeRegistry) -> Vec<Occurrence> {
    let arity = test_arity(test, registry);
    match test {
        CaseTest::Ctor(_) | CaseTest::Tuple(_) => (0..arity)
            .map(|i| {
                let mut o = occ_c.clone();
                o.push(if matches!(test, CaseTest::Ctor(_)) { PathStep::CtorArg(i) } else { PathStep::TupleIndex(i) });
                o
            })
            .collect(),
        CaseTest::Literal(_) => Vec::new(),
        CaseTest::Record(names) => names
            .iter()
            .map(|n| {
                let mut o = occ_c.clone();
                o.push(PathStep::Field(*n));
                o
            })
            .collect(),
    }
}

fn is_complete(tests: &[CaseTest], registry: &DataTypeRegistry) -> bool {
    match tests.first() {
        None => false,
        Some(CaseTest::Tuple(_) | CaseTest::Record(_)) => true,
        Some(CaseTest::Ctor(name)) => {
            let siblings = registry.siblings(*name);
            !siblings.is_empty() && tests.len() == siblings.len()
        }
        Some(CaseTest::Literal(Literal::Bool(_))) => {
            tests.iter().any(|t| matches!(t, CaseTest::Literal(Literal::Bool(true))))
                && tests.iter().any(|t| matches!(t, CaseTest::Literal(Literal::Bool(false))))
        }
        Some(CaseTest::Literal(_)) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_types::Idx;

    fn bool_pat(b: bool) -> TypedPattern {
        TypedPattern { kind: weft_infer::TypedPatternKind::Literal(Literal::Bool(b)), ty: Idx::new(0), pos: weft_ir::Pos::DUMMY }
    }

    fn var_pat(name: Name) -> TypedPattern {
        TypedPattern { kind: weft_infer::TypedPatternKind::Var(name), ty: Idx::new(0), pos: weft_ir::Pos::DUMMY }
    }

    /// `true => ..., true => ..., false => ...` — the second `true` arm is
    /// never the decisive row once the first already matches every `true`.
    #[test]
    fn a_shadowed_arm_is_reported_redundant() {
        let registry = DataTypeRegistry::new();
        let arm0 = bool_pat(true);
        let arm1 = bool_pat(true);
        let arm2 = bool_pat(false);
        let arms = [(&arm0, None), (&arm1, None), (&arm2, None)];
        let (_, outcome) = compile_match(&arms, &registry);
        assert_eq!(outcome, MatchOutcome::Redundant { redundant_arms: vec![1] });
    }

    /// `true => ...` alone never covers `false`.
    #[test]
    fn a_missing_case_is_reported_non_exhaustive() {
        let registry = DataTypeRegistry::new();
        let arm0 = bool_pat(true);
        let arms = [(&arm0, None)];
        let (tree, outcome) = compile_match(&arms, &registry);
        assert_eq!(outcome, MatchOutcome::NonExhaustive);
        // the uncovered `false` case compiles to a `Fail` leaf, not an error.
        let DecisionTree::Switch { default, .. } = tree else { panic!("expected a Switch on the bool scrutinee") };
        assert!(matches!(default.as_deref(), Some(DecisionTree::Fail)));
    }

    #[test]
    fn an_exhaustive_irredundant_match_reports_ok() {
        let registry = DataTypeRegistry::new();
        let arm0 = bool_pat(true);
        let arm1 = var_pat(Name::from_raw(0));
        let arms = [(&arm0, None), (&arm1, None)];
        let (_, outcome) = compile_match(&arms, &registry);
        assert_eq!(outcome, MatchOutcome::Ok);
    }
}

fn specialize(row: &Row, c: usize, test: &CaseTest, registry: &DataTypeRegistry) -> Option<Row> {
    let pat = &row.cols[c];
    let sub_pats: Vec<CorePattern> = match (pat, test) {
        (CorePattern::Wildcard, CaseTest::Ctor(_) | CaseTest::Tuple(_)) => {
            vec![CorePattern::Wildcard; test_arity(test, registry)]
        }
        (CorePattern::Wildcard, CaseTest::Literal(_)) => Vec::new(),
        (CorePattern::Wildcard, CaseTest::Record(names)) => vec![CorePattern::Wildcard; names.len()],
        (CorePattern::Ctor(name, args), CaseTest::Ctor(test_name)) => {
            if name == test_name {
                args.clone()
            } else {
                return None;
            }
        }
        (CorePattern::Literal(l), CaseTest::Literal(tl)) => {
            if l == tl {
                Vec::new()
            } else {
                return None;
            }
        }
        (CorePattern::Tuple(items), CaseTest::Tuple(_)) => items.clone(),
        (CorePattern::Record(fields), CaseTest::Record(names)) => names
            .iter()
            .map(|n| fields.iter().find(|(fname, _)| fname == n).map_or(CorePattern::Wildcard, |(_, p)| p.clone()))
            .collect(),
        _ => return None,
    };
    let mut new_cols = row.cols[..c].to_vec();
    new_cols.extend(sub_pats);
    new_cols.extend(row.cols[c + 1..].to_vec());
    Some(Row { cols: new_cols, arm: row.arm, bindings: row.bindings.clone(), guard: row.guard })
}
