//! Lowering the typed surface tree into Core IR, pattern-match compilation,
//! usage analysis, fixed-point inlining, and relational-algebra recognition
//! (spec §4.3-§4.5).
//!
//! [`lower::Lowerer`] turns one `weft_infer::Resolved` statement into a
//! [`ir::CanonResult`]; [`inline::optimize`] then rewrites that arena in
//! place to a fixed point before `weft_eval::Compiler` compiles it to
//! runnable `Code`.

mod analyze;
mod decision_tree;
mod error;
mod inline;
mod ir;
mod lower;
mod pattern;
mod relationalize;

pub use analyze::{classify, is_small, Usage};
pub use decision_tree::{compile_match, CaseTest, DecisionTree, MatchOutcome};
pub use error::{CompileError, CompileWarning};
pub use inline::optimize;
pub use ir::{CanArena, CanDecl, CanExpr, CanId, CanNode, CanonResult, PrimOp};
pub use lower::Lowerer;
pub use pattern::{flatten_arm, CorePattern, Occurrence, PathStep};
pub use relationalize::{is_pure, recognize_wrapper, try_recognize_core, AggregateOp, BuiltinWrap, RelExpr};
