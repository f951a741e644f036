//! The host-facing diagnostic shape: every per-crate error/warning kind
//! converts into one of these for display, per spec §7's
//! `<kind>: <detail> at <file>:<line>:<col>` format.

use std::fmt;
use weft_ir::{Pos, StringLookup};

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    /// e.g. `"TypeError::Mismatch"`, `"EvalError::Div"`.
    pub kind: &'static str,
    pub detail: String,
    pub pos: Pos,
}

impl Diagnostic {
    #[must_use]
    pub fn error(kind: &'static str, detail: impl Into<String>, pos: Pos) -> Self {
        Diagnostic { severity: Severity::Error, kind, detail: detail.into(), pos }
    }

    #[must_use]
    pub fn warning(kind: &'static str, detail: impl Into<String>, pos: Pos) -> Self {
        Diagnostic { severity: Severity::Warning, kind, detail: detail.into(), pos }
    }

    /// Render as `<kind>: <detail> at <file>:<line>:<col>`.
    #[must_use]
    pub fn display<'a>(&'a self, interner: &'a dyn StringLookup) -> DiagnosticDisplay<'a> {
        DiagnosticDisplay { diag: self, interner }
    }
}

pub struct DiagnosticDisplay<'a> {
    diag: &'a Diagnostic,
    interner: &'a dyn StringLookup,
}

impl fmt::Display for DiagnosticDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} at {}",
            self.diag.kind,
            self.diag.detail,
            self.diag.pos.display(self.interner)
        )
    }
}
