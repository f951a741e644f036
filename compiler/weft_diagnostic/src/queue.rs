//! Accumulates warnings across a statement's compilation, per spec §7:
//! "warnings are accumulated on the session and surfaced after successful
//! compilation."

use crate::Diagnostic;

#[derive(Default)]
pub struct Warnings {
    items: Vec<Diagnostic>,
}

impl Warnings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diag: Diagnostic) {
        debug_assert!(diag.severity == crate::Severity::Warning);
        self.items.push(diag);
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Diagnostic] {
        &self.items
    }

    pub fn take(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.items)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
