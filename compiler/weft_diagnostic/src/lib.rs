//! Diagnostic and error reporting for the Weft compiler (spec §7).

mod diagnostic;
mod queue;

pub use diagnostic::{Diagnostic, DiagnosticDisplay, Severity};
pub use queue::Warnings;
