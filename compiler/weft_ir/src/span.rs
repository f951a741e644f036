//! Source positions.
//!
//! `Pos` matches the parser contract in spec §6: a file name plus a
//! start/end line/column pair. Unlike a byte-offset span, this needs no
//! separate line-index to render `<file>:<line>:<col>` — that rendering is
//! the single place diagnostics actually consume a position.

use crate::Name;
use std::fmt;

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Pos {
    pub file: Name,
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl Pos {
    pub const DUMMY: Pos = Pos {
        file: Name::EMPTY,
        start_line: 0,
        start_col: 0,
        end_line: 0,
        end_col: 0,
    };

    #[must_use]
    pub fn new(file: Name, start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
        Pos { file, start_line, start_col, end_line, end_col }
    }

    /// Render as `file:line:col`, using the start position.
    pub fn display<'a>(&self, interner: &'a dyn crate::StringLookup) -> PosDisplay<'a> {
        PosDisplay { file: interner.resolve(self.file).to_string(), line: self.start_line, col: self.start_col }
    }
}

pub struct PosDisplay {
    file: String,
    line: u32,
    col: u32,
}

impl fmt::Display for PosDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.col)
    }
}
