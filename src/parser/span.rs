//! Source location tracking for error messages.

use std::fmt;

/// A location in source text (byte offset, line, column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Location {
    /// Byte offset from start of file
    pub offset: usize,
    /// Line number (1-indexed)
    pub line: u32,
    /// Column number (1-indexed, in characters not bytes)
    pub column: u32,
}

impl Location {
    pub fn new(offset: usize, line: u32, column: u32) -> Self {
        Self { offset, line, column }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Convert a byte offset to a Location (line/column).
///
/// Offsets past the end clamp to the end of the source; offsets inside a
/// multi-byte character clamp back to its first byte.
pub fn offset_to_location(source: &str, offset: usize) -> Location {
    let mut offset = offset.min(source.len());
    while !source.is_char_boundary(offset) {
        offset -= 1;
    }
    let before = &source[..offset];

    let line = before.bytes().filter(|&b| b == b'\n').count() as u32 + 1;
    let last_newline = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let column = before[last_newline..].chars().count() as u32 + 1;

    Location { offset, line, column }
}

/// 1-indexed line number of a byte offset.
pub fn line_at(source: &str, offset: usize) -> u32 {
    offset_to_location(source, offset).line
}
