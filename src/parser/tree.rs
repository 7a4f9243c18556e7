//! Bracket and brace scanner that turns preprocessed text into a node tree.
//!
//! Scanning is driven purely by `[`, `]`, `{` and `}` positions, so
//! whitespace between definitions is optional. Brace matching counts
//! nesting depth and does not look at quoted strings.

use tracing::debug;

use crate::context::{ErrorCode, ParseError};

use super::node::Node;
use super::span::line_at;
use super::words::tokenize;

/// Nodes built from one source text, plus any structural errors.
#[derive(Debug, Default)]
pub struct TreeResult {
    /// Top-level definitions, in source order.
    pub nodes: Vec<Node>,
    /// All errors here are critical.
    pub errors: Vec<ParseError>,
}

impl TreeResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Build the definition tree for `source`, tagging nodes with `file`.
///
/// A missing `]` or `}` stops scanning at every enclosing level. Nodes that
/// were complete before the error are kept.
pub fn build_tree(source: &str, file: &str) -> TreeResult {
    let mut builder = TreeBuilder {
        source,
        file,
        errors: Vec::new(),
        cursor: (0, 1),
    };
    let mut nodes = Vec::new();
    builder.scan(0, source.len(), &mut nodes);

    debug!(file, definitions = nodes.len(), errors = builder.errors.len(), "built tree");
    TreeResult {
        nodes,
        errors: builder.errors,
    }
}

struct TreeBuilder<'s> {
    source: &'s str,
    file: &'s str,
    errors: Vec<ParseError>,
    /// Last (offset, line) pair handed out. Definitions are found in
    /// increasing offset order, so lines are counted incrementally.
    cursor: (usize, u32),
}

impl TreeBuilder<'_> {
    /// Scan `source[start..end]` for definitions, appending them to `out`.
    /// Returns false if scanning was aborted.
    fn scan(&mut self, start: usize, end: usize, out: &mut Vec<Node>) -> bool {
        let bytes = self.source.as_bytes();
        let mut pos = start;

        loop {
            let Some(open) = find_byte(bytes, b'[', pos, end) else {
                return true;
            };
            let Some(close) = find_byte(bytes, b']', open + 1, end) else {
                self.fail(ErrorCode::MissingBracket, open, "no closing bracket for definition");
                return false;
            };

            let mut node = Node {
                words: tokenize(&self.source[open + 1..close]),
                bracket_start: open,
                bracket_end: close,
                line: self.line_of(open),
                source_file: self.file.to_string(),
                ..Default::default()
            };

            let after = skip_whitespace(bytes, close + 1, end);
            if after < end && bytes[after] == b'{' {
                let Some(block_end) = find_block_end(bytes, after, end) else {
                    let message = match node.name() {
                        Some(name) => format!("no closing brace for block of '{}'", name),
                        None => "no closing brace for block".to_string(),
                    };
                    self.fail(ErrorCode::MissingBlockEnd, after, message);
                    return false;
                };

                node.has_block = true;
                node.block_start = after;
                node.block_end = block_end;

                let complete = self.scan(after + 1, block_end, &mut node.children);
                out.push(node);
                if !complete {
                    return false;
                }
                pos = block_end + 1;
            } else {
                out.push(node);
                pos = close + 1;
            }
        }
    }

    fn line_of(&mut self, offset: usize) -> u32 {
        let (from, line) = self.cursor;
        if offset < from {
            return line_at(self.source, offset);
        }
        let newlines = self.source.as_bytes()[from..offset]
            .iter()
            .filter(|&&b| b == b'\n')
            .count() as u32;
        self.cursor = (offset, line + newlines);
        line + newlines
    }

    fn fail(&mut self, code: ErrorCode, offset: usize, message: impl Into<String>) {
        let line = line_at(self.source, offset);
        self.errors
            .push(ParseError::new(code, message).at(self.file, line));
    }
}

fn find_byte(bytes: &[u8], needle: u8, from: usize, end: usize) -> Option<usize> {
    bytes
        .get(from..end)?
        .iter()
        .position(|&b| b == needle)
        .map(|i| from + i)
}

fn skip_whitespace(bytes: &[u8], from: usize, end: usize) -> usize {
    let mut pos = from;
    while pos < end && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

/// Offset of the `}` matching the `{` at `open`.
fn find_block_end(bytes: &[u8], open: usize, end: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, &b) in bytes.get(open..end)?.iter().enumerate() {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}
