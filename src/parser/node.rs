//! The definition tree.

use serde::Serialize;

/// One `[...]` definition plus the definitions of its `{...}` block.
///
/// Offsets are byte offsets into the preprocessed text of `source_file`.
/// Children are owned exclusively by their parent; a node without a block
/// never has children.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Node {
    /// Words between the brackets, in order. The first one is the name.
    pub words: Vec<String>,
    /// Offset of the opening `[`.
    pub bracket_start: usize,
    /// Offset of the closing `]`.
    pub bracket_end: usize,
    /// 1-indexed line of the opening `[` in the preprocessed text.
    pub line: u32,
    /// Whether a `{...}` block follows the definition.
    pub has_block: bool,
    /// Offset of the opening `{` (0 without a block).
    pub block_start: usize,
    /// Offset of the closing `}` (0 without a block).
    pub block_end: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
    pub source_file: String,
}

impl Node {
    /// An empty root node for a parse session.
    pub fn root() -> Self {
        Self::default()
    }

    /// The definition name (`words[0]`), if the definition has any words.
    pub fn name(&self) -> Option<&str> {
        self.words.first().map(|s| s.as_str())
    }

    /// Words after the name.
    pub fn arguments(&self) -> &[String] {
        self.words.get(1..).unwrap_or(&[])
    }

    /// Direct children with the given name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.children.iter().filter(move |c| c.name() == Some(name))
    }

    /// Total number of nodes below this one.
    pub fn descendant_count(&self) -> usize {
        self.children
            .iter()
            .map(|c| 1 + c.descendant_count())
            .sum()
    }
}
