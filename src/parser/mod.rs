//! Parser modules for definition files.
//!
//! A definition file is a sequence of bracketed definitions, each optionally
//! followed by a brace block holding more definitions:
//!
//! ```text
//! % version 2
//! % include common.def
//!
//! [Scene main]
//! {
//!     [Camera "front view" 90]
//!     [Light sun]
//! }
//! ```
//!
//! Text first goes through the [`Preprocessor`], which runs the `%` line
//! directives, then through [`build_tree`], which produces one [`Node`] per
//! definition.
//!
//! # Usage
//!
//! ```ignore
//! use defpipe::parser::{build_tree, preprocess, FsReader};
//!
//! let source = std::fs::read_to_string("scene.def")?;
//! let pre = preprocess(Path::new("scene.def"), &source, &FsReader);
//! let tree = build_tree(&pre.text, "scene.def");
//!
//! for node in &tree.nodes {
//!     println!("Found: {:?}", node.name());
//! }
//! ```

mod node;
pub mod preprocess;
pub mod source;
pub mod span;
pub mod tree;
mod words;

pub use node::Node;
pub use preprocess::{preprocess, Preprocessed, Preprocessor, DEFAULT_VERSION};
pub use source::{FsReader, MemoryReader, SourceReader};
pub use span::{line_at, offset_to_location, Location};
pub use tree::{build_tree, TreeResult};
pub use words::tokenize;
