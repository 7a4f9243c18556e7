//! Tree command implementation.
//!
//! Preprocesses and parses files, then prints their definition trees.
//! Workers are never run.

use std::fmt::Write as _;
use std::path::PathBuf;

use clap::Args;
use serde::Serialize;

use crate::context::ParseError;
use crate::error::{DefError, Result};
use crate::output::{display_path, plural, Printer};
use crate::parser::{build_tree, FsReader, Node, Preprocessor, SourceReader};

/// Print the definition tree of files
#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Definition files to parse
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Print the trees as JSON
    #[arg(long)]
    pub json: bool,
}

/// Parsed form of one file.
#[derive(Debug, Serialize)]
pub struct FileTree {
    pub file: String,
    pub version: u32,
    pub definitions: Vec<Node>,
    pub errors: Vec<ParseError>,
}

pub fn run(args: TreeArgs, printer: &Printer) -> Result<()> {
    let reader = FsReader;
    let mut trees = Vec::with_capacity(args.files.len());

    for path in &args.files {
        let source = reader.read(path).map_err(|e| DefError::Io {
            path: path.clone(),
            message: format!("Failed to read definition file: {}", e),
        })?;
        trees.push(parse_file(path, &source, &reader));
    }

    if args.json {
        let json = serde_json::to_string_pretty(&trees).map_err(|e| DefError::Build {
            message: format!("Failed to serialize trees: {}", e),
            help: None,
        })?;
        println!("{}", json);
    } else {
        for tree in &trees {
            printer.info("Parsed", &format!("{} (version {})", tree.file, tree.version));
            print!("{}", render(&tree.definitions));
        }
    }

    let errors: Vec<&ParseError> = trees.iter().flat_map(|t| &t.errors).collect();
    for err in &errors {
        printer.parse_error(err);
    }

    let critical = errors.iter().filter(|e| e.critical).count();
    if critical > 0 {
        return Err(DefError::Build {
            message: format!("{} found", plural(critical, "critical error", "critical errors")),
            help: Some("Fix the unbalanced brackets or braces reported above".to_string()),
        });
    }
    Ok(())
}

/// Preprocess and parse one file.
pub fn parse_file(path: &std::path::Path, source: &str, reader: &dyn SourceReader) -> FileTree {
    let file = display_path(path);
    let preprocessed = Preprocessor::new(reader).run(path, source);
    let tree = build_tree(&preprocessed.text, &file);

    let mut errors = preprocessed.warnings;
    errors.extend(tree.errors);
    FileTree {
        file,
        version: preprocessed.version,
        definitions: tree.nodes,
        errors,
    }
}

/// Indented text form of a tree, one definition per line.
pub fn render(nodes: &[Node]) -> String {
    let mut out = String::new();
    render_into(nodes, 0, &mut out);
    out
}

fn render_into(nodes: &[Node], depth: usize, out: &mut String) {
    for node in nodes {
        let _ = writeln!(out, "{:indent$}[{}]", "", node.words.join(" "), indent = depth * 2);
        render_into(&node.children, depth + 1, out);
    }
}
