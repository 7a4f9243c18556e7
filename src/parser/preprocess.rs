//! Line directives: `% version`, `% include` and `% message`.
//!
//! Directive lines are removed from the output. Every other line, including
//! malformed directives, is copied verbatim. Included files are preprocessed
//! recursively and their output is placed ahead of the including file's
//! remaining text, not at the directive's position.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::context::{ErrorCode, ParseError};

use super::source::SourceReader;
use super::span::line_at;

/// Version assumed when a file declares none.
pub const DEFAULT_VERSION: u32 = 1;

/// Output of preprocessing one file.
#[derive(Debug, Clone, PartialEq)]
pub struct Preprocessed {
    /// Flattened source text.
    pub text: String,
    /// Declared version of the top-level file.
    pub version: u32,
    /// Non-critical problems, such as unresolved includes.
    pub warnings: Vec<ParseError>,
}

enum Directive<'a> {
    Version(u32),
    Include(&'a str),
    Message(&'a str),
}

fn parse_directive(line: &str) -> Option<Directive<'_>> {
    let rest = line.trim_start().strip_prefix('%')?.trim();
    let (keyword, args) = match rest.split_once(char::is_whitespace) {
        Some((keyword, args)) => (keyword, args.trim()),
        None => (rest, ""),
    };

    match keyword {
        "version" => args.parse().ok().map(Directive::Version),
        "include" => {
            let path = args
                .strip_prefix('"')
                .and_then(|p| p.strip_suffix('"'))
                .or_else(|| args.strip_prefix('<').and_then(|p| p.strip_suffix('>')))
                .unwrap_or(args);
            (!path.is_empty()).then_some(Directive::Include(path))
        }
        "message" => Some(Directive::Message(args)),
        _ => None,
    }
}

/// Runs directives for a file and everything it includes.
pub struct Preprocessor<'r> {
    reader: &'r dyn SourceReader,
    stack: Vec<PathBuf>,
}

impl<'r> Preprocessor<'r> {
    pub fn new(reader: &'r dyn SourceReader) -> Self {
        Self {
            reader,
            stack: Vec::new(),
        }
    }

    /// Preprocess `source`, the content of `path`. Includes resolve relative
    /// to the directory of `path`.
    pub fn run(&mut self, path: &Path, source: &str) -> Preprocessed {
        self.stack.push(path.to_path_buf());
        let result = self.process(path, source);
        self.stack.pop();
        result
    }

    fn process(&mut self, path: &Path, source: &str) -> Preprocessed {
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        let file = path.display().to_string();

        let mut included = String::new();
        let mut body = String::with_capacity(source.len());
        let mut version = DEFAULT_VERSION;
        let mut warnings = Vec::new();
        let mut offset = 0;

        for line in source.split_inclusive('\n') {
            let line_offset = offset;
            offset += line.len();

            let content = line.trim_end_matches(['\n', '\r']);
            let Some(directive) = parse_directive(content) else {
                body.push_str(line);
                continue;
            };

            match directive {
                Directive::Version(v) => version = v,
                Directive::Message(text) => debug!(file = %file, "{}", text),
                Directive::Include(rel) => {
                    let target = base.join(rel);
                    let line_no = line_at(source, line_offset);

                    if self.stack.contains(&target) {
                        warn!(file = %file, include = %target.display(), "skipping cyclic include");
                        warnings.push(
                            ParseError::new(
                                ErrorCode::IncludeNotFound,
                                format!("include cycle through '{}'", target.display()),
                            )
                            .at(file.clone(), line_no),
                        );
                        continue;
                    }

                    match self.reader.read(&target) {
                        Ok(text) => {
                            debug!(file = %file, include = %target.display(), "including");
                            let nested = self.run(&target, &text);
                            included.push_str(&nested.text);
                            warnings.extend(nested.warnings);
                        }
                        Err(e) => {
                            warn!(file = %file, include = %target.display(), "include not found: {}", e);
                            warnings.push(
                                ParseError::new(
                                    ErrorCode::IncludeNotFound,
                                    format!("cannot include '{}': {}", target.display(), e),
                                )
                                .at(file.clone(), line_no),
                            );
                        }
                    }
                }
            }
        }

        included.push_str(&body);
        Preprocessed {
            text: included,
            version,
            warnings,
        }
    }
}

/// Preprocess a single file's text.
pub fn preprocess(path: &Path, source: &str, reader: &dyn SourceReader) -> Preprocessed {
    Preprocessor::new(reader).run(path, source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::source::{FsReader, MemoryReader};
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn run(reader: &MemoryReader, path: &str) -> Preprocessed {
        let source = reader.read(Path::new(path)).unwrap();
        preprocess(Path::new(path), &source, reader)
    }

    #[test]
    fn test_no_directives_is_identity() {
        let source = "[A x]{\r\n  [B y]\n}\n\n  [C \"q\"]";
        let out = preprocess(Path::new("a.def"), source, &MemoryReader::new());

        assert_eq!(out.text, source);
        assert_eq!(out.version, DEFAULT_VERSION);
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_version_directive() {
        let out = preprocess(
            Path::new("a.def"),
            "% version 3\n[A]\n",
            &MemoryReader::new(),
        );
        assert_eq!(out.version, 3);
        assert_eq!(out.text, "[A]\n");
    }

    #[test]
    fn test_message_directive_produces_no_text() {
        let out = preprocess(
            Path::new("a.def"),
            "%message hello there\n[A]",
            &MemoryReader::new(),
        );
        assert_eq!(out.text, "[A]");
    }

    #[test]
    fn test_malformed_directives_copied_verbatim() {
        let source = "% version two\n% frobnicate\n% include\n[A]";
        let out = preprocess(Path::new("a.def"), source, &MemoryReader::new());

        assert_eq!(out.text, source);
        assert_eq!(out.version, DEFAULT_VERSION);
    }

    #[test]
    fn test_include_is_prepended() {
        let reader = MemoryReader::new()
            .with_file("defs/main.def", "[First]\n% include common.def\n[Last]\n")
            .with_file("defs/common.def", "[Common]\n");

        let out = run(&reader, "defs/main.def");
        assert_eq!(out.text, "[Common]\n[First]\n[Last]\n");
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_nested_includes_resolve_relative_to_includer() {
        let reader = MemoryReader::new()
            .with_file("main.def", "% include sub/a.def\n[Main]")
            .with_file("sub/a.def", "% include b.def\n[A]\n")
            .with_file("sub/b.def", "% version 9\n[B]\n");

        let out = run(&reader, "main.def");
        assert_eq!(out.text, "[B]\n[A]\n[Main]");
        // Included versions do not leak into the including file
        assert_eq!(out.version, DEFAULT_VERSION);
    }

    #[test]
    fn test_missing_include_is_a_warning() {
        let reader = MemoryReader::new().with_file("main.def", "[A]\n% include nowhere.def\n[B]");

        let out = run(&reader, "main.def");
        assert_eq!(out.text, "[A]\n[B]");
        assert_eq!(out.warnings.len(), 1);
        assert_eq!(out.warnings[0].code, ErrorCode::IncludeNotFound);
        assert_eq!(out.warnings[0].line, 2);
        assert!(!out.warnings[0].critical);
    }

    #[test]
    fn test_include_cycle_is_skipped() {
        let reader = MemoryReader::new()
            .with_file("a.def", "% include b.def\n[A]\n")
            .with_file("b.def", "% include a.def\n[B]\n");

        let out = run(&reader, "a.def");
        assert_eq!(out.text, "[B]\n[A]\n");
        assert_eq!(out.warnings.len(), 1);
        assert!(out.warnings[0].message.contains("cycle"));
    }

    #[test]
    fn test_quoted_include_from_disk() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("shared.def"), "[Shared]\n").unwrap();
        let main = dir.path().join("main.def");
        let source = "% include \"shared.def\"\n[Main]\n";
        fs::write(&main, source).unwrap();

        let out = preprocess(&main, source, &FsReader);
        assert_eq!(out.text, "[Shared]\n[Main]\n");
    }
}
