//! Session error records.

use std::fmt;

use serde::Serialize;

/// What went wrong. Each code maps to a stable integer; 0 means "no error"
/// and is never produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    UnresolvedDefinition,
    MissingBracket,
    MissingBlockEnd,
    UnresolvedDependency,
    CircularDependency,
    WorkerFailed,
    IncludeNotFound,
    UnreadableFile,
    Cancelled,
}

impl ErrorCode {
    /// Numeric code.
    pub fn value(self) -> u32 {
        match self {
            ErrorCode::UnresolvedDefinition => 1,
            ErrorCode::MissingBracket => 2,
            ErrorCode::MissingBlockEnd => 3,
            ErrorCode::UnresolvedDependency => 4,
            ErrorCode::CircularDependency => 5,
            ErrorCode::WorkerFailed => 6,
            ErrorCode::IncludeNotFound => 7,
            ErrorCode::UnreadableFile => 8,
            ErrorCode::Cancelled => 9,
        }
    }

    /// Whether errors of this kind stop the session.
    pub fn is_critical(self) -> bool {
        matches!(
            self,
            ErrorCode::MissingBracket
                | ErrorCode::MissingBlockEnd
                | ErrorCode::UnresolvedDependency
                | ErrorCode::CircularDependency
                | ErrorCode::UnreadableFile
        )
    }

    /// Short kebab-case name used in output.
    pub fn name(self) -> &'static str {
        match self {
            ErrorCode::UnresolvedDefinition => "unresolved-definition",
            ErrorCode::MissingBracket => "missing-bracket",
            ErrorCode::MissingBlockEnd => "missing-block-end",
            ErrorCode::UnresolvedDependency => "unresolved-dependency",
            ErrorCode::CircularDependency => "circular-dependency",
            ErrorCode::WorkerFailed => "worker-failed",
            ErrorCode::IncludeNotFound => "include-not-found",
            ErrorCode::UnreadableFile => "unreadable-file",
            ErrorCode::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A single error raised during a parse session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseError {
    pub code: ErrorCode,
    pub message: String,
    /// File the error belongs to (empty when not tied to a file).
    pub filepath: String,
    /// 1-indexed line, or 0 when unknown.
    pub line: u32,
    pub critical: bool,
}

impl ParseError {
    /// Create an error with the code's default criticality.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            filepath: String::new(),
            line: 0,
            critical: code.is_critical(),
        }
    }

    /// Attach the file and line the error was found at.
    pub fn at(mut self, filepath: impl Into<String>, line: u32) -> Self {
        self.filepath = filepath.into();
        self.line = line;
        self
    }

    /// Attach a file without a line.
    pub fn in_file(mut self, filepath: impl Into<String>) -> Self {
        self.filepath = filepath.into();
        self
    }

    /// Numeric error code.
    pub fn code_value(&self) -> u32 {
        self.code.value()
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = if self.critical { "error" } else { "warning" };
        write!(f, "{}[{}]: {}", severity, self.code, self.message)?;
        match (self.filepath.is_empty(), self.line) {
            (true, _) => Ok(()),
            (false, 0) => write!(f, " ({})", self.filepath),
            (false, line) => write!(f, " ({}:{})", self.filepath, line),
        }
    }
}
