use miette::Diagnostic;
use thiserror::Error;

/// Main error type for defpipe operations
#[derive(Error, Diagnostic, Debug)]
pub enum DefError {
    #[error("IO error: {0}")]
    #[diagnostic(code(defpipe::io))]
    IoError(#[from] std::io::Error),

    #[error("IO error with {path}: {message}")]
    #[diagnostic(code(defpipe::io))]
    Io {
        path: std::path::PathBuf,
        message: String,
    },

    #[error("Parse error: {message}")]
    #[diagnostic(code(defpipe::parse))]
    Parse {
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("Parser is busy with another session")]
    #[diagnostic(
        code(defpipe::busy),
        help("Wait for the running session to finish or reset the parser first")
    )]
    Busy,

    #[error("Build error: {message}")]
    #[diagnostic(code(defpipe::build))]
    Build {
        message: String,
        #[help]
        help: Option<String>,
    },
}

pub type Result<T> = std::result::Result<T, DefError>;
