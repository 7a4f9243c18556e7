//! defpipe - Definition file parser and worker pipeline
//!
//! Reads bracket/brace definition files, builds one definition tree per
//! session, and dispatches each top-level definition to the worker that
//! claims its name, honouring dependencies between workers.

pub mod checker;
pub mod cli;
pub mod context;
pub mod discovery;
pub mod error;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod registry;
pub mod scheduler;
pub mod workers;

pub use context::{Context, ErrorCode, ParseError, Value};
pub use discovery::{discover, discover_manifest, discover_paths, Manifest, Project};
pub use error::{DefError, Result};
pub use parser::{build_tree, preprocess, FsReader, MemoryReader, Node, Preprocessed, SourceReader, TreeResult};
pub use pipeline::{DefinitionParser, ParserHandle, ParserState, SessionResult, WaitOutcome};
pub use registry::{CycleError, DependencyGraph, HandlingMap, Worker, WorkerId, WorkerRef, WorkerRegistry};
pub use scheduler::{Scheduler, SessionState};
pub use workers::{DeclaredWorker, ProcessedDefinition, WorkerSpec};
