//! The parser façade.
//!
//! [`DefinitionParser`] runs the whole pipeline for a set of files on a
//! background thread:
//!
//! 1. preprocess and build the tree of each file into one shared [`Context`]
//!    (`Preprocessing`, then `Parsing`, per file);
//! 2. stop if any critical error was recorded;
//! 3. compute the global handling map and check it against the tree;
//! 4. run the [`Scheduler`] (`Working`);
//! 5. publish the errors and move to `Finished`.
//!
//! # Example
//!
//! ```ignore
//! use defpipe::{DefinitionParser, ParserState, WorkerRegistry};
//!
//! let parser = DefinitionParser::new(registry);
//! parser.parse_files(["scene.def", "materials.def"])?;
//! parser.wait(ParserState::Finished);
//!
//! for error in parser.last_result() {
//!     eprintln!("{}", error);
//! }
//! ```

mod status;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::checker;
use crate::context::{Context, ErrorCode, ParseError};
use crate::error::{DefError, Result};
use crate::parser::{build_tree, FsReader, Preprocessor, SourceReader};
use crate::registry::WorkerRegistry;
use crate::scheduler::{Scheduler, SessionState};

pub use status::{ParserHandle, ParserState, WaitOutcome};

/// What a finished session produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionResult {
    /// Every error recorded, in order.
    pub errors: Vec<ParseError>,
    /// No critical error was recorded and every worker succeeded.
    pub success: bool,
    /// Declared version of each parsed file.
    pub versions: BTreeMap<String, u32>,
    /// Number of top-level definitions across all files.
    pub definitions: usize,
}

impl SessionResult {
    pub fn has_critical_error(&self) -> bool {
        self.errors.iter().any(|e| e.critical)
    }
}

/// Everything the background thread needs.
#[derive(Clone)]
struct Shared {
    registry: Arc<WorkerRegistry>,
    reader: Arc<dyn SourceReader>,
    handle: ParserHandle,
    /// Worker lists of the newest session that reached Working. Each
    /// session records into its own state, so a reset session cannot touch
    /// the lists of the one that replaced it.
    session: Arc<Mutex<Arc<SessionState>>>,
    result: Arc<Mutex<Option<SessionResult>>>,
}

impl Shared {
    fn lock_result(&self) -> MutexGuard<'_, Option<SessionResult>> {
        self.result.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn current_session(&self) -> Arc<SessionState> {
        Arc::clone(&self.session.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn install_session(&self, session: Arc<SessionState>) {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = session;
    }
}

/// Parses definition files and dispatches them to registered workers.
pub struct DefinitionParser {
    shared: Shared,
}

impl DefinitionParser {
    /// Parser reading files from disk.
    pub fn new(registry: WorkerRegistry) -> Self {
        Self::with_reader(registry, FsReader)
    }

    /// Parser reading files through `reader`.
    pub fn with_reader(registry: WorkerRegistry, reader: impl SourceReader + 'static) -> Self {
        Self {
            shared: Shared {
                registry: Arc::new(registry),
                reader: Arc::new(reader),
                handle: ParserHandle::new(),
                session: Arc::new(Mutex::new(Arc::new(SessionState::new()))),
                result: Arc::new(Mutex::new(None)),
            },
        }
    }

    pub fn registry(&self) -> &WorkerRegistry {
        &self.shared.registry
    }

    /// Start parsing `paths` in the background. Fails with
    /// [`DefError::Busy`] while another session is in flight.
    pub fn parse_files<I, P>(&self, paths: I) -> Result<()>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let paths: Vec<PathBuf> = paths.into_iter().map(Into::into).collect();
        let generation = self.shared.handle.begin().ok_or(DefError::Busy)?;
        self.shared.lock_result().take();
        self.shared.install_session(Arc::new(SessionState::new()));

        let shared = self.shared.clone();
        let spawned = thread::Builder::new()
            .name("defpipe-session".to_string())
            .spawn(move || run_session(&shared, generation, &paths));
        if let Err(e) = spawned {
            self.shared.handle.reset();
            return Err(e.into());
        }
        Ok(())
    }

    /// Start parsing a single file in the background.
    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<()> {
        self.parse_files([path.as_ref().to_path_buf()])
    }

    pub fn status(&self) -> ParserState {
        self.shared.handle.state()
    }

    /// Block until the parser reaches `state`.
    pub fn wait(&self, state: ParserState) {
        self.shared.handle.wait(state);
    }

    /// Block until the parser reaches `state` or `timeout` elapses.
    pub fn wait_timeout(&self, state: ParserState, timeout: Duration) -> WaitOutcome {
        self.shared.handle.wait_timeout(state, timeout)
    }

    /// Return to `Idling`. A running session stops dispatching nodes and
    /// its result is discarded.
    pub fn reset(&self) {
        let mut result = self.shared.lock_result();
        self.shared.handle.reset();
        self.shared.install_session(Arc::new(SessionState::new()));
        *result = None;
    }

    /// Errors of the last finished session.
    pub fn last_result(&self) -> Vec<ParseError> {
        self.shared
            .lock_result()
            .as_ref()
            .map(|r| r.errors.clone())
            .unwrap_or_default()
    }

    /// Whether the last finished session succeeded.
    pub fn last_success(&self) -> bool {
        self.shared
            .lock_result()
            .as_ref()
            .is_some_and(|r| r.success)
    }

    /// Full result of the last finished session.
    pub fn last_session(&self) -> Option<SessionResult> {
        self.shared.lock_result().clone()
    }

    /// Workers launched in the last Working stage.
    pub fn launched_workers(&self) -> Vec<String> {
        self.shared.current_session().launched()
    }

    /// Workers finished in the last Working stage, in completion order.
    pub fn finished_workers(&self) -> Vec<String> {
        self.shared.current_session().finished()
    }

    /// Handle for observing this parser from elsewhere.
    pub fn handle(&self) -> ParserHandle {
        self.shared.handle.clone()
    }
}

fn run_session(shared: &Shared, generation: u64, paths: &[PathBuf]) {
    let handle = shared.handle.for_session(generation);
    let context = Context::new();
    let mut versions = BTreeMap::new();

    for path in paths {
        if !handle.transition(generation, ParserState::Preprocessing) {
            return;
        }
        let file = path.display().to_string();
        context.set_current_file(file.clone());

        let source = match shared.reader.read(path) {
            Ok(source) => source,
            Err(e) => {
                context.push_error(
                    ParseError::new(ErrorCode::UnreadableFile, format!("cannot read '{}': {}", file, e))
                        .in_file(file),
                );
                continue;
            }
        };

        let preprocessed = Preprocessor::new(shared.reader.as_ref()).run(path, &source);
        context.extend_errors(preprocessed.warnings);
        context.set_local("version", preprocessed.version);
        context.set_local(format!("version:{}", file), preprocessed.version);
        versions.insert(file.clone(), preprocessed.version);

        if !handle.transition(generation, ParserState::Parsing) {
            return;
        }
        let tree = build_tree(&preprocessed.text, &file);
        debug!(file = %file, definitions = tree.nodes.len(), "parsed file");
        context.extend_errors(tree.errors);
        context.attach(tree.nodes);
    }

    let definitions = context.root().children.len();
    let finish = |success: bool| {
        let errors = context.errors();
        let critical = errors.iter().any(|e| e.critical);
        publish(
            shared,
            generation,
            SessionResult {
                errors,
                success: success && !critical,
                versions: versions.clone(),
                definitions,
            },
        );
    };

    if context.has_critical_error() {
        info!("critical errors while parsing, skipping workers");
        return finish(false);
    }

    let global = shared.registry.compute_definitions();
    let map = checker::check(&context, &global);
    if map.is_empty() {
        debug!("no workers selected");
        return finish(!context.has_critical_error());
    }

    let session = Arc::new(SessionState::new());
    {
        // Held so a concurrent reset cannot slip between the check and the
        // install.
        let _result = shared.lock_result();
        if !handle.transition(generation, ParserState::Working) {
            return;
        }
        shared.install_session(Arc::clone(&session));
    }
    let ok = Scheduler::new(&context, &map, &handle, &session).run();
    finish(ok);
}

fn publish(shared: &Shared, generation: u64, result: SessionResult) {
    let mut slot = shared.lock_result();
    if !shared.handle.is_current(generation) {
        return;
    }
    info!(
        errors = result.errors.len(),
        success = result.success,
        "session finished"
    );
    *slot = Some(result);
    shared.handle.transition(generation, ParserState::Finished);
}
