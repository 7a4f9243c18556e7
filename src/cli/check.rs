//! Check command implementation.
//!
//! Discovers definition files, registers the manifest's workers, and runs
//! the full pipeline over them.

use std::path::PathBuf;

use clap::Args;
use tracing::debug;

use crate::discovery::{discover_manifest, discover_paths, load_manifest, Project, MANIFEST_FILENAME};
use crate::error::{DefError, Result};
use crate::output::{display_path, plural, Printer};
use crate::pipeline::{DefinitionParser, ParserState, SessionResult, WaitOutcome};
use crate::registry::Worker;

/// Parse a project and dispatch its definitions to workers
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Files or directories to parse (default: the manifest's sources)
    pub paths: Vec<PathBuf>,

    /// Manifest to read workers and sources from
    #[arg(long, short)]
    pub manifest: Option<PathBuf>,
}

pub fn run(args: CheckArgs, printer: &Printer) -> Result<()> {
    let manifest_path = args
        .manifest
        .clone()
        .unwrap_or_else(|| PathBuf::from(MANIFEST_FILENAME));
    if args.manifest.is_some() && !manifest_path.exists() {
        return Err(DefError::Io {
            path: manifest_path,
            message: "Manifest not found".to_string(),
        });
    }

    let project = if args.paths.is_empty() {
        discover_manifest(&manifest_path)?
    } else {
        let (manifest, has_manifest) = load_manifest(&manifest_path)?;
        discover_paths(&args.paths, manifest, has_manifest)
    };

    if project.files.is_empty() {
        printer.warning("Skipping", "no definition files found");
        return Ok(());
    }
    if !project.has_manifest {
        printer.info("Note", &format!("no {} found, running without workers", MANIFEST_FILENAME));
    }

    let session = run_project(&project, printer)?;
    report(&project, &session, printer);

    if !session.success {
        let critical = session.errors.iter().filter(|e| e.critical).count();
        return Err(DefError::Build {
            message: if critical > 0 {
                format!("check failed with {}", plural(critical, "critical error", "critical errors"))
            } else {
                "check failed: a worker reported failure".to_string()
            },
            help: Some("Run with -v for more detail".to_string()),
        });
    }
    Ok(())
}

/// Run the pipeline over `project` and wait for it to finish.
fn run_project(project: &Project, printer: &Printer) -> Result<SessionResult> {
    let workers = project.workers();
    let parser = DefinitionParser::new(Project::registry_for(&workers));

    for file in &project.files {
        printer.status("Parsing", &display_path(file));
    }
    parser.parse_files(project.files.iter().cloned())?;

    match project.manifest.timeout() {
        Some(limit) => {
            if parser.wait_timeout(ParserState::Finished, limit) == WaitOutcome::TimedOut {
                parser.reset();
                return Err(DefError::Build {
                    message: format!("session did not finish within {} ms", limit.as_millis()),
                    help: Some("Raise timeout_ms in the manifest".to_string()),
                });
            }
        }
        None => parser.wait(ParserState::Finished),
    }

    let session = parser.last_session().ok_or_else(|| DefError::Build {
        message: "session finished without a result".to_string(),
        help: None,
    })?;

    for worker in &workers {
        let processed = worker.processed();
        debug!(worker = %worker.identity(), count = processed.len(), "worker summary");
        if !processed.is_empty() {
            printer.info(
                "Processed",
                &format!(
                    "{} {}",
                    printer.cyan(&worker.identity().name),
                    printer.dim(&format!("({})", plural(processed.len(), "definition", "definitions")))
                ),
            );
        }
    }

    Ok(session)
}

fn report(project: &Project, session: &SessionResult, printer: &Printer) {
    for err in &session.errors {
        printer.parse_error(err);
    }

    let summary = format!(
        "{} in {}, {}",
        plural(session.definitions, "definition", "definitions"),
        plural(project.files.len(), "file", "files"),
        plural(session.errors.len(), "error", "errors"),
    );
    if session.success {
        printer.status("Finished", &summary);
    } else {
        printer.error("Failed", &summary);
    }
}
