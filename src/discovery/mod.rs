//! Definition file discovery for defpipe projects.
//!
//! Finds the files to parse, either from a `defpipe.yaml` manifest or from
//! paths given on the command line, and builds the manifest's workers.
//!
//! # Example
//!
//! ```ignore
//! use defpipe::discovery::discover;
//!
//! let project = discover("./my-project")?;
//! println!("Found {} files", project.files.len());
//!
//! let workers = project.workers();
//! let registry = Project::registry_for(&workers);
//! ```

mod manifest;
mod scanner;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::Result;
use crate::registry::WorkerRegistry;
use crate::workers::DeclaredWorker;

pub use manifest::Manifest;
pub use scanner::{collect_paths, scan_directory, scan_sources};

/// The name of the manifest file.
pub const MANIFEST_FILENAME: &str = "defpipe.yaml";

/// Result of discovering a project.
#[derive(Debug)]
pub struct Project {
    /// The project root directory.
    pub root: PathBuf,

    /// The loaded manifest (default if no defpipe.yaml was found).
    pub manifest: Manifest,

    /// Whether a defpipe.yaml manifest was found.
    pub has_manifest: bool,

    /// Definition files to parse, in order.
    pub files: Vec<PathBuf>,
}

impl Project {
    /// Workers declared in the manifest, ready to register.
    pub fn workers(&self) -> Vec<Arc<DeclaredWorker>> {
        self.manifest
            .workers
            .iter()
            .cloned()
            .map(|spec| Arc::new(DeclaredWorker::new(spec)))
            .collect()
    }

    /// A registry holding `workers` in manifest order.
    pub fn registry_for(workers: &[Arc<DeclaredWorker>]) -> WorkerRegistry {
        let mut registry = WorkerRegistry::new();
        for worker in workers {
            registry.add(Arc::clone(worker) as crate::registry::WorkerRef);
        }
        registry
    }
}

/// Load the manifest at `path`, or the default one if it does not exist.
pub fn load_manifest(path: &Path) -> Result<(Manifest, bool)> {
    if path.exists() {
        Ok((Manifest::load(path)?, true))
    } else {
        Ok((Manifest::default(), false))
    }
}

/// Discover a project rooted at `root` using its manifest's sources.
pub fn discover(root: impl AsRef<Path>) -> Result<Project> {
    discover_manifest(&root.as_ref().join(MANIFEST_FILENAME))
}

/// Discover a project from the manifest at `path`. Sources resolve against
/// the manifest's directory.
pub fn discover_manifest(path: &Path) -> Result<Project> {
    let root = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let (manifest, has_manifest) = load_manifest(path)?;
    let files = scan_sources(&manifest.effective_sources(), &root, &manifest);

    Ok(Project {
        root,
        manifest,
        has_manifest,
        files,
    })
}

/// Discover definition files from explicit paths, using `manifest` for the
/// extension, excludes and workers.
pub fn discover_paths(paths: &[PathBuf], manifest: Manifest, has_manifest: bool) -> Project {
    let files = collect_paths(paths, &manifest);
    let root = paths
        .first()
        .and_then(|p| p.parent())
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));

    Project {
        root,
        manifest,
        has_manifest,
        files,
    }
}
