//! File system scanner for definition files.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::manifest::Manifest;

/// Recursively find definition files under `root`, sorted by path.
pub fn scan_directory(root: &Path, manifest: &Manifest) -> Vec<PathBuf> {
    if !root.exists() {
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| manifest.is_definition_file(p) && !manifest.is_excluded(p))
        .collect();

    files.sort();
    files
}

/// Scan every manifest source relative to `base`.
pub fn scan_sources(sources: &[String], base: &Path, manifest: &Manifest) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for source in sources {
        let path = Manifest::resolve_source(source, base);
        files.extend(collect_path(&path, manifest));
    }
    dedup_preserving_order(files)
}

/// Expand explicit paths: directories are scanned, files are taken as given
/// whatever their extension.
pub fn collect_paths(paths: &[PathBuf], manifest: &Manifest) -> Vec<PathBuf> {
    let files = paths
        .iter()
        .flat_map(|p| collect_path(p, manifest))
        .collect();
    dedup_preserving_order(files)
}

fn collect_path(path: &Path, manifest: &Manifest) -> Vec<PathBuf> {
    if path.is_dir() {
        scan_directory(path, manifest)
    } else {
        vec![path.to_path_buf()]
    }
}

fn dedup_preserving_order(files: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut seen = std::collections::HashSet::new();
    files
        .into_iter()
        .filter(|f| seen.insert(f.clone()))
        .collect()
}
