//! Project manifest (defpipe.yaml) parsing.
//!
//! The manifest lists where definition files live, which files to skip, and
//! the workers the CLI registers.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DefError, Result};
use crate::workers::WorkerSpec;

/// Project manifest loaded from defpipe.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    /// Source directories or files to scan for definitions.
    /// Defaults to the current directory if empty.
    pub sources: Vec<String>,

    /// Extension of definition files, without the dot.
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Patterns to exclude from discovery.
    pub excludes: Vec<String>,

    /// How long the CLI waits for a session to finish, in milliseconds.
    /// Waits forever when unset.
    pub timeout_ms: Option<u64>,

    /// Workers to register.
    pub workers: Vec<WorkerSpec>,
}

fn default_extension() -> String {
    "def".to_string()
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            sources: vec![],
            extension: default_extension(),
            excludes: vec![],
            timeout_ms: None,
            workers: vec![],
        }
    }
}

impl Manifest {
    /// Load manifest from a defpipe.yaml file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| DefError::Io {
            path: path.to_path_buf(),
            message: format!("Failed to read manifest: {}", e),
        })?;

        Self::parse(&content)
    }

    /// Parse manifest from YAML string.
    pub fn parse(content: &str) -> Result<Self> {
        let manifest: Manifest = serde_yaml::from_str(content).map_err(|e| DefError::Parse {
            message: format!("Invalid manifest: {}", e),
            help: Some("Check defpipe.yaml syntax".to_string()),
        })?;

        if let Some(unnamed) = manifest.workers.iter().position(|w| w.name.trim().is_empty()) {
            return Err(DefError::Parse {
                message: format!("Worker #{} has no name", unnamed + 1),
                help: Some("Give every entry under `workers:` a `name:`".to_string()),
            });
        }

        Ok(manifest)
    }

    /// Check if a path should be excluded based on exclude patterns.
    pub fn is_excluded(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy().replace('\\', "/");
        self.excludes
            .iter()
            .any(|pattern| Self::matches_pattern(&path_str, pattern))
    }

    /// Simple glob pattern matching.
    fn matches_pattern(path: &str, pattern: &str) -> bool {
        if let Some(suffix) = pattern.strip_prefix("**/") {
            // **/dir/* matches anything inside dir anywhere in the path
            if let Some(dir) = suffix.strip_suffix("/*") {
                return path.starts_with(&format!("{}/", dir))
                    || path.contains(&format!("/{}/", dir));
            }
            return path.ends_with(suffix);
        }

        if let Some(suffix) = pattern.strip_prefix('*') {
            if !suffix.contains('/') {
                return path.ends_with(suffix);
            }
        }

        if let Some(prefix) = pattern.strip_suffix("/*") {
            return path.starts_with(&format!("{}/", prefix))
                || path.contains(&format!("/{}/", prefix));
        }

        path.contains(pattern)
    }

    /// Whether `path` has the definition file extension.
    pub fn is_definition_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == self.extension)
    }

    /// Get effective source paths, defaulting to current directory.
    pub fn effective_sources(&self) -> Vec<String> {
        if self.sources.is_empty() {
            vec![".".to_string()]
        } else {
            self.sources.clone()
        }
    }

    /// Session wait limit, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Resolve a source entry against the manifest's directory.
    pub fn resolve_source(source: &str, base: &Path) -> PathBuf {
        if Path::new(source).is_absolute() {
            PathBuf::from(source)
        } else {
            base.join(source)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_manifest() {
        let manifest = Manifest::parse("extension: defs").unwrap();

        assert_eq!(manifest.extension, "defs");
        assert!(manifest.sources.is_empty());
        assert!(manifest.workers.is_empty());
        assert!(manifest.timeout().is_none());
    }

    #[test]
    fn test_parse_full_manifest() {
        let yaml = r#"
sources:
  - scenes/
  - shared/
extension: def
timeout_ms: 1500
excludes:
  - "*.bak"
  - "**/drafts/*"
workers:
  - name: textures
    definitions: [Texture, Image]
  - name: scenes
    definitions: [Scene]
    depends: [Texture]
  - name: hd-textures
    definitions: [Texture]
    overwrite: true
    supersedes: [textures]
"#;
        let manifest = Manifest::parse(yaml).unwrap();

        assert_eq!(manifest.sources, vec!["scenes/", "shared/"]);
        assert_eq!(manifest.timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(manifest.excludes, vec!["*.bak", "**/drafts/*"]);
        assert_eq!(manifest.workers.len(), 3);
        assert_eq!(manifest.workers[1].depends, vec!["Texture"]);
        assert!(manifest.workers[2].overwrite);
        assert_eq!(manifest.workers[2].supersedes, vec!["textures"]);
    }

    #[test]
    fn test_parse_empty_manifest() {
        let manifest = Manifest::parse("").unwrap();
        assert_eq!(manifest.extension, "def");
    }

    #[test]
    fn test_unnamed_worker_rejected() {
        let result = Manifest::parse("workers:\n  - definitions: [A]\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_yaml_rejected() {
        assert!(Manifest::parse("sources: [unclosed").is_err());
    }

    #[test]
    fn test_effective_sources() {
        let mut manifest = Manifest::default();
        assert_eq!(manifest.effective_sources(), vec!["."]);

        manifest.sources = vec!["defs/".to_string()];
        assert_eq!(manifest.effective_sources(), vec!["defs/"]);
    }

    #[test]
    fn test_is_excluded_extension() {
        let manifest = Manifest {
            excludes: vec!["*.bak".to_string()],
            ..Default::default()
        };

        assert!(manifest.is_excluded(Path::new("scene.bak")));
        assert!(manifest.is_excluded(Path::new("path/to/scene.bak")));
        assert!(!manifest.is_excluded(Path::new("scene.def")));
    }

    #[test]
    fn test_is_excluded_directory() {
        let manifest = Manifest {
            excludes: vec!["**/drafts/*".to_string()],
            ..Default::default()
        };

        assert!(manifest.is_excluded(Path::new("drafts/a.def")));
        assert!(manifest.is_excluded(Path::new("scenes/drafts/b.def")));
        assert!(!manifest.is_excluded(Path::new("scenes/a.def")));
    }

    #[test]
    fn test_is_definition_file() {
        let manifest = Manifest::default();
        assert!(manifest.is_definition_file(Path::new("a/scene.def")));
        assert!(!manifest.is_definition_file(Path::new("scene.def.bak")));
        assert!(!manifest.is_definition_file(Path::new("README")));
    }
}
