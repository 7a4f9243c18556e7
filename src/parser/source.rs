//! Where definition text comes from.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

/// Reads raw definition text for a path.
pub trait SourceReader: Send + Sync {
    fn read(&self, path: &Path) -> io::Result<String>;
}

/// Reads from the file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsReader;

impl SourceReader for FsReader {
    fn read(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// In-memory set of sources keyed by path.
#[derive(Debug, Clone, Default)]
pub struct MemoryReader {
    files: HashMap<PathBuf, String>,
}

impl MemoryReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file, builder style.
    pub fn with_file(mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.insert(path, content);
        self
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, content: impl Into<String>) {
        self.files.insert(path.into(), content.into());
    }
}

impl SourceReader for MemoryReader {
    fn read(&self, path: &Path) -> io::Result<String> {
        self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_memory_reader() {
        let reader = MemoryReader::new().with_file("a.def", "[A]");
        assert_eq!(reader.read(Path::new("a.def")).unwrap(), "[A]");
        let err = reader.read(Path::new("b.def")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_fs_reader() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scene.def");
        fs::write(&path, "[Scene main]").unwrap();

        assert_eq!(FsReader.read(&path).unwrap(), "[Scene main]");
        assert!(FsReader.read(&dir.path().join("missing.def")).is_err());
    }
}
