//! Where tileset files come from.

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;

/// Read access to tileset files by relative path.
pub trait TilesetSource {
    fn read_to_string(&self, path: &str) -> io::Result<String>;
}

/// Files under a data directory.
#[derive(Clone, Debug)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl TilesetSource for DirSource {
    fn read_to_string(&self, path: &str) -> io::Result<String> {
        std::fs::read_to_string(self.root.join(path))
    }
}

/// Files held in memory, keyed by path.
#[derive(Clone, Debug, Default)]
pub struct MemorySource {
    files: BTreeMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file, builder style.
    pub fn with_file(mut self, path: impl Into<String>, contents: impl Into<String>) -> Self {
        self.insert(path, contents);
        self
    }

    /// Add or replace a file.
    pub fn insert(&mut self, path: impl Into<String>, contents: impl Into<String>) {
        self.files.insert(path.into(), contents.into());
    }

    /// The built-in "trident" tileset for the classic ruleset.
    pub fn builtin() -> Self {
        let mut source = Self::new();
        for (path, contents) in crate::builtin::files() {
            source.insert(path, contents);
        }
        source
    }
}

impl TilesetSource for MemorySource {
    fn read_to_string(&self, path: &str) -> io::Result<String> {
        self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{path} not found"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source_reads_inserted_files() {
        let source = MemorySource::new().with_file("a.spec", "[spec]");
        assert_eq!(source.read_to_string("a.spec").unwrap(), "[spec]");
        let err = source.read_to_string("b.spec").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_dir_source_missing_file() {
        let source = DirSource::new("/nonexistent-tileset-root");
        assert!(source.read_to_string("trident.tilespec").is_err());
    }
}
