//! Paths already written during the current run.

use std::path::{Path, PathBuf};

use dashmap::DashSet;

/// Concurrency-safe set of destination paths.
///
/// [`insert`](Self::insert) is the test-and-set: exactly one caller gets
/// `true` for a given path, however many workers race on it.
#[derive(Debug, Default)]
pub struct WrittenPaths {
    paths: DashSet<PathBuf>,
}

impl WrittenPaths {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `path`. Returns `false` if it was already claimed.
    #[inline]
    pub fn insert(&self, path: &Path) -> bool {
        self.paths.insert(path.to_path_buf())
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
