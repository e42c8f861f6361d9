//! Per-run compiled content store.
//!
//! Upstream compilation fills it; the writer and the compiled content cache
//! read from it. Safe to fill from several compiling workers at once.

use dashmap::DashMap;
use rustc_hash::FxHashMap;

use crate::content::Content;
use crate::rep::RepId;

/// Snapshot name -> content
pub type SnapshotContents = FxHashMap<String, Content>;

/// `(representation, snapshot) -> Content` for the current run.
#[derive(Debug, Default)]
pub struct CompiledContentStore {
    contents: DashMap<RepId, SnapshotContents>,
}

impl CompiledContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content of one snapshot.
    pub fn get(&self, rep: &RepId, snapshot: &str) -> Option<Content> {
        self.contents
            .get(rep)
            .and_then(|snapshots| snapshots.get(snapshot).cloned())
    }

    /// Record the content of one snapshot, replacing any earlier value.
    pub fn set(&self, rep: &RepId, snapshot: impl Into<String>, content: Content) {
        self.contents
            .entry(rep.clone())
            .or_default()
            .insert(snapshot.into(), content);
    }

    /// All snapshots of a representation (empty if nothing was compiled).
    pub fn get_all(&self, rep: &RepId) -> SnapshotContents {
        self.contents
            .get(rep)
            .map(|snapshots| snapshots.clone())
            .unwrap_or_default()
    }

    /// Replace every snapshot of a representation, e.g. from a cache hit.
    pub fn set_all(&self, rep: &RepId, contents: SnapshotContents) {
        self.contents.insert(rep.clone(), contents);
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }
}
