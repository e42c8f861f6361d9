//! Item representations.
//!
//! A representation is one named output variant of a source item. Rule
//! evaluation creates it with its snapshot definitions and raw paths; the
//! output writer only reads those and flips the `modified` flag.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use rustc_hash::FxHashMap;

/// Stable identity of a representation: item identifier + rep name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepId {
    /// Item identifier, e.g. `/about.md`
    pub item: String,
    /// Representation name, e.g. `default`
    pub name: String,
}

impl RepId {
    pub fn new(item: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (rep {})", self.item, self.name)
    }
}

/// A named checkpoint of compiled content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotDef {
    pub name: String,
}

/// One output variant of a source item, scoped to a single compile run.
#[derive(Debug)]
pub struct ItemRep {
    id: RepId,
    /// Insertion order = compilation order
    snapshot_defs: Vec<SnapshotDef>,
    /// Snapshot name -> absolute destination paths
    raw_paths: FxHashMap<String, Vec<PathBuf>>,
    /// Set by the last write processed for this rep
    modified: AtomicBool,
}

impl ItemRep {
    pub fn new(item: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: RepId::new(item, name),
            snapshot_defs: Vec::new(),
            raw_paths: FxHashMap::default(),
            modified: AtomicBool::new(false),
        }
    }

    /// Builder form of [`add_snapshot`](Self::add_snapshot).
    pub fn with_snapshot(mut self, name: impl Into<String>) -> Self {
        self.add_snapshot(name);
        self
    }

    /// Builder form of [`add_raw_path`](Self::add_raw_path).
    pub fn with_raw_path(mut self, snapshot: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.add_raw_path(snapshot, path);
        self
    }

    /// Define a snapshot. Redefining an existing name keeps its position.
    pub fn add_snapshot(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.snapshot_defs.iter().any(|def| def.name == name) {
            self.snapshot_defs.push(SnapshotDef { name });
        }
    }

    /// Register a destination path for a snapshot.
    ///
    /// Duplicates are kept here; the writer skips paths it already wrote.
    pub fn add_raw_path(&mut self, snapshot: impl Into<String>, path: impl Into<PathBuf>) {
        self.raw_paths
            .entry(snapshot.into())
            .or_default()
            .push(path.into());
    }

    #[inline]
    pub fn id(&self) -> &RepId {
        &self.id
    }

    pub fn snapshot_defs(&self) -> &[SnapshotDef] {
        &self.snapshot_defs
    }

    /// Raw paths registered for a snapshot, empty if none.
    pub fn raw_paths(&self, snapshot: &str) -> &[PathBuf] {
        self.raw_paths.get(snapshot).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn modified(&self) -> bool {
        self.modified.load(Ordering::Acquire)
    }

    pub fn set_modified(&self, modified: bool) {
        self.modified.store(modified, Ordering::Release);
    }
}

impl fmt::Display for ItemRep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.id.fmt(f)
    }
}
