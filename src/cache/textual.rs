//! Textual sub-cache: snapshot text stored inline in one JSON file.

use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;

use super::persist::{load_versioned, store_versioned};
use super::table::RepTable;
use super::{CacheError, SubCache};
use crate::content::Content;
use crate::rep::RepId;
use crate::store::SnapshotContents;

const FILE: &str = "textual.json";
const VERSION: u32 = 1;

#[derive(Debug)]
pub struct TextualCache {
    path: PathBuf,
    table: RepTable<String>,
}

impl TextualCache {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(FILE),
            table: RepTable::default(),
        }
    }
}

impl SubCache for TextualCache {
    fn get(&self, rep: &RepId) -> Option<SnapshotContents> {
        let snapshots = self.table.get(rep)?;
        Some(
            snapshots
                .iter()
                .map(|(name, text)| (name.clone(), Content::Textual(text.clone())))
                .collect(),
        )
    }

    fn set(&mut self, rep: &RepId, contents: &SnapshotContents) -> Result<(), CacheError> {
        let snapshots = contents
            .iter()
            .filter_map(|(name, content)| match content {
                Content::Textual(text) => Some((name.clone(), text.clone())),
                Content::Binary(_) => None,
            })
            .collect();
        self.table.insert(rep, snapshots);
        Ok(())
    }

    fn contains(&self, rep: &RepId) -> bool {
        self.table.contains(rep)
    }

    fn reps(&self) -> Vec<RepId> {
        self.table.reps().collect()
    }

    fn remove(&mut self, rep: &RepId) {
        self.table.remove(rep);
    }

    fn prune(&mut self, active: &FxHashSet<RepId>) -> Result<usize, CacheError> {
        Ok(self.table.prune(active).len())
    }

    fn load(&mut self) -> Result<(), CacheError> {
        self.table = load_versioned(&self.path, VERSION)?.unwrap_or_default();
        crate::debug!("cache"; "loaded {} textual entries", self.table.len());
        Ok(())
    }

    fn store(&self) -> Result<(), CacheError> {
        store_versioned(&self.path, VERSION, &self.table)
    }

    fn len(&self) -> usize {
        self.table.len()
    }
}
