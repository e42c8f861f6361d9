//! Binary sub-cache: snapshot files copied into the cache directory.
//!
//! ```text
//! compiled_content/
//! ├── binary.json                 # index: item -> rep -> snapshot -> file
//! └── binary/
//!     └── <blake3(rep)>/<snapshot>
//! ```
//!
//! Cached files are replaced (unlink + copy), never rewritten in place, since
//! output files may be hardlinked to them.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;

use super::persist::{load_versioned, store_versioned};
use super::table::RepTable;
use super::{CacheError, SubCache};
use crate::content::Content;
use crate::rep::RepId;
use crate::store::SnapshotContents;

const INDEX_FILE: &str = "binary.json";
const DATA_DIR: &str = "binary";
const VERSION: u32 = 1;

#[derive(Debug)]
pub struct BinaryCache {
    index_path: PathBuf,
    data_dir: PathBuf,
    /// Values are paths relative to `data_dir`
    table: RepTable<String>,
}

impl BinaryCache {
    pub fn new(dir: &Path) -> Self {
        Self {
            index_path: dir.join(INDEX_FILE),
            data_dir: dir.join(DATA_DIR),
            table: RepTable::default(),
        }
    }

    /// Directory holding the files of one rep.
    fn rep_dir_name(rep: &RepId) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(rep.item.as_bytes());
        hasher.update(&[0]);
        hasher.update(rep.name.as_bytes());
        hex::encode(&hasher.finalize().as_bytes()[..16])
    }

    /// File name of a snapshot: the name in a safe alphabet, suffixed with
    /// a hash of the exact name so distinct snapshots never share a file.
    fn snapshot_file_name(snapshot: &str) -> String {
        let readable: String = snapshot
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let hash = blake3::hash(snapshot.as_bytes());
        format!("{readable}-{}", hex::encode(&hash.as_bytes()[..8]))
    }

    fn relative_path(rep: &RepId, snapshot: &str) -> String {
        format!(
            "{}/{}",
            Self::rep_dir_name(rep),
            Self::snapshot_file_name(snapshot)
        )
    }

    fn copy_in(&self, source: &Path, target: &Path) -> Result<(), CacheError> {
        let write_err = |e| CacheError::Write(target.to_path_buf(), e);

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        remove_if_exists(target).map_err(write_err)?;
        fs::copy(source, target)
            .map(drop)
            .map_err(|e| CacheError::Read(source.to_path_buf(), e))
    }
}

impl SubCache for BinaryCache {
    fn get(&self, rep: &RepId) -> Option<SnapshotContents> {
        let snapshots = self.table.get(rep)?;
        Some(
            snapshots
                .iter()
                .map(|(name, rel)| (name.clone(), Content::Binary(self.data_dir.join(rel))))
                .collect(),
        )
    }

    fn set(&mut self, rep: &RepId, contents: &SnapshotContents) -> Result<(), CacheError> {
        let mut snapshots = std::collections::BTreeMap::new();

        for (name, content) in contents {
            let Content::Binary(source) = content else {
                continue;
            };
            let rel = Self::relative_path(rep, name);
            let target = self.data_dir.join(&rel);
            if source != &target {
                self.copy_in(source, &target)?;
            }
            snapshots.insert(name.clone(), rel);
        }

        // Files no current snapshot points at
        if let Some(previous) = self.table.insert(rep, snapshots) {
            let current = self.table.get(rep);
            for rel in previous.into_values() {
                if current.is_some_and(|c| c.values().any(|kept| *kept == rel)) {
                    continue;
                }
                let path = self.data_dir.join(rel);
                remove_if_exists(&path).map_err(|e| CacheError::Write(path.clone(), e))?;
            }
        }
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
        let pruned = self.table.prune(active);
        for (rep, _) in &pruned {
            let dir = self.data_dir.join(Self::rep_dir_name(rep));
            match fs::remove_dir_all(&dir) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(CacheError::Write(dir, e)),
            }
        }
        Ok(pruned.len())
    }

    fn load(&mut self) -> Result<(), CacheError> {
        let mut table: RepTable<String> =
            load_versioned(&self.index_path, VERSION)?.unwrap_or_default();

        // An entry whose data went missing cannot be served
        let broken: Vec<RepId> = table
            .reps()
            .filter(|rep| {
                table
                    .get(rep)
                    .is_some_and(|s| s.values().any(|rel| !self.data_dir.join(rel).is_file()))
            })
            .collect();
        for rep in &broken {
            crate::debug!("cache"; "dropping {}: cached file missing", rep);
            table.remove(rep);
        }

        self.table = table;
        crate::debug!("cache"; "loaded {} binary entries", self.table.len());
        Ok(())
    }

    fn store(&self) -> Result<(), CacheError> {
        store_versioned(&self.index_path, VERSION, &self.table)
    }

    fn len(&self) -> usize {
        self.table.len()
    }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
