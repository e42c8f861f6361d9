//! Compiled content cache, persisted across runs.
//!
//! Split into a textual sub-cache (text inline in JSON) and a binary
//! sub-cache (files copied into the cache directory). A representation only
//! counts as cached when *both* sub-caches have an entry for it: caches
//! written before binary content was cached have textual entries only, and
//! those must not be mistaken for complete ones.
//!
//! `get`, `set` and `has_full_entry` take one lock spanning both sub-caches,
//! so compiling workers never observe half of an update. `load`, `store`
//! and `prune` run at run boundaries and take `&mut self` / `&self`.

mod binary;
mod error;
mod persist;
mod table;
mod textual;

pub use error::CacheError;

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rustc_hash::FxHashSet;

use crate::rep::RepId;
use crate::store::SnapshotContents;
use binary::BinaryCache;
use textual::TextualCache;

/// Cache directory name (inside project root)
pub const CACHE_DIR: &str = ".tola/cache";

/// Sub-directory of the cache directory owned by this cache
const CONTENT_DIR: &str = "compiled_content";

/// Operations both sub-caches provide.
trait SubCache {
    fn get(&self, rep: &RepId) -> Option<SnapshotContents>;
    /// Store the contents of the matching variant; others are ignored.
    fn set(&mut self, rep: &RepId, contents: &SnapshotContents) -> Result<(), CacheError>;
    fn contains(&self, rep: &RepId) -> bool;
    fn reps(&self) -> Vec<RepId>;
    fn remove(&mut self, rep: &RepId);
    fn prune(&mut self, active: &FxHashSet<RepId>) -> Result<usize, CacheError>;
    fn load(&mut self) -> Result<(), CacheError>;
    fn store(&self) -> Result<(), CacheError>;
    fn len(&self) -> usize;
}

#[derive(Debug)]
struct SubCaches {
    textual: TextualCache,
    binary: BinaryCache,
}

impl SubCaches {
    fn both(&self) -> [&dyn SubCache; 2] {
        [&self.textual, &self.binary]
    }

    fn both_mut(&mut self) -> [&mut dyn SubCache; 2] {
        [&mut self.textual, &mut self.binary]
    }
}

/// Cross-run cache of compiled content, keyed by representation and
/// snapshot name.
#[derive(Debug)]
pub struct CompiledContentCache {
    dir: PathBuf,
    caches: Mutex<SubCaches>,
}

impl CompiledContentCache {
    /// Cache rooted at `cache_dir` (e.g. `<root>/.tola/cache`). Nothing is
    /// read until [`load`](Self::load).
    pub fn new(cache_dir: &Path) -> Self {
        let dir = cache_dir.join(CONTENT_DIR);
        Self {
            caches: Mutex::new(SubCaches {
                textual: TextualCache::new(&dir),
                binary: BinaryCache::new(&dir),
            }),
            dir,
        }
    }

    /// Directory holding the cache files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cached snapshots of `rep`, or `None` unless both sub-caches have it.
    pub fn get(&self, rep: &RepId) -> Option<SnapshotContents> {
        let caches = self.caches.lock();
        let textual = caches.textual.get(rep);
        let binary = caches.binary.get(rep);

        let (Some(mut merged), Some(binary)) = (textual, binary) else {
            return None;
        };
        merged.extend(binary);
        Some(merged)
    }

    /// Replace the cached snapshots of `rep`.
    ///
    /// Each sub-cache receives its own partition, possibly empty. If the
    /// binary side fails the rep is dropped from both, leaving a miss rather
    /// than a mix of old and new entries.
    pub fn set(&self, rep: &RepId, contents: &SnapshotContents) -> Result<(), CacheError> {
        let mut caches = self.caches.lock();
        caches.textual.set(rep, contents)?;
        if let Err(e) = caches.binary.set(rep, contents) {
            for cache in caches.both_mut() {
                cache.remove(rep);
            }
            return Err(e);
        }
        Ok(())
    }

    /// True iff both sub-caches hold an entry for `rep`.
    pub fn has_full_entry(&self, rep: &RepId) -> bool {
        let caches = self.caches.lock();
        caches.both().iter().all(|cache| cache.contains(rep))
    }

    /// Read both sub-caches from disk, replacing in-memory state.
    pub fn load(&mut self) -> Result<(), CacheError> {
        for cache in self.caches.get_mut().both_mut() {
            cache.load()?;
        }
        Ok(())
    }

    /// Write both sub-caches to disk.
    pub fn store(&self) -> Result<(), CacheError> {
        let caches = self.caches.lock();
        for cache in caches.both() {
            cache.store()?;
        }
        crate::debug!(
            "cache";
            "stored {} textual / {} binary entries",
            caches.textual.len(),
            caches.binary.len()
        );
        Ok(())
    }

    /// Drop entries of representations not in `active`.
    ///
    /// Returns the number of distinct representations removed.
    pub fn prune(&mut self, active: &FxHashSet<RepId>) -> Result<usize, CacheError> {
        let caches = self.caches.get_mut();
        let stale: FxHashSet<RepId> = caches
            .both()
            .iter()
            .flat_map(|cache| cache.reps())
            .filter(|rep| !active.contains(rep))
            .collect();

        for cache in caches.both_mut() {
            cache.prune(active)?;
        }
        crate::debug!("cache"; "pruned {} stale representations", stale.len());
        Ok(stale.len())
    }
}
