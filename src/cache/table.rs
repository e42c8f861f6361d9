//! Nested `item -> rep name -> snapshot -> V` table shared by both sub-caches.

use std::collections::BTreeMap;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::rep::RepId;

type Snapshots<V> = BTreeMap<String, V>;

/// Persisted layout of a sub-cache.
///
/// Keyed by strings at every level so it serializes as plain JSON objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepTable<V> {
    items: BTreeMap<String, BTreeMap<String, Snapshots<V>>>,
}

impl<V> Default for RepTable<V> {
    fn default() -> Self {
        Self {
            items: BTreeMap::new(),
        }
    }
}

impl<V> RepTable<V> {
    pub fn get(&self, rep: &RepId) -> Option<&Snapshots<V>> {
        self.items.get(&rep.item)?.get(&rep.name)
    }

    pub fn contains(&self, rep: &RepId) -> bool {
        self.get(rep).is_some()
    }

    /// Replace the snapshots of a rep, returning the previous ones.
    pub fn insert(&mut self, rep: &RepId, snapshots: Snapshots<V>) -> Option<Snapshots<V>> {
        self.items
            .entry(rep.item.clone())
            .or_default()
            .insert(rep.name.clone(), snapshots)
    }

    pub fn remove(&mut self, rep: &RepId) -> Option<Snapshots<V>> {
        let reps = self.items.get_mut(&rep.item)?;
        let removed = reps.remove(&rep.name);
        if reps.is_empty() {
            self.items.remove(&rep.item);
        }
        removed
    }

    /// Drop every rep not in `active`, returning the dropped ones.
    pub fn prune(&mut self, active: &FxHashSet<RepId>) -> Vec<(RepId, Snapshots<V>)> {
        let stale: Vec<RepId> = self.reps().filter(|rep| !active.contains(rep)).collect();
        stale
            .into_iter()
            .filter_map(|rep| self.remove(&rep).map(|snapshots| (rep, snapshots)))
            .collect()
    }

    /// Every rep with an entry.
    pub fn reps(&self) -> impl Iterator<Item = RepId> + '_ {
        self.items
            .iter()
            .flat_map(|(item, reps)| reps.keys().map(move |name| RepId::new(item, name)))
    }

    pub fn len(&self) -> usize {
        self.items.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
