use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tandem_config::{MemoryConfig, WriteAccess};
use tracing::{debug, info};

use super::entry::{
    MemoryEntry, MemoryQuery, MemorySnapshot, MemoryStats, MemoryUpdate, NewMemoryEntry,
};
use crate::error::MemoryError;

/// A stored entry plus its insertion sequence, used to order entries that
/// share a timestamp.
struct Slot {
    entry: MemoryEntry,
    seq: u64,
}

/// Primary table, both secondary indexes and the ownership registry.
/// Always mutated as a unit under one lock.
#[derive(Default)]
struct StoreState {
    entries: HashMap<String, Slot>,
    by_category: HashMap<String, HashSet<String>>,
    by_bundle: HashMap<String, HashSet<String>>,
    owners: HashMap<String, BTreeSet<String>>,
    next_seq: u64,
}

impl StoreState {
    fn insert(&mut self, entry: MemoryEntry) {
        index_add(&mut self.by_category, &entry.category, &entry.id);
        index_add(&mut self.by_bundle, &entry.bundle_id, &entry.id);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(entry.id.clone(), Slot { entry, seq });
    }

    fn remove(&mut self, id: &str) -> Option<MemoryEntry> {
        let slot = self.entries.remove(id)?;
        index_remove(&mut self.by_category, &slot.entry.category, id);
        index_remove(&mut self.by_bundle, &slot.entry.bundle_id, id);
        Some(slot.entry)
    }

    fn slots_in<'a>(
        &'a self,
        index: &'a HashMap<String, HashSet<String>>,
        key: &str,
    ) -> Vec<&'a Slot> {
        index
            .get(key)
            .into_iter()
            .flatten()
            .filter_map(|id| self.entries.get(id))
            .collect()
    }

    fn owns(&self, bundle_id: &str, category: &str) -> bool {
        self.owners
            .get(category)
            .is_some_and(|set| set.contains(bundle_id))
    }
}

fn index_add(index: &mut HashMap<String, HashSet<String>>, key: &str, id: &str) {
    index
        .entry(key.to_string())
        .or_default()
        .insert(id.to_string());
}

/// Remove `id` from the bucket for `key`, dropping the bucket once empty.
fn index_remove(index: &mut HashMap<String, HashSet<String>>, key: &str, id: &str) {
    if let Some(bucket) = index.get_mut(key) {
        bucket.remove(id);
        if bucket.is_empty() {
            index.remove(key);
        }
    }
}

/// In-memory, indexed store of entries shared across bundles.
///
/// Entries are indexed by category and by owning bundle. Separately, a
/// many-to-many registry records which bundles own which categories; the
/// stack manager maintains it as bundles join and leave. Whether that
/// registry gates writes is decided by [`WriteAccess`].
pub struct SharedMemoryStore {
    state: Mutex<StoreState>,
    write_access: WriteAccess,
}

impl Default for SharedMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedMemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            write_access: WriteAccess::Open,
        }
    }

    pub fn from_config(config: &MemoryConfig) -> Self {
        Self::new().with_write_access(config.write_access)
    }

    pub fn with_write_access(mut self, write_access: WriteAccess) -> Self {
        self.write_access = write_access;
        self
    }

    pub fn write_access(&self) -> WriteAccess {
        self.write_access
    }

    // Every mutation leaves the state consistent before returning, so a
    // poisoned lock still guards valid data.
    fn lock_state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a new entry and return its generated id.
    ///
    /// With [`WriteAccess::Enforced`] the writer must own the category.
    pub fn store(&self, new: NewMemoryEntry) -> Result<String, MemoryError> {
        let mut state = self.lock_state();

        if self.write_access == WriteAccess::Enforced && !state.owns(&new.bundle_id, &new.category)
        {
            return Err(MemoryError::AccessDenied {
                bundle_id: new.bundle_id,
                category: new.category,
            });
        }

        let id = uuid::Uuid::new_v4().to_string();
        debug!(
            "Storing memory entry {id} in '{}' for bundle '{}'",
            new.category, new.bundle_id
        );
        state.insert(MemoryEntry {
            id: id.clone(),
            category: new.category,
            bundle_id: new.bundle_id,
            payload: new.payload,
            timestamp: Utc::now(),
            metadata: new.metadata,
        });
        Ok(id)
    }

    /// Entries matching the filter, newest first.
    pub fn query(&self, query: &MemoryQuery) -> Vec<MemoryEntry> {
        let state = self.lock_state();

        let mut hits: Vec<&Slot> = match (&query.category, &query.bundle_id) {
            (Some(category), _) => state.slots_in(&state.by_category, category),
            (None, Some(bundle_id)) => state.slots_in(&state.by_bundle, bundle_id),
            (None, None) => state.entries.values().collect(),
        };

        hits.retain(|slot| {
            let e = &slot.entry;
            if query.after.is_some_and(|after| e.timestamp < after) {
                return false;
            }
            if query.before.is_some_and(|before| e.timestamp > before) {
                return false;
            }
            true
        });

        hits.sort_by(|a, b| {
            b.entry
                .timestamp
                .cmp(&a.entry.timestamp)
                .then(b.seq.cmp(&a.seq))
        });

        if let Some(limit) = query.limit.filter(|l| *l > 0) {
            hits.truncate(limit);
        }

        hits.into_iter().map(|slot| slot.entry.clone()).collect()
    }

    pub fn get(&self, id: &str) -> Option<MemoryEntry> {
        self.lock_state()
            .entries
            .get(id)
            .map(|slot| slot.entry.clone())
    }

    /// Apply a partial update. Returns false if the id is unknown.
    pub fn update(&self, id: &str, update: MemoryUpdate) -> bool {
        let mut guard = self.lock_state();
        let state = &mut *guard;

        let Some(slot) = state.entries.get_mut(id) else {
            return false;
        };
        let entry = &mut slot.entry;

        if let Some(category) = update.category {
            if category != entry.category {
                index_remove(&mut state.by_category, &entry.category, id);
                index_add(&mut state.by_category, &category, id);
                entry.category = category;
            }
        }
        if let Some(bundle_id) = update.bundle_id {
            if bundle_id != entry.bundle_id {
                index_remove(&mut state.by_bundle, &entry.bundle_id, id);
                index_add(&mut state.by_bundle, &bundle_id, id);
                entry.bundle_id = bundle_id;
            }
        }
        if let Some(payload) = update.payload {
            entry.payload = payload;
        }
        if let Some(metadata) = update.metadata {
            entry.metadata = metadata;
        }

        debug!("Updated memory entry {id}");
        true
    }

    /// Remove an entry. Returns false if it was not present.
    pub fn delete(&self, id: &str) -> bool {
        let removed = self.lock_state().remove(id).is_some();
        if removed {
            debug!("Deleted memory entry {id}");
        }
        removed
    }

    /// Remove every entry written by `bundle_id`. Returns the number removed.
    pub fn clear_for_bundle(&self, bundle_id: &str) -> usize {
        let mut guard = self.lock_state();
        let state = &mut *guard;

        let Some(ids) = state.by_bundle.remove(bundle_id) else {
            return 0;
        };
        for id in &ids {
            if let Some(slot) = state.entries.remove(id) {
                index_remove(&mut state.by_category, &slot.entry.category, id);
            }
        }

        info!("Cleared {} memory entries for bundle '{bundle_id}'", ids.len());
        ids.len()
    }

    /// Remove every entry in `category`. Returns the number removed.
    pub fn clear_for_category(&self, category: &str) -> usize {
        let mut guard = self.lock_state();
        let state = &mut *guard;

        let Some(ids) = state.by_category.remove(category) else {
            return 0;
        };
        for id in &ids {
            if let Some(slot) = state.entries.remove(id) {
                index_remove(&mut state.by_bundle, &slot.entry.bundle_id, id);
            }
        }

        info!("Cleared {} memory entries in category '{category}'", ids.len());
        ids.len()
    }

    /// Drop all entries, indexes and ownership registrations.
    pub fn clear(&self) {
        *self.lock_state() = StoreState::default();
        info!("Cleared shared memory");
    }

    pub fn len(&self) -> usize {
        self.lock_state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_state().entries.is_empty()
    }

    pub fn get_stats(&self) -> MemoryStats {
        let state = self.lock_state();

        let counts = |index: &HashMap<String, HashSet<String>>| -> BTreeMap<String, usize> {
            index
                .iter()
                .map(|(key, ids)| (key.clone(), ids.len()))
                .collect()
        };

        let timestamps = state.entries.values().map(|slot| slot.entry.timestamp);
        MemoryStats {
            total_entries: state.entries.len(),
            category_counts: counts(&state.by_category),
            bundle_counts: counts(&state.by_bundle),
            oldest_entry: timestamps.clone().min(),
            newest_entry: timestamps.max(),
        }
    }

    // --- Category ownership ---

    /// Record `bundle_id` as an owner of `category`. Returns true if newly added.
    pub fn register_category(&self, category: &str, bundle_id: &str) -> bool {
        self.lock_state()
            .owners
            .entry(category.to_string())
            .or_default()
            .insert(bundle_id.to_string())
    }

    /// Drop `bundle_id` as an owner of `category`. Existing entries are kept.
    pub fn unregister_category(&self, category: &str, bundle_id: &str) -> bool {
        let mut state = self.lock_state();
        let Some(set) = state.owners.get_mut(category) else {
            return false;
        };
        let removed = set.remove(bundle_id);
        if set.is_empty() {
            state.owners.remove(category);
        }
        removed
    }

    /// Owners of a category, sorted.
    pub fn get_category_owners(&self, category: &str) -> Vec<String> {
        self.lock_state()
            .owners
            .get(category)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_access(&self, bundle_id: &str, category: &str) -> bool {
        self.lock_state().owns(bundle_id, category)
    }

    /// Categories with at least one registered owner, sorted.
    pub fn registered_categories(&self) -> Vec<String> {
        let state = self.lock_state();
        let mut categories: Vec<String> = state.owners.keys().cloned().collect();
        categories.sort();
        categories
    }

    // --- Snapshots ---

    /// Copy out the full contents. Entries are listed in insertion order.
    pub fn export(&self) -> MemorySnapshot {
        let state = self.lock_state();

        let mut slots: Vec<&Slot> = state.entries.values().collect();
        slots.sort_by_key(|slot| slot.seq);

        let mut categories: Vec<String> = state.by_category.keys().cloned().collect();
        categories.sort();

        MemorySnapshot {
            entries: slots.into_iter().map(|slot| slot.entry.clone()).collect(),
            categories,
            category_owners: state
                .owners
                .iter()
                .map(|(category, set)| (category.clone(), set.iter().cloned().collect()))
                .collect(),
        }
    }

    /// Replace all state with a snapshot. Indexes are rebuilt from the
    /// entries; ownership is taken verbatim from the snapshot.
    pub fn import(&self, snapshot: MemorySnapshot) {
        let mut state = StoreState::default();
        for entry in snapshot.entries {
            // Last row wins for a repeated id; drop the earlier index entries.
            state.remove(&entry.id);
            state.insert(entry);
        }
        for (category, owners) in snapshot.category_owners {
            if !owners.is_empty() {
                state.owners.insert(category, owners.into_iter().collect());
            }
        }

        let total = state.entries.len();
        *self.lock_state() = state;
        info!("Imported {total} memory entries");
    }
}
